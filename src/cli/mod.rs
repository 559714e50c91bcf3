//! CLI module - argument parsing and the harness run

pub mod run;

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::config::HarnessConfig;
use crate::errors::{HarnessError, Result};
use crate::reporter::ReportFormat;
use crate::scanner::ScanCategory;

/// mcpcheck - compliance, load and security testing for MCP servers
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mcpcheck",
    version,
    about = "MCP server protocol compliance, load and static security testing harness",
    long_about = "mcpcheck launches an MCP server over stdio and exercises it:\n\n\
                  Features:\n\
                  • Protocol compliance checks (handshake, tools, resources, prompts, error handling)\n\
                  • Load, stress and endurance runs with latency percentiles\n\
                  • Static vulnerability scanning of the server source\n\
                  • Text, JSON, HTML and JUnit reports"
)]
pub struct Cli {
    /// Server entry file or project directory
    pub server_path: PathBuf,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format (default: from the --output extension, else text)
    #[arg(short, long)]
    pub format: Option<ReportFormat>,

    /// Path to a TOML config file
    #[arg(short, long, env = "MCPCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors and the report
    #[arg(short, long)]
    pub quiet: bool,

    /// Test phases to run
    #[arg(
        short = 't',
        long = "test-type",
        value_delimiter = ',',
        default_value = "compliance,security"
    )]
    pub test_types: Vec<TestType>,

    /// Restrict the static scan to these categories (e.g. command_injection,weak_crypto)
    #[arg(short = 's', long = "scan-type", value_delimiter = ',')]
    pub scan_types: Vec<String>,

    /// Concurrent workers for the load test
    #[arg(short = 'u', long)]
    pub concurrent_users: Option<usize>,

    /// Endurance run length in seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Sequential requests issued by each load worker
    #[arg(long)]
    pub requests_per_user: Option<usize>,

    /// Seconds over which load workers are started
    #[arg(long)]
    pub ramp_up: Option<f64>,

    /// Highest concurrency tried by the stress test
    #[arg(long)]
    pub max_users: Option<usize>,

    /// Extra argument passed to the server (repeatable)
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    pub server_args: Vec<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// A selectable test phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TestType {
    Compliance,
    Load,
    Stress,
    Endurance,
    Security,
    All,
}

/// Which phases a run executes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub compliance: bool,
    pub load: bool,
    pub stress: bool,
    pub endurance: bool,
    pub security: bool,
}

impl Selection {
    pub fn from_types(types: &[TestType]) -> Self {
        if types.contains(&TestType::All) {
            return Self::all();
        }
        let has = |t| types.contains(&t);
        Self {
            compliance: has(TestType::Compliance),
            load: has(TestType::Load),
            stress: has(TestType::Stress),
            endurance: has(TestType::Endurance),
            security: has(TestType::Security),
        }
    }

    pub fn all() -> Self {
        Self {
            compliance: true,
            load: true,
            stress: true,
            endurance: true,
            security: true,
        }
    }

    /// Whether any phase needs a running server
    pub fn needs_server(&self) -> bool {
        self.compliance || self.load || self.stress || self.endurance
    }
}

impl Cli {
    pub fn selection(&self) -> Selection {
        Selection::from_types(&self.test_types)
    }

    /// Load the config file and apply flag overrides on top of it
    pub fn harness_config(&self) -> Result<HarnessConfig> {
        let mut config = HarnessConfig::load(self.config.as_deref())?;
        self.apply_overrides(&mut config)?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut HarnessConfig) -> Result<()> {
        if let Some(users) = self.concurrent_users {
            config.load.concurrency = users;
        }
        if let Some(requests) = self.requests_per_user {
            config.load.requests_per_worker = requests;
        }
        if let Some(ramp_up) = self.ramp_up {
            config.load.ramp_up_secs = ramp_up;
        }
        if let Some(duration) = self.duration {
            config.endurance.duration_secs = duration;
        }
        if let Some(timeout) = self.timeout {
            config.general.timeout_secs = timeout;
        }
        if let Some(max_users) = self.max_users {
            config.stress.max_users = max_users;
        }
        config.launch.args.extend(self.server_args.iter().cloned());

        if !self.scan_types.is_empty() {
            for name in &self.scan_types {
                if name != "all" {
                    ScanCategory::from_str(name).map_err(HarnessError::Config)?;
                }
            }
            config.scan.categories = self.scan_types.clone();
        }

        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mcpcheck").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_to_compliance_and_security() {
        let cli = parse(&["server.py"]);
        let selection = cli.selection();
        assert!(selection.compliance);
        assert!(selection.security);
        assert!(!selection.load && !selection.stress && !selection.endurance);
        assert_eq!(cli.format, None);
    }

    #[test]
    fn test_types_comma_separated_or_repeated() {
        let cli = parse(&["server.py", "--test-type", "load,stress", "-t", "endurance"]);
        let selection = cli.selection();
        assert!(selection.load && selection.stress && selection.endurance);
        assert!(!selection.compliance && !selection.security);
        assert!(selection.needs_server());

        assert_eq!(parse(&["s.py", "-t", "all"]).selection(), Selection::all());
        assert!(!parse(&["s.py", "-t", "security"]).selection().needs_server());
    }

    #[test]
    fn unknown_test_type_rejected() {
        assert!(Cli::try_parse_from(["mcpcheck", "s.py", "--test-type", "fuzz"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "server.py",
            "--concurrent-users",
            "3",
            "--duration",
            "7",
            "--timeout",
            "1.5",
            "--requests-per-user",
            "4",
            "--max-users",
            "12",
            "--server-arg",
            "--stdio",
            "--scan-type",
            "command_injection,weak-crypto",
        ]);
        let mut config = HarnessConfig::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.load.concurrency, 3);
        assert_eq!(config.load.requests_per_worker, 4);
        assert_eq!(config.endurance.duration_secs, 7);
        assert_eq!(config.general.timeout_secs, 1.5);
        assert_eq!(config.stress.max_users, 12);
        assert_eq!(config.launch.args, vec!["--stdio"]);
        assert_eq!(config.scan.categories, vec!["command_injection", "weak-crypto"]);
    }

    #[test]
    fn bad_overrides_are_config_errors() {
        let mut config = HarnessConfig::default();
        let err = parse(&["s.py", "--scan-type", "telepathy"])
            .apply_overrides(&mut config)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));

        let mut config = HarnessConfig::default();
        let err = parse(&["s.py", "--concurrent-users", "0"])
            .apply_overrides(&mut config)
            .unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn format_flag_parses() {
        let cli = parse(&["s.py", "--format", "junit", "-o", "out.xml", "-vv"]);
        assert_eq!(cli.format, Some(ReportFormat::Junit));
        assert_eq!(cli.verbose, 2);
    }
}
