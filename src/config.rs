//! Harness configuration
//!
//! Loaded from TOML and then overridden by command-line flags. The finished
//! `HarnessConfig` is passed by reference to every component.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{HarnessError, Result};
use crate::protocol::mcp::methods;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub general: GeneralConfig,
    pub launch: LaunchConfig,
    pub load: LoadConfig,
    pub stress: StressConfig,
    pub endurance: EnduranceConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: f64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { timeout_secs: 10.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// How long the child must stay alive after spawn
    pub grace_ms: u64,
    /// Wait between SIGTERM and SIGKILL at shutdown
    pub shutdown_grace_ms: u64,
    /// Extra arguments appended to the server command line
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            shutdown_grace_ms: 2000,
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub concurrency: usize,
    pub requests_per_worker: usize,
    pub ramp_up_secs: f64,
    pub think_time_ms: u64,
    /// Method issued by every load request
    pub method: String,
    pub params: Option<serde_json::Value>,
    /// Highest error rate at which a load run still passes
    pub max_error_rate: f64,
    /// Highest p95 latency at which a load run still passes
    pub max_p95_ms: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            requests_per_worker: 10,
            ramp_up_secs: 0.0,
            think_time_ms: 0,
            method: methods::TOOLS_LIST.to_string(),
            params: None,
            max_error_rate: 0.05,
            max_p95_ms: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub increment: usize,
    pub max_users: usize,
    /// Requests per worker at every step
    pub requests_per_worker: usize,
    /// Error rate above which the server is considered broken
    pub failure_threshold: f64,
    /// p95 latency above which the server is considered broken
    pub latency_threshold_ms: f64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            increment: 5,
            max_users: 50,
            requests_per_worker: 5,
            failure_threshold: 0.1,
            latency_threshold_ms: 2000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnduranceConfig {
    pub duration_secs: u64,
    pub rate_per_sec: f64,
    pub sample_interval_secs: u64,
}

impl Default for EnduranceConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            rate_per_sec: 5.0,
            sample_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Categories to run; empty means all
    pub categories: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            exclude_dirs: [
                "node_modules",
                ".git",
                "__pycache__",
                "venv",
                ".venv",
                "target",
                "dist",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    ///
    /// Looks for config in:
    /// 1. Specified path (if provided, must exist)
    /// 2. .mcpcheck.toml or mcpcheck.toml in the current directory
    /// 3. ~/.config/mcpcheck/config.toml
    ///
    /// Returns defaults when no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(HarnessError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Self::load_from_path(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".mcpcheck.toml"),
            PathBuf::from("mcpcheck.toml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mcpcheck").join("config.toml"));
        }
        paths
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::parse_toml(&content)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<()> {
        let problems = [
            (self.general.timeout_secs <= 0.0, "general.timeout_secs must be positive"),
            (self.load.concurrency == 0, "load.concurrency must be at least 1"),
            (
                self.load.requests_per_worker == 0,
                "load.requests_per_worker must be at least 1",
            ),
            (self.load.ramp_up_secs < 0.0, "load.ramp_up_secs cannot be negative"),
            (
                !(0.0..=1.0).contains(&self.load.max_error_rate),
                "load.max_error_rate must be between 0 and 1",
            ),
            (self.stress.increment == 0, "stress.increment must be at least 1"),
            (
                self.stress.requests_per_worker == 0,
                "stress.requests_per_worker must be at least 1",
            ),
            (
                !(0.0..=1.0).contains(&self.stress.failure_threshold),
                "stress.failure_threshold must be between 0 and 1",
            ),
            (self.endurance.rate_per_sec <= 0.0, "endurance.rate_per_sec must be positive"),
            (
                self.endurance.sample_interval_secs == 0,
                "endurance.sample_interval_secs must be at least 1",
            ),
        ];

        match problems.iter().find(|(bad, _)| *bad) {
            Some((_, message)) => Err(HarnessError::Config(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.general.timeout_secs)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_millis(self.launch.grace_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.launch.shutdown_grace_ms)
    }

    pub fn ramp_up(&self) -> Duration {
        Duration::from_secs_f64(self.load.ramp_up_secs)
    }

    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.load.think_time_ms)
    }

    pub fn endurance_duration(&self) -> Duration {
        Duration::from_secs(self.endurance.duration_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.endurance.sample_interval_secs)
    }
}
