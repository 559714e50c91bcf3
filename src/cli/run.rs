//! Harness run - launch, exercise, scan, report

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use super::{Cli, Selection};
use crate::config::HarnessConfig;
use crate::errors::HarnessError;
use crate::load::{self, ENDURANCE_CHECK, LOAD_CHECK, STRESS_CHECK};
use crate::reporter::{self, ReportFormat};
use crate::results::{Category, CheckDetails, LaunchDetails, Severity, TestResult, TestSuite};
use crate::scanner;
use crate::transport::{Exchange, ProcessHandle};
use crate::ui::{OutputMode, PhaseSpinner};
use crate::validator::{self, CheckId};

/// Run everything the command line asks for and return the exit code
pub async fn execute(cli: &Cli) -> Result<i32> {
    let config = cli.harness_config()?;
    let mode = OutputMode::resolve(cli.no_color);
    let spinner_mode = if cli.quiet { OutputMode::Plain } else { mode };

    let suite = run_suite(&cli.server_path, &config, cli.selection(), spinner_mode).await;

    let format = ReportFormat::resolve(cli.format, cli.output.as_deref());
    reporter::emit(&suite, format, cli.output.as_deref(), mode)?;

    let summary = suite.summary();
    info!(
        "{} checks, {} failed, {} errors",
        summary.total, summary.failed, summary.errors
    );
    Ok(suite.exit_code())
}

/// Run the selected phases against the server at `server_path`
///
/// Only a launch failure cuts the run short; the static scan still runs.
pub async fn run_suite(
    server_path: &Path,
    config: &HarnessConfig,
    selection: Selection,
    mode: OutputMode,
) -> TestSuite {
    let start = Instant::now();
    let mut suite = TestSuite::new(server_path.display().to_string());

    if selection.needs_server() {
        let launch_start = Instant::now();
        let spinner = PhaseSpinner::start(mode, "Launching server...");
        let launched = ProcessHandle::start(server_path, config).await;
        spinner.finish_and_clear();

        match launched {
            Ok(handle) => {
                suite.push(
                    CheckId::Launch001
                        .pass(format!("started: {}", handle.launch_spec().display()))
                        .with_duration(launch_start.elapsed()),
                );
                run_server_phases(&handle, config, selection, mode, &mut suite).await;
                if let Err(e) = handle.shutdown().await {
                    warn!("Server shutdown failed: {}", e);
                }
            }
            Err(e) => {
                warn!("{}", e);
                suite.push(launch_failure(&e).with_duration(launch_start.elapsed()));
                suite.extend(skipped_after_launch_failure(selection));
            }
        }
    }

    if selection.security {
        let spinner = PhaseSpinner::start(mode, "Scanning source...");
        suite.extend(scan_phase(server_path, config));
        spinner.finish_and_clear();
    }

    suite.duration = start.elapsed();
    suite
}

/// Compliance, load, stress and endurance phases against a live server
///
/// Every phase runs on an initialized session. Without compliance checks the
/// handshake still runs, but only its failure shows up in the suite.
pub async fn run_server_phases(
    exchange: &dyn Exchange,
    config: &HarnessConfig,
    selection: Selection,
    mode: OutputMode,
    suite: &mut TestSuite,
) {
    let load_checks = selected_load_checks(selection);

    let handshake_failure = if selection.compliance {
        info!("Running compliance checks");
        let spinner = PhaseSpinner::start(mode, "Checking protocol compliance...");
        let run = validator::run_compliance(exchange, config).await;
        spinner.finish_and_clear();
        let failure = run.handshake_failure();
        suite.extend(run.results);
        failure
    } else if !load_checks.is_empty() {
        let spinner = PhaseSpinner::start(mode, "Initializing session...");
        let run = validator::initialize(exchange, config).await;
        spinner.finish_and_clear();
        let failure = run.handshake_failure();
        if failure.is_some() {
            suite.extend(run.results);
        }
        failure
    } else {
        None
    };

    if let Some(failure) = handshake_failure {
        if !load_checks.is_empty() {
            warn!("Skipping load phases: {}", failure);
            let reason = format!("initialization failed ({})", failure);
            suite.extend(load::skip_checks(&load_checks, &reason));
        }
        return;
    }

    if selection.load {
        info!(
            "Running load test: {} workers x {} requests",
            config.load.concurrency, config.load.requests_per_worker
        );
        let spinner = PhaseSpinner::start(mode, "Load test...");
        suite.push(load::load_check(exchange, config).await);
        spinner.finish_and_clear();
    }

    if selection.stress {
        info!("Running stress test up to {} users", config.stress.max_users);
        let spinner = PhaseSpinner::start(mode, "Stress test...");
        suite.push(load::stress_check(exchange, config).await);
        spinner.finish_and_clear();
    }

    if selection.endurance {
        info!(
            "Running endurance test for {}s",
            config.endurance.duration_secs
        );
        let spinner = PhaseSpinner::start(mode, "Endurance test...");
        suite.push(load::endurance_check(exchange, config).await);
        spinner.finish_and_clear();
    }
}

/// LAUNCH-001 for a server that never came up, with its stderr attached
fn launch_failure(e: &HarnessError) -> TestResult {
    let result = CheckId::Launch001
        .fail(e.to_string())
        .with_severity(Severity::Critical);
    match e {
        HarnessError::Launch {
            suggestion, stderr, ..
        } => result.with_details(CheckDetails::Launch(LaunchDetails {
            suggestion: suggestion.clone(),
            stderr: stderr.as_deref().map(|s| stderr_tail(s, STDERR_TAIL_LINES)),
        })),
        _ => result,
    }
}

/// Stderr lines kept in a launch report
const STDERR_TAIL_LINES: usize = 20;

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr.lines().collect();
    kept[kept.len().saturating_sub(lines)..].join("\n")
}

fn selected_load_checks(selection: Selection) -> Vec<(&'static str, &'static str)> {
    [
        (selection.load, LOAD_CHECK),
        (selection.stress, STRESS_CHECK),
        (selection.endurance, ENDURANCE_CHECK),
    ]
    .into_iter()
    .filter_map(|(selected, check)| selected.then_some(check))
    .collect()
}

fn skipped_after_launch_failure(selection: Selection) -> Vec<TestResult> {
    const REASON: &str = "server failed to launch";
    let mut results = Vec::new();
    if selection.compliance {
        results.extend(validator::ComplianceValidator::skip_all(REASON));
    }
    results.extend(load::skip_checks(&selected_load_checks(selection), REASON));
    results
}

fn scan_phase(server_path: &Path, config: &HarnessConfig) -> Vec<TestResult> {
    info!("Scanning {}", server_path.display());
    match scanner::scan(server_path, &config.scan) {
        Ok(results) => {
            info!(
                "Scanned {} files, {} vulnerabilities",
                results.files_scanned,
                results.vulnerabilities.len()
            );
            results.into_test_results()
        }
        Err(e) => {
            let (id, name) = scanner::SCAN_CHECK;
            vec![TestResult::error(
                id,
                name,
                Category::Security,
                e.to_string(),
            )]
        }
    }
}
