//! Load Generator - load, stress and endurance testing
//!
//! Runs synthetic traffic against the server through an `Exchange` and turns
//! the summarised metrics into `TestResult`s.

pub mod generator;
pub mod monitor;
pub mod stats;

pub use generator::{run_endurance, run_load, run_stress, LoadPlan};
pub use stats::{EnduranceReport, PerformanceMetrics, StressReport};

use crate::config::HarnessConfig;
use crate::results::{Category, CheckDetails, Severity, TestResult};
use crate::transport::Exchange;

pub const LOAD_CHECK: (&str, &str) = ("PERF-001", "Load test");
pub const STRESS_CHECK: (&str, &str) = ("STRESS-001", "Stress test");
pub const ENDURANCE_CHECK: (&str, &str) = ("ENDURANCE-001", "Endurance test");

/// Run the configured load test and grade it
pub async fn load_check(exchange: &dyn Exchange, config: &HarnessConfig) -> TestResult {
    let metrics = run_load(exchange, &LoadPlan::from_config(config)).await;
    grade_load(metrics, config)
}

pub fn grade_load(metrics: PerformanceMetrics, config: &HarnessConfig) -> TestResult {
    let (id, name) = LOAD_CHECK;
    let summary = format!(
        "{} requests at {} workers: {:.1} rps, p95 {:.1}ms, error rate {:.1}%",
        metrics.requests,
        metrics.concurrency,
        metrics.rps,
        metrics.p95_ms,
        metrics.error_rate * 100.0
    );
    let duration = std::time::Duration::from_secs_f64(metrics.duration_secs);

    let mut problems = Vec::new();
    if metrics.error_rate > config.load.max_error_rate {
        problems.push(format!(
            "error rate above {:.1}%",
            config.load.max_error_rate * 100.0
        ));
    }
    if metrics.p95_ms > config.load.max_p95_ms {
        problems.push(format!("p95 above {:.0}ms", config.load.max_p95_ms));
    }

    let result = if problems.is_empty() {
        TestResult::pass(id, name, Category::Performance, summary)
    } else {
        let severity = if metrics.error_rate >= 0.5 {
            Severity::High
        } else {
            Severity::Medium
        };
        TestResult::fail(
            id,
            name,
            Category::Performance,
            format!("{} ({})", summary, problems.join(", ")),
        )
        .with_severity(severity)
    };

    result
        .with_duration(duration)
        .with_details(CheckDetails::Performance(metrics))
}

/// Run the stress ramp and grade it
pub async fn stress_check(exchange: &dyn Exchange, config: &HarnessConfig) -> TestResult {
    grade_stress(run_stress(exchange, config).await)
}

/// A breaking point is expected under stress; breaking at the first step is not
pub fn grade_stress(report: StressReport) -> TestResult {
    let (id, name) = STRESS_CHECK;
    let duration = std::time::Duration::from_secs_f64(
        report.steps.iter().map(|s| s.metrics.duration_secs).sum(),
    );
    let first_step_broke = report.steps.len() == 1 && report.breaking_point.is_some();

    let result = match report.breaking_point {
        None => TestResult::pass(id, name, Category::Stress, report.summary()),
        Some(_) if first_step_broke => {
            TestResult::fail(id, name, Category::Stress, report.summary())
                .with_severity(Severity::Medium)
        }
        Some(_) => TestResult::pass(id, name, Category::Stress, report.summary())
            .with_severity(Severity::Low),
    };

    result
        .with_duration(duration)
        .with_details(CheckDetails::Stress(report))
}

/// Run the endurance test and grade it
pub async fn endurance_check(exchange: &dyn Exchange, config: &HarnessConfig) -> TestResult {
    grade_endurance(run_endurance(exchange, config).await, config)
}

pub fn grade_endurance(report: EnduranceReport, config: &HarnessConfig) -> TestResult {
    let (id, name) = ENDURANCE_CHECK;
    let duration = std::time::Duration::from_secs_f64(report.duration_secs);
    let summary = format!(
        "{} requests over {:.0}s, error rate {:.1}%",
        report.requests,
        report.duration_secs,
        report.error_rate * 100.0
    );

    let mut problems = Vec::new();
    if report.latency_degraded {
        problems.push(format!(
            "latency degraded from {:.1}ms to {:.1}ms",
            report.leading_mean_ms, report.trailing_mean_ms
        ));
    }
    if report.memory_growth {
        problems.push("memory grew steadily".to_string());
    }
    if report.error_rate > config.load.max_error_rate {
        problems.push("error rate above threshold".to_string());
    }

    let result = if problems.is_empty() {
        TestResult::pass(id, name, Category::Endurance, summary)
    } else {
        TestResult::fail(
            id,
            name,
            Category::Endurance,
            format!("{}: {}", summary, problems.join("; ")),
        )
        .with_severity(Severity::Medium)
    };

    result
        .with_duration(duration)
        .with_details(CheckDetails::Endurance(report))
}

/// Skipped results for load checks that could not run
pub fn skip_checks(checks: &[(&str, &str)], reason: &str) -> Vec<TestResult> {
    checks
        .iter()
        .map(|(id, name)| TestResult::skip(*id, *name, category_of(id), reason))
        .collect()
}

fn category_of(id: &str) -> Category {
    match id {
        id if id == STRESS_CHECK.0 => Category::Stress,
        id if id == ENDURANCE_CHECK.0 => Category::Endurance,
        _ => Category::Performance,
    }
}
