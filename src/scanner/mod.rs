//! Security Scanner - static vulnerability detection in server source
//!
//! Regex rules and a Python syntax-tree rule share the `StaticRule`
//! interface. The scanner only reads files; it never executes target code.

mod engine;
pub mod finding;
pub mod rules;
mod tree;

pub use engine::{ScanEngine, ScanResults, ScanSummary};
pub use finding::{Finding, Language, ScanCategory, SecurityVulnerability};
pub use rules::{RegexRule, StaticRule};
pub use tree::PythonTreeRule;

use std::path::Path;
use std::time::Duration;

use crate::config::ScanConfig;
use crate::errors::Result;
use crate::results::{Category, CheckDetails, Severity, TestResult};

/// Id of the summary result: nothing found, or nothing readable
pub const SCAN_CHECK: (&str, &str) = ("SEC-000", "Static security scan");

/// Scan `path` with the configured rule set
pub fn scan(path: &Path, config: &ScanConfig) -> Result<ScanResults> {
    Ok(ScanEngine::new(config)?.scan_path(path))
}

impl ScanResults {
    /// One failed result per vulnerability, one tolerated result per unreadable file
    pub fn into_test_results(self) -> Vec<TestResult> {
        let duration = Duration::from_millis(self.duration_ms);
        let mut results = Vec::with_capacity(self.vulnerabilities.len() + self.errors.len() + 1);

        let (id, name) = SCAN_CHECK;
        if self.files_scanned == 0 && !self.errors.is_empty() {
            results.push(
                TestResult::error(
                    id,
                    name,
                    Category::Security,
                    format!("no files could be scanned ({} unreadable)", self.errors.len()),
                )
                .with_duration(duration),
            );
        } else if self.vulnerabilities.is_empty() {
            results.push(
                TestResult::pass(
                    id,
                    name,
                    Category::Security,
                    format!("{} files scanned, no vulnerabilities found", self.files_scanned),
                )
                .with_duration(duration),
            );
        }

        for vulnerability in self.vulnerabilities {
            let name = format!(
                "{} in {}",
                vulnerability.category.title(),
                vulnerability.location()
            );
            let message = format!(
                "{}: {} ({})",
                vulnerability.rule, vulnerability.snippet, vulnerability.recommendation
            );
            results.push(
                TestResult::fail(
                    format!("SEC-{}", vulnerability.id),
                    name,
                    Category::Security,
                    message,
                )
                .with_severity(vulnerability.severity)
                .with_details(CheckDetails::Security(vulnerability)),
            );
        }

        for (file, message) in self.errors {
            results.push(
                TestResult::tolerated(
                    "SEC-ERR",
                    format!("Scan {}", file),
                    Category::Security,
                    format!("could not scan {}: {}", file, message),
                )
                .with_severity(Severity::Low),
            );
        }

        results
    }
}
