//! Test results - the record every check produces
//!
//! A `TestResult` is built once when its check completes and is never mutated
//! after it has been pushed into a `TestSuite`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::load::stats::{EnduranceReport, PerformanceMetrics, StressReport};
use crate::scanner::finding::SecurityVulnerability;

/// Severity level shared by checks and security findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened when a check ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    /// The check itself could not complete
    Error,
    /// Not attempted: a dependency failed or there was nothing to exercise
    Skip,
    /// An accepted non-answer, such as a malformed-input request that timed out
    Tolerated,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Error => "error",
            Outcome::Skip => "skip",
            Outcome::Tolerated => "tolerated",
        }
    }

    /// Whether this outcome makes the run exit non-zero
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Fail | Outcome::Error)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Launch,
    Protocol,
    Tools,
    Resources,
    Prompts,
    ErrorHandling,
    Performance,
    Stress,
    Endurance,
    Security,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Launch => "launch",
            Category::Protocol => "protocol",
            Category::Tools => "tools",
            Category::Resources => "resources",
            Category::Prompts => "prompts",
            Category::ErrorHandling => "error_handling",
            Category::Performance => "performance",
            Category::Stress => "stress",
            Category::Endurance => "endurance",
            Category::Security => "security",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exchange captured by a protocol check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDetails {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl ProtocolDetails {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_response(mut self, response: serde_json::Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_violations(mut self, violations: Vec<String>) -> Self {
        self.violations = violations;
        self
    }
}

/// Why a server could not be started
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchDetails {
    pub suggestion: String,
    /// Last lines the server wrote to stderr before exiting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl LaunchDetails {
    /// Non-empty stderr lines, oldest first
    pub fn stderr_lines(&self) -> impl Iterator<Item = &str> {
        self.stderr
            .as_deref()
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
    }
}

/// Check-specific payload attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckDetails {
    Launch(LaunchDetails),
    Protocol(ProtocolDetails),
    Performance(PerformanceMetrics),
    Stress(StressReport),
    Endurance(EnduranceReport),
    Security(SecurityVulnerability),
}

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Stable check identifier (e.g. "PROTO-001")
    pub id: String,
    pub name: String,
    pub category: Category,
    pub passed: bool,
    pub outcome: Outcome,
    pub message: String,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CheckDetails>,
    pub severity: Severity,
}

impl TestResult {
    fn with_outcome(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        outcome: Outcome,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            passed: outcome == Outcome::Pass,
            outcome,
            message: message.into(),
            duration: Duration::ZERO,
            details: None,
            severity,
        }
    }

    pub fn pass(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self::with_outcome(id, name, category, Outcome::Pass, message, Severity::Info)
    }

    pub fn fail(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self::with_outcome(id, name, category, Outcome::Fail, message, Severity::High)
    }

    pub fn error(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self::with_outcome(id, name, category, Outcome::Error, message, Severity::High)
    }

    pub fn skip(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        reason: impl Into<String>,
    ) -> Self {
        Self::with_outcome(id, name, category, Outcome::Skip, reason, Severity::Info)
    }

    pub fn tolerated(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self::with_outcome(id, name, category, Outcome::Tolerated, message, Severity::Info)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_details(mut self, details: CheckDetails) -> Self {
        self.details = Some(details);
        self
    }
}

/// Counts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub tolerated: usize,
}

impl Summary {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Every result from one harness run, in the order the checks completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    pub server: String,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub results: Vec<TestResult>,
}

impl TestSuite {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: TestResult) {
        tracing::debug!(id = %result.id, outcome = %result.outcome, "{}", result.message);
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = TestResult>) {
        for result in results {
            self.push(result);
        }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.results.len(),
            ..Default::default()
        };
        for result in &self.results {
            match result.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail => summary.failed += 1,
                Outcome::Error => summary.errors += 1,
                Outcome::Skip => summary.skipped += 1,
                Outcome::Tolerated => summary.tolerated += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failure())
    }

    /// Process exit code: 0 when nothing failed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Results grouped by category, preserving run order inside each group
    pub fn by_category(&self) -> Vec<(Category, Vec<&TestResult>)> {
        let mut groups: Vec<(Category, Vec<&TestResult>)> = Vec::new();
        for result in &self.results {
            match groups.iter_mut().find(|(c, _)| *c == result.category) {
                Some((_, items)) => items.push(result),
                None => groups.push((result.category, vec![result])),
            }
        }
        groups
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
