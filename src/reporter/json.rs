//! JSON report

use anyhow::Result;

use super::Report;
use crate::results::TestSuite;

pub fn generate_json(suite: &TestSuite) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Report::new(suite))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::PerformanceMetrics;
    use crate::results::{Category, CheckDetails, Severity, TestResult};
    use serde_json::Value;

    fn suite() -> TestSuite {
        let mut suite = TestSuite::new("./server.py");
        suite.push(TestResult::pass("PROTO-001", "Initialize handshake", Category::Protocol, "ok"));
        suite.push(
            TestResult::fail("PERF-001", "Load test", Category::Performance, "too slow")
                .with_severity(Severity::Medium)
                .with_details(CheckDetails::Performance(PerformanceMetrics {
                    requests: 10,
                    p95_ms: 1500.0,
                    ..Default::default()
                })),
        );
        suite.push(TestResult::skip("TOOLS-002", "tools/call", Category::Tools, "empty list"));
        suite
    }

    #[test]
    fn header_and_results() {
        let json: Value = serde_json::from_str(&generate_json(&suite()).unwrap()).unwrap();
        assert_eq!(json["tool"], "mcpcheck");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["timestamp"].is_string());
        assert_eq!(json["server"], "./server.py");
        assert_eq!(json["summary"]["total"], 3);
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["summary"]["skipped"], 1);
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn result_fields() {
        let json: Value = serde_json::from_str(&generate_json(&suite()).unwrap()).unwrap();
        let perf = &json["results"][1];
        assert_eq!(perf["id"], "PERF-001");
        assert_eq!(perf["passed"], false);
        assert_eq!(perf["outcome"], "fail");
        assert_eq!(perf["severity"], "medium");
        assert_eq!(perf["category"], "performance");
        assert!(perf["duration_ms"].is_number());
        assert_eq!(perf["details"]["kind"], "performance");
        assert_eq!(perf["details"]["p95_ms"], 1500.0);
    }
}
