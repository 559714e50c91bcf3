//! Terminal summary and plain-text report

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::results::{CheckDetails, TestResult, TestSuite};
use crate::ui::theme::{outcome_badge, severity_label};
use crate::ui::{OutputMode, Printer};

/// Print grouped results and the final tally to stdout
pub fn print_summary(suite: &TestSuite, mode: OutputMode) -> io::Result<()> {
    let mut printer = Printer::stdout(mode);
    write_summary(&mut printer, suite)?;
    printer.into_inner().flush()
}

/// The same content as `print_summary`, without colors
pub fn render_plain(suite: &TestSuite) -> String {
    let mut printer = Printer::new(Vec::new(), OutputMode::Plain);
    // Writing into a Vec cannot fail
    let _ = write_summary(&mut printer, suite);
    String::from_utf8_lossy(&printer.into_inner()).into_owned()
}

fn write_summary<W: Write>(printer: &mut Printer<W>, suite: &TestSuite) -> io::Result<()> {
    let mode = printer.mode();
    printer.heading(&format!("mcpcheck {}", env!("CARGO_PKG_VERSION")))?;
    printer.field("Server", &suite.server)?;
    printer.field("Started", &suite.started_at.to_rfc3339())?;
    printer.field("Duration", &format!("{}ms", suite.duration.as_millis()))?;
    printer.rule()?;

    for (category, results) in suite.by_category() {
        printer.blank()?;
        printer.heading(&category.as_str().replace('_', " ").to_uppercase())?;
        for result in results {
            printer.line(&result_line(result, mode))?;
            for extra in detail_lines(result) {
                printer.detail(&extra)?;
            }
        }
    }

    printer.blank()?;
    printer.rule()?;
    let summary = suite.summary();
    printer.verdict(
        summary.success(),
        &format!(
            "{} checks: {} passed, {} failed, {} errors, {} skipped, {} tolerated",
            summary.total,
            summary.passed,
            summary.failed,
            summary.errors,
            summary.skipped,
            summary.tolerated
        ),
    )
}

fn result_line(result: &TestResult, mode: OutputMode) -> String {
    let mut line = format!(
        "  {} {:<12} {}",
        outcome_badge(result.outcome, mode),
        result.id,
        result.name
    );
    if result.outcome.is_failure() {
        let _ = write!(line, " [{}]", severity_label(result.severity, mode));
    }
    if !result.message.is_empty() {
        let _ = write!(line, ": {}", result.message);
    }
    line
}

/// Short indented lines under a result
fn detail_lines(result: &TestResult) -> Vec<String> {
    match &result.details {
        Some(CheckDetails::Launch(l)) => std::iter::once(format!("hint: {}", l.suggestion))
            .chain(l.stderr_lines().map(|line| format!("stderr: {}", line)))
            .collect(),
        Some(CheckDetails::Protocol(p)) if !result.passed => p.violations.clone(),
        Some(CheckDetails::Performance(m)) => vec![format!(
            "{:.1} rps | p50 {:.1}ms p95 {:.1}ms p99 {:.1}ms | errors {:.1}%{}",
            m.rps,
            m.median_ms,
            m.p95_ms,
            m.p99_ms,
            m.error_rate * 100.0,
            m.memory_mb
                .map(|mem| format!(" | {:.1} MB", mem))
                .unwrap_or_default()
        )],
        Some(CheckDetails::Stress(s)) => vec![s.summary()],
        Some(CheckDetails::Endurance(e)) => vec![format!(
            "{} samples, mean {:.1}ms -> {:.1}ms",
            e.samples.len(),
            e.leading_mean_ms,
            e.trailing_mean_ms
        )],
        Some(CheckDetails::Security(v)) => vec![v.snippet.clone(), v.recommendation.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{Category, LaunchDetails, ProtocolDetails, Severity};

    #[test]
    fn plain_report_lists_everything() {
        let mut suite = TestSuite::new("server.py");
        suite.push(TestResult::pass("PROTO-001", "Initialize handshake", Category::Protocol, "ok"));
        suite.push(
            TestResult::fail("TOOLS-001", "tools/list", Category::Tools, "invalid envelope")
                .with_severity(Severity::High)
                .with_details(CheckDetails::Protocol(
                    ProtocolDetails::new("tools/list")
                        .with_violations(vec!["id mismatch: expected 2, got 7".into()]),
                )),
        );
        suite.push(TestResult::tolerated(
            "ERR-001",
            "Invalid JSON rejected",
            Category::ErrorHandling,
            "no response (acceptable)",
        ));

        let text = render_plain(&suite);
        assert!(text.contains("[PASS] PROTO-001"));
        assert!(text.contains("[FAIL] TOOLS-001"));
        assert!(text.contains("[HIGH]"));
        assert!(text.contains("id mismatch"));
        assert!(text.contains("[WARN] ERR-001"));
        assert!(text.contains("3 checks: 1 passed, 1 failed, 0 errors, 0 skipped, 1 tolerated"));
    }

    #[test]
    fn print_summary_does_not_panic() {
        let mut suite = TestSuite::new("server.py");
        suite.push(TestResult::skip("RES-001", "resources/list", Category::Resources, "not advertised"));
        print_summary(&suite, OutputMode::Plain).unwrap();
        print_summary(&suite, OutputMode::Interactive).unwrap();
    }

    #[test]
    fn failing_tally_stays_in_the_report() {
        let mut suite = TestSuite::new("server.py");
        suite.push(TestResult::error("TOOLS-001", "tools/list", Category::Tools, "broken pipe"));
        let text = render_plain(&suite);
        let last = text.lines().last().unwrap();
        assert_eq!(
            last,
            "[FAILED] 1 checks: 0 passed, 0 failed, 1 errors, 0 skipped, 0 tolerated"
        );
    }

    #[test]
    fn launch_stderr_is_listed() {
        let mut suite = TestSuite::new("server.py");
        suite.push(
            TestResult::fail("LAUNCH-001", "Server launch", Category::Launch, "exited")
                .with_severity(Severity::Critical)
                .with_details(CheckDetails::Launch(LaunchDetails {
                    suggestion: "Run the server by hand".into(),
                    stderr: Some("Traceback\nModuleNotFoundError: mcp\n".into()),
                })),
        );
        let text = render_plain(&suite);
        assert!(text.contains("         hint: Run the server by hand"));
        assert!(text.contains("         stderr: ModuleNotFoundError: mcp"));
    }
}
