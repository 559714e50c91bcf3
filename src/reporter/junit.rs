//! JUnit XML Reporter
//!
//! One `<testsuite>` per result category inside a `<testsuites>` root.
//! Compatible with Jenkins, GitLab, CircleCI and other CI systems.

use crate::results::{CheckDetails, Outcome, TestResult, TestSuite};

/// Generate JUnit XML from a finished suite
pub fn generate_junit(suite: &TestSuite) -> String {
    let summary = suite.summary();
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuites name=\"mcpcheck\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\" timestamp=\"{}\">\n",
        summary.total,
        summary.failed,
        summary.errors,
        summary.skipped + summary.tolerated,
        suite.duration.as_secs_f64(),
        suite.started_at.to_rfc3339()
    ));

    for (category, results) in suite.by_category() {
        let count = |o: Outcome| results.iter().filter(|r| r.outcome == o).count();
        let time: f64 = results.iter().map(|r| r.duration.as_secs_f64()).sum();
        xml.push_str(&format!(
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">\n",
            category,
            results.len(),
            count(Outcome::Fail),
            count(Outcome::Error),
            count(Outcome::Skip) + count(Outcome::Tolerated),
            time
        ));
        for result in results {
            push_testcase(&mut xml, result);
        }
        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

fn push_testcase(xml: &mut String, result: &TestResult) {
    xml.push_str(&format!(
        "    <testcase name=\"{}\" classname=\"mcpcheck.{}.{}\" time=\"{:.3}\">\n",
        escape_xml(&format!("{} {}", result.id, result.name)),
        result.category,
        escape_xml(&result.id.replace('-', "_")),
        result.duration.as_secs_f64()
    ));

    let properties = properties(result);
    if !properties.is_empty() {
        xml.push_str("      <properties>\n");
        for (name, value) in properties {
            xml.push_str(&format!(
                "        <property name=\"{}\" value=\"{}\"/>\n",
                escape_xml(&name),
                escape_xml(&value)
            ));
        }
        xml.push_str("      </properties>\n");
    }

    match result.outcome {
        Outcome::Pass => {}
        Outcome::Fail | Outcome::Error => {
            let tag = if result.outcome == Outcome::Fail {
                "failure"
            } else {
                "error"
            };
            xml.push_str(&format!(
                "      <{} message=\"{}\" type=\"{}\">{}</{}>\n",
                tag,
                escape_xml(&truncate(&result.message, 200)),
                result.severity,
                escape_xml(&failure_body(result)),
                tag
            ));
        }
        Outcome::Skip | Outcome::Tolerated => {
            xml.push_str(&format!(
                "      <skipped message=\"{}\"/>\n",
                escape_xml(&result.message)
            ));
        }
    }

    xml.push_str("    </testcase>\n");
}

fn failure_body(result: &TestResult) -> String {
    let mut body = format!("Severity: {}\n{}\n", result.severity, result.message);
    match &result.details {
        Some(CheckDetails::Protocol(p)) if !p.violations.is_empty() => {
            body.push_str("\nViolations:\n");
            for v in &p.violations {
                body.push_str(&format!("- {}\n", v));
            }
        }
        Some(CheckDetails::Launch(l)) => {
            body.push_str(&format!("\nSuggestion: {}\n", l.suggestion));
            if l.stderr.is_some() {
                body.push_str("\nServer stderr:\n");
                for line in l.stderr_lines() {
                    body.push_str(&format!("{}\n", line));
                }
            }
        }
        Some(CheckDetails::Security(v)) => {
            body.push_str(&format!("\nLocation: {}\nRecommendation: {}\n", v.location(), v.recommendation));
            if let Some(cwe) = &v.cwe {
                body.push_str(&format!("Reference: {}\n", cwe));
            }
        }
        _ => {}
    }
    body
}

/// Metric key/value pairs carried as `<property>` elements
fn properties(result: &TestResult) -> Vec<(String, String)> {
    let mut props = Vec::new();
    let mut add = |k: &str, v: String| props.push((k.to_string(), v));

    add("severity", result.severity.to_string());
    match &result.details {
        Some(CheckDetails::Performance(m)) => {
            add("requests", m.requests.to_string());
            add("concurrency", m.concurrency.to_string());
            add("rps", format!("{:.2}", m.rps));
            add("mean_ms", format!("{:.2}", m.mean_ms));
            add("median_ms", format!("{:.2}", m.median_ms));
            add("p95_ms", format!("{:.2}", m.p95_ms));
            add("p99_ms", format!("{:.2}", m.p99_ms));
            add("error_rate", format!("{:.4}", m.error_rate));
            if let Some(mem) = m.memory_mb {
                add("memory_mb", format!("{:.1}", mem));
            }
            if let Some(cpu) = m.cpu_pct {
                add("cpu_pct", format!("{:.1}", cpu));
            }
        }
        Some(CheckDetails::Stress(s)) => {
            add("steps", s.steps.len().to_string());
            add("max_users", s.max_users.to_string());
            add(
                "breaking_point",
                s.breaking_point.map_or_else(|| "none".to_string(), |b| b.to_string()),
            );
        }
        Some(CheckDetails::Endurance(e)) => {
            add("requests", e.requests.to_string());
            add("error_rate", format!("{:.4}", e.error_rate));
            add("leading_mean_ms", format!("{:.2}", e.leading_mean_ms));
            add("trailing_mean_ms", format!("{:.2}", e.trailing_mean_ms));
            add("latency_degraded", e.latency_degraded.to_string());
            add("memory_growth", e.memory_growth.to_string());
        }
        Some(CheckDetails::Security(v)) => {
            add("category", v.category.to_string());
            add("file", v.file.clone());
            add("line", v.line.to_string());
            add("rule", v.rule.clone());
        }
        Some(CheckDetails::Protocol(p)) => add("method", p.method.clone()),
        Some(CheckDetails::Launch(l)) => add("stderr_lines", l.stderr_lines().count().to_string()),
        None => {}
    }
    props
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Truncate on a char boundary with ellipsis
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
