//! HTML Report Generator
//!
//! A single self-contained page:
//! - Outcome summary cards
//! - Outcome distribution and latency charts drawn by an inline script
//! - One table per result category

use serde_json::json;

use crate::results::{CheckDetails, TestResult, TestSuite};

/// Generate an HTML report from a finished suite
pub fn generate_html(suite: &TestSuite) -> String {
    let summary = suite.summary();
    let chart_data = chart_data(suite);
    let sections = generate_sections_html(suite);
    let verdict = if summary.success() { "passed" } else { "failed" };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>mcpcheck report - {server}</title>
    <style>
        :root {{
            --bg-primary: #0d1117;
            --bg-secondary: #161b22;
            --text-primary: #c9d1d9;
            --text-secondary: #8b949e;
            --border-color: #30363d;
            --pass: #3fb950;
            --fail: #f85149;
            --error: #f0883e;
            --skip: #8b949e;
            --tolerated: #d29922;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
            padding: 2rem;
        }}
        .container {{ max-width: 1200px; margin: 0 auto; }}
        header {{ border-bottom: 1px solid var(--border-color); padding-bottom: 1.5rem; margin-bottom: 2rem; }}
        h1 {{ font-size: 1.75rem; font-weight: 600; }}
        h2 {{ font-size: 1.25rem; margin: 2rem 0 1rem; text-transform: capitalize; }}
        .meta {{ color: var(--text-secondary); font-size: 0.875rem; }}
        .verdict.passed {{ color: var(--pass); }}
        .verdict.failed {{ color: var(--fail); }}
        .summary-grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 1rem; }}
        .summary-card {{ background: var(--bg-secondary); border: 1px solid var(--border-color); border-radius: 6px; padding: 1rem; }}
        .summary-card .label {{ font-size: 0.75rem; text-transform: uppercase; color: var(--text-secondary); }}
        .summary-card .value {{ font-size: 2rem; font-weight: 600; }}
        .charts {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); gap: 1rem; margin-top: 2rem; }}
        .chart-container {{ background: var(--bg-secondary); border: 1px solid var(--border-color); border-radius: 6px; padding: 1rem; }}
        .chart-title {{ font-weight: 600; margin-bottom: 0.5rem; }}
        table {{ width: 100%; border-collapse: collapse; background: var(--bg-secondary); }}
        th, td {{ text-align: left; padding: 0.5rem 0.75rem; border-bottom: 1px solid var(--border-color); vertical-align: top; }}
        th {{ color: var(--text-secondary); font-size: 0.75rem; text-transform: uppercase; }}
        td.message {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; font-size: 0.8rem; word-break: break-word; }}
        .badge {{ padding: 0.1rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; text-transform: uppercase; color: #0d1117; }}
        .badge.pass {{ background: var(--pass); }}
        .badge.fail {{ background: var(--fail); }}
        .badge.error {{ background: var(--error); }}
        .badge.skip {{ background: var(--skip); }}
        .badge.tolerated {{ background: var(--tolerated); }}
        footer {{ margin-top: 3rem; color: var(--text-secondary); font-size: 0.75rem; }}
    </style>
</head>
<body>
<div class="container">
    <header>
        <h1>mcpcheck report: <span class="verdict {verdict}">{verdict}</span></h1>
        <div class="meta">Server: {server} &middot; Started: {timestamp} &middot; Duration: {duration_ms}ms</div>
    </header>

    <div class="summary-grid">
        <div class="summary-card"><div class="label">Total</div><div class="value">{total}</div></div>
        <div class="summary-card"><div class="label">Passed</div><div class="value">{passed}</div></div>
        <div class="summary-card"><div class="label">Failed</div><div class="value">{failed}</div></div>
        <div class="summary-card"><div class="label">Errors</div><div class="value">{errors}</div></div>
        <div class="summary-card"><div class="label">Skipped</div><div class="value">{skipped}</div></div>
        <div class="summary-card"><div class="label">Tolerated</div><div class="value">{tolerated}</div></div>
    </div>

    <div class="charts">
        <div class="chart-container">
            <div class="chart-title">Outcomes</div>
            <canvas id="outcome-chart" width="480" height="220"></canvas>
        </div>
        <div class="chart-container">
            <div class="chart-title">Latency (ms)</div>
            <canvas id="latency-chart" width="480" height="220"></canvas>
        </div>
    </div>

{sections}
    <footer>Generated by mcpcheck {version}</footer>
</div>
<script id="report-data" type="application/json">{chart_data}</script>
<script>
(function () {{
    var data = JSON.parse(document.getElementById('report-data').textContent);
    var css = getComputedStyle(document.documentElement);

    function bars(id, labels, values, colors) {{
        var canvas = document.getElementById(id);
        if (!canvas || !canvas.getContext) return;
        var ctx = canvas.getContext('2d');
        var w = canvas.width, h = canvas.height, pad = 28;
        ctx.clearRect(0, 0, w, h);
        if (!values.length) {{
            ctx.fillStyle = css.getPropertyValue('--text-secondary');
            ctx.fillText('no data', w / 2 - 20, h / 2);
            return;
        }}
        var max = Math.max.apply(null, values.concat([1]));
        var slot = (w - pad) / values.length;
        ctx.font = '11px sans-serif';
        values.forEach(function (v, i) {{
            var bh = (h - 2 * pad) * v / max;
            var x = pad + i * slot + slot * 0.15;
            ctx.fillStyle = colors[i % colors.length];
            ctx.fillRect(x, h - pad - bh, slot * 0.7, bh);
            ctx.fillStyle = css.getPropertyValue('--text-primary');
            ctx.fillText(String(Math.round(v * 10) / 10), x, h - pad - bh - 4);
            ctx.fillStyle = css.getPropertyValue('--text-secondary');
            ctx.fillText(labels[i], x, h - 8);
        }});
    }}

    var o = data.outcomes;
    bars('outcome-chart', o.labels, o.values, o.labels.map(function (l) {{
        return css.getPropertyValue('--' + l).trim();
    }}));
    var l = data.latency;
    bars('latency-chart', l.labels, l.values, ['#58a6ff', '#a371f7', '#f0883e', '#f85149']);
}})();
</script>
</body>
</html>
"##,
        server = html_escape(&suite.server),
        verdict = verdict,
        timestamp = suite.started_at.to_rfc3339(),
        duration_ms = suite.duration.as_millis(),
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors,
        skipped = summary.skipped,
        tolerated = summary.tolerated,
        sections = sections,
        version = env!("CARGO_PKG_VERSION"),
        chart_data = chart_data,
    )
}

/// JSON embedded for the chart script; `</` is escaped so it cannot close the tag
fn chart_data(suite: &TestSuite) -> String {
    let summary = suite.summary();
    let outcomes = [
        ("pass", summary.passed),
        ("fail", summary.failed),
        ("error", summary.errors),
        ("skip", summary.skipped),
        ("tolerated", summary.tolerated),
    ];

    let (labels, values): (Vec<&str>, Vec<f64>) = suite
        .results
        .iter()
        .find_map(|r| match &r.details {
            Some(CheckDetails::Performance(m)) => Some(m),
            _ => None,
        })
        .map(|m| {
            (
                vec!["mean", "p50", "p95", "p99"],
                vec![m.mean_ms, m.median_ms, m.p95_ms, m.p99_ms],
            )
        })
        .unwrap_or_default();

    json!({
        "outcomes": {
            "labels": outcomes.iter().map(|(l, _)| *l).collect::<Vec<_>>(),
            "values": outcomes.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        },
        "latency": {"labels": labels, "values": values},
    })
    .to_string()
    .replace("</", "<\\/")
}

fn generate_sections_html(suite: &TestSuite) -> String {
    let mut html = String::new();
    for (category, results) in suite.by_category() {
        html.push_str(&format!(
            "    <h2>{}</h2>\n    <table>\n        <tr><th>Id</th><th>Check</th><th>Outcome</th><th>Severity</th><th>Time</th><th>Message</th></tr>\n",
            category.as_str().replace('_', " ")
        ));
        for result in results {
            html.push_str(&row_html(result));
        }
        html.push_str("    </table>\n");
    }
    html
}

fn row_html(result: &TestResult) -> String {
    let outcome = result.outcome.as_str();
    let mut message = html_escape(&result.message);
    match &result.details {
        Some(CheckDetails::Protocol(p)) if !p.violations.is_empty() => {
            message.push_str("<br>");
            message.push_str(&html_escape(&p.violations.join("; ")));
        }
        Some(CheckDetails::Launch(l)) => {
            message.push_str("<br>");
            message.push_str(&html_escape(&l.suggestion));
            if let Some(stderr) = &l.stderr {
                message.push_str(&format!("<pre>{}</pre>", html_escape(stderr)));
            }
        }
        _ => {}
    }
    format!(
        "        <tr><td>{}</td><td>{}</td><td><span class=\"badge {}\">{}</span></td><td>{}</td><td>{}ms</td><td class=\"message\">{}</td></tr>\n",
        html_escape(&result.id),
        html_escape(&result.name),
        outcome,
        outcome,
        result.severity,
        result.duration.as_millis(),
        message
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::PerformanceMetrics;
    use crate::results::{Category, Severity};

    fn suite() -> TestSuite {
        let mut suite = TestSuite::new("srv/<main>.py");
        suite.push(TestResult::pass("PROTO-001", "Initialize handshake", Category::Protocol, "ok"));
        suite.push(
            TestResult::fail("SEC-1", "Command injection", Category::Security, "os.system(\"x\" + y)")
                .with_severity(Severity::Critical),
        );
        suite.push(
            TestResult::pass("PERF-001", "Load test", Category::Performance, "ok").with_details(
                CheckDetails::Performance(PerformanceMetrics {
                    p95_ms: 42.0,
                    ..Default::default()
                }),
            ),
        );
        suite
    }

    #[test]
    fn self_contained_page() {
        let html = generate_html(&suite());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("<canvas id=\"latency-chart\""));
        assert!(html.contains("getContext('2d')"));
        assert!(!html.contains("src=\"http"));
        assert!(html.contains("verdict failed"));
    }

    #[test]
    fn escapes_user_text() {
        let html = generate_html(&suite());
        assert!(html.contains("srv/&lt;main&gt;.py"));
        assert!(html.contains("os.system(&quot;x&quot; + y)"));
    }

    #[test]
    fn embeds_latency_data() {
        let data = chart_data(&suite());
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["latency"]["values"][2], 42.0);
        assert_eq!(value["outcomes"]["values"][1], 1);
    }

    #[test]
    fn html_escape_works() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
    }
}
