//! Reporter - Output formatting and reporting
//!
//! Every format renders the same `TestSuite`; the terminal summary is the
//! only one that prints directly.

pub mod html;
pub mod json;
pub mod junit;
pub mod terminal;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::results::{Summary, TestResult, TestSuite};
use crate::ui::OutputMode;

/// Report output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Html,
    Junit,
}

impl ReportFormat {
    /// Format implied by a file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "html" | "htm" => Some(ReportFormat::Html),
            "xml" => Some(ReportFormat::Junit),
            "txt" | "log" => Some(ReportFormat::Text),
            _ => None,
        }
    }

    /// Explicit format, else the output file's extension, else text
    pub fn resolve(explicit: Option<Self>, output: Option<&Path>) -> Self {
        explicit
            .or_else(|| output.and_then(Self::from_extension))
            .unwrap_or_default()
    }
}

/// Report envelope shared by the machine-readable formats
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub server: &'a str,
    pub duration_ms: u64,
    pub summary: Summary,
    pub results: &'a [TestResult],
}

impl<'a> Report<'a> {
    pub fn new(suite: &'a TestSuite) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: suite.started_at.to_rfc3339(),
            server: &suite.server,
            duration_ms: suite.duration.as_millis() as u64,
            summary: suite.summary(),
            results: &suite.results,
        }
    }
}

/// Render `suite` as a string in `format`
pub fn render(suite: &TestSuite, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Text => terminal::render_plain(suite),
        ReportFormat::Json => json::generate_json(suite)?,
        ReportFormat::Html => html::generate_html(suite),
        ReportFormat::Junit => junit::generate_junit(suite),
    })
}

/// Write the report to `output`, or to stdout when no file is given
pub fn emit(
    suite: &TestSuite,
    format: ReportFormat,
    output: Option<&Path>,
    mode: OutputMode,
) -> Result<()> {
    match output {
        Some(path) => {
            let content = render(suite, format)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None if format == ReportFormat::Text => terminal::print_summary(suite, mode)?,
        None => println!("{}", render(suite, format)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Category;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ReportFormat::resolve(None, Some(Path::new("out/report.JSON"))),
            ReportFormat::Json
        );
        assert_eq!(
            ReportFormat::resolve(None, Some(Path::new("junit.xml"))),
            ReportFormat::Junit
        );
        assert_eq!(
            ReportFormat::resolve(Some(ReportFormat::Html), Some(Path::new("x.json"))),
            ReportFormat::Html
        );
        assert_eq!(ReportFormat::resolve(None, Some(Path::new("report"))), ReportFormat::Text);
        assert_eq!(ReportFormat::resolve(None, None), ReportFormat::Text);
    }

    #[test]
    fn emit_writes_file_in_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/result.json");
        let mut suite = TestSuite::new("server.py");
        suite.push(TestResult::pass("PROTO-001", "Initialize handshake", Category::Protocol, "ok"));

        emit(&suite, ReportFormat::Json, Some(&path), OutputMode::Plain).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("PROTO-001"));
    }
}
