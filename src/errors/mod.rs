//! Error taxonomy with miette diagnostics
//!
//! Only `Launch` is fatal to a run. Every other variant is caught at a check
//! boundary and turned into a recorded result.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::protocol::StateTransitionError;

/// Main error type for mcpcheck
#[derive(Error, Debug, Diagnostic)]
pub enum HarnessError {
    /// Server could not be started, or exited during the grace window
    #[error("Failed to launch server '{target}': {message}{}", stderr_hint(.stderr))]
    #[diagnostic(code(mcpcheck::launch), help("{suggestion}"))]
    Launch {
        target: String,
        message: String,
        suggestion: String,
        /// Captured stderr of the child, if it produced any
        stderr: Option<String>,
    },

    /// Malformed or missing JSON-RPC envelope fields
    #[error("Protocol violation: {0}")]
    #[diagnostic(code(mcpcheck::protocol))]
    ProtocolViolation(String),

    /// No response within the configured bound
    #[error("No response to '{method}' within {}ms", timeout.as_millis())]
    #[diagnostic(
        code(mcpcheck::timeout),
        help("Increase the timeout with --timeout or check the server's stderr output")
    )]
    Timeout { method: String, timeout: Duration },

    /// A source file could not be read or parsed during static scanning
    #[error("Cannot scan {path}: {message}")]
    #[diagnostic(code(mcpcheck::scan))]
    Scan { path: String, message: String },

    /// Invalid configuration file or flag combination
    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(mcpcheck::config),
        help("Check .mcpcheck.toml or the path passed with --config")
    )]
    Config(String),

    /// Transport level I/O failure (broken pipe, closed stdout)
    #[error("I/O error: {0}")]
    #[diagnostic(code(mcpcheck::io))]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(mcpcheck::json))]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Create a launch error with a suggestion derived from the failure text
    pub fn launch(
        target: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        let message = message.into();
        let suggestion = Self::launch_suggestion(&message, stderr.as_deref());
        Self::Launch {
            target: target.into(),
            message,
            suggestion,
            stderr,
        }
    }

    pub fn timeout(method: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            method: method.into(),
            timeout,
        }
    }

    pub fn scan(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error ends the whole run rather than a single check
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::Launch { .. })
    }

    fn launch_suggestion(message: &str, stderr: Option<&str>) -> String {
        let lower = message.to_lowercase();
        if lower.contains("no entry file") {
            "Pass the server's entry file directly, or a directory containing \
             server.py, main.py, index.js or dist/index.js"
                .to_string()
        } else if lower.contains("not found") || lower.contains("no such file") {
            "The interpreter or executable was not found. Check that python3/node \
             is installed and on PATH"
                .to_string()
        } else if lower.contains("permission") {
            "Permission denied. On Unix: chmod +x <server-path>".to_string()
        } else if stderr.is_some_and(|s| !s.trim().is_empty()) {
            "The server exited during startup; the stderr it wrote is attached to the launch result"
                .to_string()
        } else {
            "Run the server by hand to confirm it starts and reads JSON-RPC from stdin".to_string()
        }
    }
}

/// Last non-empty stderr line, appended to the launch message
fn stderr_hint(stderr: &Option<String>) -> String {
    stderr
        .as_deref()
        .and_then(|s| s.lines().rev().find(|l| !l.trim().is_empty()))
        .map(|line| format!(" (stderr: {})", line.trim()))
        .unwrap_or_default()
}

impl From<StateTransitionError> for HarnessError {
    fn from(e: StateTransitionError) -> Self {
        HarnessError::ProtocolViolation(e.to_string())
    }
}

/// Result alias used across the library
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
