//! Protocol Validator - MCP protocol compliance checking
//!
//! Drives the handshake, the tools/resources/prompts groups and the
//! error-handling checks over an `Exchange`, producing one `TestResult` per
//! catalogue entry.

pub mod arguments;
mod engine;
pub mod rules;

pub use engine::ComplianceValidator;
pub use rules::CheckId;

use crate::config::HarnessConfig;
use crate::protocol::Session;
use crate::results::TestResult;
use crate::transport::Exchange;

/// Results of driving one session, plus the session it negotiated
#[derive(Debug)]
pub struct SessionRun {
    pub results: Vec<TestResult>,
    pub session: Session,
}

impl SessionRun {
    /// Why the server cannot be driven further, if the handshake failed
    pub fn handshake_failure(&self) -> Option<String> {
        if self.session.is_initialized() {
            return None;
        }
        let reason = self
            .results
            .iter()
            .find(|r| r.outcome.is_failure())
            .map(|r| format!("{}: {}", r.id, r.message))
            .unwrap_or_else(|| "initialize handshake did not complete".to_string());
        Some(reason)
    }
}

/// Run a full compliance session
pub async fn run_compliance(exchange: &dyn Exchange, config: &HarnessConfig) -> SessionRun {
    let mut validator = ComplianceValidator::new(config);
    let results = validator.run(exchange).await;
    SessionRun {
        results,
        session: validator.into_session(),
    }
}

/// Only the initialize handshake, for runs that skip the compliance checks
pub async fn initialize(exchange: &dyn Exchange, config: &HarnessConfig) -> SessionRun {
    let mut validator = ComplianceValidator::new(config);
    let results = validator.initialize(exchange).await;
    SessionRun {
        results,
        session: validator.into_session(),
    }
}
