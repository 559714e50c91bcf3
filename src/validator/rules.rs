//! Compliance check catalogue
//!
//! Every check has a stable identifier used in all report formats.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::results::{Category, TestResult};

/// Compliance check identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckId {
    #[serde(rename = "LAUNCH-001")]
    Launch001,

    #[serde(rename = "PROTO-001")]
    Proto001,
    #[serde(rename = "PROTO-002")]
    Proto002,
    #[serde(rename = "PROTO-003")]
    Proto003,
    #[serde(rename = "PROTO-004")]
    Proto004,

    #[serde(rename = "TOOLS-001")]
    Tools001,
    #[serde(rename = "TOOLS-002")]
    Tools002,
    #[serde(rename = "TOOLS-003")]
    Tools003,

    #[serde(rename = "RES-001")]
    Res001,
    #[serde(rename = "RES-002")]
    Res002,
    #[serde(rename = "RES-003")]
    Res003,

    #[serde(rename = "PROMPT-001")]
    Prompt001,
    #[serde(rename = "PROMPT-002")]
    Prompt002,
    #[serde(rename = "PROMPT-003")]
    Prompt003,

    #[serde(rename = "ERR-001")]
    Err001,
    #[serde(rename = "ERR-002")]
    Err002,
    #[serde(rename = "ERR-003")]
    Err003,
}

impl CheckId {
    /// Checks run by a compliance session, in execution order
    pub const COMPLIANCE: [CheckId; 16] = [
        CheckId::Proto001,
        CheckId::Proto002,
        CheckId::Proto003,
        CheckId::Proto004,
        CheckId::Tools001,
        CheckId::Tools002,
        CheckId::Tools003,
        CheckId::Res001,
        CheckId::Res002,
        CheckId::Res003,
        CheckId::Prompt001,
        CheckId::Prompt002,
        CheckId::Prompt003,
        CheckId::Err001,
        CheckId::Err002,
        CheckId::Err003,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckId::Launch001 => "LAUNCH-001",
            CheckId::Proto001 => "PROTO-001",
            CheckId::Proto002 => "PROTO-002",
            CheckId::Proto003 => "PROTO-003",
            CheckId::Proto004 => "PROTO-004",
            CheckId::Tools001 => "TOOLS-001",
            CheckId::Tools002 => "TOOLS-002",
            CheckId::Tools003 => "TOOLS-003",
            CheckId::Res001 => "RES-001",
            CheckId::Res002 => "RES-002",
            CheckId::Res003 => "RES-003",
            CheckId::Prompt001 => "PROMPT-001",
            CheckId::Prompt002 => "PROMPT-002",
            CheckId::Prompt003 => "PROMPT-003",
            CheckId::Err001 => "ERR-001",
            CheckId::Err002 => "ERR-002",
            CheckId::Err003 => "ERR-003",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckId::Launch001 => "Server launch",
            CheckId::Proto001 => "Initialize handshake",
            CheckId::Proto002 => "Initialize result schema",
            CheckId::Proto003 => "Protocol version supported",
            CheckId::Proto004 => "Server capabilities",
            CheckId::Tools001 => "tools/list",
            CheckId::Tools002 => "tools/call",
            CheckId::Tools003 => "Tool functionality",
            CheckId::Res001 => "resources/list",
            CheckId::Res002 => "resources/read",
            CheckId::Res003 => "Resource functionality",
            CheckId::Prompt001 => "prompts/list",
            CheckId::Prompt002 => "prompts/get",
            CheckId::Prompt003 => "Prompt functionality",
            CheckId::Err001 => "Invalid JSON rejected",
            CheckId::Err002 => "Unknown method rejected",
            CheckId::Err003 => "Missing parameter rejected",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CheckId::Launch001 => "Server process must start and stay alive through the grace window",
            CheckId::Proto001 => "Server must answer initialize with a valid JSON-RPC 2.0 result",
            CheckId::Proto002 => "Initialize result must carry protocolVersion, capabilities and serverInfo",
            CheckId::Proto003 => "Negotiated protocol version must be one the harness knows",
            CheckId::Proto004 => "Capabilities must be an object naming the supported features",
            CheckId::Tools001 => "tools/list must return a schema-valid tool list",
            CheckId::Tools002 => "tools/call on the first tool must return a valid envelope",
            CheckId::Tools003 => "Listed tools must be callable",
            CheckId::Res001 => "resources/list must return a schema-valid resource list",
            CheckId::Res002 => "resources/read on the first resource must return a valid envelope",
            CheckId::Res003 => "Listed resources must be readable",
            CheckId::Prompt001 => "prompts/list must return a schema-valid prompt list",
            CheckId::Prompt002 => "prompts/get on the first prompt must return a valid envelope",
            CheckId::Prompt003 => "Listed prompts must be retrievable",
            CheckId::Err001 => "Unparseable input must produce a JSON-RPC error",
            CheckId::Err002 => "An unknown method must produce a JSON-RPC error",
            CheckId::Err003 => "A request missing required params must produce a JSON-RPC error",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            CheckId::Launch001 => Category::Launch,
            CheckId::Proto001 | CheckId::Proto002 | CheckId::Proto003 | CheckId::Proto004 => {
                Category::Protocol
            }
            CheckId::Tools001 | CheckId::Tools002 | CheckId::Tools003 => Category::Tools,
            CheckId::Res001 | CheckId::Res002 | CheckId::Res003 => Category::Resources,
            CheckId::Prompt001 | CheckId::Prompt002 | CheckId::Prompt003 => Category::Prompts,
            CheckId::Err001 | CheckId::Err002 | CheckId::Err003 => Category::ErrorHandling,
        }
    }

    pub fn pass(self, message: impl Into<String>) -> TestResult {
        TestResult::pass(self.as_str(), self.name(), self.category(), message)
    }

    pub fn fail(self, message: impl Into<String>) -> TestResult {
        TestResult::fail(self.as_str(), self.name(), self.category(), message)
    }

    pub fn error(self, message: impl Into<String>) -> TestResult {
        TestResult::error(self.as_str(), self.name(), self.category(), message)
    }

    pub fn skip(self, reason: impl Into<String>) -> TestResult {
        TestResult::skip(self.as_str(), self.name(), self.category(), reason)
    }

    pub fn tolerated(self, message: impl Into<String>) -> TestResult {
        TestResult::tolerated(self.as_str(), self.name(), self.category(), message)
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
