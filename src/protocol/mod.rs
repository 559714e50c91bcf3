//! Protocol layer for MCP communication
//!
//! This module provides:
//! - JSON-RPC 2.0 message types and envelope validation
//! - MCP-specific message types (initialize, tools, resources, prompts)
//! - Fixed result schemas used by the compliance checks
//! - The compliance session state machine

pub mod jsonrpc;
pub mod mcp;
pub mod schema;
pub mod state;

// Re-export commonly used types
pub use jsonrpc::{
    validate_envelope, EnvelopeViolation, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    RequestId, ResponseBody,
};
pub use mcp::{Implementation, ServerCapabilities};
pub use schema::{ResultKind, ResultSchemas};
pub use state::{Feature, Session, SessionState, StateTransitionError};
