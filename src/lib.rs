//! mcpcheck - MCP server compliance, load and security testing harness
//!
//! Launches a Model Context Protocol server over stdio, checks it against the
//! protocol, drives synthetic load through it and scans its source for
//! vulnerability patterns. Every phase produces `TestResult`s collected into
//! one `TestSuite`, rendered as text, JSON, HTML or JUnit XML.
//!
//! # Modules
//!
//! - `transport` - Server process launch and the JSON-RPC `Exchange`
//! - `protocol` - JSON-RPC envelopes, MCP types and session state
//! - `validator` - Protocol compliance checks
//! - `load` - Load, stress and endurance runs
//! - `scanner` - Static vulnerability scanning
//! - `reporter` - Report rendering
//!
//! # Example
//!
//! ```rust,ignore
//! use mcpcheck::config::HarnessConfig;
//! use mcpcheck::transport::ProcessHandle;
//!
//! let config = HarnessConfig::default();
//! let server = ProcessHandle::start("server.py".as_ref(), &config).await?;
//! let run = mcpcheck::validator::run_compliance(&server, &config).await;
//! assert!(run.session.is_initialized());
//! server.shutdown().await?;
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod load;
pub mod protocol;
pub mod reporter;
pub mod results;
pub mod scanner;
pub mod transport;
pub mod ui;
pub mod validator;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use errors::{HarnessError, Result};
pub use results::{Outcome, Severity, TestResult, TestSuite};
pub use scanner::{ScanEngine, ScanResults};
pub use transport::{Exchange, ProcessHandle};
