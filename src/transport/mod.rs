//! Transport layer for talking to the server under test
//!
//! Provides:
//! - `Exchange`, the request/response seam every phase drives
//! - `stdio::ProcessHandle`, the child-process implementation
//! - `mock::MockExchange`, a scripted in-memory implementation for tests
//! - launcher heuristics that turn a server path into a command line

pub mod mock;
pub mod stdio;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{HarnessError, Result};
use crate::protocol::RequestId;

pub use mock::MockExchange;
pub use stdio::ProcessHandle;

/// One line received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The line parsed as JSON
    Json(Value),
    /// The line was not JSON; carried verbatim
    Malformed(String),
}

impl Reply {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Reply::Json(v) => Some(v),
            Reply::Malformed(_) => None,
        }
    }
}

/// A completed request: the id that was used and what came back
#[derive(Debug, Clone)]
pub struct Roundtrip {
    pub id: RequestId,
    /// `None` when nothing arrived before the timeout
    pub reply: Option<Reply>,
    pub elapsed: Duration,
}

/// Request/response channel to a server
///
/// Methods take `&self` so concurrent load workers can share one server.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Send a request with a fresh id and wait up to `timeout` for its reply
    async fn send(&self, method: &str, params: Option<Value>, timeout: Duration)
        -> Result<Roundtrip>;

    /// Write `text` verbatim as one line and wait for the next unsolicited reply
    async fn send_raw(&self, text: &str, timeout: Duration) -> Result<Option<Reply>>;

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// OS process id of the server, if it is a real process
    fn pid(&self) -> Option<u32>;
}

/// Entry files tried, in order, when the server path is a directory
pub const ENTRY_CANDIDATES: &[&str] = &[
    "server.py",
    "main.py",
    "__main__.py",
    "index.js",
    "server.js",
    "main.js",
    "dist/index.js",
    "index.ts",
    "server.ts",
    "src/index.ts",
];

/// Command line resolved from a server path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub entry: PathBuf,
}

impl LaunchSpec {
    /// Human-readable command line for logs and reports
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Find the file to run for `server_path`
pub fn resolve_entry(server_path: &Path) -> Option<PathBuf> {
    if server_path.is_file() {
        return Some(server_path.to_path_buf());
    }
    if server_path.is_dir() {
        return ENTRY_CANDIDATES
            .iter()
            .map(|candidate| server_path.join(candidate))
            .find(|p| p.is_file());
    }
    None
}

/// Pick an interpreter from the entry file's extension
pub fn resolve_command(server_path: &Path, extra_args: &[String]) -> Result<LaunchSpec> {
    let entry = resolve_entry(server_path).ok_or_else(|| {
        let message = if server_path.exists() {
            format!("no entry file found in {}", server_path.display())
        } else {
            format!("{} does not exist (no such file or directory)", server_path.display())
        };
        HarnessError::launch(server_path.display().to_string(), message, None)
    })?;

    let entry_str = entry.display().to_string();
    let extension = entry
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let (program, mut args): (String, Vec<String>) = match extension.as_deref() {
        Some("py") => ("python3".into(), vec![entry_str]),
        Some("js") | Some("mjs") | Some("cjs") => ("node".into(), vec![entry_str]),
        Some("ts") => ("npx".into(), vec!["tsx".into(), entry_str]),
        Some("sh") => ("sh".into(), vec![entry_str]),
        _ => (entry_str, Vec::new()),
    };
    args.extend(extra_args.iter().cloned());

    Ok(LaunchSpec {
        program,
        args,
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn interpreter_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let py = touch(dir.path(), "srv.py");
        let js = touch(dir.path(), "srv.mjs");
        let ts = touch(dir.path(), "srv.ts");
        let sh = touch(dir.path(), "srv.sh");

        assert_eq!(resolve_command(&py, &[]).unwrap().program, "python3");
        assert_eq!(resolve_command(&js, &[]).unwrap().program, "node");
        let ts_spec = resolve_command(&ts, &[]).unwrap();
        assert_eq!(ts_spec.program, "npx");
        assert_eq!(ts_spec.args[0], "tsx");
        assert_eq!(resolve_command(&sh, &[]).unwrap().program, "sh");
    }

    #[test]
    fn unknown_extension_runs_directly() {
        let dir = tempfile::tempdir().unwrap();
        let bin = touch(dir.path(), "my-server");
        let spec = resolve_command(&bin, &["--stdio".to_string()]).unwrap();
        assert_eq!(spec.program, bin.display().to_string());
        assert_eq!(spec.args, vec!["--stdio"]);
    }

    #[test]
    fn directory_search_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "dist/index.js");
        touch(dir.path(), "main.py");
        let entry = resolve_entry(dir.path()).unwrap();
        assert!(entry.ends_with("main.py"));
    }

    #[test]
    fn nested_candidate_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/index.ts");
        let spec = resolve_command(dir.path(), &[]).unwrap();
        assert!(spec.entry.ends_with("src/index.ts"));
        assert!(spec.display().starts_with("npx tsx"));
    }

    #[test]
    fn empty_directory_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_command(dir.path(), &[]).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("no entry file"));
    }

    #[test]
    fn missing_path_is_launch_error() {
        let err = resolve_command(Path::new("/no/such/server.py"), &[]).unwrap_err();
        assert!(err.is_fatal());
    }
}
