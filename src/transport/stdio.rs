//! Stdio transport: the server as a supervised child process
//!
//! One reader task owns the child's stdout and routes each line either to the
//! request waiting on its id or to the unmatched queue. A second task drains
//! stderr into a bounded buffer for launch diagnostics.
//!
//! A raw write that times out still owes one reply. The next unmatched line
//! is charged to it and dropped, so it cannot be taken for the answer to a
//! later request.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::{resolve_command, Exchange, LaunchSpec, Reply, Roundtrip};
use crate::config::HarnessConfig;
use crate::errors::{HarnessError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, RequestId};

/// Most stderr kept for diagnostics
const STDERR_LIMIT: usize = 64 * 1024;

/// Where a stdout line ended up
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Delivered to the request waiting on this id
    Matched,
    /// Queued for whichever caller is waiting next
    Unmatched,
    /// Server-initiated notification or request, dropped
    Notification,
    /// Reply to a request or raw write that already timed out, dropped
    Late,
    Blank,
}

/// Demultiplexes stdout lines by JSON-RPC id
pub(crate) struct Router {
    pending: StdMutex<HashMap<RequestId, oneshot::Sender<Reply>>>,
    abandoned: StdMutex<HashSet<RequestId>>,
    /// Raw writes that timed out before their reply arrived
    overdue_raw: AtomicUsize,
    unmatched: mpsc::UnboundedSender<Reply>,
}

impl Router {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: StdMutex::new(HashMap::new()),
                abandoned: StdMutex::new(HashSet::new()),
                overdue_raw: AtomicUsize::new(0),
                unmatched: tx,
            },
            rx,
        )
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Reply>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_abandoned(&self) -> std::sync::MutexGuard<'_, HashSet<RequestId>> {
        self.abandoned.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn register(&self, id: RequestId) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);
        rx
    }

    pub(crate) fn forget(&self, id: &RequestId) {
        self.lock_pending().remove(id);
    }

    /// Stop waiting for `id`; a reply arriving later is dropped
    pub(crate) fn abandon(&self, id: &RequestId) {
        if self.lock_pending().remove(id).is_some() {
            self.lock_abandoned().insert(id.clone());
        }
    }

    /// A raw write timed out; its reply, if any, is the next unmatched line
    pub(crate) fn raw_overdue(&self) {
        self.overdue_raw.fetch_add(1, Ordering::Relaxed);
    }

    fn settle_overdue_raw(&self) -> bool {
        self.overdue_raw
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Queue a line nobody claimed, unless a timed-out raw write owes it
    ///
    /// Only lines without a usable id can answer a raw write; a reply that
    /// names some other request still reaches the waiter to be flagged.
    fn unclaimed(&self, reply: Reply) -> Routed {
        let anonymous = match &reply {
            Reply::Malformed(_) => true,
            Reply::Json(v) => v.get("id").and_then(RequestId::from_value).is_none(),
        };
        if anonymous && self.settle_overdue_raw() {
            tracing::debug!("Dropping late reply to a raw write: {:?}", reply);
            return Routed::Late;
        }
        let _ = self.unmatched.send(reply);
        Routed::Unmatched
    }

    /// Drop every waiter, so they observe "no response"
    pub(crate) fn close(&self) {
        self.lock_pending().clear();
    }

    pub(crate) fn route(&self, line: &str) -> Routed {
        let line = line.trim();
        if line.is_empty() {
            return Routed::Blank;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!("Non-JSON line from server: {}", line);
                return self.unclaimed(Reply::Malformed(line.to_string()));
            }
        };

        if value.get("method").is_some() {
            tracing::debug!("Dropping server-initiated message: {}", line);
            return Routed::Notification;
        }

        if let Some(id) = value.get("id").and_then(RequestId::from_value) {
            let waiter = self.lock_pending().remove(&id);
            if let Some(tx) = waiter {
                let _ = tx.send(Reply::Json(value));
                return Routed::Matched;
            }
            if self.lock_abandoned().remove(&id) {
                tracing::debug!("Dropping late reply for request {}", id);
                return Routed::Late;
            }
        }

        self.unclaimed(Reply::Json(value))
    }
}

/// Bounded tail of the child's stderr
#[derive(Default)]
struct StderrBuffer {
    text: String,
}

impl StderrBuffer {
    fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        if self.text.len() > STDERR_LIMIT {
            let mut cut = self.text.len() - STDERR_LIMIT;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }
}

/// A running server process
///
/// Owned by the harness for one run and handed to each phase by reference.
pub struct ProcessHandle {
    launch: LaunchSpec,
    pid: Option<u32>,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    router: Arc<Router>,
    unmatched: Mutex<mpsc::UnboundedReceiver<Reply>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    shutdown_grace: Duration,
}

impl ProcessHandle {
    /// Launch the server at `server_path` and wait out the grace window
    pub async fn start(server_path: &Path, config: &HarnessConfig) -> Result<Self> {
        let launch = resolve_command(server_path, &config.launch.args)?;
        let target = server_path.display().to_string();
        tracing::info!("Launching server: {}", launch.display());

        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .envs(&config.launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HarnessError::launch(&target, format!("{}: {}", launch.program, e), None)
            })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::launch(&target, "child stdout is not piped", None))?;
        let stderr_pipe = child.stderr.take();

        let (router, unmatched) = Router::new();
        let router = Arc::new(router);
        let stderr = Arc::new(StdMutex::new(StderrBuffer::default()));

        let reader_router = Arc::clone(&router);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        reader_router.route(&line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!("Server stdout read failed: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Server stdout closed");
            reader_router.close();
        });

        let mut tasks = vec![reader];
        let drain_stderr = stderr_pipe.map(|pipe| {
            let buffer = Arc::clone(&stderr);
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!(target: "mcpcheck::server_stderr", "{}", line);
                    buffer
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push_line(&line);
                }
            })
        });

        tokio::time::sleep(config.launch_grace()).await;

        if let Some(status) = child.try_wait()? {
            if let Some(drain) = drain_stderr {
                let _ = tokio::time::timeout(Duration::from_millis(200), drain).await;
            }
            let captured = stderr.lock().unwrap_or_else(|e| e.into_inner()).text.clone();
            let captured = (!captured.trim().is_empty()).then_some(captured);
            return Err(HarnessError::launch(
                &target,
                format!("process exited with {} during startup", status),
                captured,
            ));
        }
        tasks.extend(drain_stderr);

        tracing::debug!("Server running with pid {:?}", pid);
        Ok(Self {
            launch,
            pid,
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(stdin),
            router,
            unmatched: Mutex::new(unmatched),
            tasks: StdMutex::new(tasks),
            next_id: AtomicU64::new(1),
            shutdown_grace: config.shutdown_grace(),
        })
    }

    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.launch
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| {
            HarnessError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "server stdin is closed",
            ))
        })?;
        tracing::debug!("→ {}", line);
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Wait for the next unmatched line
    async fn next_unmatched(&self) -> Option<Reply> {
        let mut queue = self.unmatched.lock().await;
        queue.recv().await
    }

    /// Drop unmatched lines that arrived while nobody was waiting
    ///
    /// Skipped when another request holds the queue: it is waiting and will
    /// take the next line itself.
    fn discard_unmatched(&self) {
        let Ok(mut queue) = self.unmatched.try_lock() else {
            return;
        };
        while let Ok(stale) = queue.try_recv() {
            tracing::debug!("Discarding unclaimed line: {:?}", stale);
        }
    }

    /// Terminate the server: SIGTERM, poll for the grace period, then kill
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        // Closing stdin lets well-behaved servers exit on their own
        self.stdin.lock().await.take();

        if child.try_wait()?.is_none() {
            send_terminate(&mut child);
            let deadline = Instant::now() + self.shutdown_grace;
            loop {
                if child.try_wait()?.is_some() {
                    break;
                }
                if Instant::now() >= deadline {
                    tracing::warn!("Server did not exit after SIGTERM, killing");
                    child.kill().await?;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }
        self.router.close();
        tracing::debug!("Server shut down");
        Ok(())
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::debug!("SIGTERM failed: {}", e);
        }
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    let _ = child.start_kill();
}

#[async_trait]
impl Exchange for ProcessHandle {
    async fn send(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Roundtrip> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(id.clone(), method, params);
        let line = serde_json::to_string(&request)?;

        self.discard_unmatched();
        let matched = self.router.register(id.clone());
        let started = Instant::now();
        if let Err(e) = self.write_line(&line).await {
            self.router.forget(&id);
            return Err(e);
        }

        let wait = async {
            tokio::select! {
                reply = matched => reply.ok().map(|r| (r, true)),
                reply = self.next_unmatched() => reply.map(|r| (r, false)),
            }
        };
        let reply = tokio::time::timeout(timeout, wait).await.ok().flatten();
        let elapsed = started.elapsed();

        let reply = match reply {
            Some((reply, matched)) => {
                tracing::debug!("← {:?}", reply);
                if !matched {
                    // A correctly-addressed reply may still follow; drop it
                    self.router.abandon(&id);
                }
                Some(reply)
            }
            None => {
                tracing::debug!("No reply to {} ({}) within {:?}", method, id, timeout);
                self.router.abandon(&id);
                None
            }
        };

        Ok(Roundtrip { id, reply, elapsed })
    }

    async fn send_raw(&self, text: &str, timeout: Duration) -> Result<Option<Reply>> {
        self.discard_unmatched();
        self.write_line(text).await?;
        let reply = tokio::time::timeout(timeout, self.next_unmatched())
            .await
            .ok()
            .flatten();
        if reply.is_none() {
            self.router.raw_overdue();
        }
        Ok(reply)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.write_line(&serde_json::to_string(&notification)?).await
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn matched_reply_reaches_waiter() {
        let (router, _rx) = Router::new();
        let waiter = router.register(RequestId::Number(1));
        assert_eq!(
            router.route(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#),
            Routed::Matched
        );
        let reply = waiter.await.unwrap();
        assert_eq!(reply.as_json().unwrap()["id"], 1);
    }

    #[tokio::test]
    async fn wrong_id_goes_to_unmatched() {
        let (router, mut rx) = Router::new();
        let _waiter = router.register(RequestId::Number(1));
        assert_eq!(
            router.route(r#"{"jsonrpc":"2.0","id":99,"result":{}}"#),
            Routed::Unmatched
        );
        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.as_json().unwrap()["id"], 99);
    }

    #[tokio::test]
    async fn non_json_is_malformed() {
        let (router, mut rx) = Router::new();
        assert_eq!(router.route("Server starting..."), Routed::Unmatched);
        assert_eq!(
            rx.recv().await.unwrap(),
            Reply::Malformed("Server starting...".to_string())
        );
    }

    #[test]
    fn notifications_and_blanks_dropped() {
        let (router, _rx) = Router::new();
        assert_eq!(
            router.route(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#),
            Routed::Notification
        );
        assert_eq!(router.route("   "), Routed::Blank);
    }

    #[test]
    fn late_reply_after_abandon_is_dropped() {
        let (router, _rx) = Router::new();
        let _waiter = router.register(RequestId::Number(5));
        router.abandon(&RequestId::Number(5));
        let line = json!({"jsonrpc": "2.0", "id": 5, "result": {}}).to_string();
        assert_eq!(router.route(&line), Routed::Late);
        // A second copy is no longer expected
        assert_eq!(router.route(&line), Routed::Unmatched);
    }

    #[test]
    fn overdue_raw_reply_is_dropped_once() {
        let (router, mut rx) = Router::new();
        router.raw_overdue();
        let parse_error =
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#;
        assert_eq!(router.route(parse_error), Routed::Late);
        assert!(rx.try_recv().is_err());
        // Only one reply was owed
        assert_eq!(router.route(parse_error), Routed::Unmatched);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn overdue_raw_write_does_not_swallow_wrong_id() {
        let (router, mut rx) = Router::new();
        router.raw_overdue();
        assert_eq!(
            router.route(r#"{"jsonrpc":"2.0","id":77,"result":{}}"#),
            Routed::Unmatched
        );
        assert_eq!(rx.try_recv().unwrap().as_json().unwrap()["id"], 77);
        assert_eq!(router.route("garbage"), Routed::Late);
    }

    #[tokio::test]
    async fn overdue_raw_reply_does_not_reach_next_waiter() {
        let (router, mut rx) = Router::new();
        router.raw_overdue();
        let waiter = router.register(RequestId::Number(3));
        router.route(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#);
        router.route(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32602,"message":"Invalid params"}}"#);

        assert!(rx.try_recv().is_err());
        let reply = waiter.await.unwrap();
        assert_eq!(reply.as_json().unwrap()["id"], 3);
    }

    #[test]
    fn abandoning_after_unmatched_reply_clears_pending() {
        let (router, _rx) = Router::new();
        let _waiter = router.register(RequestId::Number(4));
        router.route(r#"{"jsonrpc":"2.0","id":40,"result":{}}"#);
        router.abandon(&RequestId::Number(4));
        assert!(router.lock_pending().is_empty());
        assert_eq!(
            router.route(r#"{"jsonrpc":"2.0","id":4,"result":{}}"#),
            Routed::Late
        );
    }

    #[test]
    fn stderr_buffer_is_bounded() {
        let mut buffer = StderrBuffer::default();
        let line = "x".repeat(1000);
        for _ in 0..100 {
            buffer.push_line(&line);
        }
        assert!(buffer.text.len() <= STDERR_LIMIT);
    }
}
