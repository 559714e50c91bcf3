//! Mock exchange for testing
//!
//! Provides a scripted implementation of the `Exchange` trait so validator,
//! load and orchestration code can be tested without spawning a process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::{Exchange, Reply, Roundtrip};
use crate::errors::Result;
use crate::protocol::jsonrpc::error_codes;
use crate::protocol::mcp::{methods, LATEST_PROTOCOL_VERSION};
use crate::protocol::RequestId;

/// What the mock server saw
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Option<Value>,
    /// Text written through `send_raw`
    pub raw: Option<String>,
}

/// Decides the reply for one request; `None` simulates silence
pub type Handler = dyn Fn(&MockRequest) -> Option<Reply> + Send + Sync;

/// Successful reply for `id`
pub fn result_reply(id: &RequestId, result: Value) -> Reply {
    Reply::Json(json!({"jsonrpc": "2.0", "id": id.to_value(), "result": result}))
}

/// Error reply for `id`
pub fn error_reply(id: &RequestId, code: i64, message: &str) -> Reply {
    Reply::Json(json!({
        "jsonrpc": "2.0",
        "id": id.to_value(),
        "error": {"code": code, "message": message}
    }))
}

/// Scripted exchange
#[derive(Clone)]
pub struct MockExchange {
    handler: Arc<Handler>,
    overrides: Arc<Mutex<HashMap<String, Arc<Handler>>>>,
    latency: Duration,
    sent: Arc<Mutex<Vec<MockRequest>>>,
    next_id: Arc<AtomicU64>,
}

impl MockExchange {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&MockRequest) -> Option<Reply> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            overrides: Arc::new(Mutex::new(HashMap::new())),
            latency: Duration::ZERO,
            sent: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// A server that answers every MCP method correctly
    ///
    /// Advertises tools, resources and prompts with one item each.
    pub fn well_behaved() -> Self {
        Self::new(well_behaved_reply)
    }

    /// A server that never answers
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    /// Replace the reply for one method (`""` targets `send_raw`)
    pub fn with_method<F>(self, method: &str, handler: F) -> Self
    where
        F: Fn(&MockRequest) -> Option<Reply> + Send + Sync + 'static,
    {
        self.overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(method.to_string(), Arc::new(handler));
        self
    }

    /// Delay every reply by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Everything sent so far, in order
    pub fn sent(&self) -> Vec<MockRequest> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Methods of every request and notification sent so far
    pub fn sent_methods(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.method).collect()
    }

    fn dispatch(&self, request: &MockRequest) -> Option<Reply> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let handler = self
            .overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&request.method)
            .cloned();
        match handler {
            Some(handler) => handler(request),
            None => (self.handler)(request),
        }
    }

    async fn respond(&self, request: MockRequest, timeout: Duration) -> Option<Reply> {
        let reply = self.dispatch(&request);
        match reply {
            Some(reply) if self.latency < timeout => {
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                Some(reply)
            }
            // Silence costs the caller the whole timeout, as with a real server
            _ => {
                tokio::time::sleep(timeout).await;
                None
            }
        }
    }
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::well_behaved()
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn send(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Roundtrip> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let started = Instant::now();
        let request = MockRequest {
            id: Some(id.clone()),
            method: method.to_string(),
            params,
            raw: None,
        };
        let reply = self.respond(request, timeout).await;
        Ok(Roundtrip {
            id,
            reply,
            elapsed: started.elapsed(),
        })
    }

    async fn send_raw(&self, text: &str, timeout: Duration) -> Result<Option<Reply>> {
        let request = MockRequest {
            id: None,
            method: String::new(),
            params: None,
            raw: Some(text.to_string()),
        };
        Ok(self.respond(request, timeout).await)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockRequest {
                id: None,
                method: method.to_string(),
                params,
                raw: None,
            });
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

fn well_behaved_reply(request: &MockRequest) -> Option<Reply> {
    let Some(id) = &request.id else {
        // Raw text is never valid JSON-RPC here
        return Some(Reply::Json(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": error_codes::PARSE_ERROR, "message": "Parse error"}
        })));
    };

    let params = request.params.as_ref();
    let result = match request.method.as_str() {
        methods::INITIALIZE => json!({
            "protocolVersion": LATEST_PROTOCOL_VERSION,
            "capabilities": {"tools": {}, "resources": {}, "prompts": {}},
            "serverInfo": {"name": "mock-server", "version": "1.0.0"}
        }),
        methods::TOOLS_LIST => json!({"tools": [{
            "name": "echo",
            "description": "Echo text back",
            "inputSchema": {
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }
        }]}),
        methods::TOOLS_CALL => {
            let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
                return Some(error_reply(id, error_codes::INVALID_PARAMS, "missing tool name"));
            };
            json!({"content": [{"type": "text", "text": format!("called {}", name)}]})
        }
        methods::RESOURCES_LIST => json!({"resources": [{
            "uri": "file:///readme.txt",
            "name": "readme",
            "mimeType": "text/plain"
        }]}),
        methods::RESOURCES_READ => {
            let Some(uri) = params.and_then(|p| p.get("uri")).and_then(Value::as_str) else {
                return Some(error_reply(id, error_codes::INVALID_PARAMS, "missing uri"));
            };
            json!({"contents": [{"uri": uri, "text": "hello"}]})
        }
        methods::PROMPTS_LIST => json!({"prompts": [{
            "name": "greet",
            "arguments": [{"name": "who", "required": true}]
        }]}),
        methods::PROMPTS_GET => json!({"messages": [
            {"role": "user", "content": {"type": "text", "text": "hi"}}
        ]}),
        other => {
            return Some(error_reply(
                id,
                error_codes::METHOD_NOT_FOUND,
                &format!("Method not found: {}", other),
            ))
        }
    };
    Some(result_reply(id, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn well_behaved_answers_with_matching_id() {
        let mock = MockExchange::well_behaved();
        let rt = mock
            .send(methods::TOOLS_LIST, None, Duration::from_secs(1))
            .await
            .unwrap();
        let reply = rt.reply.unwrap();
        let v = reply.as_json().unwrap();
        assert_eq!(v["id"], rt.id.to_value());
        assert_eq!(v["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn unknown_method_is_error() {
        let mock = MockExchange::well_behaved();
        let rt = mock
            .send("no/such", None, Duration::from_secs(1))
            .await
            .unwrap();
        let reply = rt.reply.unwrap();
        assert_eq!(reply.as_json().unwrap()["error"]["code"], -32601);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_waits_out_the_timeout() {
        let mock = MockExchange::silent();
        let started = Instant::now();
        let rt = mock
            .send(methods::INITIALIZE, None, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(rt.reply.is_none());
        assert!(rt.elapsed >= Duration::from_secs(3));
        assert!(started.elapsed() >= Duration::from_secs(3));

        let raw = mock.send_raw("{oops", Duration::from_secs(2)).await.unwrap();
        assert!(raw.is_none());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn override_replaces_one_method() {
        let mock = MockExchange::well_behaved()
            .with_method(methods::TOOLS_LIST, |r| {
                r.id.as_ref().map(|id| result_reply(id, json!({"tools": []})))
            });
        let rt = mock
            .send(methods::TOOLS_LIST, None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(rt.reply.unwrap().as_json().unwrap()["result"]["tools"], json!([]));
    }

    #[tokio::test]
    async fn records_requests_and_notifications() {
        let mock = MockExchange::well_behaved();
        mock.notify(methods::INITIALIZED, None).await.unwrap();
        mock.send_raw("{oops", Duration::from_secs(1)).await.unwrap();
        let sent = mock.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].method, methods::INITIALIZED);
        assert_eq!(sent[1].raw.as_deref(), Some("{oops"));
    }

    #[tokio::test]
    async fn latency_beyond_timeout_is_silence() {
        let mock = MockExchange::well_behaved().with_latency(Duration::from_millis(50));
        let rt = mock
            .send(methods::TOOLS_LIST, None, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(rt.reply.is_none());
    }
}
