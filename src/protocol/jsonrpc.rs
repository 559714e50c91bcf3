//! JSON-RPC 2.0 types and envelope validation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Request ID - can be string or number per JSON-RPC spec
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl RequestId {
    /// Interpret a raw `id` member. `null`, floats and negatives are not request ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::Number(n) => Value::from(*n),
            RequestId::String(s) => Value::from(s.as_str()),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Notification (no id field)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// What a structurally valid response carried
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Result(Value),
    Error(JsonRpcError),
}

/// An envelope problem found while checking a response
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeViolation {
    NotAnObject,
    WrongVersion(Option<Value>),
    IdMismatch { expected: Value, actual: Option<Value> },
    NeitherResultNorError,
    BothResultAndError,
    MalformedError(Value),
}

impl std::fmt::Display for EnvelopeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeViolation::NotAnObject => write!(f, "response is not a JSON object"),
            EnvelopeViolation::WrongVersion(v) => match v {
                Some(v) => write!(f, "jsonrpc must be \"2.0\", got {}", v),
                None => write!(f, "missing jsonrpc member"),
            },
            EnvelopeViolation::IdMismatch { expected, actual } => match actual {
                Some(actual) => write!(f, "response id {} does not match request id {}", actual, expected),
                None => write!(f, "response has no id (expected {})", expected),
            },
            EnvelopeViolation::NeitherResultNorError => {
                write!(f, "response contains neither result nor error")
            }
            EnvelopeViolation::BothResultAndError => {
                write!(f, "response contains both result and error")
            }
            EnvelopeViolation::MalformedError(e) => {
                write!(f, "error object lacks integer code or string message: {}", e)
            }
        }
    }
}

/// Check a raw response against the request it answers.
///
/// All violations are reported, not just the first, so a report can list them together.
pub fn validate_envelope(
    response: &Value,
    expected_id: &RequestId,
) -> Result<ResponseBody, Vec<EnvelopeViolation>> {
    let Some(obj) = response.as_object() else {
        return Err(vec![EnvelopeViolation::NotAnObject]);
    };

    let mut violations = Vec::new();

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        other => violations.push(EnvelopeViolation::WrongVersion(other.cloned())),
    }

    let actual_id = obj.get("id");
    if actual_id.and_then(RequestId::from_value).as_ref() != Some(expected_id) {
        violations.push(EnvelopeViolation::IdMismatch {
            expected: expected_id.to_value(),
            actual: actual_id.cloned(),
        });
    }

    let body = match (obj.get("result"), obj.get("error")) {
        (Some(_), Some(_)) => {
            violations.push(EnvelopeViolation::BothResultAndError);
            None
        }
        (None, None) => {
            violations.push(EnvelopeViolation::NeitherResultNorError);
            None
        }
        (Some(result), None) => Some(ResponseBody::Result(result.clone())),
        (None, Some(error)) => match parse_error_object(error) {
            Some(err) => Some(ResponseBody::Error(err)),
            None => {
                violations.push(EnvelopeViolation::MalformedError(error.clone()));
                None
            }
        },
    };

    match body {
        Some(body) if violations.is_empty() => Ok(body),
        _ => Err(violations),
    }
}

/// Parse an `error` member, requiring an integer `code` and a string `message`
pub fn parse_error_object(error: &Value) -> Option<JsonRpcError> {
    let code = error.get("code")?.as_i64()?;
    let message = error.get("message")?.as_str()?.to_string();
    Some(JsonRpcError {
        code,
        message,
        data: error.get("data").cloned(),
    })
}

/// Join violations into one human-readable line
pub fn describe_violations(violations: &[EnvelopeViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
