//! Validation Engine - drives one compliance session against a server
//!
//! Phases run in the order the session state machine allows: handshake,
//! feature groups, error handling. Each check is isolated; a transport error
//! inside one becomes an `error` result and the session moves on.

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::arguments::{synthesize_arguments, synthesize_prompt_arguments};
use super::rules::CheckId;
use crate::config::HarnessConfig;
use crate::errors::HarnessError;
use crate::protocol::jsonrpc::parse_error_object;
use crate::protocol::mcp::{
    self, first_item, item_count, methods, Implementation, InitializeParams, Prompt, Resource,
    Tool,
};
use crate::protocol::{
    validate_envelope, Feature, JsonRpcError, ResponseBody, ResultKind, ResultSchemas,
    ServerCapabilities, Session, StateTransitionError,
};
use crate::results::{CheckDetails, ProtocolDetails, Severity, TestResult};
use crate::transport::{Exchange, Reply};

/// Deliberately unparseable request used by ERR-001
const INVALID_JSON_REQUEST: &str = r#"{"jsonrpc": "2.0", "id": 1, "method": "tools/list""#;

/// Method name no server implements, used by ERR-002
const UNKNOWN_METHOD: &str = "mcpcheck/nonexistent_method";

/// What came back for one request, after envelope validation
#[derive(Debug)]
enum Answer {
    Result { result: Value, raw: Value },
    Error { error: JsonRpcError, raw: Value },
    Invalid { violations: Vec<String>, raw: Option<Value> },
    Silent,
    Broken(HarnessError),
}

impl Answer {
    fn raw(&self) -> Option<&Value> {
        match self {
            Answer::Result { raw, .. } | Answer::Error { raw, .. } => Some(raw),
            Answer::Invalid { raw, .. } => raw.as_ref(),
            Answer::Silent | Answer::Broken(_) => None,
        }
    }

    fn details(&self, method: &str) -> CheckDetails {
        let mut details = ProtocolDetails::new(method);
        if let Some(raw) = self.raw() {
            details = details.with_response(raw.clone());
        }
        if let Answer::Invalid { violations, .. } = self {
            details = details.with_violations(violations.clone());
        }
        CheckDetails::Protocol(details)
    }
}

/// One feature group: list, then exercise the first item
struct FeaturePhase {
    feature: Feature,
    list_method: &'static str,
    list_key: &'static str,
    list_kind: ResultKind,
    exec_method: &'static str,
    exec_kind: ResultKind,
    list_check: CheckId,
    exec_check: CheckId,
    overall_check: CheckId,
}

impl FeaturePhase {
    fn for_feature(feature: Feature) -> Self {
        match feature {
            Feature::Tools => Self {
                feature,
                list_method: methods::TOOLS_LIST,
                list_key: "tools",
                list_kind: ResultKind::ToolsList,
                exec_method: methods::TOOLS_CALL,
                exec_kind: ResultKind::ToolsCall,
                list_check: CheckId::Tools001,
                exec_check: CheckId::Tools002,
                overall_check: CheckId::Tools003,
            },
            Feature::Resources => Self {
                feature,
                list_method: methods::RESOURCES_LIST,
                list_key: "resources",
                list_kind: ResultKind::ResourcesList,
                exec_method: methods::RESOURCES_READ,
                exec_kind: ResultKind::ResourcesRead,
                list_check: CheckId::Res001,
                exec_check: CheckId::Res002,
                overall_check: CheckId::Res003,
            },
            Feature::Prompts => Self {
                feature,
                list_method: methods::PROMPTS_LIST,
                list_key: "prompts",
                list_kind: ResultKind::PromptsList,
                exec_method: methods::PROMPTS_GET,
                exec_kind: ResultKind::PromptsGet,
                list_check: CheckId::Prompt001,
                exec_check: CheckId::Prompt002,
                overall_check: CheckId::Prompt003,
            },
        }
    }

    /// Parameters for exercising the first listed item, with a label for messages
    fn exec_params(&self, list_result: &Value) -> Option<(String, Value)> {
        match self.feature {
            Feature::Tools => {
                let tool: Tool = first_item(list_result, self.list_key)?;
                let arguments = synthesize_arguments(tool.input_schema.as_ref());
                Some((
                    tool.name.clone(),
                    json!({"name": tool.name, "arguments": arguments}),
                ))
            }
            Feature::Resources => {
                let resource: Resource = first_item(list_result, self.list_key)?;
                Some((resource.uri.clone(), json!({"uri": resource.uri})))
            }
            Feature::Prompts => {
                let prompt: Prompt = first_item(list_result, self.list_key)?;
                let arguments = synthesize_prompt_arguments(prompt.arguments.as_deref());
                Some((
                    prompt.name.clone(),
                    json!({"name": prompt.name, "arguments": arguments}),
                ))
            }
        }
    }
}

/// Compliance validator for a single session
pub struct ComplianceValidator<'a> {
    config: &'a HarnessConfig,
    schemas: ResultSchemas,
    session: Session,
    results: Vec<TestResult>,
}

impl<'a> ComplianceValidator<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self {
            config,
            schemas: ResultSchemas::new(),
            session: Session::new(),
            results: Vec::new(),
        }
    }

    /// The negotiated session, once the validator is done with the server
    pub fn into_session(self) -> Session {
        self.session
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn record(&mut self, result: TestResult, started: Instant) {
        self.results.push(result.with_duration(started.elapsed()));
    }

    /// Run every compliance check and return the results in execution order
    pub async fn run(&mut self, exchange: &dyn Exchange) -> Vec<TestResult> {
        tracing::info!("Running compliance checks");

        if !self.run_handshake(exchange).await {
            self.session.abort();
            let remaining: Vec<CheckId> = CheckId::COMPLIANCE
                .iter()
                .copied()
                .filter(|id| !self.results.iter().any(|r| r.id == id.as_str()))
                .collect();
            for id in remaining {
                self.results
                    .push(id.skip("not attempted: initialize handshake failed"));
            }
            return std::mem::take(&mut self.results);
        }

        for feature in Feature::ALL {
            let phase = FeaturePhase::for_feature(feature);
            match self.session.set_feature_checked(feature) {
                Ok(()) => self.run_feature(exchange, &phase).await,
                Err(e) => self.reject_phase(
                    &[phase.list_check, phase.exec_check, phase.overall_check],
                    e,
                ),
            }
        }

        match self.session.set_error_handling_checked() {
            Ok(()) => {
                self.run_error_handling(exchange).await;
                // ErrorHandlingChecked -> Done is always legal
                let _ = self.session.finish();
            }
            Err(e) => self.reject_phase(&[CheckId::Err001, CheckId::Err002, CheckId::Err003], e),
        }

        std::mem::take(&mut self.results)
    }

    /// Handshake only (PROTO-001..004), for runs that drive the server
    /// without the compliance checks
    pub async fn initialize(&mut self, exchange: &dyn Exchange) -> Vec<TestResult> {
        if !self.run_handshake(exchange).await {
            self.session.abort();
        }
        std::mem::take(&mut self.results)
    }

    /// Record `checks` as errors when the session refuses to enter their phase
    fn reject_phase(&mut self, checks: &[CheckId], e: StateTransitionError) {
        let err = HarnessError::from(e);
        tracing::warn!("{}", err);
        for id in checks {
            self.results.push(id.error(err.to_string()));
        }
    }

    /// Send one request and classify the reply
    async fn call(&self, exchange: &dyn Exchange, method: &str, params: Option<Value>) -> Answer {
        let roundtrip = match exchange.send(method, params, self.timeout()).await {
            Ok(rt) => rt,
            Err(e) => return Answer::Broken(e),
        };

        match roundtrip.reply {
            None => Answer::Silent,
            Some(Reply::Malformed(text)) => Answer::Invalid {
                violations: vec![format!("response is not valid JSON: {}", truncate(&text, 200))],
                raw: None,
            },
            Some(Reply::Json(raw)) => match validate_envelope(&raw, &roundtrip.id) {
                Ok(ResponseBody::Result(result)) => Answer::Result { result, raw },
                Ok(ResponseBody::Error(error)) => Answer::Error { error, raw },
                Err(violations) => Answer::Invalid {
                    violations: violations.iter().map(|v| v.to_string()).collect(),
                    raw: Some(raw),
                },
            },
        }
    }

    fn silent_message(&self, method: &str) -> String {
        HarnessError::timeout(method, self.timeout()).to_string()
    }

    /// PROTO-001..004. Returns whether later phases may run.
    async fn run_handshake(&mut self, exchange: &dyn Exchange) -> bool {
        let started = Instant::now();
        let params = InitializeParams::new(Implementation::harness());
        let params = match serde_json::to_value(&params) {
            Ok(p) => p,
            Err(e) => {
                self.record(CheckId::Proto001.error(e.to_string()), started);
                return false;
            }
        };

        let answer = self.call(exchange, methods::INITIALIZE, Some(params)).await;
        let details = answer.details(methods::INITIALIZE);
        let result = match answer {
            Answer::Result { result, .. } => result,
            Answer::Error { error, .. } => {
                self.record(
                    CheckId::Proto001
                        .fail(format!("initialize returned an error: {}", error))
                        .with_details(details),
                    started,
                );
                return false;
            }
            Answer::Invalid { violations, .. } => {
                self.record(
                    CheckId::Proto001
                        .fail(format!("invalid initialize response: {}", violations.join("; ")))
                        .with_details(details),
                    started,
                );
                return false;
            }
            Answer::Silent => {
                let message = self.silent_message(methods::INITIALIZE);
                self.record(CheckId::Proto001.fail(message), started);
                return false;
            }
            Answer::Broken(e) => {
                self.record(CheckId::Proto001.error(e.to_string()), started);
                return false;
            }
        };
        self.record(
            CheckId::Proto001.pass("initialize answered with a valid JSON-RPC result"),
            started,
        );

        let started = Instant::now();
        let check = match self.schemas.check(ResultKind::Initialize, &result) {
            Ok(()) => CheckId::Proto002.pass("initialize result matches schema"),
            Err(errors) => CheckId::Proto002
                .fail(format!("initialize result schema errors: {}", errors.join("; ")))
                .with_severity(Severity::Medium)
                .with_details(CheckDetails::Protocol(
                    ProtocolDetails::new(methods::INITIALIZE)
                        .with_response(result.clone())
                        .with_violations(errors),
                )),
        };
        self.record(check, started);

        let started = Instant::now();
        let version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let check = if version.is_empty() {
            CheckId::Proto003
                .fail("initialize result has no protocolVersion")
                .with_severity(Severity::Low)
        } else if mcp::is_supported_version(&version) {
            CheckId::Proto003.pass(format!("protocol version {}", version))
        } else {
            tracing::warn!("Server negotiated unsupported protocol version {}", version);
            CheckId::Proto003
                .tolerated(format!(
                    "unsupported protocol version {} (supported: {})",
                    version,
                    mcp::SUPPORTED_VERSIONS.join(", ")
                ))
                .with_severity(Severity::Low)
        };
        self.record(check, started);

        let started = Instant::now();
        let capabilities = result
            .get("capabilities")
            .and_then(ServerCapabilities::from_value);
        let check = match &capabilities {
            Some(caps) if caps.is_empty() => {
                CheckId::Proto004.pass("server advertises no capabilities")
            }
            Some(caps) => CheckId::Proto004.pass(format!(
                "server advertises: {}",
                caps.names().collect::<Vec<_>>().join(", ")
            )),
            None => CheckId::Proto004
                .fail("capabilities is missing or not an object")
                .with_severity(Severity::Medium),
        };

        let server_info = result.get("serverInfo");
        let field = |name: &str| {
            server_info
                .and_then(|i| i.get(name))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        };
        let accepted = self
            .session
            .set_initialized(version, field("name"), field("version"))
            .and_then(|_| {
                self.session
                    .set_capabilities(capabilities.unwrap_or_default())
            });
        if let Err(e) = accepted {
            let err = HarnessError::from(e);
            tracing::warn!("{}", err);
            self.record(CheckId::Proto004.error(err.to_string()), started);
            return false;
        }
        self.record(check, started);

        if let (Some((name, server_version)), Some(protocol)) =
            (self.session.server_info(), self.session.protocol_version())
        {
            tracing::info!(
                "Initialized {} {} (protocol {})",
                name,
                server_version,
                protocol
            );
        }

        if let Err(e) = exchange.notify(methods::INITIALIZED, None).await {
            tracing::warn!("Failed to send initialized notification: {}", e);
        }
        true
    }

    async fn run_feature(&mut self, exchange: &dyn Exchange, phase: &FeaturePhase) {
        let advertised = self
            .session
            .capabilities()
            .is_some_and(|c| c.has(phase.feature.capability()));
        if !advertised {
            let reason = format!(
                "server does not advertise the {} capability",
                phase.feature.capability()
            );
            for id in [phase.list_check, phase.exec_check, phase.overall_check] {
                self.results.push(id.skip(reason.clone()));
            }
            return;
        }

        // List
        let started = Instant::now();
        let answer = self.call(exchange, phase.list_method, None).await;
        let details = answer.details(phase.list_method);
        let listed = match answer {
            Answer::Result { result, .. } => match self.schemas.check(phase.list_kind, &result) {
                Ok(()) => {
                    let count = item_count(&result, phase.list_key);
                    self.record(
                        phase
                            .list_check
                            .pass(format!("{} {} listed", count, phase.list_key)),
                        started,
                    );
                    Some(result)
                }
                Err(errors) => {
                    self.record(
                        phase
                            .list_check
                            .fail(format!("schema errors: {}", errors.join("; ")))
                            .with_details(CheckDetails::Protocol(
                                ProtocolDetails::new(phase.list_method)
                                    .with_response(result)
                                    .with_violations(errors),
                            )),
                        started,
                    );
                    None
                }
            },
            other => {
                let result = self.failed_request(phase.list_check, phase.list_method, other);
                self.record(result.with_details(details), started);
                None
            }
        };

        let Some(list_result) = listed else {
            self.results.push(
                phase
                    .exec_check
                    .skip(format!("not attempted: {} failed", phase.list_method)),
            );
            self.results.push(
                phase
                    .overall_check
                    .fail(format!("{} did not return a usable list", phase.list_method)),
            );
            return;
        };

        // Exercise the first item
        let Some((label, params)) = phase.exec_params(&list_result) else {
            let reason = format!("no {} to exercise", phase.list_key);
            self.results.push(phase.exec_check.skip(reason.clone()));
            self.results.push(phase.overall_check.pass(reason));
            return;
        };

        let started = Instant::now();
        let answer = self.call(exchange, phase.exec_method, Some(params)).await;
        let details = answer.details(phase.exec_method);
        let exec = match answer {
            Answer::Result { result, .. } => match self.schemas.check(phase.exec_kind, &result) {
                Ok(()) if result.get("isError").and_then(Value::as_bool) == Some(true) => phase
                    .exec_check
                    .pass(format!("{} '{}' reported an application error", phase.exec_method, label))
                    .with_severity(Severity::Low),
                Ok(()) => phase
                    .exec_check
                    .pass(format!("{} '{}' succeeded", phase.exec_method, label)),
                Err(errors) => phase
                    .exec_check
                    .fail(format!("schema errors: {}", errors.join("; "))),
            },
            Answer::Error { error, .. } => {
                tracing::warn!("{} '{}' returned {}", phase.exec_method, label, error);
                phase
                    .exec_check
                    .pass(format!(
                        "{} '{}' returned application error {} (tolerated)",
                        phase.exec_method, label, error
                    ))
                    .with_severity(Severity::Low)
            }
            other => self.failed_request(phase.exec_check, phase.exec_method, other),
        };
        let exec_passed = exec.passed;
        self.record(exec.with_details(details), started);

        let overall = if exec_passed {
            phase.overall_check.pass(format!(
                "{} and {} behave correctly",
                phase.list_method, phase.exec_method
            ))
        } else {
            phase
                .overall_check
                .fail(format!("{} on '{}' failed", phase.exec_method, label))
        };
        self.results.push(overall);
    }

    /// Result for a request that produced no usable answer
    fn failed_request(&self, check: CheckId, method: &str, answer: Answer) -> TestResult {
        match answer {
            Answer::Result { .. } => check.pass(format!("{} answered", method)),
            Answer::Error { error, .. } => check.fail(format!("{} returned an error: {}", method, error)),
            Answer::Invalid { violations, .. } => {
                check.fail(format!("invalid {} response: {}", method, violations.join("; ")))
            }
            Answer::Silent => check.fail(self.silent_message(method)),
            Answer::Broken(e) => check.error(e.to_string()),
        }
    }

    /// ERR-001..003
    async fn run_error_handling(&mut self, exchange: &dyn Exchange) {
        // Invalid JSON
        let started = Instant::now();
        let result = match exchange.send_raw(INVALID_JSON_REQUEST, self.timeout()).await {
            Err(e) => CheckId::Err001.error(e.to_string()),
            Ok(None) => no_response(CheckId::Err001),
            Ok(Some(Reply::Malformed(text))) => CheckId::Err001
                .fail(format!("reply is not JSON: {}", truncate(&text, 200)))
                .with_severity(Severity::Medium),
            Ok(Some(Reply::Json(raw))) => {
                let details = CheckDetails::Protocol(
                    ProtocolDetails::new("(invalid JSON)").with_response(raw.clone()),
                );
                let check = match raw.get("error").and_then(parse_error_object) {
                    Some(error) if raw.get("result").is_none() => {
                        CheckId::Err001.pass(format!("rejected with {}", error))
                    }
                    _ => CheckId::Err001
                        .fail("reply to invalid JSON lacks an error object with code and message")
                        .with_severity(Severity::Medium),
                };
                check.with_details(details)
            }
        };
        self.record(result, started);

        // Unknown method
        let started = Instant::now();
        let answer = self.call(exchange, UNKNOWN_METHOD, None).await;
        let result = self.expect_error(CheckId::Err002, UNKNOWN_METHOD, answer);
        self.record(result, started);

        // Missing required parameter
        let started = Instant::now();
        let method = self.missing_param_method();
        let answer = self.call(exchange, method, Some(json!({}))).await;
        let result = self.expect_error(CheckId::Err003, method, answer);
        self.record(result, started);
    }

    /// A method with required params that the server claims to support
    fn missing_param_method(&self) -> &'static str {
        let caps = self.session.capabilities();
        let has = |name: &str| caps.is_some_and(|c| c.has(name));
        if has("tools") {
            methods::TOOLS_CALL
        } else if has("resources") {
            methods::RESOURCES_READ
        } else if has("prompts") {
            methods::PROMPTS_GET
        } else {
            methods::TOOLS_CALL
        }
    }

    /// Error checks pass only on a well-formed JSON-RPC error with the request's id
    fn expect_error(&self, check: CheckId, method: &str, answer: Answer) -> TestResult {
        let details = answer.details(method);
        let result = match answer {
            Answer::Error { error, .. } => check.pass(format!("rejected with {}", error)),
            Answer::Result { .. } => check
                .fail(format!("{} was accepted instead of rejected", method))
                .with_severity(Severity::Medium),
            Answer::Invalid { violations, .. } => check
                .fail(format!("invalid error response: {}", violations.join("; ")))
                .with_severity(Severity::Medium),
            Answer::Silent => no_response(check),
            Answer::Broken(e) => check.error(e.to_string()),
        };
        result.with_details(details)
    }

    /// Skips for every compliance check, used when the server never started
    pub fn skip_all(reason: &str) -> Vec<TestResult> {
        CheckId::COMPLIANCE
            .iter()
            .map(|id| id.skip(reason.to_string()))
            .collect()
    }
}

fn no_response(check: CheckId) -> TestResult {
    check
        .tolerated("no response (acceptable)")
        .with_severity(Severity::Info)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Outcome;
    use crate::transport::mock::{error_reply, result_reply, MockExchange};

    fn config() -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.general.timeout_secs = 0.05;
        config
    }

    fn find<'r>(results: &'r [TestResult], id: &str) -> &'r TestResult {
        results
            .iter()
            .find(|r| r.id == id)
            .unwrap_or_else(|| panic!("no result for {}", id))
    }

    #[tokio::test]
    async fn well_behaved_server_passes_everything() {
        let config = config();
        let mock = MockExchange::well_behaved();
        let results = ComplianceValidator::new(&config).run(&mock).await;

        assert_eq!(results.len(), CheckId::COMPLIANCE.len());
        for r in &results {
            assert_eq!(r.outcome, Outcome::Pass, "{} failed: {}", r.id, r.message);
        }
        assert!(mock.sent_methods().contains(&methods::INITIALIZED.to_string()));
    }

    #[tokio::test]
    async fn tool_call_uses_synthesized_arguments() {
        let config = config();
        let mock = MockExchange::well_behaved();
        ComplianceValidator::new(&config).run(&mock).await;
        let call = mock
            .sent()
            .into_iter()
            .find(|r| r.method == methods::TOOLS_CALL && r.params.as_ref().is_some_and(|p| p.get("name").is_some()))
            .unwrap();
        assert_eq!(call.params.unwrap()["arguments"], json!({"text": "test_value"}));
    }

    #[tokio::test]
    async fn silent_server_fails_handshake_and_skips_rest() {
        let config = config();
        let results = ComplianceValidator::new(&config)
            .run(&MockExchange::silent())
            .await;
        assert_eq!(results.len(), CheckId::COMPLIANCE.len());
        assert_eq!(find(&results, "PROTO-001").outcome, Outcome::Fail);
        assert!(results[1..].iter().all(|r| r.outcome == Outcome::Skip));
    }

    #[tokio::test]
    async fn mismatched_id_never_passes() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(methods::INITIALIZE, |_| {
            Some(result_reply(
                &crate::protocol::RequestId::Number(999),
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "serverInfo": {"name": "x", "version": "1"}
                }),
            ))
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        let handshake = find(&results, "PROTO-001");
        assert!(!handshake.passed);
        assert!(handshake.message.contains("does not match"));
    }

    #[tokio::test]
    async fn empty_tool_list_skips_call_and_passes_functionality() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(methods::TOOLS_LIST, |r| {
            r.id.as_ref().map(|id| result_reply(id, json!({"tools": []})))
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        assert_eq!(find(&results, "TOOLS-001").outcome, Outcome::Pass);
        assert_eq!(find(&results, "TOOLS-002").outcome, Outcome::Skip);
        assert_eq!(find(&results, "TOOLS-003").outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn unadvertised_capability_skips_group() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(methods::INITIALIZE, |r| {
            r.id.as_ref().map(|id| {
                result_reply(
                    id,
                    json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "x", "version": "1"}
                    }),
                )
            })
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        for id in ["RES-001", "RES-002", "RES-003", "PROMPT-001", "PROMPT-002", "PROMPT-003"] {
            assert_eq!(find(&results, id).outcome, Outcome::Skip, "{}", id);
        }
        assert_eq!(find(&results, "TOOLS-003").outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn application_error_is_tolerated_on_call() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(methods::TOOLS_CALL, |r| {
            r.id.as_ref().map(|id| error_reply(id, -32000, "tool exploded"))
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        let call = find(&results, "TOOLS-002");
        assert!(call.passed);
        assert_eq!(call.severity, Severity::Low);
        // The same error also satisfies the missing-parameter phase
        assert!(find(&results, "ERR-003").passed);
    }

    #[tokio::test]
    async fn silent_error_checks_are_tolerated_at_info() {
        let config = config();
        let mock = MockExchange::well_behaved()
            .with_method("", |_| None)
            .with_method(UNKNOWN_METHOD, |_| None);
        let results = ComplianceValidator::new(&config).run(&mock).await;
        for id in ["ERR-001", "ERR-002"] {
            let r = find(&results, id);
            assert_eq!(r.outcome, Outcome::Tolerated);
            assert_eq!(r.severity, Severity::Info);
            assert_eq!(r.message, "no response (acceptable)");
        }
    }

    #[tokio::test]
    async fn error_without_message_fails_the_check() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(UNKNOWN_METHOD, |r| {
            r.id.as_ref().map(|id| {
                Reply::Json(json!({"jsonrpc": "2.0", "id": id.to_value(), "error": {"code": -32601}}))
            })
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        assert_eq!(find(&results, "ERR-002").outcome, Outcome::Fail);
    }

    #[tokio::test]
    async fn accepting_unknown_method_fails() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(UNKNOWN_METHOD, |r| {
            r.id.as_ref().map(|id| result_reply(id, json!({})))
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        assert!(find(&results, "ERR-002")
            .message
            .contains("accepted instead of rejected"));
    }

    #[tokio::test]
    async fn unsupported_version_is_a_warning_and_not_blocking() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(methods::INITIALIZE, |r| {
            r.id.as_ref().map(|id| {
                result_reply(
                    id,
                    json!({
                        "protocolVersion": "1999-01-01",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "x", "version": "1"}
                    }),
                )
            })
        });
        let results = ComplianceValidator::new(&config).run(&mock).await;
        let version = find(&results, "PROTO-003");
        assert_eq!(version.outcome, Outcome::Tolerated);
        assert_eq!(version.severity, Severity::Low);
        assert!(!version.outcome.is_failure());
        assert_eq!(find(&results, "TOOLS-001").outcome, Outcome::Pass);
    }

    #[tokio::test]
    async fn failed_handshake_leaves_session_uninitialized() {
        let config = config();
        let mock = MockExchange::well_behaved().with_method(methods::INITIALIZE, |r| {
            r.id.as_ref().map(|id| error_reply(id, -32603, "not ready"))
        });
        let mut validator = ComplianceValidator::new(&config);
        let results = validator.run(&mock).await;
        assert_eq!(find(&results, "PROTO-001").outcome, Outcome::Fail);
        assert!(!validator.into_session().is_initialized());
        assert!(!mock.sent_methods().contains(&methods::INITIALIZED.to_string()));
    }

    #[tokio::test]
    async fn initialize_only_runs_the_handshake() {
        let config = config();
        let mock = MockExchange::well_behaved();
        let mut validator = ComplianceValidator::new(&config);
        let results = validator.initialize(&mock).await;

        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["PROTO-001", "PROTO-002", "PROTO-003", "PROTO-004"]);
        assert_eq!(
            mock.sent_methods(),
            [methods::INITIALIZE.to_string(), methods::INITIALIZED.to_string()]
        );
        let session = validator.into_session();
        assert!(session.is_initialized());
        assert_eq!(session.server_info().map(|(name, _)| name), Some("mock-server"));
    }

    #[tokio::test]
    async fn reused_validator_reports_session_violation() {
        let config = config();
        let mock = MockExchange::well_behaved();
        let mut validator = ComplianceValidator::new(&config);
        validator.run(&mock).await;

        let again = validator.run(&mock).await;
        let capabilities = find(&again, "PROTO-004");
        assert_eq!(capabilities.outcome, Outcome::Error);
        assert!(capabilities.message.starts_with("Protocol violation: Invalid session transition"));
        assert_eq!(find(&again, "TOOLS-001").outcome, Outcome::Skip);
        assert_eq!(again.len(), CheckId::COMPLIANCE.len());
    }

    #[test]
    fn skip_all_covers_catalogue() {
        let skipped = ComplianceValidator::skip_all("launch failed");
        assert_eq!(skipped.len(), 16);
        assert!(skipped.iter().all(|r| r.outcome == Outcome::Skip));
    }
}
