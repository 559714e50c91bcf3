//! Process Integration Tests
//!
//! Launch small shell-script servers through the real stdio transport.

#![cfg(unix)]

use std::path::{Path, PathBuf};

use mcpcheck::cli::run::run_suite;
use mcpcheck::cli::Selection;
use mcpcheck::config::HarnessConfig;
use mcpcheck::reporter::{self, ReportFormat};
use mcpcheck::results::{Category, CheckDetails, Outcome, Severity, TestResult, TestSuite};
use mcpcheck::transport::{Exchange, ProcessHandle};
use mcpcheck::ui::OutputMode;

/// Answers initialize and tools/list; everything else is "method not found"
const SH_SERVER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  if [ -z "$id" ]; then
    case "$line" in
      *'"method"'*) continue ;;
    esac
    printf '{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}\n'
    continue
  fi
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"sh-server","version":"1.0.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[]}}\n' "$id" ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id" ;;
  esac
done
"#;

/// Rejects every request until `notifications/initialized` has arrived
const STRICT_SERVER: &str = r#"#!/bin/sh
ready=0
while IFS= read -r line; do
  case "$line" in
    *'"method":"notifications/initialized"'*) ready=1; continue ;;
  esac
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"strict","version":"1.0.0"}}}\n' "$id" ;;
    *)
      if [ "$ready" = 1 ]; then
        printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[]}}\n' "$id"
      else
        printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32002,"message":"Server not initialized"}}\n' "$id"
      fi ;;
  esac
done
"#;

/// Like `SH_SERVER`, but takes a second to reject unparseable input
const SLOW_PARSE_SERVER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  if [ -z "$id" ]; then
    case "$line" in
      *'"method":"notifications/'*) continue ;;
    esac
    sleep 1
    printf '{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}\n'
    continue
  fi
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"slow","version":"1.0.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[]}}\n' "$id" ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"Method not found"}}\n' "$id" ;;
  esac
done
"#;

fn write_server(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("server.sh");
    std::fs::write(&path, body).unwrap();
    path
}

fn fast_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.general.timeout_secs = 2.0;
    config.launch.grace_ms = 200;
    config.launch.shutdown_grace_ms = 500;
    config
}

fn load_config() -> HarnessConfig {
    let mut config = fast_config();
    config.load.concurrency = 2;
    config.load.requests_per_worker = 5;
    config
}

fn outcome(suite: &TestSuite, id: &str) -> Option<Outcome> {
    suite.results.iter().find(|r| r.id == id).map(|r| r.outcome)
}

fn result<'s>(suite: &'s TestSuite, id: &str) -> &'s TestResult {
    suite
        .results
        .iter()
        .find(|r| r.id == id)
        .unwrap_or_else(|| panic!("no result for {}", id))
}

#[tokio::test]
async fn exiting_server_is_a_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(dir.path(), "#!/bin/sh\necho 'boot failed' >&2\nexit 3\n");

    let selection = Selection {
        compliance: true,
        load: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &fast_config(), selection, OutputMode::Plain).await;

    let launch = &suite.results[0];
    assert_eq!(launch.id, "LAUNCH-001");
    assert_eq!(launch.outcome, Outcome::Fail);
    assert_eq!(launch.severity, Severity::Critical);
    assert!(suite.results[1..].iter().all(|r| r.outcome == Outcome::Skip));
    assert_eq!(suite.exit_code(), 1);
}

#[tokio::test]
async fn launch_stderr_reaches_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(
        dir.path(),
        "#!/bin/sh\necho \"ModuleNotFoundError: No module named 'mcp'\" >&2\nexit 3\n",
    );

    let selection = Selection {
        compliance: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &fast_config(), selection, OutputMode::Plain).await;

    let launch = result(&suite, "LAUNCH-001");
    assert!(launch.message.contains("exit status: 3"));
    assert!(launch.message.contains("(stderr: ModuleNotFoundError: No module named 'mcp')"));
    match &launch.details {
        Some(CheckDetails::Launch(details)) => {
            assert!(details.suggestion.contains("stderr"));
            assert_eq!(
                details.stderr_lines().collect::<Vec<_>>(),
                ["ModuleNotFoundError: No module named 'mcp'"]
            );
        }
        other => panic!("expected launch details, got {:?}", other),
    }

    let json: serde_json::Value =
        serde_json::from_str(&reporter::render(&suite, ReportFormat::Json).unwrap()).unwrap();
    let first = &json["results"][0];
    assert_eq!(first["details"]["kind"], "launch");
    assert!(first["details"]["stderr"]
        .as_str()
        .unwrap()
        .contains("ModuleNotFoundError"));
    assert!(reporter::render(&suite, ReportFormat::Text)
        .unwrap()
        .contains("stderr: ModuleNotFoundError"));
}

#[tokio::test]
async fn launch_failure_still_scans() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(dir.path(), "#!/bin/sh\nexit 0\n");

    let selection = Selection {
        compliance: true,
        security: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &fast_config(), selection, OutputMode::Plain).await;

    assert_eq!(outcome(&suite, "LAUNCH-001"), Some(Outcome::Fail));
    assert_eq!(outcome(&suite, "SEC-000"), Some(Outcome::Pass));
    assert_eq!(suite.results.last().map(|r| r.category), Some(Category::Security));
}

#[tokio::test]
async fn scan_reports_command_injection_once() {
    let dir = tempfile::tempdir().unwrap();
    write_server(dir.path(), SH_SERVER);
    std::fs::write(
        dir.path().join("handler.py"),
        "import os\n\ndef run(user_input):\n    os.system(\"rm -rf \" + user_input)\n",
    )
    .unwrap();

    let selection = Selection {
        security: true,
        ..Default::default()
    };
    let first = run_suite(dir.path(), &fast_config(), selection, OutputMode::Plain).await;
    let findings: Vec<_> = first
        .results
        .iter()
        .filter(|r| r.outcome == Outcome::Fail)
        .collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::Critical);
    assert!(findings[0].name.contains("handler.py:4"));

    let second = run_suite(dir.path(), &fast_config(), selection, OutputMode::Plain).await;
    let ids = |s: &TestSuite| s.results.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn shell_server_handshake_and_tools() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(dir.path(), SH_SERVER);

    let selection = Selection {
        compliance: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &fast_config(), selection, OutputMode::Plain).await;

    assert_eq!(outcome(&suite, "LAUNCH-001"), Some(Outcome::Pass));
    assert_eq!(outcome(&suite, "PROTO-001"), Some(Outcome::Pass));
    assert_eq!(outcome(&suite, "PROTO-002"), Some(Outcome::Pass));
    assert_eq!(outcome(&suite, "PROTO-003"), Some(Outcome::Pass));
    assert_eq!(outcome(&suite, "TOOLS-001"), Some(Outcome::Pass));
    assert_eq!(outcome(&suite, "TOOLS-002"), Some(Outcome::Skip));
    assert_eq!(outcome(&suite, "RES-001"), Some(Outcome::Skip));
    assert_eq!(outcome(&suite, "ERR-002"), Some(Outcome::Pass));
}

#[tokio::test]
async fn load_only_run_initializes_strict_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(dir.path(), STRICT_SERVER);

    let selection = Selection {
        load: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &load_config(), selection, OutputMode::Plain).await;

    let ids: Vec<_> = suite.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["LAUNCH-001", "PERF-001"]);
    let perf = result(&suite, "PERF-001");
    assert_eq!(perf.outcome, Outcome::Pass, "{}", perf.message);
    assert!(perf.message.contains("error rate 0.0%"));
}

#[tokio::test]
async fn rejected_handshake_skips_load_phases() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(
        dir.path(),
        r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32603,"message":"not ready"}}\n' "$id"
done
"#,
    );

    let selection = Selection {
        compliance: true,
        load: true,
        endurance: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &load_config(), selection, OutputMode::Plain).await;

    assert_eq!(outcome(&suite, "PROTO-001"), Some(Outcome::Fail));
    for id in ["PERF-001", "ENDURANCE-001"] {
        let skipped = result(&suite, id);
        assert_eq!(skipped.outcome, Outcome::Skip, "{}", id);
        assert!(skipped.message.starts_with("initialization failed"), "{}", skipped.message);
    }
}

#[tokio::test]
async fn late_parse_error_does_not_answer_next_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(dir.path(), SLOW_PARSE_SERVER);
    let mut config = fast_config();
    config.general.timeout_secs = 0.8;

    let selection = Selection {
        compliance: true,
        ..Default::default()
    };
    let suite = run_suite(&path, &config, selection, OutputMode::Plain).await;

    assert_eq!(outcome(&suite, "ERR-001"), Some(Outcome::Tolerated));
    for id in ["ERR-002", "ERR-003"] {
        let check = result(&suite, id);
        assert_eq!(check.outcome, Outcome::Pass, "{}: {}", id, check.message);
        assert!(check.message.contains("-32601"), "{}", check.message);
    }
}

#[tokio::test]
async fn direct_exchange_with_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_server(dir.path(), SH_SERVER);

    let handle = ProcessHandle::start(&path, &fast_config()).await.unwrap();
    assert!(handle.pid().is_some());

    let roundtrip = handle
        .send("tools/list", None, std::time::Duration::from_secs(2))
        .await
        .unwrap();
    let reply = roundtrip.reply.expect("server should answer");
    let json = reply.as_json().expect("reply should be JSON");
    assert_eq!(json["id"], roundtrip.id.to_value());
    assert_eq!(json["result"]["tools"], serde_json::json!([]));

    handle.shutdown().await.unwrap();
    // A second shutdown is a no-op
    handle.shutdown().await.unwrap();
}
