// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the dispatcher: cookie handling, job lifecycle, cancellation,
//! and session serialization.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serial_test::serial;
use tokio::sync::mpsc;
use tokio::time::timeout;

use stoker_protocol::BuildCommand;
use stoker_session::test_support::MockServer;

use super::*;

struct Fixture {
    _server: MockServer,
    dispatcher: Dispatcher,
    rx: mpsc::Receiver<Message>,
    config: AgentConfig,
    _config_dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let server = MockServer::start().await;
    let config_dir = tempfile::tempdir().unwrap();
    let config = AgentConfig {
        server_url: server.base_url(),
        ws_url: "ws://unused".to_string(),
        work_dir: std::path::PathBuf::from("."),
        config_dir: config_dir.path().to_path_buf(),
        auto_register_key: String::new(),
        auto_register_resources: String::new(),
        auto_register_environments: String::new(),
        elastic_agent_id: String::new(),
        elastic_plugin_id: String::new(),
        uuid: "u-dispatch".to_string(),
    };
    let env = AgentEnv::new(config.clone());
    let (tx, rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::new(reqwest::Client::new(), tx, env);
    Fixture { _server: server, dispatcher, rx, config, _config_dir: config_dir }
}

fn cmd_message(command: &BuildCommand) -> Message {
    Message::new(
        stoker_protocol::ACTION_CMD,
        serde_json::json!({ "data": serde_json::to_value(command).unwrap() }),
    )
}

fn job(build_id: &str, commands: Vec<BuildCommand>) -> BuildCommand {
    let mut settings = HashMap::new();
    settings.insert("buildId".to_string(), build_id.to_string());
    settings.insert("buildLocator".to_string(), format!("pipe/{build_id}"));
    settings.insert("buildLocatorForDisplay".to_string(), format!("pipe/{build_id}"));
    settings.insert("consoleURI".to_string(), format!("/console/{build_id}"));
    settings.insert("artifactUploadBaseUrl".to_string(), "/files".to_string());
    settings.insert("propertyBaseUrl".to_string(), "/properties".to_string());

    let mut sub = vec![BuildCommand::start(settings)];
    sub.extend(commands);
    BuildCommand::compose(sub)
}

// ---------------------------------------------------------------------------
// Control messages
// ---------------------------------------------------------------------------

#[tokio::test]
#[serial]
async fn set_cookie_is_stored_and_persisted() {
    let mut fx = fixture().await;

    let msg = Message::new(
        stoker_protocol::ACTION_SET_COOKIE,
        serde_json::json!({ "data": "session-cookie-1" }),
    );
    fx.dispatcher.dispatch(&msg).await.unwrap();

    assert_eq!(state::get_state("cookie").as_deref(), Some("session-cookie-1"));
    let persisted = std::fs::read_to_string(fx.config.cookie_file()).unwrap();
    assert_eq!(persisted, "session-cookie-1");
}

#[tokio::test]
#[serial]
async fn reregister_clears_the_cookie_and_surfaces_an_error() {
    let mut fx = fixture().await;
    registration::store_cookie(&fx.config, "stale-cookie");

    let err = fx
        .dispatcher
        .dispatch(&Message::new(stoker_protocol::ACTION_REREGISTER, serde_json::json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Reregister));
    assert_eq!(state::get_state("cookie").as_deref(), Some(""));
    assert!(!fx.config.cookie_file().exists());
}

#[tokio::test]
async fn unknown_actions_are_ignored() {
    let mut fx = fixture().await;
    fx.dispatcher
        .dispatch(&Message::new("somethingNew", serde_json::json!({})))
        .await
        .unwrap();
}

#[tokio::test]
async fn malformed_command_payloads_are_ignored() {
    let mut fx = fixture().await;
    let msg = Message::new(
        stoker_protocol::ACTION_CMD,
        serde_json::json!({ "data": {"name": 42} }),
    );
    fx.dispatcher.dispatch(&msg).await.unwrap();
    fx.dispatcher.close_session().await;
}

// ---------------------------------------------------------------------------
// Job lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
#[serial]
async fn cmd_runs_a_build_and_returns_to_idle() {
    let mut fx = fixture().await;

    let command = job("b1", vec![BuildCommand::report_completed()]);
    fx.dispatcher.dispatch(&cmd_message(&command)).await.unwrap();

    let report = timeout(Duration::from_secs(5), fx.rx.recv())
        .await
        .expect("report in time")
        .expect("report message");
    assert_eq!(report.action, "reportCompleted");
    let data = report.data.get("data").unwrap();
    assert_eq!(data.get("buildId").and_then(|v| v.as_str()), Some("b1"));
    assert_eq!(data.get("result").and_then(|v| v.as_str()), Some("Passed"));

    fx.dispatcher.close_session().await;
    assert_eq!(state::get_state(state::RUNTIME_STATUS).as_deref(), Some(state::STATUS_IDLE));
}

#[tokio::test]
#[serial]
async fn cancel_job_kills_the_running_build() {
    let mut fx = fixture().await;

    let command = job("b2", vec![BuildCommand::exec("sleep", ["60"])]);
    fx.dispatcher.dispatch(&cmd_message(&command)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        state::get_state(state::RUNTIME_STATUS).as_deref(),
        Some(state::STATUS_BUILDING)
    );

    let started = Instant::now();
    let cancel = Message::new(stoker_protocol::ACTION_CANCEL_JOB, serde_json::json!({}));
    timeout(Duration::from_secs(5), fx.dispatcher.dispatch(&cancel))
        .await
        .expect("cancel drains quickly")
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(state::get_state(state::RUNTIME_STATUS).as_deref(), Some(state::STATUS_IDLE));
}

#[tokio::test]
#[serial]
async fn a_new_cmd_drains_the_prior_session_first() {
    let mut fx = fixture().await;

    let long_job = job("b3", vec![BuildCommand::exec("sleep", ["60"])]);
    fx.dispatcher.dispatch(&cmd_message(&long_job)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let quick_job = job("b4", vec![BuildCommand::report_completed()]);
    timeout(Duration::from_secs(5), fx.dispatcher.dispatch(&cmd_message(&quick_job)))
        .await
        .expect("prior session drains quickly")
        .unwrap();

    let report = timeout(Duration::from_secs(5), fx.rx.recv())
        .await
        .expect("report in time")
        .expect("report message");
    assert_eq!(report.action, "reportCompleted");
    let data = report.data.get("data").unwrap();
    assert_eq!(data.get("buildId").and_then(|v| v.as_str()), Some("b4"));
    // The canceled job never reported a failure.
    assert_eq!(data.get("result").and_then(|v| v.as_str()), Some("Passed"));

    fx.dispatcher.close_session().await;
}
