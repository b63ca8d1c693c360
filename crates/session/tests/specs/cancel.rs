// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation specs: a canceled session drains quickly and never reports
//! a failure it did not have.

use std::time::Duration;

use tokio::sync::mpsc;

use stoker_protocol::BuildCommand;
use stoker_session::test_support::{trim_timestamps, MockServer, StubContext};
use stoker_session::BuildSession;

use super::support::start_command;

#[tokio::test]
async fn cancel_mid_exec_drains_the_session_within_bounded_time() {
    let server = MockServer::start().await;
    let (tx, mut rx) = mpsc::channel(16);
    let ctx = StubContext::new(server.base_url());
    let session = BuildSession::new(reqwest::Client::new(), tx, ctx);

    let job = BuildCommand::compose(vec![
        start_command(&server),
        BuildCommand::exec("sleep", ["60"]),
        BuildCommand::report_completed(),
    ]);
    let handle = session.spawn(job);

    tokio::time::sleep(Duration::from_millis(200)).await;
    tokio::time::timeout(Duration::from_secs(5), handle.close())
        .await
        .expect("canceled session should drain quickly");

    // Cancellation is not a failure: nothing reported `Failed`, and the
    // console carries no failure line.
    while let Ok(message) = rx.try_recv() {
        let result = message
            .data
            .get("data")
            .and_then(|d| d.get("result"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        assert_ne!(result, "Failed", "canceled build must not report Failed");
    }
    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert!(!log.contains("canceled"), "{log}");
}

#[tokio::test]
async fn close_without_cancelation_waits_for_completion() {
    let server = MockServer::start().await;
    let (tx, mut rx) = mpsc::channel(16);
    let ctx = StubContext::new(server.base_url());
    let session = BuildSession::new(reqwest::Client::new(), tx, ctx);

    let job = BuildCommand::compose(vec![
        start_command(&server),
        BuildCommand::echo(["quick job"]),
        BuildCommand::report_completed(),
    ]);
    let handle = session.spawn(job);
    // Give the job time to finish naturally, then close.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.close().await;

    let report = rx.try_recv().expect("completed job reports");
    assert_eq!(report.action, "reportCompleted");
    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert_eq!(log, "quick job\n");
}
