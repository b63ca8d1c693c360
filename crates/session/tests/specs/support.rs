// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for session specs.

use std::collections::HashMap;
use std::path::Path;

use md5::{Digest, Md5};
use tokio::sync::mpsc;

use stoker_protocol::{BuildCommand, Message};
use stoker_session::test_support::{MockServer, StubContext};
use stoker_session::BuildSession;

pub const CONTENT: &[u8] = b"file created for test";

pub fn content_md5() -> String {
    format!("{:x}", Md5::digest(CONTENT))
}

/// The project tree the upload specs run against.
pub fn create_test_project(root: &Path) {
    for rel in [
        "src/1.txt",
        "src/2.txt",
        "src/hello/3.txt",
        "src/hello/4.txt",
        "test/world/10.txt",
        "test/world2/10.txt",
    ] {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, CONTENT).unwrap();
    }
}

pub fn start_command(_server: &MockServer) -> BuildCommand {
    let mut settings = HashMap::new();
    settings.insert("buildId".to_string(), "b1".to_string());
    settings.insert("buildLocator".to_string(), "pipe/7/stage/1/job".to_string());
    settings.insert("buildLocatorForDisplay".to_string(), "pipe/7/stage/1/job".to_string());
    settings.insert("consoleURI".to_string(), "/console/b1".to_string());
    settings.insert("artifactUploadBaseUrl".to_string(), "/files".to_string());
    settings.insert("propertyBaseUrl".to_string(), "/properties".to_string());
    BuildCommand::start(settings)
}

/// Run one job (start + the given commands) to completion and return every
/// outbound message it produced.
pub async fn run_build(server: &MockServer, commands: Vec<BuildCommand>) -> Vec<Message> {
    let (tx, mut rx) = mpsc::channel(64);
    let ctx = StubContext::new(server.base_url());
    let session = BuildSession::new(reqwest::Client::new(), tx, ctx);

    let mut job = vec![start_command(server)];
    job.extend(commands);
    let _ = session.process_job(BuildCommand::compose(job)).await;

    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

pub fn report_result(messages: &[Message], action: &str) -> Option<String> {
    messages.iter().find(|m| m.action == action).and_then(|m| {
        m.data
            .get("data")
            .and_then(|d| d.get("result"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    })
}
