// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The build console: a line-buffered sink streamed to the server.
//!
//! Writers push bytes onto a bounded channel; a background task assembles
//! timestamped lines and posts accumulated chunks to the per-build console
//! URL every few seconds and on close. The console doubles as the stdio
//! sink for `exec` subprocesses.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const CHANNEL_BOUND: usize = 256;

enum ConsoleCommand {
    Write(Vec<u8>),
    Close(oneshot::Sender<()>),
}

/// Cloneable handle to one build's console stream.
#[derive(Clone)]
pub struct BuildConsole {
    tx: mpsc::Sender<ConsoleCommand>,
}

impl BuildConsole {
    /// Bind a console to its endpoint and start the flush task.
    pub fn new(client: reqwest::Client, url: String) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BOUND);
        tokio::spawn(flush_loop(client, url, rx));
        Self { tx }
    }

    /// Append raw bytes. Blocks only while the channel is at capacity.
    pub async fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.tx.send(ConsoleCommand::Write(bytes.to_vec())).await.is_err() {
            tracing::warn!(len = bytes.len(), "console closed, dropping bytes");
        }
    }

    /// Append a line plus newline.
    pub async fn write_line(&self, line: impl AsRef<str>) {
        let mut bytes = line.as_ref().as_bytes().to_vec();
        bytes.push(b'\n');
        if self.tx.send(ConsoleCommand::Write(bytes)).await.is_err() {
            tracing::warn!(line = line.as_ref(), "console closed, dropping line");
        }
    }

    /// Flush and release the endpoint. Idempotent: closing an already
    /// closed console is a no-op.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ConsoleCommand::Close(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn flush_loop(
    client: reqwest::Client,
    url: String,
    mut rx: mpsc::Receiver<ConsoleCommand>,
) {
    // Bytes of the current, not yet newline-terminated line.
    let mut pending: Vec<u8> = Vec::new();
    // Timestamped complete lines awaiting the next flush.
    let mut chunk = String::new();
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(ConsoleCommand::Write(bytes)) => {
                    pending.extend_from_slice(&bytes);
                    drain_lines(&mut pending, &mut chunk);
                }
                Some(ConsoleCommand::Close(ack)) => {
                    finish(&client, &url, &mut pending, &mut chunk).await;
                    let _ = ack.send(());
                    return;
                }
                None => {
                    finish(&client, &url, &mut pending, &mut chunk).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                flush(&client, &url, &mut chunk).await;
            }
        }
    }
}

/// Move complete lines out of `pending`, timestamping each.
fn drain_lines(pending: &mut Vec<u8>, chunk: &mut String) {
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let rest = pending.split_off(pos + 1);
        let line = String::from_utf8_lossy(&pending[..pos]).into_owned();
        pending.clear();
        pending.extend_from_slice(&rest);
        push_line(chunk, &line);
    }
}

fn push_line(chunk: &mut String, line: &str) {
    let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
    chunk.push_str(&format!("{stamp} {line}\n"));
}

/// Final flush on close: a trailing partial line becomes the last line.
async fn finish(client: &reqwest::Client, url: &str, pending: &mut Vec<u8>, chunk: &mut String) {
    if !pending.is_empty() {
        let line = String::from_utf8_lossy(pending).into_owned();
        pending.clear();
        push_line(chunk, &line);
    }
    flush(client, url, chunk).await;
}

/// Post the accumulated chunk. The server tolerates arbitrary chunking of
/// newline-terminated segments; a failed post drops the chunk after logging
/// so the build is never wedged on its own log stream.
async fn flush(client: &reqwest::Client, url: &str, chunk: &mut String) {
    if chunk.is_empty() {
        return;
    }
    let body = std::mem::take(chunk);
    match client.post(url).body(body).send().await {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => {
            tracing::error!(url, status = %resp.status(), "console upload rejected");
        }
        Err(e) => {
            tracing::error!(url, error = %e, "console upload failed");
        }
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
