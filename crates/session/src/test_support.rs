// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures: an in-process HTTP capture server standing in for the CI
//! server's console/artifact endpoints, and a stub agent context.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use stoker_protocol::AgentRuntimeInfo;

use crate::build::AgentContext;

/// One captured HTTP request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Minimal HTTP/1.1 capture server: records every request, answers 200.
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = handle_connection(stream, recorded).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Bodies of every request whose path starts with `path_prefix`,
    /// concatenated in arrival order.
    pub fn text_for(&self, path_prefix: &str) -> String {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path.starts_with(path_prefix))
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    /// Checksum manifest lines (`<destPath>=<md5hex>`) found in any request
    /// body, `#` comments excluded.
    pub fn checksum_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for request in self.requests.lock().iter() {
            let text = String::from_utf8_lossy(&request.body);
            for line in text.lines() {
                if is_checksum_line(line) {
                    lines.push(line.to_string());
                }
            }
        }
        lines
    }
}

fn is_checksum_line(line: &str) -> bool {
    if line.starts_with('#') || line.starts_with("--") {
        return false;
    }
    match line.rsplit_once('=') {
        Some((path, digest)) => {
            !path.is_empty() && digest.len() == 32 && digest.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

async fn handle_connection(
    stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    // Head: request line + headers, up to the blank line.
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if reader.read_exact(&mut byte).await.is_err() {
            return Ok(());
        }
        head.push(byte[0]);
    }
    let head_text = String::from_utf8_lossy(&head);
    let mut lines = head_text.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.trim().parse().ok(),
            "transfer-encoding" => chunked = value.trim().eq_ignore_ascii_case("chunked"),
            _ => {}
        }
    }

    let body = if chunked {
        read_chunked(&mut reader).await?
    } else {
        let mut body = vec![0u8; content_length.unwrap_or(0)];
        reader.read_exact(&mut body).await?;
        body
    };

    recorded.lock().push(RecordedRequest { method, path, body });

    let mut stream = reader.into_inner();
    stream
        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
        .await?;
    stream.shutdown().await
}

async fn read_chunked(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        // Chunk size line, hex.
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while !line.ends_with(b"\r\n") {
            reader.read_exact(&mut byte).await?;
            line.push(byte[0]);
        }
        let size_text = String::from_utf8_lossy(&line[..line.len() - 2]).into_owned();
        let size = usize::from_str_radix(size_text.split(';').next().unwrap_or("0"), 16)
            .unwrap_or(0);
        if size == 0 {
            // Trailing CRLF after the last chunk.
            let mut tail = [0u8; 2];
            let _ = reader.read_exact(&mut tail).await;
            return Ok(body);
        }
        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk).await?;
        body.extend_from_slice(&chunk);
        let mut sep = [0u8; 2];
        reader.read_exact(&mut sep).await?;
    }
}

/// Strip the leading `HH:MM:SS.mmm ` stamp from every console line.
pub fn trim_timestamps(log: &str) -> String {
    log.lines()
        .map(|line| match line.split_once(' ') {
            Some((_, rest)) => format!("{rest}\n"),
            None => format!("{line}\n"),
        })
        .collect()
}

/// Agent context stub: qualifies URLs against one base and records state
/// writes for assertions.
pub struct StubContext {
    server_url: String,
    pub states: Mutex<HashMap<String, String>>,
}

impl StubContext {
    pub fn new(server_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { server_url: server_url.into(), states: Mutex::new(HashMap::new()) })
    }

    pub fn state(&self, key: &str) -> Option<String> {
        self.states.lock().get(key).cloned()
    }
}

impl AgentContext for StubContext {
    fn full_server_url(&self, uri: &str) -> String {
        if uri.contains("://") {
            uri.to_string()
        } else {
            format!("{}{}", self.server_url.trim_end_matches('/'), uri)
        }
    }

    fn runtime_info(&self) -> AgentRuntimeInfo {
        AgentRuntimeInfo {
            hostname: "test-agent".into(),
            uuid: "00000000-0000-4000-8000-000000000000".into(),
            location: ".".into(),
            operating_system: std::env::consts::OS.into(),
            usablespace: "5000000000".into(),
            ..AgentRuntimeInfo::default()
        }
    }

    fn set_state(&self, key: &str, value: &str) {
        self.states.lock().insert(key.to_string(), value.to_string());
    }
}
