// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the session engine.

use std::io::ErrorKind;

use thiserror::Error;

/// Errors from the artifact upload pipeline.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The source path does not exist or cannot be inspected. The message
    /// mirrors the OS `stat` wording so it reads the same in the build
    /// console on every platform.
    #[error("stat {path}: {message}")]
    Stat { path: String, message: String },

    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("upload {path} to {url} failed: {source}")]
    Http {
        path: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upload to {url} rejected with status {status}")]
    Rejected { url: String, status: u16 },
}

impl UploadError {
    pub(crate) fn stat(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Stat { path: path.into(), message: stat_message(err) }
    }
}

/// Errors from processing one build command.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `test -d` on a path that cannot be inspected.
    #[error("stat {path}: {message}")]
    Stat { path: String, message: String },

    #[error("unknown test flag")]
    UnknownTestFlag,

    /// A command that needs the console or uploaders arrived before `start`.
    #[error("build session not started, ignored command {command}")]
    NotStarted { command: String },

    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command}: exit status {code}")]
    ExitStatus { command: String, code: i32 },

    /// The subprocess was killed because the build was canceled. Never
    /// recorded as a build failure.
    #[error("{command} is canceled")]
    Canceled { command: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("encode report: {0}")]
    Report(#[from] stoker_protocol::ProtocolError),
}

impl SessionError {
    pub(crate) fn stat(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Stat { path: path.into(), message: stat_message(err) }
    }

    /// Cancellation steers control flow but is not a build failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

/// Map an I/O error to the classic `stat` wording.
fn stat_message(err: &std::io::Error) -> String {
    match err.kind() {
        ErrorKind::NotFound => "no such file or directory".to_string(),
        ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}
