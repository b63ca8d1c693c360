// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelope for the agent websocket.
//!
//! Every frame in either direction is `{action, data}`. Inbound actions are
//! dispatched by name; outbound frames are pings and build reports, whose
//! `data` carries a server-side type tag next to the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::runtime_info::AgentRuntimeInfo;

pub const ACTION_PING: &str = "ping";
pub const ACTION_SET_COOKIE: &str = "setCookie";
pub const ACTION_CANCEL_JOB: &str = "cancelJob";
pub const ACTION_REREGISTER: &str = "reregister";
pub const ACTION_CMD: &str = "cmd";

/// Server-side type tag for report payloads.
pub const REPORT_TYPE: &str = "com.thoughtworks.go.websocket.Report";
/// Server-side type tag for ping payloads.
pub const RUNTIME_INFO_TYPE: &str = "com.thoughtworks.go.server.service.ElasticAgentRuntimeInfo";

/// Errors from envelope encoding and decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The `{action, data}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

impl Message {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self { action: action.into(), data }
    }

    /// The nested `data.data` field, where inbound envelopes carry their
    /// payload (the command tree for `cmd`, the cookie for `setCookie`).
    pub fn data_field(&self) -> Option<&Value> {
        self.data.get("data")
    }

    /// Heartbeat frame carrying the agent's runtime info.
    pub fn ping(info: &AgentRuntimeInfo) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            ACTION_PING,
            serde_json::json!({
                "type": RUNTIME_INFO_TYPE,
                "data": serde_json::to_value(info)?,
            }),
        ))
    }

    /// Build report frame; `action` is the report command's own name
    /// (`reportCurrentStatus`, `reportCompleting`, `reportCompleted`).
    pub fn report(action: impl Into<String>, report: &Report) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            action,
            serde_json::json!({
                "type": REPORT_TYPE,
                "data": serde_json::to_value(report)?,
            }),
        ))
    }
}

/// Payload of a build report frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub agent_runtime_info: AgentRuntimeInfo,
    pub build_id: String,
    pub job_state: String,
    /// Capitalized build status: `Passed` or `Failed`.
    pub result: String,
}

/// Encode an envelope as a JSON text frame.
pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decode a JSON text frame into an envelope.
pub fn decode(text: &str) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
