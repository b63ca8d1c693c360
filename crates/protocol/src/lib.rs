// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stoker-protocol: wire envelope and build command tree shared by the
//! agent and its server connection.
//!
//! Wire format: JSON text frames over the agent websocket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod message;
mod runtime_info;

pub use command::{BuildCommand, RunIf, TestGuard};
pub use message::{
    decode, encode, Message, ProtocolError, Report, ACTION_CANCEL_JOB, ACTION_CMD, ACTION_PING,
    ACTION_REREGISTER, ACTION_SET_COOKIE, REPORT_TYPE, RUNTIME_INFO_TYPE,
};
pub use runtime_info::AgentRuntimeInfo;
