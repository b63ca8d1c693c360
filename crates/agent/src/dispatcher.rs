// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound message dispatch. Owns at most one live build session; a new
//! job never starts until the prior session has fully drained.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use stoker_protocol::{
    AgentRuntimeInfo, BuildCommand, Message, ACTION_CANCEL_JOB, ACTION_CMD, ACTION_REREGISTER,
    ACTION_SET_COOKIE,
};
use stoker_session::{AgentContext, BuildSession, SessionHandle};

use crate::config::AgentConfig;
use crate::registration;
use crate::runtime;
use crate::state;

/// Dispatch outcome that the outer loop must act on.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server asked for a fresh registration; reconnect after backoff.
    #[error("received reregister message")]
    Reregister,
}

/// The session's view of this agent process.
pub struct AgentEnv {
    pub config: AgentConfig,
}

impl AgentEnv {
    pub fn new(config: AgentConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }
}

impl AgentContext for AgentEnv {
    fn full_server_url(&self, uri: &str) -> String {
        self.config.full_server_url(uri)
    }

    fn runtime_info(&self) -> AgentRuntimeInfo {
        runtime::agent_runtime_info(&self.config)
    }

    fn set_state(&self, key: &str, value: &str) {
        state::set_state(key, value);
    }
}

pub struct Dispatcher {
    client: reqwest::Client,
    send: mpsc::Sender<Message>,
    env: Arc<AgentEnv>,
    session: Option<SessionHandle>,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client, send: mpsc::Sender<Message>, env: Arc<AgentEnv>) -> Self {
        Self { client, send, env, session: None }
    }

    pub async fn dispatch(&mut self, message: &Message) -> Result<(), DispatchError> {
        match message.action.as_str() {
            ACTION_SET_COOKIE => {
                let cookie = message.data_field().and_then(|v| v.as_str()).unwrap_or_default();
                registration::store_cookie(&self.env.config, cookie);
            }
            ACTION_CANCEL_JOB => self.close_session().await,
            ACTION_REREGISTER => {
                registration::clean_registration(&self.env.config);
                return Err(DispatchError::Reregister);
            }
            ACTION_CMD => self.start_build(message).await,
            other => {
                tracing::info!(action = other, "ignoring unknown message action");
            }
        }
        Ok(())
    }

    /// Start a new session for an inbound job, draining the prior one
    /// first. The job runs on its own task with the process-wide runtime
    /// status set to Building for its duration.
    async fn start_build(&mut self, message: &Message) {
        self.close_session().await;

        let Some(data) = message.data_field() else {
            tracing::warn!("cmd message without a command payload");
            return;
        };
        let command: BuildCommand = match serde_json::from_value(data.clone()) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "malformed build command, ignored");
                return;
            }
        };

        let context: Arc<dyn AgentContext> = self.env.clone();
        let session = BuildSession::new(self.client.clone(), self.send.clone(), context);
        let cancel = session.cancel_token();
        let env = Arc::clone(&self.env);
        let task = tokio::spawn(async move {
            env.set_state(state::RUNTIME_STATUS, state::STATUS_BUILDING);
            tracing::info!("start processing build command");
            if let Err(err) = session.process_job(command).await {
                tracing::info!(error = %err, "build finished with error");
            }
            env.set_state(state::RUNTIME_STATUS, state::STATUS_IDLE);
        });
        self.session = Some(SessionHandle::new(cancel, task));
    }

    /// Cancel the live session (if any) and wait until it has drained.
    pub async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
