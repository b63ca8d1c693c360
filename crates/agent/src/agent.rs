// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's outer loop: register, connect, pump messages, and on any
//! transport failure reconnect after a fixed backoff.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use stoker_protocol::Message;

use crate::dispatcher::{AgentEnv, DispatchError, Dispatcher};
use crate::registration::{self, RegistrationError};
use crate::runtime;
use crate::transport::{Connection, TransportError};

const RECONNECT_DELAY: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("websocket connection closed")]
    ConnectionClosed,

    #[error("outbound channel closed")]
    ChannelClosed,
}

/// Run the agent until the process is killed. Every failed attempt logs,
/// sleeps, and starts over with a fresh registration.
pub async fn run_forever(env: Arc<AgentEnv>) {
    let client = reqwest::Client::new();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    tokio::spawn(ping_loop(Arc::clone(&env), outbound_tx.clone()));
    registration::load_cookie(&env.config);

    loop {
        if let Err(err) = run_once(&env, &client, &outbound_tx, &mut outbound_rx).await {
            tracing::info!(error = %err, "agent loop ended");
        }
        tracing::info!("sleeping {}s before reconnecting", RECONNECT_DELAY.as_secs());
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// One register-connect-pump cycle. Always drains the live session before
/// returning, whatever ended the cycle.
async fn run_once(
    env: &Arc<AgentEnv>,
    client: &reqwest::Client,
    outbound_tx: &mpsc::Sender<Message>,
    outbound_rx: &mut mpsc::Receiver<Message>,
) -> Result<(), AgentError> {
    registration::register(client, &env.config).await?;
    let mut conn = Connection::connect(&env.config).await?;
    let mut dispatcher = Dispatcher::new(client.clone(), outbound_tx.clone(), Arc::clone(env));

    let result = loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(message) => {
                    if let Err(e) = conn.send(&message).await {
                        break Err(AgentError::from(e));
                    }
                }
                None => break Err(AgentError::ChannelClosed),
            },
            inbound = conn.next() => match inbound {
                Some(Ok(message)) => {
                    if let Err(e) = dispatcher.dispatch(&message).await {
                        break Err(AgentError::from(e));
                    }
                }
                Some(Err(e)) => break Err(AgentError::from(e)),
                None => break Err(AgentError::ConnectionClosed),
            },
        }
    };

    dispatcher.close_session().await;
    result
}

/// Heartbeat: one ping with fresh runtime info every 10 seconds.
async fn ping_loop(env: Arc<AgentEnv>, outbound_tx: mpsc::Sender<Message>) {
    let mut ticker = tokio::time::interval(PING_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match Message::ping(&runtime::agent_runtime_info(&env.config)) {
            Ok(message) => {
                if outbound_tx.send(message).await.is_err() {
                    return;
                }
            }
            Err(e) => tracing::warn!(error = %e, "ping encode failed"),
        }
    }
}
