// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registration with the server, and the persisted cookie that goes
//! with it.

use thiserror::Error;

use crate::config::AgentConfig;
use crate::runtime;
use crate::state;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registration rejected with status {0}")]
    Rejected(u16),
}

/// Announce this agent to the server with its auto-register payload.
pub async fn register(
    client: &reqwest::Client,
    config: &AgentConfig,
) -> Result<(), RegistrationError> {
    let url = config.registration_url();
    let payload = runtime::agent_runtime_info(config);
    let resp = client.post(&url).json(&payload).send().await?;
    if !resp.status().is_success() {
        return Err(RegistrationError::Rejected(resp.status().as_u16()));
    }
    tracing::info!(url, uuid = %config.uuid, "registered with server");
    Ok(())
}

/// Remember the server-issued cookie, in memory and on disk so a restarted
/// agent presents it again.
pub fn store_cookie(config: &AgentConfig, cookie: &str) {
    state::set_state("cookie", cookie);
    if let Err(e) = std::fs::write(config.cookie_file(), cookie) {
        tracing::warn!(error = %e, "failed to persist cookie");
    }
}

/// Load a cookie persisted by a previous run.
pub fn load_cookie(config: &AgentConfig) {
    if let Ok(cookie) = std::fs::read_to_string(config.cookie_file()) {
        let cookie = cookie.trim();
        if !cookie.is_empty() {
            state::set_state("cookie", cookie);
        }
    }
}

/// Forget the persisted registration so the next attempt starts fresh.
pub fn clean_registration(config: &AgentConfig) {
    state::set_state("cookie", "");
    if let Err(e) = std::fs::remove_file(config.cookie_file()) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, "failed to remove cookie file");
        }
    }
    tracing::info!("cleared persisted registration");
}
