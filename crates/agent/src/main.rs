// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stokerd: the remote build agent daemon.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use stoker_agent::dispatcher::AgentEnv;
use stoker_agent::{agent, AgentConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::from_env().context("load agent configuration")?;
    tracing::info!(
        server = %config.server_url,
        uuid = %config.uuid,
        work_dir = %config.work_dir.display(),
        "stoker agent starting"
    );

    agent::run_forever(AgentEnv::new(config)).await;
    Ok(())
}
