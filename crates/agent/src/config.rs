// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration from environment variables.
//!
//! The agent takes no command-line flags: everything comes from
//! `STOKER_*` variables, with the agent UUID persisted under the config
//! directory so the server keeps recognizing this host across restarts.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("STOKER_SERVER_URL is not set")]
    MissingServerUrl,

    #[error("config dir {path}: {source}")]
    ConfigDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Server base URL, no trailing slash (e.g. `https://ci.example:8154`).
    pub server_url: String,
    /// Websocket endpoint; derived from `server_url` when not set.
    pub ws_url: String,
    pub work_dir: PathBuf,
    /// Holds the persisted `uuid` and `cookie` files.
    pub config_dir: PathBuf,
    pub auto_register_key: String,
    pub auto_register_resources: String,
    pub auto_register_environments: String,
    pub elastic_agent_id: String,
    pub elastic_plugin_id: String,
    pub uuid: String,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_url = std::env::var("STOKER_SERVER_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingServerUrl)?
            .trim_end_matches('/')
            .to_string();

        let work_dir = std::env::var("STOKER_WORK_DIR")
            .map(PathBuf::from)
            .or_else(|_| std::env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));

        let config_dir = std::env::var("STOKER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join(".stoker"));
        std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::ConfigDir {
            path: config_dir.display().to_string(),
            source,
        })?;
        let uuid = load_or_create_uuid(&config_dir)?;

        let ws_url = std::env::var("STOKER_SERVER_WS_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| derive_ws_url(&server_url));

        Ok(Self {
            server_url,
            ws_url,
            work_dir,
            config_dir,
            auto_register_key: env_or_default("STOKER_AUTO_REGISTER_KEY"),
            auto_register_resources: env_or_default("STOKER_AUTO_REGISTER_RESOURCES"),
            auto_register_environments: env_or_default("STOKER_AUTO_REGISTER_ENVIRONMENTS"),
            elastic_agent_id: env_or_default("STOKER_ELASTIC_AGENT_ID"),
            elastic_plugin_id: env_or_default("STOKER_ELASTIC_PLUGIN_ID"),
            uuid,
        })
    }

    /// Qualify a server-relative URI; URIs that already carry a scheme are
    /// returned as is.
    pub fn full_server_url(&self, uri: &str) -> String {
        if uri.contains("://") {
            uri.to_string()
        } else if uri.starts_with('/') {
            format!("{}{}", self.server_url, uri)
        } else {
            format!("{}/{}", self.server_url, uri)
        }
    }

    pub fn registration_url(&self) -> String {
        self.full_server_url("/go/admin/agent")
    }

    pub fn cookie_file(&self) -> PathBuf {
        self.config_dir.join("cookie")
    }
}

fn env_or_default(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// `wss://host/agent-websocket` for an https server, `ws://` for http.
pub fn derive_ws_url(server_url: &str) -> String {
    let base = if let Some(rest) = server_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("wss://{server_url}")
    };
    format!("{}/agent-websocket", base.trim_end_matches('/'))
}

/// Read the persisted agent UUID, minting and storing one on first run.
pub fn load_or_create_uuid(config_dir: &Path) -> Result<String, ConfigError> {
    let path = config_dir.join("uuid");
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }
    let fresh = uuid::Uuid::new_v4().to_string();
    std::fs::write(&path, &fresh).map_err(|source| ConfigError::ConfigDir {
        path: path.display().to_string(),
        source,
    })?;
    Ok(fresh)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
