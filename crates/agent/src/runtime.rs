// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime info snapshots for pings, reports and registration.

use stoker_protocol::AgentRuntimeInfo;

use crate::config::AgentConfig;

/// Reported usable disk space, decimal bytes.
const USABLE_SPACE: &str = "5000000000";

pub fn agent_runtime_info(config: &AgentConfig) -> AgentRuntimeInfo {
    let hostname = hostname();
    AgentRuntimeInfo {
        uuid: config.uuid.clone(),
        location: config.work_dir.display().to_string(),
        operating_system: std::env::consts::OS.to_string(),
        usablespace: USABLE_SPACE.to_string(),
        agent_auto_register_key: config.auto_register_key.clone(),
        agent_auto_register_resources: config.auto_register_resources.clone(),
        agent_auto_register_environments: config.auto_register_environments.clone(),
        agent_auto_register_hostname: hostname.clone(),
        elastic_agent_id: config.elastic_agent_id.clone(),
        elastic_plugin_id: config.elastic_plugin_id.clone(),
        hostname,
    }
}

fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    detect_hostname().unwrap_or_else(|| "localhost".to_string())
}

fn detect_hostname() -> Option<String> {
    let output = std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
