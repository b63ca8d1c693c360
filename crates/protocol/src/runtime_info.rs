// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime info, produced on demand for pings, reports, and the
//! registration payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeInfo {
    pub hostname: String,
    pub uuid: String,
    /// The agent's working directory.
    pub location: String,
    pub operating_system: String,
    /// Usable disk space, decimal bytes as a string.
    #[serde(rename = "usablespace")]
    pub usablespace: String,
    pub agent_auto_register_key: String,
    pub agent_auto_register_resources: String,
    pub agent_auto_register_environments: String,
    pub agent_auto_register_hostname: String,
    pub elastic_agent_id: String,
    pub elastic_plugin_id: String,
}
