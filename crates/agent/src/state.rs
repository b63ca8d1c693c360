// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide key/value state shared by the dispatcher and the session
//! (`cookie`, `runtimeStatus`, build locators). Readers see eventual
//! values only.

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;

pub const RUNTIME_STATUS: &str = "runtimeStatus";
pub const STATUS_BUILDING: &str = "Building";
pub const STATUS_IDLE: &str = "Idle";

static STATE: LazyLock<Mutex<HashMap<String, String>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub fn set_state(key: &str, value: &str) {
    STATE.lock().insert(key.to_string(), value.to_string());
}

pub fn get_state(key: &str) -> Option<String> {
    STATE.lock().get(key).cloned()
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
