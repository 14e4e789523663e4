/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of embridge.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config Read Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config Parse Error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What happens when the guest reaches a call this layer does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalPolicy {
    /// Print the diagnostic and terminate the host process with status 1.
    #[default]
    Exit,
    /// Fail the current guest call with the same diagnostic.
    Trap,
}

/// How the `invoke_*` trampolines treat indirect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndirectCalls {
    /// Every trampoline goes down the fatal path.
    #[default]
    Fatal,
    /// Dispatch through the guest's `__indirect_function_table`.
    Resolve,
}

/// Per-instance shim settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    pub fatal: FatalPolicy,
    pub indirect_calls: IndirectCalls,
    /// Let `emscripten_resize_heap` grow linear memory.
    pub heap_growth: bool,
    /// Register the WASI preview1 subset next to `env`.
    pub wasi: bool,
    /// Keep guest stdout/stderr in `HostState` instead of forwarding them.
    pub capture_output: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        ShimConfig {
            fatal: FatalPolicy::Exit,
            indirect_calls: IndirectCalls::Fatal,
            heap_growth: false,
            wasi: true,
            capture_output: false,
        }
    }
}

impl ShimConfig {
    /// Defaults with fatal calls turned into traps. Used by embedders that
    /// must survive a misbehaving guest, and by the test-suite.
    pub fn trapping() -> Self {
        ShimConfig {
            fatal: FatalPolicy::Trap,
            ..ShimConfig::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
