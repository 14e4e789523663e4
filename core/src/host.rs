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

use crate::config::ShimConfig;
use crate::staging::StagingRegister;
use std::time::Instant;

/// Store data for one guest instance.
///
/// Everything a shim may mutate lives here, so two guests running in the
/// same process never observe each other's state.
#[derive(Debug, Clone)]
pub struct HostState {
    config: ShimConfig,
    staging: StagingRegister,
    memory_growth_notices: Vec<u32>,
    /// Origin of the guest's monotonic clock.
    clock_origin: Instant,
    /// Guest output kept when `capture_output` is on.
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Default for HostState {
    fn default() -> Self {
        HostState {
            config: ShimConfig::default(),
            staging: StagingRegister::default(),
            memory_growth_notices: Vec::new(),
            clock_origin: Instant::now(),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

impl HostState {
    pub fn new(config: ShimConfig) -> Self {
        HostState {
            config,
            ..HostState::default()
        }
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingRegister {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut StagingRegister {
        &mut self.staging
    }

    pub fn record_memory_growth(&mut self, value: u32) {
        self.memory_growth_notices.push(value);
    }

    /// Nanoseconds since this state was created. Never decreases.
    pub fn monotonic_nanos(&self) -> u64 {
        self.clock_origin.elapsed().as_nanos() as u64
    }

    /// Every value passed to `emscripten_notify_memory_growth`, oldest first.
    pub fn memory_growth_notices(&self) -> &[u32] {
        &self.memory_growth_notices
    }
}
