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

//! The one place where an unimplemented call ends guest execution.
//!
//! Under [`FatalPolicy::Exit`] the whole host process goes down with the
//! diagnostic on stderr. Under [`FatalPolicy::Trap`] the diagnostic becomes
//! the error of the current guest call instead.

use crate::config::FatalPolicy;
use crate::error::{trap, ShimError};
use crate::host::HostState;
use log::error;
use std::io::Write;
use wasmtime::Caller;

/// Exit status used when a fatal shim terminates the process.
pub const FATAL_EXIT_STATUS: i32 = 1;

pub fn escalate(policy: FatalPolicy, err: ShimError) -> wasmtime::Error {
    error!("fatal: {}", err);
    match policy {
        FatalPolicy::Exit => {
            // Written straight to the stream so the message survives output
            // capture and an unconfigured logger.
            let _ = writeln!(std::io::stderr().lock(), "fatal: {}", err);
            std::process::exit(FATAL_EXIT_STATUS);
        }
        FatalPolicy::Trap => trap(err),
    }
}

/// Escalates `err` under the caller's configured policy.
pub fn raise<T>(caller: &Caller<'_, HostState>, err: ShimError) -> wasmtime::Result<T> {
    Err(escalate(caller.data().config().fatal, err))
}

pub fn unsupported<T>(caller: &Caller<'_, HostState>, call: &str) -> wasmtime::Result<T> {
    raise(caller, ShimError::unsupported(call))
}
