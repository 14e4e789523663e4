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

//! Host-side emulation of the Emscripten `env` runtime for guests running
//! under wasmtime: runtime primitives, `invoke_*` trampolines, a stubbed
//! syscall table and a minimal WASI preview1 surface.

pub mod config;
pub mod error;
pub mod fatal;
pub mod guest;
pub mod host;
pub mod memory;
pub mod registrar;
pub mod runtime_support;
pub mod staging;
pub mod syscalls;
#[cfg(test)]
mod testing;
pub mod trampoline;
pub mod wasi;

pub use config::{FatalPolicy, IndirectCalls, ShimConfig};
pub use error::ShimError;
pub use guest::{GuestError, GuestInstance};
pub use host::HostState;
pub use memory::{GuestMemory, LinearMemory};
pub use registrar::ImportRegistrar;
