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

use thiserror::Error;

/// Errors raised by the shim layer.
///
/// Shims hand these to wasmtime wrapped in a `wasmtime::Error`, so whoever
/// drives the guest can recover the original value with `downcast_ref`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShimError {
    #[error("guest memory access out of bounds: offset {offset}, length {length}, memory size {size}")]
    OutOfBounds { offset: u64, length: u64, size: u64 },
    #[error("Called into {call}: unsupported operation")]
    Unsupported { call: String },
    #[error("Called into {call}: guest aborted")]
    Aborted { call: String },
    #[error("Configuration Error: import {namespace}::{name} registered twice")]
    DuplicateImport { namespace: String, name: String },
    #[error("Configuration Error: guest imports {namespace}::{name}, which has no shim")]
    MissingImport { namespace: String, name: String },
    #[error("Configuration Error: failed to link {namespace}::{name}: {message}")]
    Link {
        namespace: String,
        name: String,
        message: String,
    },
    #[error("guest does not export a linear memory named `memory`")]
    NoMemory,
    #[error("indirect call through table slot {index} failed: {reason}")]
    BadTableEntry { index: u32, reason: String },
    #[error("guest exited with code {0}")]
    GuestExit(i32),
}

impl ShimError {
    pub fn unsupported(call: &str) -> Self {
        ShimError::Unsupported {
            call: call.to_string(),
        }
    }

    /// True for errors the registrar raises before any guest code runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ShimError::DuplicateImport { .. }
                | ShimError::MissingImport { .. }
                | ShimError::Link { .. }
        )
    }
}

/// Wraps a shim error as the error type wasmtime expects from host calls.
pub fn trap(err: ShimError) -> wasmtime::Error {
    wasmtime::Error::new(err)
}

/// Finds the `ShimError` behind a failed wasmtime call, if there is one.
pub fn shim_error(err: &wasmtime::Error) -> Option<&ShimError> {
    err.downcast_ref::<ShimError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_names_call() {
        let err = ShimError::unsupported("__syscall_unlink");
        assert_eq!(
            err.to_string(),
            "Called into __syscall_unlink: unsupported operation"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_kinds() {
        let dup = ShimError::DuplicateImport {
            namespace: "env".to_string(),
            name: "getTempRet0".to_string(),
        };
        assert!(dup.is_configuration());
        assert!(dup.to_string().contains("env::getTempRet0"));
        assert!(!ShimError::NoMemory.is_configuration());
    }

    #[test]
    fn test_trap_round_trips_through_downcast() {
        let err = trap(ShimError::GuestExit(3));
        assert_eq!(shim_error(&err), Some(&ShimError::GuestExit(3)));
    }
}
