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

//! The slice of `wasi_snapshot_preview1` a standalone Emscripten guest
//! touches before it does anything interesting: console output, exit,
//! empty args/environment, clocks and randomness.

use crate::error::{trap, ShimError};
use crate::fatal;
use crate::host::HostState;
use crate::memory::{check_bounds, GuestMemory, LinearMemory};
use crate::registrar::{ImportRegistrar, WASI};
use rand::rngs::OsRng;
use rand::RngCore;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use wasmtime::Caller;

const ERRNO_SUCCESS: i32 = 0;
const ERRNO_BADF: i32 = 8;
const ERRNO_INVAL: i32 = 28;
const ERRNO_IO: i32 = 29;

const CLOCK_REALTIME: i32 = 0;
const CLOCK_MONOTONIC: i32 = 1;

// =============================================================================
// Output
// =============================================================================

/// fd_write(fd, iovs, iovs_len, nwritten) -> errno
///
/// Each iovec is `{ buf: u32, len: u32 }`, 8 bytes, little-endian. The whole
/// array and every buffer are bounds-checked before anything is written, and
/// the buffers are streamed to the sink one at a time. A request for more
/// bytes than the guest memory holds is refused with `EINVAL`.
fn fd_write(
    mut caller: Caller<'_, HostState>,
    fd: i32,
    iovs: i32,
    iovs_len: i32,
    nwritten: i32,
) -> wasmtime::Result<i32> {
    if fd != 1 && fd != 2 {
        return Ok(ERRNO_BADF);
    }
    let capture = caller.data().config().capture_output;
    let mut memory = LinearMemory::from_caller(&mut caller).map_err(trap)?;

    let iovecs = read_iovecs(&memory, iovs as u32, iovs_len as u32).map_err(trap)?;
    check_bounds(nwritten as u32 as u64, 4, memory.size()).map_err(trap)?;
    let mut total: u64 = 0;
    for &(buf, len) in &iovecs {
        check_bounds(buf as u64, len as u64, memory.size()).map_err(trap)?;
        total += len as u64;
    }
    if total > memory.size() {
        return Ok(ERRNO_INVAL);
    }

    for (buf, len) in iovecs {
        let bytes = memory.read(buf, len).map_err(trap)?;
        if capture {
            let state = memory.context_mut().data_mut();
            let sink = if fd == 1 {
                &mut state.stdout
            } else {
                &mut state.stderr
            };
            sink.extend_from_slice(&bytes);
            continue;
        }
        let written = if fd == 1 {
            std::io::stdout().lock().write_all(&bytes)
        } else {
            std::io::stderr().lock().write_all(&bytes)
        };
        if written.is_err() {
            return Ok(ERRNO_IO);
        }
    }

    memory
        .write_u32(nwritten as u32, total as u32)
        .map_err(trap)?;
    Ok(ERRNO_SUCCESS)
}

/// Reads `count` iovecs starting at `iovs` as `(buf, len)` pairs.
fn read_iovecs(
    memory: &impl GuestMemory,
    iovs: u32,
    count: u32,
) -> Result<Vec<(u32, u32)>, ShimError> {
    let length = count as u64 * 8;
    check_bounds(iovs as u64, length, memory.size())?;
    let length = u32::try_from(length).map_err(|_| ShimError::OutOfBounds {
        offset: iovs as u64,
        length,
        size: memory.size(),
    })?;
    let table = memory.read(iovs, length)?;
    Ok(table
        .chunks_exact(8)
        .map(|iov| {
            (
                u32::from_le_bytes([iov[0], iov[1], iov[2], iov[3]]),
                u32::from_le_bytes([iov[4], iov[5], iov[6], iov[7]]),
            )
        })
        .collect())
}

fn proc_exit(_caller: Caller<'_, HostState>, code: i32) -> wasmtime::Result<()> {
    Err(trap(ShimError::GuestExit(code)))
}

// =============================================================================
// Arguments and environment (always empty)
// =============================================================================

fn write_empty_sizes(
    mut caller: Caller<'_, HostState>,
    count_ptr: i32,
    buf_size_ptr: i32,
) -> wasmtime::Result<i32> {
    let mut memory = LinearMemory::from_caller(&mut caller).map_err(trap)?;
    memory.write_u32(count_ptr as u32, 0).map_err(trap)?;
    memory.write_u32(buf_size_ptr as u32, 0).map_err(trap)?;
    Ok(ERRNO_SUCCESS)
}

fn no_entries(_caller: Caller<'_, HostState>, _ptrs: i32, _buf: i32) -> i32 {
    ERRNO_SUCCESS
}

// =============================================================================
// Clock and randomness
// =============================================================================

fn clock_time_get(
    mut caller: Caller<'_, HostState>,
    clock_id: i32,
    _precision: i64,
    time_ptr: i32,
) -> wasmtime::Result<i32> {
    if clock_id != CLOCK_REALTIME && clock_id != CLOCK_MONOTONIC {
        return Ok(ERRNO_INVAL);
    }
    let nanos = if clock_id == CLOCK_MONOTONIC {
        caller.data().monotonic_nanos()
    } else {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    };
    let mut memory = LinearMemory::from_caller(&mut caller).map_err(trap)?;
    memory.write_u64(time_ptr as u32, nanos).map_err(trap)?;
    Ok(ERRNO_SUCCESS)
}

fn random_get(mut caller: Caller<'_, HostState>, buf: i32, len: i32) -> wasmtime::Result<i32> {
    let mut memory = LinearMemory::from_caller(&mut caller).map_err(trap)?;
    check_bounds(buf as u32 as u64, len as u32 as u64, memory.size())
        .map_err(trap)?;
    let mut bytes = vec![0u8; len as u32 as usize];
    OsRng.fill_bytes(&mut bytes);
    memory.write(buf as u32, &bytes).map_err(trap)?;
    Ok(ERRNO_SUCCESS)
}

// =============================================================================
// Files (not provided)
// =============================================================================

fn fd_read(
    caller: Caller<'_, HostState>,
    _fd: i32,
    _iovs: i32,
    _iovs_len: i32,
    _nread: i32,
) -> wasmtime::Result<i32> {
    fatal::unsupported(&caller, "fd_read")
}

fn fd_close(caller: Caller<'_, HostState>, _fd: i32) -> wasmtime::Result<i32> {
    fatal::unsupported(&caller, "fd_close")
}

fn fd_seek(
    caller: Caller<'_, HostState>,
    _fd: i32,
    _offset: i64,
    _whence: i32,
    _newoffset: i32,
) -> wasmtime::Result<i32> {
    fatal::unsupported(&caller, "fd_seek")
}

pub(crate) fn link(registrar: &mut ImportRegistrar) -> Result<(), ShimError> {
    registrar.wrap(WASI, &["fd_write"], fd_write)?;
    registrar.wrap(WASI, &["proc_exit"], proc_exit)?;
    registrar.wrap(WASI, &["environ_sizes_get"], write_empty_sizes)?;
    registrar.wrap(WASI, &["environ_get"], no_entries)?;
    registrar.wrap(WASI, &["args_sizes_get"], write_empty_sizes)?;
    registrar.wrap(WASI, &["args_get"], no_entries)?;
    registrar.wrap(WASI, &["clock_time_get"], clock_time_get)?;
    registrar.wrap(WASI, &["random_get"], random_get)?;
    registrar.wrap(WASI, &["fd_read"], fd_read)?;
    registrar.wrap(WASI, &["fd_close"], fd_close)?;
    registrar.wrap(WASI, &["fd_seek"], fd_seek)?;
    Ok(())
}
