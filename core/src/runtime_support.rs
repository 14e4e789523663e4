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

//! Runtime primitives every Emscripten guest assumes: memory-growth
//! notices, the tempRet0 staging slot, heap growth, abort and bulk copy.

use crate::error::{trap, ShimError};
use crate::fatal;
use crate::host::HostState;
use crate::memory::{GuestMemory, LinearMemory, WASM_PAGE_SIZE};
use crate::registrar::{ImportRegistrar, ENV};
use log::{debug, info, warn};
use wasmtime::Caller;

fn notify_memory_growth(mut caller: Caller<'_, HostState>, value: i32) {
    info!(
        "Called into emscripten_notify_memory_growth with argument {}",
        value
    );
    caller.data_mut().record_memory_growth(value as u32);
}

fn set_temp_ret0(mut caller: Caller<'_, HostState>, value: i32) {
    caller.data_mut().staging_mut().set(value);
}

fn get_temp_ret0(caller: Caller<'_, HostState>) -> i32 {
    caller.data().staging().get()
}

/// `requested` is the total heap size in bytes the guest allocator wants.
/// Returns 1 once memory covers it, 0 if the engine refuses to grow.
fn resize_heap(mut caller: Caller<'_, HostState>, requested: i32) -> wasmtime::Result<i32> {
    if !caller.data().config().heap_growth {
        return fatal::unsupported(&caller, "emscripten_resize_heap");
    }
    let requested = requested as u32 as u64;
    let mut memory = LinearMemory::from_caller(&mut caller).map_err(trap)?;
    let current = memory.size();
    if requested <= current {
        return Ok(1);
    }
    let delta = (requested - current).div_ceil(WASM_PAGE_SIZE);
    match memory.grow(delta) {
        Ok(previous) => {
            debug!(
                "emscripten_resize_heap: grew from {} to {} pages",
                previous,
                previous + delta
            );
            Ok(1)
        }
        Err(e) => {
            warn!(
                "emscripten_resize_heap: cannot grow by {} pages: {}",
                delta, e
            );
            Ok(0)
        }
    }
}

fn abort(caller: Caller<'_, HostState>) -> wasmtime::Result<()> {
    fatal::raise(
        &caller,
        ShimError::Aborted {
            call: "abort".to_string(),
        },
    )
}

fn throw_longjmp(caller: Caller<'_, HostState>) -> wasmtime::Result<()> {
    fatal::unsupported(&caller, "_emscripten_throw_longjmp")
}

fn memcpy_big(
    mut caller: Caller<'_, HostState>,
    dest: i32,
    src: i32,
    num: i32,
) -> wasmtime::Result<()> {
    let mut memory = LinearMemory::from_caller(&mut caller).map_err(trap)?;
    memory
        .copy_within(dest as u32, src as u32, num as u32)
        .map_err(trap)
}

pub(crate) fn link(registrar: &mut ImportRegistrar) -> Result<(), ShimError> {
    registrar.wrap(ENV, &["emscripten_notify_memory_growth"], notify_memory_growth)?;
    registrar.wrap(ENV, &["setTempRet0", "_emscripten_tempret_set"], set_temp_ret0)?;
    registrar.wrap(ENV, &["getTempRet0", "_emscripten_tempret_get"], get_temp_ret0)?;
    registrar.wrap(ENV, &["emscripten_resize_heap"], resize_heap)?;
    registrar.wrap(ENV, &["abort", "_abort_js"], abort)?;
    registrar.wrap(ENV, &["_emscripten_throw_longjmp"], throw_longjmp)?;
    registrar.wrap(
        ENV,
        &["emscripten_memcpy_big", "_emscripten_memcpy_js"],
        memcpy_big,
    )?;
    Ok(())
}
