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

//! Bounds-checked access to the guest's linear memory.
//!
//! Offsets and lengths handed to shims come straight from guest code and are
//! untrusted. Every read or write of guest memory goes through
//! [`GuestMemory`], which rejects any range whose end lies past the current
//! memory size before a single byte is touched.

use crate::error::ShimError;
use std::ops::Range;
use wasmtime::{AsContext, AsContextMut, Caller, Extern, Memory};

/// Export name Emscripten gives the guest's linear memory.
pub const LINEAR_MEMORY_NAME: &str = "memory";

/// Size of one WebAssembly page in bytes.
pub const WASM_PAGE_SIZE: u64 = 65536;

/// Validates `offset..offset + length` against a memory of `size` bytes.
///
/// The sum is taken in `u64` with overflow checking, so a huge offset can
/// never wrap around into a valid-looking range.
pub fn check_bounds(offset: u64, length: u64, size: u64) -> Result<Range<usize>, ShimError> {
    let out_of_bounds = ShimError::OutOfBounds {
        offset,
        length,
        size,
    };
    let end = offset.checked_add(length).ok_or(out_of_bounds.clone())?;
    if end > size {
        return Err(out_of_bounds);
    }
    let start = usize::try_from(offset).map_err(|_| out_of_bounds.clone())?;
    let end = usize::try_from(end).map_err(|_| out_of_bounds)?;
    Ok(start..end)
}

/// A flat, byte-addressed guest memory.
pub trait GuestMemory {
    /// Current size in bytes.
    fn size(&self) -> u64;

    /// Reads `length` bytes starting at `offset`.
    fn read(&self, offset: u32, length: u32) -> Result<Vec<u8>, ShimError>;

    /// Writes `bytes` starting at `offset`.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), ShimError>;

    fn read_u32(&self, offset: u32) -> Result<u32, ShimError> {
        let bytes = self.read(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn write_u32(&mut self, offset: u32, value: u32) -> Result<(), ShimError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_u64(&mut self, offset: u32, value: u64) -> Result<(), ShimError> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Copies `length` bytes from `src` to `dest`. Overlapping ranges are
    /// fine: the source is read in full before anything is written.
    fn copy_within(&mut self, dest: u32, src: u32, length: u32) -> Result<(), ShimError> {
        check_bounds(dest as u64, length as u64, self.size())?;
        let bytes = self.read(src, length)?;
        self.write(dest, &bytes)
    }
}

/// Host-side byte buffers behave like a guest memory of fixed size.
impl GuestMemory for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read(&self, offset: u32, length: u32) -> Result<Vec<u8>, ShimError> {
        let range = check_bounds(offset as u64, length as u64, self.size())?;
        Ok(self[range].to_vec())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), ShimError> {
        let range = check_bounds(offset as u64, bytes.len() as u64, self.size())?;
        self[range].copy_from_slice(bytes);
        Ok(())
    }
}

/// A wasmtime linear memory paired with the store context that owns it.
///
/// Inside a shim the context is the `&mut Caller`; from the orchestration
/// side it is the `&mut Store`.
pub struct LinearMemory<C> {
    ctx: C,
    memory: Memory,
}

impl<C> LinearMemory<C>
where
    C: AsContextMut,
    C::Data: 'static,
{
    pub fn new(ctx: C, memory: Memory) -> Self {
        LinearMemory { ctx, memory }
    }

    /// Current size in 64 KiB pages.
    pub fn pages(&self) -> u64 {
        self.memory.size(&self.ctx)
    }

    /// Grows the memory by `delta` pages and returns the previous page count.
    pub fn grow(&mut self, delta: u64) -> wasmtime::Result<u64> {
        self.memory.grow(&mut self.ctx, delta)
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }
}

impl<'a, 'b, T: 'static> LinearMemory<&'a mut Caller<'b, T>> {
    /// Looks up the guest's exported memory from inside a host call.
    pub fn from_caller(caller: &'a mut Caller<'b, T>) -> Result<Self, ShimError> {
        let memory = caller
            .get_export(LINEAR_MEMORY_NAME)
            .and_then(Extern::into_memory)
            .ok_or(ShimError::NoMemory)?;
        Ok(LinearMemory::new(caller, memory))
    }
}

impl<C> GuestMemory for LinearMemory<C>
where
    C: AsContextMut,
    C::Data: 'static,
{
    fn size(&self) -> u64 {
        self.memory.data_size(&self.ctx) as u64
    }

    fn read(&self, offset: u32, length: u32) -> Result<Vec<u8>, ShimError> {
        let range = check_bounds(offset as u64, length as u64, self.size())?;
        Ok(self.memory.data(&self.ctx)[range].to_vec())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), ShimError> {
        let range = check_bounds(offset as u64, bytes.len() as u64, self.size())?;
        self.memory.data_mut(&mut self.ctx)[range].copy_from_slice(bytes);
        Ok(())
    }
}
