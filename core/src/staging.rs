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

/// The high word of a 64-bit value crossing a wasm32 call boundary.
///
/// Emscripten's legalized ABI returns an `i64` as its low word plus a call
/// to `setTempRet0(high)`; the caller then fetches the high word with
/// `getTempRet0()`. One slot lives in each instance's `HostState`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StagingRegister {
    value: i32,
}

impl StagingRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, value: i32) {
        self.value = value;
    }

    /// Reading does not clear the slot.
    pub fn get(&self) -> i32 {
        self.value
    }

    /// Stages the high word of `value` and returns the low word.
    pub fn split(&mut self, value: i64) -> i32 {
        self.set((value >> 32) as i32);
        value as i32
    }

    /// Rebuilds a 64-bit value from `low` and the staged high word.
    pub fn combine(&self, low: i32) -> i64 {
        ((self.value as i64) << 32) | (low as u32 as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_last_set() {
        let mut reg = StagingRegister::new();
        assert_eq!(reg.get(), 0);
        reg.set(7);
        reg.set(-12);
        assert_eq!(reg.get(), -12);
    }

    #[test]
    fn test_get_does_not_clear() {
        let mut reg = StagingRegister::new();
        reg.set(i32::MIN);
        assert_eq!(reg.get(), i32::MIN);
        assert_eq!(reg.get(), i32::MIN);
    }

    #[test]
    fn test_split_and_combine() {
        let mut reg = StagingRegister::new();
        for value in [0i64, 1, -1, i64::MAX, i64::MIN, 0x1234_5678_9ABC_DEF0] {
            let low = reg.split(value);
            assert_eq!(reg.combine(low), value, "value {:#x}", value);
        }
    }
}
