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

//! The libc system-call surface an Emscripten guest links against.
//!
//! Only `getpid` does real work. Everything else is a named stub that takes
//! the fatal path, so a guest that strays into filesystem, mapping or time
//! formatting code stops with the name of the call it needed.

use crate::error::ShimError;
use crate::fatal;
use crate::host::HostState;
use crate::registrar::{ImportRegistrar, ENV};
use wasmtime::{Caller, Engine, FuncType, Val, ValType};

/// Width of one guest argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    I32,
    I64,
}

impl Word {
    pub fn val_type(self) -> ValType {
        match self {
            Word::I32 => ValType::I32,
            Word::I64 => ValType::I64,
        }
    }
}

use Word::{I32, I64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syscall {
    Fstat64,
    Stat64,
    Lstat64,
    Newfstatat,
    Ftruncate64,
    Truncate64,
    Unlink,
    Unlinkat,
    Rmdir,
    Getdents64,
    Mprotect,
    Madvise,
    Getpid,
    Openat,
    Open,
    Fcntl64,
    Ioctl,
    MmapJs,
    Mmap2,
    MunmapJs,
    Munmap,
    Gettimeofday,
    Time,
    GmtimeJs,
    GmtimeR,
    LocaltimeJs,
    LocaltimeR,
    Strftime,
    StrftimeL,
}

impl Syscall {
    pub const ALL: [Syscall; 29] = [
        Syscall::Fstat64,
        Syscall::Stat64,
        Syscall::Lstat64,
        Syscall::Newfstatat,
        Syscall::Ftruncate64,
        Syscall::Truncate64,
        Syscall::Unlink,
        Syscall::Unlinkat,
        Syscall::Rmdir,
        Syscall::Getdents64,
        Syscall::Mprotect,
        Syscall::Madvise,
        Syscall::Getpid,
        Syscall::Openat,
        Syscall::Open,
        Syscall::Fcntl64,
        Syscall::Ioctl,
        Syscall::MmapJs,
        Syscall::Mmap2,
        Syscall::MunmapJs,
        Syscall::Munmap,
        Syscall::Gettimeofday,
        Syscall::Time,
        Syscall::GmtimeJs,
        Syscall::GmtimeR,
        Syscall::LocaltimeJs,
        Syscall::LocaltimeR,
        Syscall::Strftime,
        Syscall::StrftimeL,
    ];

    /// Import names, canonical spelling first, then the legacy `__sys_` one.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Syscall::Fstat64 => &["__syscall_fstat64", "__sys_fstat64"],
            Syscall::Stat64 => &["__syscall_stat64", "__sys_stat64"],
            Syscall::Lstat64 => &["__syscall_lstat64", "__sys_lstat64"],
            Syscall::Newfstatat => &["__syscall_newfstatat", "__sys_newfstatat"],
            Syscall::Ftruncate64 => &["__syscall_ftruncate64", "__sys_ftruncate64"],
            Syscall::Truncate64 => &["__syscall_truncate64", "__sys_truncate64"],
            Syscall::Unlink => &["__syscall_unlink", "__sys_unlink"],
            Syscall::Unlinkat => &["__syscall_unlinkat", "__sys_unlinkat"],
            Syscall::Rmdir => &["__syscall_rmdir", "__sys_rmdir"],
            Syscall::Getdents64 => &["__syscall_getdents64", "__sys_getdents64"],
            Syscall::Mprotect => &["__syscall_mprotect", "__sys_mprotect"],
            Syscall::Madvise => &["__syscall_madvise", "__sys_madvise1"],
            Syscall::Getpid => &["__syscall_getpid", "__sys_getpid"],
            Syscall::Openat => &["__syscall_openat"],
            Syscall::Open => &["__sys_open"],
            Syscall::Fcntl64 => &["__syscall_fcntl64", "__sys_fcntl64"],
            Syscall::Ioctl => &["__syscall_ioctl", "__sys_ioctl"],
            Syscall::MmapJs => &["_mmap_js"],
            Syscall::Mmap2 => &["__sys_mmap2"],
            Syscall::MunmapJs => &["_munmap_js"],
            Syscall::Munmap => &["__sys_munmap"],
            Syscall::Gettimeofday => &["gettimeofday"],
            Syscall::Time => &["time"],
            Syscall::GmtimeJs => &["_gmtime_js"],
            Syscall::GmtimeR => &["gmtime_r"],
            Syscall::LocaltimeJs => &["_localtime_js"],
            Syscall::LocaltimeR => &["localtime_r"],
            Syscall::Strftime => &["strftime"],
            Syscall::StrftimeL => &["strftime_l"],
        }
    }

    pub fn name(self) -> &'static str {
        self.names()[0]
    }

    pub fn params(self) -> &'static [Word] {
        match self {
            Syscall::Getpid => &[],
            Syscall::Unlink | Syscall::Rmdir | Syscall::Time => &[I32],
            Syscall::Fstat64
            | Syscall::Stat64
            | Syscall::Lstat64
            | Syscall::Munmap
            | Syscall::Gettimeofday
            | Syscall::GmtimeR
            | Syscall::LocaltimeR => &[I32, I32],
            Syscall::Ftruncate64 | Syscall::Truncate64 => &[I32, I64],
            Syscall::GmtimeJs | Syscall::LocaltimeJs => &[I64, I32],
            Syscall::Unlinkat
            | Syscall::Getdents64
            | Syscall::Mprotect
            | Syscall::Madvise
            | Syscall::Open
            | Syscall::Fcntl64
            | Syscall::Ioctl => &[I32, I32, I32],
            Syscall::Newfstatat | Syscall::Openat | Syscall::Strftime => &[I32, I32, I32, I32],
            Syscall::StrftimeL => &[I32, I32, I32, I32, I32],
            Syscall::Mmap2 => &[I32, I32, I32, I32, I32, I32],
            Syscall::MunmapJs => &[I32, I32, I32, I32, I32, I64],
            Syscall::MmapJs => &[I32, I32, I32, I32, I64, I32, I32],
        }
    }

    /// Every call answers with an `i32` except the `_js` time splitters.
    pub fn returns_value(self) -> bool {
        !matches!(self, Syscall::GmtimeJs | Syscall::LocaltimeJs)
    }

    pub fn func_type(self, engine: &Engine) -> FuncType {
        let params = self.params().iter().map(|w| w.val_type());
        let results = self.returns_value().then_some(ValType::I32);
        FuncType::new(engine, params, results)
    }

    pub fn is_implemented(self) -> bool {
        matches!(self, Syscall::Getpid)
    }

    /// Argument count and types were checked by the VM against
    /// [`Syscall::func_type`] before this runs.
    fn invoke(
        self,
        caller: Caller<'_, HostState>,
        _params: &[Val],
        results: &mut [Val],
    ) -> wasmtime::Result<()> {
        match self {
            Syscall::Getpid => {
                results[0] = Val::I32(std::process::id() as i32);
                Ok(())
            }
            _ => fatal::unsupported(&caller, self.name()),
        }
    }
}

pub(crate) fn link(registrar: &mut ImportRegistrar) -> Result<(), ShimError> {
    for syscall in Syscall::ALL {
        let ty = syscall.func_type(registrar.engine());
        registrar.define(
            ENV,
            syscall.names(),
            ty,
            move |caller: Caller<'_, HostState>, params: &[Val], results: &mut [Val]| {
                syscall.invoke(caller, params, results)
            },
        )?;
    }
    Ok(())
}
