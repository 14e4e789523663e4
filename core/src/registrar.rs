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

//! Installs every shim into a wasmtime `Linker` before the guest is
//! instantiated.
//!
//! Each `(namespace, name)` pair may be defined once. Alias spellings are
//! registered from a single function value, so both names run the same code.

use crate::config::ShimConfig;
use crate::error::ShimError;
use crate::host::HostState;
use crate::{runtime_support, syscalls, trampoline, wasi};
use log::info;
use std::collections::HashSet;
use wasmtime::{Caller, Engine, FuncType, IntoFunc, Linker, Module, Val};

/// Namespace of the Emscripten runtime imports and syscalls.
pub const ENV: &str = "env";
/// Namespace of the WASI preview1 imports.
pub const WASI: &str = "wasi_snapshot_preview1";

/// One registered import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportBinding {
    pub namespace: &'static str,
    pub name: &'static str,
    /// Canonical name of the shim behind this import. Aliases share it.
    pub shim: &'static str,
}

pub struct ImportRegistrar<'a> {
    linker: &'a mut Linker<HostState>,
    wasi: bool,
    bindings: Vec<ImportBinding>,
    claimed: HashSet<(&'static str, &'static str)>,
}

impl<'a> ImportRegistrar<'a> {
    pub fn new(linker: &'a mut Linker<HostState>, config: &ShimConfig) -> Self {
        ImportRegistrar {
            linker,
            wasi: config.wasi,
            bindings: Vec::new(),
            claimed: HashSet::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        self.linker.engine()
    }

    /// Registers the whole shim set. A second call fails on the first
    /// duplicate name.
    pub fn install(&mut self) -> Result<(), ShimError> {
        runtime_support::link(self)?;
        trampoline::link(self)?;
        syscalls::link(self)?;
        if self.wasi {
            wasi::link(self)?;
        }
        info!("Registered {} host imports", self.bindings.len());
        Ok(())
    }

    fn claim(
        &mut self,
        namespace: &'static str,
        name: &'static str,
        shim: &'static str,
    ) -> Result<(), ShimError> {
        if !self.claimed.insert((namespace, name)) {
            return Err(ShimError::DuplicateImport {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        self.bindings.push(ImportBinding {
            namespace,
            name,
            shim,
        });
        Ok(())
    }

    /// Registers a statically typed host function under every name in
    /// `names`; the first name is the canonical one.
    pub fn wrap<Params, Args>(
        &mut self,
        namespace: &'static str,
        names: &[&'static str],
        func: impl IntoFunc<HostState, Params, Args> + Clone,
    ) -> Result<(), ShimError> {
        let shim = canonical(names);
        for &name in names {
            self.claim(namespace, name, shim)?;
            self.linker
                .func_wrap(namespace, name, func.clone())
                .map_err(|e| link_error(namespace, name, e))?;
        }
        Ok(())
    }

    /// Registers a dynamically typed host function of type `ty` under every
    /// name in `names`; the first name is the canonical one.
    pub fn define<F>(
        &mut self,
        namespace: &'static str,
        names: &[&'static str],
        ty: FuncType,
        func: F,
    ) -> Result<(), ShimError>
    where
        F: Fn(Caller<'_, HostState>, &[Val], &mut [Val]) -> wasmtime::Result<()>
            + Send
            + Sync
            + Clone
            + 'static,
    {
        let shim = canonical(names);
        for &name in names {
            self.claim(namespace, name, shim)?;
            self.linker
                .func_new(namespace, name, ty.clone(), func.clone())
                .map_err(|e| link_error(namespace, name, e))?;
        }
        Ok(())
    }

    pub fn bindings(&self) -> &[ImportBinding] {
        &self.bindings
    }

    /// Canonical shim registered under `namespace::name`.
    pub fn shim_for(&self, namespace: &str, name: &str) -> Option<&'static str> {
        self.bindings
            .iter()
            .find(|b| b.namespace == namespace && b.name == name)
            .map(|b| b.shim)
    }

    /// Fails with the first import of `module`, in a namespace this
    /// registrar serves, that has no shim.
    pub fn check_module(&self, module: &Module) -> Result<(), ShimError> {
        for import in module.imports() {
            let namespace = import.module();
            let served = namespace == ENV || (self.wasi && namespace == WASI);
            if served && self.shim_for(namespace, import.name()).is_none() {
                return Err(ShimError::MissingImport {
                    namespace: namespace.to_string(),
                    name: import.name().to_string(),
                });
            }
        }
        Ok(())
    }
}

fn canonical(names: &[&'static str]) -> &'static str {
    names.first().copied().unwrap_or("")
}

fn link_error(namespace: &str, name: &str, err: wasmtime::Error) -> ShimError {
    ShimError::Link {
        namespace: namespace.to_string(),
        name: name.to_string(),
        message: err.to_string(),
    }
}
