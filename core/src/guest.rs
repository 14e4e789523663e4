/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * Guest instantiation and export calls for Emscripten-built modules.
 *
 * Each GuestInstance owns its engine, linker, store and HostState, so shim
 * state (the tempRet0 slot, captured output, growth notices) is never
 * shared between two guests.
 *
 * Exports are called with word-sized integer arguments; each word is
 * converted to the declared parameter type (f32/f64 take raw bits).
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 */

use crate::config::ShimConfig;
use crate::error::{shim_error, ShimError};
use crate::host::HostState;
use crate::memory::{LinearMemory, LINEAR_MEMORY_NAME};
use crate::registrar::ImportRegistrar;
use log::{debug, info};
use std::fmt;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, Val, ValType};

/// Export run once right after instantiation, when present.
pub const INITIALIZE_EXPORT: &str = "_initialize";

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestError {
    pub message: String,
    pub context: String,
    /// The shim-layer cause, when the failure came from a shim.
    pub shim: Option<ShimError>,
}

impl GuestError {
    fn new(context: &str, message: String) -> Self {
        GuestError {
            message,
            context: context.to_string(),
            shim: None,
        }
    }

    fn from_shim(context: &str, err: ShimError) -> Self {
        GuestError {
            message: err.to_string(),
            context: context.to_string(),
            shim: Some(err),
        }
    }

    fn from_wasmtime(context: &str, err: wasmtime::Error) -> Self {
        match shim_error(&err) {
            Some(shim) => GuestError::from_shim(context, shim.clone()),
            None => GuestError::new(context, format!("{:#}", err)),
        }
    }
}

impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.context, self.message)
    }
}

impl std::error::Error for GuestError {}

// =============================================================================
// Guest Instance
// =============================================================================

pub struct GuestInstance {
    store: Store<HostState>,
    instance: Instance,
    memory: Option<Memory>,
}

impl GuestInstance {
    /// Compiles `bytes`, links every shim and instantiates the module.
    ///
    /// Imports in the shimmed namespaces that have no shim are reported
    /// before instantiation as a configuration error.
    pub fn instantiate(bytes: &[u8], config: ShimConfig) -> Result<Self, GuestError> {
        let engine = Engine::default();
        let module = Module::from_binary(&engine, bytes)
            .map_err(|e| GuestError::from_wasmtime("instantiate::load", e))?;

        let mut linker = Linker::<HostState>::new(&engine);
        {
            let mut registrar = ImportRegistrar::new(&mut linker, &config);
            registrar
                .install()
                .map_err(|e| GuestError::from_shim("instantiate::link", e))?;
            registrar
                .check_module(&module)
                .map_err(|e| GuestError::from_shim("instantiate::imports", e))?;
        }

        let mut store = Store::new(&engine, HostState::new(config));
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| GuestError::from_wasmtime("instantiate::instantiate", e))?;
        let memory = instance.get_memory(&mut store, LINEAR_MEMORY_NAME);
        info!(
            "Instantiated guest ({} imports, memory: {})",
            module.imports().len(),
            memory.is_some()
        );

        let mut guest = GuestInstance {
            store,
            instance,
            memory,
        };
        if guest.has_export(INITIALIZE_EXPORT) {
            debug!("Running {}", INITIALIZE_EXPORT);
            guest
                .call(INITIALIZE_EXPORT, &[])
                .map_err(|e| GuestError {
                    context: "instantiate::initialize".to_string(),
                    ..e
                })?;
        }
        Ok(guest)
    }

    pub fn has_export(&mut self, name: &str) -> bool {
        self.instance.get_func(&mut self.store, name).is_some()
    }

    /// Calls export `name`. Results come back as words: `i32` values are
    /// zero-extended, floats are returned as raw bits.
    pub fn call(&mut self, name: &str, args: &[u64]) -> Result<Vec<u64>, GuestError> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| GuestError::new("call::get_func", format!("Export '{}' not found", name)))?;

        let ty = func.ty(&self.store);
        if ty.params().len() != args.len() {
            return Err(GuestError::new(
                "call::args",
                format!(
                    "'{}' takes {} arguments, got {}",
                    name,
                    ty.params().len(),
                    args.len()
                ),
            ));
        }
        let params = ty
            .params()
            .zip(args)
            .map(|(ty, &word)| word_to_val(&ty, word))
            .collect::<Result<Vec<_>, _>>()?;
        let mut results = vec![Val::I32(0); ty.results().len()];

        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| GuestError::from_wasmtime("call::call", e))?;

        results.iter().map(val_to_word).collect()
    }

    /// The guest's exported linear memory, if it has one.
    pub fn memory(&mut self) -> Option<LinearMemory<&mut Store<HostState>>> {
        let memory = self.memory?;
        Some(LinearMemory::new(&mut self.store, memory))
    }

    pub fn host(&self) -> &HostState {
        self.store.data()
    }

    pub fn host_mut(&mut self) -> &mut HostState {
        self.store.data_mut()
    }
}

fn word_to_val(ty: &ValType, word: u64) -> Result<Val, GuestError> {
    match ty {
        ValType::I32 => Ok(Val::I32(word as i32)),
        ValType::I64 => Ok(Val::I64(word as i64)),
        ValType::F32 => Ok(Val::F32(word as u32)),
        ValType::F64 => Ok(Val::F64(word)),
        other => Err(GuestError::new(
            "call::args",
            format!("unsupported parameter type {}", other),
        )),
    }
}

fn val_to_word(val: &Val) -> Result<u64, GuestError> {
    match val {
        Val::I32(v) => Ok(*v as u32 as u64),
        Val::I64(v) => Ok(*v as u64),
        Val::F32(bits) => Ok(*bits as u64),
        Val::F64(bits) => Ok(*bits),
        _ => Err(GuestError::new(
            "call::results",
            "unsupported result type".to_string(),
        )),
    }
}
