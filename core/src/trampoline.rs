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

//! `invoke_*` trampolines.
//!
//! Emscripten routes calls that may unwind through a host import of the form
//! `invoke_<sig>(index, args...)`, where `index` is a slot in the guest's
//! function table. The first signature letter is the return shape (`v` or
//! `i`), each following `i` is one `i32` argument.

use crate::config::IndirectCalls;
use crate::error::{trap, ShimError};
use crate::fatal;
use crate::host::HostState;
use crate::registrar::{ImportRegistrar, ENV};
use log::debug;
use wasmtime::{Caller, Engine, Extern, Func, FuncType, Val, ValType};

/// Export name of the guest's function table.
pub const INDIRECT_FUNCTION_TABLE: &str = "__indirect_function_table";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trampoline {
    InvokeV,
    InvokeVi,
    InvokeVii,
    InvokeViii,
    InvokeViiii,
    InvokeViiiii,
    InvokeI,
    InvokeIi,
    InvokeIii,
    InvokeIiii,
    InvokeIiiii,
    InvokeIiiiii,
}

impl Trampoline {
    pub const ALL: [Trampoline; 12] = [
        Trampoline::InvokeV,
        Trampoline::InvokeVi,
        Trampoline::InvokeVii,
        Trampoline::InvokeViii,
        Trampoline::InvokeViiii,
        Trampoline::InvokeViiiii,
        Trampoline::InvokeI,
        Trampoline::InvokeIi,
        Trampoline::InvokeIii,
        Trampoline::InvokeIiii,
        Trampoline::InvokeIiiii,
        Trampoline::InvokeIiiiii,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Trampoline::InvokeV => "invoke_v",
            Trampoline::InvokeVi => "invoke_vi",
            Trampoline::InvokeVii => "invoke_vii",
            Trampoline::InvokeViii => "invoke_viii",
            Trampoline::InvokeViiii => "invoke_viiii",
            Trampoline::InvokeViiiii => "invoke_viiiii",
            Trampoline::InvokeI => "invoke_i",
            Trampoline::InvokeIi => "invoke_ii",
            Trampoline::InvokeIii => "invoke_iii",
            Trampoline::InvokeIiii => "invoke_iiii",
            Trampoline::InvokeIiiii => "invoke_iiiii",
            Trampoline::InvokeIiiiii => "invoke_iiiiii",
        }
    }

    /// Arguments forwarded to the target, not counting the table index.
    pub fn arity(self) -> usize {
        // Strip "invoke_" and the return letter.
        self.name().len() - "invoke_".len() - 1
    }

    pub fn returns_value(self) -> bool {
        self.name().as_bytes()["invoke_".len()] == b'i'
    }

    pub fn func_type(self, engine: &Engine) -> FuncType {
        let params = std::iter::repeat(ValType::I32).take(self.arity() + 1);
        let results = self.returns_value().then_some(ValType::I32);
        FuncType::new(engine, params, results)
    }

    fn invoke(
        self,
        mut caller: Caller<'_, HostState>,
        params: &[Val],
        results: &mut [Val],
    ) -> wasmtime::Result<()> {
        match caller.data().config().indirect_calls {
            IndirectCalls::Fatal => fatal::unsupported(&caller, self.name()),
            IndirectCalls::Resolve => {
                let index = params.first().and_then(Val::i32).unwrap_or_default() as u32;
                let target = resolve(&mut caller, index)?;
                debug!("{}: calling table slot {}", self.name(), index);
                target.call(&mut caller, &params[1..], results)
            }
        }
    }
}

fn resolve(caller: &mut Caller<'_, HostState>, index: u32) -> wasmtime::Result<Func> {
    let bad_entry = |reason: &str| {
        trap(ShimError::BadTableEntry {
            index,
            reason: reason.to_string(),
        })
    };
    let table = caller
        .get_export(INDIRECT_FUNCTION_TABLE)
        .and_then(Extern::into_table)
        .ok_or_else(|| bad_entry("guest exports no function table"))?;
    let entry = table
        .get(&mut *caller, index as u64)
        .ok_or_else(|| bad_entry("index out of range"))?;
    entry
        .as_func()
        .flatten()
        .cloned()
        .ok_or_else(|| bad_entry("slot is empty or not a function"))
}

pub(crate) fn link(registrar: &mut ImportRegistrar) -> Result<(), ShimError> {
    for trampoline in Trampoline::ALL {
        let ty = trampoline.func_type(registrar.engine());
        registrar.define(
            ENV,
            &[trampoline.name()],
            ty,
            move |caller: Caller<'_, HostState>, params: &[Val], results: &mut [Val]| {
                trampoline.invoke(caller, params, results)
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShimConfig;
    use crate::guest::GuestInstance;
    use crate::testing::GuestBuilder;
    use wasm_encoder::{Instruction, ValType as WasmType};

    #[test]
    fn test_names_and_shapes() {
        assert_eq!(Trampoline::InvokeV.arity(), 0);
        assert!(!Trampoline::InvokeV.returns_value());
        assert_eq!(Trampoline::InvokeViiiii.arity(), 5);
        assert_eq!(Trampoline::InvokeI.arity(), 0);
        assert!(Trampoline::InvokeI.returns_value());
        assert_eq!(Trampoline::InvokeIiiiii.arity(), 5);
        assert_eq!(Trampoline::InvokeIii.name(), "invoke_iii");
    }

    #[test]
    fn test_func_type_counts_table_index() {
        let engine = Engine::default();
        let ty = Trampoline::InvokeIii.func_type(&engine);
        assert_eq!(ty.params().len(), 3);
        assert_eq!(ty.results().len(), 1);
        let ty = Trampoline::InvokeV.func_type(&engine);
        assert_eq!(ty.params().len(), 1);
        assert_eq!(ty.results().len(), 0);
    }

    /// Guest with table `[double, store42]` and an export `run` that goes
    /// through the given trampoline.
    fn dispatch_guest(trampoline: Trampoline) -> Vec<u8> {
        let params = vec![WasmType::I32; trampoline.arity() + 1];
        let results: Vec<WasmType> = if trampoline.returns_value() {
            vec![WasmType::I32]
        } else {
            vec![]
        };
        let mut builder = GuestBuilder::new();
        let invoke = builder.import("env", trampoline.name(), &params, &results);
        builder.forward("run", invoke, &params, &results);
        let double = builder.define(
            &[WasmType::I32],
            &[WasmType::I32],
            &[
                Instruction::LocalGet(0),
                Instruction::LocalGet(0),
                Instruction::I32Add,
            ],
        );
        let store42 = builder.define(
            &[],
            &[],
            &[
                Instruction::I32Const(0),
                Instruction::I32Const(42),
                Instruction::I32Store(wasm_encoder::MemArg {
                    offset: 0,
                    align: 2,
                    memory_index: 0,
                }),
            ],
        );
        builder.table(vec![double, store42]);
        builder.finish()
    }

    fn resolving() -> ShimConfig {
        ShimConfig {
            indirect_calls: IndirectCalls::Resolve,
            ..ShimConfig::trapping()
        }
    }

    #[test]
    fn test_fatal_policy_names_trampoline() {
        let mut guest =
            GuestInstance::instantiate(&dispatch_guest(Trampoline::InvokeIi), ShimConfig::trapping())
                .unwrap();
        let err = guest.call("run", &[0, 21]).unwrap_err();
        assert_eq!(err.shim, Some(ShimError::unsupported("invoke_ii")));
    }

    #[test]
    fn test_resolve_returns_target_result() {
        let mut guest =
            GuestInstance::instantiate(&dispatch_guest(Trampoline::InvokeIi), resolving()).unwrap();
        assert_eq!(guest.call("run", &[0, 21]).unwrap(), vec![42]);
    }

    #[test]
    fn test_resolve_void_target() {
        use crate::memory::GuestMemory;

        let mut guest =
            GuestInstance::instantiate(&dispatch_guest(Trampoline::InvokeV), resolving()).unwrap();
        assert_eq!(guest.call("run", &[1]).unwrap(), Vec::<u64>::new());
        assert_eq!(guest.memory().unwrap().read_u32(0).unwrap(), 42);
    }

    #[test]
    fn test_resolve_out_of_range_slot() {
        let mut guest =
            GuestInstance::instantiate(&dispatch_guest(Trampoline::InvokeV), resolving()).unwrap();
        let err = guest.call("run", &[7]).unwrap_err();
        assert!(
            matches!(err.shim, Some(ShimError::BadTableEntry { index: 7, .. })),
            "got {}",
            err
        );
    }

    #[test]
    fn test_resolve_without_table() {
        let mut builder = GuestBuilder::new();
        let invoke = builder.import("env", "invoke_v", &[WasmType::I32], &[]);
        builder.forward("run", invoke, &[WasmType::I32], &[]);
        let mut guest = GuestInstance::instantiate(&builder.finish(), resolving()).unwrap();
        let err = guest.call("run", &[0]).unwrap_err();
        assert!(matches!(err.shim, Some(ShimError::BadTableEntry { index: 0, .. })));
    }
}
