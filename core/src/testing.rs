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

//! Tiny Emscripten-shaped guest modules, assembled in code for the tests.

use std::borrow::Cow;
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, ElementSection, Elements, EntityType, ExportKind,
    ExportSection, Function, FunctionSection, ImportSection, Instruction, MemorySection,
    MemoryType, Module, RefType, TableSection, TableType, TypeSection, ValType,
};

pub(crate) struct GuestBuilder {
    types: Vec<(Vec<ValType>, Vec<ValType>)>,
    imports: Vec<(String, String, u32)>,
    functions: Vec<(u32, Function)>,
    exports: Vec<(String, u32)>,
    memory_pages: Option<u64>,
    table: Option<Vec<u32>>,
    data: Vec<(u32, Vec<u8>)>,
}

impl GuestBuilder {
    pub(crate) fn new() -> Self {
        GuestBuilder {
            types: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            exports: Vec::new(),
            memory_pages: Some(1),
            table: None,
            data: Vec::new(),
        }
    }

    pub(crate) fn without_memory(mut self) -> Self {
        self.memory_pages = None;
        self
    }

    fn type_index(&mut self, params: &[ValType], results: &[ValType]) -> u32 {
        let sig = (params.to_vec(), results.to_vec());
        match self.types.iter().position(|t| *t == sig) {
            Some(i) => i as u32,
            None => {
                self.types.push(sig);
                (self.types.len() - 1) as u32
            }
        }
    }

    /// Imports a function; returns its function index. Imports must all be
    /// declared before the first `define`.
    pub(crate) fn import(
        &mut self,
        namespace: &str,
        name: &str,
        params: &[ValType],
        results: &[ValType],
    ) -> u32 {
        assert!(self.functions.is_empty(), "imports come before definitions");
        let ty = self.type_index(params, results);
        self.imports.push((namespace.to_string(), name.to_string(), ty));
        (self.imports.len() - 1) as u32
    }

    /// Defines a function from its body; returns its function index.
    pub(crate) fn define(
        &mut self,
        params: &[ValType],
        results: &[ValType],
        body: &[Instruction],
    ) -> u32 {
        let ty = self.type_index(params, results);
        let mut func = Function::new(vec![]);
        for instr in body {
            func.instruction(instr);
        }
        func.instruction(&Instruction::End);
        self.functions.push((ty, func));
        (self.imports.len() + self.functions.len() - 1) as u32
    }

    pub(crate) fn export(&mut self, name: &str, func_idx: u32) {
        self.exports.push((name.to_string(), func_idx));
    }

    /// Defines and exports a function with the import's signature that
    /// passes its parameters straight through to the import.
    pub(crate) fn forward(
        &mut self,
        export_name: &str,
        import_idx: u32,
        params: &[ValType],
        results: &[ValType],
    ) -> u32 {
        let mut body: Vec<Instruction> = (0..params.len() as u32).map(Instruction::LocalGet).collect();
        body.push(Instruction::Call(import_idx));
        let idx = self.define(params, results, &body);
        self.export(export_name, idx);
        idx
    }

    /// Fills an exported `__indirect_function_table` with `elements`.
    pub(crate) fn table(&mut self, elements: Vec<u32>) {
        self.table = Some(elements);
    }

    pub(crate) fn data(&mut self, offset: u32, bytes: &[u8]) {
        self.data.push((offset, bytes.to_vec()));
    }

    pub(crate) fn finish(&self) -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        for (params, results) in &self.types {
            types.ty().function(params.clone(), results.clone());
        }
        module.section(&types);

        let mut imports = ImportSection::new();
        for (namespace, name, ty) in &self.imports {
            imports.import(namespace, name, EntityType::Function(*ty));
        }
        module.section(&imports);

        let mut functions = FunctionSection::new();
        for (ty, _) in &self.functions {
            functions.function(*ty);
        }
        module.section(&functions);

        if let Some(elements) = &self.table {
            let mut tables = TableSection::new();
            tables.table(TableType {
                element_type: RefType::FUNCREF,
                minimum: elements.len() as u64,
                maximum: Some(elements.len() as u64),
                table64: false,
                shared: false,
            });
            module.section(&tables);
        }

        if let Some(pages) = self.memory_pages {
            let mut memories = MemorySection::new();
            memories.memory(MemoryType {
                minimum: pages,
                maximum: None,
                memory64: false,
                shared: false,
                page_size_log2: None,
            });
            module.section(&memories);
        }

        let mut exports = ExportSection::new();
        if self.memory_pages.is_some() {
            exports.export("memory", ExportKind::Memory, 0);
        }
        if self.table.is_some() {
            exports.export("__indirect_function_table", ExportKind::Table, 0);
        }
        for (name, idx) in &self.exports {
            exports.export(name, ExportKind::Func, *idx);
        }
        module.section(&exports);

        if let Some(elements) = &self.table {
            let mut section = ElementSection::new();
            section.active(
                Some(0),
                &ConstExpr::i32_const(0),
                Elements::Functions(Cow::Borrowed(elements)),
            );
            module.section(&section);
        }

        let mut codes = CodeSection::new();
        for (_, func) in &self.functions {
            codes.function(func);
        }
        module.section(&codes);

        if !self.data.is_empty() {
            let mut data = DataSection::new();
            for (offset, bytes) in &self.data {
                data.active(0, &ConstExpr::i32_const(*offset as i32), bytes.clone());
            }
            module.section(&data);
        }

        module.finish()
    }
}

/// A guest that imports `namespace::name` and exports `call`, forwarding
/// its arguments to that import.
pub(crate) fn forwarding_guest(
    namespace: &str,
    name: &str,
    params: &[ValType],
    results: &[ValType],
) -> Vec<u8> {
    let mut builder = GuestBuilder::new();
    let import = builder.import(namespace, name, params, results);
    builder.forward("call", import, params, results);
    builder.finish()
}

/// A guest with no imports that exports `add(a, b) -> a + b`.
pub(crate) fn add_guest() -> Vec<u8> {
    let mut builder = GuestBuilder::new();
    let add = builder.define(
        &[ValType::I32, ValType::I32],
        &[ValType::I32],
        &[
            Instruction::LocalGet(0),
            Instruction::LocalGet(1),
            Instruction::I32Add,
        ],
    );
    builder.export("add", add);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_guest_validates() {
        let result = wasmparser::Validator::new().validate_all(&add_guest());
        assert!(result.is_ok(), "add guest invalid: {:?}", result.err());
    }

    #[test]
    fn test_forwarding_guest_validates() {
        let bytes = forwarding_guest("env", "setTempRet0", &[ValType::I32], &[]);
        let result = wasmparser::Validator::new().validate_all(&bytes);
        assert!(result.is_ok(), "forwarding guest invalid: {:?}", result.err());
    }

    #[test]
    fn test_table_guest_validates() {
        let mut builder = GuestBuilder::new();
        let double = builder.define(
            &[ValType::I32],
            &[ValType::I32],
            &[
                Instruction::LocalGet(0),
                Instruction::LocalGet(0),
                Instruction::I32Add,
            ],
        );
        builder.table(vec![double]);
        builder.data(16, b"abc");
        let result = wasmparser::Validator::new().validate_all(&builder.finish());
        assert!(result.is_ok(), "table guest invalid: {:?}", result.err());
    }
}
