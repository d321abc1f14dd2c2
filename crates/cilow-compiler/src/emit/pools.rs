//! Constant, extern and address pools.
//!
//! Constant and extern slots are named unit-wide by [`NamePool`] so that two
//! methods asking for the same value agree on one data entry; each method
//! then caches its own handles in [`Pools`].

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::constant::Constant;
use crate::error::CompileResult;
use crate::types::Type;
use crate::variables::{Var, VarKind, Variables, naming};

use super::label::Label;

/// Unit-wide naming of pooled slots.
#[derive(Clone, Debug, Default)]
pub struct NamePool {
    constants: IndexMap<(Constant, String), String>,
    constant_counts: HashMap<String, usize>,
    externs: IndexMap<String, String>,
}

impl NamePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(&mut self, value: &Constant, ty: &Type) -> String {
        let vm = ty.vm_name();
        let key = (value.clone(), vm.clone());
        if let Some(name) = self.constants.get(&key) {
            return name.clone();
        }
        let n = self.constant_counts.entry(vm.clone()).or_insert(0);
        let name = naming::constant(&vm, *n);
        *n += 1;
        self.constants.insert(key, name.clone());
        name
    }

    pub fn extern_slot(&mut self, identifier: &str) -> String {
        let n = self.externs.len();
        self.externs
            .entry(identifier.to_string())
            .or_insert_with(|| naming::extern_slot(n))
            .clone()
    }

    pub fn extern_count(&self) -> usize {
        self.externs.len()
    }
}

/// Per-method pool caches.
#[derive(Debug, Default)]
pub struct Pools {
    constants: HashMap<(Constant, Type), Var>,
    externs: HashMap<String, Var>,
    addresses: HashMap<(Label, Type), Var>,
}

impl Pools {
    pub fn constant(
        &mut self,
        vars: &mut Variables,
        names: &mut NamePool,
        value: Constant,
        ty: &Type,
    ) -> CompileResult<Var> {
        let key = (value, ty.clone());
        if let Some(&var) = self.constants.get(&key) {
            return Ok(var);
        }
        let name = names.constant(&key.0, ty);
        let value = key.0.clone();
        let var = vars.named(&name, ty, || VarKind::Constant(value))?;
        self.constants.insert(key, var);
        Ok(var)
    }

    pub fn extern_slot(
        &mut self,
        vars: &mut Variables,
        names: &mut NamePool,
        identifier: &str,
    ) -> CompileResult<Var> {
        if let Some(&var) = self.externs.get(identifier) {
            return Ok(var);
        }
        let name = names.extern_slot(identifier);
        let var = vars.named(&name, &Type::String, || {
            VarKind::Extern(identifier.to_string())
        })?;
        self.externs.insert(identifier.to_string(), var);
        Ok(var)
    }

    /// Slot holding the code address of `label`, as `ty` (Int32 or UInt32).
    pub fn address(&mut self, vars: &mut Variables, label: Label, ty: &Type) -> Var {
        *self
            .addresses
            .entry((label, ty.clone()))
            .or_insert_with(|| vars.address(label, ty))
    }
}
