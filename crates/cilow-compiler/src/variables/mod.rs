//! The variable model.
//!
//! Every value the compiled code touches lives in a named heap slot. The
//! evaluation stack of the IL is simulated with [`Var`] handles into a
//! per-method arena; temporaries are pooled by type and recycled once every
//! consumer has read them.

pub mod naming;
mod table;


use std::collections::HashMap;

use tracing::trace;

use cilow_asm::{DataEntry, Literal, SyncMode};

use crate::constant::Constant;
use crate::emit::Label;
use crate::error::{CompileError, CompileResult};
use crate::metadata::MethodRef;
use crate::types::Type;

pub use table::VariableTable;

/// Handle to a variable in a [`Variables`] arena.
///
/// The generation changes each time a pooled temporary is recycled, so a
/// handle kept past its release is detected instead of aliasing the next
/// owner of the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Var {
    index: u32,
    generation: u32,
}

impl Var {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TempState {
    pub(crate) pending: i64,
    pub(crate) reserved: bool,
    pub(crate) live: bool,
}

/// Element or property access deferred until the value is read or written.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceVar {
    /// Slot the value is loaded into and stored back from.
    pub backing: Var,
    /// Operands addressing the value, e.g. array and index.
    pub location: Vec<Var>,
    /// Extern slots for the getter and setter.
    pub getter: Var,
    pub setter: Var,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldInit {
    pub init: Option<Constant>,
    pub export: bool,
    pub sync: Option<SyncMode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VarKind {
    Constant(Constant),
    Local(u16),
    Argument(u16),
    Return,
    Field(FieldInit),
    Temporary(TempState),
    This,
    /// The instance's own transform or game object.
    SelfPointing,
    /// Compiler bookkeeping slot with an optional initial value.
    Internal(Option<Constant>),
    /// Code address of a label, resolved when the data section is built.
    Address(Label),
    /// Extern identifier string.
    Extern(String),
    Reference(Box<ReferenceVar>),
    /// Another variable viewed at a different static type.
    Casted(Var),
    /// Result of `ldftn`, consumed by delegate construction.
    MethodPointer(Box<MethodRef>),
}

#[derive(Clone, Debug)]
pub struct Variable {
    name: String,
    ty: Type,
    kind: VarKind,
    generation: u32,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn kind(&self) -> &VarKind {
        &self.kind
    }

    /// Whether the variable is backed by its own data-section entry.
    pub fn occupies_slot(&self) -> bool {
        !matches!(
            self.kind,
            VarKind::Reference(_) | VarKind::Casted(_) | VarKind::MethodPointer(_)
        )
    }

    pub fn constant(&self) -> Option<&Constant> {
        match &self.kind {
            VarKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    fn default_literal(&self) -> Literal {
        Constant::default_for(&self.ty)
            .map(|c| c.to_literal())
            .unwrap_or(Literal::Null)
    }

    fn typed_literal(&self, c: &Constant) -> Literal {
        c.retype(&self.ty).unwrap_or_else(|| c.clone()).to_literal()
    }

    fn data_entry(&self, resolve: &dyn Fn(Label) -> CompileResult<u32>) -> CompileResult<DataEntry> {
        let type_name = self.ty.vm_name();
        let entry = match &self.kind {
            VarKind::Constant(c) => DataEntry::new(&self.name, type_name, self.typed_literal(c)),
            VarKind::Field(f) => {
                let init = match &f.init {
                    Some(c) => self.typed_literal(c),
                    None => self.default_literal(),
                };
                DataEntry::new(&self.name, type_name, init)
                    .exported(f.export)
                    .synced(f.sync)
            }
            VarKind::This | VarKind::SelfPointing => {
                DataEntry::new(&self.name, type_name, Literal::This)
            }
            VarKind::Internal(Some(c)) => {
                DataEntry::new(&self.name, type_name, self.typed_literal(c))
            }
            VarKind::Address(label) => {
                let address = resolve(*label)?;
                let init = if self.ty == Type::UInt32 {
                    Literal::Address(address)
                } else {
                    Literal::Int(address as i64)
                };
                DataEntry::new(&self.name, type_name, init)
            }
            VarKind::Extern(id) => DataEntry::new(&self.name, type_name, Literal::Str(id.clone())),
            _ => DataEntry::new(&self.name, type_name, self.default_literal()),
        };
        Ok(entry)
    }
}

type ReleaseHook = Box<dyn FnMut(&Variable)>;

/// Per-method variable arena.
pub struct Variables {
    method: String,
    slots: Vec<Variable>,
    named: HashMap<String, u32>,
    free: HashMap<Type, Vec<u32>>,
    temp_counts: HashMap<String, usize>,
    address_count: usize,
    on_release: Option<ReleaseHook>,
}

impl Variables {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            slots: Vec::new(),
            named: HashMap::new(),
            free: HashMap::new(),
            temp_counts: HashMap::new(),
            address_count: 0,
            on_release: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Called with each temporary as it returns to the pool.
    pub fn set_release_hook(&mut self, hook: impl FnMut(&Variable) + 'static) {
        self.on_release = Some(Box::new(hook));
    }

    fn insert(&mut self, name: String, ty: Type, kind: VarKind) -> Var {
        let index = self.slots.len() as u32;
        self.slots.push(Variable {
            name,
            ty,
            kind,
            generation: 0,
        });
        Var {
            index,
            generation: 0,
        }
    }

    /// Get or create the variable registered under `name`.
    ///
    /// A second request must agree on the target VM type.
    pub fn named(
        &mut self,
        name: &str,
        ty: &Type,
        kind: impl FnOnce() -> VarKind,
    ) -> CompileResult<Var> {
        if let Some(&index) = self.named.get(name) {
            let existing = &self.slots[index as usize];
            if existing.ty.vm_name() != ty.vm_name() {
                return Err(CompileError::DuplicateName(name.to_string()));
            }
            return Ok(Var {
                index,
                generation: existing.generation,
            });
        }
        let var = self.insert(name.to_string(), ty.clone(), kind());
        self.named.insert(name.to_string(), var.index);
        Ok(var)
    }

    pub fn lookup(&self, name: &str) -> Option<Var> {
        self.named.get(name).map(|&index| Var {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// The variable behind a handle, failing on stale handles.
    pub fn get(&self, var: Var) -> CompileResult<&Variable> {
        let slot = &self.slots[var.index()];
        if slot.generation != var.generation {
            return Err(CompileError::StaleVariable(slot.name.clone()));
        }
        Ok(slot)
    }

    pub fn info(&self, var: Var) -> &Variable {
        &self.slots[var.index()]
    }

    pub fn ty(&self, var: Var) -> &Type {
        &self.slots[var.index()].ty
    }

    pub fn name(&self, var: Var) -> &str {
        &self.slots[var.index()].name
    }

    pub fn kind(&self, var: Var) -> &VarKind {
        &self.slots[var.index()].kind
    }

    pub fn constant(&self, var: Var) -> Option<&Constant> {
        self.slots[var.index()].constant()
    }

    pub fn is_this(&self, var: Var) -> bool {
        match self.kind(var) {
            VarKind::This => true,
            VarKind::Casted(inner) => self.is_this(*inner),
            _ => false,
        }
    }

    /// The slot-backed variable a handle ultimately names.
    pub fn storage(&self, var: Var) -> Var {
        match self.kind(var) {
            VarKind::Casted(inner) => self.storage(*inner),
            _ => var,
        }
    }

    pub fn local(&mut self, index: u16, name: Option<&str>, ty: &Type) -> CompileResult<Var> {
        let name = match name {
            Some(name) => naming::local(&self.method, name),
            None => naming::unnamed_local(&self.method, index),
        };
        self.named(&name, ty, || VarKind::Local(index))
    }

    pub fn argument(&mut self, index: u16, ty: &Type) -> CompileResult<Var> {
        let name = naming::argument(&self.method, index);
        self.named(&name, ty, || VarKind::Argument(index))
    }

    pub fn return_slot(&mut self, ty: &Type) -> CompileResult<Var> {
        let name = naming::return_slot(&self.method);
        self.named(&name, ty, || VarKind::Return)
    }

    pub fn address(&mut self, label: Label, ty: &Type) -> Var {
        let name = naming::address(&self.method, self.address_count);
        self.address_count += 1;
        let var = self.insert(name.clone(), ty.clone(), VarKind::Address(label));
        self.named.insert(name, var.index);
        var
    }

    /// Acquire a temporary of `ty`, reusing a released one when possible.
    pub fn temporary(&mut self, ty: &Type) -> Var {
        if let Some(index) = self.free.get_mut(ty).and_then(Vec::pop) {
            let slot = &mut self.slots[index as usize];
            slot.kind = VarKind::Temporary(TempState {
                live: true,
                ..TempState::default()
            });
            trace!(target: "cilow::vars", name = %slot.name, "reuse temporary");
            return Var {
                index,
                generation: slot.generation,
            };
        }
        let vm = ty.vm_name();
        let n = self.temp_counts.entry(vm.clone()).or_insert(0);
        let name = naming::temporary(&self.method, &vm, *n);
        *n += 1;
        self.insert(
            name,
            ty.clone(),
            VarKind::Temporary(TempState {
                live: true,
                ..TempState::default()
            }),
        )
    }

    pub fn reference(&mut self, ty: &Type, reference: ReferenceVar) -> Var {
        let name = format!("&{}", self.name(reference.backing));
        self.insert(name, ty.clone(), VarKind::Reference(Box::new(reference)))
    }

    pub fn cast(&mut self, inner: Var, ty: &Type) -> Var {
        let name = self.name(inner).to_string();
        self.insert(name, ty.clone(), VarKind::Casted(inner))
    }

    pub fn method_pointer(&mut self, method: MethodRef) -> Var {
        let name = format!("&{}", method.name);
        self.insert(name, Type::Class("System.IntPtr".into()), VarKind::MethodPointer(Box::new(method)))
    }

    fn targets(&self, var: Var) -> Vec<Var> {
        match self.kind(var) {
            VarKind::Reference(r) => {
                let mut out = vec![r.backing];
                out.extend(r.location.iter().copied());
                out
            }
            VarKind::Casted(inner) => vec![*inner],
            _ => Vec::new(),
        }
    }

    /// Record `n` more pending reads of `var`.
    pub fn allocate(&mut self, var: Var, n: i64) -> CompileResult<()> {
        self.get(var)?;
        if let VarKind::Temporary(state) = &mut self.slots[var.index()].kind {
            state.pending += n;
            return Ok(());
        }
        for inner in self.targets(var) {
            self.allocate(inner, n)?;
        }
        Ok(())
    }

    /// Record one read of `var`; a temporary with no pending reads left
    /// returns to the pool.
    pub fn use_var(&mut self, var: Var) -> CompileResult<()> {
        self.get(var)?;
        let slot = &mut self.slots[var.index()];
        if let VarKind::Temporary(state) = &mut slot.kind {
            state.pending -= 1;
            if state.pending < 0 {
                return Err(CompileError::LifetimeImbalance {
                    name: slot.name.clone(),
                    pending: state.pending,
                });
            }
            if state.pending == 0 && !state.reserved {
                self.free_temp(var);
            }
            return Ok(());
        }
        for inner in self.targets(var) {
            self.use_var(inner)?;
        }
        Ok(())
    }

    /// Pin a temporary so it survives reaching zero pending reads.
    pub fn reserve(&mut self, var: Var) -> CompileResult<()> {
        self.get(var)?;
        if let VarKind::Temporary(state) = &mut self.slots[var.index()].kind {
            state.reserved = true;
        }
        Ok(())
    }

    pub fn release(&mut self, var: Var) -> CompileResult<()> {
        self.get(var)?;
        if let VarKind::Temporary(state) = &mut self.slots[var.index()].kind {
            state.reserved = false;
            if state.pending == 0 {
                self.free_temp(var);
            }
        }
        Ok(())
    }

    fn free_temp(&mut self, var: Var) {
        let slot = &mut self.slots[var.index()];
        slot.kind = VarKind::Temporary(TempState::default());
        slot.generation += 1;
        trace!(target: "cilow::vars", name = %slot.name, "release temporary");
        self.free.entry(slot.ty.clone()).or_default().push(var.index);
        if let Some(hook) = self.on_release.as_mut() {
            hook(&self.slots[var.index()]);
        }
    }

    /// Every temporary must be fully consumed and unpinned.
    pub fn check_balance(&self) -> CompileResult<()> {
        for slot in &self.slots {
            if let VarKind::Temporary(state) = &slot.kind {
                if state.reserved {
                    return Err(CompileError::ReservedAtEnd(slot.name.clone()));
                }
                if state.pending != 0 {
                    return Err(CompileError::LifetimeImbalance {
                        name: slot.name.clone(),
                        pending: state.pending,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Data-section entries for every slot-backed variable.
    pub fn data_entries(
        &self,
        resolve: &dyn Fn(Label) -> CompileResult<u32>,
    ) -> CompileResult<Vec<DataEntry>> {
        self.slots
            .iter()
            .filter(|v| v.occupies_slot())
            .map(|v| v.data_entry(resolve))
            .collect()
    }
}
