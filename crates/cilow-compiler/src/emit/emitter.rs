//! Instruction emission with symbolic operands.
//!
//! Operations are recorded with labels, method entries and variable handles
//! as operands and addresses are assigned as they are appended. `build`
//! resolves everything to concrete instructions once all labels are placed.

use cilow_asm::{Instruction, Opcode};

use crate::constant::Constant;
use crate::error::{CompileError, CompileResult};
use crate::types::Type;
use crate::variables::{ReferenceVar, Var, VarKind, Variables};

use super::label::{Label, Labels};
use super::pools::{NamePool, Pools};

/// A jump destination.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Target {
    Label(Label),
    /// Internal entry of a method, resolved when the unit is linked.
    Entry(String),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EmittedOperand {
    None,
    Target(Target),
    Var(Var),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EmittedOp {
    pub address: u32,
    pub opcode: Opcode,
    pub operand: EmittedOperand,
}

/// How an instruction uses a pushed operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    fn reads(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    fn writes(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

pub struct Emitter {
    base: u32,
    address: u32,
    ops: Vec<EmittedOp>,
    labels: Labels,
    pools: Pools,
    /// References written by the instruction being assembled, in write-back
    /// order.
    pending_stores: Vec<Var>,
}

impl Emitter {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            address: base,
            ops: Vec::new(),
            labels: Labels::new(),
            pools: Pools::default(),
            pending_stores: Vec::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Address of the next instruction to be emitted.
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn ops(&self) -> &[EmittedOp] {
        &self.ops
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn create_label(&mut self) -> Label {
        self.labels.create()
    }

    /// Place `label` at the current address.
    pub fn apply_label(&mut self, label: Label) -> CompileResult<()> {
        self.labels.apply(label, self.address)
    }

    pub fn label_address(&self, label: Label) -> CompileResult<u32> {
        self.labels.address(label)
    }

    fn append(&mut self, opcode: Opcode, operand: EmittedOperand) {
        self.ops.push(EmittedOp {
            address: self.address,
            opcode,
            operand,
        });
        self.address += opcode.size();
    }

    pub fn emit(&mut self, opcode: Opcode) {
        self.append(opcode, EmittedOperand::None);
    }

    pub fn emit_var(&mut self, opcode: Opcode, var: Var) {
        self.append(opcode, EmittedOperand::Var(var));
    }

    pub fn emit_target(&mut self, opcode: Opcode, target: Target) {
        self.append(opcode, EmittedOperand::Target(target));
    }

    pub fn constant(
        &mut self,
        vars: &mut Variables,
        names: &mut NamePool,
        value: Constant,
        ty: &Type,
    ) -> CompileResult<Var> {
        self.pools.constant(vars, names, value, ty)
    }

    pub fn extern_slot(
        &mut self,
        vars: &mut Variables,
        names: &mut NamePool,
        identifier: &str,
    ) -> CompileResult<Var> {
        self.pools.extern_slot(vars, names, identifier)
    }

    pub fn address_of(&mut self, vars: &mut Variables, label: Label, ty: &Type) -> Var {
        self.pools.address(vars, label, ty)
    }

    /// PUSH one operand of the instruction being assembled.
    ///
    /// A reference is loaded through its getter when read; when written,
    /// its setter runs after the instruction, see [`Emitter::flush_stores`].
    pub fn push_operand(&mut self, vars: &Variables, var: Var, access: Access) -> CompileResult<()> {
        vars.get(var)?;
        match vars.kind(var) {
            VarKind::Reference(r) => {
                let r = r.as_ref().clone();
                if access.reads() {
                    self.load_reference(vars, &r)?;
                } else {
                    self.load_containers(vars, &r)?;
                }
                self.emit_var(Opcode::Push, r.backing);
                if access.writes() {
                    self.schedule_store(vars, var);
                }
            }
            VarKind::Casted(inner) => self.push_operand(vars, *inner, access)?,
            VarKind::MethodPointer(m) => {
                return Err(CompileError::Unsupported(format!(
                    "method pointer `{}` used as a value",
                    m.name
                )));
            }
            _ => self.emit_var(Opcode::Push, var),
        }
        Ok(())
    }

    fn load_reference(&mut self, vars: &Variables, r: &ReferenceVar) -> CompileResult<()> {
        for &loc in &r.location {
            self.push_operand(vars, loc, Access::Read)?;
        }
        self.emit_var(Opcode::Push, r.backing);
        self.emit_var(Opcode::Extern, r.getter);
        Ok(())
    }

    /// A write into a value held by another reference needs that value
    /// loaded first so the setter has something to modify.
    fn load_containers(&mut self, vars: &Variables, r: &ReferenceVar) -> CompileResult<()> {
        for &loc in &r.location {
            if let VarKind::Reference(inner) = vars.kind(loc) {
                let inner = inner.as_ref().clone();
                self.load_reference(vars, &inner)?;
            }
        }
        Ok(())
    }

    fn schedule_store(&mut self, vars: &Variables, var: Var) {
        self.pending_stores.push(var);
        if let VarKind::Reference(r) = vars.kind(var) {
            for &loc in &r.location {
                if matches!(vars.kind(loc), VarKind::Reference(_)) && vars.ty(loc).is_value_type() {
                    self.schedule_store(vars, loc);
                }
            }
        }
    }

    /// Run the setters of every reference the last instruction wrote.
    pub fn flush_stores(&mut self, vars: &Variables) -> CompileResult<()> {
        let stores = std::mem::take(&mut self.pending_stores);
        for var in stores {
            let VarKind::Reference(r) = vars.kind(var) else {
                continue;
            };
            let r = r.as_ref().clone();
            for &loc in &r.location {
                match vars.kind(loc) {
                    VarKind::Reference(inner) => self.emit_var(Opcode::Push, inner.backing),
                    _ => self.push_operand(vars, loc, Access::Read)?,
                }
            }
            self.emit_var(Opcode::Push, r.backing);
            self.emit_var(Opcode::Extern, r.setter);
        }
        Ok(())
    }

    /// `dst = src`.
    pub fn add_copy(&mut self, vars: &Variables, src: Var, dst: Var) -> CompileResult<()> {
        self.push_operand(vars, src, Access::Read)?;
        self.push_operand(vars, dst, Access::Write)?;
        self.emit(Opcode::Copy);
        self.flush_stores(vars)
    }

    /// Call the extern in `slot` with `inputs` read in order and the result,
    /// if any, written to `output`.
    pub fn add_extern(
        &mut self,
        vars: &Variables,
        slot: Var,
        inputs: &[Var],
        output: Option<Var>,
    ) -> CompileResult<()> {
        let inputs: Vec<_> = inputs.iter().map(|&v| (v, Access::Read)).collect();
        self.add_extern_with(vars, slot, &inputs, output)
    }

    pub fn add_extern_with(
        &mut self,
        vars: &Variables,
        slot: Var,
        inputs: &[(Var, Access)],
        output: Option<Var>,
    ) -> CompileResult<()> {
        for &(var, access) in inputs {
            self.push_operand(vars, var, access)?;
        }
        if let Some(out) = output {
            self.push_operand(vars, out, Access::Write)?;
        }
        self.emit_var(Opcode::Extern, vars.storage(slot));
        self.flush_stores(vars)
    }

    /// Jump to `target` when `cond` is false.
    pub fn add_branch(&mut self, vars: &Variables, cond: Var, target: Label) -> CompileResult<()> {
        self.push_operand(vars, cond, Access::Read)?;
        self.emit_target(Opcode::JumpIfFalse, Target::Label(target));
        self.flush_stores(vars)
    }

    pub fn add_jump(&mut self, target: Target) {
        self.emit_target(Opcode::Jump, target);
    }

    /// Jump to the address held in `var`.
    pub fn add_jump_indirect(&mut self, vars: &Variables, var: Var) -> CompileResult<()> {
        vars.get(var)?;
        let slot = vars.storage(var);
        if !vars.info(slot).occupies_slot() {
            return Err(CompileError::Unsupported(format!(
                "indirect jump through `{}`",
                vars.name(var)
            )));
        }
        self.emit_var(Opcode::JumpIndirect, slot);
        Ok(())
    }

    pub fn add_annotation(&mut self, vars: &Variables, var: Var) {
        self.emit_var(Opcode::Annotation, vars.storage(var));
    }

    /// Resolve every operand, patching from the last instruction back.
    ///
    /// `entries` maps method names to their internal entry addresses.
    pub fn build(
        &self,
        vars: &Variables,
        entries: &dyn Fn(&str) -> Option<u32>,
    ) -> CompileResult<Vec<Instruction>> {
        let mut out = Vec::with_capacity(self.ops.len());
        for op in self.ops.iter().rev() {
            let instr = match &op.operand {
                EmittedOperand::None => Instruction::bare(op.opcode),
                EmittedOperand::Target(Target::Label(label)) => {
                    Instruction::with_address(op.opcode, self.labels.address(*label)?)
                }
                EmittedOperand::Target(Target::Entry(method)) => {
                    let address =
                        entries(method).ok_or_else(|| CompileError::UnknownMethod(method.clone()))?;
                    Instruction::with_address(op.opcode, address)
                }
                EmittedOperand::Var(var) => {
                    Instruction::with_variable(op.opcode, vars.name(vars.storage(*var)))
                }
            };
            out.push(instr);
        }
        out.reverse();
        Ok(out)
    }
}
