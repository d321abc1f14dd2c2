//! Symbolic compilation of one method.
//!
//! The IL evaluation stack is simulated with variable handles: loads push
//! the variable itself, computations write into pooled temporaries, and
//! nothing is copied until a store or a call needs it. Handlers registered
//! in the [`Registry`](super::Registry) do the per-instruction work through
//! the helpers here.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use cilow_asm::{HALT_ADDRESS, Opcode};

use crate::config::CompileConfig;
use crate::constant::Constant;
use crate::emit::{Access, Emitter, Label, NamePool, Target};
use crate::error::{CompileError, CompileResult};
use crate::externs::{ExternSignature, well_known};
use crate::il::{OpCode, Operation, Slot};
use crate::metadata::{FieldRef, MethodBody, MethodRef};
use crate::ops::CompareOp;
use crate::types::{BEHAVIOUR_VM_TYPE, Type};
use crate::variables::{FieldInit, ReferenceVar, Var, VarKind, Variables, naming};

use super::registry::Claim;
use super::unit::UnitContext;

/// A method lowered to symbolic instructions, ready to be linked.
pub struct CompiledMethod {
    pub name: String,
    pub export: bool,
    /// Where the host enters (the export prologue, if any).
    pub entry_address: u32,
    /// Where internal callers jump to.
    pub internal_address: u32,
    pub end_address: u32,
    pub(crate) vars: Variables,
    pub(crate) emitter: Emitter,
}

pub struct MethodCompiler<'a> {
    ctx: &'a UnitContext<'a>,
    names: &'a mut NamePool,
    body: &'a MethodBody,
    pub(crate) vars: Variables,
    pub(crate) emitter: Emitter,
    ops: Vec<Operation>,
    cursor: usize,
    marks: Vec<usize>,
    stack: Vec<Var>,
    jump_targets: BTreeSet<u32>,
    offset_labels: HashMap<u32, Label>,
    compiled: HashSet<u32>,
    merges: HashMap<u32, Vec<Var>>,
    reachable: bool,
    return_label: Label,
    export: bool,
    current: u32,
}

impl<'a> MethodCompiler<'a> {
    pub(crate) fn new(
        ctx: &'a UnitContext<'a>,
        names: &'a mut NamePool,
        body: &'a MethodBody,
        ops: Vec<Operation>,
        base: u32,
        export: bool,
    ) -> Self {
        let mut emitter = Emitter::new(base);
        let return_label = emitter.create_label();
        let jump_targets = ops.iter().flat_map(Operation::branch_targets).collect();
        Self {
            ctx,
            names,
            body,
            vars: Variables::new(body.method.name.clone()),
            emitter,
            ops,
            cursor: 0,
            marks: Vec::new(),
            stack: Vec::new(),
            jump_targets,
            offset_labels: HashMap::new(),
            compiled: HashSet::new(),
            merges: HashMap::new(),
            reachable: true,
            return_label,
            export,
            current: 0,
        }
    }

    pub fn config(&self) -> &CompileConfig {
        self.ctx.config
    }

    pub fn body(&self) -> &MethodBody {
        self.body
    }

    pub(crate) fn ctx(&self) -> &'a UnitContext<'a> {
        self.ctx
    }

    pub fn method_name(&self) -> &str {
        &self.body.method.name
    }

    pub fn compile(mut self) -> Result<CompiledMethod, crate::Error> {
        let name = self.body.method.name.clone();
        debug!(target: "cilow::compile", method = %name, ops = self.ops.len(), "compile method");
        let entry_address = self.emitter.address();
        match self.run() {
            Ok(internal_address) => Ok(CompiledMethod {
                name,
                export: self.export,
                entry_address,
                internal_address,
                end_address: self.emitter.address(),
                vars: self.vars,
                emitter: self.emitter,
            }),
            Err(source) => Err(crate::Error::Method {
                method: name,
                offset: (!self.ops.is_empty()).then_some(self.current),
                source,
            }),
        }
    }

    fn run(&mut self) -> CompileResult<u32> {
        if self.export {
            let halt = self.constant(Constant::U32(HALT_ADDRESS), &Type::UInt32)?;
            self.emitter.emit_var(Opcode::Push, halt);
        }
        let internal_address = self.emitter.address();

        while self.cursor < self.ops.len() {
            let op = self.ops[self.cursor].clone();
            self.cursor += 1;
            self.enter(op.offset)?;
            self.dispatch(&op)?;
        }
        if self.reachable && !self.stack.is_empty() {
            return Err(CompileError::Unsupported(
                "values left on the stack at method end".into(),
            ));
        }

        self.emitter.apply_label(self.return_label)?;
        let ra = self.return_address()?;
        self.emitter.emit_var(Opcode::Push, ra);
        self.emitter.emit(Opcode::Copy);
        self.jump_indirect(ra)?;

        self.vars.check_balance()?;
        Ok(internal_address)
    }

    fn dispatch(&mut self, op: &Operation) -> CompileResult<()> {
        let registry = self.ctx.registry;
        for translator in registry.translators_for(op.opcode) {
            if translator.translate(self, op)? == Claim::Claimed {
                trace!(target: "cilow::compile", %op, by = translator.name(), "lowered");
                return Ok(());
            }
        }
        Err(CompileError::UnsupportedInstruction {
            opcode: op.opcode.name(),
        })
    }

    /// Bookkeeping at the start of each instruction: place its label and
    /// reconcile the stack with any merge slots waiting there.
    fn enter(&mut self, offset: u32) -> CompileResult<()> {
        self.current = offset;
        if self.jump_targets.contains(&offset) {
            if let Some(merge) = self.merges.get(&offset).cloned() {
                if self.reachable {
                    self.spill(offset, &merge)?;
                    self.drop_stack()?;
                } else {
                    self.drop_stack()?;
                }
                self.stack = merge;
            } else if self.reachable && !self.stack.is_empty() {
                let merge = self.create_merge(offset)?;
                self.spill(offset, &merge)?;
                self.drop_stack()?;
                self.stack = merge.clone();
                self.merges.insert(offset, merge);
            } else if !self.reachable {
                self.drop_stack()?;
            }
            let label = self.label_at(offset);
            self.emitter.apply_label(label)?;
        }
        self.compiled.insert(offset);
        self.reachable = true;
        Ok(())
    }

    // ---- evaluation stack ----

    pub fn pop(&mut self) -> CompileResult<Var> {
        self.stack.pop().ok_or(CompileError::StackUnderflow)
    }

    /// Value `depth` entries below the top.
    pub fn peek(&self, depth: usize) -> CompileResult<Var> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .map(|i| self.stack[i])
            .ok_or(CompileError::StackUnderflow)
    }

    /// Push `var`, recording one pending read.
    pub fn push(&mut self, var: Var) -> CompileResult<()> {
        self.vars.allocate(var, 1)?;
        self.stack.push(var);
        Ok(())
    }

    /// Pop `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> CompileResult<Vec<Var>> {
        let at = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or(CompileError::StackUnderflow)?;
        Ok(self.stack.split_off(at))
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn consume(&mut self, var: Var) -> CompileResult<()> {
        self.vars.use_var(var)
    }

    pub fn consume_all(&mut self, vars: &[Var]) -> CompileResult<()> {
        vars.iter().try_for_each(|&v| self.consume(v))
    }

    fn drop_stack(&mut self) -> CompileResult<()> {
        let stack = std::mem::take(&mut self.stack);
        self.consume_all(&stack)
    }

    /// Before `dst` is overwritten, move stack entries that still read it
    /// into a temporary.
    pub fn protect_stack(&mut self, dst: Var) -> CompileResult<()> {
        let target = self.vars.storage(dst);
        let hits: Vec<usize> = (0..self.stack.len())
            .filter(|&i| self.vars.storage(self.stack[i]) == target)
            .collect();
        if hits.is_empty() {
            return Ok(());
        }
        let ty = self.vars.ty(target).clone();
        let saved = self.vars.temporary(&ty);
        self.emitter.add_copy(&self.vars, target, saved)?;
        for i in hits {
            let old = self.stack[i];
            let old_ty = self.vars.ty(old).clone();
            let value = if old_ty == ty {
                saved
            } else {
                self.vars.cast(saved, &old_ty)
            };
            self.vars.allocate(value, 1)?;
            self.stack[i] = value;
            self.consume(old)?;
        }
        Ok(())
    }

    // ---- lookahead ----

    /// The `n`-th upcoming operation, if no jump lands on it or before it.
    pub fn peek_op_at(&self, n: usize) -> Option<&Operation> {
        let ops = self.ops.get(self.cursor..=self.cursor + n)?;
        if ops.iter().any(|op| self.jump_targets.contains(&op.offset)) {
            return None;
        }
        ops.last()
    }

    pub fn peek_op(&self) -> Option<&Operation> {
        self.peek_op_at(0)
    }

    /// Consume the next operation as part of the current one.
    ///
    /// Handlers looking ahead speculatively bracket their `advance` calls
    /// with [`mark`](Self::mark) and then [`commit`](Self::commit) or
    /// [`rewind`](Self::rewind).
    pub fn advance(&mut self) {
        if let Some(op) = self.ops.get(self.cursor) {
            self.compiled.insert(op.offset);
            self.cursor += 1;
        }
    }

    pub fn mark(&mut self) {
        self.marks.push(self.cursor);
    }

    /// Give back every operation taken since the matching `mark`.
    pub fn rewind(&mut self) {
        let Some(at) = self.marks.pop() else {
            return;
        };
        for op in &self.ops[at..self.cursor] {
            self.compiled.remove(&op.offset);
        }
        self.cursor = at;
    }

    pub fn commit(&mut self) {
        self.marks.pop();
    }

    // ---- variables ----

    pub fn tmp(&mut self, ty: &Type) -> Var {
        self.vars.temporary(ty)
    }

    /// Temporary pinned until [`MethodCompiler::unpin`].
    pub fn pinned(&mut self, ty: &Type) -> CompileResult<Var> {
        let var = self.vars.temporary(ty);
        self.vars.reserve(var)?;
        Ok(var)
    }

    pub fn unpin(&mut self, var: Var) -> CompileResult<()> {
        self.vars.release(var)
    }

    /// Fresh temporary of `ty`, pushed.
    pub fn fresh(&mut self, ty: &Type) -> CompileResult<Var> {
        let var = self.vars.temporary(ty);
        self.push(var)?;
        Ok(var)
    }

    pub fn reference(&mut self, ty: &Type, reference: ReferenceVar) -> Var {
        self.vars.reference(ty, reference)
    }

    pub fn method_pointer(&mut self, method: MethodRef) -> Var {
        self.vars.method_pointer(method)
    }

    pub fn kind(&self, var: Var) -> &VarKind {
        self.vars.kind(var)
    }

    pub fn is_this(&self, var: Var) -> bool {
        self.vars.is_this(var)
    }

    /// Move stack entries that read fields into temporaries, before code
    /// that may run other methods of the unit.
    pub fn spill_fields(&mut self) -> CompileResult<()> {
        let fields: Vec<Var> = self
            .stack
            .iter()
            .map(|&v| self.vars.storage(v))
            .filter(|&v| matches!(self.vars.kind(v), VarKind::Field(_)))
            .collect();
        for field in fields {
            self.protect_stack(field)?;
        }
        Ok(())
    }

    /// Destination for a computed value of type `ty`.
    ///
    /// When the next operation merely stores into a slot of the same type
    /// that store is absorbed and the slot itself is returned; otherwise a
    /// fresh temporary is pushed.
    pub fn out_var(&mut self, ty: &Type) -> CompileResult<Var> {
        if self.ctx.config.elide_store_copies
            && let Some(dst) = self.store_target(ty)?
        {
            return Ok(dst);
        }
        self.fresh(ty)
    }

    fn store_target(&mut self, ty: &Type) -> CompileResult<Option<Var>> {
        let Some(next) = self.peek_op().cloned() else {
            return Ok(None);
        };
        let is_store = matches!(
            next.opcode,
            OpCode::Stloc0
                | OpCode::Stloc1
                | OpCode::Stloc2
                | OpCode::Stloc3
                | OpCode::StlocS
                | OpCode::Stloc
                | OpCode::StargS
                | OpCode::Starg
        );
        let slot = match next.slot() {
            Some(slot) if is_store && slot != Slot::This => slot,
            _ => return Ok(None),
        };
        self.mark();
        self.advance();
        let dst = self.slot_var(slot)?;
        if self.vars.ty(dst) != ty {
            self.rewind();
            return Ok(None);
        }
        self.commit();
        self.protect_stack(dst)?;
        Ok(Some(dst))
    }

    pub fn slot_var(&mut self, slot: Slot) -> CompileResult<Var> {
        match slot {
            Slot::This => self.this_var(),
            Slot::Local(i) => {
                let def = self.body.locals.get(i as usize).ok_or_else(|| {
                    CompileError::Unsupported(format!("local {i} is not declared"))
                })?;
                self.vars.local(i, def.name.as_deref(), &def.ty)
            }
            Slot::Argument(i) => {
                let ty = self.body.method.params.get(i as usize).ok_or_else(|| {
                    CompileError::Unsupported(format!("argument {i} is not declared"))
                })?;
                let ty = ty.clone();
                self.vars.argument(i, &ty)
            }
        }
    }

    pub fn this_var(&mut self) -> CompileResult<Var> {
        let ty = self.ctx.unit.self_type();
        self.vars
            .named(&naming::this(BEHAVIOUR_VM_TYPE), &ty, || VarKind::This)
    }

    /// Singleton for the instance's own transform or game object.
    pub fn self_pointing(&mut self, ty: &Type) -> CompileResult<Var> {
        self.vars
            .named(&naming::this(&ty.vm_name()), ty, || VarKind::SelfPointing)
    }

    pub fn return_slot(&mut self) -> CompileResult<Var> {
        let ty = self.body.method.ret.clone();
        self.vars.return_slot(&ty)
    }

    pub fn return_address(&mut self) -> CompileResult<Var> {
        self.vars.named(naming::RETURN_ADDRESS, &Type::UInt32, || {
            VarKind::Internal(Some(Constant::U32(0)))
        })
    }

    /// Slot of a field declared by this unit.
    pub fn field_var(&mut self, field: &FieldRef) -> CompileResult<Var> {
        let def = self.ctx.unit.field(&field.name);
        let init = FieldInit {
            init: def.and_then(|d| d.init.clone()),
            export: def.is_some_and(|d| d.export),
            sync: def.and_then(|d| d.sync),
        };
        let name = if field.is_static {
            naming::static_field(&field.declaring.full_name(), &field.name)
        } else {
            naming::field(&field.name)
        };
        self.vars.named(&name, &field.ty, || VarKind::Field(init))
    }

    /// A slot named by another method's calling convention.
    pub fn foreign_slot(&mut self, name: &str, ty: &Type) -> CompileResult<Var> {
        self.vars.named(name, ty, || VarKind::Internal(None))
    }

    pub fn constant(&mut self, value: Constant, ty: &Type) -> CompileResult<Var> {
        self.emitter
            .constant(&mut self.vars, self.names, value, ty)
    }

    pub fn const_i32(&mut self, value: i32) -> CompileResult<Var> {
        self.constant(Constant::I32(value), &Type::Int32)
    }

    pub fn const_str(&mut self, value: &str) -> CompileResult<Var> {
        self.constant(Constant::Str(value.to_string()), &Type::String)
    }

    pub fn null(&mut self, ty: &Type) -> CompileResult<Var> {
        self.constant(Constant::Null, ty)
    }

    pub fn is_constant(&self, var: Var) -> bool {
        self.vars.constant(var).is_some()
    }

    pub fn constant_of(&self, var: Var) -> Option<Constant> {
        self.vars.constant(var).cloned()
    }

    pub fn ty(&self, var: Var) -> Type {
        self.vars.ty(var).clone()
    }

    // ---- emission ----

    pub fn extern_var(&mut self, sig: &ExternSignature) -> CompileResult<Var> {
        let id = self
            .ctx
            .externs
            .resolve(sig)
            .ok_or_else(|| CompileError::UnknownExtern(sig.identifier()))?;
        self.emitter.extern_slot(&mut self.vars, self.names, &id)
    }

    pub fn call(
        &mut self,
        sig: &ExternSignature,
        inputs: &[Var],
        output: Option<Var>,
    ) -> CompileResult<()> {
        let slot = self.extern_var(sig)?;
        self.emitter.add_extern(&self.vars, slot, inputs, output)
    }

    pub fn call_with(
        &mut self,
        sig: &ExternSignature,
        inputs: &[(Var, Access)],
        output: Option<Var>,
    ) -> CompileResult<()> {
        let slot = self.extern_var(sig)?;
        self.emitter.add_extern_with(&self.vars, slot, inputs, output)
    }

    /// Call `sig` into a fresh temporary the caller consumes once.
    pub fn eval(&mut self, sig: &ExternSignature, inputs: &[Var], ty: &Type) -> CompileResult<Var> {
        let out = self.vars.temporary(ty);
        self.vars.allocate(out, 1)?;
        self.call(sig, inputs, Some(out))?;
        Ok(out)
    }

    /// EXTERN through a string slot assigned at runtime.
    pub fn call_dynamic(
        &mut self,
        slot: Var,
        inputs: &[Var],
        output: Option<Var>,
    ) -> CompileResult<()> {
        self.emitter.add_extern(&self.vars, slot, inputs, output)
    }

    pub fn dynamic_extern_slot(&mut self) -> CompileResult<Var> {
        let name = naming::dynamic_extern(&self.body.method.name);
        self.vars.named(&name, &Type::String, || VarKind::Internal(None))
    }

    pub fn copy(&mut self, src: Var, dst: Var) -> CompileResult<()> {
        if self.vars.storage(src) == self.vars.storage(dst) {
            return Ok(());
        }
        self.emitter.add_copy(&self.vars, src, dst)
    }

    pub fn new_label(&mut self) -> Label {
        self.emitter.create_label()
    }

    pub fn place(&mut self, label: Label) -> CompileResult<()> {
        self.emitter.apply_label(label)
    }

    pub fn jump(&mut self, label: Label) {
        self.emitter.add_jump(Target::Label(label));
    }

    pub fn jump_entry(&mut self, method: &str) {
        self.emitter.add_jump(Target::Entry(method.to_string()));
    }

    /// Jump to `label` when `cond` is false; consumes `cond`.
    pub fn jump_unless(&mut self, cond: Var, label: Label) -> CompileResult<()> {
        self.emitter.add_branch(&self.vars, cond, label)?;
        self.consume(cond)
    }

    /// Like [`MethodCompiler::jump_unless`] but leaves `cond` to the caller,
    /// for pinned flags tested more than once.
    pub fn jump_unless_held(&mut self, cond: Var, label: Label) -> CompileResult<()> {
        self.emitter.add_branch(&self.vars, cond, label)
    }

    pub fn jump_indirect(&mut self, var: Var) -> CompileResult<()> {
        self.emitter.add_jump_indirect(&self.vars, var)
    }

    pub fn address_of(&mut self, label: Label, ty: &Type) -> Var {
        self.emitter.address_of(&mut self.vars, label, ty)
    }

    /// Raise a runtime fault: an instance extern called on null.
    pub fn emit_fault(&mut self, reason: &str) -> CompileResult<()> {
        if self.ctx.config.annotate_faults {
            let text = self.const_str(reason)?;
            self.emitter.add_annotation(&self.vars, text);
        }
        let null = self.null(&Type::Object)?;
        let out = self.eval(&well_known::get_hash_code(), &[null], &Type::Int32)?;
        self.consume(out)
    }

    // ---- typing ----

    /// View `var` at type `ty` without touching its value.
    pub fn recast(&mut self, var: Var, ty: &Type) -> CompileResult<Var> {
        if self.vars.ty(var) == ty {
            return Ok(var);
        }
        let cast = self.vars.cast(var, ty);
        self.vars.allocate(cast, 1)?;
        self.consume(var)?;
        Ok(cast)
    }

    /// Bring `var` to type `ty`.
    ///
    /// Takes over one pending read of `var`; the caller consumes the result
    /// once instead.
    pub fn coerce(&mut self, var: Var, ty: &Type) -> CompileResult<Var> {
        let from = self.ty(var);
        if from == *ty {
            return Ok(var);
        }
        if let Some(c) = self.constant_of(var) {
            let converted = c.retype(ty).or_else(|| {
                self.ctx
                    .config
                    .constant_folding
                    .then(|| c.convert(ty))
                    .flatten()
            });
            if let Some(value) = converted {
                let folded = self.constant(value, ty)?;
                self.consume(var)?;
                return Ok(folded);
            }
        }
        if from.vm_name() == ty.vm_name()
            || from.underlying() == ty.underlying()
            || ty.is_assignable_from(&from)
            || (ty.is_reference() && from.is_reference())
        {
            return self.recast(var, ty);
        }
        let scalar = |t: &Type| t.underlying().is_numeric() || *t.underlying() == Type::Boolean;
        if scalar(&from) && scalar(ty) {
            return self.convert(var, ty);
        }
        Err(CompileError::TypeMismatch {
            expected: ty.clone(),
            found: from,
        })
    }

    /// Numeric conversion with truncation toward zero for float sources.
    pub fn convert(&mut self, var: Var, to: &Type) -> CompileResult<Var> {
        let from = self.ty(var);
        let target = to.underlying().clone();
        if from.underlying() == &target {
            return self.recast(var, to);
        }
        if self.ctx.config.constant_folding
            && let Some(value) = self.constant_of(var).and_then(|c| c.convert(&target))
        {
            let folded = self.constant(value, to)?;
            self.consume(var)?;
            return Ok(folded);
        }
        let mut input = var;
        if from.is_floating() && target.is_integral() {
            if from == Type::Single {
                let wide = self.eval(
                    &well_known::convert(&from, &Type::Double),
                    &[input],
                    &Type::Double,
                )?;
                self.consume(input)?;
                input = wide;
            }
            let truncated =
                self.eval(&well_known::truncate(&Type::Double), &[input], &Type::Double)?;
            self.consume(input)?;
            input = truncated;
        }
        let source = self.ty(input);
        let out = self.eval(&well_known::convert(&source, &target), &[input], &target)?;
        self.consume(input)?;
        self.recast(out, to)
    }

    // ---- control flow ----

    pub fn label_at(&mut self, offset: u32) -> Label {
        if let Some(&label) = self.offset_labels.get(&offset) {
            return label;
        }
        let label = self.emitter.create_label();
        self.offset_labels.insert(offset, label);
        label
    }

    fn create_merge(&mut self, offset: u32) -> CompileResult<Vec<Var>> {
        let method = self.body.method.name.clone();
        let mut merge = Vec::with_capacity(self.stack.len());
        for depth in 0..self.stack.len() {
            let ty = self.vars.ty(self.stack[depth]).clone();
            let name = naming::merge_slot(&method, offset, depth);
            merge.push(self.vars.named(&name, &ty, || VarKind::Internal(None))?);
        }
        Ok(merge)
    }

    fn spill(&mut self, target: u32, merge: &[Var]) -> CompileResult<()> {
        if merge.len() != self.stack.len() {
            return Err(CompileError::StackMismatch {
                target,
                expected: merge.len(),
                found: self.stack.len(),
            });
        }
        for (i, &slot) in merge.iter().enumerate() {
            let value = self.stack[i];
            self.copy(value, slot)?;
        }
        Ok(())
    }

    /// Hand the current stack to the code at `target`.
    ///
    /// With `keep` the values stay on the stack for the fall-through path.
    pub fn flow_to(&mut self, target: u32, keep: bool) -> CompileResult<()> {
        if self.stack.is_empty() {
            return match self.merges.get(&target) {
                Some(merge) if !merge.is_empty() => Err(CompileError::StackMismatch {
                    target,
                    expected: merge.len(),
                    found: 0,
                }),
                _ => Ok(()),
            };
        }
        if !self.merges.contains_key(&target) {
            if self.compiled.contains(&target) {
                return Err(CompileError::StackMismatch {
                    target,
                    expected: 0,
                    found: self.stack.len(),
                });
            }
            let merge = self.create_merge(target)?;
            self.merges.insert(target, merge);
        }
        let merge = self.merges[&target].clone();
        self.spill(target, &merge)?;
        if !keep {
            self.drop_stack()?;
        }
        Ok(())
    }

    /// Unconditional jump to an IL offset; ends the block.
    pub fn branch(&mut self, target: u32) -> CompileResult<()> {
        self.flow_to(target, false)?;
        let label = self.label_at(target);
        self.jump(label);
        self.end_block()
    }

    /// Jump to an IL offset when `cond` is false; consumes `cond`.
    pub fn branch_unless(&mut self, cond: Var, target: u32) -> CompileResult<()> {
        self.flow_to(target, true)?;
        let label = self.label_at(target);
        self.jump_unless(cond, label)
    }

    /// Jump to an IL offset when `cond` is true; consumes `cond`.
    pub fn branch_if(&mut self, cond: Var, target: u32) -> CompileResult<()> {
        let skip = self.new_label();
        self.jump_unless(cond, skip)?;
        self.flow_to(target, true)?;
        let label = self.label_at(target);
        self.jump(label);
        self.place(skip)
    }

    /// Nothing after this point is reached by falling through.
    pub fn end_block(&mut self) -> CompileResult<()> {
        self.drop_stack()?;
        self.reachable = false;
        Ok(())
    }

    /// Copy the top of the stack into the return slot and leave.
    pub fn emit_return(&mut self) -> CompileResult<()> {
        if self.body.method.has_return() {
            let value = self.pop()?;
            let ret_ty = self.body.method.ret.clone();
            let value = self.coerce(value, &ret_ty)?;
            let slot = self.return_slot()?;
            self.copy(value, slot)?;
            self.consume(value)?;
        }
        self.jump(self.return_label);
        self.end_block()
    }

    /// Internal call: arguments into the callee's slots, return address on
    /// the VM stack, jump to the callee entry.
    pub fn emit_internal_call(
        &mut self,
        callee: &str,
        params: &[Type],
        args: &[Var],
        ret: &Type,
    ) -> CompileResult<Option<Var>> {
        for (i, (&arg, ty)) in args.iter().zip(params).enumerate() {
            let dst = self.foreign_slot(&naming::argument(callee, i as u16), ty)?;
            let value = self.coerce(arg, ty)?;
            self.copy(value, dst)?;
            self.consume(value)?;
        }
        let resume = self.new_label();
        let address = self.address_of(resume, &Type::UInt32);
        self.emitter.emit_var(Opcode::Push, address);
        self.jump_entry(callee);
        self.place(resume)?;
        if ret.is_void() {
            return Ok(None);
        }
        let slot = self.foreign_slot(&naming::return_slot(callee), ret)?;
        Ok(Some(slot))
    }

    /// Boolean temporary holding `a <op> b` at type `ty`.
    pub fn compare(&mut self, op: CompareOp, a: Var, b: Var, ty: &Type) -> CompileResult<Var> {
        self.eval(&well_known::compare(op, ty), &[a, b], &Type::Boolean)
    }
}
