//! The interpreter loop.

use std::collections::HashMap;

use tracing::{debug, trace};

use cilow_asm::{HALT_ADDRESS, Opcode, Operand, Program};

use super::error::RuntimeError;
use super::externs::{Builtin, ExternLibrary, Signature};
use super::value::Value;

/// Runtime limits for one run.
#[derive(Clone, Copy, Debug)]
pub struct FuelLimits {
    /// Maximum total instructions (default: 1,000,000).
    pub(crate) exec_fuel: u32,
    /// Maximum custom-event nesting (default: 64).
    pub(crate) recursion_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            recursion_limit: 64,
        }
    }
}

impl FuelLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn get_exec_fuel(&self) -> u32 {
        self.exec_fuel
    }

    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

/// A loaded program: heap, operand stack and code.
pub struct VM<'p> {
    program: &'p Program,
    heap: Vec<Value>,
    names: HashMap<&'p str, usize>,
    /// Instruction index by byte address.
    addresses: HashMap<u32, usize>,
    /// Heap slot of each instruction's variable operand.
    operands: Vec<Option<usize>>,
    code_size: u32,
    stack: Vec<usize>,
    externs: ExternLibrary,
    /// Extra heap cell holding the halt address, for entering methods that
    /// have no export prologue.
    halt_slot: usize,
    limits: FuelLimits,
    exec_fuel: u32,
    depth: u32,
}

pub struct VMBuilder<'p> {
    program: &'p Program,
    externs: ExternLibrary,
    limits: FuelLimits,
}

impl<'p> VMBuilder<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            externs: ExternLibrary::new(),
            limits: FuelLimits::default(),
        }
    }

    pub fn externs(mut self, externs: ExternLibrary) -> Self {
        self.externs = externs;
        self
    }

    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.limits = self.limits.exec_fuel(fuel);
        self
    }

    /// Load the data section and index the code.
    pub fn build(self) -> Result<VM<'p>, RuntimeError> {
        let program = self.program;
        let mut heap = Vec::with_capacity(program.data.len() + 1);
        let mut names = HashMap::with_capacity(program.data.len());
        for (i, entry) in program.data.iter().enumerate() {
            heap.push(Value::from_literal(&entry.type_name, &entry.init));
            names.insert(entry.name.as_str(), i);
        }
        let halt_slot = heap.len();
        heap.push(Value::UInt32(HALT_ADDRESS));

        let mut addresses = HashMap::with_capacity(program.code.len());
        let mut operands = Vec::with_capacity(program.code.len());
        let mut address = 0u32;
        for (i, instr) in program.code.iter().enumerate() {
            addresses.insert(address, i);
            let slot = match &instr.operand {
                Some(Operand::Variable(name)) => Some(
                    *names
                        .get(name.as_str())
                        .ok_or_else(|| RuntimeError::UnknownVariable(name.clone()))?,
                ),
                _ => None,
            };
            operands.push(slot);
            address += instr.size();
        }

        Ok(VM {
            program,
            heap,
            names,
            addresses,
            operands,
            code_size: address,
            stack: Vec::new(),
            externs: self.externs,
            halt_slot,
            limits: self.limits,
            exec_fuel: self.limits.exec_fuel,
            depth: 0,
        })
    }
}

impl<'p> VM<'p> {
    pub fn builder(program: &'p Program) -> VMBuilder<'p> {
        VMBuilder::new(program)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names.get(name).map(|&i| &self.heap[i])
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let slot = self.slot(name)?;
        self.heap[slot] = value;
        Ok(())
    }

    /// Operand stack depth; zero between runs of well-formed code.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Instructions left before the fuel limit.
    pub fn remaining_fuel(&self) -> u32 {
        self.exec_fuel
    }

    /// Run the method `name` until it returns to the host.
    pub fn run(&mut self, name: &str) -> Result<(), RuntimeError> {
        debug!(target: "cilow::vm", entry = name, "run");
        self.exec_fuel = self.limits.exec_fuel;
        self.enter(name)
    }

    fn slot(&self, name: &str) -> Result<usize, RuntimeError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))
    }

    fn enter(&mut self, name: &str) -> Result<(), RuntimeError> {
        let entry = self
            .program
            .entry(name)
            .ok_or_else(|| RuntimeError::UnknownEntry(name.to_string()))?;
        if !entry.exported {
            self.stack.push(self.halt_slot);
        }
        self.execute(entry.address)
    }

    fn pop(&mut self, address: u32) -> Result<usize, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow(address))
    }

    fn execute(&mut self, start: u32) -> Result<(), RuntimeError> {
        let program = self.program;
        let mut pc = start;
        loop {
            if pc == HALT_ADDRESS || pc >= self.code_size {
                return Ok(());
            }
            let index = *self
                .addresses
                .get(&pc)
                .ok_or(RuntimeError::BadAddress(pc))?;
            if self.exec_fuel == 0 {
                return Err(RuntimeError::ExecFuelExhausted(self.limits.exec_fuel));
            }
            self.exec_fuel -= 1;

            let instr = &program.code[index];
            trace!(target: "cilow::vm", address = pc, %instr, depth = self.stack.len(), "step");
            let next = pc + instr.size();
            let operand = self.operands[index];
            let here = pc;
            let var = move || operand.ok_or(RuntimeError::Malformed(here));
            pc = match instr.opcode {
                Opcode::Nop | Opcode::Annotation => next,
                Opcode::Push => {
                    self.stack.push(var()?);
                    next
                }
                Opcode::Pop => {
                    self.pop(pc)?;
                    next
                }
                Opcode::Copy => {
                    let dst = self.pop(pc)?;
                    let src = self.pop(pc)?;
                    self.heap[dst] = self.heap[src].clone();
                    next
                }
                Opcode::JumpIfFalse => {
                    let cond = self.pop(pc)?;
                    let target = instr.address().ok_or(RuntimeError::Malformed(pc))?;
                    match &self.heap[cond] {
                        Value::Bool(true) => next,
                        Value::Bool(false) => target,
                        other => {
                            return Err(RuntimeError::TypeError {
                                expected: "a boolean condition",
                                found: other.to_string(),
                            });
                        }
                    }
                }
                Opcode::Jump => instr.address().ok_or(RuntimeError::Malformed(pc))?,
                Opcode::JumpIndirect => {
                    let value = &self.heap[var()?];
                    value
                        .as_int()
                        .and_then(|a| u32::try_from(a).ok())
                        .ok_or_else(|| RuntimeError::TypeError {
                            expected: "a code address",
                            found: value.to_string(),
                        })?
                }
                Opcode::Extern => {
                    let id = match &self.heap[var()?] {
                        Value::Str(id) => id.clone(),
                        other => {
                            return Err(RuntimeError::TypeError {
                                expected: "an extern identifier",
                                found: other.to_string(),
                            });
                        }
                    };
                    self.call_extern(&id, pc)?;
                    next
                }
            };
        }
    }

    fn pop_operands(&mut self, n: usize, address: u32) -> Result<Vec<usize>, RuntimeError> {
        let at = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or(RuntimeError::StackUnderflow(address))?;
        Ok(self.stack.split_off(at))
    }

    fn call_extern(&mut self, id: &str, address: u32) -> Result<(), RuntimeError> {
        let sig = Signature::parse(id);
        if let Some(host) = self.externs.host(id) {
            let is_static = host.is_static;
            let sig = sig.ok_or_else(|| RuntimeError::UnknownExtern(id.to_string()))?;
            let slots = self.pop_operands(sig.arity(is_static), address)?;
            let mut values: Vec<Value> = slots.iter().map(|&s| self.heap[s].clone()).collect();
            if !is_static && values.first().is_some_and(Value::is_null) {
                return Err(RuntimeError::NullReference(id.to_string()));
            }
            let host = self
                .externs
                .host(id)
                .ok_or_else(|| RuntimeError::UnknownExtern(id.to_string()))?;
            (host.f)(&mut values)?;
            self.write_back(&sig, is_static, &slots, &values);
            return Ok(());
        }

        let sig = sig.ok_or_else(|| RuntimeError::UnknownExtern(id.to_string()))?;
        let builtin =
            Builtin::resolve(&sig).ok_or_else(|| RuntimeError::UnknownExtern(id.to_string()))?;
        let is_static = builtin.is_static();
        let slots = self.pop_operands(sig.arity(is_static), address)?;
        let inputs = slots.len() - usize::from(sig.returns());
        let args: Vec<Value> = slots[..inputs].iter().map(|&s| self.heap[s].clone()).collect();
        if !is_static && args.first().is_some_and(Value::is_null) {
            return Err(RuntimeError::NullReference(id.to_string()));
        }

        let result = match builtin {
            Builtin::SendCustomEvent => {
                let name = string_arg(&args, 1)?;
                self.send_event(&name)?;
                None
            }
            Builtin::SetProgramVariable => {
                let name = string_arg(&args, 1)?;
                let value = args.get(2).cloned().unwrap_or(Value::Null);
                self.set(&name, value)?;
                None
            }
            Builtin::GetProgramVariable => {
                let name = string_arg(&args, 1)?;
                Some(self.heap[self.slot(&name)?].clone())
            }
            other => other.eval(&sig, &args)?,
        };
        if let (Some(value), true) = (result, sig.returns())
            && let Some(&out) = slots.last()
        {
            self.heap[out] = value;
        }
        Ok(())
    }

    /// Store back the instance, which a struct method may have changed, and
    /// the result.
    fn write_back(&mut self, sig: &Signature<'_>, is_static: bool, slots: &[usize], values: &[Value]) {
        if !is_static && let (Some(&slot), Some(value)) = (slots.first(), values.first()) {
            self.heap[slot] = value.clone();
        }
        if sig.returns() && let (Some(&slot), Some(value)) = (slots.last(), values.last()) {
            self.heap[slot] = value.clone();
        }
    }

    /// Run another method of this behaviour to completion.
    fn send_event(&mut self, name: &str) -> Result<(), RuntimeError> {
        if self.depth >= self.limits.recursion_limit {
            return Err(RuntimeError::RecursionLimitExceeded(self.limits.recursion_limit));
        }
        debug!(target: "cilow::vm", event = name, "custom event");
        self.depth += 1;
        let result = self.enter(name);
        self.depth -= 1;
        result
    }
}

fn string_arg(args: &[Value], i: usize) -> Result<String, RuntimeError> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s.to_string()),
        other => Err(RuntimeError::TypeError {
            expected: "a string",
            found: other.map(Value::to_string).unwrap_or_default(),
        }),
    }
}
