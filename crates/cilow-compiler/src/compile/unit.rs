//! Compiling and linking a whole unit into one [`Program`].

use std::collections::{HashMap, HashSet};

use tracing::debug;

use cilow_asm::{EntryPoint, Program};

use crate::Error;
use crate::config::CompileConfig;
use crate::emit::{Label, NamePool};
use crate::error::{CompileError, CompileResult};
use crate::externs::ExternTable;
use crate::il::{OpCode, Operation, Reader};
use crate::metadata::{Member, MetadataResolver, UnitDef};
use crate::variables::{FieldInit, VarKind, VariableTable, Variables, naming};

use super::method::{CompiledMethod, MethodCompiler};
use super::registry::Registry;

/// Everything shared by the methods of one unit.
pub struct UnitContext<'a> {
    pub unit: &'a UnitDef,
    pub externs: &'a dyn ExternTable,
    pub registry: &'a Registry,
    pub config: &'a CompileConfig,
    /// Methods reachable from the host, by name.
    pub exported: HashSet<String>,
}

impl UnitContext<'_> {
    /// Whether `name` is a method of this unit.
    pub fn has_method(&self, name: &str) -> bool {
        self.unit.method(name).is_some()
    }
}

pub struct UnitCompiler<'a> {
    unit: &'a UnitDef,
    resolver: &'a dyn MetadataResolver,
    externs: &'a dyn ExternTable,
    registry: Registry,
    config: CompileConfig,
}

impl<'a> UnitCompiler<'a> {
    pub fn new(
        unit: &'a UnitDef,
        resolver: &'a dyn MetadataResolver,
        externs: &'a dyn ExternTable,
    ) -> Self {
        Self {
            unit,
            resolver,
            externs,
            registry: Registry::standard(),
            config: CompileConfig::default(),
        }
    }

    pub fn config(mut self, config: CompileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn compile(&self) -> Result<Program, Error> {
        debug!(target: "cilow::unit", unit = %self.unit.name, methods = self.unit.methods.len(), "compile unit");
        self.check_duplicates()?;

        let mut decoded = Vec::with_capacity(self.unit.methods.len());
        for body in &self.unit.methods {
            let ops = Reader::new(&body.code, body.method.is_static, self.resolver)
                .with_slots(body.method.params.len(), body.locals.len())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| Error::Decode {
                    method: body.method.name.clone(),
                    source,
                })?;
            decoded.push(ops);
        }
        self.check_recursion(&decoded)?;

        let ctx = UnitContext {
            unit: self.unit,
            externs: self.externs,
            registry: &self.registry,
            config: &self.config,
            exported: self.exported(&decoded),
        };

        let mut names = NamePool::new();
        let mut methods = Vec::with_capacity(decoded.len());
        let mut address = 0;
        for (body, ops) in self.unit.methods.iter().zip(decoded) {
            let export = ctx.exported.contains(&body.method.name);
            let compiled =
                MethodCompiler::new(&ctx, &mut names, body, ops, address, export).compile()?;
            address = compiled.end_address;
            methods.push(compiled);
        }

        let program = link(self.unit, &methods)?;
        program.validate()?;
        debug!(target: "cilow::unit", data = program.data.len(), code = program.code.len(), "linked");
        Ok(program)
    }

    fn check_duplicates(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for body in &self.unit.methods {
            if !seen.insert(body.method.name.as_str()) {
                return Err(Error::DuplicateMethod(body.method.name.clone()));
            }
        }
        Ok(())
    }

    /// Callees share their argument and return slots with every caller, so
    /// no method may reach itself through calls within the unit.
    fn check_recursion(&self, decoded: &[Vec<Operation>]) -> Result<(), Error> {
        let calls: Vec<Vec<(usize, u32)>> = decoded
            .iter()
            .map(|ops| ops.iter().filter_map(|op| self.internal_callee(op)).collect())
            .collect();

        let mut state = vec![Visit::New; calls.len()];
        for start in 0..calls.len() {
            self.visit(start, &calls, &mut state)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        at: usize,
        calls: &[Vec<(usize, u32)>],
        state: &mut [Visit],
    ) -> Result<(), Error> {
        if state[at] != Visit::New {
            return Ok(());
        }
        state[at] = Visit::OnPath;
        for &(callee, offset) in &calls[at] {
            match state[callee] {
                Visit::New => self.visit(callee, calls, state)?,
                Visit::OnPath => {
                    let name = &self.unit.methods[callee].method.name;
                    return Err(Error::Method {
                        method: self.unit.methods[at].method.name.clone(),
                        offset: Some(offset),
                        source: CompileError::Unsupported(format!("recursive call to `{name}`")),
                    });
                }
                Visit::Done => {}
            }
        }
        state[at] = Visit::Done;
        Ok(())
    }

    /// Index and call offset of a `call`/`callvirt` into this unit.
    fn internal_callee(&self, op: &Operation) -> Option<(usize, u32)> {
        if !matches!(op.opcode, OpCode::Call | OpCode::Callvirt) {
            return None;
        }
        let Some(Member::Method(m)) = op.member() else {
            return None;
        };
        if m.is_ctor() || !self.unit.is_self_type(&m.declaring) {
            return None;
        }
        let index = self.unit.methods.iter().position(|b| b.method.name == m.name)?;
        Some((index, op.offset))
    }

    /// Methods flagged for export, plus every method a delegate may point at.
    fn exported(&self, decoded: &[Vec<Operation>]) -> HashSet<String> {
        let mut exported: HashSet<String> = self
            .unit
            .methods
            .iter()
            .filter(|m| m.export)
            .map(|m| m.method.name.clone())
            .collect();
        for op in decoded.iter().flatten() {
            if !matches!(op.opcode, OpCode::Ldftn | OpCode::Ldvirtftn) {
                continue;
            }
            if let Some(Member::Method(m)) = op.member()
                && self.unit.is_self_type(&m.declaring)
                && self.unit.method(&m.name).is_some()
            {
                exported.insert(m.name.clone());
            }
        }
        exported
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

/// Resolve cross-method jumps and merge the per-method data sections.
fn link(unit: &UnitDef, methods: &[CompiledMethod]) -> Result<Program, Error> {
    let entries: HashMap<&str, u32> = methods
        .iter()
        .map(|m| (m.name.as_str(), m.internal_address))
        .collect();
    let lookup = |name: &str| entries.get(name).copied();

    let mut program = Program::new();
    let mut table = VariableTable::new();

    let mut fields = Variables::new(unit.name.clone());
    let mut declared = HashSet::new();
    for field in &unit.fields {
        if !declared.insert(field.name.as_str()) {
            return Err(Error::DuplicateName(field.name.clone()));
        }
        let init = FieldInit {
            init: field.init.clone(),
            export: field.export,
            sync: field.sync,
        };
        fields
            .named(&naming::field(&field.name), &field.ty, || VarKind::Field(init))
            .map_err(|_| Error::DuplicateName(field.name.clone()))?;
    }
    for entry in fields.data_entries(&no_labels)? {
        table.insert(entry).map_err(Error::DuplicateName)?;
    }

    for method in methods {
        let code = method
            .emitter
            .build(&method.vars, &lookup)
            .map_err(|source| method_error(method, source))?;
        program.code.extend(code);

        let resolve = |label| method.emitter.label_address(label);
        let data = method
            .vars
            .data_entries(&resolve)
            .map_err(|source| method_error(method, source))?;
        for entry in data {
            table.insert(entry).map_err(Error::DuplicateName)?;
        }

        program.entries.push(EntryPoint {
            name: method.name.clone(),
            address: method.entry_address,
            exported: method.export,
        });
    }

    program.data = table.into_entries();
    Ok(program)
}

fn no_labels(label: Label) -> CompileResult<u32> {
    Err(CompileError::LabelNotApplied(label.id()))
}

fn method_error(method: &CompiledMethod, source: CompileError) -> Error {
    Error::Method {
        method: method.name.clone(),
        offset: None,
        source,
    }
}
