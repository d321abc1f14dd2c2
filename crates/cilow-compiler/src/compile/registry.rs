//! Ordered table of instruction translators.

use std::collections::HashMap;

use crate::error::CompileResult;
use crate::il::{OpCode, Operation};

use super::method::MethodCompiler;

/// Outcome of offering an operation to a translator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Claim {
    Claimed,
    Declined,
}

/// Lowers one IL operation, or declines it.
///
/// A translator that declines must leave the compiler untouched.
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    /// Opcodes this translator may claim; `None` offers it every operation.
    fn opcodes(&self) -> Option<&[OpCode]> {
        None
    }

    fn translate(&self, c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim>;
}

pub type TranslateFn = fn(&mut MethodCompiler<'_>, &Operation) -> CompileResult<Claim>;

/// Translator backed by a plain function.
pub struct FnTranslator {
    name: &'static str,
    opcodes: Option<&'static [OpCode]>,
    f: TranslateFn,
}

impl FnTranslator {
    pub fn new(name: &'static str, f: TranslateFn) -> Self {
        Self {
            name,
            opcodes: None,
            f,
        }
    }

    /// Restrict the translator to `opcodes`.
    pub fn only(mut self, opcodes: &'static [OpCode]) -> Self {
        self.opcodes = Some(opcodes);
        self
    }
}

impl Translator for FnTranslator {
    fn name(&self) -> &str {
        self.name
    }

    fn opcodes(&self) -> Option<&[OpCode]> {
        self.opcodes
    }

    fn translate(&self, c: &mut MethodCompiler<'_>, op: &Operation) -> CompileResult<Claim> {
        (self.f)(c, op)
    }
}

struct Entry {
    priority: i32,
    translator: Box<dyn Translator>,
}

/// Translators ordered by ascending priority, then registration order.
///
/// Each operation is offered only to the translators registered for its
/// opcode plus those that accept any opcode.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
    /// Entry indices per opcode, wildcards included, in priority order.
    by_opcode: HashMap<OpCode, Vec<usize>>,
    wildcards: Vec<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in translators.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        super::handlers::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, priority: i32, translator: impl Translator + 'static) {
        let at = self.entries.partition_point(|e| e.priority <= priority);
        self.entries.insert(
            at,
            Entry {
                priority,
                translator: Box::new(translator),
            },
        );
        self.reindex();
    }

    pub fn register_fn(&mut self, name: &'static str, priority: i32, f: TranslateFn) {
        self.register(priority, FnTranslator::new(name, f));
    }

    pub fn register_for(
        &mut self,
        name: &'static str,
        priority: i32,
        opcodes: &'static [OpCode],
        f: TranslateFn,
    ) {
        self.register(priority, FnTranslator::new(name, f).only(opcodes));
    }

    fn reindex(&mut self) {
        self.by_opcode.clear();
        self.wildcards.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            match entry.translator.opcodes() {
                Some(opcodes) => {
                    for &opcode in opcodes {
                        self.by_opcode.entry(opcode).or_default().push(i);
                    }
                }
                None => self.wildcards.push(i),
            }
        }
        for indices in self.by_opcode.values_mut() {
            indices.extend_from_slice(&self.wildcards);
            indices.sort_unstable();
            indices.dedup();
        }
    }

    /// Every translator, in the order they are tried.
    pub fn translators(&self) -> impl Iterator<Item = &dyn Translator> {
        self.entries.iter().map(|e| e.translator.as_ref())
    }

    /// The translators an operation with `opcode` is offered to, in order.
    pub fn translators_for(&self, opcode: OpCode) -> impl Iterator<Item = &dyn Translator> {
        let indices = self.by_opcode.get(&opcode).unwrap_or(&self.wildcards);
        indices.iter().map(|&i| self.entries[i].translator.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.translators().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
