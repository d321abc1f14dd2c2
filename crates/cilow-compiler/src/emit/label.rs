//! Symbolic code positions.
//!
//! A label is either known up front (an address fixed before emission) or
//! embedded: created empty and applied exactly once at the address where it
//! is placed in the instruction stream.

use crate::error::{CompileError, CompileResult};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub fn id(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug)]
enum LabelSlot {
    Known(u32),
    Embedded(Option<u32>),
}

#[derive(Clone, Debug, Default)]
pub struct Labels {
    slots: Vec<LabelSlot>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// New embedded label, to be applied later.
    pub fn create(&mut self) -> Label {
        self.slots.push(LabelSlot::Embedded(None));
        Label(self.slots.len() as u32 - 1)
    }

    pub fn known(&mut self, address: u32) -> Label {
        self.slots.push(LabelSlot::Known(address));
        Label(self.slots.len() as u32 - 1)
    }

    pub fn apply(&mut self, label: Label, address: u32) -> CompileResult<()> {
        match &mut self.slots[label.0 as usize] {
            LabelSlot::Embedded(slot @ None) => {
                *slot = Some(address);
                Ok(())
            }
            _ => Err(CompileError::LabelAppliedTwice(label.0)),
        }
    }

    pub fn is_applied(&self, label: Label) -> bool {
        !matches!(self.slots[label.0 as usize], LabelSlot::Embedded(None))
    }

    pub fn address(&self, label: Label) -> CompileResult<u32> {
        match self.slots[label.0 as usize] {
            LabelSlot::Known(address) | LabelSlot::Embedded(Some(address)) => Ok(address),
            LabelSlot::Embedded(None) => Err(CompileError::LabelNotApplied(label.0)),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
