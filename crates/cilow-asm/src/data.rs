//! Data section entries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Initial value of a heap variable.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Literal {
    Null,
    /// Bound to the running behaviour (or one of its self-pointing views).
    This,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    /// Code address, printed in hex like jump operands.
    Address(u32),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::This => f.write_str("this"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::UInt(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Char(c) => write!(f, "{c:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Address(addr) => write!(f, "0x{addr:08X}"),
        }
    }
}

/// Network sync mode for exported variables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    None,
    Linear,
    Smooth,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncMode::None => "none",
            SyncMode::Linear => "linear",
            SyncMode::Smooth => "smooth",
        })
    }
}

/// One heap variable of the data section.
#[derive(Clone, PartialEq, Debug)]
pub struct DataEntry {
    pub name: String,
    /// Target VM type name, e.g. `SystemInt32`.
    pub type_name: String,
    pub init: Literal,
    pub export: bool,
    pub sync: Option<SyncMode>,
}

impl DataEntry {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, init: Literal) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            init,
            export: false,
            sync: None,
        }
    }

    pub fn exported(mut self, export: bool) -> Self {
        self.export = export;
        self
    }

    pub fn synced(mut self, sync: Option<SyncMode>) -> Self {
        self.sync = sync;
        self
    }
}
