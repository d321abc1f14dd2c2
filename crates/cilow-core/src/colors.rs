//! Terminal palette for assembly listings.

/// Escape sequences by role in a listing. Every field is empty when color
/// is off, so callers can format unconditionally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Colors {
    /// Opcodes and `.section` directives.
    pub mnemonic: &'static str,
    /// Initial values and extern identifiers.
    pub literal: &'static str,
    /// Entry point names.
    pub label: &'static str,
    /// Addresses, flags and trailing comments.
    pub muted: &'static str,
    pub reset: &'static str,
}

const ANSI: Colors = Colors {
    mnemonic: "\x1b[34m",
    literal: "\x1b[32m",
    label: "\x1b[33m",
    muted: "\x1b[2m",
    reset: "\x1b[0m",
};

impl Colors {
    pub fn new(enabled: bool) -> Self {
        if enabled { ANSI } else { Self::default() }
    }

    pub fn is_enabled(&self) -> bool {
        !self.reset.is_empty()
    }
}
