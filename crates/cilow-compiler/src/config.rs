//! Compiler options.

use serde::Deserialize;

/// Options controlling code generation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    /// Evaluate arithmetic, comparisons and conversions on constants.
    pub(crate) constant_folding: bool,
    /// Fuse compare-then-branch and compare-then-negate idioms.
    pub(crate) fuse_comparisons: bool,
    /// Write results straight into the slot of a following store.
    pub(crate) elide_store_copies: bool,
    /// Emit an ANNOTATION naming the reason before each runtime fault.
    pub(crate) annotate_faults: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
            fuse_comparisons: true,
            elide_store_copies: true,
            annotate_faults: false,
        }
    }
}

impl CompileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant_folding(mut self, value: bool) -> Self {
        self.constant_folding = value;
        self
    }

    pub fn fuse_comparisons(mut self, value: bool) -> Self {
        self.fuse_comparisons = value;
        self
    }

    pub fn elide_store_copies(mut self, value: bool) -> Self {
        self.elide_store_copies = value;
        self
    }

    pub fn annotate_faults(mut self, value: bool) -> Self {
        self.annotate_faults = value;
        self
    }

    /// No folding or fusion: one handler per instruction, literally.
    pub fn literal() -> Self {
        Self {
            constant_folding: false,
            fuse_comparisons: false,
            elide_store_copies: false,
            annotate_faults: false,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
