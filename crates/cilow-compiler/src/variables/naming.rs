//! Data-section names for compiler-created variables.
//!
//! Names are derived from the owning method so that a caller can address a
//! callee's argument and return slots without seeing the callee's tables.

use cilow_core::sanitize_ident;

pub const RETURN_ADDRESS: &str = "__return_address";

pub fn argument(method: &str, index: u16) -> String {
    format!("__{}_arg{index}", sanitize_ident(method))
}

pub fn return_slot(method: &str) -> String {
    format!("__{}__ret", sanitize_ident(method))
}

pub fn local(method: &str, name: &str) -> String {
    format!("__{}_lcl_{}", sanitize_ident(method), sanitize_ident(name))
}

/// Locals without a debug name are keyed by their slot index.
pub fn unnamed_local(method: &str, index: u16) -> String {
    format!("__{}_lcl_{index}", sanitize_ident(method))
}

pub fn temporary(method: &str, vm_type: &str, n: usize) -> String {
    format!("__{}_tmp_{vm_type}_{n}", sanitize_ident(method))
}

pub fn merge_slot(method: &str, offset: u32, depth: usize) -> String {
    format!("__{}_stk_{offset:04x}_{depth}", sanitize_ident(method))
}

pub fn address(method: &str, n: usize) -> String {
    format!("__{}_addr_{n}", sanitize_ident(method))
}

pub fn this(vm_type: &str) -> String {
    format!("__this_{vm_type}")
}

pub fn field(name: &str) -> String {
    sanitize_ident(name)
}

pub fn static_field(owner: &str, name: &str) -> String {
    format!("__static_{}_{}", sanitize_ident(owner), sanitize_ident(name))
}

pub fn constant(vm_type: &str, n: usize) -> String {
    format!("__const_{vm_type}_{n}")
}

pub fn extern_slot(n: usize) -> String {
    format!("__extern_{n}")
}

/// String slot holding an extern identifier chosen at runtime.
pub fn dynamic_extern(method: &str) -> String {
    format!("__{}_dynextern", sanitize_ident(method))
}
