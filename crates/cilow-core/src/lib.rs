#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Shared leaf utilities for the cilow workspace.
//!
//! - `Colors`: ANSI palette for listings and diagnostics
//! - `mangle`: turning managed names into target VM identifiers

pub mod colors;
pub mod mangle;

#[cfg(test)]
mod mangle_tests;

pub use colors::Colors;
pub use mangle::{mangle_type_name, sanitize_ident};
