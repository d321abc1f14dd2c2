//! Method and unit compilation.

mod handlers;
mod method;
mod registry;
mod unit;

#[cfg(test)]
mod method_tests;
#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod unit_tests;

pub use handlers::{
    PRIORITY_DEFAULT, PRIORITY_DELEGATE, PRIORITY_FALLBACK, PRIORITY_INTERNAL,
    PRIORITY_SELF_POINTING,
};
pub use method::{CompiledMethod, MethodCompiler};
pub use registry::{Claim, FnTranslator, Registry, TranslateFn, Translator};
pub use unit::{UnitCompiler, UnitContext};
