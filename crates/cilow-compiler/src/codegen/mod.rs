//! Multi-instruction code shapes built from the method compiler's
//! primitives: counted loops, jump tables, behaviour events and delegate
//! invocation lists.
//!
//! Values that live across labels are held in pinned temporaries so their
//! slots are not recycled while a loop is still reading them.

pub mod delegates;
pub mod events;
pub mod loops;
pub mod switch;
