//! Built-in instruction translators.
//!
//! Each module lowers one family of IL instructions. Translators are tried
//! in priority order; lower numbers run first so specialised call lowering
//! can claim an instruction before the generic extern fallback sees it.
//! Each module lists the opcodes it lowers and is only offered those.

mod arith;
mod array;
mod branches;
mod calls;
mod compare;
mod conv;
mod delegates;
mod fields;
mod locals;
mod objects;
mod stack;
mod switch;

use super::registry::Registry;

pub const PRIORITY_DELEGATE: i32 = -30;
pub const PRIORITY_SELF_POINTING: i32 = -20;
pub const PRIORITY_INTERNAL: i32 = -10;
pub const PRIORITY_DEFAULT: i32 = 0;
pub const PRIORITY_FALLBACK: i32 = 100;

pub(crate) fn register_all(registry: &mut Registry) {
    registry.register_for("stack", PRIORITY_DEFAULT, stack::OPCODES, stack::translate);
    registry.register_for("locals", PRIORITY_DEFAULT, locals::OPCODES, locals::translate);
    registry.register_for("arith", PRIORITY_DEFAULT, arith::OPCODES, arith::translate);
    registry.register_for("conv", PRIORITY_DEFAULT, conv::OPCODES, conv::translate);
    registry.register_for("compare", PRIORITY_DEFAULT, compare::OPCODES, compare::translate);
    registry.register_for("branches", PRIORITY_DEFAULT, branches::OPCODES, branches::translate);
    registry.register_for("switch", PRIORITY_DEFAULT, switch::OPCODES, switch::translate);
    registry.register_for("array", PRIORITY_DEFAULT, array::OPCODES, array::translate);
    registry.register_for("fields", PRIORITY_DEFAULT, fields::OPCODES, fields::translate);
    registry.register_for("objects", PRIORITY_DEFAULT, objects::OPCODES, objects::translate);

    registry.register_for("delegates", PRIORITY_DELEGATE, delegates::OPCODES, delegates::translate);
    registry.register_for(
        "self-pointing",
        PRIORITY_SELF_POINTING,
        calls::OPCODES,
        calls::self_pointing,
    );
    registry.register_for("internal-call", PRIORITY_INTERNAL, calls::OPCODES, calls::internal);
    registry.register_for(
        "behaviour-event",
        PRIORITY_DEFAULT,
        calls::OPCODES,
        calls::behaviour_event,
    );
    registry.register_for("extern-call", PRIORITY_FALLBACK, calls::OPCODES, calls::extern_call);
}
