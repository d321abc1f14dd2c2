use crate::Opcode;

#[test]
fn bare_opcodes_are_four_bytes() {
    for op in [Opcode::Nop, Opcode::Pop, Opcode::Copy] {
        assert!(!op.has_operand());
        assert_eq!(op.size(), 4, "{op}");
    }
}

#[test]
fn operand_opcodes_are_eight_bytes() {
    for op in [
        Opcode::Push,
        Opcode::Jump,
        Opcode::JumpIfFalse,
        Opcode::Extern,
        Opcode::JumpIndirect,
        Opcode::Annotation,
    ] {
        assert!(op.has_operand());
        assert_eq!(op.size(), 8, "{op}");
    }
}

#[test]
fn mnemonic_lookup_covers_vocabulary() {
    for op in Opcode::ALL {
        assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
    }
    assert_eq!(Opcode::from_mnemonic("CALL"), None);
}

#[test]
fn only_jumps_take_addresses() {
    let address_ops: Vec<_> = Opcode::ALL.into_iter().filter(|op| op.takes_address()).collect();
    assert_eq!(address_ops, vec![Opcode::JumpIfFalse, Opcode::Jump]);
}
