use indoc::indoc;

use cilow_core::Colors;

use crate::{
    DataEntry, EntryPoint, HALT_ADDRESS, Instruction, Literal, Opcode, Program, ProgramError,
    SyncMode, dump,
};

fn sample() -> Program {
    Program {
        data: vec![
            DataEntry::new("count", "SystemInt32", Literal::Int(0))
                .exported(true)
                .synced(Some(SyncMode::Linear)),
            DataEntry::new("__const_SystemUInt32_0", "SystemUInt32", Literal::Address(HALT_ADDRESS)),
            DataEntry::new("__extern_0", "SystemString", Literal::Str("SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32".into())),
            DataEntry::new("__return_address", "SystemUInt32", Literal::UInt(0)),
        ],
        code: vec![
            Instruction::with_variable(Opcode::Push, "__const_SystemUInt32_0"),
            Instruction::with_variable(Opcode::Push, "count"),
            Instruction::with_variable(Opcode::Push, "count"),
            Instruction::with_variable(Opcode::Push, "count"),
            Instruction::with_variable(Opcode::Extern, "__extern_0"),
            Instruction::with_variable(Opcode::Push, "__return_address"),
            Instruction::bare(Opcode::Copy),
            Instruction::with_variable(Opcode::JumpIndirect, "__return_address"),
        ],
        entries: vec![
            EntryPoint {
                name: "Double".into(),
                address: 0,
                exported: true,
            },
            EntryPoint {
                name: "__Double_internal".into(),
                address: 8,
                exported: false,
            },
        ],
    }
}

#[test]
fn addresses_follow_opcode_sizes() {
    let program = sample();
    assert_eq!(program.addresses(), vec![0, 8, 16, 24, 32, 40, 48, 52]);
    assert_eq!(program.code_size(), 60);
    assert_eq!(program.instruction_at(52), Some(7));
    assert_eq!(program.instruction_at(50), None);
}

#[test]
fn assembly_text() {
    let text = sample().to_assembly();
    assert_eq!(
        text,
        indoc! {r#"
            .data_start
                .export count
                .sync count, linear
                count: %SystemInt32, 0
                __const_SystemUInt32_0: %SystemUInt32, 0xFFFFFFFC
                __extern_0: %SystemString, "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32"
                __return_address: %SystemUInt32, 0
            .data_end
            .code_start
                .export Double
                Double:
                    PUSH, __const_SystemUInt32_0
                # __Double_internal
                    PUSH, count
                    PUSH, count
                    PUSH, count
                    EXTERN, __extern_0
                    PUSH, __return_address
                    COPY
                    JUMP_INDIRECT, __return_address
            .code_end
        "#}
    );
}

#[test]
fn valid_program_passes_validation() {
    assert_eq!(sample().validate(), Ok(()));
}

#[test]
fn duplicate_data_names_rejected() {
    let mut program = sample();
    program
        .data
        .push(DataEntry::new("count", "SystemInt32", Literal::Int(1)));
    assert_eq!(
        program.validate(),
        Err(ProgramError::DuplicateName("count".into()))
    );
}

#[test]
fn unknown_variable_rejected() {
    let mut program = sample();
    program.code[1] = Instruction::with_variable(Opcode::Push, "missing");
    assert_eq!(
        program.validate(),
        Err(ProgramError::UnknownVariable {
            address: 8,
            name: "missing".into()
        })
    );
}

#[test]
fn jump_into_instruction_middle_rejected() {
    let mut program = sample();
    program.code.push(Instruction::with_address(Opcode::Jump, 4));
    assert_eq!(
        program.validate(),
        Err(ProgramError::BadJumpTarget {
            address: 60,
            target: 4
        })
    );
}

#[test]
fn jump_to_halt_is_valid() {
    let mut program = sample();
    program
        .code
        .push(Instruction::with_address(Opcode::Jump, HALT_ADDRESS));
    assert_eq!(program.validate(), Ok(()));
}

#[test]
fn dump_resolves_extern_identifiers() {
    let listing = dump(&sample(), Colors::new(false));
    insta::assert_snapshot!(listing, @r#"
    [data]
    H0 count %SystemInt32 = 0 export sync=linear
    H1 __const_SystemUInt32_0 %SystemUInt32 = 0xFFFFFFFC
    H2 __extern_0 %SystemString = "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32"
    H3 __return_address %SystemUInt32 = 0

    [code]
    export Double:
      00000000  PUSH          __const_SystemUInt32_0
    __Double_internal:
      00000008  PUSH          count
      00000010  PUSH          count
      00000018  PUSH          count
      00000020  EXTERN        __extern_0  ; "SystemInt32.__op_Addition__SystemInt32_SystemInt32__SystemInt32"
      00000028  PUSH          __return_address
      00000030  COPY
      00000034  JUMP_INDIRECT __return_address
    "#);
}
