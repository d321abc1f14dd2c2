//! Human-readable program listing for debugging.
//!
//! Unlike [`Program::to_assembly`](super::Program::to_assembly), the dump shows
//! byte addresses, heap indices, and resolves `EXTERN` operands to the
//! identifier stored in their heap slot.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use cilow_core::Colors;

use super::data::Literal;
use super::instruction::Operand;
use super::opcode::Opcode;
use super::program::Program;

/// Generate a listing of the program.
pub fn dump(program: &Program, colors: Colors) -> String {
    let mut out = String::new();
    dump_data(&mut out, program, colors);
    dump_code(&mut out, program, colors);
    out
}

fn width_for_count(count: usize) -> usize {
    count.max(1).saturating_sub(1).to_string().len()
}

fn dump_data(out: &mut String, program: &Program, c: Colors) {
    let w = width_for_count(program.data.len());
    writeln!(out, "{}[data]{}", c.mnemonic, c.reset).unwrap();
    for (i, entry) in program.data.iter().enumerate() {
        let mut flags = String::new();
        if entry.export {
            flags.push_str(" export");
        }
        if let Some(sync) = entry.sync {
            write!(flags, " sync={sync}").unwrap();
        }
        writeln!(
            out,
            "{}H{i:0w$}{} {} %{} = {}{}{}{}{}{}",
            c.muted,
            c.reset,
            entry.name,
            entry.type_name,
            c.literal,
            entry.init,
            c.reset,
            c.muted,
            flags,
            c.reset
        )
        .unwrap();
    }
    out.push('\n');
}

fn dump_code(out: &mut String, program: &Program, c: Colors) {
    let mut labels: BTreeMap<u32, Vec<(&str, bool)>> = BTreeMap::new();
    for entry in &program.entries {
        labels
            .entry(entry.address)
            .or_default()
            .push((&entry.name, entry.exported));
    }

    writeln!(out, "{}[code]{}", c.mnemonic, c.reset).unwrap();
    for (instr, address) in program.code.iter().zip(program.addresses()) {
        if let Some(names) = labels.get(&address) {
            for (name, exported) in names {
                let marker = if *exported { "export " } else { "" };
                writeln!(out, "{}{marker}{name}:{}", c.label, c.reset).unwrap();
            }
        }
        write!(out, "  {}{address:08X}{}  ", c.muted, c.reset).unwrap();
        if instr.operand.is_some() {
            write!(out, "{}{:<13}{}", c.mnemonic, instr.opcode.mnemonic(), c.reset).unwrap();
        } else {
            write!(out, "{}{}{}", c.mnemonic, instr.opcode.mnemonic(), c.reset).unwrap();
        }
        match &instr.operand {
            Some(Operand::Address(target)) => {
                write!(out, " {}0x{target:08X}{}", c.literal, c.reset).unwrap()
            }
            Some(Operand::Variable(name)) => {
                write!(out, " {name}").unwrap();
                if instr.opcode == Opcode::Extern
                    && let Some(entry) = program.data_entry(name)
                    && let Literal::Str(id) = &entry.init
                {
                    write!(out, "  {}; {:?}{}", c.muted, id, c.reset).unwrap();
                }
            }
            None => {}
        }
        out.push('\n');
    }
}
