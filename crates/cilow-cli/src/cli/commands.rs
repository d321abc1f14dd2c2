//! Command builders for the CLI.
//!
//! `compile`, `dump` and `run` accept the same compiler flags; runtime flags
//! are accepted everywhere but hidden from `--help` where they do nothing.

use clap::Command;

use super::args::*;

/// Add hidden runtime args (for commands that don't execute).
fn with_hidden_run_args(cmd: Command) -> Command {
    cmd.arg(entry_arg().hide(true))
        .arg(set_arg().hide(true))
        .arg(fuel_arg().hide(true))
}

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("cilow")
        .about("Lower CIL method bodies to heap-and-stack VM assembly")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(verbose_arg())
        .subcommand(compile_command())
        .subcommand(dump_command())
        .subcommand(run_command())
}

/// Compile a unit to assembly text.
pub fn compile_command() -> Command {
    let cmd = Command::new("compile")
        .about("Compile a unit to assembly")
        .override_usage(
            "\
  cilow compile <UNIT>
  cilow compile <UNIT> -o <FILE>
  cilow compile <UNIT> --config <FILE> --externs <FILE>",
        )
        .after_help(
            r#"EXAMPLES:
  cilow compile unit.json                     # assembly to stdout
  cilow compile unit.json -o unit.uasm        # assembly to a file
  cilow compile unit.json --externs std.json  # reject externs not listed"#,
        )
        .arg(unit_path_arg())
        .arg(output_arg())
        .arg(config_arg())
        .arg(externs_arg())
        .arg(color_arg().hide(true));

    with_hidden_run_args(cmd)
}

/// Show the compiled program with addresses.
pub fn dump_command() -> Command {
    let cmd = Command::new("dump")
        .about("Show the compiled program with addresses")
        .override_usage(
            "\
  cilow dump <UNIT>
  cilow dump <UNIT> --color always",
        )
        .arg(unit_path_arg())
        .arg(config_arg())
        .arg(externs_arg())
        .arg(color_arg())
        .arg(output_arg().hide(true));

    with_hidden_run_args(cmd)
}

/// Compile a unit and run one method on the reference VM.
pub fn run_command() -> Command {
    Command::new("run")
        .about("Compile a unit and run a method on the reference VM")
        .override_usage(
            "\
  cilow run <UNIT> --entry <NAME>
  cilow run <UNIT> --entry <NAME> --set <NAME=VALUE>...",
        )
        .after_help(
            r#"EXAMPLES:
  cilow run unit.json --entry Start
  cilow run unit.json --entry Add --set __Add_arg0=2 --set __Add_arg1=40"#,
        )
        .arg(unit_path_arg())
        .arg(config_arg())
        .arg(externs_arg())
        .arg(entry_arg().required(true))
        .arg(set_arg())
        .arg(fuel_arg())
        .arg(output_arg().hide(true))
        .arg(color_arg().hide(true))
}
