//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` so the same definition can be
//! composed into several commands, hidden where it does not apply.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Unit description file (positional).
pub fn unit_path_arg() -> Arg {
    Arg::new("unit_path")
        .value_name("UNIT")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Unit description (JSON, use \"-\" for stdin)")
}

/// Compiler options file (--config).
pub fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Compiler options (JSON)")
}

/// Extern allow-list (--externs).
pub fn externs_arg() -> Arg {
    Arg::new("externs")
        .long("externs")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Externs available on the target (JSON list of signatures)")
}

/// Output file (-o/--output).
pub fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Write assembly to FILE instead of stdout")
}

/// Color output control (--color).
pub fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("WHEN")
        .default_value("auto")
        .value_parser(["auto", "always", "never"])
        .help("Colorize output")
}

/// Entry point name (--entry).
pub fn entry_arg() -> Arg {
    Arg::new("entry")
        .long("entry")
        .value_name("NAME")
        .help("Method to run")
}

/// Heap assignments before running (--set name=value).
pub fn set_arg() -> Arg {
    Arg::new("set")
        .long("set")
        .value_name("NAME=VALUE")
        .action(ArgAction::Append)
        .help("Assign a variable before running (repeatable)")
}

/// Execution fuel limit (--fuel).
pub fn fuel_arg() -> Arg {
    Arg::new("fuel")
        .long("fuel")
        .value_name("N")
        .default_value("1000000")
        .value_parser(value_parser!(u32))
        .help("Execution fuel limit")
}

/// Verbosity level (-v, -vv).
pub fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .global(true)
        .help("Log level (-v for debug, -vv for trace)")
}
