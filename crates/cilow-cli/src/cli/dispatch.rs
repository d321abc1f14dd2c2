//! Dispatch logic: extract params from ArgMatches and convert to command args.
//!
//! - `*Params` structs populated from clap, ignoring hidden flags
//! - `Into<*Args>` impls bridging dispatch to the command handlers

use std::path::PathBuf;

use clap::ArgMatches;

use super::ColorChoice;
use crate::commands::compile::CompileArgs;
use crate::commands::dump::DumpArgs;
use crate::commands::run::RunArgs;
use crate::commands::unit_loader::UnitSource;

pub struct CompileParams {
    pub unit_path: PathBuf,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub externs: Option<PathBuf>,
}

impl CompileParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            unit_path: unit_path(m),
            output: m.get_one::<PathBuf>("output").cloned(),
            config: m.get_one::<PathBuf>("config").cloned(),
            externs: m.get_one::<PathBuf>("externs").cloned(),
        }
    }
}

impl From<CompileParams> for CompileArgs {
    fn from(p: CompileParams) -> Self {
        Self {
            source: UnitSource {
                unit_path: p.unit_path,
                config: p.config,
                externs: p.externs,
            },
            output: p.output,
        }
    }
}

pub struct DumpParams {
    pub unit_path: PathBuf,
    pub config: Option<PathBuf>,
    pub externs: Option<PathBuf>,
    pub color: ColorChoice,
    // Note: output, entry, set and fuel are parsed but not extracted
}

impl DumpParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            unit_path: unit_path(m),
            config: m.get_one::<PathBuf>("config").cloned(),
            externs: m.get_one::<PathBuf>("externs").cloned(),
            color: parse_color(m),
        }
    }
}

impl From<DumpParams> for DumpArgs {
    fn from(p: DumpParams) -> Self {
        Self {
            source: UnitSource {
                unit_path: p.unit_path,
                config: p.config,
                externs: p.externs,
            },
            color: p.color.should_colorize(),
        }
    }
}

pub struct RunParams {
    pub unit_path: PathBuf,
    pub config: Option<PathBuf>,
    pub externs: Option<PathBuf>,
    pub entry: String,
    pub assignments: Vec<String>,
    pub fuel: u32,
}

impl RunParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            unit_path: unit_path(m),
            config: m.get_one::<PathBuf>("config").cloned(),
            externs: m.get_one::<PathBuf>("externs").cloned(),
            entry: m.get_one::<String>("entry").cloned().unwrap_or_default(),
            assignments: m
                .get_many::<String>("set")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            fuel: m.get_one::<u32>("fuel").copied().unwrap_or(1_000_000),
        }
    }
}

impl From<RunParams> for RunArgs {
    fn from(p: RunParams) -> Self {
        Self {
            source: UnitSource {
                unit_path: p.unit_path,
                config: p.config,
                externs: p.externs,
            },
            entry: p.entry,
            assignments: p.assignments,
            fuel: p.fuel,
        }
    }
}

/// `-v` count, readable from the top-level or any subcommand matches.
pub fn verbosity(m: &ArgMatches) -> u8 {
    m.get_count("verbose")
}

fn unit_path(m: &ArgMatches) -> PathBuf {
    m.get_one::<PathBuf>("unit_path").cloned().unwrap_or_default()
}

fn parse_color(m: &ArgMatches) -> ColorChoice {
    ColorChoice::from_flag(m.get_one::<String>("color").map(String::as_str))
}
