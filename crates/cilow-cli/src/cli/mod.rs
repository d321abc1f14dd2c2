mod args;
mod commands;
mod dispatch;


use std::io::IsTerminal;

pub use commands::build_cli;
pub use dispatch::{CompileParams, DumpParams, RunParams, verbosity};

/// `--color` setting; `Auto` colors listings only when stdout is a terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Parse a `--color` value; anything unrecognized means `Auto`.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            Some("always") => Self::Always,
            Some("never") => Self::Never,
            _ => Self::Auto,
        }
    }

    pub fn should_colorize(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::stdout().is_terminal(),
        }
    }
}
