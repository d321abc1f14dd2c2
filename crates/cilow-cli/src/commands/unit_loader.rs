//! Reading a unit description and the optional config and extern files.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use cilow_asm::Program;
use cilow_compiler::{
    CompileConfig, ExternRegistry, ExternTable, SignatureNaming, TokenTable, UnitCompiler, UnitDef,
};
use serde::Deserialize;

/// A unit as the CLI reads it: the unit itself plus the tokens its IL uses.
#[derive(Debug, Deserialize)]
pub struct UnitFile {
    pub unit: UnitDef,
    #[serde(default)]
    pub tokens: TokenTable,
}

/// Where to find the unit and its compiler inputs.
pub struct UnitSource {
    pub unit_path: PathBuf,
    pub config: Option<PathBuf>,
    pub externs: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io { path: String, source: io::Error },

    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Compile(#[from] cilow_compiler::Error),
}

pub struct Loaded {
    pub file: UnitFile,
    pub config: CompileConfig,
    pub externs: Option<ExternRegistry>,
}

impl UnitSource {
    pub fn load(&self) -> Result<Loaded, LoadError> {
        let text = read_text(&self.unit_path)?;
        let file: UnitFile = serde_json::from_str(&text).map_err(|source| LoadError::Json {
            path: display(&self.unit_path),
            source,
        })?;

        let config = match &self.config {
            Some(path) => CompileConfig::from_json(&read_text(path)?).map_err(|source| {
                LoadError::Json {
                    path: display(path),
                    source,
                }
            })?,
            None => CompileConfig::default(),
        };

        let externs = match &self.externs {
            Some(path) => Some(ExternRegistry::from_json(&read_text(path)?).map_err(
                |source| LoadError::Json {
                    path: display(path),
                    source,
                },
            )?),
            None => None,
        };

        Ok(Loaded {
            file,
            config,
            externs,
        })
    }
}

impl Loaded {
    pub fn compile(&self) -> Result<Program, LoadError> {
        let externs: &dyn ExternTable = match &self.externs {
            Some(registry) => registry as &dyn ExternTable,
            None => &SignatureNaming,
        };
        let program = UnitCompiler::new(&self.file.unit, &self.file.tokens, externs)
            .config(self.config.clone())
            .compile()?;
        Ok(program)
    }
}

/// Load and compile in one step, exiting with a message on failure.
pub fn load_and_compile(source: &UnitSource) -> Program {
    let result = source.load().and_then(|loaded| loaded.compile());
    match result {
        Ok(program) => program,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| LoadError::Io {
                path: "<stdin>".into(),
                source,
            })?;
        return Ok(buf);
    }
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display(path),
        source,
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
