use std::fs;
use std::path::PathBuf;

use tracing::info;

use super::unit_loader::{UnitSource, load_and_compile};

pub struct CompileArgs {
    pub source: UnitSource,
    pub output: Option<PathBuf>,
}

pub fn run(args: CompileArgs) {
    let program = load_and_compile(&args.source);
    let text = program.to_assembly();

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &text) {
                eprintln!("error: failed to write '{}': {}", path.display(), e);
                std::process::exit(1);
            }
            info!(target: "cilow::cli", path = %path.display(), bytes = text.len(), "wrote assembly");
        }
        None => print!("{}", text),
    }
}
