mod cli;
mod commands;

use cli::{CompileParams, DumpParams, RunParams, build_cli, verbosity};
use tracing::Level;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("compile", m)) => {
            init_logging(verbosity(m));
            let params = CompileParams::from_matches(m);
            commands::compile::run(params.into());
        }
        Some(("dump", m)) => {
            init_logging(verbosity(m));
            let params = DumpParams::from_matches(m);
            commands::dump::run(params.into());
        }
        Some(("run", m)) => {
            init_logging(verbosity(m));
            let params = RunParams::from_matches(m);
            commands::run::run(params.into());
        }
        _ => unreachable!("clap should have caught this"),
    }
}
