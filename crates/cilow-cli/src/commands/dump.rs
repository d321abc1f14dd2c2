use cilow_asm::dump;
use cilow_core::Colors;

use super::unit_loader::{UnitSource, load_and_compile};

pub struct DumpArgs {
    pub source: UnitSource,
    pub color: bool,
}

pub fn run(args: DumpArgs) {
    let program = load_and_compile(&args.source);
    print!("{}", dump(&program, Colors::new(args.color)));
}
