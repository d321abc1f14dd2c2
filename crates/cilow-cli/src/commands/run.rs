use cilow_asm::Program;
use cilow_compiler::variables::naming;
use cilow_vm::{ExternLibrary, FuelLimits, NumTy, VM, Value};
use tracing::debug;

use super::unit_loader::{UnitSource, load_and_compile};

const DEBUG_LOG: &str = "UnityEngineDebug.__Log__SystemObject__SystemVoid";

pub struct RunArgs {
    pub source: UnitSource,
    pub entry: String,
    /// `name=value` pairs assigned before running.
    pub assignments: Vec<String>,
    pub fuel: u32,
}

pub fn run(args: RunArgs) {
    let program = load_and_compile(&args.source);
    match execute(&program, &args) {
        Ok(Some(result)) => println!("{}", result),
        Ok(None) => {}
        Err(msg) => {
            eprintln!("error: {}", msg);
            std::process::exit(1);
        }
    }
}

/// Run the entry; returns its return slot, if it has one.
fn execute(program: &Program, args: &RunArgs) -> Result<Option<Value>, String> {
    let externs = ExternLibrary::new().with(DEBUG_LOG, true, |args| {
        println!("{}", args[0]);
        Ok(())
    });
    let mut vm = VM::builder(program)
        .externs(externs)
        .limits(FuelLimits::new().exec_fuel(args.fuel))
        .build()
        .map_err(|e| e.to_string())?;

    for assignment in &args.assignments {
        let (name, value) = parse_assignment(program, assignment)?;
        debug!(target: "cilow::cli", %name, %value, "set");
        vm.set(name, value).map_err(|e| e.to_string())?;
    }

    vm.run(&args.entry).map_err(|e| e.to_string())?;
    Ok(vm.get(&naming::return_slot(&args.entry)).cloned())
}

/// Split `name=value` and parse the value as the variable's declared type.
pub fn parse_assignment<'a>(program: &Program, text: &'a str) -> Result<(&'a str, Value), String> {
    let (name, raw) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", text))?;
    let entry = program
        .data_entry(name)
        .ok_or_else(|| format!("unknown variable '{}'", name))?;
    let value = parse_value(&entry.type_name, raw)
        .ok_or_else(|| format!("'{}' is not a valid {}", raw, entry.type_name))?;
    Ok((name, value))
}

pub fn parse_value(type_name: &str, raw: &str) -> Option<Value> {
    if type_name == "SystemString" {
        return Some(Value::str(raw));
    }
    let ty = NumTy::from_vm_name(type_name)?;
    match ty {
        NumTy::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
        NumTy::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Char(c)),
                _ => None,
            }
        }
        _ if ty.is_floating() => raw.parse::<f64>().ok().map(|v| ty.from_f64(v)),
        _ => raw.parse::<i128>().ok().map(|v| ty.wrap(v)),
    }
}
