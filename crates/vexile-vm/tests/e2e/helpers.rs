use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::rc::Rc;
use vexile_compiler::compiler::{compile, CompileOptions};
use vexile_compiler::parse_source;
use vexile_compiler::proto::CompiledUnit;
use vexile_core::{Preset, Tuning};
use vexile_vm::{capture_print, install_base, Machine, SimError, Value};

/// Compile with the options a preset implies.
pub fn compile_preset(source: &str, preset: Preset, seed: u64) -> CompiledUnit {
    let settings = preset.settings();
    let options = CompileOptions::new(&settings, &Tuning::for_preset(preset));
    let chunk = parse_source(source).unwrap_or_else(|e| panic!("parse failed: {e}\nsource:\n{source}"));
    compile(&chunk, &options, &mut StdRng::seed_from_u64(seed))
        .unwrap_or_else(|e| panic!("compile failed: {e}\nsource:\n{source}"))
}

/// Output of one simulated run.
pub struct Run {
    pub results: Result<Vec<Value>, SimError>,
    pub printed: Vec<String>,
}

/// Run `unit` with the base library and a capturing `print`.
/// `setup` may replace globals before the run starts.
pub fn run_unit(unit: &CompiledUnit, setup: impl FnOnce(&mut Machine)) -> Run {
    let printed = Rc::new(RefCell::new(Vec::new()));
    let mut m = Machine::new(unit).expect("bytecode decodes").with_step_limit(1_000_000);
    install_base(&mut m);
    capture_print(&mut m, printed.clone());
    setup(&mut m);
    let results = m.run().map(|e| e.results);
    let printed = printed.borrow().clone();
    Run { results, printed }
}

/// Compile under the Test preset and return printed lines, panicking on a
/// runtime error.
pub fn printed(source: &str) -> Vec<String> {
    let run = run_unit(&compile_preset(source, Preset::Test, 0), |_| {});
    if let Err(e) = &run.results {
        panic!("runtime error: {e}\nsource:\n{source}");
    }
    run.printed
}
