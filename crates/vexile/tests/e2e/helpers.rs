use std::cell::RefCell;
use std::rc::Rc;
use vexile::{Artifact, Engine, Preset, Protector};
use vexile_vm::{capture_print, install_base, Machine, SimError, Value};

/// Protect under `preset` with a fixed seed.
pub fn build(source: &str, preset: Preset, seed: u64) -> Artifact {
    Protector::new(Engine::LuaU, preset, None)
        .unwrap()
        .seed(seed)
        .build(source)
        .unwrap_or_else(|e| panic!("protect failed: {e}\nsource:\n{source}"))
}

/// What the simulated host saw.
pub struct HostRun {
    pub outcome: Result<Vec<Value>, SimError>,
    pub registers: Vec<Value>,
    pub printed: Vec<String>,
}

/// Execute the artifact's bytecode against a host with the base library
/// and a recording `print`. `tamper` may replace globals first.
pub fn run_on_host(artifact: &Artifact, tamper: impl FnOnce(&mut Machine)) -> HostRun {
    let unit = artifact.unit.as_ref().expect("artifact was virtualized");
    let printed = Rc::new(RefCell::new(Vec::new()));
    let mut m = Machine::new(unit).expect("bytecode decodes").with_step_limit(2_000_000);
    install_base(&mut m);
    capture_print(&mut m, printed.clone());
    tamper(&mut m);
    let (outcome, registers) = match m.run() {
        Ok(exec) => (Ok(exec.results), exec.registers),
        Err(e) => (Err(e), Vec::new()),
    };
    let printed = printed.borrow().clone();
    HostRun {
        outcome,
        registers,
        printed,
    }
}

/// `bit32` for a Lua 5.4 host, built on the native operators.
const BIT32: &str = r#"
local M = 0xFFFFFFFF
bit32 = {
    band = function(a, b) return (a & b) & M end,
    bor = function(a, b) return (a | b) & M end,
    bxor = function(a, b) return (a ~ b) & M end,
    lshift = function(a, n) return (a << n) & M end,
    rshift = function(a, n) return (a & M) >> n end,
}
"#;

/// Instructions a real host may run before the artifact is declared hung.
const INSTRUCTION_BUDGET: u32 = 50_000_000;

/// Load and run `artifact.text` in a stock Lua 5.4 state. `print` is a native
/// function that records its line; `warn` is removed so the bridge reports
/// failures through `print`.
pub fn run_in_lua(artifact: &Artifact) -> Result<Vec<String>, mlua::Error> {
    let lua = mlua::Lua::new();
    let printed = Rc::new(RefCell::new(Vec::new()));
    let sink = printed.clone();
    let print = lua.create_function(move |lua, args: mlua::Variadic<mlua::Value>| {
        let tostring: mlua::Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for v in args.iter() {
            parts.push(tostring.call::<_, String>(v.clone())?);
        }
        sink.borrow_mut().push(parts.join("\t"));
        Ok(())
    })?;
    lua.globals().set("print", print)?;
    lua.globals().set("warn", mlua::Value::Nil)?;
    lua.load(BIT32).exec()?;
    lua.set_hook(
        mlua::HookTriggers::new().every_nth_instruction(INSTRUCTION_BUDGET),
        |_, _| Err(mlua::Error::RuntimeError("instruction budget exhausted".into())),
    );
    lua.load(artifact.text.as_str()).exec()?;
    let lines = printed.borrow().clone();
    Ok(lines)
}
