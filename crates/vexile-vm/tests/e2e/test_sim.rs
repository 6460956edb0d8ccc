use super::helpers::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use vexile_core::{Preset, Tuning};
use vexile_transform::{antitamper, deadcode, Weaver};
use vexile_vm::{SimError, Value};

#[test]
fn test_hello() {
    assert_eq!(printed("print(\"Hello, World!\")"), vec!["Hello, World!"]);
}

#[test]
fn test_nil_literal_constant() {
    assert_eq!(
        printed("local a, b = nil, 2 print(a, a == nil, b)"),
        vec!["nil\ttrue\t2"]
    );
}

#[test]
fn test_loops_and_branches() {
    let lines = printed(
        r#"
local total = 0
for i = 1, 10 do
    if i % 2 == 0 then
        total = total + i
    elseif i == 5 then
        total = total + 100
    end
end
local n = 0
repeat n = n + 1 until n >= 3
while true do
    n = n + 1
    if n > 6 then break end
end
print(total, n)
"#,
    );
    assert_eq!(lines, vec!["130\t7"]);
}

#[test]
fn test_global_recursion() {
    let lines = printed(
        "function fact(n) if n <= 1 then return 1 end return n * fact(n - 1) end print(fact(10))",
    );
    assert_eq!(lines, vec!["3628800"]);
}

#[test]
fn test_tables_and_methods() {
    let lines = printed(
        r#"
local account = {balance = 10}
account.deposit = function(self, v) self.balance = self.balance + v return self end
account:deposit(5):deposit(7)
local list = {"a", "b", "c",}
list[#list + 1] = "d"
print(account.balance, #list, table.concat(list, "-"))
"#,
    );
    assert_eq!(lines, vec!["22\t4\ta-b-c-d"]);
}

#[test]
fn test_pairs_and_ipairs() {
    let lines = printed(
        r#"
local sum = 0
for i, v in ipairs({10, 20, 30}) do sum = sum + i * v end
local keys = 0
for k, v in pairs({x = 1, y = 2, 3}) do keys = keys + 1 end
print(sum, keys)
"#,
    );
    assert_eq!(lines, vec!["140\t3"]);
}

#[test]
fn test_varargs_and_multiple_results() {
    let lines = printed(
        r##"
local function pack2(...) return {...}, select("#", ...) end
local t, n = pack2(1, nil, 3)
local function two() return 1, 2 end
local a, b, c = two()
print(n, t[3], a, b, c)
print(two(), two())
"##,
    );
    assert_eq!(lines, vec!["3\t3\t1\t2\tnil", "1\t1\t2"]);
}

#[test]
fn test_logical_operators_short_circuit() {
    let lines = printed(
        r#"
local calls = 0
function bump() calls = calls + 1 return true end
local x = false and bump()
local y = true or bump()
local z = nil or "fallback"
print(x, y, z, calls, not nil)
"#,
    );
    assert_eq!(lines, vec!["false\ttrue\tfallback\t0\ttrue"]);
}

#[test]
fn test_encrypted_constants_decode_to_plaintext() {
    let unit = compile_preset("print(\"secret text\", \"secret text\" .. \"!\")", Preset::High, 9);
    assert!(unit.constants.has_encrypted());
    let run = run_unit(&unit, |_| {});
    assert!(run.results.is_ok());
    assert_eq!(run.printed, vec!["secret text\tsecret text!"]);
}

#[test]
fn test_runtime_error_surfaces() {
    let unit = compile_preset("local t = nil print(t.x)", Preset::Test, 0);
    let run = run_unit(&unit, |_| {});
    assert_eq!(
        run.results.unwrap_err(),
        SimError::runtime("attempt to index a nil value")
    );
}

/// Anti-tamper and dead code prepended to `user`, compiled as one chunk.
fn protected(user: &str, preset: Preset, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut w = Weaver::new(&mut rng, Tuning::for_preset(preset));
    w.reserve_identifiers(&vexile_compiler::parse_source(user).unwrap());
    let at = antitamper::weave(&mut w, false);
    let junk = deadcode::generate(&mut w);
    format!("{}{}{}", at.source, junk, user)
}

#[test]
fn test_probes_pass_on_an_honest_host() {
    for seed in 0..4 {
        let src = protected("print(\"ok\")", Preset::High, seed);
        let run = run_unit(&compile_preset(&src, Preset::High, seed), |_| {});
        assert!(run.results.is_ok(), "seed {seed}: {:?}", run.results.err());
        assert_eq!(run.printed, vec!["ok"]);
    }
}

#[test]
fn test_hooked_getmetatable_trips_the_spin_routine() {
    let src = protected("print(\"ok\")", Preset::High, 2);
    let run = run_unit(&compile_preset(&src, Preset::High, 2), |m| {
        m.set_global("getmetatable", Value::native(|_, _| Ok(vec![Value::Nil])));
    });
    assert!(matches!(run.results, Err(SimError::StepLimit(_))));
    assert!(run.printed.is_empty());
}

#[test]
fn test_noop_crash_routine_under_test_preset() {
    let src = protected("print(\"ok\")", Preset::Test, 3);
    let run = run_unit(&compile_preset(&src, Preset::Test, 3), |m| {
        m.set_global("getmetatable", Value::native(|_, _| Ok(vec![Value::Nil])));
    });
    assert!(run.results.is_ok());
    assert_eq!(run.printed, vec!["ok"]);
}
