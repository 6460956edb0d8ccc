use super::helpers::*;
use vexile::{lua_watermark, CompileError, Preset};
use vexile_vm::{SimError, Value};

#[test]
fn scenario_a_print_called_once() {
    let artifact = build("print(\"hi\")", Preset::Fast, 7);
    assert!(!artifact.unit.as_ref().unwrap().constants.has_encrypted());
    let run = run_on_host(&artifact, |_| {});
    assert!(run.outcome.is_ok(), "{:?}", run.outcome);
    assert_eq!(run.printed, vec!["hi"]);
}

#[test]
fn scenario_b_local_binding_holds_three() {
    for preset in [Preset::Fast, Preset::Medium, Preset::High, Preset::Test] {
        let artifact = build("local x = 1 + 2", preset, 3);
        let run = run_on_host(&artifact, |_| {});
        assert!(run.outcome.is_ok(), "{preset}: {:?}", run.outcome);
        assert_eq!(run.registers[0], Value::Number(3.0), "{preset}");
    }
}

#[test]
fn scenario_d_test_preset_is_inert() {
    let artifact = build("print(1)", Preset::Test, 1);
    assert!(!artifact.full_source.contains("while true do end"));
    assert!(!artifact.full_source.contains("do\n"));
    assert!(artifact.full_source.contains("= function() end"));
}

#[test]
fn scenario_d_high_outweighs_fast() {
    let src = "local t = {} for i = 1, 3 do t[i] = i end print(#t)";
    let fast = build(src, Preset::Fast, 5);
    let high = build(src, Preset::High, 5);
    assert!(high.text.len() > fast.text.len());
    assert!(
        high.unit.unwrap().instruction_count() > fast.unit.unwrap().instruction_count()
    );
}

#[test]
fn scenario_e_missing_end_reports_eof_line() {
    let err = vexile::compile_and_protect("local a = 1\nif x then", Default::default(), Preset::Fast, None)
        .unwrap_err();
    match err {
        CompileError::Syntax(e) => {
            assert_eq!(e.line, 2);
            assert!(e.message.contains("'<eof>'"), "{}", e.message);
        }
        other => panic!("expected a syntax error, got {other}"),
    }
}

#[test]
fn test_hooked_host_spins_instead_of_erroring() {
    let artifact = build("print(\"payload\")", Preset::High, 8);
    let run = run_on_host(&artifact, |m| {
        m.set_global("getmetatable", vexile_vm::Value::native(|_, _| Ok(vec![Value::Nil])));
    });
    assert!(matches!(run.outcome, Err(SimError::StepLimit(_))));
    assert!(run.printed.is_empty());
}

#[test]
fn test_behavior_identical_across_presets() {
    let src = r#"
local words = {"alpha", "beta", "gamma"}
local out = {}
for i, w in ipairs(words) do
    out[#out + 1] = w:upper() .. i
end
function greet(name) return "hello " .. name end
print(table.concat(out, ","), greet("vexile"))
"#;
    for preset in [Preset::Fast, Preset::Medium, Preset::High, Preset::Test] {
        let artifact = build(src, preset, 21);
        assert!(artifact.text.starts_with(&lua_watermark()));
        let run = run_on_host(&artifact, |_| {});
        assert!(run.outcome.is_ok(), "{preset}: {:?}", run.outcome);
        assert_eq!(run.printed, vec!["ALPHA1,BETA2,GAMMA3\thello vexile"], "{preset}");
    }
}
