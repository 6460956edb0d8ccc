//! Artifacts executed by a stock Lua 5.4 interpreter.

use super::helpers::*;
use vexile::bridge::FATAL_PREFIX;
use vexile::{compile_and_protect, Artifact, Engine, ObfuscationSettings, Preset};

const PRESETS: [Preset; 4] = [Preset::Fast, Preset::Medium, Preset::High, Preset::Test];

fn lines(artifact: &Artifact, what: &str) -> Vec<String> {
    run_in_lua(artifact).unwrap_or_else(|e| panic!("{what}: artifact failed to run: {e}"))
}

#[test]
fn test_every_preset_loads_and_runs() {
    let src = "print(\"hi\")\nlocal x = 1 + 2\nprint(x)";
    for preset in PRESETS {
        for seed in 0..4 {
            let artifact = build(src, preset, seed);
            assert_eq!(lines(&artifact, &format!("{preset} seed {seed}")), vec!["hi", "3"]);
        }
    }
}

#[test]
fn test_high_artifact_with_parser_bomb_loads() {
    for seed in 0..8 {
        let artifact = build("print(\"armed\")", Preset::High, seed);
        assert!(artifact.text.contains("{{{{") || artifact.text.contains("(((("));
        assert_eq!(lines(&artifact, &format!("seed {seed}")), vec!["armed"]);
    }
}

#[test]
fn test_interpreter_matches_native_lua() {
    let src = r##"
local words = {"alpha", "beta", "gamma"}
local out = {}
for i, w in ipairs(words) do
    out[#out + 1] = w:upper() .. i
end
function greet(name) return "hello " .. name end
local function count(...) return select("#", ...) end
local acc = 0
for i = 10, 1, -3 do acc = acc + i end
local k = 0
repeat k = k + 1 until k >= 3 or k < 0
print(table.concat(out, ","), greet("vexile"), count(1, nil, 3), acc, k)
"##;
    let expected = vec!["ALPHA1,BETA2,GAMMA3\thello vexile\t3\t22\t3"];
    for preset in PRESETS {
        let artifact = build(src, preset, 33);
        assert_eq!(lines(&artifact, &preset.to_string()), expected, "{preset}");
    }
}

#[test]
fn test_runtime_errors_surface_as_one_fatal_line() {
    for preset in [Preset::Fast, Preset::High] {
        let artifact = build("print(\"before\")\nmissing()\nprint(\"after\")", preset, 9);
        let out = lines(&artifact, &preset.to_string());
        assert_eq!(out.len(), 2, "{out:?}");
        assert_eq!(out[0], "before");
        assert!(out[1].starts_with(FATAL_PREFIX), "{}", out[1]);
    }
}

#[test]
fn test_raw_path_runs_with_encrypted_literals() {
    let custom = ObfuscationSettings {
        string_encryption: true,
        anti_tamper: true,
        dead_code: true,
        minifier: true,
        ..Default::default()
    };
    let text = compile_and_protect(
        "local greeting = \"top secret\"\nprint(greeting, #greeting)",
        Engine::LuaU,
        Preset::Custom,
        Some(custom),
    )
    .unwrap();
    assert!(!text.contains("top secret"));
    let artifact = Artifact {
        text,
        unit: None,
        full_source: String::new(),
    };
    assert_eq!(lines(&artifact, "raw path"), vec!["top secret\t10"]);
}

#[test]
fn test_nil_literals_survive_the_constants_array() {
    let src = "local a, b = nil, 2\nlocal t = {nil, b}\nprint(a, a == nil, b, t[2], select(\"#\", nil, nil))";
    for preset in [Preset::Fast, Preset::High] {
        let artifact = build(src, preset, 14);
        assert_eq!(lines(&artifact, &preset.to_string()), vec!["nil\ttrue\t2\t2\t2"]);
    }
}
