use super::helpers::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use vexile_compiler::parse_source;
use vexile_core::{Preset, Tuning};
use vexile_transform::strcrypt::quote_bytes;
use vexile_transform::Weaver;
use vexile_vm::generate;

const SCRIPT: &str = r#"
local greeting = "hello"
local function shout(s) return s:upper() .. "!" end
for i = 1, 3 do print(shout(greeting), i) end
"#;

fn interpreter(preset: Preset, seed: u64) -> String {
    let unit = compile_preset(SCRIPT, preset, seed);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut w = Weaver::new(&mut rng, Tuning::for_preset(preset));
    generate(&unit, &preset.settings(), &mut w)
}

#[test]
fn test_every_preset_generates_parseable_lua() {
    for preset in [Preset::Fast, Preset::Medium, Preset::High, Preset::Test] {
        let text = interpreter(preset, 11);
        if let Err(e) = parse_source(&format!("local f = function(...)\n{text}\nend")) {
            panic!("{preset}: generated interpreter does not parse: {e}");
        }
    }
}

#[test]
fn test_bytecode_is_embedded_per_prototype() {
    let unit = compile_preset(SCRIPT, Preset::Fast, 3);
    assert_eq!(unit.protos.len(), 2);
    let mut rng = StdRng::seed_from_u64(3);
    let mut w = Weaver::new(&mut rng, Tuning::for_preset(Preset::Fast));
    let text = generate(&unit, &Preset::Fast.settings(), &mut w);
    for bytes in unit.serialize() {
        assert!(text.contains(&quote_bytes(&bytes)));
    }
}

#[test]
fn test_encrypted_pool_hides_literals() {
    let text = interpreter(Preset::High, 5);
    assert!(!text.contains("hello"));
    assert!(!text.contains("upper"));
}

#[test]
fn test_same_seed_same_interpreter() {
    assert_eq!(interpreter(Preset::Medium, 8), interpreter(Preset::Medium, 8));
    assert_ne!(interpreter(Preset::Medium, 8), interpreter(Preset::Medium, 9));
}
