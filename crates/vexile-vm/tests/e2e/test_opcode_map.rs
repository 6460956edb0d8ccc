use super::helpers::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use vexile_compiler::opcode::{decode, encode, OpCode, OpcodeMap, INSTRUCTION_SIZE};
use vexile_core::Preset;
use vexile_vm::Machine;

const PROGRAM: &str = r#"
local t = {}
for i = 1, 5 do t[i] = i * i end
local s = 0
for _, v in ipairs(t) do s = s + v end
print(s, #t, "done")
"#;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn opcode_map_is_injective(seed in any::<u64>()) {
        let map = OpcodeMap::generate(&mut StdRng::seed_from_u64(seed));
        prop_assert!(map.is_injective());
        let codes: HashSet<u8> = map.iter().map(|(_, code)| code).collect();
        prop_assert_eq!(codes.len(), OpCode::COUNT);
        prop_assert_eq!(map.unused_codes().len(), 256 - OpCode::COUNT);
        for (op, code) in map.iter() {
            prop_assert_eq!(map.decode(code), Some(op));
        }
    }

    #[test]
    fn serialized_program_runs_under_any_map(seed in any::<u64>()) {
        let unit = compile_preset(PROGRAM, Preset::Test, seed);
        for (proto, bytes) in unit.protos.iter().zip(unit.serialize()) {
            prop_assert_eq!(bytes.len(), proto.code.len() * INSTRUCTION_SIZE);
            prop_assert_eq!(decode(&bytes, &unit.opcode_map), Some(proto.code.clone()));
        }
        let run = run_unit(&unit, |_| {});
        prop_assert!(run.results.is_ok());
        prop_assert_eq!(run.printed, vec!["55\t5\tdone".to_string()]);
    }
}

#[test]
fn test_foreign_map_is_rejected_or_misread() {
    let unit = compile_preset(PROGRAM, Preset::Test, 1);
    let mut rng = StdRng::seed_from_u64(2);
    let other = OpcodeMap::generate(&mut rng);
    assert_ne!(other, unit.opcode_map);
    let bytes = encode(unit.instructions(), &unit.opcode_map);
    let misread = decode(&bytes, &other);
    assert_ne!(misread, Some(unit.instructions().to_vec()));
}

#[test]
fn test_corrupt_bytecode_fails_to_decode() {
    let unit = compile_preset(PROGRAM, Preset::Test, 4);
    let bytes = encode(unit.instructions(), &unit.opcode_map);
    assert_eq!(decode(&bytes[..bytes.len() - 1], &unit.opcode_map), None);

    let mut forged = bytes.clone();
    forged[0] = unit.opcode_map.unused_codes()[0];
    assert_eq!(decode(&forged, &unit.opcode_map), None);
    assert!(Machine::new(&unit).is_ok());
}
