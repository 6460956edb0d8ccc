use super::helpers::*;
use std::collections::HashSet;
use vexile_compiler::opcode::{decode, OpCode};

#[test]
fn e2e_if_branch_offset_matches_body_length() {
    for body_calls in 1..6 {
        let body: String = (0..body_calls).map(|i| format!("f({i}) ")).collect();
        let unit = compile_str(&format!("local c = true if c then {body}end"));
        let main = unit.main();
        let at = find_opcode(main, OpCode::Test).unwrap();
        let offset = main.code[at].offset();
        // each call is GETGLOBAL, LOADK, CALL
        assert_eq!(offset, body_calls * 3);
        assert_eq!(at as i32 + 1 + offset, main.code.len() as i32 - 1);
    }
}

#[test]
fn e2e_opcode_map_injective_across_seeds() {
    for seed in 0..64 {
        let unit = compile_seeded("print(1)", seed).unwrap();
        let codes: HashSet<u8> = unit.opcode_map.iter().map(|(_, c)| c).collect();
        assert_eq!(codes.len(), OpCode::COUNT);
    }
}

#[test]
fn e2e_regenerating_map_keeps_logical_code() {
    let src = "local t = {} for i = 1, 10 do t[i] = i * 2 end print(#t)";
    let a = compile_seeded(src, 1).unwrap();
    let b = compile_seeded(src, 2).unwrap();
    assert_ne!(a.opcode_map, b.opcode_map);
    assert_eq!(a.instructions(), b.instructions());
    assert_ne!(a.serialize(), b.serialize());
    let decoded = decode(&b.serialize()[0], &b.opcode_map).unwrap();
    assert_eq!(decoded, b.instructions());
}

#[test]
fn e2e_functions_and_methods() {
    let unit = compile_str(
        "local obj = {} function obj:greet(name) print(self, name) end obj:greet(\"bob\")",
    );
    assert_eq!(unit.protos.len(), 2);
    assert_eq!(unit.protos[1].name, "obj:greet");
    assert_eq!(unit.protos[1].num_params, 2);
    assert!(has_opcode(unit.main(), OpCode::SetTable));
    assert_eq!(count_opcode(unit.main(), OpCode::Call), 1);
}

#[test]
fn e2e_numeric_for_layout() {
    let unit = compile_str("for i = 1, 3 do f(i) end");
    let main = unit.main();
    let prep = find_opcode(main, OpCode::ForPrep).unwrap();
    let lp = find_opcode(main, OpCode::ForLoop).unwrap();
    assert_eq!(prep as i32 + 1 + main.code[prep].offset(), lp as i32);
    assert_eq!(lp as i32 + 1 + main.code[lp].offset(), prep as i32 + 1);
}

#[test]
fn e2e_break_exits_loop() {
    let unit = compile_str("while true do if x then break end f() end g()");
    let main = unit.main();
    let get_g = main
        .code
        .iter()
        .rposition(|i| i.op == OpCode::GetGlobal)
        .unwrap();
    let jumps: Vec<i32> = main
        .code
        .iter()
        .enumerate()
        .filter(|(_, i)| i.op == OpCode::Jmp)
        .map(|(at, i)| at as i32 + 1 + i.offset())
        .collect();
    // the break lands on g(), the back edge on the loop head
    assert!(jumps.contains(&(get_g as i32)));
    assert!(jumps.contains(&0));
}
