#![no_main]

use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;
use vexile_compiler::compiler::{compile, CompileOptions};
use vexile_compiler::opcode::decode;
use vexile_compiler::parse_source;

fuzz_target!(|data: &[u8]| {
    // Errors are fine, panics are bugs. Whatever compiles must decode back.
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(chunk) = parse_source(source) else {
        return;
    };
    let Ok(unit) = compile(&chunk, &CompileOptions::default(), &mut StdRng::seed_from_u64(0)) else {
        return;
    };
    for (proto, bytes) in unit.protos.iter().zip(unit.serialize()) {
        assert_eq!(decode(&bytes, &unit.opcode_map).as_deref(), Some(&proto.code[..]));
    }
});
