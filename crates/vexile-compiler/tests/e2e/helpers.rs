use rand::rngs::StdRng;
use rand::SeedableRng;
use vexile_compiler::ast::Chunk;
use vexile_compiler::compiler::{compile, CompileOptions};
use vexile_compiler::opcode::OpCode;
use vexile_compiler::parser::parse_source;
use vexile_compiler::proto::{CompiledUnit, Proto};
use vexile_compiler::CompileError;

/// Parse a source string, panicking with the source on failure.
pub fn parse_str(source: &str) -> Chunk {
    parse_source(source).unwrap_or_else(|e| {
        panic!("parse failed: {e}\nsource:\n{source}");
    })
}

/// Compile a source string with a fixed seed.
pub fn compile_str(source: &str) -> CompiledUnit {
    compile_seeded(source, 0).unwrap_or_else(|e| {
        panic!("compile failed: {e}\nsource:\n{source}");
    })
}

pub fn compile_seeded(source: &str, seed: u64) -> Result<CompiledUnit, CompileError> {
    let chunk = parse_source(source)?;
    compile(&chunk, &CompileOptions::default(), &mut StdRng::seed_from_u64(seed))
}

/// Compile and expect an error; returns its message.
pub fn compile_str_err(source: &str) -> String {
    match compile_seeded(source, 0) {
        Err(e) => e.to_string(),
        Ok(_) => panic!("expected compile error, got success\nsource:\n{source}"),
    }
}

/// Check if a Proto contains a specific opcode.
pub fn has_opcode(proto: &Proto, op: OpCode) -> bool {
    proto.code.iter().any(|i| i.op == op)
}

/// Count occurrences of an opcode in a Proto.
pub fn count_opcode(proto: &Proto, op: OpCode) -> usize {
    proto.code.iter().filter(|i| i.op == op).count()
}

/// Find the first instruction with a given opcode.
#[allow(dead_code)]
pub fn find_opcode(proto: &Proto, op: OpCode) -> Option<usize> {
    proto.code.iter().position(|i| i.op == op)
}
