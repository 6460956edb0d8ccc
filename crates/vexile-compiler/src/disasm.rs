/// Bytecode disassembler: one listing per prototype, then the constant pool.
use crate::opcode::{Instruction, OpCode};
use crate::proto::{CompiledUnit, Constant, Proto};
use std::fmt::Write;

/// Disassemble a complete unit into a human-readable string.
pub fn disassemble(unit: &CompiledUnit) -> String {
    let mut out = String::new();
    for (index, proto) in unit.protos.iter().enumerate() {
        disassemble_proto(&mut out, unit, index, proto);
    }
    if !unit.constants.is_empty() {
        let _ = writeln!(out, "constants ({}):", unit.constants.len());
        for (i, k) in unit.constants.iter().enumerate() {
            let _ = writeln!(out, "\t{}\t{}", i + 1, describe_constant(k));
        }
    }
    out
}

fn disassemble_proto(out: &mut String, unit: &CompiledUnit, index: usize, proto: &Proto) {
    let vararg = if proto.is_vararg { "+" } else { "" };
    let _ = writeln!(
        out,
        "function <{}> #{index} ({}{vararg} params, {} slots, {} instructions)",
        proto.name,
        proto.num_params,
        proto.max_stack,
        proto.code.len(),
    );
    for (pc, inst) in proto.code.iter().enumerate() {
        let code = unit.opcode_map.code(inst.op);
        let _ = write!(out, "\t{pc}\t[{code:02x}]\t{inst}");
        if let Some(note) = annotate(unit, pc, inst) {
            let _ = write!(out, "\t; {note}");
        }
        out.push('\n');
    }
}

/// Constant or jump-target hint for an instruction.
fn annotate(unit: &CompiledUnit, pc: usize, inst: &Instruction) -> Option<String> {
    match inst.op {
        OpCode::LoadK | OpCode::GetGlobal | OpCode::SetGlobal => unit
            .constants
            .get(u32::from(inst.b))
            .map(describe_constant),
        OpCode::Closure => unit
            .protos
            .get(usize::from(inst.b))
            .map(|p| format!("<{}>", p.name)),
        op if op.is_jump() => Some(format!("to {}", pc as i64 + 1 + i64::from(inst.offset()))),
        _ => None,
    }
}

fn describe_constant(k: &Constant) -> String {
    match k {
        Constant::Nil => "nil".into(),
        Constant::Number(n) => n.to_string(),
        Constant::String(s) => format!("{s:?}"),
        Constant::Encrypted { bytes, .. } => match k.string_bytes() {
            Some(plain) => format!("{:?} (encrypted, {} bytes)", String::from_utf8_lossy(&plain), bytes.len()),
            None => "<encrypted>".into(),
        },
    }
}
