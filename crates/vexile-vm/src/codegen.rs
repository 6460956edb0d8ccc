//! Lua source generator for the embedded interpreter.
//!
//! The output is the body of a function whose first argument is the
//! environment table. It carries the serialized bytecode of every prototype
//! as `\ddd` strings, the constant pool (strings decrypted once at load
//! time), and a dispatch table keyed by this unit's opcode map. Handlers are
//! bound in random order; decoy handlers fill a few unused codes when dead
//! code is enabled.
//!
//! Frames are tables `{S = registers, i = byte offset of the next
//! instruction, t = top, V = varargs, r = results}`. Registers are keyed
//! by their 0-based index, exactly as the compiler numbers them.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt::Write;
use tracing::debug;
use vexile_compiler::opcode::{OpCode, INSTRUCTION_SIZE, JUMP_BIAS};
use vexile_compiler::proto::{CompiledUnit, Constant};
use vexile_core::{CipherLayers, ObfuscationSettings};
use vexile_transform::strcrypt::{decryptor_source, quote_bytes};
use vexile_transform::{lua_number, Weaver};

/// Range of decoy handlers bound when dead code is enabled.
const DECOYS: std::ops::RangeInclusive<usize> = 3..=6;

/// Top-level locals of the generated program, all freshly named.
struct Names {
    env: String,
    byte: String,
    pack: String,
    unpack: String,
    null: String,
    rd16: String,
    decrypt: String,
    consts: String,
    protos: String,
    handlers: String,
    run: String,
    make: String,
}

impl Names {
    fn new<R: Rng + ?Sized>(w: &mut Weaver<'_, R>) -> Self {
        Names {
            env: w.fresh_name(),
            byte: w.fresh_name(),
            pack: w.fresh_name(),
            unpack: w.fresh_name(),
            null: w.fresh_name(),
            rd16: w.fresh_name(),
            decrypt: w.fresh_name(),
            consts: w.fresh_name(),
            protos: w.fresh_name(),
            handlers: w.fresh_name(),
            run: w.fresh_name(),
            make: w.fresh_name(),
        }
    }
}

/// Generate the interpreter for `unit`.
pub fn generate<R: Rng + ?Sized>(
    unit: &CompiledUnit,
    settings: &ObfuscationSettings,
    w: &mut Weaver<'_, R>,
) -> String {
    let n = Names::new(w);
    let mut out = String::new();

    let _ = writeln!(out, "local {} = ...", n.env);
    let _ = writeln!(out, "local {} = string.byte", n.byte);
    let _ = writeln!(
        out,
        "local {} = function(...) return {{n = select(\"#\", ...), ...}} end",
        n.pack
    );
    let _ = writeln!(out, "local {} = unpack or table.unpack", n.unpack);
    let _ = writeln!(out, "local {} = {{}}", n.null);
    let _ = writeln!(
        out,
        "local function {}(s, i) local h, l = {}(s, i, i + 1) return h * 256 + l end",
        n.rd16, n.byte
    );

    let layers = cipher_layers(unit);
    if unit.constants.has_encrypted() {
        out.push_str(&decryptor_source(&n.decrypt, layers));
    }
    constants(&mut out, unit, &n);
    prototypes(&mut out, unit, &n);

    let _ = writeln!(out, "local {} = {{}}", n.handlers);
    let _ = writeln!(out, "local {}", n.run);
    let _ = writeln!(
        out,
        "local function {}(p) return function(...) local r = {}(p, {}(...)) return {}(r, 1, r.n) end end",
        n.make, n.run, n.pack, n.unpack
    );

    let mut handlers: Vec<(u8, String)> = unit
        .opcode_map
        .iter()
        .map(|(op, code)| (code, handler(op, &n, w)))
        .collect();
    let mut decoys = 0;
    if settings.dead_code {
        let unused = unit.opcode_map.unused_codes();
        let count = w.rng().gen_range(DECOYS);
        let picked: Vec<u8> = unused.choose_multiple(w.rng(), count).copied().collect();
        for code in picked {
            handlers.push((code, decoy(w)));
            decoys += 1;
        }
    }
    handlers.shuffle(w.rng());
    for (code, body) in &handlers {
        let key = w.num(i64::from(*code));
        let _ = writeln!(out, "{}[{key}] = function(f, a, b, c) {body} end", n.handlers);
    }

    dispatch_loop(&mut out, &n, w);
    let _ = writeln!(out, "local r = {}(1, {{n = 0}})", n.run);
    let _ = writeln!(out, "return {}(r, 1, r.n)", n.unpack);

    debug!(
        handlers = handlers.len(),
        decoys,
        bytes = out.len(),
        "generated interpreter"
    );
    out
}

/// Layers the decryptor must undo, read from the keys actually used.
fn cipher_layers(unit: &CompiledUnit) -> CipherLayers {
    let mut layers = CipherLayers::default();
    for k in unit.constants.iter() {
        if let Constant::Encrypted { key, .. } = k {
            layers.xor |= key.has_xor();
            layers.rotate |= key.has_rotation();
        }
    }
    layers
}

fn constants(out: &mut String, unit: &CompiledUnit, n: &Names) {
    let items: Vec<String> = unit
        .constants
        .iter()
        .map(|k| match k {
            Constant::Nil => n.null.clone(),
            Constant::Number(x) => lua_number(*x),
            Constant::String(s) => quote_bytes(s.as_bytes()),
            Constant::Encrypted { bytes, key } => format!(
                "{}({}, {}, {}, {})",
                n.decrypt,
                quote_bytes(bytes),
                key.add,
                key.xor,
                key.rot
            ),
        })
        .collect();
    let _ = writeln!(out, "local {} = {{{}}}", n.consts, items.join(", "));
}

fn prototypes(out: &mut String, unit: &CompiledUnit, n: &Names) {
    let items: Vec<String> = unit
        .protos
        .iter()
        .zip(unit.serialize())
        .map(|(proto, bytes)| {
            format!(
                "{{{}, {}, {}}}",
                quote_bytes(&bytes),
                proto.num_params,
                proto.is_vararg
            )
        })
        .collect();
    let _ = writeln!(out, "local {} = {{{}}}", n.protos, items.join(", "));
}

/// `f.i = f.i + (b - BIAS) * SIZE`, with both constants obfuscated.
fn jump<R: Rng + ?Sized>(w: &mut Weaver<'_, R>) -> String {
    let bias = w.num(i64::from(JUMP_BIAS));
    let size = w.num(INSTRUCTION_SIZE as i64);
    format!("f.i = f.i + (b - {bias}) * {size}")
}

fn handler<R: Rng + ?Sized>(op: OpCode, n: &Names, w: &mut Weaver<'_, R>) -> String {
    let binary = |sym: &str| format!("local S = f.S S[a] = S[b] {sym} S[c]");
    match op {
        OpCode::Move => "f.S[a] = f.S[b]".into(),
        OpCode::LoadK => format!(
            "local v = {}[b] if v == {} then v = nil end f.S[a] = v",
            n.consts, n.null
        ),
        OpCode::LoadBool => "f.S[a] = b ~= 0".into(),
        OpCode::LoadNil => "local S = f.S for k = a, a + b do S[k] = nil end".into(),
        OpCode::GetGlobal => format!("f.S[a] = {}[{}[b]]", n.env, n.consts),
        OpCode::SetGlobal => format!("{}[{}[b]] = f.S[a]", n.env, n.consts),
        OpCode::GetTable => "local S = f.S S[a] = S[b][S[c]]".into(),
        OpCode::SetTable => "local S = f.S S[a][S[b]] = S[c]".into(),
        OpCode::NewTable => "f.S[a] = {}".into(),
        OpCode::SetList => "local S = f.S local n = b if n == 0 then n = f.t - a - 1 end \
             local t = S[a] for k = 1, n do t[c + k - 1] = S[a + k] end"
            .into(),
        OpCode::Call => format!(
            "local S = f.S local n = b - 1 if b == 0 then n = f.t - a - 1 end \
             local args = {{}} for k = 1, n do args[k] = S[a + k] end \
             local r = {pack}(S[a]({unpack}(args, 1, n))) \
             if c == 0 then for k = 1, r.n do S[a + k - 1] = r[k] end f.t = a + r.n \
             else for k = 1, c - 1 do S[a + k - 1] = r[k] end end",
            pack = n.pack,
            unpack = n.unpack
        ),
        OpCode::Return => "local S = f.S local n = b - 1 if b == 0 then n = f.t - a end \
             local r = {n = n} for k = 1, n do r[k] = S[a + k - 1] end f.r = r"
            .into(),
        OpCode::Closure => format!("f.S[a] = {}(b + 1)", n.make),
        OpCode::VarArg => "local S, V = f.S, f.V local n = b - 1 \
             if b == 0 then n = V.n f.t = a + n end \
             for k = 1, n do S[a + k - 1] = V[k] end"
            .into(),
        OpCode::Add => binary("+"),
        OpCode::Sub => binary("-"),
        OpCode::Mul => binary("*"),
        OpCode::Div => binary("/"),
        OpCode::Mod => binary("%"),
        OpCode::Pow => binary("^"),
        OpCode::Concat => binary(".."),
        OpCode::Unm => "f.S[a] = -f.S[b]".into(),
        OpCode::Not => "f.S[a] = not f.S[b]".into(),
        OpCode::Len => "f.S[a] = #f.S[b]".into(),
        OpCode::Eq => binary("=="),
        OpCode::Lt => binary("<"),
        OpCode::Le => binary("<="),
        OpCode::Jmp => jump(w),
        OpCode::Test => format!("if (not f.S[a]) == (c == 0) then {} end", jump(w)),
        OpCode::ForPrep => format!("local S = f.S S[a] = S[a] - S[a + 2] {}", jump(w)),
        OpCode::ForLoop => format!(
            "local S = f.S local step = S[a + 2] local i = S[a] + step S[a] = i \
             if (step > 0 and i <= S[a + 1]) or (step <= 0 and i >= S[a + 1]) then \
             S[a + 3] = i {} end",
            jump(w)
        ),
        OpCode::TForLoop => format!(
            "local S = f.S local r = {pack}(S[a](S[a + 1], S[a + 2])) \
             for k = 1, c do S[a + 2 + k] = r[k] end \
             if S[a + 3] ~= nil then S[a + 2] = S[a + 3] {jump} end",
            pack = n.pack,
            jump = jump(w)
        ),
    }
}

/// Plausible-looking handler bound to a code no instruction uses.
fn decoy<R: Rng + ?Sized>(w: &mut Weaver<'_, R>) -> String {
    let k = w.rng().gen_range(1..64);
    let k = w.num(k);
    let bodies = [
        format!("local S = f.S S[a] = S[b] - S[c] * {k}"),
        format!("f.t = a + b - {k}"),
        format!("local S = f.S S[c] = S[a] S[b] = nil {}", jump(w)),
        format!("f.S[a] = {k} f.i = f.i + c"),
    ];
    let pick = w.rng().gen_range(0..bodies.len());
    bodies[pick].clone()
}

fn dispatch_loop<R: Rng + ?Sized>(out: &mut String, n: &Names, w: &mut Weaver<'_, R>) {
    let size = w.num(INSTRUCTION_SIZE as i64);
    let _ = write!(
        out,
        "{run} = function(p, args)\n\
         local proto = {protos}[p]\n\
         local code, np = proto[1], proto[2]\n\
         local f = {{S = {{}}, i = 1, t = 0, V = {{n = 0}}}}\n\
         local S = f.S\n\
         for k = 1, np do S[k - 1] = args[k] end\n\
         if proto[3] then\n\
         local n = args.n - np if n < 0 then n = 0 end\n\
         local V = {{n = n}} for k = 1, n do V[k] = args[np + k] end f.V = V\n\
         end\n\
         local len = #code\n\
         while f.i <= len do\n\
         local i = f.i\n\
         f.i = i + {size}\n\
         {handlers}[{byte}(code, i)](f, {rd}(code, i + 1), {rd}(code, i + 3), {rd}(code, i + 5))\n\
         if f.r then return f.r end\n\
         end\n\
         return {{n = 0}}\n\
         end\n",
        run = n.run,
        protos = n.protos,
        handlers = n.handlers,
        byte = n.byte,
        rd = n.rd16,
    );
}
