//! String encryptor: the Lua decrypt routine, literal rewriting for the
//! non-virtualized path, and `string.char` hiding for probe names.

use crate::numbers::obf_num;
use rand::Rng;
use std::fmt::Write;
use vexile_compiler::lexer::{long_bracket_end, long_bracket_level, quoted_end};
use vexile_core::cipher::{self, CipherKey};
use vexile_core::CipherLayers;

/// A Lua string literal spelling every byte as a three-digit decimal escape.
pub fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 2);
    out.push('"');
    for b in bytes {
        let _ = write!(out, "\\{b:03}");
    }
    out.push('"');
    out
}

/// `local function <name>(s, k, x, r) ... end`, the inverse of
/// [`cipher::encrypt`]. The `bit32` layers are emitted only when enabled.
pub fn decryptor_source(name: &str, layers: CipherLayers) -> String {
    let mut body = String::from("local v = (string.byte(s, i) - k - i) % 256 ");
    if layers.rotate {
        body.push_str("v = bit32.band(bit32.bor(bit32.rshift(v, r), bit32.lshift(v, 8 - r)), 255) ");
    }
    if layers.xor {
        body.push_str("v = bit32.bxor(v, x) ");
    }
    format!(
        "local function {name}(s, k, x, r)\n\
         \tlocal o = {{}}\n\
         \tfor i = 1, #s do {body}o[i] = string.char(v) end\n\
         \treturn table.concat(o)\n\
         end\n"
    )
}

/// A call to the decryptor that yields `plain` at run time.
pub fn encrypted_call(call: &str, plain: &[u8], key: CipherKey) -> String {
    let bytes = cipher::encrypt(plain, key);
    format!(
        "{call}({}, {}, {}, {})",
        quote_bytes(&bytes),
        key.add,
        key.xor,
        key.rot
    )
}

/// Replace quoted literals in comment-free source with parenthesized
/// decryptor calls, one fresh key per literal. Literals containing a
/// backslash or a newline, and long-bracket strings, are left as written.
/// Returns the rewritten text and the number of literals replaced.
pub fn encrypt_literals<R: Rng + ?Sized>(
    source: &str,
    call: &str,
    layers: CipherLayers,
    rng: &mut R,
) -> (String, usize) {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(bytes.len() * 2);
    let mut replaced = 0;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let end = quoted_end(bytes, i);
                let closed = end - i >= 2 && bytes[end - 1] == quote;
                let content = &bytes[i + 1..end.saturating_sub(1).max(i + 1)];
                if closed && !content.iter().any(|&b| b == b'\\' || b == b'\n') {
                    out.push_str(&source[copied..i]);
                    let key = CipherKey::generate(layers, rng);
                    let _ = write!(out, "({})", encrypted_call(call, content, key));
                    copied = end;
                    replaced += 1;
                }
                i = end;
            }
            b'[' => {
                i = match long_bracket_level(bytes, i) {
                    Some(level) => long_bracket_end(bytes, i, level),
                    None => i + 1,
                };
            }
            _ => i += 1,
        }
    }
    out.push_str(&source[copied..]);
    tracing::debug!(replaced, "encrypted string literals");
    (out, replaced)
}

/// `string.char(...)` over obfuscated byte values, so `s` never appears as
/// a literal.
pub fn hidden_string<R: Rng + ?Sized>(s: &str, rng: &mut R) -> String {
    if s.is_empty() {
        return "\"\"".into();
    }
    let codes: Vec<String> = s.bytes().map(|b| obf_num(i64::from(b), rng)).collect();
    format!("string.char({})", codes.join(", "))
}
