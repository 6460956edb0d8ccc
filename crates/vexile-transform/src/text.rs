//! String-aware text utilities: whitespace minifier and JavaScript comment
//! stripping.

use vexile_compiler::lexer::{long_bracket_end, long_bracket_level, quoted_end};
use vexile_compiler::strip_comments;

/// Collapse Lua source onto one line.
///
/// Comments are removed first, every whitespace run outside a string becomes
/// one space, and quoted or long-bracket strings are copied untouched.
pub fn minify(source: &str) -> String {
    let source = strip_comments(source);
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut pending_space = false;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch.is_ascii_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(b' ');
        }
        pending_space = false;
        let end = match ch {
            b'"' | b'\'' => quoted_end(bytes, i),
            b'[' => match long_bracket_level(bytes, i) {
                Some(level) => long_bracket_end(bytes, i, level),
                None => i + 1,
            },
            _ => i + 1,
        };
        out.extend_from_slice(&bytes[i..end]);
        i = end;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Remove `//` and `/* */` comments from JavaScript, leaving `'`, `"` and
/// template strings alone. Regex literals are not recognized.
pub fn strip_js_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        match (ch, bytes.get(i + 1)) {
            (b'"' | b'\'' | b'`', _) => {
                let end = quoted_end(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            (b'/', Some(b'/')) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    if bytes[i] == b'\n' {
                        out.push(b'\n');
                    }
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Trim every line and drop the empty ones.
pub fn trim_lines(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
