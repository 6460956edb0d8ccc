#![no_main]

use libfuzzer_sys::fuzz_target;
use vexile_compiler::lexer::Lexer;
use vexile_compiler::strip_comments;
use vexile_compiler::token::TokenKind;

fuzz_target!(|data: &[u8]| {
    // Lexing is total: every input ends in exactly one Eof and never panics.
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let stripped = strip_comments(source);
    let tokens: Vec<_> = Lexer::new(&stripped).collect();
    assert_eq!(
        tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
        1
    );
});
