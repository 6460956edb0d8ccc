use vexile_compiler::lexer::{strip_comments, tokenize, Lexer};
use vexile_compiler::token::TokenKind;

#[test]
fn e2e_lexer_always_ends_with_single_eof() {
    for src in ["", "local x = 1", "\"unterminated", "@@@", "--[[ open"] {
        let toks = tokenize(&strip_comments(src));
        let eofs = toks.iter().filter(|t| t.kind == TokenKind::Eof).count();
        assert_eq!(eofs, 1, "source {src:?}");
        assert_eq!(toks.last().map(|t| t.kind), Some(TokenKind::Eof));
    }
}

#[test]
fn e2e_lexer_is_pull_based() {
    let mut lexer = Lexer::new("a b c");
    assert_eq!(lexer.next().map(|t| t.text), Some("a".to_string()));
    assert_eq!(lexer.line(), 1);
    assert_eq!(lexer.count(), 3);
}

#[test]
fn e2e_lexer_realistic_script() {
    let src = r#"
local Players = game:GetService("Players")
for _, p in ipairs(Players:GetPlayers()) do
    print(p.Name .. " joined", #p.Name ~= 0x10)
end
"#;
    let toks = tokenize(src);
    let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
    for expected in ["local", "Players", ":", "GetService", "..", "#", "~=", "0x10", "end"] {
        assert!(texts.contains(&expected), "missing {expected}");
    }
    let joined = toks.iter().find(|t| t.kind == TokenKind::String && t.text == " joined");
    assert_eq!(joined.map(|t| t.line), Some(4));
}

#[test]
fn e2e_strip_comments_then_lex() {
    let src = "local a = 1 -- trailing\n--[==[\nblock\n]==]\nlocal b = '--not a comment'";
    let toks = tokenize(&strip_comments(src));
    let strings: Vec<_> = toks.iter().filter(|t| t.kind == TokenKind::String).collect();
    assert_eq!(strings.len(), 1);
    assert_eq!(strings[0].text, "--not a comment");
    assert_eq!(strings[0].line, 5);
}
