use std::fmt;

/// Token category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    String,
    Number,
    /// Arithmetic, comparison, assignment and dot operators.
    Operator,
    /// Brackets and separators: `( ) { } [ ] ; : ,`
    Punctuation,
    Eof,
}

/// A token with the line it starts on. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text. For strings this is the decoded body without quotes.
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn eof(line: u32) -> Self {
        Token::new(TokenKind::Eof, "<eof>", line)
    }

    /// True for a keyword, operator or punctuation token with exactly this text.
    pub fn is(&self, text: &str) -> bool {
        matches!(
            self.kind,
            TokenKind::Keyword | TokenKind::Operator | TokenKind::Punctuation
        ) && self.text == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::String => write!(f, "\"{}\"", self.text),
            _ => f.write_str(&self.text),
        }
    }
}

/// The fixed keyword set.
pub const KEYWORDS: [&str; 21] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Reserved words of the wider Lua family that generated names must also avoid.
pub const RESERVED_EXTRA: [&str; 3] = ["goto", "continue", "_ENV"];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// Whether `s` can be used as a Lua identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) && !is_keyword(s)
}
