//! Pull-based lexer for the Vexile Lua subset, plus the comment pre-pass.
//!
//! The lexer is total: it never fails. Characters it does not recognize are
//! skipped, and an unterminated string simply runs to the end of input.
//! Comments are not handled here; run [`strip_comments`] first.

use crate::token::{is_keyword, Token, TokenKind};

/// Lazily produces tokens, ending with exactly one `Eof`.
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            finished: false,
        }
    }

    /// Get current line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    // ---- Internal scanning ----

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance_char(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || ch == b'\x0B' {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn slice(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }

    fn scan_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace();
            let ch = self.peek()?;
            let line = self.line;

            if ch == b'_' || ch.is_ascii_alphabetic() {
                return Some(self.scan_name(line));
            }
            if ch.is_ascii_digit() || (ch == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
                return Some(self.scan_number(line));
            }
            if ch == b'"' || ch == b'\'' {
                return Some(self.scan_string(ch, line));
            }
            if let Some(level) = long_bracket_level(self.source, self.pos) {
                return Some(self.scan_long_string(level, line));
            }
            if let Some(tok) = self.scan_symbol(line) {
                return Some(tok);
            }
            // Unrecognized character: skip it.
            self.advance_char();
        }
    }

    fn scan_name(&mut self, line: u32) -> Token {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == b'_' || ch.is_ascii_alphanumeric() {
                self.advance_char();
            } else {
                break;
            }
        }
        let text = self.slice(start);
        let kind = if is_keyword(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, line)
    }

    /// Decimal (with optional fraction and exponent) or `0x` hexadecimal.
    fn scan_number(&mut self, line: u32) -> Token {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.advance_char();
            self.advance_char();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance_char();
            }
            return Token::new(TokenKind::Number, self.slice(start), line);
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
        }
        if self.peek() == Some(b'.') && self.peek_at(1) != Some(b'.') {
            self.advance_char();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance_char();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..=sign {
                    self.advance_char();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance_char();
                }
            }
        }
        Token::new(TokenKind::Number, self.slice(start), line)
    }

    /// Quoted string. A backslash copies the following character literally.
    fn scan_string(&mut self, quote: u8, line: u32) -> Token {
        self.advance_char(); // opening quote
        let mut body = Vec::new();
        while let Some(ch) = self.advance_char() {
            if ch == quote {
                break;
            }
            if ch == b'\\' {
                if let Some(escaped) = self.advance_char() {
                    body.push(escaped);
                }
                continue;
            }
            body.push(ch);
        }
        Token::new(
            TokenKind::String,
            String::from_utf8_lossy(&body).into_owned(),
            line,
        )
    }

    /// `[[...]]` or `[==[...]==]`. A newline right after the opener is dropped.
    fn scan_long_string(&mut self, level: usize, line: u32) -> Token {
        let open_len = level + 2;
        let end = long_bracket_end(self.source, self.pos, level);
        let mut body_start = self.pos + open_len;
        let closed = end >= body_start + open_len
            && self.source[end - open_len] == b']'
            && self.source[end - 1] == b']'
            && self.source[end - open_len + 1..end - 1].iter().all(|&b| b == b'=');
        let body_end = if closed { end - open_len } else { end };
        if body_start < body_end && self.source[body_start] == b'\n' {
            body_start += 1;
        }
        let text = String::from_utf8_lossy(&self.source[body_start..body_end]).into_owned();
        while self.pos < end {
            self.advance_char();
        }
        Token::new(TokenKind::String, text, line)
    }

    fn scan_symbol(&mut self, line: u32) -> Option<Token> {
        let ch = self.peek()?;
        let next = self.peek_at(1);
        let (text, kind): (&str, TokenKind) = match (ch, next) {
            (b'.', Some(b'.')) if self.peek_at(2) == Some(b'.') => ("...", TokenKind::Operator),
            (b'.', Some(b'.')) => ("..", TokenKind::Operator),
            (b'=', Some(b'=')) => ("==", TokenKind::Operator),
            (b'~', Some(b'=')) => ("~=", TokenKind::Operator),
            (b'<', Some(b'=')) => ("<=", TokenKind::Operator),
            (b'>', Some(b'=')) => (">=", TokenKind::Operator),
            (b'+', _) => ("+", TokenKind::Operator),
            (b'-', _) => ("-", TokenKind::Operator),
            (b'*', _) => ("*", TokenKind::Operator),
            (b'/', _) => ("/", TokenKind::Operator),
            (b'%', _) => ("%", TokenKind::Operator),
            (b'^', _) => ("^", TokenKind::Operator),
            (b'#', _) => ("#", TokenKind::Operator),
            (b'=', _) => ("=", TokenKind::Operator),
            (b'<', _) => ("<", TokenKind::Operator),
            (b'>', _) => (">", TokenKind::Operator),
            (b'.', _) => (".", TokenKind::Operator),
            (b'(', _) => ("(", TokenKind::Punctuation),
            (b')', _) => (")", TokenKind::Punctuation),
            (b'{', _) => ("{", TokenKind::Punctuation),
            (b'}', _) => ("}", TokenKind::Punctuation),
            (b'[', _) => ("[", TokenKind::Punctuation),
            (b']', _) => ("]", TokenKind::Punctuation),
            (b';', _) => (";", TokenKind::Punctuation),
            (b':', _) => (":", TokenKind::Punctuation),
            (b',', _) => (",", TokenKind::Punctuation),
            _ => return None,
        };
        for _ in 0..text.len() {
            self.advance_char();
        }
        Some(Token::new(kind, text, line))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        match self.scan_token() {
            Some(tok) => Some(tok),
            None => {
                self.finished = true;
                Some(Token::eof(self.line))
            }
        }
    }
}

/// Tokenize the whole source. The last token is always `Eof`.
pub fn tokenize(source: &str) -> Vec<Token> {
    let tokens: Vec<Token> = Lexer::new(source).collect();
    tracing::trace!(count = tokens.len(), "tokenized");
    tokens
}

/// Remove `--` line comments and `--[[ ]]` / `--[==[ ]==]` block comments.
///
/// String literals and long strings are copied verbatim. Newlines inside block
/// comments are kept so line numbers still match the original text.
pub fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        match ch {
            b'"' | b'\'' => {
                let end = quoted_end(bytes, i);
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'[' => match long_bracket_level(bytes, i) {
                Some(level) => {
                    let end = long_bracket_end(bytes, i, level);
                    out.extend_from_slice(&bytes[i..end]);
                    i = end;
                }
                None => {
                    out.push(ch);
                    i += 1;
                }
            },
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let body = i + 2;
                if let Some(level) = long_bracket_level(bytes, body) {
                    let end = long_bracket_end(bytes, body, level);
                    out.extend(bytes[body..end].iter().filter(|&&b| b == b'\n'));
                    i = end;
                } else {
                    i = body;
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Index one past the closing quote of the string starting at `start`
/// (or the end of input / line for an unterminated string).
pub fn quoted_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// If `[=*[` starts at `start`, return its level (number of `=`).
pub fn long_bracket_level(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'[') {
        return None;
    }
    let mut level = 0;
    while bytes.get(start + 1 + level) == Some(&b'=') {
        level += 1;
    }
    (bytes.get(start + 1 + level) == Some(&b'[')).then_some(level)
}

/// Index one past the matching `]=*]`, or the end of input.
pub fn long_bracket_end(bytes: &[u8], start: usize, level: usize) -> usize {
    let mut i = start + level + 2;
    while i < bytes.len() {
        if bytes[i] == b']' {
            let closes = (0..level).all(|k| bytes.get(i + 1 + k) == Some(&b'='))
                && bytes.get(i + 1 + level) == Some(&b']');
            if closes {
                return i + level + 2;
            }
        }
        i += 1;
    }
    bytes.len()
}
