//! Recursive-descent parser producing a `Chunk`.
//!
//! Expressions use precedence climbing over `BinOp::priority`. Nesting of
//! blocks and expressions is bounded by a configurable depth so hostile input
//! cannot exhaust the native stack.

use crate::ast::{
    BinOp, Block, Chunk, Expression, FunctionBody, FunctionName, IfClause, Indexer, Statement,
    TableField, UnOp, UNARY_PRIORITY,
};
use crate::error::SyntaxError;
use crate::lexer::{strip_comments, tokenize};
use crate::token::{Token, TokenKind};
use tracing::debug;

/// Default bound on syntactic nesting.
pub const DEFAULT_MAX_DEPTH: usize = 200;

type ParseResult<T> = Result<T, SyntaxError>;

/// Parse a token stream into a chunk.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Chunk> {
    Parser::new(tokens).parse_chunk()
}

/// Strip comments, tokenize and parse in one step.
pub fn parse_source(source: &str) -> ParseResult<Chunk> {
    parse(tokenize(&strip_comments(source)))
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let last_line = tokens.last().map_or(1, |t| t.line);
        Parser {
            tokens,
            pos: 0,
            eof: Token::eof(last_line),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn parse_chunk(mut self) -> ParseResult<Chunk> {
        let body = self.block()?;
        if self.peek(0).kind != TokenKind::Eof {
            return Err(self.expected("'<eof>'"));
        }
        debug!(statements = body.len(), "parsed chunk");
        Ok(Chunk { body })
    }

    // ---- token access ----

    fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek(0).clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, text: &str) -> bool {
        self.peek(0).is(text)
    }

    fn accept(&mut self, text: &str) -> bool {
        if self.check(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> ParseResult<Token> {
        if self.check(text) {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("'{text}'")))
        }
    }

    fn expected(&self, what: &str) -> SyntaxError {
        let tok = self.peek(0);
        SyntaxError::new(format!("expected {what}, got {}", describe(tok)), tok.line)
    }

    fn name(&mut self) -> ParseResult<String> {
        if self.peek(0).kind == TokenKind::Identifier {
            Ok(self.advance().text)
        } else {
            Err(self.expected("identifier"))
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SyntaxError::new(
                format!("chunk has too many syntax levels (limit is {})", self.max_depth),
                self.peek(0).line,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn leave_n(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn block_follow(&self) -> bool {
        let tok = self.peek(0);
        match tok.kind {
            TokenKind::Eof => true,
            TokenKind::Keyword => matches!(tok.text.as_str(), "end" | "else" | "elseif" | "until"),
            _ => false,
        }
    }

    // ---- statements ----

    fn block(&mut self) -> ParseResult<Block> {
        self.enter()?;
        let mut body = Vec::new();
        loop {
            while self.accept(";") {}
            if self.block_follow() {
                break;
            }
            if self.check("return") {
                body.push(self.return_stat()?);
                while self.accept(";") {}
                break;
            }
            body.push(self.statement()?);
        }
        self.leave();
        Ok(body)
    }

    fn statement(&mut self) -> ParseResult<Statement> {
        let tok = self.peek(0);
        if tok.kind == TokenKind::Keyword {
            match tok.text.as_str() {
                "local" => return self.local_stat(),
                "function" => return self.function_stat(),
                "if" => return self.if_stat(),
                "while" => {
                    self.advance();
                    let condition = self.expr()?;
                    self.expect("do")?;
                    let body = self.block()?;
                    self.expect("end")?;
                    return Ok(Statement::While { condition, body });
                }
                "do" => {
                    self.advance();
                    let body = self.block()?;
                    self.expect("end")?;
                    return Ok(Statement::Do(body));
                }
                "for" => return self.for_stat(),
                "repeat" => {
                    self.advance();
                    let body = self.block()?;
                    self.expect("until")?;
                    let condition = self.expr()?;
                    return Ok(Statement::Repeat { body, condition });
                }
                "break" => {
                    self.advance();
                    return Ok(Statement::Break);
                }
                _ => {}
            }
        }
        self.expr_stat()
    }

    fn local_stat(&mut self) -> ParseResult<Statement> {
        self.advance();
        if self.accept("function") {
            let name = self.name()?;
            let func = self.func_body()?;
            return Ok(Statement::Function {
                name: FunctionName::Local(name),
                func,
            });
        }
        let mut names = vec![self.name()?];
        while self.accept(",") {
            names.push(self.name()?);
        }
        let values = if self.accept("=") {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(Statement::Local { names, values })
    }

    fn function_stat(&mut self) -> ParseResult<Statement> {
        self.advance();
        let base = self.name()?;
        let mut fields = Vec::new();
        while self.accept(".") {
            fields.push(self.name()?);
        }
        let method = if self.accept(":") {
            Some(self.name()?)
        } else {
            None
        };
        let mut func = self.func_body()?;
        if method.is_some() {
            func.params.insert(0, "self".to_string());
        }
        Ok(Statement::Function {
            name: FunctionName::Path {
                base,
                fields,
                method,
            },
            func,
        })
    }

    fn func_body(&mut self) -> ParseResult<FunctionBody> {
        self.expect("(")?;
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(")") {
            loop {
                if self.accept("...") {
                    is_vararg = true;
                    break;
                }
                params.push(self.name()?);
                if !self.accept(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        let body = self.block()?;
        self.expect("end")?;
        Ok(FunctionBody {
            params,
            is_vararg,
            body,
        })
    }

    fn if_stat(&mut self) -> ParseResult<Statement> {
        self.advance();
        let mut clauses = Vec::new();
        loop {
            let condition = self.expr()?;
            self.expect("then")?;
            let body = self.block()?;
            clauses.push(IfClause { condition, body });
            if !self.accept("elseif") {
                break;
            }
        }
        let else_body = if self.accept("else") {
            Some(self.block()?)
        } else {
            None
        };
        self.expect("end")?;
        Ok(Statement::If { clauses, else_body })
    }

    fn for_stat(&mut self) -> ParseResult<Statement> {
        self.advance();
        let first = self.name()?;
        if self.accept("=") {
            let start = self.expr()?;
            self.expect(",")?;
            let limit = self.expr()?;
            let step = if self.accept(",") {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect("do")?;
            let body = self.block()?;
            self.expect("end")?;
            return Ok(Statement::ForNumeric {
                var: first,
                start,
                limit,
                step,
                body,
            });
        }
        let mut vars = vec![first];
        while self.accept(",") {
            vars.push(self.name()?);
        }
        self.expect("in")?;
        let iterators = self.expr_list()?;
        self.expect("do")?;
        let body = self.block()?;
        self.expect("end")?;
        Ok(Statement::ForGeneric {
            vars,
            iterators,
            body,
        })
    }

    fn return_stat(&mut self) -> ParseResult<Statement> {
        self.advance();
        let values = if self.block_follow() || self.check(";") {
            Vec::new()
        } else {
            self.expr_list()?
        };
        Ok(Statement::Return(values))
    }

    /// Assignment or call statement: parse a suffixed expression, then look
    /// for `=` or `,`.
    fn expr_stat(&mut self) -> ParseResult<Statement> {
        let line = self.peek(0).line;
        let first = self.suffixed_expr()?;
        if self.check("=") || self.check(",") {
            let mut targets = vec![first];
            while self.accept(",") {
                targets.push(self.suffixed_expr()?);
            }
            self.expect("=")?;
            let values = self.expr_list()?;
            if let Some(bad) = targets.iter().find(|t| !is_assignable(t)) {
                return Err(SyntaxError::new(
                    format!("cannot assign to {}", bad.kind_name()),
                    line,
                ));
            }
            return Ok(Statement::Assignment { targets, values });
        }
        if matches!(first, Expression::Call { .. }) {
            Ok(Statement::CallStatement(first))
        } else {
            Err(self.expected("'='"))
        }
    }

    // ---- expressions ----

    pub fn expr(&mut self) -> ParseResult<Expression> {
        self.sub_expr(0)
    }

    fn expr_list(&mut self) -> ParseResult<Vec<Expression>> {
        let mut list = vec![self.expr()?];
        while self.accept(",") {
            list.push(self.expr()?);
        }
        Ok(list)
    }

    fn sub_expr(&mut self, limit: u8) -> ParseResult<Expression> {
        self.enter()?;
        let mut left = match self.unary_op() {
            Some(op) => {
                self.advance();
                let operand = self.sub_expr(UNARY_PRIORITY)?;
                Expression::Unary {
                    op,
                    operand: Box::new(operand),
                }
            }
            None => self.simple_expr()?,
        };
        // Folded operators deepen the left spine; each one is a level.
        let mut spine = 0;
        while let Some(op) = self.binary_op() {
            let (left_priority, right_priority) = op.priority();
            if left_priority <= limit {
                break;
            }
            self.advance();
            self.enter()?;
            spine += 1;
            let right = self.sub_expr(right_priority)?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave_n(spine + 1);
        Ok(left)
    }

    fn unary_op(&self) -> Option<UnOp> {
        let tok = self.peek(0);
        match tok.kind {
            TokenKind::Operator | TokenKind::Keyword => UnOp::from_symbol(&tok.text),
            _ => None,
        }
    }

    fn binary_op(&self) -> Option<BinOp> {
        let tok = self.peek(0);
        match tok.kind {
            TokenKind::Operator | TokenKind::Keyword => BinOp::from_symbol(&tok.text),
            _ => None,
        }
    }

    fn simple_expr(&mut self) -> ParseResult<Expression> {
        let tok = self.peek(0).clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Expression::Number(parse_number(&tok)?))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expression::String(tok.text))
            }
            TokenKind::Keyword => match tok.text.as_str() {
                "nil" => {
                    self.advance();
                    Ok(Expression::Nil)
                }
                "true" => {
                    self.advance();
                    Ok(Expression::Boolean(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expression::Boolean(false))
                }
                "function" => {
                    self.advance();
                    Ok(Expression::Function(self.func_body()?))
                }
                _ => self.suffixed_expr(),
            },
            _ if tok.is("...") => {
                self.advance();
                Ok(Expression::Vararg)
            }
            _ if tok.is("{") => self.table(),
            _ => self.suffixed_expr(),
        }
    }

    fn primary_expr(&mut self) -> ParseResult<Expression> {
        let tok = self.peek(0).clone();
        if tok.kind == TokenKind::Identifier {
            self.advance();
            return Ok(Expression::Identifier(tok.text));
        }
        if tok.is("(") {
            self.advance();
            let inner = self.expr()?;
            self.expect(")")?;
            return Ok(if inner.is_multi_value() {
                Expression::Paren(Box::new(inner))
            } else {
                inner
            });
        }
        Err(SyntaxError::new(
            format!("unexpected symbol {}", describe(&tok)),
            tok.line,
        ))
    }

    /// Primary expression followed by `.name`, `[key]`, `:name(args)` and
    /// `(args)` postfixes, applied left to right.
    fn suffixed_expr(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary_expr()?;
        // Postfixes nest to the left as well.
        let mut spine = 0;
        loop {
            if is_suffix(self.peek(0)) {
                self.enter()?;
                spine += 1;
            }
            let tok = self.peek(0);
            if tok.is(".") {
                self.advance();
                let name = self.name()?;
                expr = Expression::Member {
                    base: Box::new(expr),
                    indexer: Indexer::Dot,
                    name,
                };
            } else if tok.is("[") {
                self.advance();
                let key = self.expr()?;
                self.expect("]")?;
                expr = Expression::Index {
                    base: Box::new(expr),
                    key: Box::new(key),
                };
            } else if tok.is(":") {
                self.advance();
                let name = self.name()?;
                let method = Expression::Member {
                    base: Box::new(expr),
                    indexer: Indexer::Colon,
                    name,
                };
                let args = self.call_args()?;
                expr = Expression::Call {
                    base: Box::new(method),
                    args,
                };
            } else if tok.is("(") || tok.is("{") || tok.kind == TokenKind::String {
                let args = self.call_args()?;
                expr = Expression::Call {
                    base: Box::new(expr),
                    args,
                };
            } else {
                self.leave_n(spine);
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> ParseResult<Vec<Expression>> {
        let tok = self.peek(0);
        if tok.kind == TokenKind::String {
            let text = self.advance().text;
            return Ok(vec![Expression::String(text)]);
        }
        if tok.is("{") {
            return Ok(vec![self.table()?]);
        }
        self.expect("(")?;
        let args = if self.check(")") {
            Vec::new()
        } else {
            self.expr_list()?
        };
        self.expect(")")?;
        Ok(args)
    }

    fn table(&mut self) -> ParseResult<Expression> {
        self.expect("{")?;
        let mut fields = Vec::new();
        while !self.check("}") {
            fields.push(self.table_field()?);
            if !(self.accept(",") || self.accept(";")) {
                break;
            }
        }
        self.expect("}")?;
        Ok(Expression::Table(fields))
    }

    fn table_field(&mut self) -> ParseResult<TableField> {
        if self.accept("[") {
            let key = self.expr()?;
            self.expect("]")?;
            self.expect("=")?;
            let value = self.expr()?;
            return Ok(TableField::Keyed { key, value });
        }
        if self.peek(0).kind == TokenKind::Identifier && self.peek(1).is("=") {
            let name = self.advance().text;
            self.advance();
            let value = self.expr()?;
            return Ok(TableField::Named { name, value });
        }
        Ok(TableField::Positional(self.expr()?))
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::String => tok.to_string(),
        _ => format!("'{}'", tok.text),
    }
}

fn is_assignable(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Identifier(_)
            | Expression::Index { .. }
            | Expression::Member {
                indexer: Indexer::Dot,
                ..
            }
    )
}

fn is_suffix(tok: &Token) -> bool {
    [".", "[", ":", "(", "{"].iter().any(|s| tok.is(s)) || tok.kind == TokenKind::String
}

fn parse_number(tok: &Token) -> ParseResult<f64> {
    let text = tok.text.as_str();
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok().map(|v| v as f64)
    } else if let Some(frac) = text.strip_prefix('.') {
        format!("0.{frac}").parse::<f64>().ok()
    } else {
        text.parse::<f64>().ok()
    };
    value.ok_or_else(|| SyntaxError::new(format!("malformed number near '{text}'"), tok.line))
}
