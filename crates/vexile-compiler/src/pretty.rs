//! Renders an AST back to source that the parser reads into an equal tree.

use crate::ast::{Block, Chunk, Expression, FunctionBody, FunctionName, Statement, TableField};
use std::fmt::Write;

const INDENT: &str = "  ";

pub fn print_chunk(chunk: &Chunk) -> String {
    let mut printer = Printer::default();
    printer.block(&chunk.body);
    printer.out
}

pub fn print_expression(expr: &Expression) -> String {
    Printer::default().expr(expr)
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, body: &Block) {
        self.indent += 1;
        self.block(body);
        self.indent -= 1;
    }

    fn block(&mut self, body: &Block) {
        for stat in body {
            self.statement(stat);
        }
    }

    fn statement(&mut self, stat: &Statement) {
        match stat {
            Statement::Assignment { targets, values } => {
                let line = format!("{} = {}", self.list(targets), self.list(values));
                self.line(&line);
            }
            Statement::Local { names, values } => {
                let mut line = format!("local {}", names.join(", "));
                if !values.is_empty() {
                    let _ = write!(line, " = {}", self.list(values));
                }
                self.line(&line);
            }
            Statement::CallStatement(call) => {
                let line = self.expr(call);
                self.line(&line);
            }
            Statement::Function { name, func } => {
                let (head, skip_self) = match name {
                    FunctionName::Local(n) => (format!("local function {n}"), false),
                    FunctionName::Path {
                        base,
                        fields,
                        method,
                    } => {
                        let mut head = format!("function {base}");
                        for f in fields {
                            let _ = write!(head, ".{f}");
                        }
                        if let Some(m) = method {
                            let _ = write!(head, ":{m}");
                        }
                        (head, method.is_some())
                    }
                };
                let params = params(func, skip_self);
                self.line(&format!("{head}({params})"));
                self.nested(&func.body);
                self.line("end");
            }
            Statement::If { clauses, else_body } => {
                for (i, clause) in clauses.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elseif" };
                    let cond = self.expr(&clause.condition);
                    self.line(&format!("{keyword} {cond} then"));
                    self.nested(&clause.body);
                }
                if let Some(body) = else_body {
                    self.line("else");
                    self.nested(body);
                }
                self.line("end");
            }
            Statement::While { condition, body } => {
                let cond = self.expr(condition);
                self.line(&format!("while {cond} do"));
                self.nested(body);
                self.line("end");
            }
            Statement::Repeat { body, condition } => {
                self.line("repeat");
                self.nested(body);
                let cond = self.expr(condition);
                self.line(&format!("until {cond}"));
            }
            Statement::ForNumeric {
                var,
                start,
                limit,
                step,
                body,
            } => {
                let mut head = format!("for {var} = {}, {}", self.expr(start), self.expr(limit));
                if let Some(step) = step {
                    let _ = write!(head, ", {}", self.expr(step));
                }
                head.push_str(" do");
                self.line(&head);
                self.nested(body);
                self.line("end");
            }
            Statement::ForGeneric {
                vars,
                iterators,
                body,
            } => {
                let head = format!("for {} in {} do", vars.join(", "), self.list(iterators));
                self.line(&head);
                self.nested(body);
                self.line("end");
            }
            Statement::Return(values) if values.is_empty() => self.line("return"),
            Statement::Return(values) => {
                let line = format!("return {}", self.list(values));
                self.line(&line);
            }
            Statement::Break => self.line("break"),
            Statement::Do(body) => {
                self.line("do");
                self.nested(body);
                self.line("end");
            }
        }
    }

    fn list(&mut self, exprs: &[Expression]) -> String {
        exprs
            .iter()
            .map(|e| self.expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expr(&mut self, expr: &Expression) -> String {
        match expr {
            Expression::Identifier(name) => name.clone(),
            Expression::String(s) => quote(s),
            Expression::Number(n) => number(*n),
            Expression::Boolean(b) => b.to_string(),
            Expression::Nil => "nil".into(),
            Expression::Vararg => "...".into(),
            Expression::Binary { op, left, right } => {
                let l = self.operand(left);
                let r = self.operand(right);
                format!("({l} {} {r})", op.symbol())
            }
            Expression::Unary { op, operand } => {
                let inner = self.operand(operand);
                format!("{} {inner}", op.symbol())
            }
            Expression::Call { base, args } => {
                let callee = self.prefix(base);
                format!("{callee}({})", self.list(args))
            }
            Expression::Member {
                base,
                indexer,
                name,
            } => {
                let sep = match indexer {
                    crate::ast::Indexer::Dot => '.',
                    crate::ast::Indexer::Colon => ':',
                };
                format!("{}{sep}{name}", self.prefix(base))
            }
            Expression::Index { base, key } => {
                let b = self.prefix(base);
                format!("{b}[{}]", self.expr(key))
            }
            Expression::Table(fields) => {
                let items: Vec<String> = fields
                    .iter()
                    .map(|field| match field {
                        TableField::Keyed { key, value } => {
                            format!("[{}] = {}", self.expr(key), self.expr(value))
                        }
                        TableField::Named { name, value } => {
                            format!("{name} = {}", self.expr(value))
                        }
                        TableField::Positional(value) => self.expr(value),
                    })
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Expression::Function(func) => {
                let mut inner = Printer {
                    out: String::new(),
                    indent: self.indent + 1,
                };
                inner.block(&func.body);
                let mut text = format!("function({})\n{}", params(func, false), inner.out);
                for _ in 0..self.indent {
                    text.push_str(INDENT);
                }
                text.push_str("end");
                text
            }
            Expression::Paren(inner) => format!("({})", self.expr(inner)),
        }
    }

    /// Operand of a unary or binary operator. Unary operands are wrapped so
    /// `(-x) ^ 2` does not reparse as `-(x ^ 2)`.
    fn operand(&mut self, expr: &Expression) -> String {
        let text = self.expr(expr);
        match expr {
            Expression::Unary { .. } => format!("({text})"),
            _ => text,
        }
    }

    /// Base of a call, member or index. Only prefix expressions may appear
    /// there unparenthesized.
    fn prefix(&mut self, expr: &Expression) -> String {
        let text = self.expr(expr);
        match expr {
            Expression::Identifier(_)
            | Expression::Call { .. }
            | Expression::Member { .. }
            | Expression::Index { .. }
            | Expression::Paren(_) => text,
            _ => format!("({text})"),
        }
    }
}

fn params(func: &FunctionBody, skip_self: bool) -> String {
    let mut names: Vec<&str> = func
        .params
        .iter()
        .skip(usize::from(skip_self))
        .map(String::as_str)
        .collect();
    if func.is_vararg {
        names.push("...");
    }
    names.join(", ")
}

/// Double-quoted literal. Only the quote and backslash need escaping because
/// the lexer copies escaped characters through literally.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn number(n: f64) -> String {
    if n.is_infinite() {
        "1e999".into()
    } else {
        n.to_string()
    }
}
