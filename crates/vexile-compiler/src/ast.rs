//! Abstract syntax tree for the Vexile Lua subset.
//!
//! Each node family is a closed sum type. Nodes are owned by the `Chunk`
//! that roots them; there is no sharing between subtrees.

use indexmap::IndexSet;

/// Parsed source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    pub body: Block,
}

pub type Block = Vec<Statement>;

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `a, b.c, d[e] = x, y, z`
    Assignment {
        targets: Vec<Expression>,
        values: Vec<Expression>,
    },
    /// `local a, b = x, y`
    Local {
        names: Vec<String>,
        values: Vec<Expression>,
    },
    /// A call evaluated for its side effects.
    CallStatement(Expression),
    /// `function a.b:c() end` or `local function f() end`
    Function { name: FunctionName, func: FunctionBody },
    If {
        clauses: Vec<IfClause>,
        else_body: Option<Block>,
    },
    While { condition: Expression, body: Block },
    Repeat { body: Block, condition: Expression },
    ForNumeric {
        var: String,
        start: Expression,
        limit: Expression,
        step: Option<Expression>,
        body: Block,
    },
    ForGeneric {
        vars: Vec<String>,
        iterators: Vec<Expression>,
        body: Block,
    },
    Return(Vec<Expression>),
    Break,
    Do(Block),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfClause {
    pub condition: Expression,
    pub body: Block,
}

/// Target of a function statement.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionName {
    /// `local function name`
    Local(String),
    /// `function base.f1.f2:method`
    Path {
        base: String,
        fields: Vec<String>,
        method: Option<String>,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionBody {
    pub params: Vec<String>,
    pub is_vararg: bool,
    pub body: Block,
}

/// How a member is qualified. A colon marks a method call with implicit `self`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indexer {
    Dot,
    Colon,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Identifier(String),
    String(String),
    Number(f64),
    Boolean(bool),
    Nil,
    Vararg,
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expression>,
    },
    Call {
        base: Box<Expression>,
        args: Vec<Expression>,
    },
    /// `base.name` or `base:name`
    Member {
        base: Box<Expression>,
        indexer: Indexer,
        name: String,
    },
    /// `base[key]`
    Index {
        base: Box<Expression>,
        key: Box<Expression>,
    },
    Table(Vec<TableField>),
    Function(FunctionBody),
    /// Parentheses around a call or vararg, truncating it to one value.
    Paren(Box<Expression>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableField {
    /// `[key] = value`
    Keyed { key: Expression, value: Expression },
    /// `name = value`
    Named { name: String, value: Expression },
    /// `value`, auto-indexed from 1 in order of occurrence
    Positional(Expression),
}

/// Binary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Unary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

/// Minimum precedence for unary operators.
pub const UNARY_PRIORITY: u8 = 12;

/// Operator precedence level (higher = binds tighter).
/// Returns (left priority, right priority).
impl BinOp {
    pub fn priority(self) -> (u8, u8) {
        match self {
            BinOp::Or => (1, 1),
            BinOp::And => (2, 2),
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq | BinOp::NotEq | BinOp::Eq => (3, 3),
            BinOp::Concat => (8, 7), // right-associative
            BinOp::Add | BinOp::Sub => (10, 10),
            BinOp::Mul | BinOp::Div | BinOp::Mod => (11, 11),
            BinOp::Pow => (14, 13), // right-associative
        }
    }

    pub fn from_symbol(s: &str) -> Option<BinOp> {
        Some(match s {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            "^" => BinOp::Pow,
            ".." => BinOp::Concat,
            "==" => BinOp::Eq,
            "~=" => BinOp::NotEq,
            "<" => BinOp::Lt,
            "<=" => BinOp::LtEq,
            ">" => BinOp::Gt,
            ">=" => BinOp::GtEq,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::Concat => "..",
            BinOp::Eq => "==",
            BinOp::NotEq => "~=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq
        )
    }
}

impl UnOp {
    pub fn from_symbol(s: &str) -> Option<UnOp> {
        match s {
            "-" => Some(UnOp::Neg),
            "not" => Some(UnOp::Not),
            "#" => Some(UnOp::Len),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "not",
            UnOp::Len => "#",
        }
    }
}

impl Statement {
    /// Node kind name, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Assignment { .. } => "Assignment",
            Statement::Local { .. } => "Local",
            Statement::CallStatement(_) => "CallStatement",
            Statement::Function { .. } => "Function",
            Statement::If { .. } => "If",
            Statement::While { .. } => "While",
            Statement::Repeat { .. } => "Repeat",
            Statement::ForNumeric { .. } => "ForNumeric",
            Statement::ForGeneric { .. } => "ForGeneric",
            Statement::Return(_) => "Return",
            Statement::Break => "Break",
            Statement::Do(_) => "Do",
        }
    }
}

impl Expression {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Identifier(_) => "Identifier",
            Expression::String(_) => "String",
            Expression::Number(_) => "Number",
            Expression::Boolean(_) => "Boolean",
            Expression::Nil => "Nil",
            Expression::Vararg => "Vararg",
            Expression::Binary { .. } => "Binary",
            Expression::Unary { .. } => "Unary",
            Expression::Call { .. } => "Call",
            Expression::Member { .. } => "Member",
            Expression::Index { .. } => "Index",
            Expression::Table(_) => "Table",
            Expression::Function(_) => "FunctionExpression",
            Expression::Paren(_) => "Paren",
        }
    }

    /// Calls and varargs can produce more than one value.
    pub fn is_multi_value(&self) -> bool {
        matches!(self, Expression::Call { .. } | Expression::Vararg)
    }

    /// A call whose base is a colon-qualified member.
    pub fn is_method_call(&self) -> bool {
        matches!(
            self,
            Expression::Call { base, .. }
                if matches!(**base, Expression::Member { indexer: Indexer::Colon, .. })
        )
    }
}

impl Chunk {
    /// Every identifier the program names: variables, parameters, fields and
    /// methods. Generated names must stay out of this set.
    pub fn identifiers(&self) -> IndexSet<String> {
        let mut names = IndexSet::new();
        collect_block(&self.body, &mut names);
        names
    }
}

fn collect_block(block: &Block, names: &mut IndexSet<String>) {
    for stat in block {
        collect_statement(stat, names);
    }
}

fn collect_function(func: &FunctionBody, names: &mut IndexSet<String>) {
    names.extend(func.params.iter().cloned());
    collect_block(&func.body, names);
}

fn collect_statement(stat: &Statement, names: &mut IndexSet<String>) {
    match stat {
        Statement::Assignment { targets, values } => {
            targets.iter().chain(values).for_each(|e| collect_expr(e, names));
        }
        Statement::Local { names: locals, values } => {
            names.extend(locals.iter().cloned());
            values.iter().for_each(|e| collect_expr(e, names));
        }
        Statement::CallStatement(e) => collect_expr(e, names),
        Statement::Function { name, func } => {
            match name {
                FunctionName::Local(n) => {
                    names.insert(n.clone());
                }
                FunctionName::Path {
                    base,
                    fields,
                    method,
                } => {
                    names.insert(base.clone());
                    names.extend(fields.iter().cloned());
                    names.extend(method.iter().cloned());
                }
            }
            collect_function(func, names);
        }
        Statement::If { clauses, else_body } => {
            for clause in clauses {
                collect_expr(&clause.condition, names);
                collect_block(&clause.body, names);
            }
            if let Some(body) = else_body {
                collect_block(body, names);
            }
        }
        Statement::While { condition, body } | Statement::Repeat { body, condition } => {
            collect_expr(condition, names);
            collect_block(body, names);
        }
        Statement::ForNumeric {
            var,
            start,
            limit,
            step,
            body,
        } => {
            names.insert(var.clone());
            collect_expr(start, names);
            collect_expr(limit, names);
            if let Some(step) = step {
                collect_expr(step, names);
            }
            collect_block(body, names);
        }
        Statement::ForGeneric {
            vars,
            iterators,
            body,
        } => {
            names.extend(vars.iter().cloned());
            iterators.iter().for_each(|e| collect_expr(e, names));
            collect_block(body, names);
        }
        Statement::Return(values) => values.iter().for_each(|e| collect_expr(e, names)),
        Statement::Break => {}
        Statement::Do(body) => collect_block(body, names),
    }
}

fn collect_expr(expr: &Expression, names: &mut IndexSet<String>) {
    match expr {
        Expression::Identifier(n) => {
            names.insert(n.clone());
        }
        Expression::String(_)
        | Expression::Number(_)
        | Expression::Boolean(_)
        | Expression::Nil
        | Expression::Vararg => {}
        Expression::Binary { left, right, .. } => {
            collect_expr(left, names);
            collect_expr(right, names);
        }
        Expression::Unary { operand, .. } => collect_expr(operand, names),
        Expression::Call { base, args } => {
            collect_expr(base, names);
            args.iter().for_each(|e| collect_expr(e, names));
        }
        Expression::Member { base, name, .. } => {
            collect_expr(base, names);
            names.insert(name.clone());
        }
        Expression::Index { base, key } => {
            collect_expr(base, names);
            collect_expr(key, names);
        }
        Expression::Table(fields) => {
            for field in fields {
                match field {
                    TableField::Keyed { key, value } => {
                        collect_expr(key, names);
                        collect_expr(value, names);
                    }
                    TableField::Named { name, value } => {
                        names.insert(name.clone());
                        collect_expr(value, names);
                    }
                    TableField::Positional(value) => collect_expr(value, names),
                }
            }
        }
        Expression::Function(func) => collect_function(func, names),
        Expression::Paren(inner) => collect_expr(inner, names),
    }
}
