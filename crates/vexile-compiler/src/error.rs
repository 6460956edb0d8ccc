//! Compile-time error taxonomy.

use thiserror::Error;

/// Malformed input, reported with the line of the offending token.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} at line {line}")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        SyntaxError {
            message: message.into(),
            line,
        }
    }
}

/// Any failure that aborts a compile call. No partial output is produced.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    /// A construct the bytecode compiler has no lowering for.
    #[error("unsupported construct: {construct}")]
    Unsupported { construct: String },
    /// An operand or table outgrew the 16-bit instruction fields.
    #[error("too many {what} (limit is {limit})")]
    LimitExceeded { what: &'static str, limit: usize },
    #[error("output of {size} bytes exceeds the configured ceiling of {limit} bytes")]
    OutputTooLarge { size: usize, limit: usize },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl CompileError {
    pub fn unsupported(construct: impl Into<String>) -> Self {
        CompileError::Unsupported {
            construct: construct.into(),
        }
    }
}
