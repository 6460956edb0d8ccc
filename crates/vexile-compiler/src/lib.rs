//! Vexile compiler: lexer, parser and randomized-encoding bytecode compiler
//! for a Lua subset.

pub mod ast;
pub mod compiler;
pub mod disasm;
pub mod error;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod pretty;
pub mod proto;
pub mod token;

pub use compiler::compile;
pub use error::{CompileError, SyntaxError};
pub use lexer::{strip_comments, tokenize};
pub use parser::{parse, parse_source};
pub use proto::CompiledUnit;
