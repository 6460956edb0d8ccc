//! Simulator error types.

use thiserror::Error;

/// Failure while running a unit in the reference simulator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    /// Runtime error raised by an instruction or a native function.
    #[error("{0}")]
    Runtime(String),
    /// The serialized bytecode of a prototype does not decode through the map.
    #[error("malformed bytecode in prototype {0}")]
    Decode(usize),
    /// Too many instructions executed. A spinning crash routine ends here.
    #[error("step limit of {0} instructions exceeded")]
    StepLimit(u64),
    /// Too many nested calls.
    #[error("stack overflow")]
    StackOverflow,
}

impl SimError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        SimError::Runtime(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
