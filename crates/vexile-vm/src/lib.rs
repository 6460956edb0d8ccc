//! Vexile VM generator.
//!
//! [`codegen`] turns a compiled unit into the Lua source of a custom
//! interpreter. [`sim`] executes the same unit natively, decoding the
//! serialized bytecode through the unit's opcode map, so behavior can be
//! checked without a Lua host.

pub mod codegen;
pub mod error;
pub mod sim;

pub use codegen::generate;
pub use error::{SimError, SimResult};
pub use sim::base::{capture_print, install_base};
pub use sim::{Execution, Machine, Value};
