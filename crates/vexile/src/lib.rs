//! Vexile: protect Lua-family scripts.
//!
//! The pipeline strips comments, weaves anti-tamper probes and junk code in
//! front of the user's code, compiles everything to bytecode under a fresh
//! opcode map, emits an interpreter for that bytecode and wraps it in an
//! environment bridge. [`compile_and_protect`] is the one-call entry point;
//! [`Protector`] adds seeds, tuning overrides and access to the compiled unit.

pub mod bridge;
pub mod config;
pub mod protector;

pub use protector::{js_watermark, lua_watermark, Artifact, Protector};
pub use vexile_compiler::{CompileError, SyntaxError};
pub use vexile_core::{Engine, ObfuscationSettings, Preset, Tuning};

/// Protect `source` for `engine` under `preset`. `custom` is read only for
/// [`Preset::Custom`], which requires it.
pub fn compile_and_protect(
    source: &str,
    engine: Engine,
    preset: Preset,
    custom: Option<ObfuscationSettings>,
) -> Result<String, CompileError> {
    Protector::new(engine, preset, custom)?.protect(source)
}
