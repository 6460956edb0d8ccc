//! Vexile core types: engines, presets, obfuscation settings and intensity tuning.

pub mod cipher;
pub mod rng;
pub mod settings;
pub mod tuning;

pub use cipher::CipherKey;
pub use rng::{seeded, CompileRng};
pub use settings::{Engine, ObfuscationSettings, Preset};
pub use tuning::{CipherLayers, CrashRoutine, NameStyle, Tuning, MAX_BOMB_DEPTH};

/// Product version stamped into the watermark.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
