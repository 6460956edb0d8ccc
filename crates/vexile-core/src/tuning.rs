//! Intensity constants per preset.
//!
//! These are tunable data, not behavior: junk counts, bomb depth, cipher
//! layering, name style and the resource ceilings all live here.

use crate::settings::Preset;
use serde::{Deserialize, Serialize};

/// Deepest parser bomb we are willing to emit. Stock Lua refuses a chunk
/// once its parser nests past 200 C levels and the wrapper uses a few.
pub const MAX_BOMB_DEPTH: usize = 160;
/// Largest junk statement count after the intensity multiplier.
pub const MAX_DEAD_CODE: usize = 100_000;

/// Extra layers applied by the string cipher on top of the additive shift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherLayers {
    pub xor: bool,
    pub rotate: bool,
}

/// What the anti-tamper trap does when a probe fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrashRoutine {
    /// Spin forever. A protected call cannot catch it.
    #[default]
    Spin,
    /// Do nothing (test builds).
    Noop,
}

/// Alphabet for generated identifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameStyle {
    /// `aZqKfbWe`
    #[default]
    Alpha,
    /// `_0x4F2A`
    Hex,
    /// `IlI1lIl1lI`
    Confusable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Junk statements injected by the dead-code pass.
    pub dead_code_statements: usize,
    /// Nesting levels of the parser bomb.
    pub parser_bomb_depth: usize,
    pub cipher: CipherLayers,
    pub crash: CrashRoutine,
    pub names: NameStyle,
    /// Minimum length of generated identifiers (excluding any prefix).
    pub name_length: usize,
    /// Multiplier over junk count and bomb depth.
    pub intensity: f64,
    /// Absolute ceiling on the artifact size in bytes.
    pub max_output_bytes: usize,
    /// Nesting limit for the recursive-descent parser.
    pub max_parse_depth: usize,
    /// Re-arm period of the anti-tamper-plus timer, in seconds.
    pub rearm_seconds: u32,
}

impl Tuning {
    pub fn for_preset(preset: Preset) -> Self {
        let base = Tuning {
            dead_code_statements: 2400,
            parser_bomb_depth: 160,
            cipher: CipherLayers {
                xor: true,
                rotate: true,
            },
            crash: CrashRoutine::Spin,
            names: NameStyle::Confusable,
            name_length: 10,
            intensity: 1.0,
            max_output_bytes: 64 * 1024 * 1024,
            max_parse_depth: 200,
            rearm_seconds: 2,
        };
        match preset {
            Preset::High | Preset::Custom => base,
            Preset::Medium => Tuning {
                dead_code_statements: 1200,
                parser_bomb_depth: 120,
                cipher: CipherLayers {
                    xor: true,
                    rotate: false,
                },
                names: NameStyle::Hex,
                name_length: 5,
                ..base
            },
            Preset::Fast => Tuning {
                dead_code_statements: 24,
                parser_bomb_depth: 40,
                cipher: CipherLayers::default(),
                names: NameStyle::Alpha,
                name_length: 8,
                ..base
            },
            Preset::Test => Tuning {
                dead_code_statements: 0,
                parser_bomb_depth: 0,
                cipher: CipherLayers::default(),
                crash: CrashRoutine::Noop,
                names: NameStyle::Alpha,
                name_length: 8,
                ..base
            },
        }
    }

    /// Junk statement count after the intensity multiplier.
    pub fn dead_code_count(&self) -> usize {
        scaled(self.dead_code_statements, self.intensity, MAX_DEAD_CODE, "dead code")
    }

    /// Parser bomb depth after the intensity multiplier.
    pub fn bomb_depth(&self) -> usize {
        scaled(self.parser_bomb_depth, self.intensity, MAX_BOMB_DEPTH, "parser bomb depth")
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::for_preset(Preset::default())
    }
}

fn scaled(value: usize, intensity: f64, cap: usize, what: &str) -> usize {
    let intensity = if intensity.is_finite() && intensity > 0.0 {
        intensity
    } else {
        0.0
    };
    let n = (value as f64 * intensity).round();
    if n > cap as f64 {
        tracing::warn!(requested = n, cap, "{what} clamped");
        cap
    } else {
        n as usize
    }
}
