//! `vexile.toml` configuration.
//!
//! ```toml
//! engine = "LuaU"
//! preset = "Custom"
//! seed = 1234
//!
//! [custom]
//! vmCompiler = true
//! deadCode = true
//!
//! [tuning]
//! dead_code_statements = 300
//! intensity = 0.5
//! ```

use serde::Deserialize;
use vexile_core::{CipherLayers, CrashRoutine, Engine, NameStyle, ObfuscationSettings, Preset, Tuning};

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "vexile.toml";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub engine: Option<Engine>,
    pub preset: Option<Preset>,
    pub seed: Option<u64>,
    pub custom: Option<ObfuscationSettings>,
    pub tuning: TuningPatch,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Partial [`Tuning`]: present fields replace the preset's defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningPatch {
    pub dead_code_statements: Option<usize>,
    pub parser_bomb_depth: Option<usize>,
    pub cipher: Option<CipherLayers>,
    pub crash: Option<CrashRoutine>,
    pub names: Option<NameStyle>,
    pub name_length: Option<usize>,
    pub intensity: Option<f64>,
    pub max_output_bytes: Option<usize>,
    pub max_parse_depth: Option<usize>,
    pub rearm_seconds: Option<u32>,
}

impl TuningPatch {
    pub fn apply(&self, mut t: Tuning) -> Tuning {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { t.$field = v; })*
            };
        }
        overlay!(
            dead_code_statements,
            parser_bomb_depth,
            cipher,
            crash,
            names,
            name_length,
            intensity,
            max_output_bytes,
            max_parse_depth,
            rearm_seconds
        );
        t
    }
}
