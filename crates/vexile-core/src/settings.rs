//! Engines, presets and the seven protection switches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target host language of the artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    /// Luau / Lua 5.1 family. The only engine that gets virtualized.
    #[default]
    #[serde(rename = "LuaU", alias = "luau", alias = "Luau")]
    LuaU,
    /// JavaScript hosts receive a comment-stripped copy under a watermark.
    #[serde(rename = "JavaScript", alias = "javascript", alias = "js")]
    JavaScript,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::LuaU => write!(f, "LuaU"),
            Engine::JavaScript => write!(f, "JavaScript"),
        }
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "luau" | "lua" => Ok(Engine::LuaU),
            "javascript" | "js" => Ok(Engine::JavaScript),
            other => Err(format!("unknown engine '{other}' (expected LuaU or JavaScript)")),
        }
    }
}

/// Named protection level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    Fast,
    Medium,
    #[default]
    High,
    /// Deterministic-friendly preset: no junk code, inert crash routine.
    Test,
    /// Settings come verbatim from a caller-supplied record.
    Custom,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Fast,
        Preset::Medium,
        Preset::High,
        Preset::Test,
        Preset::Custom,
    ];

    /// Resolve the switches for this preset. `Custom` returns `custom` as given;
    /// named presets ignore it.
    pub fn resolve(self, custom: Option<ObfuscationSettings>) -> Option<ObfuscationSettings> {
        match self {
            Preset::Custom => custom,
            named => Some(named.settings()),
        }
    }

    /// The fixed preset table. `Custom` maps to the `High` record here; callers
    /// that mean "custom" go through [`Preset::resolve`].
    pub fn settings(self) -> ObfuscationSettings {
        match self {
            Preset::High | Preset::Medium | Preset::Custom => ObfuscationSettings {
                string_encryption: true,
                anti_tamper: true,
                anti_tamper_plus: false,
                dead_code: true,
                vm_compiler: true,
                parser_bomb: true,
                minifier: true,
            },
            Preset::Fast | Preset::Test => ObfuscationSettings {
                string_encryption: false,
                anti_tamper: true,
                anti_tamper_plus: false,
                dead_code: true,
                vm_compiler: true,
                parser_bomb: false,
                minifier: true,
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Fast => "Fast",
            Preset::Medium => "Medium",
            Preset::High => "High",
            Preset::Test => "Test",
            Preset::Custom => "Custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Preset::Fast),
            "medium" => Ok(Preset::Medium),
            "high" => Ok(Preset::High),
            "test" => Ok(Preset::Test),
            "custom" => Ok(Preset::Custom),
            other => Err(format!(
                "unknown preset '{other}' (expected Fast, Medium, High, Test or Custom)"
            )),
        }
    }
}

/// The externally visible configuration surface. Immutable for one compile call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObfuscationSettings {
    pub string_encryption: bool,
    pub anti_tamper: bool,
    /// Re-arms the anti-tamper probes on a recurring timer.
    pub anti_tamper_plus: bool,
    pub dead_code: bool,
    pub vm_compiler: bool,
    pub parser_bomb: bool,
    pub minifier: bool,
}

impl ObfuscationSettings {
    /// Every switch on.
    pub fn all() -> Self {
        ObfuscationSettings {
            string_encryption: true,
            anti_tamper: true,
            anti_tamper_plus: true,
            dead_code: true,
            vm_compiler: true,
            parser_bomb: true,
            minifier: true,
        }
    }

    /// Whether any anti-tamper probes are woven in.
    pub fn wants_probes(&self) -> bool {
        self.anti_tamper || self.anti_tamper_plus
    }
}
