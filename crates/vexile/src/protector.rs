//! The protection pipeline.

use crate::bridge;
use tracing::{debug, info_span};
use vexile_compiler::compiler::{compile, CompileOptions};
use vexile_compiler::parser::Parser;
use vexile_compiler::proto::CompiledUnit;
use vexile_compiler::{strip_comments, tokenize, CompileError};
use vexile_core::{seeded, Engine, ObfuscationSettings, Preset, Tuning, VERSION};
use vexile_transform::{antitamper, bomb, deadcode, minify, strcrypt, strip_js_comments, trim_lines, Weaver};

type CompileResult<T> = Result<T, CompileError>;

/// Watermark that opens every Lua artifact.
pub fn lua_watermark() -> String {
    format!("--[[ Protected with Vexile v{VERSION} ]]")
}

/// Watermark that opens every JavaScript artifact.
pub fn js_watermark() -> String {
    format!("/* Protected with Vexile v{VERSION} */")
}

/// Result of one protect call.
#[derive(Clone, Debug)]
pub struct Artifact {
    /// Final text, watermark first.
    pub text: String,
    /// The unit behind the embedded interpreter, when the VM path ran.
    pub unit: Option<CompiledUnit>,
    /// Anti-tamper, dead code and user code as they were compiled or inlined.
    pub full_source: String,
}

/// Configured protector. Reusable: every call draws a fresh generator from
/// the seed (or from OS entropy when there is none).
#[derive(Clone, Debug)]
pub struct Protector {
    engine: Engine,
    settings: ObfuscationSettings,
    tuning: Tuning,
    seed: Option<u64>,
}

impl Protector {
    /// Resolve `preset` to its settings and tuning. `Preset::Custom` needs a
    /// settings record.
    pub fn new(
        engine: Engine,
        preset: Preset,
        custom: Option<ObfuscationSettings>,
    ) -> CompileResult<Self> {
        let settings = preset.resolve(custom).ok_or_else(|| {
            CompileError::InvalidOptions("preset Custom requires a settings record".into())
        })?;
        Ok(Protector::with_settings(engine, settings, Tuning::for_preset(preset)))
    }

    pub fn with_settings(engine: Engine, settings: ObfuscationSettings, tuning: Tuning) -> Self {
        Protector {
            engine,
            settings,
            tuning,
            seed: None,
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn settings(&self) -> &ObfuscationSettings {
        &self.settings
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn protect(&self, source: &str) -> CompileResult<String> {
        self.build(source).map(|artifact| artifact.text)
    }

    pub fn build(&self, source: &str) -> CompileResult<Artifact> {
        let _span = info_span!("protect", engine = %self.engine).entered();
        let artifact = match self.engine {
            Engine::JavaScript => Artifact {
                text: format!("{}\n{}", js_watermark(), trim_lines(&strip_js_comments(source))),
                unit: None,
                full_source: String::new(),
            },
            Engine::LuaU => self.build_lua(source)?,
        };
        let size = artifact.text.len();
        if size > self.tuning.max_output_bytes {
            return Err(CompileError::OutputTooLarge {
                size,
                limit: self.tuning.max_output_bytes,
            });
        }
        debug!(bytes = size, "artifact ready");
        Ok(artifact)
    }

    fn build_lua(&self, source: &str) -> CompileResult<Artifact> {
        let s = &self.settings;
        let mut rng = seeded(self.seed);
        let user = strip_comments(source);
        let chunk = self.parse(&user)?;
        debug!(statements = chunk.body.len(), "parsed user code");

        let mut w = Weaver::new(&mut rng, self.tuning.clone());
        w.reserve_identifiers(&chunk);

        let prologue = if s.parser_bomb { bomb::generate(&mut w) } else { String::new() };
        let mut full_source = String::new();
        if s.anti_tamper || s.anti_tamper_plus {
            full_source.push_str(&antitamper::weave(&mut w, s.anti_tamper_plus).source);
        }
        if s.dead_code {
            full_source.push_str(&deadcode::generate(&mut w));
        }

        let (body, unit) = if s.vm_compiler {
            full_source.push_str(&user);
            let full = self.parse(&full_source)?;
            let options = CompileOptions::new(s, &self.tuning);
            let unit = compile(&full, &options, w.rng())?;
            let body = vexile_vm::generate(&unit, s, &mut w);
            (body, Some(unit))
        } else {
            let mut body = bridge::raw_prologue(&mut w);
            if s.string_encryption {
                let decrypt = w.fresh_name();
                body.push_str(&strcrypt::decryptor_source(&decrypt, self.tuning.cipher));
                let (user, _) = strcrypt::encrypt_literals(&user, &decrypt, self.tuning.cipher, w.rng());
                full_source.push_str(&user);
            } else {
                full_source.push_str(&user);
            }
            body.push_str(&full_source);
            (body, None)
        };

        let mut text = bridge::wrap(&mut w, &prologue, &body);
        if s.minifier {
            text = minify(&text);
        }
        debug!(
            names = w.names().issued().len(),
            vm = unit.is_some(),
            "assembled lua artifact"
        );
        Ok(Artifact {
            text: format!("{}\n{}", lua_watermark(), text),
            unit,
            full_source,
        })
    }

    fn parse(&self, source: &str) -> CompileResult<vexile_compiler::ast::Chunk> {
        Ok(Parser::new(tokenize(source))
            .with_max_depth(self.tuning.max_parse_depth)
            .parse_chunk()?)
    }
}
