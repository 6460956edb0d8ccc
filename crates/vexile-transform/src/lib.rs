//! Vexile transform passes.
//!
//! Each pass produces a self-contained Lua fragment. All of them draw names
//! and randomness from one [`Weaver`], so two passes never introduce the
//! same identifier and a seeded compile is reproducible.

pub mod antitamper;
pub mod bomb;
pub mod deadcode;
pub mod names;
pub mod numbers;
pub mod strcrypt;
pub mod text;

pub use names::{NameGen, BUILTIN_GLOBALS};
pub use numbers::{lua_number, obf_num};
pub use text::{minify, strip_js_comments, trim_lines};

use rand::Rng;
use vexile_compiler::ast::Chunk;
use vexile_core::Tuning;

/// Per-compile state shared by the passes.
pub struct Weaver<'r, R: Rng + ?Sized> {
    rng: &'r mut R,
    names: NameGen,
    tuning: Tuning,
}

impl<'r, R: Rng + ?Sized> Weaver<'r, R> {
    pub fn new(rng: &'r mut R, tuning: Tuning) -> Self {
        Weaver {
            rng,
            names: NameGen::new(tuning.names, tuning.name_length),
            tuning,
        }
    }

    /// Keep every identifier of `chunk` out of the fresh-name space.
    pub fn reserve_identifiers(&mut self, chunk: &Chunk) {
        self.names.reserve(chunk.identifiers());
    }

    pub fn reserve<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.reserve(names);
    }

    pub fn rng(&mut self) -> &mut R {
        &mut *self.rng
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn names(&self) -> &NameGen {
        &self.names
    }

    pub fn fresh_name(&mut self) -> String {
        self.names.fresh(&mut *self.rng)
    }

    pub fn num(&mut self, n: i64) -> String {
        obf_num(n, &mut *self.rng)
    }

    pub fn hidden(&mut self, s: &str) -> String {
        strcrypt::hidden_string(s, &mut *self.rng)
    }

    /// Always-true condition of the form `a + b == c`.
    pub fn opaque_predicate(&mut self) -> String {
        let a: i64 = self.rng.gen_range(0..100);
        let b: i64 = self.rng.gen_range(0..100);
        format!("({} + {} == {})", self.num(a), self.num(b), self.num(a + b))
    }
}
