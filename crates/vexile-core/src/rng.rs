//! Per-compile random number generator.
//!
//! Every stage that needs randomness (identifier names, opcode permutation,
//! cipher keys, junk code) takes `&mut CompileRng` explicitly. Two compiles
//! never share a generator, and a fixed seed reproduces the artifact byte for byte.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub type CompileRng = StdRng;

/// Build the generator for one compile call. `None` draws a seed from OS entropy.
pub fn seeded(seed: Option<u64>) -> CompileRng {
    let seed = seed.unwrap_or_else(|| rand::rngs::OsRng.next_u64());
    tracing::debug!(seed, "compile rng seeded");
    StdRng::seed_from_u64(seed)
}
