use indexmap::IndexSet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use vexile_compiler::parse_source;
use vexile_core::{CipherLayers, Preset, Tuning};
use vexile_transform::{antitamper, bomb, deadcode, strcrypt, Weaver};

/// Fragments produced by every pass for one user program.
pub struct Woven {
    pub user: IndexSet<String>,
    pub fragments: Vec<String>,
    pub issued: IndexSet<String>,
}

pub fn weave_all(src: &str, tuning: Tuning, seed: u64) -> Woven {
    let chunk = parse_source(src).expect("user program parses");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut w = Weaver::new(&mut rng, tuning);
    w.reserve_identifiers(&chunk);

    let mut fragments = Vec::new();
    fragments.push(bomb::generate(&mut w));
    fragments.push(antitamper::weave(&mut w, true).source);
    fragments.push(deadcode::generate(&mut w));
    let decrypt = w.fresh_name();
    fragments.push(strcrypt::decryptor_source(
        &decrypt,
        CipherLayers { xor: true, rotate: true },
    ));
    Woven {
        user: chunk.identifiers(),
        fragments,
        issued: w.names().issued().clone(),
    }
}

pub fn fast_tuning() -> Tuning {
    Tuning::for_preset(Preset::Fast)
}

/// Identifiers a fragment may use without having generated them.
pub const HOST_FIELDS: &[&str] = &[
    "char", "byte", "concat", "band", "bor", "bxor", "rshift", "lshift", "spawn", "wait",
    "s", "k", "x", "r", "o", "i", "v",
];
