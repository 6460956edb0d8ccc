//! Byte-level string cipher.
//!
//! Each byte at 1-based position `i` is optionally XORed and rotated, then
//! shifted by `key + i` modulo 256. It is an obfuscation dial, not a security
//! boundary. The Lua side of the decryptor is generated by the transform passes.

use crate::tuning::CipherLayers;
use rand::Rng;

/// Key material for one compile call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CipherKey {
    /// Additive shift, never zero.
    pub add: u8,
    /// XOR mask, zero when the layer is off.
    pub xor: u8,
    /// Left rotation in bits (1..=7), zero when the layer is off.
    pub rot: u32,
}

impl CipherKey {
    /// Additive-only key.
    pub fn additive(add: u8) -> Self {
        CipherKey { add, xor: 0, rot: 0 }
    }

    pub fn generate<R: Rng + ?Sized>(layers: CipherLayers, rng: &mut R) -> Self {
        CipherKey {
            add: rng.gen_range(1..=255),
            xor: if layers.xor { rng.gen_range(1..=255) } else { 0 },
            rot: if layers.rotate { rng.gen_range(1..=7) } else { 0 },
        }
    }

    pub fn has_xor(&self) -> bool {
        self.xor != 0
    }

    pub fn has_rotation(&self) -> bool {
        self.rot != 0
    }
}

/// Position term for 1-based index `i`.
fn position(i: usize) -> u8 {
    (i % 256) as u8
}

pub fn encrypt(plain: &[u8], key: CipherKey) -> Vec<u8> {
    plain
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let v = (b ^ key.xor).rotate_left(key.rot);
            v.wrapping_add(key.add).wrapping_add(position(i + 1))
        })
        .collect()
}

pub fn decrypt(cipher: &[u8], key: CipherKey) -> Vec<u8> {
    cipher
        .iter()
        .enumerate()
        .map(|(i, &e)| {
            let v = e.wrapping_sub(key.add).wrapping_sub(position(i + 1));
            v.rotate_right(key.rot) ^ key.xor
        })
        .collect()
}
