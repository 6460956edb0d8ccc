//! Function prototypes, the constant pool and the compiled unit.

use crate::opcode::{encode, Instruction, OpcodeMap};
use indexmap::IndexMap;
use vexile_core::cipher::{self, CipherKey};

/// A constant pool entry. Booleans are loaded with `LOADBOOL` and never
/// enter the pool. `Nil` backs explicit `nil` literals; the interpreter
/// stores it as a sentinel so the constants array keeps its indices.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Nil,
    Number(f64),
    String(String),
    /// String ciphertext, decrypted by the generated interpreter at load time.
    Encrypted { bytes: Vec<u8>, key: CipherKey },
}

impl Constant {
    /// Plaintext bytes of a string constant, decrypting when needed.
    pub fn string_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Constant::String(s) => Some(s.as_bytes().to_vec()),
            Constant::Encrypted { bytes, key } => Some(cipher::decrypt(bytes, *key)),
            _ => None,
        }
    }
}

/// Dedup key: numbers compare by bit pattern, strings by plaintext.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum PoolKey {
    Nil,
    Number(u64),
    String(String),
}

/// Constants shared by every prototype of a unit, indexed from 1. Insertion
/// order is the pool order.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    entries: IndexMap<PoolKey, Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 1-based lookup.
    pub fn get(&self, index: u32) -> Option<&Constant> {
        let i = usize::try_from(index).ok()?.checked_sub(1)?;
        self.entries.get_index(i).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.values()
    }

    pub fn add_nil(&mut self) -> u32 {
        self.insert(PoolKey::Nil, || Constant::Nil)
    }

    pub fn add_number(&mut self, n: f64) -> u32 {
        self.insert(PoolKey::Number(n.to_bits()), || Constant::Number(n))
    }

    /// Add a string, encrypting it with a key from `key_for` on first
    /// insertion. The closure is not called for a string already present.
    pub fn add_string(&mut self, s: &str, key_for: impl FnOnce() -> Option<CipherKey>) -> u32 {
        self.insert(PoolKey::String(s.to_string()), || match key_for() {
            Some(key) => Constant::Encrypted {
                bytes: cipher::encrypt(s.as_bytes(), key),
                key,
            },
            None => Constant::String(s.to_string()),
        })
    }

    fn insert(&mut self, key: PoolKey, make: impl FnOnce() -> Constant) -> u32 {
        let index = match self.entries.get_index_of(&key) {
            Some(index) => index,
            None => self.entries.insert_full(key, make()).0,
        };
        index as u32 + 1
    }

    pub fn has_encrypted(&self) -> bool {
        self.entries
            .values()
            .any(|c| matches!(c, Constant::Encrypted { .. }))
    }
}

/// A compiled function body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Proto {
    pub code: Vec<Instruction>,
    pub num_params: u16,
    pub is_vararg: bool,
    /// Highest register index used plus one.
    pub max_stack: u16,
    /// Diagnostic name (`main`, a function path, or `anonymous`).
    pub name: String,
}

impl Proto {
    pub fn new(name: impl Into<String>) -> Self {
        Proto {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn emit(&mut self, inst: Instruction) -> usize {
        self.code.push(inst);
        self.code.len() - 1
    }
}

/// Output of the bytecode compiler and sole input of the VM generator.
/// `protos[0]` is the main chunk; `CLOSURE` operands index into `protos`.
#[derive(Clone, Debug)]
pub struct CompiledUnit {
    pub protos: Vec<Proto>,
    pub constants: ConstantPool,
    pub opcode_map: OpcodeMap,
}

impl CompiledUnit {
    pub fn main(&self) -> &Proto {
        &self.protos[0]
    }

    /// Instructions of the main chunk.
    pub fn instructions(&self) -> &[Instruction] {
        &self.main().code
    }

    pub fn instruction_count(&self) -> usize {
        self.protos.iter().map(|p| p.code.len()).sum()
    }

    /// Serialized bytecode of every prototype, in `protos` order.
    pub fn serialize(&self) -> Vec<Vec<u8>> {
        self.protos
            .iter()
            .map(|p| encode(&p.code, &self.opcode_map))
            .collect()
    }
}
