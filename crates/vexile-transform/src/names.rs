//! Identifier randomizer.
//!
//! Every name a pass introduces comes from one [`NameGen`] per compile. A
//! candidate is rejected when it is a reserved word, a host global the
//! generated code relies on, a user identifier, or a name already handed out.

use indexmap::IndexSet;
use rand::seq::SliceRandom;
use rand::Rng;
use vexile_compiler::token::{is_keyword, RESERVED_EXTRA};
use vexile_core::NameStyle;

/// Host globals read by generated code. Fresh names never shadow them.
pub const BUILTIN_GLOBALS: &[&str] = &[
    "_G", "_VERSION", "assert", "bit32", "debug", "error", "getfenv", "getgenv",
    "getmetatable", "ipairs", "math", "next", "pairs", "pcall", "print", "rawequal",
    "rawget", "rawset", "select", "self", "setfenv", "setmetatable", "string", "table",
    "task", "tonumber", "tostring", "type", "typeof", "unpack", "warn", "xpcall",
];

const ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HEX: &[u8] = b"0123456789ABCDEF";
const CONFUSABLE: &[u8] = b"Il1";
const CONFUSABLE_LEAD: &[u8] = b"Il";

/// Rejected candidates tolerated before the generator lengthens its names.
const RETRIES_PER_LENGTH: usize = 16;

#[derive(Clone, Debug)]
pub struct NameGen {
    style: NameStyle,
    length: usize,
    reserved: IndexSet<String>,
    issued: IndexSet<String>,
}

impl NameGen {
    pub fn new(style: NameStyle, length: usize) -> Self {
        NameGen {
            style,
            length: length.max(1),
            reserved: IndexSet::new(),
            issued: IndexSet::new(),
        }
    }

    /// Names the generator must never produce (typically every identifier
    /// of the user program).
    pub fn reserve<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
    }

    pub fn is_available(&self, name: &str) -> bool {
        !(is_keyword(name)
            || RESERVED_EXTRA.contains(&name)
            || BUILTIN_GLOBALS.contains(&name)
            || self.reserved.contains(name)
            || self.issued.contains(name))
    }

    /// A name distinct from everything reserved or issued so far.
    pub fn fresh<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        let mut length = self.length;
        loop {
            for _ in 0..RETRIES_PER_LENGTH {
                let candidate = self.candidate(length, rng);
                if self.is_available(&candidate) {
                    self.issued.insert(candidate.clone());
                    return candidate;
                }
            }
            length += 1;
            tracing::trace!(length, "name space crowded, lengthening");
        }
    }

    /// Every name handed out by this generator, in issue order.
    pub fn issued(&self) -> &IndexSet<String> {
        &self.issued
    }

    fn candidate<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> String {
        let pick = |set: &[u8], rng: &mut R| char::from(*set.choose(rng).unwrap_or(&b'_'));
        match self.style {
            NameStyle::Alpha => (0..length).map(|_| pick(ALPHA, rng)).collect(),
            NameStyle::Hex => {
                let mut name = String::from("_0x");
                name.extend((0..length).map(|_| pick(HEX, rng)));
                name
            }
            NameStyle::Confusable => {
                let mut name = String::new();
                name.push(pick(CONFUSABLE_LEAD, rng));
                name.extend((1..length).map(|_| pick(CONFUSABLE, rng)));
                name
            }
        }
    }
}
