//! Runtime values of the reference simulator.

use crate::error::{SimError, SimResult};
use crate::sim::Machine;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type TableRef = Rc<RefCell<Table>>;

/// Native function signature. Arguments arrive by value; results are
/// returned as a list.
pub type NativeFn = dyn Fn(&mut Machine, Vec<Value>) -> SimResult<Vec<Value>>;

/// A function value. Closures carry the index of their prototype; a fresh
/// allocation per `CLOSURE` gives each one its own identity.
#[derive(Clone)]
pub enum Function {
    Native(Rc<NativeFn>),
    Closure(Rc<usize>),
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<[u8]>),
    Table(TableRef),
    Function(Function),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s.as_bytes()))
    }

    pub fn bytes(b: &[u8]) -> Value {
        Value::Str(Rc::from(b))
    }

    pub fn table(t: Table) -> Value {
        Value::Table(Rc::new(RefCell::new(t)))
    }

    pub fn native<F>(f: F) -> Value
    where
        F: Fn(&mut Machine, Vec<Value>) -> SimResult<Vec<Value>> + 'static,
    {
        Value::Function(Function::Native(Rc::new(f)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Everything except `nil` and `false` is true.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => std::str::from_utf8(s).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used by `tostring` and concatenation.
    pub fn to_display(&self) -> String {
        match self {
            Value::Nil => "nil".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => fmt_number(*n),
            Value::Str(s) => String::from_utf8_lossy(s).into_owned(),
            Value::Table(t) => format!("table: {:p}", Rc::as_ptr(t)),
            Value::Function(Function::Native(f)) => format!("builtin: {:p}", Rc::as_ptr(f)),
            Value::Function(Function::Closure(c)) => format!("function: {:p}", Rc::as_ptr(c)),
        }
    }
}

/// Raw equality: by value for scalars and strings, by identity otherwise.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(Function::Native(a)), Value::Function(Function::Native(b))) => {
                Rc::ptr_eq(a, b)
            }
            (Value::Function(Function::Closure(a)), Value::Function(Function::Closure(b))) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            other => f.write_str(&other.to_display()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

/// `%.14g`-style: integral values print without a fraction.
pub fn fmt_number(n: f64) -> String {
    if n.is_nan() {
        "nan".into()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.into()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Hashable identity of a table key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Key {
    Bool(bool),
    Number(u64),
    Str(Rc<[u8]>),
    Ref(usize),
}

impl Key {
    /// `None` for keys Lua rejects (`nil`, NaN).
    fn of(v: &Value) -> Option<Key> {
        Some(match v {
            Value::Nil => return None,
            Value::Bool(b) => Key::Bool(*b),
            Value::Number(n) if n.is_nan() => return None,
            // 0.0 and -0.0 are the same key.
            Value::Number(n) => Key::Number((n + 0.0).to_bits()),
            Value::Str(s) => Key::Str(s.clone()),
            Value::Table(t) => Key::Ref(Rc::as_ptr(t) as *const () as usize),
            Value::Function(Function::Native(f)) => Key::Ref(Rc::as_ptr(f) as *const () as usize),
            Value::Function(Function::Closure(c)) => Key::Ref(Rc::as_ptr(c) as usize),
        })
    }
}

/// A table with insertion-ordered traversal. Assigning `nil` leaves a
/// tombstone so `next` keeps working while a loop clears fields.
#[derive(Default)]
pub struct Table {
    entries: IndexMap<Key, (Value, Value)>,
    pub meta: Option<TableRef>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional constructor, keys from 1.
    pub fn from_list(items: impl IntoIterator<Item = Value>) -> Self {
        let mut t = Table::new();
        for (i, v) in items.into_iter().enumerate() {
            t.entries
                .insert(Key::Number(((i + 1) as f64).to_bits()), (Value::Number((i + 1) as f64), v));
        }
        t
    }

    pub fn get(&self, key: &Value) -> Value {
        Key::of(key)
            .and_then(|k| self.entries.get(&k))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.get(&Value::str(key))
    }

    /// Raw store. Returns `false` for an invalid key.
    pub fn set(&mut self, key: Value, value: Value) -> bool {
        let Some(k) = Key::of(&key) else {
            return false;
        };
        match self.entries.get_mut(&k) {
            Some(slot) => slot.1 = value,
            None if value.is_nil() => {}
            None => {
                self.entries.insert(k, (key, value));
            }
        }
        true
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        self.set(Value::str(key), value);
    }

    /// Border: the last `n` such that `t[1..=n]` are all non-nil.
    pub fn len(&self) -> usize {
        let mut n = 0;
        while !self.get(&Value::Number((n + 1) as f64)).is_nil() {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry after `key` in traversal order (`nil` starts), skipping
    /// tombstones.
    pub fn next(&self, key: &Value) -> SimResult<Option<(Value, Value)>> {
        let start = if key.is_nil() {
            0
        } else {
            Key::of(key)
                .and_then(|k| self.entries.get_index_of(&k))
                .ok_or_else(|| SimError::runtime("invalid key to 'next'"))?
                + 1
        };
        Ok(self
            .entries
            .values()
            .skip(start)
            .find(|(_, v)| !v.is_nil())
            .cloned())
    }
}
