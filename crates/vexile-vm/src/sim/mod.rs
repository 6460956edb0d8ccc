//! Reference simulator.
//!
//! Executes a [`CompiledUnit`] the way the generated interpreter does: the
//! serialized bytecode is decoded through the unit's opcode map, registers
//! are 0-based per frame, and globals live in an explicit environment table.
//! Tests use it to check that protected programs behave like the originals.

pub mod base;
pub mod value;

pub use value::{fmt_number, Function, Table, TableRef, Value};

use crate::error::{SimError, SimResult};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;
use vexile_compiler::opcode::{decode, Instruction, OpCode};
use vexile_compiler::proto::{CompiledUnit, Constant};

/// Default instruction budget per run.
pub const DEFAULT_STEP_LIMIT: u64 = 5_000_000;
/// Nested call limit.
pub const MAX_CALL_DEPTH: usize = 200;

struct SimProto {
    code: Rc<[Instruction]>,
    num_params: usize,
    is_vararg: bool,
}

/// Outcome of running the main chunk.
#[derive(Debug)]
pub struct Execution {
    /// Values returned by the main chunk.
    pub results: Vec<Value>,
    /// Main chunk registers when it returned.
    pub registers: Vec<Value>,
}

#[derive(Default)]
struct Frame {
    regs: Vec<Value>,
    top: usize,
    varargs: Vec<Value>,
}

impl Frame {
    fn get(&self, r: usize) -> Value {
        self.regs.get(r).cloned().unwrap_or_default()
    }

    fn set(&mut self, r: usize, v: Value) {
        if r >= self.regs.len() {
            self.regs.resize(r + 1, Value::Nil);
        }
        self.regs[r] = v;
    }
}

pub struct Machine {
    protos: Vec<SimProto>,
    constants: Vec<Value>,
    env: TableRef,
    steps: u64,
    step_limit: u64,
    depth: usize,
}

impl Machine {
    /// Decode every prototype of `unit` from its serialized form.
    pub fn new(unit: &CompiledUnit) -> SimResult<Self> {
        let mut protos = Vec::with_capacity(unit.protos.len());
        for (index, (proto, bytes)) in unit.protos.iter().zip(unit.serialize()).enumerate() {
            let code = decode(&bytes, &unit.opcode_map).ok_or(SimError::Decode(index))?;
            protos.push(SimProto {
                code: code.into(),
                num_params: usize::from(proto.num_params),
                is_vararg: proto.is_vararg,
            });
        }
        let constants = unit
            .constants
            .iter()
            .map(|k| match k {
                Constant::Nil => Value::Nil,
                Constant::Number(n) => Value::Number(*n),
                Constant::String(_) | Constant::Encrypted { .. } => {
                    Value::bytes(&k.string_bytes().unwrap_or_default())
                }
            })
            .collect();
        Ok(Machine {
            protos,
            constants,
            env: Rc::new(RefCell::new(Table::new())),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            depth: 0,
        })
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn env(&self) -> &TableRef {
        &self.env
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.env.borrow_mut().set_str(name, value);
    }

    pub fn global(&self, name: &str) -> Value {
        self.env.borrow().get_str(name)
    }

    /// Run the main chunk with no arguments.
    pub fn run(&mut self) -> SimResult<Execution> {
        self.steps = 0;
        let mut frame = self.frame(0, Vec::new());
        let results = self.execute(0, &mut frame)?;
        Ok(Execution {
            results,
            registers: frame.regs,
        })
    }

    /// Call any function value.
    pub fn call(&mut self, f: &Value, args: Vec<Value>) -> SimResult<Vec<Value>> {
        match f {
            Value::Function(Function::Native(native)) => {
                let native = native.clone();
                native(self, args)
            }
            Value::Function(Function::Closure(proto)) => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(SimError::StackOverflow);
                }
                let proto = **proto;
                let mut frame = self.frame(proto, args);
                self.depth += 1;
                let result = self.execute(proto, &mut frame);
                self.depth -= 1;
                result
            }
            other => Err(SimError::runtime(format!(
                "attempt to call a {} value",
                other.type_name()
            ))),
        }
    }

    /// `t[k]`, following `__index` on tables and the `string` library on
    /// strings.
    pub fn index(&mut self, t: &Value, k: &Value) -> SimResult<Value> {
        match t {
            Value::Table(table) => {
                let (raw, meta) = {
                    let table = table.borrow();
                    (table.get(k), table.meta.clone())
                };
                if !raw.is_nil() {
                    return Ok(raw);
                }
                let handler = match meta {
                    Some(meta) => meta.borrow().get_str("__index"),
                    None => return Ok(Value::Nil),
                };
                match handler {
                    Value::Nil => Ok(Value::Nil),
                    Value::Function(_) => {
                        let r = self.call(&handler, vec![t.clone(), k.clone()])?;
                        Ok(r.into_iter().next().unwrap_or_default())
                    }
                    other => self.index(&other, k),
                }
            }
            Value::Str(_) => {
                let lib = self.global("string");
                match lib {
                    Value::Table(_) => self.index(&lib, k),
                    _ => Err(SimError::runtime("attempt to index a string value")),
                }
            }
            other => Err(SimError::runtime(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    fn frame(&self, proto: usize, mut args: Vec<Value>) -> Frame {
        let (num_params, is_vararg) = self
            .protos
            .get(proto)
            .map_or((0, false), |p| (p.num_params, p.is_vararg));
        let varargs = if is_vararg && args.len() > num_params {
            args.split_off(num_params)
        } else {
            Vec::new()
        };
        args.resize(num_params, Value::Nil);
        Frame {
            regs: args,
            top: 0,
            varargs,
        }
    }

    fn tick(&mut self) -> SimResult<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(SimError::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn constant(&self, index: u16) -> SimResult<Value> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.constants.get(i))
            .cloned()
            .ok_or_else(|| SimError::runtime(format!("constant {index} out of range")))
    }

    fn execute(&mut self, proto: usize, f: &mut Frame) -> SimResult<Vec<Value>> {
        let code = match self.protos.get(proto) {
            Some(p) => p.code.clone(),
            None => return Err(SimError::runtime(format!("no prototype {proto}"))),
        };
        let mut pc = 0usize;
        while let Some(&inst) = code.get(pc) {
            self.tick()?;
            trace!(proto, pc, %inst, "step");
            pc += 1;
            let (a, b, c) = (usize::from(inst.a), usize::from(inst.b), usize::from(inst.c));
            match inst.op {
                OpCode::Move => f.set(a, f.get(b)),
                OpCode::LoadK => f.set(a, self.constant(inst.b)?),
                OpCode::LoadBool => f.set(a, Value::Bool(b != 0)),
                OpCode::LoadNil => {
                    for r in a..=a + b {
                        f.set(r, Value::Nil);
                    }
                }
                OpCode::GetGlobal => {
                    let key = self.constant(inst.b)?;
                    let env = Value::Table(self.env.clone());
                    let v = self.index(&env, &key)?;
                    f.set(a, v);
                }
                OpCode::SetGlobal => {
                    let key = self.constant(inst.b)?;
                    self.env.borrow_mut().set(key, f.get(a));
                }
                OpCode::GetTable => {
                    let v = self.index(&f.get(b), &f.get(c))?;
                    f.set(a, v);
                }
                OpCode::SetTable => store(&f.get(a), f.get(b), f.get(c))?,
                OpCode::NewTable => f.set(a, Value::table(Table::new())),
                OpCode::SetList => {
                    let n = if b == 0 { f.top.saturating_sub(a + 1) } else { b };
                    let t = f.get(a);
                    for k in 1..=n {
                        store(&t, Value::Number((c + k - 1) as f64), f.get(a + k))?;
                    }
                }
                OpCode::Call => {
                    let n = if b == 0 { f.top.saturating_sub(a + 1) } else { b - 1 };
                    let args: Vec<Value> = (1..=n).map(|k| f.get(a + k)).collect();
                    let results = self.call(&f.get(a), args)?;
                    if c == 0 {
                        f.top = a + results.len();
                        for (k, v) in results.into_iter().enumerate() {
                            f.set(a + k, v);
                        }
                    } else {
                        let mut results = results.into_iter();
                        for k in 0..c - 1 {
                            f.set(a + k, results.next().unwrap_or_default());
                        }
                    }
                }
                OpCode::Return => {
                    let n = if b == 0 { f.top.saturating_sub(a) } else { b - 1 };
                    return Ok((0..n).map(|k| f.get(a + k)).collect());
                }
                OpCode::Closure => {
                    if b >= self.protos.len() {
                        return Err(SimError::runtime(format!("no prototype {b}")));
                    }
                    f.set(a, Value::Function(Function::Closure(Rc::new(b))));
                }
                OpCode::VarArg => {
                    let n = if b == 0 {
                        f.top = a + f.varargs.len();
                        f.varargs.len()
                    } else {
                        b - 1
                    };
                    for k in 0..n {
                        let v = f.varargs.get(k).cloned().unwrap_or_default();
                        f.set(a + k, v);
                    }
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod | OpCode::Pow => {
                    let v = arith(inst.op, &f.get(b), &f.get(c))?;
                    f.set(a, Value::Number(v));
                }
                OpCode::Concat => {
                    let v = concat(&f.get(b), &f.get(c))?;
                    f.set(a, v);
                }
                OpCode::Unm => {
                    let v = f.get(b);
                    let n = v.as_number().ok_or_else(|| arith_error(&v))?;
                    f.set(a, Value::Number(-n));
                }
                OpCode::Not => f.set(a, Value::Bool(!f.get(b).truthy())),
                OpCode::Len => {
                    let n = match f.get(b) {
                        Value::Str(s) => s.len(),
                        Value::Table(t) => t.borrow().len(),
                        other => {
                            return Err(SimError::runtime(format!(
                                "attempt to get length of a {} value",
                                other.type_name()
                            )))
                        }
                    };
                    f.set(a, Value::Number(n as f64));
                }
                OpCode::Eq => f.set(a, Value::Bool(f.get(b) == f.get(c))),
                OpCode::Lt => f.set(a, Value::Bool(less(&f.get(b), &f.get(c), false)?)),
                OpCode::Le => f.set(a, Value::Bool(less(&f.get(b), &f.get(c), true)?)),
                OpCode::Jmp => pc = jump(pc, &inst)?,
                OpCode::Test => {
                    if f.get(a).truthy() == (c != 0) {
                        pc = jump(pc, &inst)?;
                    }
                }
                OpCode::ForPrep => {
                    let (init, _, step) = for_numbers(f, a)?;
                    f.set(a, Value::Number(init - step));
                    pc = jump(pc, &inst)?;
                }
                OpCode::ForLoop => {
                    let (index, limit, step) = for_numbers(f, a)?;
                    let i = index + step;
                    f.set(a, Value::Number(i));
                    if (step > 0.0 && i <= limit) || (step <= 0.0 && i >= limit) {
                        f.set(a + 3, Value::Number(i));
                        pc = jump(pc, &inst)?;
                    }
                }
                OpCode::TForLoop => {
                    let results = self.call(&f.get(a), vec![f.get(a + 1), f.get(a + 2)])?;
                    let mut results = results.into_iter();
                    for k in 1..=c {
                        f.set(a + 2 + k, results.next().unwrap_or_default());
                    }
                    let control = f.get(a + 3);
                    if !control.is_nil() {
                        f.set(a + 2, control);
                        pc = jump(pc, &inst)?;
                    }
                }
            }
        }
        Ok(Vec::new())
    }
}

/// Target of a branch whose successor is `pc`.
fn jump(pc: usize, inst: &Instruction) -> SimResult<usize> {
    let target = pc as i64 + i64::from(inst.offset());
    usize::try_from(target).map_err(|_| SimError::runtime(format!("jump to {target}")))
}

fn store(t: &Value, key: Value, value: Value) -> SimResult<()> {
    match t {
        Value::Table(table) => {
            if key.is_nil() {
                return Err(SimError::runtime("table index is nil"));
            }
            if !table.borrow_mut().set(key, value) {
                return Err(SimError::runtime("table index is NaN"));
            }
            Ok(())
        }
        other => Err(SimError::runtime(format!(
            "attempt to index a {} value",
            other.type_name()
        ))),
    }
}

fn arith_error(v: &Value) -> SimError {
    SimError::runtime(format!(
        "attempt to perform arithmetic on a {} value",
        v.type_name()
    ))
}

fn arith(op: OpCode, l: &Value, r: &Value) -> SimResult<f64> {
    let x = l.as_number().ok_or_else(|| arith_error(l))?;
    let y = r.as_number().ok_or_else(|| arith_error(r))?;
    Ok(match op {
        OpCode::Add => x + y,
        OpCode::Sub => x - y,
        OpCode::Mul => x * y,
        OpCode::Div => x / y,
        OpCode::Mod => x - (x / y).floor() * y,
        _ => x.powf(y),
    })
}

fn concat(l: &Value, r: &Value) -> SimResult<Value> {
    let piece = |v: &Value| -> SimResult<Vec<u8>> {
        match v {
            Value::Str(s) => Ok(s.to_vec()),
            Value::Number(n) => Ok(fmt_number(*n).into_bytes()),
            other => Err(SimError::runtime(format!(
                "attempt to concatenate a {} value",
                other.type_name()
            ))),
        }
    };
    let mut out = piece(l)?;
    out.extend(piece(r)?);
    Ok(Value::bytes(&out))
}

fn less(l: &Value, r: &Value, or_equal: bool) -> SimResult<bool> {
    match (l, r) {
        (Value::Number(x), Value::Number(y)) => Ok(if or_equal { x <= y } else { x < y }),
        (Value::Str(x), Value::Str(y)) => Ok(if or_equal { x <= y } else { x < y }),
        _ => Err(SimError::runtime(format!(
            "attempt to compare {} with {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn for_numbers(f: &Frame, a: usize) -> SimResult<(f64, f64, f64)> {
    let num = |r: usize, what: &str| {
        f.get(r)
            .as_number()
            .ok_or_else(|| SimError::runtime(format!("'for' {what} must be a number")))
    };
    Ok((num(a, "initial value")?, num(a + 1, "limit")?, num(a + 2, "step")?))
}
