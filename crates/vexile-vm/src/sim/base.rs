//! The slice of the host's base library that protected programs and the
//! injected probes use. `print` is left to the embedder so tests can
//! capture output, and `debug` is absent.

use super::{fmt_number, Machine, Table, TableRef, Value};
use crate::error::{SimError, SimResult};
use std::rc::Rc;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn check_table(args: &[Value], i: usize, fname: &str) -> SimResult<TableRef> {
    match args.get(i) {
        Some(Value::Table(t)) => Ok(t.clone()),
        other => Err(SimError::runtime(format!(
            "bad argument #{} to '{fname}' (table expected, got {})",
            i + 1,
            other.map_or("no value", Value::type_name)
        ))),
    }
}

fn check_number(args: &[Value], i: usize, fname: &str) -> SimResult<f64> {
    arg(args, i).as_number().ok_or_else(|| {
        SimError::runtime(format!("bad argument #{} to '{fname}' (number expected)", i + 1))
    })
}

fn check_bytes(args: &[Value], i: usize, fname: &str) -> SimResult<Vec<u8>> {
    match arg(args, i) {
        Value::Str(s) => Ok(s.to_vec()),
        Value::Number(n) => Ok(fmt_number(n).into_bytes()),
        _ => Err(SimError::runtime(format!(
            "bad argument #{} to '{fname}' (string expected)",
            i + 1
        ))),
    }
}

/// 1-based, negative-from-end position into a string of `len` bytes.
fn str_index(i: f64, len: usize) -> i64 {
    let i = i as i64;
    if i < 0 {
        (len as i64 + i + 1).max(0)
    } else {
        i
    }
}

fn library(entries: Vec<(&str, Value)>) -> Value {
    let mut t = Table::new();
    for (name, f) in entries {
        t.set_str(name, f);
    }
    Value::table(t)
}

fn ipairs_step(_: &mut Machine, args: Vec<Value>) -> SimResult<Vec<Value>> {
    let t = check_table(&args, 0, "ipairs")?;
    let i = arg(&args, 1).as_number().unwrap_or(0.0) + 1.0;
    let v = t.borrow().get(&Value::Number(i));
    Ok(if v.is_nil() {
        vec![Value::Nil]
    } else {
        vec![Value::Number(i), v]
    })
}

fn next(_: &mut Machine, args: Vec<Value>) -> SimResult<Vec<Value>> {
    let t = check_table(&args, 0, "next")?;
    let entry = t.borrow().next(&arg(&args, 1))?;
    Ok(match entry {
        Some((k, v)) => vec![k, v],
        None => vec![Value::Nil],
    })
}

fn unpack(_: &mut Machine, args: Vec<Value>) -> SimResult<Vec<Value>> {
    let t = check_table(&args, 0, "unpack")?;
    let t = t.borrow();
    let from = arg(&args, 1).as_number().unwrap_or(1.0) as i64;
    let to = match arg(&args, 2).as_number() {
        Some(n) => n as i64,
        None => t.len() as i64,
    };
    Ok((from..=to).map(|i| t.get(&Value::Number(i as f64))).collect())
}

/// Install the base library into the machine's environment.
pub fn install_base(m: &mut Machine) {
    let env = m.env().clone();
    m.set_global("_G", Value::Table(env));

    m.set_global(
        "type",
        Value::native(|_, args| Ok(vec![Value::str(arg(&args, 0).type_name())])),
    );
    m.set_global(
        "tostring",
        Value::native(|_, args| Ok(vec![Value::str(&arg(&args, 0).to_display())])),
    );
    m.set_global(
        "tonumber",
        Value::native(|_, args| {
            Ok(vec![arg(&args, 0).as_number().map_or(Value::Nil, Value::Number)])
        }),
    );
    m.set_global(
        "rawget",
        Value::native(|_, args| {
            let t = check_table(&args, 0, "rawget")?;
            let v = t.borrow().get(&arg(&args, 1));
            Ok(vec![v])
        }),
    );
    m.set_global(
        "rawset",
        Value::native(|_, args| {
            let t = check_table(&args, 0, "rawset")?;
            if !t.borrow_mut().set(arg(&args, 1), arg(&args, 2)) {
                return Err(SimError::runtime("table index is nil"));
            }
            Ok(vec![Value::Table(t)])
        }),
    );
    m.set_global(
        "setmetatable",
        Value::native(|_, args| {
            let t = check_table(&args, 0, "setmetatable")?;
            let meta = match arg(&args, 1) {
                Value::Table(meta) => Some(meta),
                Value::Nil => None,
                _ => return Err(SimError::runtime("bad argument #2 to 'setmetatable'")),
            };
            let locked = t
                .borrow()
                .meta
                .as_ref()
                .is_some_and(|m| !m.borrow().get_str("__metatable").is_nil());
            if locked {
                return Err(SimError::runtime("cannot change a protected metatable"));
            }
            t.borrow_mut().meta = meta;
            Ok(vec![Value::Table(t)])
        }),
    );
    m.set_global(
        "getmetatable",
        Value::native(|_, args| {
            let meta = match arg(&args, 0) {
                Value::Table(t) => t.borrow().meta.clone(),
                _ => None,
            };
            Ok(vec![match meta {
                Some(meta) => {
                    let guard = meta.borrow().get_str("__metatable");
                    if guard.is_nil() {
                        Value::Table(meta)
                    } else {
                        guard
                    }
                }
                None => Value::Nil,
            }])
        }),
    );
    m.set_global(
        "select",
        Value::native(|_, mut args| {
            let n = arg(&args, 0);
            if n.as_str() == Some(&b"#"[..]) {
                return Ok(vec![Value::Number((args.len().saturating_sub(1)) as f64)]);
            }
            let count = args.len().saturating_sub(1) as i64;
            let i = check_number(&args, 0, "select")? as i64;
            let start = if i < 0 { count + i + 1 } else { i };
            if start < 1 {
                return Err(SimError::runtime("bad argument #1 to 'select' (index out of range)"));
            }
            let start = (start as usize).min(args.len());
            Ok(args.split_off(start))
        }),
    );
    m.set_global("next", Value::native(next));
    m.set_global(
        "pairs",
        Value::native(|m, args| {
            let t = check_table(&args, 0, "pairs")?;
            Ok(vec![m.global("next"), Value::Table(t), Value::Nil])
        }),
    );
    m.set_global(
        "ipairs",
        Value::native(|_, args| {
            let t = check_table(&args, 0, "ipairs")?;
            Ok(vec![Value::native(ipairs_step), Value::Table(t), Value::Number(0.0)])
        }),
    );
    m.set_global("unpack", Value::native(unpack));
    m.set_global(
        "error",
        Value::native(|_, args| Err(SimError::runtime(arg(&args, 0).to_display()))),
    );
    m.set_global(
        "pcall",
        Value::native(|m, mut args| {
            if args.is_empty() {
                return Err(SimError::runtime("bad argument #1 to 'pcall' (value expected)"));
            }
            let f = args.remove(0);
            match m.call(&f, args) {
                Ok(mut results) => {
                    results.insert(0, Value::Bool(true));
                    Ok(results)
                }
                Err(SimError::Runtime(msg)) => Ok(vec![Value::Bool(false), Value::str(&msg)]),
                Err(fatal) => Err(fatal),
            }
        }),
    );

    m.set_global("string", string_library());
    m.set_global(
        "table",
        library(vec![
            (
                "concat",
                Value::native(|_, args| {
                    let t = check_table(&args, 0, "concat")?;
                    let sep = match arg(&args, 1) {
                        Value::Nil => Vec::new(),
                        _ => check_bytes(&args, 1, "concat")?,
                    };
                    let t = t.borrow();
                    let mut out = Vec::new();
                    for i in 1..=t.len() {
                        if i > 1 {
                            out.extend_from_slice(&sep);
                        }
                        match t.get(&Value::Number(i as f64)) {
                            Value::Str(s) => out.extend_from_slice(&s),
                            Value::Number(n) => out.extend(fmt_number(n).into_bytes()),
                            other => {
                                return Err(SimError::runtime(format!(
                                    "invalid value (at index {i}) in table for 'concat' ({})",
                                    other.type_name()
                                )))
                            }
                        }
                    }
                    Ok(vec![Value::bytes(&out)])
                }),
            ),
            (
                "insert",
                Value::native(|_, args| {
                    let t = check_table(&args, 0, "insert")?;
                    let mut t = t.borrow_mut();
                    let n = t.len();
                    match args.len() {
                        2 => {
                            t.set(Value::Number((n + 1) as f64), arg(&args, 1));
                        }
                        3 => {
                            let pos = check_number(&args, 1, "insert")? as usize;
                            if pos < 1 || pos > n + 1 {
                                return Err(SimError::runtime(
                                    "bad argument #2 to 'insert' (position out of bounds)",
                                ));
                            }
                            for i in (pos..=n).rev() {
                                let v = t.get(&Value::Number(i as f64));
                                t.set(Value::Number((i + 1) as f64), v);
                            }
                            t.set(Value::Number(pos as f64), arg(&args, 2));
                        }
                        _ => return Err(SimError::runtime("wrong number of arguments to 'insert'")),
                    }
                    Ok(Vec::new())
                }),
            ),
            ("unpack", Value::native(unpack)),
        ]),
    );
    m.set_global(
        "math",
        library(vec![
            (
                "floor",
                Value::native(|_, args| Ok(vec![Value::Number(check_number(&args, 0, "floor")?.floor())])),
            ),
            (
                "max",
                Value::native(|_, args| {
                    let mut best = check_number(&args, 0, "max")?;
                    for i in 1..args.len() {
                        best = best.max(check_number(&args, i, "max")?);
                    }
                    Ok(vec![Value::Number(best)])
                }),
            ),
            (
                "min",
                Value::native(|_, args| {
                    let mut best = check_number(&args, 0, "min")?;
                    for i in 1..args.len() {
                        best = best.min(check_number(&args, i, "min")?);
                    }
                    Ok(vec![Value::Number(best)])
                }),
            ),
            ("huge", Value::Number(f64::INFINITY)),
        ]),
    );
}

fn string_library() -> Value {
    library(vec![
        (
            "char",
            Value::native(|_, args| {
                let mut out = Vec::with_capacity(args.len());
                for i in 0..args.len() {
                    let n = check_number(&args, i, "char")?;
                    if !(0.0..=255.0).contains(&n) {
                        return Err(SimError::runtime(format!(
                            "bad argument #{} to 'char' (value out of range)",
                            i + 1
                        )));
                    }
                    out.push(n as u8);
                }
                Ok(vec![Value::bytes(&out)])
            }),
        ),
        (
            "byte",
            Value::native(|_, args| {
                let s = check_bytes(&args, 0, "byte")?;
                let i = str_index(arg(&args, 1).as_number().unwrap_or(1.0), s.len());
                let j = str_index(arg(&args, 2).as_number().unwrap_or(i as f64), s.len());
                let i = i.max(1);
                let j = j.min(s.len() as i64);
                Ok((i..=j)
                    .map(|k| Value::Number(f64::from(s[(k - 1) as usize])))
                    .collect())
            }),
        ),
        (
            "len",
            Value::native(|_, args| Ok(vec![Value::Number(check_bytes(&args, 0, "len")?.len() as f64)])),
        ),
        (
            "sub",
            Value::native(|_, args| {
                let s = check_bytes(&args, 0, "sub")?;
                let i = str_index(arg(&args, 1).as_number().unwrap_or(1.0), s.len()).max(1);
                let j = str_index(arg(&args, 2).as_number().unwrap_or(-1.0), s.len())
                    .min(s.len() as i64);
                Ok(vec![if i > j {
                    Value::str("")
                } else {
                    Value::bytes(&s[(i - 1) as usize..j as usize])
                }])
            }),
        ),
        (
            "rep",
            Value::native(|_, args| {
                let s = check_bytes(&args, 0, "rep")?;
                let n = check_number(&args, 1, "rep")?.max(0.0) as usize;
                Ok(vec![Value::bytes(&s.repeat(n))])
            }),
        ),
        (
            "upper",
            Value::native(|_, args| Ok(vec![Value::bytes(&check_bytes(&args, 0, "upper")?.to_ascii_uppercase())])),
        ),
    ])
}

/// A native `print` that appends each line to `out`.
pub fn capture_print(m: &mut Machine, out: Rc<std::cell::RefCell<Vec<String>>>) {
    m.set_global(
        "print",
        Value::native(move |_, args| {
            let line: Vec<String> = args.iter().map(Value::to_display).collect();
            out.borrow_mut().push(line.join("\t"));
            Ok(Vec::new())
        }),
    );
}
