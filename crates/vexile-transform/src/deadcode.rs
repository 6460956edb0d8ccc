//! Dead-code injector.
//!
//! Junk statements only touch one fresh global table and fresh locals.
//! They are grouped in `do ... end` blocks so no function ever holds more
//! than a handful of live locals, and the table is cleared at the end.

use crate::Weaver;
use rand::Rng;
use std::fmt::Write;

/// Junk statements per `do ... end` block.
pub const STATEMENTS_PER_BLOCK: usize = 32;

/// Generate the junk fragment, or an empty string when the tuned count is zero.
pub fn generate<R: Rng + ?Sized>(w: &mut Weaver<'_, R>) -> String {
    let count = w.tuning().dead_code_count();
    if count == 0 {
        return String::new();
    }
    let table = w.fresh_name();
    let mut out = format!("{table} = {{}}\n");
    for start in (0..count).step_by(STATEMENTS_PER_BLOCK) {
        out.push_str("do\n");
        for index in start..(start + STATEMENTS_PER_BLOCK).min(count) {
            out.push('\t');
            out.push_str(&statement(w, &table, index as i64));
            out.push('\n');
        }
        out.push_str("end\n");
    }
    let _ = writeln!(out, "{table} = nil");
    tracing::debug!(statements = count, bytes = out.len(), "generated dead code");
    out
}

fn statement<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, table: &str, index: i64) -> String {
    let slot = w.num(index);
    let roll: f64 = w.rng().gen();
    if roll > 0.7 {
        let it = w.fresh_name();
        let bound = w.rng().gen_range(2..7);
        let bound = w.num(bound);
        let two = w.num(2);
        format!("for {it} = 1, {bound} do {table}[{slot}] = {it} * {two} end")
    } else if roll > 0.4 {
        let value = w.rng().gen_range(0..1000);
        format!("{table}[{slot}] = {}", w.num(value))
    } else if roll > 0.15 {
        let func = w.fresh_name();
        let value = w.rng().gen_range(0..100);
        format!("local function {func}() return {} end", w.num(value))
    } else {
        let local = w.fresh_name();
        let (a, b) = (w.rng().gen_range(1..50), w.rng().gen_range(1..50));
        format!("local {local} = {} * {} - ({table}[{slot}] or 0)", w.num(a), w.num(b))
    }
}
