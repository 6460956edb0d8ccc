//! Parser bomb: one deeply nested expression bound to a fresh local inside
//! `do ... end`. Its value is never read.
//!
//! Every level holds a single open slot (`{{{n}}}` or `(((n)))`), so the
//! host compiler needs one register and one C level per nesting level.

use crate::Weaver;
use rand::Rng;

pub fn generate<R: Rng + ?Sized>(w: &mut Weaver<'_, R>) -> String {
    let depth = w.tuning().bomb_depth();
    if depth == 0 {
        return String::new();
    }
    let name = w.fresh_name();
    let n = w.rng().gen_range(0..0x10000);
    let inner = w.num(n);
    let (open, close) = if w.rng().gen_bool(0.5) { ('{', '}') } else { ('(', ')') };
    let mut expr = String::with_capacity(inner.len() + 2 * depth);
    expr.extend(std::iter::repeat(open).take(depth));
    expr.push_str(&inner);
    expr.extend(std::iter::repeat(close).take(depth));
    tracing::debug!(depth, bytes = expr.len(), "generated parser bomb");
    format!("do local {name} = {expr} end\n")
}
