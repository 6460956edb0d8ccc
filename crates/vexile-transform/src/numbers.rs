//! Number literals: obfuscated integer forms and exact float rendering.

use rand::Rng;

/// Render `n` either as a hexadecimal literal or as a split sum
/// `(p+(n-p))`. Both evaluate to exactly `n`.
pub fn obf_num<R: Rng + ?Sized>(n: i64, rng: &mut R) -> String {
    if n >= 0 && rng.gen_bool(0.5) {
        format!("0x{n:X}")
    } else {
        let p: i64 = rng.gen_range(0..1000);
        format!("({p}+{})", n - p)
    }
}

/// A Lua literal for `n` that reads back as the same value.
pub fn lua_number(n: f64) -> String {
    if n.is_nan() {
        "(0/0)".into()
    } else if n.is_infinite() {
        if n > 0.0 { "(1/0)" } else { "(-1/0)" }.into()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        if n == 0.0 && n.is_sign_negative() {
            "(-0)".into()
        } else {
            format!("{}", n as i64)
        }
    } else {
        // Rust prints the shortest string that round-trips.
        let s = format!("{n:e}");
        if n < 0.0 {
            format!("({s})")
        } else {
            s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vexile_compiler::ast::{BinOp, Expression, UnOp};
    use vexile_compiler::parser::Parser;
    use vexile_compiler::tokenize;

    /// Evaluate the constant arithmetic our literals use.
    fn eval(src: &str) -> f64 {
        fn go(e: &Expression) -> f64 {
            match e {
                Expression::Number(n) => *n,
                Expression::Unary { op: UnOp::Neg, operand } => -go(operand),
                Expression::Binary { op: BinOp::Add, left, right } => go(left) + go(right),
                Expression::Binary { op: BinOp::Div, left, right } => go(left) / go(right),
                other => panic!("unexpected {other:?}"),
            }
        }
        let expr = Parser::new(tokenize(src)).expr().unwrap();
        go(&expr)
    }

    #[test]
    fn test_obf_num_preserves_value() {
        let mut rng = StdRng::seed_from_u64(4);
        for n in [0i64, 1, 2, 7, 255, 999, 1000, 123_456, -3, -1000] {
            for _ in 0..8 {
                let text = obf_num(n, &mut rng);
                assert_eq!(eval(&text), n as f64, "{text}");
            }
        }
    }

    #[test]
    fn test_obf_num_uses_both_forms() {
        let mut rng = StdRng::seed_from_u64(8);
        let forms: Vec<String> = (0..32).map(|_| obf_num(42, &mut rng)).collect();
        assert!(forms.iter().any(|f| f == "0x2A"));
        assert!(forms.iter().any(|f| f.starts_with('(')));
    }

    #[test]
    fn test_lua_number() {
        assert_eq!(lua_number(3.0), "3");
        assert_eq!(lua_number(-12.0), "-12");
        assert_eq!(lua_number(f64::INFINITY), "(1/0)");
        assert_eq!(lua_number(0.5), "5e-1");
        assert_eq!(eval(&lua_number(0.1)), 0.1);
        assert_eq!(eval(&lua_number(-2.75)), -2.75);
        assert_eq!(eval(&lua_number(1e300)), 1e300);
    }
}
