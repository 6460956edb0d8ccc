use proptest::prelude::*;
use vexile_compiler::ast::{
    BinOp, Chunk, Expression, FunctionBody, IfClause, Indexer, Statement, TableField, UnOp,
};
use vexile_compiler::lexer::tokenize;
use vexile_compiler::parser::parse;
use vexile_compiler::pretty::print_chunk;
use vexile_compiler::token::is_keyword;

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,5}".prop_filter("keyword", |s| !is_keyword(s))
}

fn literal() -> impl Strategy<Value = Expression> {
    prop_oneof![
        Just(Expression::Nil),
        any::<bool>().prop_map(Expression::Boolean),
        (0u32..100_000).prop_map(|n| Expression::Number(f64::from(n))),
        (0u32..1000).prop_map(|n| Expression::Number(f64::from(n) / 8.0)),
        "[ -~]{0,8}".prop_map(Expression::String),
        name().prop_map(Expression::Identifier),
    ]
}

fn binop() -> impl Strategy<Value = BinOp> {
    prop_oneof![
        Just(BinOp::Add),
        Just(BinOp::Sub),
        Just(BinOp::Mul),
        Just(BinOp::Div),
        Just(BinOp::Mod),
        Just(BinOp::Pow),
        Just(BinOp::Concat),
        Just(BinOp::Eq),
        Just(BinOp::NotEq),
        Just(BinOp::Lt),
        Just(BinOp::LtEq),
        Just(BinOp::Gt),
        Just(BinOp::GtEq),
        Just(BinOp::And),
        Just(BinOp::Or),
    ]
}

fn expression() -> impl Strategy<Value = Expression> {
    literal().prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            (binop(), inner.clone(), inner.clone()).prop_map(|(op, l, r)| Expression::Binary {
                op,
                left: Box::new(l),
                right: Box::new(r),
            }),
            (
                prop_oneof![Just(UnOp::Neg), Just(UnOp::Not), Just(UnOp::Len)],
                inner.clone()
            )
                .prop_map(|(op, e)| Expression::Unary {
                    op,
                    operand: Box::new(e),
                }),
            (name(), prop::collection::vec(inner.clone(), 0..3)).prop_map(|(f, args)| {
                Expression::Call {
                    base: Box::new(Expression::Identifier(f)),
                    args,
                }
            }),
            (inner.clone(), name()).prop_map(|(b, n)| Expression::Member {
                base: Box::new(b),
                indexer: Indexer::Dot,
                name: n,
            }),
            (inner.clone(), inner.clone()).prop_map(|(b, k)| Expression::Index {
                base: Box::new(b),
                key: Box::new(k),
            }),
            prop::collection::vec(
                prop_oneof![
                    inner.clone().prop_map(TableField::Positional),
                    (name(), inner.clone())
                        .prop_map(|(name, value)| TableField::Named { name, value }),
                    (inner.clone(), inner.clone())
                        .prop_map(|(key, value)| TableField::Keyed { key, value }),
                ],
                0..3
            )
            .prop_map(Expression::Table),
        ]
    })
}

fn statement() -> impl Strategy<Value = Statement> {
    let leaf = prop_oneof![
        (prop::collection::vec(name(), 1..3), prop::collection::vec(expression(), 0..3))
            .prop_map(|(names, values)| Statement::Local { names, values }),
        (name(), expression()).prop_map(|(n, v)| Statement::Assignment {
            targets: vec![Expression::Identifier(n)],
            values: vec![v],
        }),
        (name(), prop::collection::vec(expression(), 0..3)).prop_map(|(f, args)| {
            Statement::CallStatement(Expression::Call {
                base: Box::new(Expression::Identifier(f)),
                args,
            })
        }),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        let body = prop::collection::vec(inner, 0..3);
        prop_oneof![
            (expression(), body.clone(), prop::option::of(body.clone())).prop_map(
                |(condition, body, else_body)| Statement::If {
                    clauses: vec![IfClause { condition, body }],
                    else_body,
                }
            ),
            (expression(), body.clone())
                .prop_map(|(condition, body)| Statement::While { condition, body }),
            (name(), expression(), expression(), body.clone()).prop_map(
                |(var, start, limit, body)| Statement::ForNumeric {
                    var,
                    start,
                    limit,
                    step: None,
                    body,
                }
            ),
            body.clone().prop_map(Statement::Do),
            (name(), prop::collection::vec(name(), 0..3), body).prop_map(|(n, params, body)| {
                Statement::Function {
                    name: vexile_compiler::ast::FunctionName::Local(n),
                    func: FunctionBody {
                        params,
                        is_vararg: false,
                        body,
                    },
                }
            }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_print_then_parse_is_identity(body in prop::collection::vec(statement(), 0..6)) {
        let chunk = Chunk { body };
        let printed = print_chunk(&chunk);
        let reparsed = parse(tokenize(&printed));
        prop_assert!(reparsed.is_ok(), "failed to reparse:\n{}", printed);
        prop_assert_eq!(reparsed.unwrap(), chunk);
    }

    #[test]
    fn prop_lex_parse_roundtrip_is_stable(body in prop::collection::vec(statement(), 0..6)) {
        let src = print_chunk(&Chunk { body });
        let first = parse(tokenize(&src)).unwrap();
        let second = parse(tokenize(&print_chunk(&first))).unwrap();
        prop_assert_eq!(first, second);
    }
}
