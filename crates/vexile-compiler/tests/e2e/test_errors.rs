use super::helpers::*;

#[test]
fn e2e_error_missing_end() {
    let err = compile_str_err("if x then");
    assert_eq!(err, "syntax error: expected 'end', got '<eof>' at line 1");
}

#[test]
fn e2e_error_missing_end_multiline() {
    let err = compile_str_err("local a = 1\nwhile a do\n  a = a - 1\n");
    assert!(err.ends_with("at line 4"), "{err}");
}

#[test]
fn e2e_error_unexpected_symbol() {
    let err = compile_str_err("return )");
    assert!(err.contains("unexpected symbol"));
}

#[test]
fn e2e_error_malformed_number() {
    let err = compile_str_err("local x = 0x");
    assert!(err.contains("malformed number"));
}

#[test]
fn e2e_error_upvalue() {
    let err = compile_str_err("local n = 0 local function inc() n = n + 1 end");
    assert!(err.starts_with("unsupported construct: upvalue 'n'"), "{err}");
}

#[test]
fn e2e_error_break_outside_loop() {
    let err = compile_str_err("do break end");
    assert!(err.contains("outside a loop"));
}

#[test]
fn e2e_error_nesting_limit() {
    let src = format!("local t = {}{}", "{".repeat(300), "}".repeat(300));
    let err = compile_str_err(&src);
    assert!(err.contains("too many syntax levels"));
}
