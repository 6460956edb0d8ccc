use super::helpers::*;
use vexile_compiler::ast::{Expression, Statement};

#[test]
fn e2e_parse_realistic_script() {
    let chunk = parse_str(
        r#"
local Players = game:GetService("Players")
local counts = {}

local function bump(name)
    counts[name] = (counts[name] or 0) + 1
    return counts[name]
end

function counts.report(self, ...)
    for k, v in pairs(self) do
        if type(v) == "number" and v > 1 then
            print(k, v)
        elseif v == 1 then
            print(k)
        else
            break
        end
    end
end

repeat
    local n = bump("x")
until n >= 3
"#,
    );
    assert_eq!(chunk.body.len(), 5);
    assert!(matches!(chunk.body[0], Statement::Local { .. }));
    assert!(matches!(chunk.body[2], Statement::Function { .. }));
    assert!(matches!(chunk.body[4], Statement::Repeat { .. }));
}

#[test]
fn e2e_identifiers_cover_user_names() {
    let chunk = parse_str("local secret = 1 function api.call(arg) return secret + arg end");
    let ids = chunk.identifiers();
    for name in ["secret", "api", "call", "arg"] {
        assert!(ids.contains(name), "missing {name}");
    }
}

#[test]
fn e2e_member_chain_nests_left_to_right() {
    let chunk = parse_str("a.b.c()");
    let Statement::CallStatement(Expression::Call { base, .. }) = &chunk.body[0] else {
        panic!("not a call statement");
    };
    let Expression::Member { base: inner, name, .. } = base.as_ref() else {
        panic!("not a member");
    };
    assert_eq!(name, "c");
    assert!(matches!(inner.as_ref(), Expression::Member { name, .. } if name == "b"));
}
