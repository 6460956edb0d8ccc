use super::helpers::*;
use proptest::prelude::*;
use vexile_compiler::parse_source;
use vexile_compiler::token::is_identifier;
use vexile_core::NameStyle;
use vexile_transform::BUILTIN_GLOBALS;

fn assert_disjoint(src: &str, woven: &Woven) {
    for name in &woven.issued {
        assert!(!woven.user.contains(name), "generated '{name}' collides in {src}");
    }
    for fragment in woven.fragments.iter().filter(|f| !f.is_empty()) {
        let chunk = parse_source(fragment).unwrap();
        for name in chunk.identifiers() {
            assert!(
                woven.issued.contains(&name)
                    || BUILTIN_GLOBALS.contains(&name.as_str())
                    || HOST_FIELDS.contains(&name.as_str()),
                "fragment uses unexpected identifier '{name}'"
            );
        }
    }
}

#[test]
fn test_realistic_script() {
    let src = r#"
        local function greet(name) return "hi " .. name end
        local items = {1, 2, 3}
        for i, v in ipairs(items) do print(greet(v), i) end
        counter = 0
        while counter < 3 do counter = counter + 1 end
    "#;
    assert_disjoint(src, &weave_all(src, fast_tuning(), 99));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// One-letter alphabetic names collide constantly with short user
    /// identifiers, so this exercises the rejection path hard.
    #[test]
    fn prop_generated_names_avoid_user_identifiers(
        names in proptest::collection::vec("[a-zA-Z][a-zA-Z0-9]{0,1}", 1..40),
        seed in any::<u64>(),
    ) {
        let names: Vec<String> = names.into_iter().filter(|n| is_identifier(n)).collect();
        prop_assume!(!names.is_empty());
        let src = format!("local {} = 1", names.join(", "));
        let mut tuning = fast_tuning();
        tuning.names = NameStyle::Alpha;
        tuning.name_length = 1;
        let woven = weave_all(&src, tuning, seed);
        for name in &woven.issued {
            prop_assert!(!woven.user.contains(name));
        }
    }
}
