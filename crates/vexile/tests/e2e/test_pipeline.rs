use super::helpers::*;
use vexile::{
    compile_and_protect, js_watermark, lua_watermark, CompileError, Engine, ObfuscationSettings,
    Preset, Protector, Tuning,
};
use vexile_compiler::parser::Parser;
use vexile_compiler::{parse_source, strip_comments, tokenize};

#[test]
fn test_same_seed_same_artifact() {
    let src = "local n = 0 for i = 1, 4 do n = n + i end print(n)";
    assert_eq!(build(src, Preset::High, 11).text, build(src, Preset::High, 11).text);
    assert_ne!(build(src, Preset::High, 11).text, build(src, Preset::High, 12).text);
}

#[test]
fn test_artifact_is_valid_lua() {
    let text = build("print(\"ok\")", Preset::Test, 2).text;
    parse_source(&text).unwrap();

    let text = build("print(\"ok\")", Preset::High, 2).text;
    assert!(text.starts_with("--[["));
    Parser::new(tokenize(&strip_comments(&text)))
        .with_max_depth(1000)
        .parse_chunk()
        .unwrap();
}

#[test]
fn test_minified_artifact_is_one_line_after_watermark() {
    let text = build("local a = 1\n\nprint(a)\n", Preset::Fast, 4).text;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(lua_watermark().as_str()));
    assert_eq!(lines.count(), 1);
}

#[test]
fn test_long_left_chains_fail_cleanly() {
    let vm = ObfuscationSettings {
        vm_compiler: true,
        ..Default::default()
    };
    for src in [
        format!("local x = 1{}", "+1".repeat(800)),
        format!("f{}", "()".repeat(100_000)),
        format!("x = a{}", ".b".repeat(100_000)),
    ] {
        let err = compile_and_protect(&src, Engine::LuaU, Preset::Custom, Some(vm)).unwrap_err();
        assert!(err.to_string().contains("too many syntax levels"), "{err}");
    }

    let src = format!("local x = 1{}\nprint(x)", "+1".repeat(120));
    compile_and_protect(&src, Engine::LuaU, Preset::Custom, Some(vm)).unwrap();
}

#[test]
fn test_custom_requires_record() {
    let err = compile_and_protect("print(1)", Engine::LuaU, Preset::Custom, None).unwrap_err();
    assert!(matches!(err, CompileError::InvalidOptions(_)));
}

#[test]
fn test_raw_path_encrypts_literals() {
    let custom = ObfuscationSettings {
        string_encryption: true,
        ..Default::default()
    };
    let text =
        compile_and_protect("print(\"top secret\")", Engine::LuaU, Preset::Custom, Some(custom))
            .unwrap();
    assert!(!text.contains("top secret"));
    assert!(text.contains("string.byte"));
    assert!(text.contains("setfenv"));
    parse_source(&text).unwrap();
}

#[test]
fn test_upvalues_are_rejected_only_when_virtualizing() {
    let src = "local y = 1\nlocal function f() return y end\nprint(f())";
    let err = compile_and_protect(src, Engine::LuaU, Preset::Fast, None).unwrap_err();
    assert!(matches!(err, CompileError::Unsupported { .. }), "{err}");

    let raw = ObfuscationSettings {
        anti_tamper: true,
        ..Default::default()
    };
    assert!(compile_and_protect(src, Engine::LuaU, Preset::Custom, Some(raw)).is_ok());
}

#[test]
fn test_output_ceiling() {
    let mut tuning = Tuning::for_preset(Preset::High);
    tuning.max_output_bytes = 4096;
    let err = Protector::new(Engine::LuaU, Preset::High, None)
        .unwrap()
        .tuning(tuning)
        .seed(0)
        .protect("print(1)")
        .unwrap_err();
    match err {
        CompileError::OutputTooLarge { size, limit } => {
            assert_eq!(limit, 4096);
            assert!(size > limit);
        }
        other => panic!("expected OutputTooLarge, got {other}"),
    }
}

#[test]
fn test_javascript_is_stripped_not_virtualized() {
    let src = "// header\nconst url = \"http://example.com\"; /* note */\n   console.log(url);   \n";
    let artifact = Protector::new(Engine::JavaScript, Preset::High, None)
        .unwrap()
        .build(src)
        .unwrap();
    assert!(artifact.unit.is_none());
    assert!(artifact.text.starts_with(&js_watermark()));
    assert!(!artifact.text.contains("header"));
    assert!(!artifact.text.contains("note"));
    assert!(artifact.text.contains("\"http://example.com\""));
    assert!(artifact.text.contains("\nconsole.log(url);"));
}

#[test]
fn test_user_globals_stay_visible_through_the_bridge() {
    let artifact = build("shared = 41 shared = shared + 1 print(shared)", Preset::Medium, 6);
    let run = run_on_host(&artifact, |_| {});
    assert_eq!(run.printed, vec!["42"]);
}
