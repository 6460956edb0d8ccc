use super::helpers::*;
use vexile_compiler::parse_source;
use vexile_core::{Preset, Tuning};

#[test]
fn test_every_fragment_parses() {
    let woven = weave_all("print('hi')", fast_tuning(), 7);
    for fragment in &woven.fragments {
        parse_source(fragment).unwrap_or_else(|e| panic!("{e}\n{fragment}"));
    }
}

#[test]
fn test_test_preset_fragments_are_minimal() {
    let woven = weave_all("local x = 1", Tuning::for_preset(Preset::Test), 1);
    assert!(woven.fragments[0].is_empty(), "no parser bomb");
    assert!(woven.fragments[2].is_empty(), "no dead code");
    assert!(woven.fragments[1].contains("= function() end"));
}

#[test]
fn test_high_outweighs_fast() {
    let fast: usize = weave_all("local x = 1", fast_tuning(), 2)
        .fragments
        .iter()
        .map(String::len)
        .sum();
    let high: usize = weave_all("local x = 1", Tuning::for_preset(Preset::High), 2)
        .fragments
        .iter()
        .map(String::len)
        .sum();
    assert!(high > fast);
}
