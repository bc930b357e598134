//! Compile-pass tests for the derive macro.

#[test]
fn macro_pass_tests() {
    let t = trybuild::TestCases::new();
    t.pass("tests/pass/*.rs");
}
