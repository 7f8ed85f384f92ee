//! Compile tests for `#[derive(HostClass)]` used from outside the crate.

#[test]
fn derive_host_class_pass_cases() {
    let t = trybuild::TestCases::new();
    t.pass("tests/derive_pass/*.rs");
}
