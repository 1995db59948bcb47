// ABOUTME: Trybuild runner for compile-time type safety tests.
// ABOUTME: Verifies that invalid type usage and launch transitions fail to compile.

#[test]
fn id_types_not_interchangeable() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/id_not_interchangeable.rs");
}

#[test]
fn start_not_available_on_planned() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/start_on_planned.rs");
}

#[test]
fn rollback_not_available_on_planned() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/rollback_on_planned.rs");
}

#[test]
fn finish_not_available_before_engine_ready() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/finish_before_ready.rs");
}
