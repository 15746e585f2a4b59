//! Block-scope entry/exit and local-slot resolution scenarios.

use lox_runtime::{InterpretResult, Vm};

fn run(source: &str) -> (InterpretResult, String) {
    let mut out = Vec::new();
    let mut vm = Vm::new(&mut out);
    let result = vm.interpret(source);
    (result, String::from_utf8(out).expect("PRINT only ever writes valid UTF-8"))
}

#[test]
fn nested_block_sees_shadowed_outer_value_while_building_its_own() {
    let (result, out) = run("{ var a = 10; { var b = a + 1; print b; } print a; }");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "11\n10\n");
}

#[test]
fn shadowing_a_name_in_a_nested_scope_does_not_affect_the_outer_binding() {
    let (result, out) = run("{ var a = 1; { var a = 2; print a; } print a; }");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "2\n1\n");
}

#[test]
fn reading_a_local_in_its_own_initializer_is_a_compile_error() {
    let (result, _) = run("{ var a = 10; { var a = a + 1; print a; } print a; }");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn duplicate_local_declaration_in_the_same_scope_is_a_compile_error() {
    let (result, _) = run("{ var a = 1; var a = 2; }");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn assignment_to_a_local_updates_its_stack_slot() {
    let (result, out) = run("{ var a = 1; a = a + 41; print a; }");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "42\n");
}

#[test]
fn many_sibling_scopes_each_clean_up_after_themselves() {
    let source = "{ var a = 1; print a; } { var a = 2; print a; } { var a = 3; print a; }";
    let (result, out) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "1\n2\n3\n");
}
