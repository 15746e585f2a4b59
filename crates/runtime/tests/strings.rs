//! String literals, concatenation, and interning-by-equality scenarios.

use lox_runtime::{InterpretResult, Vm};

fn run(source: &str) -> (InterpretResult, String) {
    let mut out = Vec::new();
    let mut vm = Vm::new(&mut out);
    let result = vm.interpret(source);
    (result, String::from_utf8(out).expect("PRINT only ever writes valid UTF-8"))
}

#[test]
fn concatenation() {
    let (result, out) = run("print \"foo\" + \"bar\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "foobar\n");
}

#[test]
fn equal_content_strings_compare_equal() {
    let (result, out) = run("print \"abc\" == \"abc\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "true\n");
}

#[test]
fn concatenated_result_compares_equal_to_an_equivalent_literal() {
    let (result, out) = run("print (\"ab\" + \"c\") == \"abc\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "true\n");
}

#[test]
fn different_strings_compare_unequal() {
    let (result, out) = run("print \"abc\" == \"abd\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "false\n");
}

#[test]
fn empty_string_is_truthy() {
    let (result, out) = run("print !\"\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "false\n");
}

#[test]
fn string_stored_and_read_back_from_a_global() {
    let (result, out) = run("var greeting = \"hello\" + \", \" + \"world\"; print greeting;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out, "hello, world\n");
}
