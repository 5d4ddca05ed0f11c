//! Parse and interpret whole programs.

mod common;
use common::run_source;

use expect_test::expect;
use nickel::{
    function_table::{FunctionTableErr, LookupErr},
    parser::SyntaxErr,
    result::ErrorKind,
};

#[test]
fn print_returns_its_value() {
    let (result, out) = run_source("print(42)").unwrap();
    assert_eq!(result.unwrap(), 42);
    assert_eq!(out, "42\n");
}

#[test]
fn function_call() {
    let (result, out) = run_source("function add(a, b) = a + b; main = add(2, 3)").unwrap();
    assert_eq!(result.unwrap(), 5);
    assert_eq!(out, "");
}

#[test]
fn only_taken_branch_runs() {
    let (result, out) = run_source("main = if (1 <= 2) then 10 else print(20)").unwrap();
    assert_eq!(result.unwrap(), 10);
    assert_eq!(out, "");
}

#[test]
fn nonzero_is_true() {
    let (result, _) = run_source("if 0 - 7 then 1 else 2").unwrap();
    assert_eq!(result.unwrap(), 1);
}

#[test]
fn print_order() {
    let src = r#"
        function trace(x) = print(x);
        function sum3(a, b, c) = a + b + c;
        main = print(sum3(trace(1), trace(2), trace(3)) == 6)
    "#;
    let (result, out) = run_source(src).unwrap();
    assert_eq!(result.unwrap(), 1);
    expect![[r#"
        1
        2
        3
        1
    "#]]
    .assert_eq(&out);
}

#[test]
fn deep_recursion() {
    let src = "function count(n) = if n == 0 then 0 else 1 + count(n - 1); count(1000)";
    let (result, _) = run_source(src).unwrap();
    assert_eq!(result.unwrap(), 1000);
}

#[test]
fn undefined_function() {
    let (result, out) = run_source("main = undefinedFn()").unwrap();
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidProgram);
    assert!(err.to_string().contains("undefinedFn"));
    assert_eq!(out, "");
}

#[test]
fn arity_checked_before_arguments() {
    let (result, out) = run_source("function id(a) = a; main = id(print(1), print(2))").unwrap();
    assert_eq!(
        result.unwrap_err().downcast_cause::<LookupErr>(),
        Some(&LookupErr::ArityMismatch {
            func: "id".into(),
            expected: 1,
            got: 2
        })
    );
    assert_eq!(out, "");
}

#[test]
fn output_before_failure_is_kept() {
    let (result, out) = run_source("main = print(1) + undefinedFn()").unwrap();
    assert!(result.is_err());
    assert_eq!(out, "1\n");
}

#[test]
fn duplicate_parameter() {
    let err = run_source("function f(a, a) = a; f(1, 2)").unwrap_err();
    assert_eq!(
        err.downcast_cause::<FunctionTableErr>(),
        Some(&FunctionTableErr::DuplicateParameter {
            func: "f".into(),
            param: "a".into()
        })
    );
}

#[test]
fn syntax_error_names_position() {
    let err = run_source("main = (1 + 2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    assert!(err.is::<SyntaxErr>());
    assert!(err.to_string().contains("column"), "{err}");
}
