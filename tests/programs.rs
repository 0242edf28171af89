//! End-to-end checks driving the compiled `pl0` binary over complete
//! programs, plus a few pipeline checks through the library API.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use pl0::analyzer::analyze;
use pl0::parse_source;

fn run_program(name: &str, source: &str) -> Output {
  let path: PathBuf =
    std::env::temp_dir().join(format!("pl0-test-{}-{name}.pl0", std::process::id()));
  fs::write(&path, source).unwrap();
  let output = Command::new(env!("CARGO_BIN_EXE_pl0"))
    .arg(&path)
    .output()
    .unwrap();
  fs::remove_file(&path).ok();
  output
}

fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn simple_output() {
  let output = run_program("simple", "var x; begin x := 7; ! x end.");
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "7\n");
  assert_eq!(stderr(&output), "");
}

#[test]
fn arithmetic_precedence_and_negation() {
  let output = run_program("precedence", "! -2 + 3 * 4.");
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "10\n");
}

#[test]
fn while_with_mutation() {
  let source = "var i; begin i := 0; while i < 3 do begin ! i; i := i + 1 end end.";
  let output = run_program("while", source);
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "0\n1\n2\n");
}

#[test]
fn nested_procedure_mutates_outer_variable() {
  let source = "\
var x;
procedure bump;
begin x := x + 1 end;
begin x := 10; call bump; call bump; ! x end.";
  let output = run_program("bump", source);
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "12\n");
}

#[test]
fn undefined_variable_reports_and_exits_zero() {
  let output = run_program("undefined", "begin ! y end.");
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "");
  let message = stderr(&output);
  assert!(message.contains(":1:"));
  assert!(message.contains("undefined variable 'y'..."));
}

#[test]
fn divide_by_zero_is_contained() {
  let output = run_program("zdiv", "var a; begin a := 0; ! 10 / a end.");
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "divide by 0\n");
}

#[test]
fn division_after_check_still_runs() {
  let output = run_program("div", "var a; begin a := 5; ! 10 / a end.");
  assert_eq!(output.status.code(), Some(0));
  assert_eq!(stdout(&output), "2\n");
}

#[test]
fn missing_argument_prints_usage() {
  let output = Command::new(env!("CARGO_BIN_EXE_pl0")).output().unwrap();
  assert_eq!(output.status.code(), Some(1));
  assert_eq!(stdout(&output), "usage: pl0 file\n");
}

#[test]
fn unreadable_file_is_an_io_error() {
  let output = Command::new(env!("CARGO_BIN_EXE_pl0"))
    .arg("/nonexistent/missing.pl0")
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(255));
  assert_eq!(stderr(&output), "can't open the source file.\n");
}

#[test]
fn parse_failure_exits_nonzero() {
  let output = run_program("syntax", "begin ! 1 end");
  assert_eq!(output.status.code(), Some(255));
  assert!(stderr(&output).contains("expected"));
  assert_eq!(stdout(&output), "");
}

#[test]
fn renaming_an_inner_local_does_not_change_output() {
  let source = "\
var x;
procedure bump;
  var t;
begin t := x + 1; x := t end;
begin x := 10; call bump; call bump; ! x end.";
  // The same program with the local `t` renamed to a fresh identifier
  // that shadows nothing.
  let renamed = "\
var x;
procedure bump;
  var scratch;
begin scratch := x + 1; x := scratch end;
begin x := 10; call bump; call bump; ! x end.";

  let original = run_program("rename1", source);
  let fresh = run_program("rename2", renamed);
  assert_eq!(original.status.code(), Some(0));
  assert_eq!(stdout(&original), "12\n");
  assert_eq!(stdout(&original), stdout(&fresh));
}

#[test]
fn output_is_deterministic() {
  let source = "\
var x;
procedure bump;
begin x := x + 1 end;
begin x := 10; call bump; call bump; ! x end.";
  let first = run_program("det1", source);
  let second = run_program("det2", source);
  assert_eq!(stdout(&first), stdout(&second));
}

#[test]
fn analysis_exposes_free_variables() {
  let source = "\
var x;
procedure bump;
begin x := x + 1 end;
begin x := 10; call bump; ! x end.";
  let mut ast = parse_source(source, "bump.pl0").unwrap();
  let symbols = analyze(&mut ast).unwrap();

  let root_block = ast.child(ast.root(), 0);
  let root_scope = ast.node(root_block).scope.unwrap();
  let body = symbols.get_procedure(root_scope, "bump").unwrap();
  let bump_scope = ast.node(body).scope.unwrap();
  assert_eq!(symbols.scope(bump_scope).free_variables, vec!["x"]);
  assert!(symbols.scope(root_scope).free_variables.is_empty());
}
