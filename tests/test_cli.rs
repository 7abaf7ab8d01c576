use std::fs::read_to_string;
use std::process::{Command, Output};

use assert_cmd::cargo::CommandCargoExt;
use insta::assert_snapshot;
use tempfile::tempdir;

fn milopt(args: &[&str]) -> Output {
    Command::cargo_bin(env!("CARGO_PKG_NAME"))
        .unwrap()
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to run milopt")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn lists_builtin_passes() {
    let output = milopt(&["--list"]);
    assert!(output.status.success());
    assert_snapshot!(stdout(&output), @r"
    common::divide_to_multiply
    common::dead_code_elimination
    nn_backend::alert_return_type_cast
    ");
}

#[test]
fn runs_selected_pass() {
    let output = milopt(&["y = x / 4.0; y", "-p", "common::divide_to_multiply", "--verify"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_snapshot!(stdout(&output), @r"
    main(%x: fp32) {
      %c0: fp32 = const(val=4.0)
      %_inversed_y_y: fp32 = const(val=0.25)
      %y: fp32 = mul(x=%x, y=%_inversed_y_y)
    } -> (%y)
    ");
}

#[test]
fn unknown_pass_fails() {
    let output = milopt(&["y = x / 4.0; y", "--pass", "common::nope"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("error: no pass registered as 'common::nope'"));
}

#[test]
fn parse_error_fails() {
    let output = milopt(&["x +"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: parse error at position 3"));
}

#[test]
fn writes_output_file() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("out.mil");

    let output = milopt(&["z = x / 2; z", "-o", path.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());
    assert_snapshot!(read_to_string(&path).unwrap(), @r"
    main(%x: fp32) {
      %_inversed_z_y: fp32 = const(val=0.5)
      %z: fp32 = mul(x=%x, y=%_inversed_z_y)
    } -> (%z)
    ");
}

#[test]
fn warns_about_cast_outputs() {
    let output = milopt(&["cast(x, fp16)"]);
    assert!(output.status.success());
    let stderr = stderr(&output);
    assert!(stderr.contains("WARN"));
    assert!(stderr.contains("output var t0 of type fp16 in function main is cast to type fp32"));
    assert_eq!(stderr.lines().count(), 1);
}

#[test]
fn log_flag_controls_verbosity() {
    let output = milopt(&["cast(x, fp16)", "--log", "error"]);
    assert!(output.status.success());
    assert!(stderr(&output).is_empty());
}
