use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const LEFT: &str = "\
define i32 @f(i32 %a, i32 %b) {
entry:
  %c = sub i32 %a, %b
  %d = mul i32 %c, 2
  ret i32 %d
}
";

const RIGHT: &str = "\
define i32 @f(i32 %a, i32 %b) {
entry:
  %x = shl i32 %a, 1
  %y = shl i32 %b, 1
  %e = sub i32 %x, %y
  ret i32 %e
}
";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write test input");
    path
}

fn snipeq(args: &[&Path], flags: &[&str], command: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snipeq"))
        .arg(command)
        .args(args)
        .args(flags)
        .output()
        .expect("Failed to execute snipeq")
}

#[test]
fn test_compare_equal() {
    let dir = TempDir::new().unwrap();
    let left = write(dir.path(), "left.ll", LEFT);
    let right = write(dir.path(), "right.ll", RIGHT);

    let output = snipeq(&[&left, &right], &[], "compare");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stdout: {}\nstderr: {}",
        stdout,
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(stdout.trim(), "EQUAL");
}

#[test]
fn test_compare_without_smt_is_not_equal() {
    let dir = TempDir::new().unwrap();
    let left = write(dir.path(), "left.ll", LEFT);
    let right = write(dir.path(), "right.ll", RIGHT);

    let output = snipeq(&[&left, &right], &["--no-smt"], "compare");
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "NOT EQUAL");
}

#[test]
fn test_compare_unsupported_construct() {
    let dir = TempDir::new().unwrap();
    let left = write(
        dir.path(),
        "left.ll",
        "define i32 @f(ptr %p) {\n  %v = load i32, ptr %p\n  ret i32 %v\n}\n",
    );
    let right = write(
        dir.path(),
        "right.ll",
        "define i32 @f(ptr %p) {\n  %v = call i32 @read(ptr %p)\n  ret i32 %v\n}\n",
    );

    let output = snipeq(&[&left, &right], &["--smt-timeout", "0"], "compare");
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unsupported construct"), "stdout: {}", stdout);
}

#[test]
fn test_compare_parse_error() {
    let dir = TempDir::new().unwrap();
    let left = write(dir.path(), "left.ll", LEFT);
    let right = write(
        dir.path(),
        "right.ll",
        "define i32 @f(i32 %a) {\n  %x = add i32 %a %a\n}\n",
    );

    let output = snipeq(&[&left, &right], &[], "compare");
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "stderr: {}", stderr);
}

#[test]
fn test_compare_missing_file() {
    let dir = TempDir::new().unwrap();
    let left = write(dir.path(), "left.ll", LEFT);
    let missing = dir.path().join("missing.ll");

    let output = snipeq(&[&left, &missing], &[], "compare");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_encode() {
    let dir = TempDir::new().unwrap();
    let file = write(dir.path(), "left.ll", LEFT);

    let output = snipeq(&[&file], &["--side", "right"], "encode");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(declare-const |R_c| (_ BitVec 32))"));
    assert!(stdout.contains("(assert (= |R_d| (bvmul |R_c| (_ bv2 32))))"));
    assert!(!stdout.contains("ret"));
}
