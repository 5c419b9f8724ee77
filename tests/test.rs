use assert_cmd::prelude::{CommandCargoExt, OutputAssertExt};
use std::process::Command;

fn ogo() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.args(["--src-root", "tests/programs/lib"]);
    cmd
}

fn test_programs(dir: &str, stderr: &str) {
    ogo()
        .arg(["tests/programs/", dir].concat())
        .assert()
        .stderr(stderr.to_string())
        .success();
}

fn test_fail(dir: &str) {
    ogo().arg(["tests/fail/", dir].concat()).assert().code(1);
}

fn emit(args: &[&str]) -> String {
    let out = ogo().args(args).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout).unwrap()
}

#[test]
fn helloworld() {
    test_programs("hello", "Hello, world.\n");
}

#[test]
fn fib() {
    test_programs(
        "fib",
        "0 1 1 2 3 5 8 13 21 34 \n\
         1 -\n\
         2 -\n\
         3 Fizz\n\
         4 -\n\
         5 Buzz\n\
         6 Fizz\n\
         7 -\n\
         8 -\n\
         9 Fizz\n\
         10 Buzz\n\
         11 -\n\
         12 Fizz\n\
         13 -\n\
         14 -\n\
         15 FizzBuzz\n\
         120 true\n",
    );
}

#[test]
fn strings() {
    test_programs("strings", "prefix ok\n12 world\n6\n");
}

#[test]
fn emit_c() {
    let c = emit(&["--emit-c", "tests/programs/strings"]);
    assert!(c.contains("typedef int64_t ogo_int;"));
    assert!(c.contains("static ogo_bool example_com_text_Equal(ogo_string l_a, ogo_string l_b) {"));
    let entry = c.find("int main(void) {").unwrap();
    let text_init = c[entry..].find("example_com_text_init();").unwrap();
    let main_init = c[entry..].find("main_init();").unwrap();
    assert!(text_init < main_init);
    let c = emit(&["-c", "--int-size", "4", "tests/programs/hello"]);
    assert!(c.contains("typedef int32_t ogo_int;"));
}

#[test]
fn emit_go() {
    let go = emit(&["--emit-go", "tests/programs/strings"]);
    assert!(go.starts_with("package main\n"));
    assert!(go.contains("var example_com_text_Count int = 3"));
    assert!(go.contains("func main() {\n\texample_com_text_init()\n\tmain_init()\n\tmain_main()\n}"));
}

#[test]
fn bad_int_size() {
    ogo()
        .args(["--int-size", "3", "tests/programs/hello"])
        .assert()
        .code(2);
}

#[test]
fn fail_method() {
    test_fail("method");
}

#[test]
fn fail_syntax() {
    test_fail("syntax");
}

#[test]
fn fail_not_found() {
    test_fail("does-not-exist");
}

#[test]
fn inits_run_in_file_order() {
    test_programs("inits", "a\nb\nmain\n");
}

#[test]
fn string_switch() {
    test_programs("switch", "3\n");
}

#[test]
fn integer_arithmetic() {
    test_programs("arith", "0 -1 1 -2 -1\n2\n");
}

#[test]
fn divide_by_zero_panics() {
    let out = ogo().arg("tests/programs/divzero").output().unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("integer divide by zero"));
}
