use std::fs;
use std::path::Path;
use std::process::Command;

use judgebox_verdict::Verdict;
use speculoos::prelude::*;
use tempfile::TempDir;

fn judgebox<I, S>(args: I) -> Option<i32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_judgebox"))
        .args(args)
        .output()
        .unwrap()
        .status
        .code()
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_compare_exit_codes() {
    let tmp = TempDir::new().unwrap();
    let expected = write(tmp.path(), "expected", "5\n");
    for (actual, verdict) in [
        ("5\n", Verdict::Accepted),
        ("5", Verdict::PresentationError),
        ("6\n", Verdict::WrongAnswer),
    ] {
        let actual = write(tmp.path(), "actual", actual);
        assert_that!(judgebox(["compare", &expected, &actual]))
            .is_equal_to(Some(verdict.exit_code()));
    }
    let actual = write(tmp.path(), "actual", "5\n");
    assert_that!(judgebox(["compare", "--output-limit", "2", &expected, &actual]))
        .is_equal_to(Some(Verdict::OutputLimitExceeded.exit_code()));
}

#[test]
fn test_malformed_invocation() {
    assert_that!(judgebox(["compare", "only-one"])).is_equal_to(Some(1));
    assert_that!(judgebox(["no-such-tool"])).is_equal_to(Some(1));
    assert_that!(judgebox(["--help"])).is_equal_to(Some(0));
}

#[test]
fn test_missing_file_is_system_error() {
    let tmp = TempDir::new().unwrap();
    let expected = write(tmp.path(), "expected", "5\n");
    let missing = tmp.path().join("missing").to_string_lossy().into_owned();
    assert_that!(judgebox(["compare", &expected, &missing]))
        .is_equal_to(Some(Verdict::SystemError.exit_code()));
}

#[test]
fn test_hint_exits_zero() {
    let tmp = TempDir::new().unwrap();
    let input = write(tmp.path(), "in", "1\n");
    let expected = write(tmp.path(), "expected", "5\n");
    let actual = write(tmp.path(), "actual", "6\n");
    let output = Command::new(env!("CARGO_BIN_EXE_judgebox"))
        .args(["hint", &input, &expected, &actual])
        .output()
        .unwrap();
    assert_that!(output.status.code()).is_equal_to(Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_that!(stderr.contains("Input:^1$\nOutput:^6$\nExpected:^5$")).is_true();
}

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "x86")
))]
#[test]
fn test_run_with_policy_file() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let exe = write(tmp.path(), "sol.sh", "#!/bin/sh\necho 42\n");
    fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
    let input = write(tmp.path(), "in", "");
    let output = tmp.path().join("out").to_string_lossy().into_owned();

    let policy = write(
        tmp.path(),
        "policy.yaml",
        "syscalls: [read, write, exit_group]\npaths: [/etc/ld.so.cache]\n",
    );
    let status = judgebox(["run", "--policy", &policy, &exe, &input, &output]);
    assert_that!(status).is_equal_to(Some(Verdict::RuntimeError.exit_code()));
    assert_that!(fs::read_to_string(&output).unwrap()).is_equal_to(String::new());

    let broken = write(tmp.path(), "broken.yaml", "syscalls: {not: a list}\n");
    let status = judgebox(["run", "--policy", &broken, &exe, &input, &output]);
    assert_that!(status).is_equal_to(Some(Verdict::SystemError.exit_code()));
}

#[test]
fn test_invalid_policy_file() {
    let tmp = TempDir::new().unwrap();
    let policy = write(tmp.path(), "policy.json", r#"{"syscalls": ["no_such_syscall"]}"#);
    let input = write(tmp.path(), "in", "");
    let output = tmp.path().join("out").to_string_lossy().into_owned();
    let status = judgebox(["run", "--policy", &policy, "/bin/true", &input, &output]);
    assert_that!(status).is_equal_to(Some(Verdict::SystemError.exit_code()));
}
