#![cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "x86")
))]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use judgebox_exec::*;
use judgebox_verdict::Verdict;
use speculoos::prelude::*;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Sandbox {
    fn new(input: &str) -> Sandbox {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let input_path = dir.path().join("input.txt");
        fs::write(&input_path, input).unwrap();
        let output = dir.path().join("output.txt");
        Sandbox {
            dir,
            input: input_path,
            output,
        }
    }

    fn script(&self, body: &str) -> PathBuf {
        let path = self.dir.path().join("candidate.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Compile `source` with `compiler`, `None` if the compiler is not installed.
    fn compile(&self, compiler: &str, ext: &str, source: &str, flags: &[&str]) -> Option<PathBuf> {
        if which::which(compiler).is_err() {
            return None;
        }
        let src = self.dir.path().join(format!("candidate.{}", ext));
        let dest = self.dir.path().join("candidate");
        fs::write(&src, source).unwrap();
        let status = Command::new(compiler)
            .args(flags)
            .arg("-o")
            .arg(&dest)
            .arg(&src)
            .status()
            .unwrap();
        assert!(status.success(), "{} failed on {}", compiler, source);
        Some(dest)
    }

    fn run(
        &self,
        binary: &Path,
        limits: &ResourceLimits,
        policy: &SyscallPolicy,
    ) -> Result<ExecutionOutcome, SupervisorError> {
        supervise(binary, &self.input, &self.output, limits, policy)
    }

    fn output(&self) -> String {
        fs::read_to_string(&self.output).unwrap()
    }
}

/// Every syscall and every absolute path.
fn permissive() -> SyscallPolicy {
    SyscallPolicy::new(0..512, Vec::<PathBuf>::new()).with_dirs(["/"])
}

#[test]
fn test_clean_run() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("echo 5");
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &permissive())
        .unwrap();
    assert_that!(outcome.termination).is_equal_to(Termination::Exited(0));
    assert_that!(outcome.verdict_hint).is_none();
    assert_that!(classify(&outcome)).is_equal_to(Classification::NeedsComparison);
    assert_that!(sandbox.output()).is_equal_to("5\n".to_string());
}

#[test]
fn test_reads_input() {
    let sandbox = Sandbox::new("hello\n");
    let binary = sandbox.script("read line; echo \"$line $line\"");
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &permissive())
        .unwrap();
    assert_that!(outcome.verdict_hint).is_none();
    assert_that!(sandbox.output()).is_equal_to("hello hello\n".to_string());
}

#[test]
fn test_non_zero_exit_is_clean() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("echo 5; exit 3");
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &permissive())
        .unwrap();
    assert_that!(outcome.termination).is_equal_to(Termination::Exited(3));
    assert_that!(classify(&outcome)).is_equal_to(Classification::NeedsComparison);
}

#[test]
fn test_system_error_status_after_exec() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script(&format!("echo 5; exit {}", LAUNCH_FAILURE_EXIT_CODE));
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &permissive())
        .unwrap();
    assert_that!(outcome.termination).is_equal_to(Termination::Exited(LAUNCH_FAILURE_EXIT_CODE));
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::SystemError));
    assert_that!(classify(&outcome)).is_equal_to(Classification::Final(Verdict::SystemError));
}

#[test]
fn test_c_candidate_default_policy() {
    let sandbox = Sandbox::new("5\n");
    let source = r#"
#include <stdio.h>
int main(void) {
    int a;
    if (scanf("%d", &a) != 1) return 2;
    printf("%d\n", a + 2);
    return 0;
}
"#;
    let Some(binary) = sandbox.compile("gcc", "c", source, &["-O2"]) else {
        return;
    };
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &SyscallPolicy::host_default())
        .unwrap();
    assert_that!(outcome.termination).is_equal_to(Termination::Exited(0));
    assert_that!(classify(&outcome)).is_equal_to(Classification::NeedsComparison);
    assert_that!(sandbox.output()).is_equal_to("7\n".to_string());
}

#[test]
fn test_cpp_candidate_default_policy() {
    let sandbox = Sandbox::new("5\n");
    let source = r#"
#include <iostream>
int main() {
    int a;
    std::cin >> a;
    std::cout << a + 2 << std::endl;
}
"#;
    let Some(binary) = sandbox.compile("g++", "cpp", source, &["-O2"]) else {
        return;
    };
    let mut limits = ResourceLimits::default();
    limits.memory_kib(64 * 1024);
    let outcome = sandbox
        .run(&binary, &limits, &SyscallPolicy::host_default())
        .unwrap();
    assert_that!(outcome.termination).is_equal_to(Termination::Exited(0));
    assert_that!(classify(&outcome)).is_equal_to(Classification::NeedsComparison);
    assert_that!(sandbox.output()).is_equal_to("7\n".to_string());
}

#[test]
fn test_huge_allocation_faults() {
    let sandbox = Sandbox::new("");
    let source = r#"
#include <stdio.h>
#include <stdlib.h>
int main(void) {
    size_t size = 200u << 20;
    volatile char *p = malloc(size);
    for (size_t i = 0; i < size; i += 4096) p[i] = 1;
    printf("%d\n", p[size - 1]);
    return 0;
}
"#;
    let Some(binary) = sandbox.compile("gcc", "c", source, &[]) else {
        return;
    };
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &SyscallPolicy::host_default())
        .unwrap();
    assert_that!(outcome.termination)
        .is_equal_to(Termination::Killed(Violation::Signal(libc::SIGSEGV)));
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::MemoryLimitExceeded));
}

#[test]
fn test_fork_is_denied() {
    let sandbox = Sandbox::new("");
    let source = r#"
#include <stdio.h>
#include <unistd.h>
int main(void) {
    fork();
    puts("forked");
    return 0;
}
"#;
    let Some(binary) = sandbox.compile("gcc", "c", source, &["-O2"]) else {
        return;
    };
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &SyscallPolicy::host_default())
        .unwrap();
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::RuntimeError));
    assert!(matches!(
        outcome.termination,
        Termination::Killed(Violation::Syscall { .. })
    ));
    assert_that!(sandbox.output()).is_equal_to(String::new());
}

#[cfg(target_arch = "x86_64")]
#[test]
fn test_compat_syscall_is_denied() {
    let sandbox = Sandbox::new("");
    // i386 open(2) is 5, fstat(2) in the x86-64 table
    let source = r#"
#include <stdio.h>
static const char path[] = "/etc/passwd";
int main(void) {
    long fd;
    __asm__ volatile("int $0x80" : "=a"(fd) : "a"(5L), "b"(path), "c"(0L) : "memory");
    printf("%ld\n", fd);
    return 0;
}
"#;
    let Some(binary) = sandbox.compile("gcc", "c", source, &["-no-pie"]) else {
        return;
    };
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &SyscallPolicy::host_default())
        .unwrap();
    assert_that!(outcome.verdict_hint).is_some();
    assert_that!(sandbox.output()).is_equal_to(String::new());
    // kernels built without IA32 emulation fault on the gate instead
    assert!(
        matches!(
            outcome.termination,
            Termination::Killed(Violation::CompatSyscall { number: 5 })
                | Termination::Killed(Violation::Signal(_))
        ),
        "{:?}",
        outcome.termination
    );
}

#[test]
fn test_empty_policy() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("echo 5");
    let policy = SyscallPolicy::new([], Vec::<PathBuf>::new());
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &policy)
        .unwrap();
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::RuntimeError));
    assert!(matches!(
        outcome.termination,
        Termination::Killed(Violation::Syscall { .. })
    ));
    assert_that!(sandbox.output()).is_equal_to(String::new());
}

#[test]
fn test_no_paths_allowed() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("echo 5");
    let policy = SyscallPolicy::new(0..512, Vec::<PathBuf>::new());
    let outcome = sandbox
        .run(&binary, &ResourceLimits::default(), &policy)
        .unwrap();
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::RuntimeError));
    assert!(matches!(
        outcome.termination,
        Termination::Killed(Violation::Path { .. })
    ));
}

#[test]
fn test_busy_loop() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("while :; do :; done");
    let mut limits = ResourceLimits::default();
    limits.cpu_time_ms(1000);
    let outcome = sandbox.run(&binary, &limits, &permissive()).unwrap();
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::TimeLimitExceeded));
    assert_that!(outcome.elapsed_ms).is_greater_than_or_equal_to(900);
}

#[test]
fn test_output_limit() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("while :; do echo aaaaaaaaaaaaaaaa; done");
    let mut limits = ResourceLimits::default();
    limits.max_output_bytes(1000);
    let outcome = sandbox.run(&binary, &limits, &permissive()).unwrap();
    assert_that!(outcome.verdict_hint).is_equal_to(Some(Verdict::OutputLimitExceeded));
    assert_that!(sandbox.output().len()).is_less_than_or_equal_to(1000);
}

#[test]
fn test_missing_input_is_launch_failure() {
    let sandbox = Sandbox::new("");
    let binary = sandbox.script("echo 5");
    let missing = sandbox.dir.path().join("missing.txt");
    let res = supervise(
        &binary,
        &missing,
        &sandbox.output,
        &ResourceLimits::default(),
        &permissive(),
    );
    assert!(matches!(res, Err(SupervisorError::Launch { .. })));
}

#[test]
fn test_not_executable() {
    let sandbox = Sandbox::new("");
    let path = sandbox.dir.path().join("data.txt");
    fs::write(&path, "not a program").unwrap();
    let res = sandbox.run(&path, &ResourceLimits::default(), &permissive());
    assert!(matches!(res, Err(SupervisorError::NotRunnable { .. })));
}
