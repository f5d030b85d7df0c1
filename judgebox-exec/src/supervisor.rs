use std::ffi::{CStr, CString};
use std::fmt;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use judgebox_verdict::Verdict;
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::ptrace::{self, Options};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::WaitStatus;
use nix::unistd::{close, dup2, fork, ForkResult, Pid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::classify_signal;
use crate::detect_exe::check_runnable;
use crate::limits::{MemoryCeiling, ResourceLimiter, ResourceLimits};
use crate::peek::{read_cstring, DEFAULT_MAX_WORDS};
use crate::policy::SyscallPolicy;
use crate::signals::strsignal;
use crate::syscalls;

/// Exit status used by the forked child when it fails before replacing its image. Before the exec
/// trap it is a [`SupervisorError::Launch`]; a candidate exiting with it afterwards gets the
/// `SystemError` verdict.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = Verdict::SystemError.exit_code();

/// Error of the supervisor itself, the candidate is not to blame for these.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Tracing is not implemented for this target.
    #[error("tracing candidates is not supported on this architecture")]
    Unsupported,
    /// The binary cannot be launched at all.
    #[error("cannot run {}: {reason}", .path.display())]
    NotRunnable {
        /// The offending binary.
        path: PathBuf,
        /// Why it cannot run.
        reason: String,
    },
    /// A path cannot be passed to the kernel.
    #[error("path {0:?} contains a NUL byte")]
    InvalidPath(PathBuf),
    /// `fork(2)` failed.
    #[error("failed to fork the candidate")]
    Fork(#[source] Errno),
    /// The child reported the launch sentinel before the exec trap.
    #[error(
        "failed to launch {}: cannot apply the limits, open {} or {}, or request tracing",
        .binary.display(),
        .input.display(),
        .output.display()
    )]
    Launch {
        /// The binary that was being launched.
        binary: PathBuf,
        /// Where the standard input was taken from.
        input: PathBuf,
        /// Where the standard output was going.
        output: PathBuf,
    },
    /// A tracing or waiting primitive failed unexpectedly.
    #[error("{op} failed on the candidate")]
    Trace {
        /// The failed operation.
        op: &'static str,
        /// The error reported by the kernel.
        #[source]
        source: Errno,
    },
}

/// CPU time and memory accounting of the candidate, as reported by `wait4(2)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPU time spent in user space, in milliseconds.
    pub user_ms: u64,
    /// CPU time spent in kernel space, in milliseconds.
    pub system_ms: u64,
    /// Peak resident set size, in KiB.
    pub max_rss_kb: u64,
}

impl ResourceUsage {
    /// The total CPU time, user plus system, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.user_ms + self.system_ms
    }
}

impl From<&libc::rusage> for ResourceUsage {
    fn from(usage: &libc::rusage) -> Self {
        let ms = |tv: libc::timeval| tv.tv_sec.max(0) as u64 * 1000 + tv.tv_usec.max(0) as u64 / 1000;
        ResourceUsage {
            user_ms: ms(usage.ru_utime),
            system_ms: ms(usage.ru_stime),
            max_rss_kb: usage.ru_maxrss.max(0) as u64,
        }
    }
}

/// Why the supervisor killed the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    /// A syscall outside the allow-list.
    Syscall {
        /// The syscall number.
        number: i64,
    },
    /// An `open` of a path outside the allow-list, or of a string that could not be read.
    Path {
        /// The syscall number.
        number: i64,
        /// The path, lossily decoded.
        path: String,
    },
    /// A syscall entered through the 32-bit compatibility gate of a 64-bit host.
    CompatSyscall {
        /// The syscall number, in the 32-bit table.
        number: i64,
    },
    /// A signal was about to be delivered to the candidate.
    Signal(i32),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Syscall { number } => write!(
                f,
                "syscall {} ({}) is not allowed",
                number,
                syscalls::name(*number).unwrap_or("unknown")
            ),
            Violation::CompatSyscall { number } => {
                write!(f, "32-bit syscall {} is not allowed", number)
            }
            Violation::Path { path, .. } => write!(f, "opening {:?} is not allowed", path),
            Violation::Signal(signal) => {
                write!(f, "received signal {} ({})", signal, strsignal(*signal))
            }
        }
    }
}

/// How the candidate ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The candidate exited by itself with this status.
    Exited(i32),
    /// The candidate was killed by this signal without stopping first (e.g. the hard CPU limit).
    Signaled(i32),
    /// The supervisor killed the candidate.
    Killed(Violation),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exited with status {}", code),
            Termination::Signaled(signal) => {
                write!(f, "killed by signal {} ({})", signal, strsignal(*signal))
            }
            Termination::Killed(violation) => write!(f, "killed: {}", violation),
        }
    }
}

/// The observations of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// The verdict already decided from process control, `None` if the run was clean and the
    /// output still has to be compared.
    pub verdict_hint: Option<Verdict>,
    /// CPU time, user plus system, in milliseconds.
    pub elapsed_ms: u64,
    /// Peak resident set size, in KiB.
    pub peak_memory_kb: u64,
    /// How the candidate ended.
    pub termination: Termination,
}

/// The position of a traced candidate in the launch/trace protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Forked, the exec trap has not been observed yet.
    Launching,
    /// Running between two stops.
    Running,
    /// Stopped at the entry of a syscall.
    SyscallEntry,
    /// Stopped because a signal is about to be delivered.
    SignalStop(Signal),
    /// Exited by itself.
    Exited(i32),
    /// Killed, by a signal or by the supervisor.
    Killed,
}

/// A forked candidate traced by the supervisor.
///
/// If dropped before being reaped, the candidate is killed and reaped.
#[derive(Debug)]
pub struct TracedProcess {
    pid: Pid,
    state: ProtocolState,
    usage: ResourceUsage,
    /// Syscall stops alternate between entry and exit: this is true between the two.
    in_syscall: bool,
    reaped: bool,
}

impl TracedProcess {
    /// The pid of the candidate.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// The accounting of the last observed state change.
    pub fn usage(&self) -> ResourceUsage {
        self.usage
    }

    fn transition(&mut self, state: ProtocolState) {
        trace!("Candidate {}: {:?} -> {:?}", self.pid, self.state, state);
        self.state = state;
    }

    /// Block until the next state change of the candidate, refreshing the accounting.
    fn wait(&mut self) -> Result<WaitStatus, SupervisorError> {
        let (status, usage) = wait4(self.pid).map_err(|e| trace_error("wait4", e))?;
        self.usage = usage;
        if matches!(status, WaitStatus::Exited(..) | WaitStatus::Signaled(..)) {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Let the candidate run until the next syscall boundary or signal.
    fn resume(&mut self) -> Result<(), SupervisorError> {
        match ptrace::syscall(self.pid, None) {
            // already gone: the next wait tells how
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(trace_error("PTRACE_SYSCALL", e)),
        }
    }

    /// Kill the candidate and reap it.
    fn kill(&mut self) -> Result<(), SupervisorError> {
        match kill(self.pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(trace_error("kill", e)),
        }
        while !self.reaped {
            self.wait()?;
        }
        self.transition(ProtocolState::Killed);
        Ok(())
    }
}

impl Drop for TracedProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!("Killing the leftover candidate {}", self.pid);
        let _ = kill(self.pid, Signal::SIGKILL);
        while !self.reaped {
            if self.wait().is_err() {
                break;
            }
        }
    }
}

/// `wait4(2)` on a single pid, retrying on `EINTR`.
fn wait4(pid: Pid) -> nix::Result<(WaitStatus, ResourceUsage)> {
    let mut status: libc::c_int = 0;
    let mut usage = MaybeUninit::<libc::rusage>::zeroed();
    loop {
        // SAFETY: both pointers are valid for writes for the whole call.
        let res = unsafe { libc::wait4(pid.as_raw(), &mut status, libc::__WALL, usage.as_mut_ptr()) };
        if res >= 0 {
            break;
        }
        match Errno::last() {
            Errno::EINTR => continue,
            e => return Err(e),
        }
    }
    // SAFETY: wait4 succeeded, so the kernel filled the struct (and it was zeroed anyway).
    let usage = unsafe { usage.assume_init() };
    Ok((WaitStatus::from_raw(pid, status)?, ResourceUsage::from(&usage)))
}

fn trace_error(op: &'static str, source: Errno) -> SupervisorError {
    SupervisorError::Trace { op, source }
}

fn cstring(path: &Path) -> Result<CString, SupervisorError> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| SupervisorError::InvalidPath(path.to_owned()))
}

/// Everything the child needs, allocated before forking: after `fork` the child only performs
/// async-signal-safe operations.
struct Launch {
    binary: CString,
    input: CString,
    output: CString,
    /// Keeps alive the strings pointed to by `argv`.
    _args: Vec<CString>,
    argv: Vec<*const libc::c_char>,
    envp: [*const libc::c_char; 1],
    limiter: ResourceLimiter,
}

impl Launch {
    fn new(
        binary: &Path,
        input: &Path,
        output: &Path,
        limits: &ResourceLimits,
    ) -> Result<Launch, SupervisorError> {
        let binary = cstring(binary)?;
        let args = vec![binary.clone()];
        let mut argv: Vec<_> = args.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());
        Ok(Launch {
            binary,
            input: cstring(input)?,
            output: cstring(output)?,
            _args: args,
            argv,
            envp: [std::ptr::null()],
            limiter: ResourceLimiter::new(limits),
        })
    }

    /// The body of the forked child. Never returns: either the image is replaced or the child
    /// exits with [`LAUNCH_FAILURE_EXIT_CODE`].
    fn exec_child(&self) -> ! {
        if self.limiter.apply().is_ok()
            && redirect(&self.input, &self.output).is_ok()
            && ptrace::traceme().is_ok()
        {
            // SAFETY: all the pointers are NUL terminated arrays of valid C strings.
            unsafe {
                libc::execve(self.binary.as_ptr(), self.argv.as_ptr(), self.envp.as_ptr());
            }
        }
        // SAFETY: _exit is async-signal-safe and skips the atexit handlers of the parent.
        unsafe { libc::_exit(LAUNCH_FAILURE_EXIT_CODE) }
    }
}

/// Point the standard input and output of the current process to the given files.
fn redirect(input: &CStr, output: &CStr) -> nix::Result<()> {
    let fd = open(input, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())?;
    move_fd(fd, libc::STDIN_FILENO)?;
    let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
    let fd = open(
        output,
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_CLOEXEC,
        mode,
    )?;
    move_fd(fd, libc::STDOUT_FILENO)
}

fn move_fd(fd: libc::c_int, target: libc::c_int) -> nix::Result<()> {
    if fd == target {
        // dup2 would keep O_CLOEXEC, which must not survive the exec
        return nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_SETFD(nix::fcntl::FdFlag::empty()))
            .map(drop);
    }
    dup2(fd, target)?;
    close(fd)
}

/// Runs candidates under a fixed policy and set of limits.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSupervisor<'a> {
    limits: &'a ResourceLimits,
    policy: &'a SyscallPolicy,
}

impl<'a> ProcessSupervisor<'a> {
    /// Make a supervisor enforcing `limits` and `policy`.
    pub fn new(limits: &'a ResourceLimits, policy: &'a SyscallPolicy) -> ProcessSupervisor<'a> {
        ProcessSupervisor { limits, policy }
    }

    /// Launch `binary` reading from `input` and writing to `output` (created or truncated), and
    /// drive it to completion.
    ///
    /// The returned outcome is always complete: the candidate has been reaped and its accounting
    /// is final. An `Err` means the supervisor failed, which maps to a system error.
    pub fn supervise(
        &self,
        binary: &Path,
        input: &Path,
        output: &Path,
    ) -> Result<ExecutionOutcome, SupervisorError> {
        if !syscalls::SUPPORTED {
            return Err(SupervisorError::Unsupported);
        }
        check_runnable(binary).map_err(|e| SupervisorError::NotRunnable {
            path: binary.to_owned(),
            reason: format!("{:#}", e),
        })?;
        let launch = Launch::new(binary, input, output, self.limits)?;
        debug!(
            "Launching {} < {} > {} with {:?}",
            binary.display(),
            input.display(),
            output.display(),
            self.limits
        );

        // SAFETY: the child only runs Launch::exec_child, which does not allocate nor lock.
        let mut process = match unsafe { fork() }.map_err(SupervisorError::Fork)? {
            ForkResult::Child => launch.exec_child(),
            ForkResult::Parent { child } => TracedProcess {
                pid: child,
                state: ProtocolState::Launching,
                usage: ResourceUsage::default(),
                in_syscall: false,
                reaped: false,
            },
        };

        let (termination, hint) = match self.drive(&mut process)? {
            Some(result) => result,
            None => {
                return Err(SupervisorError::Launch {
                    binary: binary.to_owned(),
                    input: input.to_owned(),
                    output: output.to_owned(),
                })
            }
        };
        let usage = process.usage();
        let outcome = ExecutionOutcome {
            verdict_hint: hint.or_else(|| self.check_accounting(&usage)),
            elapsed_ms: usage.elapsed_ms(),
            peak_memory_kb: usage.max_rss_kb,
            termination,
        };
        info!(
            "Candidate {} {}: {} ms, {} KiB, verdict {}",
            process.pid(),
            outcome.termination,
            outcome.elapsed_ms,
            outcome.peak_memory_kb,
            outcome
                .verdict_hint
                .map(|v| v.name())
                .unwrap_or("pending comparison"),
        );
        Ok(outcome)
    }

    /// Run the wait loop until the candidate is gone. `None` means the launch sentinel was
    /// observed.
    fn drive(
        &self,
        process: &mut TracedProcess,
    ) -> Result<Option<(Termination, Option<Verdict>)>, SupervisorError> {
        loop {
            match process.wait()? {
                WaitStatus::Exited(_, code) => {
                    if code == LAUNCH_FAILURE_EXIT_CODE {
                        if process.state() == ProtocolState::Launching {
                            return Ok(None);
                        }
                        warn!(
                            "Candidate {} exited with the system error status {}",
                            process.pid(),
                            code
                        );
                    }
                    process.transition(ProtocolState::Exited(code));
                    let hint = (code == LAUNCH_FAILURE_EXIT_CODE).then_some(Verdict::SystemError);
                    return Ok(Some((Termination::Exited(code), hint)));
                }
                WaitStatus::Signaled(_, signal, _) => {
                    // only SIGKILL ends a tracee without a signal-delivery stop first
                    process.transition(ProtocolState::Killed);
                    let verdict = classify_signal(signal, &process.usage(), self.limits);
                    return Ok(Some((Termination::Signaled(signal as i32), Some(verdict))));
                }
                WaitStatus::Stopped(pid, Signal::SIGTRAP)
                    if process.state() == ProtocolState::Launching =>
                {
                    // the candidate image is in place
                    ptrace::setoptions(
                        pid,
                        Options::PTRACE_O_TRACESYSGOOD | Options::PTRACE_O_EXITKILL,
                    )
                    .map_err(|e| trace_error("PTRACE_SETOPTIONS", e))?;
                    process.transition(ProtocolState::Running);
                    process.resume()?;
                }
                WaitStatus::Stopped(_, signal) => {
                    process.transition(ProtocolState::SignalStop(signal));
                    let verdict = classify_signal(signal, &process.usage(), self.limits);
                    warn!(
                        "Candidate {} stopped by {} ({})",
                        process.pid(),
                        signal,
                        strsignal(signal as i32)
                    );
                    process.kill()?;
                    return Ok(Some((
                        Termination::Killed(Violation::Signal(signal as i32)),
                        Some(verdict),
                    )));
                }
                WaitStatus::PtraceSyscall(_) => {
                    if process.in_syscall {
                        process.in_syscall = false;
                        process.resume()?;
                        continue;
                    }
                    process.in_syscall = true;
                    process.transition(ProtocolState::SyscallEntry);
                    if let Some(violation) = self.check_syscall(process.pid())? {
                        warn!("Candidate {} {}", process.pid(), violation);
                        process.kill()?;
                        return Ok(Some((
                            Termination::Killed(violation),
                            Some(Verdict::RuntimeError),
                        )));
                    }
                    process.transition(ProtocolState::Running);
                    process.resume()?;
                }
                WaitStatus::PtraceEvent(..) => process.resume()?,
                WaitStatus::Continued(_) | WaitStatus::StillAlive => {}
            }
        }
    }

    /// Inspect the syscall the candidate stopped at.
    fn check_syscall(&self, pid: Pid) -> Result<Option<Violation>, SupervisorError> {
        let regs = match syscalls::read_registers(pid) {
            Ok(regs) => regs,
            // already gone: the next wait tells how
            Err(Errno::ESRCH) => return Ok(None),
            Err(e) => return Err(trace_error("PTRACE_GETREGS", e)),
        };
        let number = regs.number;
        // the allow-lists are in the numbering of the host ABI only
        if regs.compat {
            return Ok(Some(Violation::CompatSyscall { number }));
        }
        if !self.policy.is_syscall_allowed(number) {
            return Ok(Some(Violation::Syscall { number }));
        }
        if let Some(arg) = self.policy.path_argument(number) {
            let path = read_cstring(pid, regs.args[arg], DEFAULT_MAX_WORDS);
            if !path.terminated || !self.policy.is_path_allowed(&path.bytes) {
                return Ok(Some(Violation::Path {
                    number,
                    path: String::from_utf8_lossy(&path.bytes).into_owned(),
                }));
            }
            trace!("Candidate {} opens {:?}", pid, String::from_utf8_lossy(&path.bytes));
        }
        Ok(None)
    }

    /// Checks on the final accounting of a candidate that exited by itself.
    fn check_accounting(&self, usage: &ResourceUsage) -> Option<Verdict> {
        let counts_rss = self.limits.memory_kind != MemoryCeiling::Stack;
        if counts_rss && usage.max_rss_kb.saturating_mul(1024) >= self.limits.memory_bytes {
            Some(Verdict::MemoryLimitExceeded)
        } else if usage.elapsed_ms() > self.limits.cpu_time_ms {
            Some(Verdict::TimeLimitExceeded)
        } else {
            None
        }
    }
}

/// Launch `binary` with its standard input from `input` and standard output to `output`, under
/// `limits` and `policy`, and drive it to completion.
pub fn supervise(
    binary: &Path,
    input: &Path,
    output: &Path,
    limits: &ResourceLimits,
    policy: &SyscallPolicy,
) -> Result<ExecutionOutcome, SupervisorError> {
    ProcessSupervisor::new(limits, policy).supervise(binary, input, output)
}
