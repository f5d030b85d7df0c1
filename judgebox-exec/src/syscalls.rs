//! Architecture specific knowledge: syscall numbers, their names, where the calling convention
//! puts the syscall number and its arguments, and the default allow-lists.
//!
//! The syscall number and the first two arguments are read from the register set saved by the
//! kernel when the tracee stopped at a syscall boundary:
//!
//! | arch     | number     | arg 0 | arg 1 |
//! |----------|------------|-------|-------|
//! | x86-64   | `orig_rax` | `rdi` | `rsi` |
//! | x86      | `orig_eax` | `ebx` | `ecx` |
//!
//! On x86-64 a process can still enter the kernel through the i386 gate (`int $0x80`), with the
//! i386 numbering: such calls are flagged as `compat` since the x86-64 table does not apply.

use nix::unistd::Pid;

/// The registers of a tracee stopped at a syscall entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallRegisters {
    /// The syscall number.
    pub number: i64,
    /// The first two arguments, zero-extended to 64 bits.
    pub args: [u64; 2],
    /// The syscall was made through the 32-bit entry point (`int $0x80`) of a 64-bit kernel, so
    /// `number` and `args` follow the i386 convention.
    pub compat: bool,
}

/// Build a `(name, number)` table from the names of the `libc::SYS_*` constants.
macro_rules! syscall_table {
    ($($name:ident),* $(,)?) => {
        paste::paste! {
            &[$((stringify!($name), libc::[<SYS_ $name>] as i64)),*]
        }
    };
}

#[cfg(target_arch = "x86_64")]
mod arch {
    use nix::sys::ptrace;
    use nix::unistd::Pid;

    use super::SyscallRegisters;

    pub const SUPPORTED: bool = true;

    /// `__USER32_CS`: the code segment of 32-bit user code.
    const COMPAT_CODE_SEGMENT: u64 = 0x23;

    pub fn read_registers(pid: Pid) -> nix::Result<SyscallRegisters> {
        let regs = ptrace::getregs(pid)?;
        if regs.cs == COMPAT_CODE_SEGMENT {
            return Ok(SyscallRegisters {
                number: regs.orig_rax as i64,
                args: [regs.rbx as u32 as u64, regs.rcx as u32 as u64],
                compat: true,
            });
        }
        Ok(SyscallRegisters {
            number: regs.orig_rax as i64,
            args: [regs.rdi, regs.rsi],
            compat: false,
        })
    }

    pub const TABLE: &[(&str, i64)] = syscall_table![
        read, write, open, close, stat, fstat, lstat, poll, lseek, mmap, mprotect, munmap, brk,
        rt_sigaction, rt_sigprocmask, rt_sigreturn, ioctl, pread64, pwrite64, readv, writev,
        access, pipe, select, sched_yield, mremap, msync, mincore, madvise, dup, dup2, nanosleep,
        getpid, socket, connect, clone, fork, vfork, execve, exit, wait4, kill, uname, fcntl,
        getcwd, chdir, rename, mkdir, rmdir, creat, link, unlink, readlink, chmod, gettimeofday,
        getrlimit, getrusage, sysinfo, times, getuid, getgid, geteuid, getegid, getppid,
        sigaltstack, arch_prctl, setrlimit, gettid, time, futex, set_tid_address, clock_gettime,
        clock_getres, clock_nanosleep, exit_group, tgkill, openat, newfstatat, readlinkat,
        set_robust_list, get_robust_list, pipe2, dup3, prlimit64, getrandom, statx, rseq, clone3,
    ];

    pub const DEFAULT_SYSCALLS: &[&str] = &[
        // I/O on the redirected descriptors and on the shared libraries
        "read", "write", "open", "openat", "close", "lseek", "fstat", "newfstatat", "pread64",
        "access", "readlink",
        // address space management
        "mmap", "mprotect", "munmap", "brk", "mremap", "madvise",
        // process start up and exit
        "uname", "arch_prctl", "set_tid_address", "set_robust_list", "rseq", "prlimit64",
        "getrandom", "futex", "exit", "exit_group",
    ];

    pub const DEFAULT_PATHS: &[&str] = &[
        "/etc/ld.so.cache",
        // C
        "/lib/x86_64-linux-gnu/libc.so.6",
        "/lib/x86_64-linux-gnu/libm.so.6",
        "/usr/lib/x86_64-linux-gnu/libc.so.6",
        "/usr/lib/x86_64-linux-gnu/libm.so.6",
        // C++
        "/lib/x86_64-linux-gnu/libgcc_s.so.1",
        "/usr/lib/x86_64-linux-gnu/libgcc_s.so.1",
        "/lib/x86_64-linux-gnu/libstdc++.so.6",
        "/usr/lib/x86_64-linux-gnu/libstdc++.so.6",
    ];

    pub const PATH_ARGUMENT: &[(i64, usize)] =
        &[(libc::SYS_open as i64, 0), (libc::SYS_openat as i64, 1)];
}

#[cfg(target_arch = "x86")]
mod arch {
    use nix::sys::ptrace;
    use nix::unistd::Pid;

    use super::SyscallRegisters;

    pub const SUPPORTED: bool = true;

    pub fn read_registers(pid: Pid) -> nix::Result<SyscallRegisters> {
        let regs = ptrace::getregs(pid)?;
        Ok(SyscallRegisters {
            number: regs.orig_eax as i64,
            args: [regs.ebx as u32 as u64, regs.ecx as u32 as u64],
            compat: false,
        })
    }

    pub const TABLE: &[(&str, i64)] = syscall_table![
        read, write, open, close, stat64, fstat64, lstat64, fstatat64, poll, lseek, _llseek, mmap,
        mmap2, mprotect, munmap, brk, rt_sigaction, rt_sigprocmask, rt_sigreturn, ioctl, pread64,
        readv, writev, access, pipe, sched_yield, mremap, madvise, dup, dup2, nanosleep, getpid,
        clone, fork, vfork, execve, exit, wait4, kill, uname, fcntl64, getcwd, chdir, rename,
        mkdir, rmdir, creat, link, unlink, readlink, time, futex, set_thread_area,
        set_tid_address, clock_gettime, exit_group, tgkill, openat, set_robust_list, prlimit64,
        getrandom,
    ];

    pub const DEFAULT_SYSCALLS: &[&str] = &[
        "read", "write", "open", "openat", "close", "lseek", "_llseek", "fstat64", "fstatat64",
        "pread64", "access", "readlink", "mmap2", "mprotect", "munmap", "brk", "mremap",
        "madvise", "uname", "set_thread_area", "set_tid_address", "set_robust_list",
        "prlimit64", "getrandom", "futex", "exit", "exit_group",
    ];

    pub const DEFAULT_PATHS: &[&str] = &[
        "/etc/ld.so.cache",
        "/lib/i386-linux-gnu/libc.so.6",
        "/lib/i386-linux-gnu/libm.so.6",
        "/lib/i386-linux-gnu/libgcc_s.so.1",
        "/usr/lib/i386-linux-gnu/libstdc++.so.6",
    ];

    pub const PATH_ARGUMENT: &[(i64, usize)] =
        &[(libc::SYS_open as i64, 0), (libc::SYS_openat as i64, 1)];
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
mod arch {
    use nix::errno::Errno;
    use nix::unistd::Pid;

    use super::SyscallRegisters;

    pub const SUPPORTED: bool = false;

    pub fn read_registers(_pid: Pid) -> nix::Result<SyscallRegisters> {
        Err(Errno::ENOSYS)
    }

    pub const TABLE: &[(&str, i64)] = &[];
    pub const DEFAULT_SYSCALLS: &[&str] = &[];
    pub const DEFAULT_PATHS: &[&str] = &[];
    pub const PATH_ARGUMENT: &[(i64, usize)] = &[];
}

/// Whether candidates can be traced on this architecture.
pub const SUPPORTED: bool = arch::SUPPORTED;

/// Width in bits of a machine word of the host.
pub const WORD_BITS: usize = std::mem::size_of::<libc::c_long>() * 8;

/// Read the syscall number and arguments of a tracee stopped at a syscall boundary.
pub fn read_registers(pid: Pid) -> nix::Result<SyscallRegisters> {
    arch::read_registers(pid)
}

/// All the syscalls known by name on this architecture.
pub fn table() -> &'static [(&'static str, i64)] {
    arch::TABLE
}

/// The number of the syscall with the given name.
pub fn number(name: &str) -> Option<i64> {
    arch::TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, nr)| *nr)
}

/// The name of the syscall with the given number, if known.
pub fn name(number: i64) -> Option<&'static str> {
    arch::TABLE
        .iter()
        .find(|(_, nr)| *nr == number)
        .map(|(n, _)| *n)
}

/// If the syscall opens a file, the index of the argument holding the path.
pub fn path_argument(number: i64) -> Option<usize> {
    arch::PATH_ARGUMENT
        .iter()
        .find(|(nr, _)| *nr == number)
        .map(|(_, arg)| *arg)
}

/// Names of the syscalls a C or C++ program needs to start, compute and exit.
pub fn default_syscalls() -> &'static [&'static str] {
    arch::DEFAULT_SYSCALLS
}

/// Paths a dynamically linked C or C++ program needs to open to start.
pub fn default_paths() -> &'static [&'static str] {
    arch::DEFAULT_PATHS
}
