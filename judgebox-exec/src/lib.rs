//! Supervised execution of untrusted candidates.
//!
//! This crate launches a candidate executable under `ptrace(2)`, with its standard input and
//! output redirected to files, and drives it to completion while enforcing:
//!
//! - a [`SyscallPolicy`]: every system call is inspected on entry and a call outside the
//!   allow-list, or an `open` of a path outside the allow-list, kills the candidate;
//! - the [`ResourceLimits`]: CPU time, memory and output size ceilings are installed with
//!   `setrlimit(2)` before the candidate's first instruction and enforced by the kernel.
//!
//! The entry point is [`supervise`] (or [`ProcessSupervisor`] for repeated runs sharing the same
//! configuration). It returns an [`ExecutionOutcome`] which [`classify`] turns into either a final
//! [`Verdict`](judgebox_verdict::Verdict) or the request to compare the produced output.
//!
//! ## Implementation details
//!
//! The supervising side never touches the memory of the candidate except through the word-sized
//! debug reads of [`peek`], and it blocks only in `wait4(2)`, one state change at a time. The
//! candidate is forked, applies its own limits and redirections, asks to be traced and then
//! replaces its image; a failure in any of these steps is reported through a sentinel exit status
//! before the image is replaced.
//!
//! Only Linux on x86 and x86-64 is able to trace candidates: on any other target [`supervise`]
//! fails with [`SupervisorError::Unsupported`].

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod classify;
pub mod detect_exe;
mod limits;
pub mod peek;
mod policy;
mod signals;
mod supervisor;
pub mod syscalls;

pub use classify::{classify, classify_fault, classify_signal, Classification};
pub use limits::{MemoryCeiling, ResourceLimiter, ResourceLimits};
pub use policy::{PolicyError, PolicySpec, SyscallPolicy};
pub use signals::strsignal;
pub use supervisor::{
    supervise, ExecutionOutcome, ProcessSupervisor, ProtocolState, ResourceUsage,
    SupervisorError, Termination, TracedProcess, Violation, LAUNCH_FAILURE_EXIT_CODE,
};
