//! The outcome taxonomy of a judged run.
//!
//! Every supervised run of a candidate ends with exactly one [`Verdict`]. The verdict is also
//! what the command line tools report through their exit status, so each variant has a stable
//! numeric code (see [`Verdict::exit_code`]).

#![deny(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal classification of a judged run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// The output matches the expected one byte by byte.
    Accepted,
    /// The output differs from the expected one in some visible character.
    WrongAnswer,
    /// The output matches the expected one except for the placement of whitespace.
    PresentationError,
    /// The candidate produced more output than allowed.
    OutputLimitExceeded,
    /// The candidate used more CPU time than allowed.
    TimeLimitExceeded,
    /// The candidate used more memory than allowed.
    MemoryLimitExceeded,
    /// The candidate crashed or violated the syscall policy.
    RuntimeError,
    /// The judge itself failed, the candidate is not to blame.
    SystemError,
    /// The candidate source did not compile.
    CompileError,
}

/// A textual or numeric verdict that does not name any known [`Verdict`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidVerdict {
    /// The name is not one of the known verdict names.
    #[error("unknown verdict name {0:?}")]
    Name(String),
    /// The exit code does not encode a verdict.
    #[error("exit code {0} does not encode a verdict")]
    ExitCode(i32),
}

impl Verdict {
    /// All the verdicts, in exit-code order.
    pub const ALL: [Verdict; 9] = [
        Verdict::SystemError,
        Verdict::CompileError,
        Verdict::RuntimeError,
        Verdict::TimeLimitExceeded,
        Verdict::MemoryLimitExceeded,
        Verdict::OutputLimitExceeded,
        Verdict::PresentationError,
        Verdict::WrongAnswer,
        Verdict::Accepted,
    ];

    /// The exit status used by the command line tools to report this verdict.
    pub const fn exit_code(self) -> i32 {
        match self {
            Verdict::SystemError => 1,
            Verdict::CompileError => 2,
            Verdict::RuntimeError => 3,
            Verdict::TimeLimitExceeded => 4,
            Verdict::MemoryLimitExceeded => 5,
            Verdict::OutputLimitExceeded => 6,
            Verdict::PresentationError => 7,
            Verdict::WrongAnswer => 8,
            Verdict::Accepted => 9,
        }
    }

    /// Decode an exit status produced by [`Verdict::exit_code`].
    pub fn from_exit_code(code: i32) -> Result<Verdict, InvalidVerdict> {
        Verdict::ALL
            .iter()
            .copied()
            .find(|v| v.exit_code() == code)
            .ok_or(InvalidVerdict::ExitCode(code))
    }

    /// The upper case name of the verdict, e.g. `TIME_LIMIT_EXCEEDED`.
    pub fn name(self) -> &'static str {
        match self {
            Verdict::Accepted => "ACCEPTED",
            Verdict::WrongAnswer => "WRONG_ANSWER",
            Verdict::PresentationError => "PRESENTATION_ERROR",
            Verdict::OutputLimitExceeded => "OUTPUT_LIMIT_EXCEEDED",
            Verdict::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Verdict::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Verdict::RuntimeError => "RUNTIME_ERROR",
            Verdict::SystemError => "SYSTEM_ERROR",
            Verdict::CompileError => "COMPILE_ERROR",
        }
    }

    /// Whether this is the only successful verdict.
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Verdict {
    type Err = InvalidVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        Verdict::ALL
            .iter()
            .copied()
            .find(|v| v.name() == upper)
            .ok_or_else(|| InvalidVerdict::Name(s.to_string()))
    }
}
