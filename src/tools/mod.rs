//! The subcommands of the `judgebox` binary. Each of them returns the verdict to encode in the
//! exit status.

pub mod compare;
pub mod hint;
pub mod judge;
pub mod run;
