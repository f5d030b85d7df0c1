//! Comparison of the output of a candidate with the expected one.
//!
//! [`compare`] decides between [`Accepted`](judgebox_verdict::Verdict::Accepted),
//! [`PresentationError`](judgebox_verdict::Verdict::PresentationError) and
//! [`WrongAnswer`](judgebox_verdict::Verdict::WrongAnswer): it is strict about the visible
//! characters and lenient about the whitespace between them. [`first_mismatch`] points at the
//! first line that differs, to help the author of the candidate.

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod compare;
mod hint;

pub use compare::{compare, compare_bytes, is_space, CompareError};
pub use hint::{first_mismatch, first_mismatch_in_files, Mismatch};
