//! # judgebox
//!
//! This is both an application and a library. The library exposes the pieces of the `judgebox`
//! binary: the command line options, the enumeration of the test data and the judging harness,
//! built on top of the `judgebox-exec`, `judgebox-diff` and `judgebox-lang` crates.

#[macro_use]
extern crate log;

pub mod error;
pub mod judge;
mod opt;
pub mod testdata;
pub mod tools;

pub use opt::*;
