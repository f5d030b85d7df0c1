use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::Parser;
use judgebox_diff::first_mismatch_in_files;

#[derive(Parser, Debug, Clone)]
pub struct HintOpt {
    /// The input given to the candidate
    pub input: PathBuf,

    /// The expected output
    pub expected: PathBuf,

    /// The output produced by the candidate
    pub actual: PathBuf,
}

/// Entry point of `judgebox hint`: prints the first mismatching line, if any, to stderr.
pub fn main_hint(opt: HintOpt) -> Result<(), Error> {
    let mismatch = first_mismatch_in_files(&opt.input, &opt.expected, &opt.actual)
        .context("Failed to read the files to hint about")?;
    match mismatch {
        Some(mismatch) => {
            debug!("First mismatch at line {}", mismatch.line);
            eprintln!("{}", mismatch);
        }
        None => debug!("No line differs"),
    }
    Ok(())
}
