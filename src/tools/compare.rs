use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::Parser;
use judgebox_diff::compare;
use judgebox_verdict::Verdict;

#[derive(Parser, Debug, Clone)]
pub struct CompareOpt {
    /// The expected output
    pub expected: PathBuf,

    /// The output produced by the candidate
    pub actual: PathBuf,

    /// An output of this size, in bytes, or larger is not even compared
    #[clap(long = "output-limit", default_value = "33554432")]
    pub output_limit: u64,
}

/// Entry point of `judgebox compare`.
pub fn main_compare(opt: CompareOpt) -> Result<Verdict, Error> {
    let verdict = compare(&opt.expected, &opt.actual, opt.output_limit).with_context(|| {
        format!(
            "Failed to compare {} with {}",
            opt.actual.display(),
            opt.expected.display()
        )
    })?;
    println!("{}", verdict);
    Ok(verdict)
}
