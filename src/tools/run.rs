use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::Parser;
use judgebox_exec::{classify, supervise, Classification};
use judgebox_verdict::Verdict;

use crate::{LimitsOpt, PolicyOpt};

#[derive(Parser, Debug, Clone)]
pub struct RunOpt {
    /// The executable to run
    pub executable: PathBuf,

    /// File to use as the standard input
    pub input: PathBuf,

    /// File to write the standard output to, it is created or truncated
    pub output: PathBuf,

    /// Print the outcome of the run as JSON to stdout
    #[clap(long)]
    pub json: bool,

    #[clap(flatten, next_help_heading = Some("LIMITS"))]
    pub limits: LimitsOpt,

    #[clap(flatten, next_help_heading = Some("POLICY"))]
    pub policy: PolicyOpt,
}

/// Entry point of `judgebox run`. `None` means the output still has to be compared.
pub fn main_run(opt: RunOpt) -> Result<Option<Verdict>, Error> {
    let limits = opt.limits.limits()?;
    let policy = opt.policy.policy()?;
    let outcome = supervise(&opt.executable, &opt.input, &opt.output, &limits, &policy)
        .with_context(|| format!("Failed to run {}", opt.executable.display()))?;
    if opt.json {
        println!(
            "{}",
            serde_json::to_string(&outcome).context("Failed to serialize the outcome")?
        );
    }
    match classify(&outcome) {
        Classification::Final(verdict) => {
            eprintln!("{}: {}", verdict, outcome.termination);
            Ok(Some(verdict))
        }
        Classification::NeedsComparison => {
            eprintln!(
                "TIME: {}MS MEM: {}KB",
                outcome.elapsed_ms, outcome.peak_memory_kb
            );
            Ok(None)
        }
    }
}
