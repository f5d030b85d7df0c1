use std::path::PathBuf;

use anyhow::{Context, Error};
use clap::Parser;
use judgebox_verdict::Verdict;

use crate::judge::{prepare_submission, Judge, Prepared};
use crate::testdata::enumerate_cases;
use crate::{LimitsOpt, PolicyOpt};

#[derive(Parser, Debug, Clone)]
pub struct JudgeOpt {
    /// The submission: a C or C++ source file, or an executable
    pub submission: PathBuf,

    /// Directory with the test cases, as pairs of files <n>.in and <n>.out
    pub testdata: PathBuf,

    /// Print the report as JSON to stdout instead of one line per case
    #[clap(long)]
    pub json: bool,

    #[clap(flatten, next_help_heading = Some("LIMITS"))]
    pub limits: LimitsOpt,

    #[clap(flatten, next_help_heading = Some("POLICY"))]
    pub policy: PolicyOpt,
}

/// Entry point of `judgebox judge`.
pub fn main_judge(opt: JudgeOpt) -> Result<Verdict, Error> {
    let limits = opt.limits.limits()?;
    let policy = opt.policy.policy()?;
    let cases = enumerate_cases(&opt.testdata)?;
    let candidate = match prepare_submission(&opt.submission)
        .with_context(|| format!("Failed to prepare {}", opt.submission.display()))?
    {
        Prepared::Ready(candidate) => candidate,
        Prepared::CompileError => {
            println!("{}", Verdict::CompileError);
            return Ok(Verdict::CompileError);
        }
    };

    let judge = Judge::new(&limits, &policy);
    let report = judge.judge_all(candidate.path(), &cases, |result| {
        if !opt.json {
            println!("{}", result);
        }
    })?;
    if opt.json {
        println!(
            "{}",
            serde_json::to_string(&report).context("Failed to serialize the report")?
        );
    } else {
        println!("{}", report.verdict);
    }
    Ok(report.verdict)
}
