//! Judging a submission against a list of test cases.
//!
//! The cases are run one after the other, each with its own temporary output file, and the
//! judging stops at the first case that is not accepted.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Error};
use judgebox_diff::compare;
use judgebox_exec::detect_exe::detect_exe;
use judgebox_exec::{classify, Classification, ProcessSupervisor, ResourceLimits, SyscallPolicy};
use judgebox_lang::{compile, Compilation, LanguageManager};
use judgebox_verdict::Verdict;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::testdata::TestCase;

/// A submission ready to be run.
#[derive(Debug)]
pub struct Candidate {
    executable: PathBuf,
    /// Holds the compiled binary, if the submission was compiled.
    _workdir: Option<TempDir>,
}

impl Candidate {
    /// The executable to run.
    pub fn path(&self) -> &Path {
        &self.executable
    }
}

/// The outcome of the preparation of a submission.
#[derive(Debug)]
pub enum Prepared {
    /// The submission can be run.
    Ready(Candidate),
    /// The compiler rejected the submission.
    CompileError,
}

/// Make the submission at `path` runnable: an executable is used as is, a source file is compiled
/// into a temporary directory.
pub fn prepare_submission<P: AsRef<Path>>(path: P) -> Result<Prepared, Error> {
    let path = path.as_ref();
    if let Some(kind) = detect_exe(path)? {
        debug!("{} is already an executable ({:?})", path.display(), kind);
        return Ok(Prepared::Ready(Candidate {
            executable: path.to_owned(),
            _workdir: None,
        }));
    }
    let lang = LanguageManager::from_env()?
        .find(path)
        .ok_or_else(|| anyhow!("Unknown language of {}", path.display()))?;
    let workdir = tempfile::Builder::new()
        .prefix("judgebox-")
        .tempdir()
        .context("Failed to create the compilation directory")?;
    let dest = workdir.path().join("candidate");
    match compile(lang.as_ref(), path, &dest)? {
        Compilation::Compiled(executable) => Ok(Prepared::Ready(Candidate {
            executable,
            _workdir: Some(workdir),
        })),
        Compilation::Failed(_) => Ok(Prepared::CompileError),
    }
}

/// The verdict of a single test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    /// The number of the case.
    pub index: usize,
    /// The verdict of the case.
    pub verdict: Verdict,
    /// CPU time used, in milliseconds.
    pub elapsed_ms: u64,
    /// Peak memory used, in KiB.
    pub peak_memory_kb: u64,
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "case {}: {} ({} ms, {} KiB)",
            self.index, self.verdict, self.elapsed_ms, self.peak_memory_kb
        )
    }
}

/// The verdicts of a judged submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeReport {
    /// The cases that have been run, in order. The last one is the first not accepted, if any.
    pub cases: Vec<CaseResult>,
    /// The final verdict.
    pub verdict: Verdict,
}

/// Runs a candidate on the test cases.
pub struct Judge<'a> {
    limits: &'a ResourceLimits,
    supervisor: ProcessSupervisor<'a>,
}

impl<'a> Judge<'a> {
    /// Make a judge enforcing `limits` and `policy` on every case.
    pub fn new(limits: &'a ResourceLimits, policy: &'a SyscallPolicy) -> Judge<'a> {
        Judge {
            limits,
            supervisor: ProcessSupervisor::new(limits, policy),
        }
    }

    /// Run `executable` on a single case.
    pub fn judge_case(&self, executable: &Path, case: &TestCase) -> Result<CaseResult, Error> {
        let output = tempfile::Builder::new()
            .prefix("judgebox-")
            .suffix(".out")
            .tempfile()
            .context("Failed to create the output file")?;
        let outcome = self
            .supervisor
            .supervise(executable, &case.input, output.path())
            .with_context(|| format!("Failed to run case {}", case.index))?;
        let verdict = match classify(&outcome) {
            Classification::Final(verdict) => verdict,
            Classification::NeedsComparison => {
                compare(&case.expected, output.path(), self.limits.max_output_bytes)
                    .with_context(|| format!("Failed to check case {}", case.index))?
            }
        };
        Ok(CaseResult {
            index: case.index,
            verdict,
            elapsed_ms: outcome.elapsed_ms,
            peak_memory_kb: outcome.peak_memory_kb,
        })
    }

    /// Run `executable` on the cases in order, calling `on_case` after each of them, until one is
    /// not accepted.
    pub fn judge_all<F>(
        &self,
        executable: &Path,
        cases: &[TestCase],
        mut on_case: F,
    ) -> Result<JudgeReport, Error>
    where
        F: FnMut(&CaseResult),
    {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let result = self.judge_case(executable, case)?;
            on_case(&result);
            let verdict = result.verdict;
            results.push(result);
            if !verdict.is_accepted() {
                info!("Stopping at case {}: {}", case.index, verdict);
                return Ok(JudgeReport {
                    cases: results,
                    verdict,
                });
            }
        }
        Ok(JudgeReport {
            cases: results,
            verdict: Verdict::Accepted,
        })
    }
}
