//! Enumeration of the test cases in a directory.
//!
//! A test case is a pair of files `<n>.in` and `<n>.out` where `n` is a non negative number. The
//! cases are judged in increasing order of `n`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use itertools::Itertools;

/// A single test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// The number of the case.
    pub index: usize,
    /// The file to feed to the candidate.
    pub input: PathBuf,
    /// The expected output.
    pub expected: PathBuf,
}

/// Find all the test cases inside `dir`, sorted by number.
///
/// Every `<n>.in` must have its `<n>.out`. Files with other names are ignored.
pub fn enumerate_cases<P: AsRef<Path>>(dir: P) -> Result<Vec<TestCase>, Error> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list the test data in {}", dir.display()))?;
    let mut indices = vec![];
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to list the test data in {}", dir.display()))?;
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "in") {
            continue;
        }
        let index = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| {
                let index = stem.parse::<usize>().ok()?;
                // `01` or `+1` would name the same case as `1`
                (index.to_string() == stem).then_some(index)
            });
        match index {
            Some(index) => indices.push(index),
            None => debug!("Ignoring {}: not a numbered input", path.display()),
        }
    }
    if indices.is_empty() {
        bail!("No test case (<n>.in / <n>.out) found in {}", dir.display());
    }

    let mut cases = vec![];
    for index in indices.into_iter().sorted() {
        let input = dir.join(format!("{}.in", index));
        let expected = dir.join(format!("{}.out", index));
        if !expected.is_file() {
            bail!(
                "Test case {} has no expected output: {} is missing",
                index,
                expected.display()
            );
        }
        cases.push(TestCase {
            index,
            input,
            expected,
        });
    }
    debug!("Found {} test cases in {}", cases.len(), dir.display());
    Ok(cases)
}
