use std::fmt;
use std::path::Path;

use itertools::{EitherOrBoth, Itertools};

use crate::CompareError;

/// The first line where the output of the candidate differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 1-based line number.
    pub line: usize,
    /// The line of the input with the same number, if any.
    pub input: Option<Vec<u8>>,
    /// The line of the expected output, `None` if the expected output is shorter.
    pub expected: Option<Vec<u8>>,
    /// The line of the actual output, `None` if the actual output is shorter.
    pub actual: Option<Vec<u8>>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |line: &Option<Vec<u8>>| match line {
            Some(line) => format!("^{}$", String::from_utf8_lossy(line)),
            None => "<end of file>".to_string(),
        };
        writeln!(f, "Input:{}", show(&self.input))?;
        writeln!(f, "Output:{}", show(&self.actual))?;
        write!(f, "Expected:{}", show(&self.expected))
    }
}

/// The lines of `content`, without their `\n`. A final line without `\n` still counts.
fn lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    let empty = content.is_empty();
    body.split(|&b| b == b'\n').filter(move |_| !empty)
}

/// Find the first line where `actual` differs from `expected`, comparing the lines byte by
/// byte. `None` means the two have the same lines.
pub fn first_mismatch(input: &[u8], expected: &[u8], actual: &[u8]) -> Option<Mismatch> {
    let mut input = lines(input);
    lines(expected)
        .zip_longest(lines(actual))
        .enumerate()
        .find_map(|(index, pair)| {
            let input = input.next();
            let (expected, actual) = match pair {
                EitherOrBoth::Both(e, a) if e == a => return None,
                EitherOrBoth::Both(e, a) => (Some(e), Some(a)),
                EitherOrBoth::Left(e) => (Some(e), None),
                EitherOrBoth::Right(a) => (None, Some(a)),
            };
            Some(Mismatch {
                line: index + 1,
                input: input.map(<[u8]>::to_vec),
                expected: expected.map(<[u8]>::to_vec),
                actual: actual.map(<[u8]>::to_vec),
            })
        })
}

/// Same as [`first_mismatch`], reading the three files.
pub fn first_mismatch_in_files<P, Q, R>(
    input: P,
    expected: Q,
    actual: R,
) -> Result<Option<Mismatch>, CompareError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let read = |path: &Path| {
        std::fs::read(path).map_err(|source| CompareError::Open {
            path: path.to_owned(),
            source,
        })
    };
    Ok(first_mismatch(
        &read(input.as_ref())?,
        &read(expected.as_ref())?,
        &read(actual.as_ref())?,
    ))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_lines() {
        assert_eq!(lines(b"").count(), 0);
        assert_eq!(lines(b"\n").collect::<Vec<_>>(), vec![b"" as &[u8]]);
        assert_eq!(lines(b"a\nb").collect::<Vec<_>>(), vec![b"a" as &[u8], b"b"]);
        assert_eq!(lines(b"a\nb\n").collect::<Vec<_>>(), vec![b"a" as &[u8], b"b"]);
    }

    #[test]
    fn test_no_mismatch() {
        assert_eq!(first_mismatch(b"1 2\n", b"3\n", b"3\n"), None);
        assert_eq!(first_mismatch(b"", b"3", b"3\n"), None);
        assert_eq!(first_mismatch(b"", b"", b""), None);
    }

    #[test]
    fn test_mismatch() {
        let res = first_mismatch(b"1\n2\n3\n", b"a\nb\nc\n", b"a\nx\nc\n");
        assert_eq!(
            res,
            Some(Mismatch {
                line: 2,
                input: Some(b"2".to_vec()),
                expected: Some(b"b".to_vec()),
                actual: Some(b"x".to_vec()),
            })
        );
        assert_eq!(
            res.unwrap().to_string(),
            "Input:^2$\nOutput:^x$\nExpected:^b$"
        );
    }

    #[test]
    fn test_shorter_output() {
        let res = first_mismatch(b"7\n", b"a\nb\n", b"a\n").unwrap();
        assert_eq!(res.line, 2);
        assert_eq!(res.input, None);
        assert_eq!(res.expected, Some(b"b".to_vec()));
        assert_eq!(res.actual, None);
        assert!(res.to_string().contains("Output:<end of file>"));
    }

    #[test]
    fn test_trailing_space_is_a_mismatch() {
        let res = first_mismatch(b"", b"5\n", b"5 \n").unwrap();
        assert_eq!(res.line, 1);
    }
}
