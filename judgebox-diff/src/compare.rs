use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use judgebox_verdict::Verdict;
use memmap2::Mmap;
use thiserror::Error;

/// Error reading one of the compared files.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The file cannot be opened or inspected.
    #[error("cannot open {}", .path.display())]
    Open {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The file cannot be mapped in memory.
    #[error("cannot map {} in memory", .path.display())]
    Map {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// The content of a file: `mmap(2)` refuses empty mappings.
enum Contents {
    Empty,
    Mapped(Mmap),
}

impl Contents {
    fn open(path: &Path) -> Result<(Contents, u64), CompareError> {
        let open_error = |source| CompareError::Open {
            path: path.to_owned(),
            source,
        };
        let file = File::open(path).map_err(open_error)?;
        let len = file.metadata().map_err(open_error)?.len();
        Ok((Contents::map(path, &file, len)?, len))
    }

    fn map(path: &Path, file: &File, len: u64) -> Result<Contents, CompareError> {
        if len == 0 {
            return Ok(Contents::Empty);
        }
        // SAFETY: the mapping is read-only and the files are not written while being compared.
        let mmap = unsafe { Mmap::map(file) }.map_err(|source| CompareError::Map {
            path: path.to_owned(),
            source,
        })?;
        Ok(Contents::Mapped(mmap))
    }
}

impl Deref for Contents {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Contents::Empty => &[],
            Contents::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Compare the file produced by the candidate with the expected one.
///
/// An actual output of `max_bytes` bytes or more is `OutputLimitExceeded`, without even reading
/// its content. Otherwise the verdict is the one of [`compare_bytes`].
pub fn compare<P: AsRef<Path>, Q: AsRef<Path>>(
    expected: P,
    actual: Q,
    max_bytes: u64,
) -> Result<Verdict, CompareError> {
    let (expected, actual) = (expected.as_ref(), actual.as_ref());
    let open_error = |source| CompareError::Open {
        path: actual.to_owned(),
        source,
    };
    let actual_file = File::open(actual).map_err(open_error)?;
    let actual_len = actual_file.metadata().map_err(open_error)?.len();
    if actual_len >= max_bytes {
        debug!(
            "{} is {} bytes long, the limit is {}",
            actual.display(),
            actual_len,
            max_bytes
        );
        return Ok(Verdict::OutputLimitExceeded);
    }
    let actual_content = Contents::map(actual, &actual_file, actual_len)?;
    let (expected_content, expected_len) = Contents::open(expected)?;
    let verdict = compare_bytes(&expected_content, &actual_content);
    debug!(
        "Compared {} ({} bytes) with {} ({} bytes): {}",
        expected.display(),
        expected_len,
        actual.display(),
        actual_len,
        verdict
    );
    Ok(verdict)
}

/// Whether the byte is whitespace for the comparison, same as `isspace(3)` in the C locale.
pub fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\x0B' | b'\x0C' | b'\r')
}

/// Compare an output with the expected one.
///
/// - Two empty outputs are `Accepted`, a single empty one is `WrongAnswer`.
/// - Byte-identical outputs are `Accepted`.
/// - After the common prefix, whitespace is skipped on both sides independently: if the rest of
///   the visible characters match the output is a `PresentationError`, otherwise a `WrongAnswer`.
pub fn compare_bytes(expected: &[u8], actual: &[u8]) -> Verdict {
    match (expected.is_empty(), actual.is_empty()) {
        (true, true) => return Verdict::Accepted,
        (true, false) | (false, true) => return Verdict::WrongAnswer,
        (false, false) => {}
    }
    let common = expected
        .iter()
        .zip(actual)
        .take_while(|(a, b)| a == b)
        .count();
    if common == expected.len() && common == actual.len() {
        return Verdict::Accepted;
    }
    let mut expected = expected[common..].iter().copied().filter(|&b| !is_space(b));
    let mut actual = actual[common..].iter().copied().filter(|&b| !is_space(b));
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return Verdict::PresentationError,
            (Some(a), Some(b)) if a == b => {}
            _ => return Verdict::WrongAnswer,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_exact() {
        assert_eq!(compare_bytes(b"5\n", b"5\n"), Verdict::Accepted);
        assert_eq!(compare_bytes(b"", b""), Verdict::Accepted);
        assert_eq!(compare_bytes(b"1 2 3\n4\n", b"1 2 3\n4\n"), Verdict::Accepted);
    }

    #[test]
    fn test_empty_side() {
        assert_eq!(compare_bytes(b"x", b""), Verdict::WrongAnswer);
        assert_eq!(compare_bytes(b"", b"x"), Verdict::WrongAnswer);
        // even if the other side is only whitespace
        assert_eq!(compare_bytes(b"\n", b""), Verdict::WrongAnswer);
    }

    #[test]
    fn test_whitespace_only_differences() {
        assert_eq!(compare_bytes(b"5\n", b"5"), Verdict::PresentationError);
        assert_eq!(compare_bytes(b"5", b"5\n\n"), Verdict::PresentationError);
        assert_eq!(compare_bytes(b"1 2 3\n", b"1  2\t3\r\n"), Verdict::PresentationError);
        assert_eq!(compare_bytes(b"1 2\n", b"1\n2\n"), Verdict::PresentationError);
        assert_eq!(compare_bytes(b"12 3\n", b"1 23\n"), Verdict::PresentationError);
        assert_eq!(compare_bytes(b"a\x0B\x0Cb", b"a b"), Verdict::PresentationError);
    }

    #[test]
    fn test_wrong() {
        assert_eq!(compare_bytes(b"5\n", b"6\n"), Verdict::WrongAnswer);
        assert_eq!(compare_bytes(b"1 2 3\n", b"1 2\n"), Verdict::WrongAnswer);
        assert_eq!(compare_bytes(b"1 2\n", b"1 2 3\n"), Verdict::WrongAnswer);
        assert_eq!(compare_bytes(b"1 2\n", b"1 2 \n3"), Verdict::WrongAnswer);
        assert_eq!(compare_bytes(b"abc", b"abd"), Verdict::WrongAnswer);
    }

    #[test]
    fn test_is_space() {
        for b in [b' ', b'\t', b'\n', b'\r', 0x0B, 0x0C] {
            assert!(is_space(b), "{:?}", b as char);
        }
        for b in [b'a', b'0', 0, 0xA0] {
            assert!(!is_space(b), "{:?}", b as char);
        }
    }
}
