//! Recognize the kind of an executable from its header.

use std::fs::File;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{bail, Context, Error};

use crate::syscalls::WORD_BITS;

/// The kind of a file the kernel may be able to execute.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub enum ExecutableKind {
    /// A 32-bit ELF binary.
    Elf32,
    /// A 64-bit ELF binary.
    Elf64,
    /// A script starting with a `#!` interpreter line.
    Script,
    /// A Windows PE binary.
    Windows,
    /// A Mach-O binary, possibly fat.
    MacOs,
}

impl ExecutableKind {
    /// Whether the candidate can run on this host using the syscall table of the host.
    ///
    /// A 32-bit binary on a 64-bit host uses a different syscall numbering, so the policy would be
    /// checked against the wrong table.
    pub fn runs_on_host(self) -> bool {
        match self {
            ExecutableKind::Elf32 => WORD_BITS == 32,
            ExecutableKind::Elf64 => WORD_BITS == 64,
            ExecutableKind::Script => true,
            ExecutableKind::Windows | ExecutableKind::MacOs => false,
        }
    }
}

/// A list of patterns for matching the header of the executables of the various platforms.
const PATTERNS: [(&[u8], ExecutableKind); 8] = [
    (b"\x7F\x45\x4C\x46\x01", ExecutableKind::Elf32),
    (b"\x7F\x45\x4C\x46\x02", ExecutableKind::Elf64),
    (b"#!", ExecutableKind::Script),
    (b"\x4D\x5A", ExecutableKind::Windows),
    (b"\xCE\xFA\xED\xFE", ExecutableKind::MacOs),
    (b"\xCF\xFA\xED\xFE", ExecutableKind::MacOs),
    (b"\xBE\xBA\xFE\xCA", ExecutableKind::MacOs),
    (b"\xBF\xBA\xFE\xCA", ExecutableKind::MacOs),
];

/// Given a path to a file, check if the file is an executable.
///
/// - If there is an error reading the file, `Err(_)` is returned.
/// - If the file is not recognized as an executable, `Ok(None)` is returned.
/// - Otherwise `Ok(Some(kind))` is returned.
pub fn detect_exe<P: AsRef<Path>>(path: P) -> Result<Option<ExecutableKind>, Error> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open file {} for detecting exe", path.display()))?;
    let mut header = Vec::with_capacity(5);
    file.take(5).read_to_end(&mut header).with_context(|| {
        format!(
            "Failed to read file content of {} for detecting exe",
            path.display()
        )
    })?;
    Ok(PATTERNS
        .iter()
        .find(|(bytes, _)| header.starts_with(bytes))
        .map(|(_, kind)| *kind))
}

/// Check that the file at `path` can be launched as a candidate on this host.
pub fn check_runnable<P: AsRef<Path>>(path: P) -> Result<ExecutableKind, Error> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat executable {}", path.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a regular file", path.display());
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        bail!("{} is not executable", path.display());
    }
    match detect_exe(path)? {
        Some(kind) if kind.runs_on_host() => Ok(kind),
        Some(kind) => bail!(
            "{} is a {:?} executable, which cannot run on this {}-bit host",
            path.display(),
            kind,
            WORD_BITS
        ),
        None => bail!("{} is not a recognized executable", path.display()),
    }
}
