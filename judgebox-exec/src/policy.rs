use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::syscalls;

/// Error building a [`SyscallPolicy`] from a [`PolicySpec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The syscall name is not known on this architecture.
    #[error("unknown syscall {0:?} on this architecture")]
    UnknownSyscall(String),
    /// Allowed paths and directories must be absolute.
    #[error("allowed path {0:?} is not absolute")]
    RelativePath(PathBuf),
}

/// The serialized form of a policy, as written in a policy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PolicySpec {
    /// Names of the allowed syscalls.
    pub syscalls: Vec<String>,
    /// Files the candidate may open.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Directories whose content the candidate may open.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

/// The allow-lists enforced on a candidate.
///
/// A policy is immutable once built and is shared by reference by every run that uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallPolicy {
    /// Numbers of the syscalls the candidate may invoke.
    allowed_syscalls: BTreeSet<i64>,
    /// Exact paths the candidate may open.
    allowed_paths: BTreeSet<PathBuf>,
    /// Directories under which every path may be opened.
    allowed_dirs: Vec<PathBuf>,
}

impl SyscallPolicy {
    /// Build a policy from syscall numbers and exact paths.
    pub fn new<S, P>(syscalls: S, paths: P) -> SyscallPolicy
    where
        S: IntoIterator<Item = i64>,
        P: IntoIterator,
        P::Item: Into<PathBuf>,
    {
        SyscallPolicy {
            allowed_syscalls: syscalls.into_iter().collect(),
            allowed_paths: paths.into_iter().map(Into::into).collect(),
            allowed_dirs: vec![],
        }
    }

    /// Also allow every path under these directories.
    pub fn with_dirs<D>(mut self, dirs: D) -> SyscallPolicy
    where
        D: IntoIterator,
        D::Item: Into<PathBuf>,
    {
        self.allowed_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// The minimal policy for C and C++ programs on the host architecture.
    pub fn host_default() -> SyscallPolicy {
        let syscalls = syscalls::default_syscalls()
            .iter()
            .filter_map(|name| syscalls::number(name));
        SyscallPolicy::new(syscalls, syscalls::default_paths().iter().copied())
    }

    /// Resolve the names of a [`PolicySpec`] against the host syscall table.
    pub fn from_spec(spec: &PolicySpec) -> Result<SyscallPolicy, PolicyError> {
        let syscalls = spec
            .syscalls
            .iter()
            .map(|name| {
                syscalls::number(name).ok_or_else(|| PolicyError::UnknownSyscall(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(path) = spec
            .paths
            .iter()
            .chain(spec.dirs.iter())
            .find(|p| !p.is_absolute())
        {
            return Err(PolicyError::RelativePath(path.clone()));
        }
        Ok(SyscallPolicy::new(syscalls, spec.paths.iter().cloned()).with_dirs(spec.dirs.clone()))
    }

    /// Convert back to the serialized form. Syscalls without a known name are dropped.
    pub fn to_spec(&self) -> PolicySpec {
        PolicySpec {
            syscalls: self
                .allowed_syscalls
                .iter()
                .filter_map(|nr| syscalls::name(*nr))
                .map(String::from)
                .collect(),
            paths: self.allowed_paths.iter().cloned().collect(),
            dirs: self.allowed_dirs.clone(),
        }
    }

    /// Whether the candidate may invoke the syscall with this number.
    pub fn is_syscall_allowed(&self, number: i64) -> bool {
        self.allowed_syscalls.contains(&number)
    }

    /// If the syscall opens a file, the index of the argument holding the path to check.
    pub fn path_argument(&self, number: i64) -> Option<usize> {
        syscalls::path_argument(number)
    }

    /// Whether the candidate may open the file at `path`, given as raw bytes read from its
    /// memory.
    ///
    /// Exact paths are compared byte by byte. A directory allows a path only if the path is
    /// absolute, lies under the directory and has no `..` components.
    pub fn is_path_allowed(&self, path: &[u8]) -> bool {
        let path = Path::new(OsStr::from_bytes(path));
        if self.allowed_paths.contains(path) {
            return true;
        }
        if !path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return false;
        }
        self.allowed_dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// The allowed syscall numbers, in increasing order.
    pub fn allowed_syscalls(&self) -> impl Iterator<Item = i64> + '_ {
        self.allowed_syscalls.iter().copied()
    }

    /// The exact paths allowed.
    pub fn allowed_paths(&self) -> impl Iterator<Item = &Path> {
        self.allowed_paths.iter().map(PathBuf::as_path)
    }
}

impl Default for SyscallPolicy {
    fn default() -> Self {
        SyscallPolicy::host_default()
    }
}
