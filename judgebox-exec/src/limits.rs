use std::io;

use rlimit::Resource;
use serde::{Deserialize, Serialize};

/// Which kernel ceiling is used to bound the memory of the candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryCeiling {
    /// `RLIMIT_DATA`: heap, data segment and private anonymous mappings.
    Data,
    /// `RLIMIT_AS`: the whole virtual address space, shared libraries included.
    AddressSpace,
    /// `RLIMIT_STACK`: only the main thread stack.
    Stack,
}

/// Limits on a single supervised run.
///
/// These are installed once, in the candidate process, before its entry point runs. After that
/// moment they are enforced by the kernel alone and cannot be changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLimits {
    /// Limit on the user plus system CPU time, in milliseconds.
    pub cpu_time_ms: u64,
    /// Limit on the memory, in bytes. The meaning depends on `memory_kind`.
    pub memory_bytes: u64,
    /// Which kernel ceiling `memory_bytes` is applied to.
    pub memory_kind: MemoryCeiling,
    /// Maximum number of bytes the candidate may write to its output file.
    pub max_output_bytes: u64,
    /// A segmentation fault with a peak resident set below `fault_ratio * memory_bytes` is
    /// considered a denied allocation, i.e. a memory limit breach.
    pub fault_ratio: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            cpu_time_ms: 1500,
            memory_bytes: 16 * 1024 * 1024,
            memory_kind: MemoryCeiling::Data,
            max_output_bytes: 1 << 25,
            fault_ratio: 0.5,
        }
    }
}

impl ResourceLimits {
    /// Set the CPU time limit, in milliseconds.
    pub fn cpu_time_ms(&mut self, ms: u64) -> &mut Self {
        self.cpu_time_ms = ms;
        self
    }

    /// Set the memory limit, in KiB.
    pub fn memory_kib(&mut self, kib: u64) -> &mut Self {
        self.memory_bytes = kib.saturating_mul(1024);
        self
    }

    /// Set the kind of memory ceiling.
    pub fn memory_kind(&mut self, kind: MemoryCeiling) -> &mut Self {
        self.memory_kind = kind;
        self
    }

    /// Set the output limit, in bytes.
    pub fn max_output_bytes(&mut self, bytes: u64) -> &mut Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Soft and hard `RLIMIT_CPU` values, in whole seconds.
    ///
    /// The kernel counts CPU time in seconds, so the soft limit is rounded up and the hard limit,
    /// which delivers `SIGKILL`, is one second later.
    pub fn cpu_rlimit(&self) -> (u64, u64) {
        let soft = self.cpu_time_ms.div_ceil(1000).max(1);
        (soft, soft + 1)
    }
}

/// Translates [`ResourceLimits`] into kernel resource limits.
///
/// The limiter is built by the supervisor before forking and [`apply`](Self::apply) is called by
/// the forked child, so it does not allocate.
#[derive(Debug, Clone)]
pub struct ResourceLimiter {
    /// `(resource, soft, hard)` triples, applied in order.
    limits: Vec<(Resource, u64, u64)>,
}

impl ResourceLimiter {
    /// Prepare the limits to apply.
    pub fn new(limits: &ResourceLimits) -> ResourceLimiter {
        let (cpu_soft, cpu_hard) = limits.cpu_rlimit();
        let memory = match limits.memory_kind {
            MemoryCeiling::Data => Resource::DATA,
            MemoryCeiling::AddressSpace => Resource::AS,
            MemoryCeiling::Stack => Resource::STACK,
        };
        ResourceLimiter {
            limits: vec![
                (Resource::CPU, cpu_soft, cpu_hard),
                (memory, limits.memory_bytes, limits.memory_bytes),
                (
                    Resource::FSIZE,
                    limits.max_output_bytes,
                    limits.max_output_bytes,
                ),
                (Resource::CORE, 0, 0),
            ],
        }
    }

    /// Install the limits on the calling process.
    ///
    /// This is meant to be called right after `fork`, in the process that is about to become the
    /// candidate.
    pub fn apply(&self) -> io::Result<()> {
        for &(resource, soft, hard) in &self.limits {
            rlimit::setrlimit(resource, soft, hard)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_rlimit_rounds_up() {
        let mut limits = ResourceLimits::default();
        assert_eq!(limits.cpu_rlimit(), (2, 3));
        limits.cpu_time_ms(1000);
        assert_eq!(limits.cpu_rlimit(), (1, 2));
        limits.cpu_time_ms(1);
        assert_eq!(limits.cpu_rlimit(), (1, 2));
        limits.cpu_time_ms(0);
        assert_eq!(limits.cpu_rlimit(), (1, 2));
    }

    #[test]
    fn test_limiter_resources() {
        let mut limits = ResourceLimits::default();
        limits.memory_kib(1024).memory_kind(MemoryCeiling::AddressSpace);
        let limiter = ResourceLimiter::new(&limits);
        assert!(limiter
            .limits
            .contains(&(Resource::AS, 1024 * 1024, 1024 * 1024)));
        assert!(limiter
            .limits
            .contains(&(Resource::FSIZE, 1 << 25, 1 << 25)));
        assert!(!limiter.limits.iter().any(|(r, _, _)| *r == Resource::DATA));
    }

    #[test]
    fn test_memory_kind_names() {
        let kind: MemoryCeiling = serde_json::from_str("\"address-space\"").unwrap();
        assert_eq!(kind, MemoryCeiling::AddressSpace);
    }
}
