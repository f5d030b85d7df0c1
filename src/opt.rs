use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use judgebox_exec::{MemoryCeiling, PolicySpec, ResourceLimits, SyscallPolicy};

use crate::tools::compare::CompareOpt;
use crate::tools::hint::HintOpt;
use crate::tools::judge::JudgeOpt;
use crate::tools::run::RunOpt;

const VERSION: &str = include_str!(concat!(env!("OUT_DIR"), "/version.txt"));

#[derive(Parser, Debug)]
#[clap(name = "judgebox", version = VERSION)]
pub struct Opt {
    #[clap(flatten, next_help_heading = Some("LOGGING"))]
    pub logger: LoggerOpt,

    /// Which tool to use
    #[clap(subcommand)]
    pub tool: Tool,
}

#[derive(Subcommand, Debug)]
pub enum Tool {
    /// Run an executable under supervision, exiting with the code of the verdict
    ///
    /// The exit status is 0 when the run was clean and the output still has to be compared.
    Run(RunOpt),
    /// Compare an output file with the expected one, exiting with the code of the verdict
    Compare(CompareOpt),
    /// Print the first line where an output differs from the expected one
    Hint(HintOpt),
    /// Compile a submission and judge it against a directory of test cases
    Judge(JudgeOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct LoggerOpt {
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl LoggerOpt {
    pub fn enable_log(&self) {
        if self.verbose > 0 {
            std::env::set_var("RUST_BACKTRACE", "1");
            match self.verbose {
                0 => unreachable!(),
                1 => std::env::set_var("RUST_LOG", "info"),
                2 => std::env::set_var("RUST_LOG", "debug"),
                _ => std::env::set_var("RUST_LOG", "trace"),
            }
        }

        env_logger::Builder::from_default_env()
            .format_timestamp_nanos()
            .init();
        better_panic::install();
    }
}

/// Which kernel ceiling bounds the memory of the candidate.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Heap, data segment and private anonymous mappings
    Data,
    /// The whole virtual address space
    AddressSpace,
    /// The stack of the main thread
    Stack,
}

impl From<MemoryKind> for MemoryCeiling {
    fn from(kind: MemoryKind) -> Self {
        match kind {
            MemoryKind::Data => MemoryCeiling::Data,
            MemoryKind::AddressSpace => MemoryCeiling::AddressSpace,
            MemoryKind::Stack => MemoryCeiling::Stack,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct LimitsOpt {
    /// CPU time limit, user plus system, in milliseconds
    #[clap(long = "time-limit", default_value = "1500")]
    pub time_limit: u64,

    /// Memory limit, in KiB
    #[clap(long = "memory-limit", default_value = "16384")]
    pub memory_limit: u64,

    /// Maximum size of the output, in bytes
    #[clap(long = "output-limit", default_value = "33554432")]
    pub output_limit: u64,

    /// Which kernel ceiling the memory limit is applied to
    #[clap(long = "memory-kind", value_enum, default_value = "data")]
    pub memory_kind: MemoryKind,

    /// A segmentation fault with a peak memory below this fraction of the memory limit is
    /// reported as a memory limit breach
    #[clap(long = "fault-ratio", default_value = "0.5")]
    pub fault_ratio: f64,
}

impl LimitsOpt {
    /// Validate the options and build the limits.
    pub fn limits(&self) -> Result<ResourceLimits, Error> {
        if self.time_limit == 0 {
            bail!("The time limit must be positive");
        }
        if self.memory_limit == 0 {
            bail!("The memory limit must be positive");
        }
        if !(0.0..=1.0).contains(&self.fault_ratio) {
            bail!(
                "The fault ratio must be between 0 and 1, not {}",
                self.fault_ratio
            );
        }
        let mut limits = ResourceLimits::default();
        limits
            .cpu_time_ms(self.time_limit)
            .memory_kib(self.memory_limit)
            .memory_kind(self.memory_kind.into())
            .max_output_bytes(self.output_limit);
        limits.fault_ratio = self.fault_ratio;
        Ok(limits)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct PolicyOpt {
    /// YAML or JSON file with the allowed syscalls, paths and directories.
    ///
    /// Without this option the built-in policy for C and C++ programs is used.
    #[clap(long = "policy")]
    pub policy: Option<PathBuf>,
}

impl PolicyOpt {
    /// The policy to enforce.
    pub fn policy(&self) -> Result<SyscallPolicy, Error> {
        match &self.policy {
            Some(path) => load_policy(path),
            None => Ok(SyscallPolicy::host_default()),
        }
    }
}

/// Load a policy file, parsed as JSON if the extension is `.json` and as YAML otherwise.
pub fn load_policy<P: AsRef<Path>>(path: P) -> Result<SyscallPolicy, Error> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file {}", path.display()))?;
    let spec: PolicySpec = if path.extension().map_or(false, |ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON policy file {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML policy file {}", path.display()))?
    };
    let policy = SyscallPolicy::from_spec(&spec)
        .with_context(|| format!("Invalid policy in {}", path.display()))?;
    debug!("Loaded policy from {}: {:?}", path.display(), policy);
    Ok(policy)
}
