use judgebox_verdict::Verdict;
use nix::sys::signal::Signal;

use crate::limits::ResourceLimits;
use crate::supervisor::{ExecutionOutcome, ResourceUsage};

/// What to do next with a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The run already has its final verdict.
    Final(Verdict),
    /// The run was clean, the output has to be compared with the expected one.
    NeedsComparison,
}

/// Resolve the verdict of a run from the process-control observations alone.
pub fn classify(outcome: &ExecutionOutcome) -> Classification {
    match outcome.verdict_hint {
        Some(verdict) => Classification::Final(verdict),
        None => Classification::NeedsComparison,
    }
}

/// Classify the signal that stopped or killed the candidate.
///
/// `usage` is the accounting at the moment the signal was observed.
pub fn classify_signal(signal: Signal, usage: &ResourceUsage, limits: &ResourceLimits) -> Verdict {
    match signal {
        Signal::SIGXCPU | Signal::SIGKILL | Signal::SIGALRM => Verdict::TimeLimitExceeded,
        Signal::SIGXFSZ => Verdict::OutputLimitExceeded,
        Signal::SIGSEGV => classify_fault(usage, limits),
        _ => Verdict::RuntimeError,
    }
}

/// Classify a segmentation fault.
///
/// When the memory ceiling denies an allocation the program usually faults on the pointer it did
/// not get, before touching much memory. So a fault with a peak resident set below
/// `limits.fault_ratio` of the ceiling is taken as a memory limit breach, while a fault with a
/// large resident set is an ordinary crash.
pub fn classify_fault(usage: &ResourceUsage, limits: &ResourceLimits) -> Verdict {
    let resident = usage.max_rss_kb.saturating_mul(1024) as f64;
    let threshold = limits.memory_bytes as f64 * limits.fault_ratio;
    if resident < threshold {
        Verdict::MemoryLimitExceeded
    } else {
        Verdict::RuntimeError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::Termination;

    fn usage(max_rss_kb: u64) -> ResourceUsage {
        ResourceUsage {
            user_ms: 0,
            system_ms: 0,
            max_rss_kb,
        }
    }

    fn limits_kib(kib: u64) -> ResourceLimits {
        let mut limits = ResourceLimits::default();
        limits.memory_kib(kib);
        limits
    }

    #[test]
    fn test_classify_hint() {
        let outcome = ExecutionOutcome {
            verdict_hint: Some(Verdict::RuntimeError),
            elapsed_ms: 3,
            peak_memory_kb: 100,
            termination: Termination::Exited(0),
        };
        assert_eq!(
            classify(&outcome),
            Classification::Final(Verdict::RuntimeError)
        );
        let outcome = ExecutionOutcome {
            verdict_hint: None,
            ..outcome
        };
        assert_eq!(classify(&outcome), Classification::NeedsComparison);
    }

    #[test]
    fn test_time_signals() {
        let limits = ResourceLimits::default();
        for sig in [Signal::SIGXCPU, Signal::SIGKILL] {
            assert_eq!(
                classify_signal(sig, &usage(10), &limits),
                Verdict::TimeLimitExceeded
            );
        }
    }

    #[test]
    fn test_other_signals() {
        let limits = ResourceLimits::default();
        assert_eq!(
            classify_signal(Signal::SIGXFSZ, &usage(10), &limits),
            Verdict::OutputLimitExceeded
        );
        for sig in [Signal::SIGFPE, Signal::SIGABRT, Signal::SIGBUS, Signal::SIGPIPE] {
            assert_eq!(
                classify_signal(sig, &usage(10), &limits),
                Verdict::RuntimeError
            );
        }
    }

    #[test]
    fn test_fault_heuristic() {
        let limits = limits_kib(16 * 1024);
        // far below half of the ceiling: a denied allocation
        assert_eq!(
            classify_signal(Signal::SIGSEGV, &usage(1024), &limits),
            Verdict::MemoryLimitExceeded
        );
        // at or above half of the ceiling: a genuine crash
        assert_eq!(
            classify_signal(Signal::SIGSEGV, &usage(8 * 1024), &limits),
            Verdict::RuntimeError
        );
        assert_eq!(
            classify_signal(Signal::SIGSEGV, &usage(15 * 1024), &limits),
            Verdict::RuntimeError
        );
    }

    #[test]
    fn test_fault_ratio_is_tunable() {
        let mut limits = limits_kib(16 * 1024);
        limits.fault_ratio = 0.0;
        assert_eq!(classify_fault(&usage(1), &limits), Verdict::RuntimeError);
        limits.fault_ratio = 1.0;
        assert_eq!(
            classify_fault(&usage(15 * 1024), &limits),
            Verdict::MemoryLimitExceeded
        );
    }
}
