//! Run configuration

use std::path::PathBuf;
use tracing::warn;

/// Settlement threshold used when none is given
pub const DEFAULT_SETTLEMENT_THRESHOLD: u64 = 5000;
/// Every n-th successful balance check is logged
pub const DEFAULT_CHECK_SAMPLE_EVERY: u64 = 500;
/// Upper bound on logged balance checks per run
pub const DEFAULT_MAX_CHECK_SAMPLES: u64 = 20;

/// Configuration for one engine run
///
/// Controls the worker count, how often settlement runs, how balance checks
/// are sampled, and where the ledger and snapshot files go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Counted transactions per settlement cycle
    pub settlement_threshold: u64,
    /// Log every n-th successful balance check
    pub check_sample_every: u64,
    /// Maximum logged balance checks (zero disables sampling)
    pub max_check_samples: u64,
    /// Audit ledger file
    pub ledger_path: PathBuf,
    /// Directory for per-account snapshot files
    pub output_dir: PathBuf,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            settlement_threshold: DEFAULT_SETTLEMENT_THRESHOLD,
            check_sample_every: DEFAULT_CHECK_SAMPLE_EVERY,
            max_check_samples: DEFAULT_MAX_CHECK_SAMPLES,
            ledger_path: PathBuf::from("ledger.txt"),
            output_dir: PathBuf::from("."),
        }
    }
}

impl BankConfig {
    /// Create a BankConfig with custom tuning values
    ///
    /// Zero worker counts, thresholds and sample intervals are invalid and fall
    /// back to their defaults with a warning. Paths keep their defaults; set
    /// them with the `with_*` builders.
    pub fn new(workers: usize, settlement_threshold: u64, check_sample_every: u64) -> Self {
        let default = Self::default();

        let workers = if workers == 0 {
            warn!(
                "Invalid workers ({}), using default ({})",
                workers, default.workers
            );
            default.workers
        } else {
            workers
        };

        let settlement_threshold = if settlement_threshold == 0 {
            warn!(
                "Invalid settlement_threshold ({}), using default ({})",
                settlement_threshold, default.settlement_threshold
            );
            default.settlement_threshold
        } else {
            settlement_threshold
        };

        let check_sample_every = if check_sample_every == 0 {
            warn!(
                "Invalid check_sample_every ({}), using default ({})",
                check_sample_every, default.check_sample_every
            );
            default.check_sample_every
        } else {
            check_sample_every
        };

        Self {
            workers,
            settlement_threshold,
            check_sample_every,
            ..default
        }
    }

    pub fn with_max_check_samples(mut self, max_check_samples: u64) -> Self {
        self.max_check_samples = max_check_samples;
        self
    }

    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}
