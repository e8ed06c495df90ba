//! Check-balance sampling
//!
//! Balance checks are frequent and never count toward the settlement
//! threshold. To keep the ledger readable only every `every`-th successful
//! check is logged, and at most `cap` of them over the whole run.

use crate::core::config::DEFAULT_CHECK_SAMPLE_EVERY;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

#[derive(Debug, Default)]
struct SampleCounts {
    checks: u64,
    logged: u64,
}

/// Counter deciding which balance checks produce an audit event
#[derive(Debug)]
pub struct CheckSampler {
    every: u64,
    cap: u64,
    counts: Mutex<SampleCounts>,
}

impl CheckSampler {
    /// `every` of zero falls back to [`DEFAULT_CHECK_SAMPLE_EVERY`]
    pub fn new(every: u64, cap: u64) -> Self {
        let every = if every == 0 {
            warn!(
                "Invalid check sample interval (0), using default ({})",
                DEFAULT_CHECK_SAMPLE_EVERY
            );
            DEFAULT_CHECK_SAMPLE_EVERY
        } else {
            every
        };

        Self {
            every,
            cap,
            counts: Mutex::new(SampleCounts::default()),
        }
    }

    /// Register one successful check
    ///
    /// Returns the 1-based sample number when this check should be logged.
    pub fn observe(&self) -> Option<u64> {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.checks += 1;

        if counts.checks % self.every == 0 && counts.logged < self.cap {
            counts.logged += 1;
            Some(counts.logged)
        } else {
            None
        }
    }

    /// Total checks observed
    pub fn checks(&self) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .checks
    }

    /// Checks selected for logging
    pub fn logged(&self) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .logged
    }
}
