//! Core traits
//!
//! Seams between the settlement coordinator and where its output goes.

use crate::types::{AccountSnapshot, BankError};

/// Destination for per-settlement balance snapshots
///
/// Called once per settlement cycle from the coordinator thread, while every
/// worker is parked. Implementations can write files
/// ([`DirectorySnapshots`](crate::io::DirectorySnapshots)) or keep records in
/// memory ([`MemorySnapshots`](crate::io::MemorySnapshots)).
pub trait SnapshotSink {
    /// Record the post-settlement balance of every account for `cycle` (1-based)
    fn record(&mut self, cycle: u64, accounts: &[AccountSnapshot]) -> Result<(), BankError>;
}
