//! Core business logic module
//!
//! This module contains the concurrent settlement components:
//! - `traits` - Seams for snapshot output
//! - `account_store` - Account table with per-account locking
//! - `feed` - Shared cursor over transaction lines
//! - `sampler` - Balance-check sampling for the ledger
//! - `coordinator` - Settlement gate and the settlement thread
//! - `worker_pool` - Threads that parse and apply commands
//! - `audit_sink` - Ordered ledger writer fed by a channel
//! - `config` - Run configuration
//! - `bank` - Wiring of all of the above into one run

pub mod account_store;
pub mod audit_sink;
pub mod bank;
pub mod config;
pub mod coordinator;
pub mod feed;
pub mod sampler;
pub mod traits;
pub mod worker_pool;

pub use account_store::{AccountHandle, AccountStore};
pub use audit_sink::{open_ledger, AuditSender, AuditSink, LedgerReport};
pub use bank::{Bank, RunSummary};
pub use config::BankConfig;
pub use coordinator::{
    ActiveWorker, Admission, CoordinatorReport, Phase, SettlementCoordinator, SettlementGate,
    Trigger,
};
pub use feed::{FeedLine, TransactionFeed};
pub use sampler::CheckSampler;
pub use traits::SnapshotSink;
pub use worker_pool::{PoolReport, WorkerPool, WorkerReport, WorkerShared};
