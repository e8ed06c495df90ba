//! Bank Settlement Engine Library
//! # Overview
//!
//! This library applies a log of banking commands to a fixed set of accounts
//! using a pool of worker threads, pausing every worker for a reward
//! settlement each time a threshold of transactions has been processed.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Command, AuditEvent, BankError)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Concurrent components:
//!   - [`core::account_store`] - Accounts with one lock each
//!   - [`core::worker_pool`] - Threads that parse and apply commands
//!   - [`core::coordinator`] - Settlement gate and settlement thread
//!   - [`core::audit_sink`] - Ordered ledger writer fed by a channel
//!   - [`core::bank`] - One complete run
//! - [`io`] - Input format parsing and output files
//!
//! # Commands
//!
//! - **D** `account password amount`: Credit an account
//! - **W** `account password amount`: Debit an account (overdrafts allowed)
//! - **T** `source password dest amount`: Debit the source, then credit the destination
//! - **C** `account`: Read a balance; sampled into the ledger
//!
//! Deposits, withdrawals and transfers count toward the settlement threshold;
//! balance checks do not.
//!
//! # Settlement
//!
//! Each account accumulates the absolute amount of every deposit, withdrawal
//! and transfer touching it. A settlement credits `volume × reward_rate` to
//! every account, resets the volumes, writes one snapshot per account and one
//! ledger line per account. A final settlement always runs after the input is
//! exhausted.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod types;

pub use crate::core::{Bank, BankConfig, RunSummary};
pub use io::write_balances_csv;
pub use types::{Account, AccountNumber, AccountSnapshot, AuditEvent, BankError, Command};
