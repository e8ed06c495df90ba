//! Worker pool
//!
//! This module provides the fixed-size pool of threads that drain the
//! transaction feed.
//!
//! # Architecture
//!
//! ```text
//! WorkerPool
//!     └── Arc<WorkerShared>
//!             ├── Arc<AccountStore>      (per-account locks)
//!             ├── Arc<TransactionFeed>   (shared cursor)
//!             ├── Arc<SettlementGate>    (admission + progress)
//!             ├── Arc<CheckSampler>      (balance-check sampling)
//!             └── AuditSender            (cloned per worker)
//! ```
//!
//! # Worker Loop
//!
//! Every worker waits on a start barrier sized to the pool, then repeats:
//! take a line, parse it, get admitted by the gate, apply the command, report
//! progress. Blank lines and rejected lines never reach the gate. Apply errors
//! are dropped according to [`BankError::is_recoverable`]; nothing a single
//! command does can stop a worker.

use crate::core::account_store::AccountStore;
use crate::core::audit_sink::AuditSender;
use crate::core::coordinator::{ActiveWorker, SettlementGate};
use crate::core::feed::{FeedLine, TransactionFeed};
use crate::core::sampler::CheckSampler;
use crate::io::parse_line;
use crate::types::{AuditEvent, BankError, Command};
use std::io::BufRead;
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Per-worker tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Commands applied successfully
    pub applied: u64,
    /// Parsed commands that failed lookup, authentication or arithmetic
    pub dropped: u64,
    /// Lines that failed to parse
    pub rejected: u64,
    /// Empty or whitespace-only lines
    pub blank: u64,
}

/// Tallies summed over the whole pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub workers: usize,
    pub applied: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub blank: u64,
}

impl PoolReport {
    fn absorb(&mut self, report: &WorkerReport) {
        self.workers += 1;
        self.applied += report.applied;
        self.dropped += report.dropped;
        self.rejected += report.rejected;
        self.blank += report.blank;
    }
}

/// State shared by every worker
#[derive(Debug)]
pub struct WorkerShared<R> {
    pub store: Arc<AccountStore>,
    pub feed: Arc<TransactionFeed<R>>,
    pub gate: Arc<SettlementGate>,
    pub sampler: Arc<CheckSampler>,
    pub audit: AuditSender,
}

struct Worker<R> {
    id: usize,
    shared: Arc<WorkerShared<R>>,
}

impl<R: BufRead> Worker<R> {
    fn run(&self, start: &Barrier) -> WorkerReport {
        start.wait();

        let mut report = WorkerReport::default();
        while let Some(line) = self.shared.feed.next_line() {
            let command = match line.text().and_then(parse_line) {
                Ok(Some(command)) => command,
                Ok(None) => {
                    report.blank += 1;
                    continue;
                }
                Err(e) => {
                    debug!("worker-{}: line {} rejected: {}", self.id, line.number, e);
                    report.rejected += 1;
                    continue;
                }
            };

            let admission = self.shared.gate.admit(command.is_counted());
            let result = self.apply(&command);
            admission.report();

            match result {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    report.dropped += 1;
                    self.log_dropped(&line, &e);
                }
            }
        }

        report
    }

    fn apply(&self, command: &Command) -> Result<(), BankError> {
        let store = &self.shared.store;
        match command {
            Command::Deposit {
                account,
                password,
                amount,
            } => store.deposit(store.require(account)?, password, *amount),
            Command::Withdraw {
                account,
                password,
                amount,
            } => store.withdraw(store.require(account)?, password, *amount),
            Command::Transfer {
                source,
                password,
                dest,
                amount,
            } => {
                let source = store.require(source)?;
                let dest = store.require(dest)?;
                store.transfer(source, password, dest, *amount)
            }
            Command::CheckBalance { account } => {
                let balance = store.check_balance(store.require(account)?);
                if self.shared.sampler.observe().is_some() {
                    self.shared
                        .audit
                        .send(AuditEvent::check_sample(account, balance));
                }
                Ok(())
            }
        }
    }

    fn log_dropped(&self, line: &FeedLine, e: &BankError) {
        if e.is_recoverable() {
            debug!("worker-{}: line {} dropped: {}", self.id, line.number, e);
        } else {
            warn!("worker-{}: line {} failed: {}", self.id, line.number, e);
        }
    }
}

/// Fixed-size pool of worker threads
#[derive(Debug)]
pub struct WorkerPool<R> {
    shared: Arc<WorkerShared<R>>,
}

impl<R: BufRead + Send + 'static> WorkerPool<R> {
    pub fn new(shared: WorkerShared<R>) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Run one worker per enlisted guard and wait for all of them
    ///
    /// Each worker thread owns its [`ActiveWorker`] guard, so it deregisters
    /// from the gate however it exits.
    ///
    /// # Errors
    ///
    /// - [`BankError::ThreadSpawn`] if a worker thread cannot be started
    /// - [`BankError::ThreadPanicked`] if a worker panicked; the remaining
    ///   workers are still joined first
    pub fn run(self, enlisted: Vec<ActiveWorker>) -> Result<PoolReport, BankError> {
        let start = Arc::new(Barrier::new(enlisted.len()));
        let mut handles: Vec<(String, JoinHandle<WorkerReport>)> =
            Vec::with_capacity(enlisted.len());

        for (id, active) in enlisted.into_iter().enumerate() {
            let name = format!("worker-{}", id);
            let worker = Worker {
                id,
                shared: Arc::clone(&self.shared),
            };
            let start = Arc::clone(&start);

            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    let _active = active;
                    worker.run(&start)
                })
                .map_err(|e| BankError::thread_spawn(&name, &e))?;
            handles.push((name, handle));
        }

        let mut report = PoolReport::default();
        let mut failure = None;
        for (name, handle) in handles {
            match handle.join() {
                Ok(worker) => report.absorb(&worker),
                Err(_) => {
                    error!("{} panicked", name);
                    if failure.is_none() {
                        failure = Some(BankError::thread_panicked(&name));
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
