//! Settlement run orchestration
//!
//! This module provides the `Bank`, which wires the account store, feed,
//! gate, sampler, worker pool, settlement coordinator and audit sink together
//! for one run over one input.
//!
//! # Run Sequence
//!
//! 1. Load the account header (fatal on any format error)
//! 2. Register the workers with the gate, then start the `settlement` thread
//! 3. Run the worker pool until the feed is exhausted
//! 4. Join the coordinator, which runs the final settlement
//! 5. Collect final balances and tallies into a [`RunSummary`]
//!
//! [`Bank::process_file`] adds the file handling around this: it opens the
//! input and the ledger, starts the audit sink, and writes the final balances
//! CSV once the ledger has been closed.

use crate::core::account_store::AccountStore;
use crate::core::audit_sink::{open_ledger, AuditSender, AuditSink};
use crate::core::config::BankConfig;
use crate::core::coordinator::{SettlementCoordinator, SettlementGate};
use crate::core::feed::TransactionFeed;
use crate::core::sampler::CheckSampler;
use crate::core::traits::SnapshotSink;
use crate::core::worker_pool::{WorkerPool, WorkerShared};
use crate::io::{load_accounts, write_balances_csv, DirectorySnapshots};
use crate::types::{AccountSnapshot, BankError};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Settlement passes, including the final one
    pub settlements: u64,
    pub applied: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub blank: u64,
    /// Balance checks written to the ledger
    pub check_samples: u64,
    /// Ledger lines written; only known once the audit sink has been joined
    pub audit_events: Option<u64>,
    /// Final balances in input order
    pub balances: Vec<AccountSnapshot>,
}

/// Concurrent settlement engine for one configuration
#[derive(Debug, Clone)]
pub struct Bank {
    config: BankConfig,
}

impl Bank {
    pub fn new(config: BankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Process one input from account header to final settlement
    ///
    /// # Arguments
    ///
    /// * `input` - Reader positioned at the account count line
    /// * `snapshots` - Receives the balances after every settlement
    /// * `audit` - Channel to the audit sink; dropped when the run ends
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account header is malformed or lists an account twice
    /// - A worker or the settlement thread cannot be started
    /// - A worker or the settlement thread panicked
    ///
    /// Malformed or unauthorized transactions are never errors here; they
    /// show up in the summary's `rejected` and `dropped` counts.
    pub fn run<R, S>(
        &self,
        mut input: R,
        snapshots: S,
        audit: AuditSender,
    ) -> Result<RunSummary, BankError>
    where
        R: BufRead + Send + 'static,
        S: SnapshotSink + Send + 'static,
    {
        let header = load_accounts(&mut input)?;
        let store = Arc::new(AccountStore::new(header.accounts)?);
        info!(
            "Loaded {} accounts, running {} workers with settlement every {} transactions",
            store.len(),
            self.config.workers,
            self.config.settlement_threshold
        );

        let gate = Arc::new(SettlementGate::new(self.config.settlement_threshold));
        let sampler = Arc::new(CheckSampler::new(
            self.config.check_sample_every,
            self.config.max_check_samples,
        ));

        let enlisted = gate.enlist(self.config.workers);
        let coordinator = SettlementCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&gate),
            snapshots,
            audit.clone(),
        )
        .spawn()?;

        let pool = WorkerPool::new(WorkerShared {
            store: Arc::clone(&store),
            feed: Arc::new(TransactionFeed::new(input, header.lines_read)),
            gate: Arc::clone(&gate),
            sampler: Arc::clone(&sampler),
            audit,
        });

        let pool_result = match pool.run(enlisted) {
            // Started workers are parked on the start barrier; the coordinator
            // would wait for them forever.
            Err(e @ BankError::ThreadSpawn { .. }) => return Err(e),
            other => other,
        };
        let coordinator_result = coordinator.join();
        let workers = pool_result?;
        let settlement = coordinator_result?;

        let summary = RunSummary {
            settlements: settlement.settlements,
            applied: workers.applied,
            dropped: workers.dropped,
            rejected: workers.rejected,
            blank: workers.blank,
            check_samples: sampler.logged(),
            audit_events: None,
            balances: store.snapshots(),
        };

        info!(
            "Run complete: {} applied, {} dropped, {} rejected, {} settlements",
            summary.applied, summary.dropped, summary.rejected, summary.settlements
        );

        Ok(summary)
    }

    /// Process an input file and write the final balances CSV to `output`
    ///
    /// The ledger is created at the configured path and snapshot files are
    /// written to the configured output directory.
    ///
    /// # Errors
    ///
    /// Everything [`Bank::run`] reports, plus:
    /// - [`BankError::ResourceUnavailable`] if the input, the ledger or the
    ///   output directory cannot be opened
    /// - the first ledger write error, after the balances have been written
    pub fn process_file(
        &self,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<RunSummary, BankError> {
        let input = File::open(input_path).map_err(|e| {
            BankError::resource_unavailable(format!("input '{}'", input_path.display()), &e)
        })?;
        let ledger = open_ledger(&self.config.ledger_path)?;
        let snapshots = DirectorySnapshots::create(&self.config.output_dir)?;

        let (audit, sink) = AuditSink::spawn(ledger)?;
        let mut summary = self.run(BufReader::new(input), snapshots, audit)?;
        let ledger = sink.join();

        write_balances_csv(&summary.balances, output)?;

        let ledger = ledger?;
        summary.audit_events = Some(ledger.events);
        info!(
            "Ledger '{}' closed with {} events",
            self.config.ledger_path.display(),
            ledger.events
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit_sink::channel;
    use crate::io::MemorySnapshots;
    use crate::types::AuditKind;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::fs;
    use std::io::Cursor;

    const ACCOUNTS: &str = "3\na1\np1\n100\n0.1\na2\np2\n200\n0.1\na3\np3\n300\n0.1\n";

    fn bank(workers: usize, threshold: u64) -> Bank {
        Bank::new(BankConfig::new(workers, threshold, 1).with_max_check_samples(0))
    }

    fn input(transactions: &str) -> Cursor<String> {
        Cursor::new(format!("{}{}", ACCOUNTS, transactions))
    }

    fn balances(summary: &RunSummary) -> Vec<Decimal> {
        summary.balances.iter().map(|b| b.balance).collect()
    }

    #[rstest]
    fn test_reference_scenario(
        #[values(1, 2, 4)] workers: usize,
        #[values(1, 2, 3, 5000)] threshold: u64,
    ) {
        let snapshots = MemorySnapshots::new();
        let (audit, _rx) = channel();

        let summary = bank(workers, threshold)
            .run(
                input("D a1 p1 50\nW a2 p2 30\nT a1 p1 a3 20\n"),
                snapshots.clone(),
                audit,
            )
            .unwrap();

        assert_eq!(
            balances(&summary),
            vec![
                Decimal::new(137, 0),
                Decimal::new(173, 0),
                Decimal::new(322, 0)
            ]
        );
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.settlements, 3 / threshold + 1);
        assert_eq!(snapshots.cycles(), summary.settlements);
    }

    #[rstest]
    fn test_settlement_count_is_deterministic(#[values(1, 3, 8)] workers: usize) {
        let mut transactions = String::new();
        for _ in 0..47 {
            transactions.push_str("D a1 p1 1\nC a2\n");
        }
        transactions.push_str("X junk\nD a9 p9 1\nW a2 wrong 1\n");
        let (audit, _rx) = channel();

        let summary = bank(workers, 10)
            .run(input(&transactions), MemorySnapshots::new(), audit)
            .unwrap();

        // 47 deposits plus 2 counted failures = 49 counted; 49 / 10 + 1
        assert_eq!(summary.settlements, 5);
        assert_eq!(summary.applied, 94);
        assert_eq!(summary.dropped, 2);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn test_malformed_and_unauthorized_lines_change_nothing() {
        let (audit, _rx) = channel();

        let summary = bank(2, 5000)
            .run(
                input("\nD a1\nD a1 p1 abc\nQ a1 p1 5\nD a1 p2 50\nT a9 p1 a1 5\nT a1 p1 a9 5\nC\n\n"),
                MemorySnapshots::new(),
                audit,
            )
            .unwrap();

        assert_eq!(
            balances(&summary),
            vec![
                Decimal::new(100, 0),
                Decimal::new(200, 0),
                Decimal::new(300, 0)
            ]
        );
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.rejected, 4);
        assert_eq!(summary.dropped, 3);
        assert_eq!(summary.blank, 2);
        assert_eq!(summary.settlements, 1);
    }

    #[test]
    fn test_settlement_events_reach_audit_channel() {
        let (audit, mut rx) = channel();

        let summary = bank(2, 2)
            .run(
                input("D a1 p1 10\nD a2 p2 10\nD a3 p3 10\n"),
                MemorySnapshots::new(),
                audit,
            )
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        // 3 counted, threshold 2: two settlements of three accounts each
        assert_eq!(summary.settlements, 2);
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.kind == AuditKind::Settlement));
        let first_cycle: Vec<&str> = events[..3].iter().map(|e| e.account.as_str()).collect();
        assert_eq!(first_cycle, vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn test_check_samples_counted_in_summary() {
        let bank = Bank::new(BankConfig::new(3, 5000, 4).with_max_check_samples(3));
        let (audit, mut rx) = channel();
        let transactions = "C a1\n".repeat(30);

        let summary = bank
            .run(input(&transactions), MemorySnapshots::new(), audit)
            .unwrap();

        let samples = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == AuditKind::CheckSample)
            .count();
        assert_eq!(summary.check_samples, 3);
        assert_eq!(samples, 3);
        // Balance checks never trigger a threshold settlement.
        assert_eq!(summary.settlements, 1);
    }

    #[rstest]
    #[case::bad_header("x\n")]
    #[case::truncated("2\na1\np1\n100\n0.1\na2\n")]
    #[case::duplicate_account("2\na1\np1\n1\n0\na1\np2\n2\n0\n")]
    fn test_invalid_header_is_fatal(#[case] text: &str) {
        let (audit, _rx) = channel();

        let result = bank(2, 10).run(
            Cursor::new(text.to_string()),
            MemorySnapshots::new(),
            audit,
        );

        assert!(matches!(result, Err(BankError::InputFormat { .. })));
    }

    #[test]
    fn test_process_file_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.txt");
        fs::write(
            &input_path,
            format!("{}D a1 p1 50\nW a2 p2 30\nT a1 p1 a3 20\n", ACCOUNTS),
        )
        .unwrap();
        let config = BankConfig::new(2, 5000, 500)
            .with_ledger_path(dir.path().join("ledger.txt"))
            .with_output_dir(dir.path().join("out"));
        let mut output = Vec::new();

        let summary = Bank::new(config)
            .process_file(&input_path, &mut output)
            .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,balance\na1,137.00\na2,173.00\na3,322.00\n"
        );
        assert_eq!(summary.audit_events, Some(3));

        let ledger = fs::read_to_string(dir.path().join("ledger.txt")).unwrap();
        assert_eq!(ledger.lines().count(), 3);
        assert!(ledger.starts_with("Applied interest to account a1. New Balance: $137.00."));

        let snapshot = fs::read_to_string(dir.path().join("out").join("act_02.txt")).unwrap();
        assert_eq!(snapshot, "Cycle 1: account a3 current balance: 322.00\n");
    }

    #[test]
    fn test_process_file_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = BankConfig::default()
            .with_ledger_path(dir.path().join("ledger.txt"))
            .with_output_dir(dir.path());
        let mut output = Vec::new();

        let result = Bank::new(config).process_file(&dir.path().join("missing.txt"), &mut output);

        assert!(matches!(
            result,
            Err(BankError::ResourceUnavailable { .. })
        ));
        assert!(output.is_empty());
    }

    #[test]
    fn test_process_file_unwritable_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.txt");
        fs::write(&input_path, ACCOUNTS).unwrap();
        let config = BankConfig::default()
            .with_ledger_path(dir.path().join("no-such-dir").join("ledger.txt"))
            .with_output_dir(dir.path());
        let mut output = Vec::new();

        let result = Bank::new(config).process_file(&input_path, &mut output);

        match result {
            Err(BankError::ResourceUnavailable { resource, .. }) => {
                assert!(resource.starts_with("ledger"))
            }
            other => panic!("expected ResourceUnavailable, got {:?}", other),
        }
    }
}
