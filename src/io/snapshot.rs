//! Balance snapshot output
//!
//! This module provides the two [`SnapshotSink`] implementations used by the
//! settlement coordinator, plus the final balances table written after a run.
//!
//! - [`DirectorySnapshots`] - one `act_XX.txt` file per account; each settlement
//!   appends one record to every file
//! - [`MemorySnapshots`] - keeps every record in memory (tests, benchmarks)
//! - [`write_balances_csv`] - `account,balance` table of final balances

use crate::core::traits::SnapshotSink;
use crate::types::{format_amount, AccountSnapshot, BankError};
use serde::Serialize;
use std::collections::hash_map::{Entry, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// One account's balance as recorded by a settlement
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    /// 1-based settlement cycle
    pub cycle: u64,
    pub account: AccountSnapshot,
}

/// Per-account snapshot files in a directory
///
/// Files are named `act_<index>.txt` with the account's 0-based position in the
/// input, zero-padded to two digits. A file is truncated the first time this
/// sink writes to it, so a run never appends to the output of a previous one.
#[derive(Debug)]
pub struct DirectorySnapshots {
    dir: PathBuf,
    files: HashMap<usize, BufWriter<File>>,
}

impl DirectorySnapshots {
    /// Create the output directory if needed
    pub fn create(dir: &Path) -> Result<Self, BankError> {
        fs::create_dir_all(dir).map_err(|e| {
            BankError::resource_unavailable(format!("output directory '{}'", dir.display()), &e)
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            files: HashMap::new(),
        })
    }

    /// Path of the snapshot file for the account at `index`
    pub fn path_for(&self, index: usize) -> PathBuf {
        snapshot_path(&self.dir, index)
    }
}

fn snapshot_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("act_{:02}.txt", index))
}

impl SnapshotSink for DirectorySnapshots {
    fn record(&mut self, cycle: u64, accounts: &[AccountSnapshot]) -> Result<(), BankError> {
        for account in accounts {
            let writer = match self.files.entry(account.index) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let path = snapshot_path(&self.dir, account.index);
                    let file = File::create(&path).map_err(|e| {
                        BankError::resource_unavailable(
                            format!("snapshot file '{}'", path.display()),
                            &e,
                        )
                    })?;
                    entry.insert(BufWriter::new(file))
                }
            };

            writeln!(
                writer,
                "Cycle {}: account {} current balance: {}",
                cycle,
                account.number,
                format_amount(account.balance)
            )?;
            writer.flush()?;
        }

        Ok(())
    }
}

/// In-memory snapshot sink
///
/// Cloning shares the underlying record list, so a test can keep one handle
/// while the coordinator owns the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshots {
    records: Arc<Mutex<Vec<SnapshotRecord>>>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far, in write order
    pub fn records(&self) -> Vec<SnapshotRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of settlement cycles recorded
    pub fn cycles(&self) -> u64 {
        self.records().iter().map(|r| r.cycle).max().unwrap_or(0)
    }
}

impl SnapshotSink for MemorySnapshots {
    fn record(&mut self, cycle: u64, accounts: &[AccountSnapshot]) -> Result<(), BankError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.extend(accounts.iter().cloned().map(|account| SnapshotRecord { cycle, account }));
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    account: &'a str,
    balance: String,
}

/// Write final balances as CSV with columns: account, balance
///
/// Accounts are written in input-file order with two-decimal balances.
pub fn write_balances_csv(
    accounts: &[AccountSnapshot],
    output: &mut dyn Write,
) -> Result<(), BankError> {
    let mut sorted: Vec<&AccountSnapshot> = accounts.iter().collect();
    sorted.sort_by_key(|account| account.index);

    let mut writer = csv::Writer::from_writer(output);
    for account in sorted {
        writer.serialize(BalanceRow {
            account: &account.number,
            balance: format_amount(account.balance),
        })?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn snapshot(index: usize, number: &str, balance: i64) -> AccountSnapshot {
        AccountSnapshot {
            index,
            number: number.to_string(),
            balance: Decimal::new(balance, 2),
        }
    }

    #[test]
    fn test_write_balances_csv_orders_by_index() {
        let accounts = vec![
            snapshot(2, "a3", 32200),
            snapshot(0, "a1", 13700),
            snapshot(1, "a2", 17350),
        ];
        let mut output = Vec::new();

        write_balances_csv(&accounts, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "account,balance\na1,137.00\na2,173.50\na3,322.00\n"
        );
    }

    #[test]
    fn test_write_balances_csv_empty() {
        let mut output = Vec::new();
        write_balances_csv(&[], &mut output).unwrap();
        // The header comes from the first serialized row, so no rows means no output.
        assert!(output.is_empty());
    }

    #[test]
    fn test_directory_snapshots_appends_per_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySnapshots::create(dir.path()).unwrap();

        sink.record(1, &[snapshot(0, "a1", 10000), snapshot(1, "a2", 5000)])
            .unwrap();
        sink.record(2, &[snapshot(0, "a1", 12000), snapshot(1, "a2", 5000)])
            .unwrap();

        let first = fs::read_to_string(sink.path_for(0)).unwrap();
        assert_eq!(
            first,
            "Cycle 1: account a1 current balance: 100.00\n\
             Cycle 2: account a1 current balance: 120.00\n"
        );

        let second = fs::read_to_string(dir.path().join("act_01.txt")).unwrap();
        assert_eq!(second.lines().count(), 2);
        assert!(second.ends_with("Cycle 2: account a2 current balance: 50.00\n"));
    }

    #[test]
    fn test_directory_snapshots_writes_to_path_for() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySnapshots::create(dir.path()).unwrap();

        sink.record(1, &[snapshot(123, "a124", 700)]).unwrap();

        assert_eq!(sink.path_for(123), dir.path().join("act_123.txt"));
        let contents = fs::read_to_string(sink.path_for(123)).unwrap();
        assert_eq!(contents, "Cycle 1: account a124 current balance: 7.00
");
    }

    #[test]
    fn test_directory_snapshots_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("act_00.txt"), "stale\n").unwrap();

        let mut sink = DirectorySnapshots::create(dir.path()).unwrap();
        sink.record(1, &[snapshot(0, "a1", 100)]).unwrap();

        let content = fs::read_to_string(dir.path().join("act_00.txt")).unwrap();
        assert_eq!(content, "Cycle 1: account a1 current balance: 1.00\n");
    }

    #[test]
    fn test_directory_snapshots_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("snapshots");

        let mut sink = DirectorySnapshots::create(&nested).unwrap();
        sink.record(1, &[snapshot(3, "a4", 0)]).unwrap();

        assert!(nested.join("act_03.txt").exists());
    }

    #[test]
    fn test_memory_snapshots_shares_records_between_clones() {
        let handle = MemorySnapshots::new();
        let mut sink = handle.clone();

        sink.record(1, &[snapshot(0, "a1", 100)]).unwrap();
        sink.record(2, &[snapshot(0, "a1", 200)]).unwrap();

        let records = handle.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].cycle, 2);
        assert_eq!(records[1].account.balance, Decimal::new(200, 2));
        assert_eq!(handle.cycles(), 2);
    }
}
