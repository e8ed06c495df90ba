//! Thread-safe account store
//!
//! This module provides the `AccountStore`, which owns the fixed account table
//! loaded at startup and one lock per account.
//!
//! # Design
//!
//! The set of accounts never changes after construction, so the number → slot
//! index is a plain `HashMap` read without locking. Each slot is its own
//! `Mutex<Account>`; that mutex guards all of the account's fields.
//!
//! # Locking Rules
//!
//! - Every operation takes at most one account lock at a time.
//! - A transfer locks the source, debits, unlocks, then locks the destination
//!   and credits. Opposing transfers can therefore never deadlock, at the price
//!   of a window in which the debit is visible and the credit is not.
//! - `settle` visits accounts one lock at a time as well; the coordinator only
//!   calls it while every worker is parked.
//!
//! # Lenient Failures
//!
//! Password mismatches are detected under the account lock and return
//! [`BankError::AuthenticationFailed`] without touching the account. Workers
//! treat that, like every recoverable error, as a dropped command.

use crate::types::{Account, AccountNumber, AccountSnapshot, BankError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Opaque reference to one account slot in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountHandle(usize);

impl AccountHandle {
    /// Position of the account in the input file
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed table of accounts with per-account locking
#[derive(Debug)]
pub struct AccountStore {
    accounts: Vec<Mutex<Account>>,
    index: HashMap<AccountNumber, AccountHandle>,
}

impl AccountStore {
    /// Build a store from accounts in input order
    ///
    /// # Errors
    ///
    /// Returns [`BankError::DuplicateAccount`] if two accounts share a number.
    pub fn new(accounts: Vec<Account>) -> Result<Self, BankError> {
        let mut index = HashMap::with_capacity(accounts.len());
        for (slot, account) in accounts.iter().enumerate() {
            if index
                .insert(account.number.clone(), AccountHandle(slot))
                .is_some()
            {
                return Err(BankError::duplicate_account(&account.number));
            }
        }

        Ok(Self {
            accounts: accounts.into_iter().map(Mutex::new).collect(),
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Find an account by number
    pub fn lookup(&self, number: &str) -> Option<AccountHandle> {
        self.index.get(number).copied()
    }

    /// Like `lookup`, but an unknown number is an `AccountNotFound` error
    pub fn require(&self, number: &str) -> Result<AccountHandle, BankError> {
        self.lookup(number)
            .ok_or_else(|| BankError::account_not_found(number))
    }

    /// Credit `amount` to the account if `password` matches
    pub fn deposit(
        &self,
        handle: AccountHandle,
        password: &str,
        amount: Decimal,
    ) -> Result<(), BankError> {
        let mut account = self.lock(handle);
        authenticate(&account, password)?;
        account.credit(amount, "deposit")
    }

    /// Debit `amount` from the account if `password` matches
    pub fn withdraw(
        &self,
        handle: AccountHandle,
        password: &str,
        amount: Decimal,
    ) -> Result<(), BankError> {
        let mut account = self.lock(handle);
        authenticate(&account, password)?;
        account.debit(amount, "withdrawal")
    }

    /// Move `amount` from `source` to `dest`
    ///
    /// `password` authenticates the source only. The two halves run under
    /// separate lock acquisitions: the debit is committed and its lock
    /// released before the destination lock is requested.
    ///
    /// If the credit fails (overflow on the destination) the debit has already
    /// been committed and stays; the error is still returned.
    pub fn transfer(
        &self,
        source: AccountHandle,
        password: &str,
        dest: AccountHandle,
        amount: Decimal,
    ) -> Result<(), BankError> {
        {
            let mut account = self.lock(source);
            authenticate(&account, password)?;
            account.debit(amount, "transfer")?;
        }

        self.lock(dest).credit(amount, "transfer")
    }

    /// Current balance of an account
    pub fn check_balance(&self, handle: AccountHandle) -> Decimal {
        self.lock(handle).balance
    }

    /// Account number for a handle
    pub fn number(&self, handle: AccountHandle) -> AccountNumber {
        self.lock(handle).number.clone()
    }

    /// Accumulated volume since the last settlement
    pub fn volume(&self, handle: AccountHandle) -> Decimal {
        self.lock(handle).volume
    }

    /// Apply reward accrual to every account and return the new balances
    ///
    /// Each account gains `volume × reward_rate` and has its volume reset to
    /// zero. An account whose reward would overflow keeps its balance, loses
    /// its volume and is logged; the pass continues with the remaining accounts.
    pub fn settle(&self) -> Vec<AccountSnapshot> {
        self.accounts
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let mut account = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = account.accrue_reward() {
                    warn!("Reward skipped: {}", e);
                }
                AccountSnapshot {
                    index,
                    number: account.number.clone(),
                    balance: account.balance,
                }
            })
            .collect()
    }

    /// Current balance of every account, in input order
    pub fn snapshots(&self) -> Vec<AccountSnapshot> {
        self.accounts
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let account = slot.lock().unwrap_or_else(PoisonError::into_inner);
                AccountSnapshot {
                    index,
                    number: account.number.clone(),
                    balance: account.balance,
                }
            })
            .collect()
    }

    fn lock(&self, handle: AccountHandle) -> MutexGuard<'_, Account> {
        self.accounts[handle.0]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn authenticate(account: &Account, password: &str) -> Result<(), BankError> {
    if account.authenticate(password) {
        Ok(())
    } else {
        Err(BankError::authentication_failed(&account.number))
    }
}
