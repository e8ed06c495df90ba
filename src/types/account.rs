//! Account-related types for the bank settlement engine
//!
//! This module defines the Account structure, the balance mutations applied to
//! it by workers, and the reward accrual applied by the settlement pass.

use super::error::BankError;
use rust_decimal::Decimal;
use std::fmt;

/// Account identifier as it appears in the input file
pub type AccountNumber = String;

/// Bank account state
///
/// All five fields are guarded together by one lock in the account store; this
/// type itself is plain data.
#[derive(Clone, PartialEq)]
pub struct Account {
    /// Unique account number
    pub number: AccountNumber,

    /// Opaque credential, compared by equality only
    pub password: String,

    /// Current balance (signed; withdrawals may overdraw)
    pub balance: Decimal,

    /// Fraction of the accumulated volume credited at each settlement
    pub reward_rate: Decimal,

    /// Sum of absolute amounts moved through this account since the last settlement
    ///
    /// Drained to zero by every settlement pass.
    pub volume: Decimal,
}

impl Account {
    /// Create an account with no accumulated volume
    pub fn new(
        number: impl Into<AccountNumber>,
        password: impl Into<String>,
        balance: Decimal,
        reward_rate: Decimal,
    ) -> Self {
        Account {
            number: number.into(),
            password: password.into(),
            balance,
            reward_rate,
            volume: Decimal::ZERO,
        }
    }

    /// Check a supplied password against the stored one
    pub fn authenticate(&self, password: &str) -> bool {
        self.password == password
    }

    /// Add `amount` to the balance and its magnitude to the volume
    ///
    /// Both new values are computed before either is stored, so an overflow
    /// leaves the account untouched.
    pub fn credit(&mut self, amount: Decimal, operation: &str) -> Result<(), BankError> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| BankError::arithmetic_overflow(operation, &self.number))?;
        let volume = self.tracked_volume(amount, operation)?;

        self.balance = balance;
        self.volume = volume;
        Ok(())
    }

    /// Subtract `amount` from the balance and add its magnitude to the volume
    pub fn debit(&mut self, amount: Decimal, operation: &str) -> Result<(), BankError> {
        let balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| BankError::arithmetic_overflow(operation, &self.number))?;
        let volume = self.tracked_volume(amount, operation)?;

        self.balance = balance;
        self.volume = volume;
        Ok(())
    }

    /// Credit `volume × reward_rate` to the balance and reset the volume
    ///
    /// Returns the reward that was credited. The volume is drained even when
    /// the reward overflows; the balance is then left unchanged.
    pub fn accrue_reward(&mut self) -> Result<Decimal, BankError> {
        let volume = std::mem::take(&mut self.volume);
        let reward = volume
            .checked_mul(self.reward_rate)
            .ok_or_else(|| BankError::arithmetic_overflow("reward", &self.number))?;
        self.balance = self
            .balance
            .checked_add(reward)
            .ok_or_else(|| BankError::arithmetic_overflow("reward", &self.number))?;
        Ok(reward)
    }

    fn tracked_volume(&self, amount: Decimal, operation: &str) -> Result<Decimal, BankError> {
        self.volume
            .checked_add(amount.abs())
            .ok_or_else(|| BankError::arithmetic_overflow(operation, &self.number))
    }
}

// Passwords never end up in logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("number", &self.number)
            .field("password", &"<redacted>")
            .field("balance", &self.balance)
            .field("reward_rate", &self.reward_rate)
            .field("volume", &self.volume)
            .finish()
    }
}

/// Point-in-time copy of an account's public state
///
/// Produced by the account store for settlement snapshots, the audit ledger,
/// and the final balances table.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    /// Position of the account in the input file (0-based)
    pub index: usize,

    /// Account number
    pub number: AccountNumber,

    /// Balance at the time of the snapshot
    pub balance: Decimal,
}
