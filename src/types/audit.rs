//! Audit event types
//!
//! Audit events are produced by workers (balance check samples) and by the
//! settlement coordinator (one record per account per settlement), then moved
//! into the audit sink's channel. The sink renders each one as a ledger line.

use super::account::AccountNumber;
use chrono::{DateTime, Local};
use rust_decimal::{Decimal, RoundingStrategy};

/// ctime(3)-style timestamp, e.g. `Tue Oct 15 09:41:07 2024`
const LEDGER_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// What produced an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// A sampled balance check from a worker
    CheckSample,
    /// A post-settlement balance record from the coordinator
    Settlement,
}

/// A single ledger entry
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub timestamp: DateTime<Local>,
    pub account: AccountNumber,
    pub kind: AuditKind,
    pub message: String,
}

impl AuditEvent {
    /// Record a sampled balance check
    pub fn check_sample(account: &str, balance: Decimal) -> Self {
        AuditEvent {
            timestamp: Local::now(),
            account: account.to_string(),
            kind: AuditKind::CheckSample,
            message: format!(
                "Worker checked balance of Account {}. Balance is ${}",
                account,
                format_amount(balance)
            ),
        }
    }

    /// Record an account's balance after reward accrual
    pub fn settlement(account: &str, balance: Decimal) -> Self {
        AuditEvent {
            timestamp: Local::now(),
            account: account.to_string(),
            kind: AuditKind::Settlement,
            message: format!(
                "Applied interest to account {}. New Balance: ${}",
                account,
                format_amount(balance)
            ),
        }
    }

    /// Render the event as one newline-terminated ledger line
    pub fn ledger_line(&self) -> String {
        let label = match self.kind {
            AuditKind::CheckSample => "Check occurred at",
            AuditKind::Settlement => "Time of Update:",
        };
        format!(
            "{}. {} {}\n",
            self.message,
            label,
            self.timestamp.format(LEDGER_TIME_FORMAT)
        )
    }
}

/// Format an amount with exactly two decimal places, rounding half away from zero
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
