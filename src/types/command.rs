//! Command types for the bank settlement engine
//!
//! A command is one parsed transaction line. Commands are immutable once
//! parsed and own nothing beyond their string fields.

use super::account::AccountNumber;
use rust_decimal::Decimal;

/// Command kinds and their input tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `D <account> <password> <amount>`
    Deposit,
    /// `W <account> <password> <amount>`
    Withdraw,
    /// `T <source> <password> <dest> <amount>`
    Transfer,
    /// `C <account>`
    CheckBalance,
}

impl CommandKind {
    /// Resolve a tag token, ignoring case
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "D" => Some(CommandKind::Deposit),
            "W" => Some(CommandKind::Withdraw),
            "T" => Some(CommandKind::Transfer),
            "C" => Some(CommandKind::CheckBalance),
            _ => None,
        }
    }

    /// Exact number of fields a line of this kind carries, tag included
    pub const fn arity(self) -> usize {
        match self {
            CommandKind::Deposit | CommandKind::Withdraw => 4,
            CommandKind::Transfer => 5,
            CommandKind::CheckBalance => 2,
        }
    }

    /// Whether commands of this kind count toward the settlement threshold
    ///
    /// Balance checks are sampled separately and never trigger a settlement.
    pub const fn is_counted(self) -> bool {
        !matches!(self, CommandKind::CheckBalance)
    }
}

/// A parsed transaction command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Credit `amount` to `account`
    Deposit {
        account: AccountNumber,
        password: String,
        amount: Decimal,
    },

    /// Debit `amount` from `account`
    Withdraw {
        account: AccountNumber,
        password: String,
        amount: Decimal,
    },

    /// Debit `amount` from `source`, then credit it to `dest`
    ///
    /// The password authenticates the source account only.
    Transfer {
        source: AccountNumber,
        password: String,
        dest: AccountNumber,
        amount: Decimal,
    },

    /// Read the balance of `account`
    CheckBalance { account: AccountNumber },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Deposit { .. } => CommandKind::Deposit,
            Command::Withdraw { .. } => CommandKind::Withdraw,
            Command::Transfer { .. } => CommandKind::Transfer,
            Command::CheckBalance { .. } => CommandKind::CheckBalance,
        }
    }

    /// Shorthand for `self.kind().is_counted()`
    pub fn is_counted(&self) -> bool {
        self.kind().is_counted()
    }
}
