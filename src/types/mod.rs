//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account state and snapshots
//! - `command`: Parsed transaction commands
//! - `audit`: Ledger events
//! - `error`: Error types for the settlement engine

pub mod account;
pub mod audit;
pub mod command;
pub mod error;

pub use account::{Account, AccountNumber, AccountSnapshot};
pub use audit::{format_amount, AuditEvent, AuditKind};
pub use command::{Command, CommandKind};
pub use error::BankError;
