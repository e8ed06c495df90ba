//! I/O module
//!
//! Handles the input file format and the files written by a run.
//!
//! # Components
//!
//! - `account_loader` - Account header reading
//! - `command_parser` - Transaction line tokenizing and parsing
//! - `snapshot` - Settlement snapshot sinks and the final balances CSV

pub mod account_loader;
pub mod command_parser;
pub mod snapshot;

pub use account_loader::{load_accounts, AccountHeader};
pub use command_parser::{parse_line, parse_tokens, tokenize, COMMAND_DELIMITERS};
pub use snapshot::{write_balances_csv, DirectorySnapshots, MemorySnapshots, SnapshotRecord};
