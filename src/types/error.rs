//! Error types for the bank settlement engine
//!
//! This module defines every error that can occur while loading accounts,
//! parsing commands, applying them to the account store, or running the
//! settlement and audit threads.
//!
//! # Error Categories
//!
//! - **Parse Errors**: unknown command tags, wrong field counts, bad amounts,
//!   lines that are not UTF-8
//! - **Lookup Errors**: unknown account numbers, password mismatches
//! - **Arithmetic Errors**: balance or volume overflow
//! - **Resource Errors**: input or ledger cannot be opened, invalid account header
//!   or duplicate account numbers, threads that cannot be spawned
//!
//! Parse, lookup and arithmetic errors are recoverable: the offending command is
//! dropped and the worker moves on to the next line. Resource errors are fatal
//! and abort the run before any worker starts.

use thiserror::Error;

/// Main error type for the bank settlement engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BankError {
    /// Leading token of a command line is not a known command tag
    #[error("Unknown command '{tag}'")]
    UnknownCommand {
        /// The unrecognized tag
        tag: String,
    },

    /// Command line does not carry the exact number of fields its tag requires
    #[error("Command '{tag}' expects {expected} fields, got {actual}")]
    WrongArity {
        /// Command tag
        tag: String,
        /// Required field count, including the tag itself
        expected: usize,
        /// Field count found on the line
        actual: usize,
    },

    /// Command line is not valid UTF-8
    #[error("Line is not valid UTF-8 (first bad byte at offset {offset})")]
    InvalidEncoding {
        /// Byte offset of the first invalid sequence
        offset: usize,
    },

    /// Amount field is not a decimal number
    #[error("Invalid amount '{amount}'")]
    InvalidAmount {
        /// The offending amount text
        amount: String,
    },

    /// No account with this number exists in the store
    #[error("Account {account} not found")]
    AccountNotFound {
        /// Account number that was looked up
        account: String,
    },

    /// Supplied password does not match the stored one
    #[error("Authentication failed for account {account}")]
    AuthenticationFailed {
        /// Account number the password was checked against
        account: String,
    },

    /// Arithmetic overflow would occur
    ///
    /// The operation is rejected and the account state remains unchanged.
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account number
        account: String,
    },

    /// Account header of the input file is malformed
    #[error("Input format error at line {line}: {message}")]
    InputFormat {
        /// 1-based line number in the input file
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// Two accounts handed to the account store share a number
    #[error("Duplicate account number {account}")]
    DuplicateAccount {
        /// The repeated account number
        account: String,
    },

    /// Input source or ledger sink could not be opened
    #[error("Failed to open {resource}: {message}")]
    ResourceUnavailable {
        /// What was being opened, including its path
        resource: String,
        /// Underlying OS error
        message: String,
    },

    /// I/O error while reading input or writing output
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// A worker, coordinator or sink thread could not be started
    #[error("Failed to spawn {thread} thread: {message}")]
    ThreadSpawn {
        /// Name of the thread
        thread: String,
        /// Underlying OS error
        message: String,
    },

    /// A worker, coordinator or sink thread panicked
    #[error("{thread} thread panicked")]
    ThreadPanicked {
        /// Name of the thread
        thread: String,
    },
}

impl From<std::io::Error> for BankError {
    fn from(error: std::io::Error) -> Self {
        BankError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for BankError {
    fn from(error: csv::Error) -> Self {
        BankError::IoError {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl BankError {
    /// Create an UnknownCommand error
    pub fn unknown_command(tag: &str) -> Self {
        BankError::UnknownCommand {
            tag: tag.to_string(),
        }
    }

    /// Create a WrongArity error
    pub fn wrong_arity(tag: &str, expected: usize, actual: usize) -> Self {
        BankError::WrongArity {
            tag: tag.to_string(),
            expected,
            actual,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: &str) -> Self {
        BankError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    /// Create an InvalidEncoding error
    pub fn invalid_encoding(error: &std::str::Utf8Error) -> Self {
        BankError::InvalidEncoding {
            offset: error.valid_up_to(),
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: &str) -> Self {
        BankError::AccountNotFound {
            account: account.to_string(),
        }
    }

    /// Create an AuthenticationFailed error
    pub fn authentication_failed(account: &str) -> Self {
        BankError::AuthenticationFailed {
            account: account.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: &str) -> Self {
        BankError::ArithmeticOverflow {
            operation: operation.to_string(),
            account: account.to_string(),
        }
    }

    /// Create an InputFormat error
    pub fn input_format(line: usize, message: impl Into<String>) -> Self {
        BankError::InputFormat {
            line,
            message: message.into(),
        }
    }

    /// Create a DuplicateAccount error
    pub fn duplicate_account(account: &str) -> Self {
        BankError::DuplicateAccount {
            account: account.to_string(),
        }
    }

    /// Create a ResourceUnavailable error from the I/O error that caused it
    pub fn resource_unavailable(resource: impl Into<String>, error: &std::io::Error) -> Self {
        BankError::ResourceUnavailable {
            resource: resource.into(),
            message: error.to_string(),
        }
    }

    /// Create a ThreadSpawn error
    pub fn thread_spawn(thread: &str, error: &std::io::Error) -> Self {
        BankError::ThreadSpawn {
            thread: thread.to_string(),
            message: error.to_string(),
        }
    }

    /// Create a ThreadPanicked error
    pub fn thread_panicked(thread: &str) -> Self {
        BankError::ThreadPanicked {
            thread: thread.to_string(),
        }
    }

    /// Whether a worker may drop the command that produced this error and carry on
    ///
    /// This is the lenient-drop policy: malformed lines, unknown accounts, wrong
    /// passwords and overflowing amounts never stop a worker.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BankError::UnknownCommand { .. }
                | BankError::WrongArity { .. }
                | BankError::InvalidAmount { .. }
                | BankError::InvalidEncoding { .. }
                | BankError::AccountNotFound { .. }
                | BankError::AuthenticationFailed { .. }
                | BankError::ArithmeticOverflow { .. }
        )
    }
}
