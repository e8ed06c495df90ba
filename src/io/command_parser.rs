//! Transaction line parsing
//!
//! Turns one line of the transaction section into a [`Command`]. Parsing is a
//! pure function of the line: no account lookups happen here.
//!
//! # Outcomes
//!
//! - `Ok(Some(command))` - a well-formed command
//! - `Ok(None)` - the line is empty or holds only delimiters (a no-op)
//! - `Err(BankError)` - a rejected line: unknown tag, wrong field count, or an
//!   amount that is not a decimal number
//!
//! Rejected lines are dropped by the workers; they never abort processing.

use crate::types::{BankError, Command, CommandKind};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Characters that separate fields on a transaction line
pub const COMMAND_DELIMITERS: &[char] = &[' ', '\t', '\r', '\n'];

/// Split a line into its non-empty fields
///
/// Runs of delimiters collapse, and leading or trailing delimiters produce no
/// empty fields.
pub fn tokenize<'a>(line: &'a str, delimiters: &[char]) -> Vec<&'a str> {
    line.split(|c: char| delimiters.contains(&c))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse one transaction line using [`COMMAND_DELIMITERS`]
pub fn parse_line(line: &str) -> Result<Option<Command>, BankError> {
    parse_tokens(&tokenize(line, COMMAND_DELIMITERS))
}

/// Build a command from already tokenized fields
pub fn parse_tokens(tokens: &[&str]) -> Result<Option<Command>, BankError> {
    let Some(&tag) = tokens.first() else {
        return Ok(None);
    };

    let kind = CommandKind::from_tag(tag).ok_or_else(|| BankError::unknown_command(tag))?;
    if tokens.len() != kind.arity() {
        return Err(BankError::wrong_arity(tag, kind.arity(), tokens.len()));
    }

    let command = match kind {
        CommandKind::Deposit => Command::Deposit {
            account: tokens[1].to_string(),
            password: tokens[2].to_string(),
            amount: parse_amount(tokens[3])?,
        },
        CommandKind::Withdraw => Command::Withdraw {
            account: tokens[1].to_string(),
            password: tokens[2].to_string(),
            amount: parse_amount(tokens[3])?,
        },
        CommandKind::Transfer => Command::Transfer {
            source: tokens[1].to_string(),
            password: tokens[2].to_string(),
            dest: tokens[3].to_string(),
            amount: parse_amount(tokens[4])?,
        },
        CommandKind::CheckBalance => Command::CheckBalance {
            account: tokens[1].to_string(),
        },
    };

    Ok(Some(command))
}

fn parse_amount(text: &str) -> Result<Decimal, BankError> {
    Decimal::from_str(text).map_err(|_| BankError::invalid_amount(text))
}
