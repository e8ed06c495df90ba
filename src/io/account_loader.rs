//! Account header loading
//!
//! The input file starts with an account header:
//!
//! ```text
//! 3            <- number of accounts
//! index 0      <- optional, skipped
//! a1           <- account number
//! p1           <- password
//! 100.00       <- opening balance
//! 0.1          <- reward rate
//! ...          <- two more blocks
//! D a1 p1 50   <- transaction section starts here
//! ```
//!
//! [`load_accounts`] consumes exactly the header from the reader and leaves it
//! positioned at the first transaction line, so the same reader can then back
//! the transaction feed.
//!
//! # Error Handling
//!
//! Every header problem is fatal and reported as [`BankError::InputFormat`]
//! with the offending line number.

use crate::types::{Account, BankError};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::io::BufRead;
use std::str::FromStr;

/// Accounts read from the header, plus the number of header lines consumed
#[derive(Debug)]
pub struct AccountHeader {
    pub accounts: Vec<Account>,
    pub lines_read: usize,
}

/// Read the account header from `reader`
pub fn load_accounts<R: BufRead>(reader: &mut R) -> Result<AccountHeader, BankError> {
    let mut lines = HeaderLines { reader, line_num: 0 };

    let count_text = lines.next_field("account count")?;
    let count = usize::from_str(&count_text).map_err(|_| {
        BankError::input_format(
            lines.line_num,
            format!("invalid account count '{}'", count_text),
        )
    })?;

    let mut accounts = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);
    for _ in 0..count {
        let mut number = lines.next_field("account number")?;
        if is_index_marker(&number) {
            number = lines.next_field("account number")?;
        }
        if !seen.insert(number.clone()) {
            return Err(BankError::input_format(
                lines.line_num,
                format!("duplicate account number {}", number),
            ));
        }
        let password = lines.next_field("password")?;
        let balance = lines.next_decimal("balance")?;
        let reward_rate = lines.next_decimal("reward rate")?;

        if reward_rate.is_sign_negative() {
            return Err(BankError::input_format(
                lines.line_num,
                format!("negative reward rate {} for account {}", reward_rate, number),
            ));
        }

        accounts.push(Account::new(number, password, balance, reward_rate));
    }

    Ok(AccountHeader {
        accounts,
        lines_read: lines.line_num,
    })
}

/// `index <n>` lines precede each block in some input files
fn is_index_marker(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some("index"), Some(n), None) if n.parse::<usize>().is_ok()
    )
}

struct HeaderLines<'a, R> {
    reader: &'a mut R,
    line_num: usize,
}

impl<R: BufRead> HeaderLines<'_, R> {
    /// Next non-blank line, trimmed
    fn next_field(&mut self, what: &str) -> Result<String, BankError> {
        let mut buf = String::new();
        loop {
            buf.clear();
            let read = self.reader.read_line(&mut buf)?;
            if read == 0 {
                return Err(BankError::input_format(
                    self.line_num + 1,
                    format!("unexpected end of input, expected {}", what),
                ));
            }
            self.line_num += 1;

            let field = buf.trim();
            if !field.is_empty() {
                return Ok(field.to_string());
            }
        }
    }

    fn next_decimal(&mut self, what: &str) -> Result<Decimal, BankError> {
        let text = self.next_field(what)?;
        Decimal::from_str(&text).map_err(|_| {
            BankError::input_format(self.line_num, format!("invalid {} '{}'", what, text))
        })
    }
}
