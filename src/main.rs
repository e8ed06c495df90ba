//! Bank Settlement Engine CLI
//!
//! Applies a transaction log to a set of accounts with periodic reward
//! settlement.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- input.txt > balances.csv
//! cargo run -- --workers 8 --threshold 1000 input.txt > balances.csv
//! cargo run -- --ledger audit.txt --output-dir snapshots input.txt > balances.csv
//! RUST_LOG=debug cargo run -- input.txt > balances.csv
//! ```
//!
//! The final balances are written to stdout as CSV. The audit ledger and the
//! per-account snapshot files are written to the configured paths. Logs go to
//! stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (input or ledger cannot be opened, invalid account header,
//!   thread failure)

use bank_settlement_engine::cli;
use bank_settlement_engine::Bank;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = cli::parse_args();
    let bank = Bank::new(args.to_config());

    let mut output = std::io::stdout();
    if let Err(e) = bank.process_file(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
