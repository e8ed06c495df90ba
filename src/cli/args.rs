use crate::core::BankConfig;
use clap::Parser;
use std::path::PathBuf;

/// Apply a transaction log to a set of accounts with periodic reward settlement
#[derive(Parser, Debug)]
#[command(name = "bank-settlement")]
#[command(
    about = "Apply a transaction log to a set of accounts with periodic reward settlement",
    long_about = None
)]
pub struct CliArgs {
    /// Input file: account header followed by transaction lines
    #[arg(value_name = "INPUT", help = "Path to the input file")]
    pub input_file: PathBuf,

    /// Number of worker threads
    #[arg(
        long = "workers",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    /// Counted transactions between settlements
    #[arg(
        long = "threshold",
        value_name = "COUNT",
        help = "Deposits, withdrawals and transfers per settlement cycle (default: 5000)"
    )]
    pub threshold: Option<u64>,

    /// Balance check sampling interval
    #[arg(
        long = "sample-every",
        value_name = "N",
        help = "Log every N-th successful balance check (default: 500)"
    )]
    pub sample_every: Option<u64>,

    /// Cap on logged balance checks
    #[arg(
        long = "max-samples",
        value_name = "COUNT",
        help = "Maximum number of balance checks written to the ledger (default: 20)"
    )]
    pub max_samples: Option<u64>,

    /// Audit ledger path
    #[arg(
        long = "ledger",
        value_name = "PATH",
        default_value = "ledger.txt",
        help = "Audit ledger file, truncated at start"
    )]
    pub ledger: PathBuf,

    /// Snapshot directory
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory for per-account act_XX.txt snapshot files"
    )]
    pub output_dir: PathBuf,
}

impl CliArgs {
    /// Create a BankConfig from CLI arguments
    ///
    /// Options that were not given take their defaults. Zero values are
    /// rejected by `BankConfig::new`, which logs a warning and falls back to
    /// the default.
    pub fn to_config(&self) -> BankConfig {
        let default = BankConfig::default();
        BankConfig::new(
            self.workers.unwrap_or(default.workers),
            self.threshold.unwrap_or(default.settlement_threshold),
            self.sample_every.unwrap_or(default.check_sample_every),
        )
        .with_max_check_samples(self.max_samples.unwrap_or(default.max_check_samples))
        .with_ledger_path(&self.ledger)
        .with_output_dir(&self.output_dir)
    }
}
