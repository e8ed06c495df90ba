//! Audit sink
//!
//! This module provides the single consumer that turns [`AuditEvent`]s into
//! ledger lines.
//!
//! # Architecture
//!
//! ```text
//! worker-0 ──┐
//! worker-1 ──┼── AuditSender (mpsc, unbounded) ──► audit-sink thread ──► ledger
//! settlement ┘                                     (current-thread runtime)
//! ```
//!
//! Producers hold cloned [`AuditSender`]s and never block: the channel is
//! unbounded. The sink thread owns the only receiver and writes events in the
//! order they arrived. It finishes when the last sender is dropped.
//!
//! # Error Handling
//!
//! A failed write is logged and remembered, but the sink keeps draining the
//! channel so producers are never affected. The first failure is returned from
//! [`AuditSink::join`].

use crate::types::{AuditEvent, BankError};
use std::fs::File;
use std::path::Path;
use std::thread::{self, JoinHandle};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, warn};

const SINK_THREAD: &str = "audit-sink";

/// Producer side of the audit channel
#[derive(Debug, Clone)]
pub struct AuditSender {
    tx: UnboundedSender<AuditEvent>,
}

impl AuditSender {
    /// Queue an event for the ledger without blocking
    pub fn send(&self, event: AuditEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(
                "Audit channel closed, dropping event for account {}",
                e.0.account
            );
        }
    }
}

/// Create an audit channel
pub fn channel() -> (AuditSender, UnboundedReceiver<AuditEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AuditSender { tx }, rx)
}

/// Outcome of a completed drain
#[derive(Debug)]
pub struct LedgerReport<W> {
    /// Events received, whether or not their write succeeded
    pub events: u64,
    /// The ledger writer, flushed
    pub writer: W,
}

/// Write every event from `rx` to `writer` until all senders are gone
pub async fn drain<W>(
    mut rx: UnboundedReceiver<AuditEvent>,
    mut writer: W,
) -> Result<LedgerReport<W>, BankError>
where
    W: AsyncWrite + Unpin,
{
    let mut events = 0;
    let mut first_error = None;

    while let Some(event) = rx.recv().await {
        events += 1;
        if let Err(e) = writer.write_all(event.ledger_line().as_bytes()).await {
            error!("Ledger write failed for account {}: {}", event.account, e);
            if first_error.is_none() {
                first_error = Some(BankError::from(e));
            }
        }
    }

    if let Err(e) = writer.flush().await {
        error!("Ledger flush failed: {}", e);
        if first_error.is_none() {
            first_error = Some(BankError::from(e));
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(LedgerReport { events, writer }),
    }
}

/// Handle to the running `audit-sink` thread
#[derive(Debug)]
pub struct AuditSink<W> {
    handle: JoinHandle<Result<LedgerReport<W>, BankError>>,
}

impl<W> AuditSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Start the sink thread writing to `writer`
    ///
    /// Returns the first sender; clone it for every producer.
    pub fn spawn(writer: W) -> Result<(AuditSender, Self), BankError> {
        let (sender, rx) = channel();

        let handle = thread::Builder::new()
            .name(SINK_THREAD.to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(drain(rx, writer))
            })
            .map_err(|e| BankError::thread_spawn(SINK_THREAD, &e))?;

        Ok((sender, Self { handle }))
    }

    /// Wait for the sink to drain the channel and close the ledger
    ///
    /// Only returns once every [`AuditSender`] has been dropped.
    pub fn join(self) -> Result<LedgerReport<W>, BankError> {
        self.handle
            .join()
            .map_err(|_| BankError::thread_panicked(SINK_THREAD))?
    }
}

/// Open (create or truncate) the ledger file
pub fn open_ledger(path: &Path) -> Result<BufWriter<tokio::fs::File>, BankError> {
    let file = File::create(path).map_err(|e| {
        BankError::resource_unavailable(format!("ledger '{}'", path.display()), &e)
    })?;
    Ok(BufWriter::new(tokio::fs::File::from_std(file)))
}
