//! Settlement gate and coordinator
//!
//! This module provides the rendezvous between the worker pool and the
//! settlement thread.
//!
//! # Design
//!
//! All cycle state lives behind one mutex in [`SettlementGate`]:
//!
//! ```text
//! CycleState
//!     ├── phase        Accepting | Draining | Settling
//!     ├── counter      counted admissions in the current cycle
//!     ├── in_flight    admitted commands not yet reported
//!     ├── active       workers that have not exited
//!     └── generation   bumped by every release
//! ```
//!
//! Two condvars hang off that mutex: `settle_ready` wakes the coordinator,
//! `released` wakes parked workers.
//!
//! # Protocol
//!
//! 1. A worker calls [`SettlementGate::admit`] before applying a command. While
//!    the phase is not `Accepting` it waits on `released`. A counted command
//!    (deposit, withdrawal, transfer) increments the counter; reaching the
//!    threshold flips the phase to `Draining`.
//! 2. After applying, the worker calls [`Admission::report`]. In-flight drops
//!    by one. If the gate is not `Accepting`, the worker parks until the
//!    generation changes.
//! 3. The coordinator waits in [`SettlementGate::await_settlement`] until the
//!    gate is `Draining` with nothing in flight, or until no worker is left.
//!    It then holds the `Settling` phase while it runs the settlement pass
//!    without holding the gate lock.
//! 4. [`SettlementGate::release`] resets the counter, bumps the generation and
//!    wakes every parked worker.
//!
//! Because admissions stop at the threshold, the counter never exceeds it and
//! every counted command belongs to exactly one cycle. The number of
//! settlements in a run is `counted / threshold + 1`, whatever the thread
//! interleaving.
//!
//! # Panic Safety
//!
//! [`Admission`] and [`ActiveWorker`] are RAII guards: a worker that panics
//! mid-command still leaves the in-flight and active counts consistent. If the
//! coordinator itself dies, the gate is closed and stops parking anyone.

use crate::core::account_store::AccountStore;
use crate::core::audit_sink::AuditSender;
use crate::core::config::DEFAULT_SETTLEMENT_THRESHOLD;
use crate::core::traits::SnapshotSink;
use crate::types::{format_amount, AuditEvent, BankError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const COORDINATOR_THREAD: &str = "settlement";

/// Gate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Workers are admitted freely
    Accepting,
    /// Threshold reached; in-flight commands finish, new ones wait
    Draining,
    /// The coordinator is applying the settlement pass
    Settling,
}

/// Why the coordinator was woken for a settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The cycle's counter reached the threshold
    Threshold,
    /// Every worker has exited; this is the final settlement
    Exhausted,
}

#[derive(Debug)]
struct CycleState {
    phase: Phase,
    counter: u64,
    in_flight: usize,
    active: usize,
    generation: u64,
    closed: bool,
}

/// Global transaction counter and worker rendezvous
#[derive(Debug)]
pub struct SettlementGate {
    threshold: u64,
    state: Mutex<CycleState>,
    settle_ready: Condvar,
    released: Condvar,
}

impl SettlementGate {
    /// Create a gate that triggers every `threshold` counted commands
    ///
    /// A threshold of zero falls back to [`DEFAULT_SETTLEMENT_THRESHOLD`]
    /// with a warning, as in [`BankConfig::new`](crate::core::BankConfig::new).
    pub fn new(threshold: u64) -> Self {
        let threshold = if threshold == 0 {
            warn!(
                "Invalid settlement threshold (0), using default ({})",
                DEFAULT_SETTLEMENT_THRESHOLD
            );
            DEFAULT_SETTLEMENT_THRESHOLD
        } else {
            threshold
        };

        Self {
            threshold,
            state: Mutex::new(CycleState {
                phase: Phase::Accepting,
                counter: 0,
                in_flight: 0,
                active: 0,
                generation: 0,
                closed: false,
            }),
            settle_ready: Condvar::new(),
            released: Condvar::new(),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Register `count` workers up front
    ///
    /// Must happen before the coordinator starts waiting, otherwise it could
    /// see zero active workers and settle for the last time immediately. Each
    /// returned guard deregisters its worker when dropped.
    pub fn enlist(self: &Arc<Self>, count: usize) -> Vec<ActiveWorker> {
        self.lock().active += count;
        (0..count)
            .map(|_| ActiveWorker {
                gate: Arc::clone(self),
            })
            .collect()
    }

    /// Wait until commands are accepted, then admit one
    pub fn admit(&self, counted: bool) -> Admission<'_> {
        let mut state = self.lock();
        while state.phase != Phase::Accepting && !state.closed {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.in_flight += 1;
        if counted && !state.closed {
            state.counter += 1;
            if state.counter >= self.threshold {
                state.phase = Phase::Draining;
                self.settle_ready.notify_one();
            }
        }

        Admission {
            gate: self,
            open: true,
        }
    }

    /// Block the coordinator until a settlement is due
    ///
    /// On return the phase is `Settling` and no command is in flight.
    pub fn await_settlement(&self) -> Trigger {
        let mut state = self.lock();
        loop {
            if state.phase == Phase::Draining && state.in_flight == 0 {
                state.phase = Phase::Settling;
                return Trigger::Threshold;
            }
            if state.active == 0 && state.in_flight == 0 {
                state.phase = Phase::Settling;
                return Trigger::Exhausted;
            }
            state = self
                .settle_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// End the current cycle and wake every parked worker
    pub fn release(&self) {
        let mut state = self.lock();
        state.counter = 0;
        state.generation += 1;
        state.phase = Phase::Accepting;
        self.released.notify_all();
    }

    /// Counted admissions in the current cycle
    pub fn counter(&self) -> u64 {
        self.lock().counter
    }

    /// Number of completed releases
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Stop parking workers; used when the coordinator goes away
    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.released.notify_all();
    }

    fn complete(&self) {
        let mut state = self.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.settle_ready.notify_one();
        }

        if state.phase != Phase::Accepting {
            let generation = state.generation;
            while state.generation == generation && !state.closed {
                state = self
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    fn abandon(&self) {
        let mut state = self.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.settle_ready.notify_one();
        }
    }

    fn worker_exited(&self) {
        let mut state = self.lock();
        state.active -= 1;
        if state.active == 0 {
            self.settle_ready.notify_one();
        }
    }

    fn lock(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An admitted command that has not been reported yet
///
/// Dropping it without [`report`](Admission::report) (a panicking worker)
/// releases its in-flight slot without parking.
#[must_use = "an admission must be reported once its command has been applied"]
#[derive(Debug)]
pub struct Admission<'a> {
    gate: &'a SettlementGate,
    open: bool,
}

impl Admission<'_> {
    /// Mark the command applied, parking if a settlement is pending
    pub fn report(mut self) {
        self.open = false;
        self.gate.complete();
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.open {
            self.gate.abandon();
        }
    }
}

/// Registration of one live worker; deregisters on drop
#[derive(Debug)]
pub struct ActiveWorker {
    gate: Arc<SettlementGate>,
}

impl ActiveWorker {
    pub fn gate(&self) -> &SettlementGate {
        &self.gate
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.gate.worker_exited();
    }
}

struct CloseOnExit(Arc<SettlementGate>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// What the coordinator did over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    /// Settlement passes, including the final one
    pub settlements: u64,
    /// Settlements triggered by the threshold
    pub threshold_settlements: u64,
    /// Largest counter value seen at the start of a settlement
    pub peak_counter: u64,
}

/// Runs the settlement pass whenever the gate asks for one
pub struct SettlementCoordinator<S> {
    store: Arc<AccountStore>,
    gate: Arc<SettlementGate>,
    snapshots: S,
    audit: AuditSender,
    report: CoordinatorReport,
}

impl<S: SnapshotSink> SettlementCoordinator<S> {
    pub fn new(
        store: Arc<AccountStore>,
        gate: Arc<SettlementGate>,
        snapshots: S,
        audit: AuditSender,
    ) -> Self {
        Self {
            store,
            gate,
            snapshots,
            audit,
            report: CoordinatorReport::default(),
        }
    }

    /// Settle on every trigger until the final settlement has run
    pub fn run(mut self) -> CoordinatorReport {
        let _close = CloseOnExit(Arc::clone(&self.gate));

        loop {
            let trigger = self.gate.await_settlement();
            let counted = self.gate.counter();
            self.settle(trigger, counted);
            self.gate.release();

            if trigger == Trigger::Exhausted {
                break;
            }
        }

        self.report
    }

    fn settle(&mut self, trigger: Trigger, counted: u64) {
        let cycle = self.report.settlements + 1;
        let snapshots = self.store.settle();

        if let Err(e) = self.snapshots.record(cycle, &snapshots) {
            error!("Snapshot for settlement {} failed: {}", cycle, e);
        }

        for account in &snapshots {
            debug!(
                "Settlement {}: {} -> {}",
                cycle,
                account.number,
                format_amount(account.balance)
            );
            self.audit
                .send(AuditEvent::settlement(&account.number, account.balance));
        }

        self.report.settlements = cycle;
        self.report.peak_counter = self.report.peak_counter.max(counted);
        if trigger == Trigger::Threshold {
            self.report.threshold_settlements += 1;
        }

        info!(
            "Settlement {} complete ({:?}, {} counted transactions, {} accounts)",
            cycle,
            trigger,
            counted,
            snapshots.len()
        );
    }
}

impl<S: SnapshotSink + Send + 'static> SettlementCoordinator<S> {
    /// Run the coordinator on its own `settlement` thread
    pub fn spawn(self) -> Result<CoordinatorHandle, BankError> {
        let handle = thread::Builder::new()
            .name(COORDINATOR_THREAD.to_string())
            .spawn(move || self.run())
            .map_err(|e| BankError::thread_spawn(COORDINATOR_THREAD, &e))?;

        Ok(CoordinatorHandle { handle })
    }
}

/// Join handle of the `settlement` thread
#[derive(Debug)]
pub struct CoordinatorHandle {
    handle: JoinHandle<CoordinatorReport>,
}

impl CoordinatorHandle {
    pub fn join(self) -> Result<CoordinatorReport, BankError> {
        self.handle
            .join()
            .map_err(|_| BankError::thread_panicked(COORDINATOR_THREAD))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit_sink::channel;
    use crate::io::MemorySnapshots;
    use crate::types::Account;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn store() -> Arc<AccountStore> {
        Arc::new(
            AccountStore::new(vec![
                Account::new("a1", "p1", Decimal::new(100, 0), Decimal::new(1, 1)),
                Account::new("a2", "p2", Decimal::new(200, 0), Decimal::new(1, 1)),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_gate_starts_accepting() {
        let gate = SettlementGate::new(3);
        assert_eq!(gate.phase(), Phase::Accepting);
        assert_eq!(gate.counter(), 0);
        assert_eq!(gate.generation(), 0);
    }

    #[test]
    fn test_zero_threshold_falls_back_to_default() {
        assert_eq!(
            SettlementGate::new(0).threshold(),
            DEFAULT_SETTLEMENT_THRESHOLD
        );
    }

    #[test]
    fn test_uncounted_admissions_leave_counter() {
        let gate = SettlementGate::new(2);
        for _ in 0..5 {
            gate.admit(false).report();
        }
        assert_eq!(gate.counter(), 0);
        assert_eq!(gate.phase(), Phase::Accepting);
    }

    #[test]
    fn test_threshold_flips_to_draining() {
        let gate = SettlementGate::new(2);
        gate.admit(true).report();
        assert_eq!(gate.phase(), Phase::Accepting);

        let admission = gate.admit(true);
        assert_eq!(gate.counter(), 2);
        assert_eq!(gate.phase(), Phase::Draining);
        // Dropped without report: in-flight is released without parking.
        drop(admission);

        assert_eq!(gate.await_settlement(), Trigger::Threshold);
        assert_eq!(gate.phase(), Phase::Settling);
        gate.release();
        assert_eq!(gate.counter(), 0);
        assert_eq!(gate.generation(), 1);
        assert_eq!(gate.phase(), Phase::Accepting);
    }

    #[test]
    fn test_exhausted_when_no_workers_remain() {
        let gate = Arc::new(SettlementGate::new(10));
        let workers = gate.enlist(2);
        gate.admit(true).report();
        drop(workers);

        assert_eq!(gate.await_settlement(), Trigger::Exhausted);
        assert_eq!(gate.counter(), 1);
    }

    #[test]
    fn test_crossing_worker_parks_until_release() {
        let gate = Arc::new(SettlementGate::new(1));
        let _workers = gate.enlist(1);
        let reported = Arc::new(AtomicU64::new(0));

        let worker = {
            let gate = Arc::clone(&gate);
            let reported = Arc::clone(&reported);
            thread::spawn(move || {
                gate.admit(true).report();
                reported.store(1, Ordering::SeqCst);
            })
        };

        assert_eq!(gate.await_settlement(), Trigger::Threshold);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(reported.load(Ordering::SeqCst), 0);

        gate.release();
        worker.join().unwrap();
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_admissions_wait_while_settling() {
        let gate = Arc::new(SettlementGate::new(1));
        drop(gate.admit(true));
        assert_eq!(gate.await_settlement(), Trigger::Threshold);

        let admitted = Arc::new(AtomicU64::new(0));
        let worker = {
            let gate = Arc::clone(&gate);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                let admission = gate.admit(false);
                admitted.store(1, Ordering::SeqCst);
                admission.report();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(admitted.load(Ordering::SeqCst), 0);

        gate.release();
        worker.join().unwrap();
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_gate_never_parks() {
        let gate = Arc::new(SettlementGate::new(1));
        drop(CloseOnExit(Arc::clone(&gate)));

        // Would park forever on an open gate.
        gate.admit(true).report();
        gate.admit(true).report();
    }

    #[test]
    fn test_coordinator_settles_once_per_threshold_plus_final() {
        let store = store();
        let gate = Arc::new(SettlementGate::new(10));
        let snapshots = MemorySnapshots::new();
        let (audit, mut rx) = channel();
        let workers = gate.enlist(4);
        let start = Arc::new(Barrier::new(4));

        let coordinator = SettlementCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&gate),
            snapshots.clone(),
            audit,
        )
        .spawn()
        .unwrap();

        let threads: Vec<_> = workers
            .into_iter()
            .map(|active| {
                let store = Arc::clone(&store);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    let a1 = store.lookup("a1").unwrap();
                    for _ in 0..25 {
                        let admission = active.gate().admit(true);
                        assert!(active.gate().counter() <= active.gate().threshold());
                        store.deposit(a1, "p1", Decimal::ONE).unwrap();
                        admission.report();
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        let report = coordinator.join().unwrap();

        // 100 counted commands, threshold 10: ten threshold settlements plus the final one
        assert_eq!(report.settlements, 11);
        assert_eq!(report.threshold_settlements, 10);
        assert_eq!(report.peak_counter, 10);
        assert_eq!(snapshots.cycles(), 11);
        assert_eq!(snapshots.records().len(), 22);
        assert_eq!(gate.counter(), 0);

        // a1: 100 deposited with volume 1 each, settled every 10 → reward 1 per cycle
        let a1 = store.lookup("a1").unwrap();
        assert_eq!(store.check_balance(a1), Decimal::new(210, 0));

        let mut events = 0;
        while rx.try_recv().is_ok() {
            events += 1;
        }
        assert_eq!(events, 22);
    }

    #[test]
    fn test_coordinator_final_settlement_with_no_commands() {
        let store = store();
        let gate = Arc::new(SettlementGate::new(5));
        let snapshots = MemorySnapshots::new();
        let (audit, _rx) = channel();
        drop(gate.enlist(3));

        let report =
            SettlementCoordinator::new(store, Arc::clone(&gate), snapshots.clone(), audit).run();

        assert_eq!(report.settlements, 1);
        assert_eq!(report.threshold_settlements, 0);
        assert_eq!(snapshots.cycles(), 1);
    }
}
