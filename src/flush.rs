use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::durability::DurabilitySync;
use crate::error::CapacityConfigError;
use crate::stats::CapacityStats;

const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Shared state between the flush coordinator's worker thread and the
/// handles that signal it from the hot path.
///
/// Split out from [`FlushCoordinator`] itself so the worker closure can hold
/// an owning `Arc` without holding the `JoinHandle`.
struct Shared {
    running: Mutex<bool>,
    cond: Condvar,
    signalled: AtomicBool,
    written: AtomicU64,
    threshold: AtomicU64,
    stats: Arc<CapacityStats>,
    durability: Arc<dyn DurabilitySync>,
}

/// Background worker implementing the flush coordinator.
///
/// Owns the worker thread for its lifetime; [`FlushCoordinator::teardown`]
/// (also run from `Drop`) clears the running flag, wakes the condition, and
/// joins the thread, leaving the coordinator ready for a subsequent
/// [`FlushCoordinator::start`].
pub struct FlushCoordinator {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl FlushCoordinator {
    /// Creates a coordinator in the stopped state.
    ///
    /// `threshold` of `0` means the coordinator is never started by
    /// [`crate::CapacityState`], which only starts the coordinator once a
    /// nonzero threshold has been configured.
    #[must_use]
    pub fn new(threshold: u64, stats: Arc<CapacityStats>, durability: Arc<dyn DurabilitySync>) -> Self {
        Self {
            shared: Arc::new(Shared {
                running: Mutex::new(false),
                cond: Condvar::new(),
                signalled: AtomicBool::new(false),
                written: AtomicU64::new(0),
                threshold: AtomicU64::new(threshold),
                stats,
                durability,
            }),
            worker: None,
        }
    }

    /// Whether the worker thread is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts the worker thread. Idempotent: a no-op if already running.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityConfigError::WorkerSpawn`] if the underlying
    /// `std::thread::Builder::spawn` call fails.
    pub fn start(&mut self) -> Result<(), CapacityConfigError> {
        if self.worker.is_some() {
            return Ok(());
        }

        *self.shared.running.lock().unwrap_or_else(|e| e.into_inner()) = true;

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("capacity-flush".into())
            .spawn(move || worker_loop(&shared))
            .map_err(CapacityConfigError::WorkerSpawn)?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Records `bytes` written by a write-class subsystem and, if the
    /// accumulated total has crossed the threshold and no signal is
    /// currently outstanding, wakes the worker.
    ///
    /// Implements the hot-path half of the coordinator's debounced signal.
    pub fn record_write_and_signal(&self, bytes: u64) {
        self.shared.stats.record_bytes_written(bytes);
        let written = self.shared.written.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.maybe_signal(written);
    }

    fn maybe_signal(&self, written: u64) {
        self.shared.stats.record_signal_call();

        let threshold = self.shared.threshold.load(Ordering::SeqCst);
        if threshold == 0 || written < threshold {
            return;
        }

        if self
            .shared
            .signalled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // The running lock also guards the condvar predicate; acquiring
            // and dropping it before notifying avoids a missed-wakeup race
            // against a worker that is mid-check on `running`.
            drop(self.shared.running.lock().unwrap_or_else(|e| e.into_inner()));
            self.shared.cond.notify_one();
            self.shared.stats.record_signal_sent();
        }
    }

    /// Stops the worker thread and joins it. Idempotent: a no-op if not
    /// running. Leaves the coordinator ready for [`FlushCoordinator::start`].
    pub fn teardown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        *self.shared.running.lock().unwrap_or_else(|e| e.into_inner()) = false;
        self.shared.cond.notify_one();
        let _ = worker.join();
    }

    /// Replaces the flush threshold, e.g. after a configuration change.
    pub fn set_threshold(&self, threshold: u64) {
        self.shared.threshold.store(threshold, Ordering::SeqCst);
        self.shared.stats.set_threshold(threshold);
    }
}

impl Drop for FlushCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn worker_loop(shared: &Shared) {
    let mut guard = shared.running.lock().unwrap_or_else(|e| e.into_inner());
    loop {
        if !*guard {
            return;
        }

        let (next_guard, timeout_result) = shared
            .cond
            .wait_timeout(guard, WAIT_TIMEOUT)
            .unwrap_or_else(|e| e.into_inner());
        guard = next_guard;

        if !*guard {
            return;
        }

        if timeout_result.timed_out() {
            shared.stats.record_timeout();
        } else {
            shared.stats.record_signalled();
        }

        shared.signalled.store(false, Ordering::SeqCst);

        let written = shared.written.load(Ordering::SeqCst);
        let threshold = shared.threshold.load(Ordering::SeqCst);
        if threshold == 0 || written <= threshold {
            shared.stats.record_fsync_notyet();
            continue;
        }

        match shared.durability.fsync_all_background() {
            Ok(()) => {
                shared.written.store(0, Ordering::SeqCst);
            }
            Err(err) => {
                panic!("capacity flush coordinator: background fsync failed: {err}");
            }
        }
    }
}
