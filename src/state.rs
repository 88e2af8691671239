use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::CapacityConfig;
use crate::durability::DurabilitySync;
use crate::error::CapacityConfigError;
use crate::flush::FlushCoordinator;
use crate::reservation::{reserve, rollback, slot_ns, try_borrow, ReservationCounter};
use crate::stats::{CapacityStats, CapacityStatsSnapshot};
use crate::Subsystem;

const BORROW_ELIGIBILITY_LAG_NS: u64 = 500_000_000;
const SLEEP_CUTOFF_US: u64 = 100;

struct Reservations {
    ckpt: ReservationCounter,
    evict: ReservationCounter,
    log: ReservationCounter,
    read: ReservationCounter,
    total: ReservationCounter,
}

impl Reservations {
    fn new() -> Self {
        Self {
            ckpt: ReservationCounter::new(),
            evict: ReservationCounter::new(),
            log: ReservationCounter::new(),
            read: ReservationCounter::new(),
            total: ReservationCounter::new(),
        }
    }

    fn for_subsystem(&self, subsystem: Subsystem) -> &ReservationCounter {
        match subsystem {
            Subsystem::Checkpoint => &self.ckpt,
            Subsystem::Eviction => &self.evict,
            Subsystem::Log => &self.log,
            Subsystem::Read => &self.read,
        }
    }
}

/// The per-handle I/O capacity throttle core.
///
/// Implements the throttle entry point plus the flush coordinator's
/// lifecycle operations. One instance is owned by a storage handle for its
/// lifetime; it is safe to share across threads behind an `Arc` and call
/// [`CapacityState::throttle`] concurrently from any number of caller
/// threads.
pub struct CapacityState {
    clock: Arc<dyn Clock>,
    durability: Arc<dyn DurabilitySync>,
    config: RwLock<CapacityConfig>,
    reservations: Reservations,
    stats: Arc<CapacityStats>,
    flush: Mutex<FlushCoordinator>,
    readonly: AtomicBool,
    recovering: AtomicBool,
    #[cfg(feature = "test-support")]
    recorded_sleeps: Mutex<Vec<Duration>>,
}

impl CapacityState {
    /// Creates an unconfigured state (`io_capacity.total == 0`, throttling
    /// disabled, flush coordinator stopped).
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, durability: Arc<dyn DurabilitySync>) -> Self {
        let stats = Arc::new(CapacityStats::new());
        let flush = FlushCoordinator::new(0, Arc::clone(&stats), Arc::clone(&durability));
        Self {
            clock,
            durability,
            config: RwLock::new(CapacityConfig::default()),
            reservations: Reservations::new(),
            stats,
            flush: Mutex::new(flush),
            readonly: AtomicBool::new(false),
            recovering: AtomicBool::new(false),
            #[cfg(feature = "test-support")]
            recorded_sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Binds `total` bytes/sec into per-subsystem budgets and a flush
    /// threshold, and (re)starts the flush coordinator.
    ///
    /// Reconfiguration is destructive: any running coordinator
    /// is torn down before the new configuration takes effect, so this is
    /// the single entry point for both first-time configure and reconfigure.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityConfigError::BelowMinimum`] if `total` is nonzero
    /// but below the configured minimum, or
    /// [`CapacityConfigError::WorkerSpawn`] if the coordinator's worker
    /// thread cannot be spawned. On either error the previous configuration
    /// is preserved.
    pub fn configure(&self, total: u64) -> Result<(), CapacityConfigError> {
        let new_config = CapacityConfig::from_total(total)?;

        let mut flush = self.flush.lock().unwrap_or_else(|e| e.into_inner());
        flush.teardown();

        let mut next = FlushCoordinator::new(
            new_config.threshold(),
            Arc::clone(&self.stats),
            Arc::clone(&self.durability),
        );
        if new_config.threshold() != 0 && !self.readonly.load(Ordering::SeqCst) {
            next.start()?;
        }
        *flush = next;

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = new_config;

        #[cfg(feature = "tracing")]
        tracing::debug!(total, "capacity state reconfigured");

        Ok(())
    }

    /// Tears down the flush coordinator and resets the configuration to
    /// disabled, leaving the state ready for a subsequent
    /// [`CapacityState::configure`] call that is byte-identical to a fresh
    /// one.
    pub fn teardown(&self) {
        self.flush
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .teardown();
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = CapacityConfig::default();
    }

    /// Marks the handle read-only. A read-only handle never starts the
    /// flush coordinator on a subsequent configure.
    pub fn set_readonly(&self, readonly: bool) {
        self.readonly.store(readonly, Ordering::SeqCst);
    }

    /// Marks the handle as under recovery. While set, [`CapacityState::throttle`]
    /// returns immediately for every call, regardless of configured capacity.
    pub fn set_recovering(&self, recovering: bool) {
        self.recovering.store(recovering, Ordering::SeqCst);
    }

    /// Returns a snapshot of the statistics counters.
    #[must_use]
    pub fn stats(&self) -> CapacityStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the currently bound configuration.
    #[must_use]
    pub fn config(&self) -> CapacityConfig {
        *self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Charges `bytes` against `subsystem`'s budget, sleeping as needed to
    /// keep the observed byte-rate within the configured caps.
    ///
    /// Implements the full throttle contract: gating, write accounting and flush
    /// signalling, dual (subsystem + total) reservation, bounded one-shot
    /// borrowing from an idle peer, and the terminal sleep.
    pub fn throttle(&self, subsystem: Subsystem, bytes: u64) {
        let config = self.config();

        let sub_capacity = config.capacity_for(subsystem);
        let total_capacity = config.total();

        if sub_capacity == 0 && total_capacity == 0 {
            return;
        }
        if self.recovering.load(Ordering::SeqCst) {
            return;
        }

        self.stats.record_call(subsystem);
        self.stats.record_total_call();

        if subsystem.counts_as_write() {
            self.flush
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record_write_and_signal(bytes);
        } else {
            self.stats.record_bytes_read(bytes);
        }

        let mut allow_borrow = true;
        let (res_sub, res_total, now_ns) = loop {
            let now_ns = self.clock.now_ns();

            let mut res_sub = reserve(
                self.reservations.for_subsystem(subsystem),
                bytes,
                sub_capacity,
                now_ns,
            );
            let res_total = reserve(&self.reservations.total, bytes, total_capacity, now_ns);

            let should_borrow =
                allow_borrow && total_capacity != 0 && res_sub > now_ns && res_total <= now_ns;

            if should_borrow {
                if let Some(victim) = self.select_borrow_victim(&config, subsystem, now_ns) {
                    let victim_capacity = config.capacity_for(victim);
                    let victim_counter = self.reservations.for_subsystem(victim);
                    let baseline = victim_counter.peek();

                    match try_borrow(victim_counter, baseline, victim_capacity, bytes, now_ns) {
                        Some(credit_bytes) => {
                            rollback(
                                self.reservations.for_subsystem(subsystem),
                                credit_bytes,
                                sub_capacity,
                            );
                            let credit_ns = slot_ns(credit_bytes, sub_capacity);
                            res_sub = res_sub.saturating_sub(credit_ns);

                            #[cfg(feature = "tracing")]
                            tracing::trace!(?subsystem, ?victim, credit_bytes, "borrowed idle capacity");
                        }
                        None => {
                            rollback(self.reservations.for_subsystem(subsystem), bytes, sub_capacity);
                            rollback(&self.reservations.total, bytes, total_capacity);
                            allow_borrow = false;
                            continue;
                        }
                    }
                }
            }

            break (res_sub, res_total, now_ns);
        };

        let deadline = res_sub.max(res_total);
        if deadline <= now_ns {
            return;
        }

        let sleep_us = (deadline - now_ns) / 1000;

        if res_sub >= res_total {
            self.stats.record_subsystem_throttle(subsystem, sleep_us);
        } else {
            self.stats.record_total_throttle(sleep_us);
        }

        if sleep_us <= SLEEP_CUTOFF_US {
            return;
        }

        self.sleep(Duration::from_micros(sleep_us));
    }

    fn select_borrow_victim(
        &self,
        config: &CapacityConfig,
        subsystem: Subsystem,
        now_ns: u64,
    ) -> Option<Subsystem> {
        let cutoff = now_ns.saturating_sub(BORROW_ELIGIBILITY_LAG_NS);
        let mut best: Option<(Subsystem, u64)> = None;

        for peer in subsystem.peers() {
            if config.capacity_for(peer) == 0 {
                continue;
            }
            let value = self.reservations.for_subsystem(peer).peek();
            if value >= cutoff {
                continue;
            }
            match best {
                Some((_, best_value)) if value >= best_value => {}
                _ => best = Some((peer, value)),
            }
        }

        best.map(|(subsystem, _)| subsystem)
    }

    #[cfg(not(feature = "test-support"))]
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    #[cfg(feature = "test-support")]
    fn sleep(&self, duration: Duration) {
        self.recorded_sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
    }

    /// Returns the durations previously passed to the terminal sleep,
    /// without actually sleeping. Only available with the `test-support`
    /// feature enabled.
    #[cfg(feature = "test-support")]
    #[must_use]
    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.recorded_sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for CapacityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityState")
            .field("config", &self.config())
            .field("readonly", &self.readonly.load(Ordering::SeqCst))
            .field("recovering", &self.recovering.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
