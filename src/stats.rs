use std::sync::atomic::{AtomicU64, Ordering};

use crate::Subsystem;

/// Per-subsystem call/throttle/time counters, plus the totals row.
#[derive(Debug, Default)]
struct SubsystemCounters {
    calls: AtomicU64,
    throttles: AtomicU64,
    time_us: AtomicU64,
}

impl SubsystemCounters {
    fn snapshot(&self) -> SubsystemStats {
        SubsystemStats {
            calls: self.calls.load(Ordering::Relaxed),
            throttles: self.throttles.load(Ordering::Relaxed),
            time_us: self.time_us.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the counters for one subsystem (or the total row).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubsystemStats {
    /// Number of `throttle()` calls for this tag.
    pub calls: u64,
    /// Number of those calls that ended up sleeping, bound by this tag.
    pub throttles: u64,
    /// Cumulative microseconds slept, bound by this tag.
    pub time_us: u64,
}

/// Atomic statistics counters exposed by [`crate::CapacityState`].
///
/// Covers the following statistics keys:
/// `capacity_threshold`, `capacity_bytes_written`, `capacity_bytes_read`,
/// `capacity_signal_calls`, `capacity_signals`, `capacity_signalled`,
/// `capacity_timeout`, `capacity_{ckpt,evict,log,read,total}_{calls,
/// throttles,time}`, `fsync_notyet`.
#[derive(Debug, Default)]
pub struct CapacityStats {
    threshold: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    signal_calls: AtomicU64,
    signals: AtomicU64,
    signalled: AtomicU64,
    timeouts: AtomicU64,
    fsync_notyet: AtomicU64,
    ckpt: SubsystemCounters,
    evict: SubsystemCounters,
    log: SubsystemCounters,
    read: SubsystemCounters,
    total: SubsystemCounters,
}

impl CapacityStats {
    /// Creates a zeroed statistics block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_threshold(&self, value: u64) {
        self.threshold.store(value, Ordering::Relaxed);
    }

    pub(crate) fn record_call(&self, subsystem: Subsystem) {
        self.counters(subsystem).calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the aggregate `capacity_total_calls` row, independent of
    /// which subsystem tag the call came in on.
    pub(crate) fn record_total_call(&self) {
        self.total.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_signal_call(&self) {
        self.signal_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_signal_sent(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_signalled(&self) {
        self.signalled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fsync_notyet(&self) {
        self.fsync_notyet.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a throttle event bound by `subsystem`'s own reservation, plus
    /// `sleep_us` microseconds of sleep.
    pub(crate) fn record_subsystem_throttle(&self, subsystem: Subsystem, sleep_us: u64) {
        let counters = self.counters(subsystem);
        counters.throttles.fetch_add(1, Ordering::Relaxed);
        counters.time_us.fetch_add(sleep_us, Ordering::Relaxed);
    }

    /// Records a throttle event bound by the total reservation, plus
    /// `sleep_us` microseconds of sleep.
    pub(crate) fn record_total_throttle(&self, sleep_us: u64) {
        self.total.throttles.fetch_add(1, Ordering::Relaxed);
        self.total.time_us.fetch_add(sleep_us, Ordering::Relaxed);
    }

    fn counters(&self, subsystem: Subsystem) -> &SubsystemCounters {
        match subsystem {
            Subsystem::Checkpoint => &self.ckpt,
            Subsystem::Eviction => &self.evict,
            Subsystem::Log => &self.log,
            Subsystem::Read => &self.read,
        }
    }

    /// Returns a consistent-enough point-in-time snapshot of every exposed
    /// statistic.
    #[must_use]
    pub fn snapshot(&self) -> CapacityStatsSnapshot {
        CapacityStatsSnapshot {
            threshold: self.threshold.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            signal_calls: self.signal_calls.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            signalled: self.signalled.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            fsync_notyet: self.fsync_notyet.load(Ordering::Relaxed),
            ckpt: self.ckpt.snapshot(),
            evict: self.evict.snapshot(),
            log: self.log.snapshot(),
            read: self.read.snapshot(),
            total: self.total.snapshot(),
        }
    }
}

/// Owned snapshot of [`CapacityStats`], safe to hand to callers outside the
/// hot path (e.g. a stats reporting thread).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CapacityStatsSnapshot {
    /// `capacity_threshold`.
    pub threshold: u64,
    /// `capacity_bytes_written`.
    pub bytes_written: u64,
    /// `capacity_bytes_read`.
    pub bytes_read: u64,
    /// `capacity_signal_calls`.
    pub signal_calls: u64,
    /// `capacity_signals`.
    pub signals: u64,
    /// `capacity_signalled`.
    pub signalled: u64,
    /// `capacity_timeout`.
    pub timeouts: u64,
    /// `fsync_notyet`.
    pub fsync_notyet: u64,
    /// `capacity_ckpt_{calls,throttles,time}`.
    pub ckpt: SubsystemStats,
    /// `capacity_evict_{calls,throttles,time}`.
    pub evict: SubsystemStats,
    /// `capacity_log_{calls,throttles,time}`.
    pub log: SubsystemStats,
    /// `capacity_read_{calls,throttles,time}`.
    pub read: SubsystemStats,
    /// `capacity_total_{calls,throttles,time}`.
    pub total: SubsystemStats,
}
