use std::sync::atomic::{AtomicU64, Ordering};

/// One nanosecond-since-epoch "next available time slot" counter.
///
/// Each per-subsystem and total reservation counter is one of these. The value
/// is monotonically non-decreasing except when advanced forward by
/// [`reserve`]'s clock-drift correction.
#[derive(Debug, Default)]
pub struct ReservationCounter(AtomicU64);

impl ReservationCounter {
    /// Creates a counter starting at time zero (fully idle).
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Reads the current value without synchronizing with other operations.
    ///
    /// Used for the non-atomic "observation" step of borrowing; callers
    /// must validate through a subsequent CAS before acting on
    /// the value.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn fetch_add(&self, delta: u64) -> u64 {
        self.0.fetch_add(delta, Ordering::SeqCst) + delta
    }

    fn fetch_sub(&self, delta: u64) -> u64 {
        self.0.fetch_sub(delta, Ordering::SeqCst) - delta
    }

    fn store(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }

    fn compare_exchange(&self, current: u64, new: u64) -> Result<u64, u64> {
        self.0
            .compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
    }
}

/// One second expressed in nanoseconds.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Converts a byte count to the nanosecond "slot length" it occupies at the
/// given per-second byte capacity.
///
/// `slot_ns = bytes * 1_000_000_000 / capacity`. `capacity` must be
/// nonzero; callers gate on that separately (an unbounded subsystem never
/// calls this).
#[must_use]
pub fn slot_ns(bytes: u64, capacity: u64) -> u64 {
    debug_assert_ne!(capacity, 0, "slot_ns called with zero capacity");
    u64::try_from(u128::from(bytes) * u128::from(NANOS_PER_SEC) / u128::from(capacity))
        .unwrap_or(u64::MAX)
}

/// Reserves `bytes` worth of time against `counter` at `capacity` bytes/sec,
/// returning the deadline at which the caller's slot ends.
///
/// If `capacity` is zero the
/// subsystem is unbounded and the counter is left untouched; the current
/// time is returned instead.
#[must_use]
pub fn reserve(counter: &ReservationCounter, bytes: u64, capacity: u64, now_ns: u64) -> u64 {
    if capacity == 0 {
        return now_ns;
    }

    let len = slot_ns(bytes, capacity);
    let mut res = counter.fetch_add(len);

    if now_ns > res && now_ns - res > NANOS_PER_SEC {
        let rebased = now_ns - NANOS_PER_SEC + len;
        counter.store(rebased);
        res = rebased;
    }

    res
}

/// Rolls back a reservation previously granted by [`reserve`] for `bytes` at
/// `capacity` bytes/sec.
///
/// Used when a borrow attempt loses its compare-and-swap race and the
/// entry point must undo the subsystem and total reservations it
/// tentatively took before retrying.
pub fn rollback(counter: &ReservationCounter, bytes: u64, capacity: u64) {
    if capacity == 0 {
        return;
    }
    counter.fetch_sub(slot_ns(bytes, capacity));
}

/// Attempts to transfer borrowed time from a victim counter to the caller.
///
/// `baseline` is the victim's value as observed before the CAS; `now_ns`
/// and `victim_capacity`/`bytes` determine the new value. On
/// success, returns the amount of credit (in nanoseconds, at the caller's own
/// capacity) the caller should subtract from its own reservation. On
/// failure, returns `None` and the caller must roll back and retry without
/// borrowing.
pub fn try_borrow(
    victim: &ReservationCounter,
    baseline: u64,
    victim_capacity: u64,
    bytes: u64,
    now_ns: u64,
) -> Option<u64> {
    debug_assert_ne!(victim_capacity, 0);

    let floor = if baseline < now_ns.saturating_sub(NANOS_PER_SEC) {
        now_ns.saturating_sub(NANOS_PER_SEC)
    } else {
        baseline
    };

    let new_value = floor + NANOS_PER_SEC / 16 + slot_ns(bytes, victim_capacity);

    victim.compare_exchange(baseline, new_value).ok()?;

    let stolen_bytes = victim_capacity / 16;
    Some(stolen_bytes)
}
