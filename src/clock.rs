use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of nanoseconds-since-epoch time.
///
/// The throttle core reads the wall clock at several points that must agree
/// with each other within a single `throttle()` call, and its clock-drift and
/// borrow-eligibility logic is only exercisable deterministically by
/// controlling time directly, so the clock is injected rather than read from
/// `SystemTime::now()` ad hoc. This mirrors how a bandwidth pacing limiter
/// isolates its own `Instant::now()` reads behind the `register` method
/// boundary to keep pacing math testable.
pub trait Clock: Send + Sync {
    /// Returns the current time in nanoseconds since the Unix epoch.
    fn now_ns(&self) -> u64;
}

/// Production [`Clock`] backed by [`SystemTime::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0)
    }
}

/// A [`Clock`] whose value is set and advanced explicitly.
///
/// Used in tests to exercise clock-drift rebase and borrow-eligibility paths
/// deterministically, without real sleeps.
#[derive(Debug, Default)]
pub struct FakeClock {
    now_ns: AtomicU64,
}

impl FakeClock {
    /// Creates a clock starting at the given nanosecond timestamp.
    #[must_use]
    pub fn new(start_ns: u64) -> Self {
        Self {
            now_ns: AtomicU64::new(start_ns),
        }
    }

    /// Sets the clock to an absolute nanosecond timestamp.
    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }

    /// Advances the clock by the given number of nanoseconds.
    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}
