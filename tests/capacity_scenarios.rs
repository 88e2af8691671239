//! End-to-end scenario tests for the I/O capacity throttle core.
//!
//! These mirror the six end-to-end scenarios the throttle core is designed
//! against: steady-state pacing, borrowing from an idle peer, the total cap
//! binding ahead of any single subsystem, the flush coordinator firing once
//! unsynced bytes cross the threshold, clock-drift rebase, and reconfigure
//! under load.
//!
//! All tests use `FakeClock` and a recording `DurabilitySync` stub, plus the
//! `test-support` feature so the terminal sleep records a duration instead of
//! blocking the test thread.

use capacity::clock::FakeClock;
use capacity::durability::FnDurabilitySync;
use capacity::reservation::NANOS_PER_SEC;
use capacity::{CapacityState, Subsystem};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const START_NS: u64 = 1_700_000_000 * NANOS_PER_SEC;

fn counting_durability() -> (Arc<FnDurabilitySync<impl Fn() -> Result<(), capacity::FsyncError>>>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    let durability = Arc::new(FnDurabilitySync::new(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    (durability, calls)
}

mod steady_state_log_writes {
    use super::*;

    #[test]
    fn ten_sequential_256kb_log_writes_pace_to_roughly_one_second() {
        let clock = Arc::new(FakeClock::new(START_NS));
        let durability = Arc::new(FnDurabilitySync::new(|| Ok(())));
        let state = CapacityState::new(Arc::clone(&clock) as _, durability);
        state.configure(10_000_000).unwrap();

        // `test-support` sleeps are recorded, not real, so the clock never
        // advances on its own: advance it by whatever the previous call just
        // recorded before issuing the next one, so each call observes the
        // wall-clock progression a real sleep would have produced.
        let mut recorded = 0;
        for i in 0..10 {
            state.throttle(Subsystem::Log, 256_000);

            let sleeps = state.recorded_sleeps();
            if sleeps.len() > recorded {
                clock.advance(sleeps[recorded].as_nanos() as u64);
                recorded = sleeps.len();
            }

            if i == 0 {
                assert!(sleeps.is_empty(), "first call should never sleep");
            }
        }

        let sleeps = state.recorded_sleeps();
        // At capacity_log = 2 MB/s a 256KB slot is ~128ms; the run starts out
        // ahead (the reservation counter begins at 0, behind `now`) and only
        // settles into sleeping once that slack is used up.
        assert!(!sleeps.is_empty(), "steady state should eventually require sleeping");
        assert!(
            *sleeps.last().unwrap() >= Duration::from_millis(100),
            "settled steady-state sleep should be close to the 128ms slot length, got {:?}",
            sleeps.last()
        );

        assert_eq!(state.stats().bytes_written, 2_560_000);
    }
}

mod borrow_from_idle_peer {
    use super::*;

    #[test]
    fn burst_of_log_writes_borrows_from_long_idle_peers() {
        let clock = Arc::new(FakeClock::new(START_NS));
        let durability = Arc::new(FnDurabilitySync::new(|| Ok(())));
        let state = CapacityState::new(Arc::clone(&clock) as _, durability);
        state.configure(10_000_000).unwrap();

        // Let Checkpoint, Evict, and Read sit idle for 2 seconds before any
        // Log activity begins.
        clock.advance(2 * NANOS_PER_SEC);

        for _ in 0..20 {
            state.throttle(Subsystem::Log, 256_000);
        }

        let snapshot = state.stats();
        assert!(
            snapshot.log.throttles < 20,
            "expected some of the 20 calls to avoid sleeping via borrowing, got {} throttles",
            snapshot.log.throttles
        );
    }
}

mod total_cap_binds {
    use super::*;

    #[test]
    fn driving_two_subsystems_hard_trips_the_total_cap() {
        let clock = Arc::new(FakeClock::new(START_NS));
        let durability = Arc::new(FnDurabilitySync::new(|| Ok(())));
        let state = CapacityState::new(Arc::clone(&clock) as _, durability);
        state.configure(10_000_000).unwrap();

        // capacity_log = 2 MB/s, capacity_evict = 6 MB/s; driving both at
        // their individual caps simultaneously exceeds the 10 MB/s total.
        for _ in 0..40 {
            state.throttle(Subsystem::Log, 256_000);
            state.throttle(Subsystem::Eviction, 256_000);
        }

        assert!(state.stats().total.throttles > 0);
    }
}

mod flush_coordinator_triggers {
    use super::*;

    #[test]
    fn crossing_threshold_invokes_fsync_exactly_once() {
        let clock = Arc::new(FakeClock::new(START_NS));
        let (durability, calls) = counting_durability();
        let state = CapacityState::new(Arc::clone(&clock) as _, durability);
        // threshold = (ckpt 1,000,000 + evict 6,000,000 + log 2,000,000) * 10 / 100
        // = 900,000 at total=10MB/s.
        state.configure(10_000_000).unwrap();

        state.throttle(Subsystem::Log, 1_000_000);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while calls.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let before = calls.load(Ordering::SeqCst);
        state.throttle(Subsystem::Log, 100_000);
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(calls.load(Ordering::SeqCst), before, "100KB write should stay under threshold");
    }
}

mod clock_drift_rebase {
    use super::*;

    #[test]
    fn a_ten_second_stale_counter_rebases_instead_of_sleeping() {
        let clock = Arc::new(FakeClock::new(START_NS));
        let durability = Arc::new(FnDurabilitySync::new(|| Ok(())));
        let state = CapacityState::new(Arc::clone(&clock) as _, durability);
        state.configure(10_000_000).unwrap();

        // Advance the clock by 10s with no calls: the Log reservation
        // counter sits at its initial value (0-relative), which is now far
        // more than 1s behind `now`.
        clock.advance(10 * NANOS_PER_SEC);

        state.throttle(Subsystem::Log, 100_000);
        assert!(state.recorded_sleeps().is_empty());
    }
}

mod reconfigure_under_load {
    use super::*;

    #[test]
    fn reconfiguring_while_active_does_not_deadlock_and_applies_new_caps() {
        let clock = Arc::new(FakeClock::new(START_NS));
        let durability = Arc::new(FnDurabilitySync::new(|| Ok(())));
        let state = Arc::new(CapacityState::new(Arc::clone(&clock) as _, durability));
        state.configure(10_000_000).unwrap();

        for _ in 0..5 {
            state.throttle(Subsystem::Log, 100_000);
        }

        state.configure(20_000_000).unwrap();

        assert_eq!(state.config().total(), 20_000_000);
        assert_eq!(state.config().log(), 4_000_000);

        // The state must remain usable after reconfigure.
        state.throttle(Subsystem::Log, 50_000);
    }
}
