use crate::error::CapacityConfigError;

/// Minimum nonzero `io_capacity.total` value accepted, in bytes per second.
///
/// Values in `(0, MIN_CAPACITY_BYTES_PER_SEC)` are rejected by
/// [`CapacityConfig::from_total`]; `0` is always accepted and disables
/// throttling entirely.
pub const MIN_CAPACITY_BYTES_PER_SEC: u64 = 1024 * 1024;

const CAP_CKPT_PCT: u64 = 10;
const CAP_EVICT_PCT: u64 = 60;
const CAP_LOG_PCT: u64 = 20;
const CAP_READ_PCT: u64 = 60;
const THRESHOLD_PCT: u64 = 10;

/// Derived, validated capacity configuration for one connection handle.
///
/// Produced exclusively by [`CapacityConfig::from_total`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CapacityConfig {
    total: u64,
    ckpt: u64,
    evict: u64,
    log: u64,
    read: u64,
    threshold: u64,
}

impl CapacityConfig {
    /// Binds a single `io_capacity.total` byte-rate into per-subsystem
    /// budgets and a flush threshold.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityConfigError::BelowMinimum`] if `total` is nonzero
    /// but below [`MIN_CAPACITY_BYTES_PER_SEC`]. `total == 0` always
    /// succeeds and disables throttling (all fields become zero).
    pub fn from_total(total: u64) -> Result<Self, CapacityConfigError> {
        if total != 0 && total < MIN_CAPACITY_BYTES_PER_SEC {
            return Err(CapacityConfigError::BelowMinimum {
                requested: total,
                minimum: MIN_CAPACITY_BYTES_PER_SEC,
            });
        }

        if total == 0 {
            return Ok(Self::default());
        }

        let ckpt = total * CAP_CKPT_PCT / 100;
        let evict = total * CAP_EVICT_PCT / 100;
        let log = total * CAP_LOG_PCT / 100;
        let read = total * CAP_READ_PCT / 100;
        let threshold = (ckpt + evict + log) * THRESHOLD_PCT / 100;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            total,
            ckpt,
            evict,
            log,
            read,
            threshold,
            "bound io_capacity.total into per-subsystem budgets"
        );

        Ok(Self {
            total,
            ckpt,
            evict,
            log,
            read,
            threshold,
        })
    }

    /// Whether throttling is active at all (total capacity nonzero).
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.total != 0
    }

    /// The configured aggregate budget, in bytes per second.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// The checkpoint subsystem budget, in bytes per second.
    #[must_use]
    pub const fn ckpt(&self) -> u64 {
        self.ckpt
    }

    /// The eviction subsystem budget, in bytes per second.
    #[must_use]
    pub const fn evict(&self) -> u64 {
        self.evict
    }

    /// The log subsystem budget, in bytes per second.
    #[must_use]
    pub const fn log(&self) -> u64 {
        self.log
    }

    /// The read subsystem budget, in bytes per second.
    #[must_use]
    pub const fn read(&self) -> u64 {
        self.read
    }

    /// The unsynced-bytes threshold that triggers a background flush.
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }

    /// The configured budget for a given [`crate::Subsystem`] tag.
    #[must_use]
    pub const fn capacity_for(&self, subsystem: crate::Subsystem) -> u64 {
        match subsystem {
            crate::Subsystem::Checkpoint => self.ckpt,
            crate::Subsystem::Eviction => self.evict,
            crate::Subsystem::Log => self.log,
            crate::Subsystem::Read => self.read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subsystem;

    #[test]
    fn zero_total_disables_throttling() {
        let cfg = CapacityConfig::from_total(0).unwrap();
        assert!(!cfg.is_enabled());
        assert_eq!(cfg.ckpt(), 0);
        assert_eq!(cfg.threshold(), 0);
    }

    #[test]
    fn below_minimum_nonzero_is_rejected() {
        let err = CapacityConfig::from_total(MIN_CAPACITY_BYTES_PER_SEC - 1).unwrap_err();
        match err {
            CapacityConfigError::BelowMinimum { requested, minimum } => {
                assert_eq!(requested, MIN_CAPACITY_BYTES_PER_SEC - 1);
                assert_eq!(minimum, MIN_CAPACITY_BYTES_PER_SEC);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn at_minimum_is_accepted() {
        assert!(CapacityConfig::from_total(MIN_CAPACITY_BYTES_PER_SEC).is_ok());
    }

    #[test]
    fn derives_percentages_from_total() {
        let cfg = CapacityConfig::from_total(10_000_000).unwrap();
        assert_eq!(cfg.ckpt(), 1_000_000);
        assert_eq!(cfg.evict(), 6_000_000);
        assert_eq!(cfg.log(), 2_000_000);
        assert_eq!(cfg.read(), 6_000_000);
    }

    #[test]
    fn threshold_is_ten_percent_of_write_aggregate() {
        let cfg = CapacityConfig::from_total(10_000_000).unwrap();
        // ckpt + evict + log = 1_000_000 + 6_000_000 + 2_000_000 = 9_000_000
        assert_eq!(cfg.threshold(), 900_000);
    }

    #[test]
    fn capacity_for_dispatches_by_tag() {
        let cfg = CapacityConfig::from_total(10_000_000).unwrap();
        assert_eq!(cfg.capacity_for(Subsystem::Checkpoint), cfg.ckpt());
        assert_eq!(cfg.capacity_for(Subsystem::Eviction), cfg.evict());
        assert_eq!(cfg.capacity_for(Subsystem::Log), cfg.log());
        assert_eq!(cfg.capacity_for(Subsystem::Read), cfg.read());
    }

    #[test]
    fn subsystem_sum_deliberately_exceeds_total() {
        let cfg = CapacityConfig::from_total(10_000_000).unwrap();
        let sum = cfg.ckpt() + cfg.evict() + cfg.log() + cfg.read();
        assert!(sum > cfg.total());
    }
}
