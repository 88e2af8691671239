use std::io;

use thiserror::Error;

/// Errors raised while binding an `io_capacity.total` configuration value.
///
/// Mirrors the convention used throughout this workspace of a small,
/// `thiserror`-derived enum per fallible configuration surface rather than a
/// single catch-all error type.
#[derive(Debug, Error)]
pub enum CapacityConfigError {
    /// `io_capacity.total` was nonzero but below [`MIN_CAPACITY_BYTES_PER_SEC`].
    ///
    /// [`MIN_CAPACITY_BYTES_PER_SEC`]: crate::config::MIN_CAPACITY_BYTES_PER_SEC
    #[error(
        "io_capacity.total value {requested} below minimum {minimum} bytes/sec"
    )]
    BelowMinimum {
        /// The value the caller supplied.
        requested: u64,
        /// The minimum nonzero value accepted.
        minimum: u64,
    },

    /// The flush coordinator's worker thread could not be spawned.
    #[error("failed to spawn capacity flush coordinator thread: {0}")]
    WorkerSpawn(#[source] io::Error),
}

/// Error returned by a [`crate::durability::DurabilitySync`] implementation.
///
/// A failure here is treated as fatal by the flush coordinator: a durability
/// sync that cannot complete indicates a data-integrity risk the throttle
/// layer cannot mask, so the worker thread panics rather than swallowing it.
#[derive(Debug, Error)]
#[error("background fsync failed: {0}")]
pub struct FsyncError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl FsyncError {
    /// Wraps an arbitrary error as a fatal fsync failure.
    pub fn new<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(source))
    }
}
