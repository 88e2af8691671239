use crate::error::FsyncError;

/// The external "flush-all-dirty" collaborator the flush coordinator calls
/// once accumulated unsynced bytes cross the configured threshold.
///
/// The real implementation lives in the storage engine proper and is well
/// outside this core's scope; this trait is the seam described in
/// a background "flush-all-dirty" routine owned by the surrounding storage
/// engine.
pub trait DurabilitySync: Send + Sync {
    /// Initiates an asynchronous durability sync across all dirty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync cannot be initiated. The flush
    /// coordinator treats this as fatal.
    fn fsync_all_background(&self) -> Result<(), FsyncError>;
}

/// Adapts any `Fn() -> Result<(), FsyncError>` closure into a
/// [`DurabilitySync`].
pub struct FnDurabilitySync<F>(F)
where
    F: Fn() -> Result<(), FsyncError> + Send + Sync;

impl<F> FnDurabilitySync<F>
where
    F: Fn() -> Result<(), FsyncError> + Send + Sync,
{
    /// Wraps a closure as a [`DurabilitySync`].
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DurabilitySync for FnDurabilitySync<F>
where
    F: Fn() -> Result<(), FsyncError> + Send + Sync,
{
    fn fsync_all_background(&self) -> Result<(), FsyncError> {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fn_durability_sync_forwards_ok() {
        let sync = FnDurabilitySync::new(|| Ok(()));
        assert!(sync.fsync_all_background().is_ok());
    }

    #[test]
    fn fn_durability_sync_counts_calls() {
        let calls = AtomicUsize::new(0);
        let sync = FnDurabilitySync::new(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        sync.fsync_all_background().unwrap();
        sync.fsync_all_background().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn fn_durability_sync_forwards_err() {
        let sync = FnDurabilitySync::new(|| Err(FsyncError::new(Boom)));
        assert!(sync.fsync_all_background().is_err());
    }
}
