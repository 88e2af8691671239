/// One of the four internal writer/reader classes the throttle core meters.
///
/// Dispatch on a tag selects exactly one `capacity_*` budget and one
/// `reservation_*` counter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Subsystem {
    /// Checkpoint writes.
    Checkpoint,
    /// Eviction writes.
    Eviction,
    /// Write-ahead log writes.
    Log,
    /// Reads performed anywhere in the engine.
    Read,
}

impl Subsystem {
    /// All four subsystems in the fixed evaluation order used for victim
    /// selection during borrowing (Checkpoint, Eviction, Log, Read).
    pub const ALL: [Subsystem; 4] = [
        Subsystem::Checkpoint,
        Subsystem::Eviction,
        Subsystem::Log,
        Subsystem::Read,
    ];

    /// Whether bytes metered under this tag count toward `capacity_written`.
    ///
    /// Only `Read` is excluded: reads don't dirty the engine, so they can't
    /// contribute to the unsynced-bytes threshold that drives the flush
    /// coordinator.
    #[must_use]
    pub const fn counts_as_write(self) -> bool {
        !matches!(self, Subsystem::Read)
    }

    /// A short label used in log events and statistics keys.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Subsystem::Checkpoint => "ckpt",
            Subsystem::Eviction => "evict",
            Subsystem::Log => "log",
            Subsystem::Read => "read",
        }
    }

    /// The other three subsystems, in fixed evaluation order, eligible as
    /// borrow victims for this tag.
    #[must_use]
    pub fn peers(self) -> impl Iterator<Item = Subsystem> {
        Subsystem::ALL.into_iter().filter(move |&s| s != self)
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
