#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `capacity` implements the I/O capacity throttle used by a storage engine
//! connection handle to cap the aggregate byte-rate of four internal
//! writer/reader classes — checkpoint, eviction, log, and read — against a
//! configured total budget, while allowing brief, controlled borrowing of
//! unused budget between classes. It also exposes a background flush
//! coordinator that issues an asynchronous durability sync once accumulated
//! unsynced bytes cross a threshold.
//!
//! # Design
//!
//! - [`reservation`] holds the pure token-bucket-in-the-time-domain
//!   arithmetic: converting a byte count to a nanosecond slot length at a
//!   given capacity, and advancing a shared atomic "next available time"
//!   counter with clock-drift correction.
//! - [`CapacityState`] is the per-handle entry point. [`CapacityState::throttle`]
//!   performs gating, write accounting, dual (subsystem + total) reservation,
//!   bounded one-shot borrowing from an idle peer, and the terminal sleep.
//! - [`CapacityConfig`] binds a single `io_capacity.total` byte-rate into
//!   per-subsystem budgets and a flush threshold.
//! - [`flush::FlushCoordinator`] runs the background worker that wakes on
//!   signal or a 100ms timeout and calls the injected [`DurabilitySync`]
//!   collaborator once the unsynced-bytes threshold is crossed.
//!
//! # Invariants
//!
//! - No subsystem or the aggregate ever exceeds its configured byte-rate by
//!   more than a single call's burst, averaged over time; short bursts are
//!   permitted, strict per-second caps are not guaranteed.
//! - The terminal sleep is skipped for deadlines under 100 microseconds away;
//!   the booked time is absorbed by later callers instead.
//! - When the `test-support` feature is enabled, [`CapacityState`] records
//!   requested sleep durations instead of reaching `std::thread::sleep`,
//!   keeping tests deterministic and fast.
//!
//! # Examples
//!
//! ```
//! use capacity::{CapacityState, Subsystem};
//! use capacity::clock::SystemClock;
//! use capacity::durability::FnDurabilitySync;
//! use std::sync::Arc;
//!
//! let state = CapacityState::new(
//!     Arc::new(SystemClock),
//!     Arc::new(FnDurabilitySync::new(|| Ok(()))),
//! );
//! state.configure(10 * 1024 * 1024).expect("valid capacity");
//! state.throttle(Subsystem::Log, 64 * 1024);
//! ```

pub mod clock;
pub mod config;
pub mod durability;
pub mod error;
pub mod flush;
pub mod reservation;
pub mod state;
pub mod stats;
mod subsystem;

pub use crate::clock::Clock;
pub use crate::config::CapacityConfig;
pub use crate::durability::DurabilitySync;
pub use crate::error::{CapacityConfigError, FsyncError};
pub use crate::flush::FlushCoordinator;
pub use crate::state::CapacityState;
pub use crate::stats::{CapacityStats, CapacityStatsSnapshot};
pub use crate::subsystem::Subsystem;
