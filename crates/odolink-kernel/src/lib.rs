//! `odolink-kernel` – Telemetry State & Publication
//!
//! Turns decoded frames into published state.  It owns the only mutable
//! state of the system and exposes it to readers through one atomic slot.
//!
//! # Modules
//!
//! - [`state_tracker`] – [`StateTracker`][state_tracker::StateTracker]:
//!   remembers the previous value of each tracked pulse counter and yields
//!   per-frame diffs.
//! - [`snapshot`] – [`SnapshotStore`][snapshot::SnapshotStore]: immutable
//!   merged [`Snapshot`][snapshot::Snapshot]s behind a lock-free atomic
//!   swap.
//! - [`pipeline`] – [`TelemetryPipeline`][pipeline::TelemetryPipeline]:
//!   parse → diff → both odometry estimators → publish, all-or-nothing per
//!   line.

pub mod pipeline;
pub mod snapshot;
pub mod state_tracker;

pub use pipeline::TelemetryPipeline;
pub use snapshot::{Snapshot, SnapshotStore};
pub use state_tracker::StateTracker;
