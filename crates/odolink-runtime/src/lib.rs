//! `odolink-runtime` – Threads Around the Pipeline
//!
//! The long-running pieces that surround the telemetry core: the producer
//! thread that feeds it, the monitor that reads from it, the interval
//! command sender and process-wide logging.
//!
//! # Modules
//!
//! - [`feed`] – [`FeedWorker`][feed::FeedWorker]: the single producer
//!   thread driving [`TelemetryPipeline`][odolink_kernel::TelemetryPipeline]
//!   from a [`LineSource`][odolink_middleware::LineSource], with live
//!   accepted/rejected counters.
//! - [`monitor`] – named text panels, the `N/A` placeholder lookup, the
//!   bounded [`PoseTrace`][monitor::PoseTrace] and the background
//!   [`Monitor`][monitor::Monitor] poller.
//! - [`pulse`] – [`PulseSender`][pulse::PulseSender]: repeats a command at
//!   a fixed period until stopped.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod feed;
pub mod monitor;
pub mod pulse;
pub mod telemetry;

pub use feed::{FeedExit, FeedStats, FeedWorker};
pub use monitor::{Monitor, Panel, PoseTrace, lookup, render_panel};
pub use pulse::PulseSender;
