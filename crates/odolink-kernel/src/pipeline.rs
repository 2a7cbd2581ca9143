//! [`TelemetryPipeline`] – parse, diff, integrate, publish.
//!
//! The pipeline is the only writer of the tracker baseline, both poses and
//! the [`SnapshotStore`].  It is driven by a single producer, one line at a
//! time.  A line either passes every stage and becomes the visible snapshot,
//! or it fails in the parser and nothing anywhere changes.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use odolink_kernel::{SnapshotStore, TelemetryPipeline};
//! use odolink_middleware::FrameBuilder;
//! use odolink_perception::WheelOdometryConfig;
//!
//! let store = Arc::new(SnapshotStore::new());
//! let mut pipeline = TelemetryPipeline::new(Arc::new(WheelOdometryConfig::default()), store.clone());
//!
//! assert!(!pipeline.ingest("garbage"));
//! assert!(store.read().is_none());
//!
//! assert!(pipeline.ingest(&FrameBuilder::new().build()));
//! assert_eq!(store.read().unwrap().sequence(), 1);
//! ```

use std::sync::Arc;

use odolink_middleware::FrameParser;
use odolink_perception::{EncoderPair, OdometryEstimator, WheelOdometryConfig};
use odolink_types::{CounterSet, Pose, TelemetryError};
use tracing::{debug, warn};

use crate::snapshot::{Snapshot, SnapshotStore};
use crate::state_tracker::StateTracker;

/// Single-producer telemetry processing chain.
pub struct TelemetryPipeline {
    parser: FrameParser,
    tracker: StateTracker,
    short: OdometryEstimator,
    position: OdometryEstimator,
    store: Arc<SnapshotStore>,
    rejected: u64,
}

impl TelemetryPipeline {
    pub fn new(config: Arc<WheelOdometryConfig>, store: Arc<SnapshotStore>) -> Self {
        Self {
            parser: FrameParser::new(),
            tracker: StateTracker::new(),
            short: OdometryEstimator::new(EncoderPair::ShortEncoder, Arc::clone(&config)),
            position: OdometryEstimator::new(EncoderPair::PositionActual, config),
            store,
            rejected: 0,
        }
    }

    /// Run one line through every stage and return the published snapshot.
    ///
    /// On error nothing has been mutated.
    pub fn process_line(&mut self, line: &str) -> Result<Arc<Snapshot>, TelemetryError> {
        let fields = self.parser.parse(line)?;
        let diffs = self.tracker.advance(&fields)?;
        let short = self.short.update_from(&diffs);
        let position = self.position.update_from(&diffs);
        let snapshot = self.store.publish(&fields, &diffs, short, position);
        debug!(
            sequence = snapshot.sequence(),
            odom4_th = short.theta,
            odom5_th = position.theta,
            "frame accepted"
        );
        Ok(snapshot)
    }

    /// [`process_line`][Self::process_line] with drop-and-continue error
    /// handling.  Returns whether the frame was accepted.
    pub fn ingest(&mut self, line: &str) -> bool {
        match self.process_line(line) {
            Ok(_) => true,
            Err(e) => {
                self.rejected += 1;
                warn!(error = %e, rejected = self.rejected, "frame dropped");
                false
            }
        }
    }

    pub fn previous_counters(&self) -> CounterSet {
        self.tracker.previous()
    }

    pub fn pose(&self, pair: EncoderPair) -> Pose {
        match pair {
            EncoderPair::ShortEncoder => self.short.pose(),
            EncoderPair::PositionActual => self.position.pose(),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Frames dropped by [`ingest`][Self::ingest] so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Put both estimators back at the origin.  The counter baseline is
    /// kept so the next frame still yields a true delta.
    pub fn reset_poses(&mut self) {
        self.short.reset();
        self.position.reset();
        debug!("poses reset to origin");
    }
}
