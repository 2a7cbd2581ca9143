//! Text monitor: named panels over the latest snapshot.
//!
//! The monitor is a pure consumer.  It never blocks the feed; each poll is
//! one lock-free [`SnapshotStore::read`].  Absent keys (before the first
//! frame, or keys a frame never carries) render as [`PLACEHOLDER`].
//!
//! # Overview
//!
//! - [`Panel`] – the fixed key lists shown together.
//! - [`lookup`] / [`render_panel`] – placeholder-aware formatting.
//! - [`PoseTrace`] – rolling history of the two controller-reported poses
//!   and the two estimated poses, bounded by count and by age.
//! - [`Monitor`] – background poller feeding the trace at a fixed cadence.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use odolink_kernel::{Snapshot, SnapshotStore};
use odolink_middleware::schema::FieldSchema;
use odolink_perception::EncoderPair;
use odolink_types::{Pose, TelemetryError, TrackedCounter};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Text shown for keys with no value.
pub const PLACEHOLDER: &str = "N/A";

/// Default poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default age limit of trace points.
pub const DEFAULT_TRACE_WINDOW: Duration = Duration::from_secs(60);

/// Keys of the two poses the controller reports on the wire.
pub const REPORTED_POSE_KEYS: [[&str; 3]; 2] = [
    ["odom_x2", "odom_y2", "odom_th2"],
    ["odom_x3", "odom_y3", "odom_th3"],
];

// ────────────────────────────────────────────────────────────────────────────
// Panels
// ────────────────────────────────────────────────────────────────────────────

/// A named group of snapshot keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    /// Every wire field followed by the six diffs.
    General,
    Battery,
    /// Controller-side odometry as reported on the wire.
    Odometry,
    Encoder,
    /// Both locally estimated poses.
    Estimated,
}

const BATTERY_KEYS: [&str; 4] = ["BMS_Pressure", "BMS_SOC", "BMS_Current_mA", "BMS_EXT_SOC"];

const ODOMETRY_KEYS: [&str; 8] = [
    "odom_x2", "odom_y2", "odom_th2", "odom_vx2", "odom_vth2", "odom_x3", "odom_y3", "odom_th3",
];

const ENCODER_KEYS: [&str; 8] = [
    "leftEncoderSensor1NbPulsesNow",
    "rightEncoderSensor1NbPulsesNow",
    "shortLeftEncoderNbPulsesNow",
    "shortRightEncoderNbPulsesNow",
    "leftSpeed_act",
    "rightSpeed_act",
    "rightEncoderSensor1NbPulsesNow_diff",
    "leftEncoderSensor1NbPulsesNow_diff",
];

impl Panel {
    pub const ALL: [Panel; 5] = [
        Panel::General,
        Panel::Battery,
        Panel::Odometry,
        Panel::Encoder,
        Panel::Estimated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Panel::General => "general",
            Panel::Battery => "battery",
            Panel::Odometry => "odometry",
            Panel::Encoder => "encoder",
            Panel::Estimated => "estimated",
        }
    }

    /// Case-insensitive lookup by [`name`][Self::name].
    pub fn from_name(name: &str) -> Option<Panel> {
        Panel::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Keys shown by this panel, in display order.
    pub fn keys(self) -> Vec<&'static str> {
        match self {
            Panel::General => FieldSchema::standard()
                .names()
                .chain(TrackedCounter::ALL.iter().map(|c| c.diff_key()))
                .collect(),
            Panel::Battery => BATTERY_KEYS.to_vec(),
            Panel::Odometry => ODOMETRY_KEYS.to_vec(),
            Panel::Encoder => ENCODER_KEYS.to_vec(),
            Panel::Estimated => [EncoderPair::ShortEncoder, EncoderPair::PositionActual]
                .into_iter()
                .flat_map(EncoderPair::pose_keys)
                .collect(),
        }
    }
}

/// Display text for `key`, or [`PLACEHOLDER`].
pub fn lookup(snapshot: Option<&Snapshot>, key: &str) -> String {
    snapshot
        .and_then(|s| s.get(key))
        .map_or_else(|| PLACEHOLDER.to_string(), ToString::to_string)
}

/// `(key, text)` rows of `panel`.
pub fn render_panel(snapshot: Option<&Snapshot>, panel: Panel) -> Vec<(&'static str, String)> {
    panel
        .keys()
        .into_iter()
        .map(|key| (key, lookup(snapshot, key)))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// PoseTrace
// ────────────────────────────────────────────────────────────────────────────

/// One trace sample: the four poses of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    /// Controller odometry, `odom_x2/y2/th2`.
    pub reported2: Pose,
    /// Controller odometry, `odom_x3/y3/th3`.
    pub reported3: Pose,
    pub short: Pose,
    pub position: Pose,
}

impl TracePoint {
    /// `None` if any of the four poses is missing from `snapshot`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Option<Self> {
        let [keys2, keys3] = REPORTED_POSE_KEYS;
        Some(Self {
            sequence: snapshot.sequence(),
            published_at: snapshot.published_at(),
            reported2: snapshot.pose_at(keys2)?,
            reported3: snapshot.pose_at(keys3)?,
            short: snapshot.pose(EncoderPair::ShortEncoder)?,
            position: snapshot.pose(EncoderPair::PositionActual)?,
        })
    }
}

/// Ring of [`TracePoint`]s.  Holds at most `capacity` points, none older
/// than `window` relative to the newest one; the oldest are evicted first.
#[derive(Debug, Clone)]
pub struct PoseTrace {
    points: VecDeque<TracePoint>,
    capacity: usize,
    window: Duration,
}

impl PoseTrace {
    pub fn new(capacity: usize) -> Result<Self, TelemetryError> {
        if capacity == 0 {
            return Err(TelemetryError::Config("trace capacity must be at least 1".into()));
        }
        Ok(Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            window: DEFAULT_TRACE_WINDOW,
        })
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Append the poses of `snapshot` unless its sequence was already
    /// recorded.  Returns whether a point was added.
    pub fn record(&mut self, snapshot: &Snapshot) -> bool {
        TracePoint::from_snapshot(snapshot).is_some_and(|point| self.push(point))
    }

    /// Append `point` if it is newer than the latest one, then evict by
    /// count and by age.
    pub fn push(&mut self, point: TracePoint) -> bool {
        if self.points.back().is_some_and(|p| p.sequence >= point.sequence) {
            return false;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        let window = self.window;
        while self.points.front().is_some_and(|oldest| {
            (point.published_at - oldest.published_at)
                .to_std()
                .is_ok_and(|age| age > window)
        }) {
            self.points.pop_front();
        }
        self.points.push_back(point);
        true
    }

    pub fn points(&self) -> impl Iterator<Item = &TracePoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&TracePoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Monitor
// ────────────────────────────────────────────────────────────────────────────

/// Background poller that keeps a [`PoseTrace`] up to date.
pub struct Monitor {
    store: Arc<SnapshotStore>,
    trace: Arc<Mutex<PoseTrace>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Start polling `store` every `interval`, recording into `trace`.
    pub fn spawn(
        store: Arc<SnapshotStore>,
        interval: Duration,
        trace: PoseTrace,
    ) -> Result<Self, TelemetryError> {
        let trace = Arc::new(Mutex::new(trace));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_store = Arc::clone(&store);
        let thread_trace = Arc::clone(&trace);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("odolink-monitor".into())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "monitor started");
                while !thread_stop.load(Ordering::Acquire) {
                    if let Some(snapshot) = thread_store.read()
                        && thread_trace.lock().record(&snapshot)
                    {
                        debug!(sequence = snapshot.sequence(), "trace point recorded");
                    }
                    thread::sleep(interval);
                }
                info!("monitor stopped");
            })
            .map_err(|e| TelemetryError::Unexpected(format!("failed to spawn monitor thread: {e}")))?;

        Ok(Self {
            store,
            trace,
            stop,
            handle: Some(handle),
        })
    }

    /// The snapshot as of now (not as of the last poll).
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.store.read()
    }

    pub fn panel(&self, panel: Panel) -> Vec<(&'static str, String)> {
        render_panel(self.current().as_deref(), panel)
    }

    /// Copy of the trace collected so far.
    pub fn trace(&self) -> PoseTrace {
        self.trace.lock().clone()
    }

    pub fn clear_trace(&self) {
        self.trace.lock().clear();
    }

    /// Stop polling and wait for the thread.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
