//! [`SnapshotStore`] – the single latest-state slot read by consumers.
//!
//! Every accepted frame produces one immutable [`Snapshot`]: the decoded
//! fields, the six counter diffs and both pose estimates merged into one
//! keyed map.  The producer swaps it in atomically; any number of readers
//! load the current `Arc` without blocking the producer or each other.
//!
//! The store starts empty and, once published, never goes back to empty.
//!
//! # Example
//!
//! ```rust
//! use odolink_kernel::snapshot::SnapshotStore;
//! use odolink_types::{DiffSet, Pose, TelemetryFields};
//!
//! let store = SnapshotStore::new();
//! assert!(store.read().is_none());
//!
//! store.publish(&TelemetryFields::default(), &DiffSet::default(), Pose::origin(), Pose::origin());
//! let snapshot = store.read().unwrap();
//! assert_eq!(snapshot.sequence(), 1);
//! assert!(snapshot.get("odom4_x").is_some());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use odolink_perception::EncoderPair;
use odolink_types::{DiffSet, Pose, TelemetryError, TelemetryFields, TelemetryValue};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Immutable merged view of one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 1 for the first publish, incremented on each one after.  0 only for
    /// [`Snapshot::empty`].
    sequence: u64,
    published_at: DateTime<Utc>,
    values: BTreeMap<String, TelemetryValue>,
}

impl Snapshot {
    /// Snapshot with no values, used before the first publish.
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            published_at: DateTime::<Utc>::default(),
            values: BTreeMap::new(),
        }
    }

    fn merge(
        sequence: u64,
        fields: &TelemetryFields,
        diffs: &DiffSet,
        short: Pose,
        position: Pose,
    ) -> Self {
        let mut values: BTreeMap<String, TelemetryValue> = fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        for (counter, diff) in diffs.iter() {
            values.insert(counter.diff_key().to_string(), TelemetryValue::Integer(diff));
        }

        for (pair, pose) in [(EncoderPair::ShortEncoder, short), (EncoderPair::PositionActual, position)] {
            let [x, y, th] = pair.pose_keys();
            values.insert(x.to_string(), TelemetryValue::Decimal(pose.x));
            values.insert(y.to_string(), TelemetryValue::Decimal(pose.y));
            values.insert(th.to_string(), TelemetryValue::Decimal(pose.theta));
        }

        Self {
            sequence,
            published_at: Utc::now(),
            values,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn get(&self, key: &str) -> Option<&TelemetryValue> {
        self.values.get(key)
    }

    /// Pose published for `pair`, if present.
    pub fn pose(&self, pair: EncoderPair) -> Option<Pose> {
        self.pose_at(pair.pose_keys())
    }

    /// Pose read from the numeric `[x, y, theta]` keys, if all are present.
    pub fn pose_at(&self, [x, y, th]: [&str; 3]) -> Option<Pose> {
        Some(Pose {
            x: self.get(x)?.as_f64()?,
            y: self.get(y)?.as_f64()?,
            theta: self.get(th)?.as_f64()?,
        })
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TelemetryValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Result<String, TelemetryError> {
        serde_json::to_string_pretty(self).map_err(|e| TelemetryError::Unexpected(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SnapshotStore
// ────────────────────────────────────────────────────────────────────────────

/// Latest-snapshot slot with lock-free reads.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
    published: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one frame's results and make them the visible snapshot.
    ///
    /// The snapshot is fully built before the swap, so readers observe
    /// either the previous snapshot or this one, never a mix.
    pub fn publish(
        &self,
        fields: &TelemetryFields,
        diffs: &DiffSet,
        short: Pose,
        position: Pose,
    ) -> Arc<Snapshot> {
        let sequence = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = Arc::new(Snapshot::merge(sequence, fields, diffs, short, position));
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// The visible snapshot, or `None` before the first publish.
    pub fn read(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Like [`read`][Self::read] but yields an empty snapshot instead of
    /// `None`.
    pub fn read_or_empty(&self) -> Arc<Snapshot> {
        self.read().unwrap_or_else(|| Arc::new(Snapshot::empty()))
    }

    /// Number of snapshots published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
