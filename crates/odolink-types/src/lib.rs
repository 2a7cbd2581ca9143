use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single decoded telemetry value.
///
/// The variant is chosen by the field's coercion rule when the schema is
/// built, never re-inferred from the raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Integer(i64),
    Decimal(f64),
    /// Kept verbatim (e.g. `PROTOCOL_VERSION`).
    Text(String),
}

impl TelemetryValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            TelemetryValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            TelemetryValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TelemetryValue::Integer(v) => Some(*v as f64),
            TelemetryValue::Decimal(v) => Some(*v),
            TelemetryValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TelemetryValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Integer(v) => write!(f, "{v}"),
            // Debug keeps the trailing `.0` on integral decimals.
            TelemetryValue::Decimal(v) => write!(f, "{v:?}"),
            TelemetryValue::Text(s) => f.write_str(s),
        }
    }
}

/// The typed fields of one successfully decoded frame, in schema order.
///
/// Produced fresh per frame and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryFields {
    entries: Vec<(&'static str, TelemetryValue)>,
}

impl TelemetryFields {
    /// Wrap already-coerced `(name, value)` pairs.
    pub fn new(entries: Vec<(&'static str, TelemetryValue)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&TelemetryValue> {
        self.entries
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Integer value of `name`, or `None` if absent or not an integer.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(TelemetryValue::as_integer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TelemetryValue)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The six pulse counters whose frame-to-frame deltas are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackedCounter {
    RightEncoderSensor1,
    LeftEncoderSensor1,
    PositionActual1,
    PositionActual2,
    ShortLeftEncoder,
    ShortRightEncoder,
}

impl TrackedCounter {
    /// All counters, in the order diffs are published.
    pub const ALL: [TrackedCounter; 6] = [
        TrackedCounter::RightEncoderSensor1,
        TrackedCounter::LeftEncoderSensor1,
        TrackedCounter::PositionActual1,
        TrackedCounter::PositionActual2,
        TrackedCounter::ShortLeftEncoder,
        TrackedCounter::ShortRightEncoder,
    ];

    /// Name of the wire field carrying this counter.
    pub fn field_name(self) -> &'static str {
        match self {
            TrackedCounter::RightEncoderSensor1 => "rightEncoderSensor1NbPulsesNow",
            TrackedCounter::LeftEncoderSensor1 => "leftEncoderSensor1NbPulsesNow",
            TrackedCounter::PositionActual1 => "PositionActual1",
            TrackedCounter::PositionActual2 => "PositionActual2",
            TrackedCounter::ShortLeftEncoder => "shortLeftEncoderNbPulsesNow",
            TrackedCounter::ShortRightEncoder => "shortRightEncoderNbPulsesNow",
        }
    }

    /// Snapshot key under which this counter's diff is published.
    pub fn diff_key(self) -> &'static str {
        match self {
            TrackedCounter::RightEncoderSensor1 => "rightEncoderSensor1NbPulsesNow_diff",
            TrackedCounter::LeftEncoderSensor1 => "leftEncoderSensor1NbPulsesNow_diff",
            TrackedCounter::PositionActual1 => "PositionActual1_diff",
            TrackedCounter::PositionActual2 => "PositionActual2_diff",
            TrackedCounter::ShortLeftEncoder => "shortLeftEncoderNbPulsesNow_diff",
            TrackedCounter::ShortRightEncoder => "shortRightEncoderNbPulsesNow_diff",
        }
    }

    fn index(self) -> usize {
        match self {
            TrackedCounter::RightEncoderSensor1 => 0,
            TrackedCounter::LeftEncoderSensor1 => 1,
            TrackedCounter::PositionActual1 => 2,
            TrackedCounter::PositionActual2 => 3,
            TrackedCounter::ShortLeftEncoder => 4,
            TrackedCounter::ShortRightEncoder => 5,
        }
    }
}

/// One integer slot per [`TrackedCounter`].
///
/// Used both for the diffs of a frame and for the previous-cycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterSet {
    values: [i64; 6],
}

/// Per-frame counter deltas.
pub type DiffSet = CounterSet;

impl CounterSet {
    pub fn get(&self, counter: TrackedCounter) -> i64 {
        self.values[counter.index()]
    }

    pub fn set(&mut self, counter: TrackedCounter, value: i64) {
        self.values[counter.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackedCounter, i64)> + '_ {
        TrackedCounter::ALL.iter().map(|c| (*c, self.get(*c)))
    }
}

/// 2D position plus heading.
///
/// `theta` is kept in `(-π, π]` by the estimators that own a pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Metres along the world X axis.
    pub x: f64,
    /// Metres along the world Y axis.
    pub y: f64,
    /// Heading in radians, counter-clockwise from +X.
    pub theta: f64,
}

impl Pose {
    pub fn origin() -> Self {
        Self::default()
    }
}

/// Error type shared by the decoder, the pipeline and its collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("Framing error: line is not delimited by BEGIN;...;END: {line:?}")]
    Framing { line: String },

    #[error("Field count mismatch: expected {expected}, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("Type coercion failed for {field}: {raw_value:?}")]
    TypeCoercion { field: String, raw_value: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Link error: {0}")]
    Link(String),

    /// No complete line arrived within the link's read timeout.
    #[error("Link read timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),
}
