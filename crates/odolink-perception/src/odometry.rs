//! Differential-drive dead reckoning from encoder pulse deltas.
//!
//! Each [`OdometryEstimator`] integrates the per-frame pulse differences of
//! one pair of wheel counters into a running [`Pose`].  Two estimators run
//! side by side on every frame:
//!
//! - [`EncoderPair::ShortEncoder`] – fed by the `shortLeft`/`shortRight`
//!   encoder counters.
//! - [`EncoderPair::PositionActual`] – fed by the `PositionActual1`/
//!   `PositionActual2` motor-position counters.
//!
//! The update rule is the first-order model:
//!
//! ```text
//! ΔL = diff_left / counts_per_meter      ΔR = diff_right / counts_per_meter
//! Δs = (ΔL + ΔR) / 2                     Δθ = (ΔR − ΔL) / wheel_base
//! θ' = normalize(θ + Δθ)
//! x' = x + Δs·cos θ'                     y' = y + Δs·sin θ'
//! ```
//!
//! Displacement is projected along the *updated* heading, not a midpoint
//! heading.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use odolink_perception::odometry::{EncoderPair, OdometryEstimator, WheelOdometryConfig};
//!
//! let config = Arc::new(WheelOdometryConfig::new(0.1, 0.5, 360.0).unwrap());
//! let mut odom = OdometryEstimator::new(EncoderPair::ShortEncoder, config.clone());
//!
//! // Both wheels advance by one metre's worth of pulses.
//! let counts = config.counts_per_meter();
//! let pose = odom.update(counts as i64, counts as i64);
//! assert!((pose.x - 1.0).abs() < 1e-2);
//! assert_eq!(pose.theta, 0.0);
//! ```

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use odolink_types::{DiffSet, Pose, TelemetryError, TrackedCounter};
use tracing::debug;

/// Above this magnitude the angle is reduced with an exact remainder before
/// the wrap loops run.  Below it the loops alone decide the result (at most
/// ~16M turns); beyond it a turn no longer fits the f64 precision budget and
/// the loops could fail to terminate.
const LARGE_ANGLE: f64 = 1.0e8;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Wheel geometry shared by both estimators.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelOdometryConfig {
    wheel_radius: f64,
    wheel_base: f64,
    counts_per_revolution: f64,
    counts_per_meter: f64,
}

impl WheelOdometryConfig {
    /// Validate the constants and derive `counts_per_meter`.
    ///
    /// All three values must be finite and strictly positive.
    pub fn new(
        wheel_radius: f64,
        wheel_base: f64,
        counts_per_revolution: f64,
    ) -> Result<Self, TelemetryError> {
        for (name, value) in [
            ("wheel_radius", wheel_radius),
            ("wheel_base", wheel_base),
            ("counts_per_revolution", counts_per_revolution),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TelemetryError::Config(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }

        let counts_per_meter = counts_per_revolution / (2.0 * PI * wheel_radius);
        debug!(wheel_radius, wheel_base, counts_per_revolution, counts_per_meter, "wheel odometry configured");

        Ok(Self {
            wheel_radius,
            wheel_base,
            counts_per_revolution,
            counts_per_meter,
        })
    }

    /// Wheel radius in metres.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Distance between the two wheels in metres.
    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    /// Encoder pulses per full wheel revolution.
    pub fn counts_per_revolution(&self) -> f64 {
        self.counts_per_revolution
    }

    /// Encoder pulses per metre of travel.
    pub fn counts_per_meter(&self) -> f64 {
        self.counts_per_meter
    }
}

impl Default for WheelOdometryConfig {
    fn default() -> Self {
        let counts_per_revolution = 360.0;
        let wheel_radius = 0.1;
        Self {
            wheel_radius,
            wheel_base: 0.5,
            counts_per_revolution,
            counts_per_meter: counts_per_revolution / (2.0 * PI * wheel_radius),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Encoder pair selection
// ────────────────────────────────────────────────────────────────────────────

/// Which pair of tracked counters drives an estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderPair {
    /// `shortLeftEncoderNbPulsesNow` / `shortRightEncoderNbPulsesNow`.
    ShortEncoder,
    /// `PositionActual1` (left) / `PositionActual2` (right).
    PositionActual,
}

impl EncoderPair {
    /// The `(left, right)` counters feeding this pair.
    pub fn counters(self) -> (TrackedCounter, TrackedCounter) {
        match self {
            EncoderPair::ShortEncoder => {
                (TrackedCounter::ShortLeftEncoder, TrackedCounter::ShortRightEncoder)
            }
            EncoderPair::PositionActual => {
                (TrackedCounter::PositionActual1, TrackedCounter::PositionActual2)
            }
        }
    }

    /// Prefix of the snapshot keys carrying this estimator's pose
    /// (`<prefix>_x`, `<prefix>_y`, `<prefix>_th`).
    pub fn key_prefix(self) -> &'static str {
        match self {
            EncoderPair::ShortEncoder => "odom4",
            EncoderPair::PositionActual => "odom5",
        }
    }

    /// Full `[x, y, theta]` snapshot keys.
    pub fn pose_keys(self) -> [&'static str; 3] {
        match self {
            EncoderPair::ShortEncoder => ["odom4_x", "odom4_y", "odom4_th"],
            EncoderPair::PositionActual => ["odom5_x", "odom5_y", "odom5_th"],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OdometryEstimator
// ────────────────────────────────────────────────────────────────────────────

/// Dead-reckoning integrator for one encoder pair.
#[derive(Debug, Clone)]
pub struct OdometryEstimator {
    pair: EncoderPair,
    config: Arc<WheelOdometryConfig>,
    pose: Pose,
}

impl OdometryEstimator {
    /// Create an estimator positioned at the origin.
    pub fn new(pair: EncoderPair, config: Arc<WheelOdometryConfig>) -> Self {
        Self {
            pair,
            config,
            pose: Pose::origin(),
        }
    }

    pub fn pair(&self) -> EncoderPair {
        self.pair
    }

    /// Current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Integrate one frame's pulse deltas and return the new pose.
    pub fn update(&mut self, diff_left: i64, diff_right: i64) -> Pose {
        let counts_per_meter = self.config.counts_per_meter;
        let delta_left = diff_left as f64 / counts_per_meter;
        let delta_right = diff_right as f64 / counts_per_meter;

        let delta_s = (delta_left + delta_right) / 2.0;
        let delta_theta = (delta_right - delta_left) / self.config.wheel_base;

        let theta = normalize_angle(self.pose.theta + delta_theta);
        self.pose = Pose {
            x: self.pose.x + delta_s * theta.cos(),
            y: self.pose.y + delta_s * theta.sin(),
            theta,
        };
        self.pose
    }

    /// Pick this estimator's pair out of `diffs` and integrate it.
    pub fn update_from(&mut self, diffs: &DiffSet) -> Pose {
        let (left, right) = self.pair.counters();
        self.update(diffs.get(left), diffs.get(right))
    }

    /// Return the estimate to the origin.
    pub fn reset(&mut self) {
        self.pose = Pose::origin();
    }
}

/// Wrap `angle` into `(-π, π]`.
///
/// Subtracts 2π while the angle exceeds π and adds 2π while it is below −π,
/// so `π` itself is kept.  An exact `-π` result is reported as `π`.
/// Non-finite input is returned unchanged.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }

    let mut angle = if angle.abs() > LARGE_ANGLE { angle % TAU } else { angle };
    while angle > PI {
        angle -= TAU;
    }
    while angle < -PI {
        angle += TAU;
    }
    if angle == -PI { PI } else { angle }
}
