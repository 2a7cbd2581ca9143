//! `odolink-perception` – pose estimation from wheel telemetry.
//!
//! # Modules
//!
//! - [`odometry`] – [`OdometryEstimator`][odometry::OdometryEstimator]:
//!   differential-drive dead reckoning that integrates per-frame encoder
//!   pulse deltas into a [`Pose`][odolink_types::Pose], parameterised by
//!   the [`EncoderPair`][odometry::EncoderPair] feeding it and a shared
//!   [`WheelOdometryConfig`][odometry::WheelOdometryConfig].

pub mod odometry;

pub use odometry::{EncoderPair, OdometryEstimator, WheelOdometryConfig, normalize_angle};
