//! End-to-end pipeline behaviour: all-or-nothing decoding, diff tracking and
//! the odometry both estimators publish.

use std::sync::Arc;

use odolink_kernel::{SnapshotStore, TelemetryPipeline};
use odolink_middleware::FrameBuilder;
use odolink_middleware::schema::FieldSchema;
use odolink_perception::{EncoderPair, WheelOdometryConfig};
use odolink_types::{TelemetryError, TelemetryValue, TrackedCounter};
use proptest::prelude::*;

fn pipeline() -> (TelemetryPipeline, Arc<SnapshotStore>) {
    let store = Arc::new(SnapshotStore::new());
    let config = Arc::new(WheelOdometryConfig::new(0.1, 0.5, 360.0).unwrap());
    (TelemetryPipeline::new(config, Arc::clone(&store)), store)
}

fn frame_with(values: &[(&str, i64)]) -> String {
    let mut builder = FrameBuilder::new();
    for (name, value) in values {
        builder.set(name, value).unwrap();
    }
    builder.build()
}

#[test]
fn short_frame_is_rejected_without_side_effects() {
    let (mut p, store) = pipeline();
    let builder = FrameBuilder::new();
    let tokens = &builder.tokens()[..33];
    let line = format!("BEGIN;{};END", tokens.join(";"));

    let err = p.process_line(&line).unwrap_err();
    assert_eq!(err, TelemetryError::FieldCount { expected: 34, actual: 33 });
    assert!(store.read().is_none());
    assert!(p.previous_counters().iter().all(|(_, v)| v == 0));
}

fn pose_bits(p: &TelemetryPipeline, pair: EncoderPair) -> [u64; 3] {
    let pose = p.pose(pair);
    [pose.x.to_bits(), pose.y.to_bits(), pose.theta.to_bits()]
}

#[test]
fn short_frame_after_valid_frame_leaves_state_untouched() {
    let (mut p, store) = pipeline();
    p.process_line(&frame_with(&[
        ("shortLeftEncoderNbPulsesNow", 120),
        ("shortRightEncoderNbPulsesNow", 340),
        ("PositionActual1", -75),
        ("PositionActual2", 260),
    ]))
    .unwrap();

    let snapshot = store.read().unwrap();
    let counters = p.previous_counters();
    let short = pose_bits(&p, EncoderPair::ShortEncoder);
    let position = pose_bits(&p, EncoderPair::PositionActual);

    // Counters that would move both poses, with one token missing.
    let mut next = FrameBuilder::new();
    next.set("shortLeftEncoderNbPulsesNow", 900).unwrap();
    next.set("shortRightEncoderNbPulsesNow", 100).unwrap();
    next.set("PositionActual1", 5_000).unwrap();
    next.set("PositionActual2", -5_000).unwrap();
    let line = format!("BEGIN;{};END", next.tokens()[..33].join(";"));

    assert_eq!(
        p.process_line(&line).unwrap_err(),
        TelemetryError::FieldCount { expected: 34, actual: 33 }
    );
    assert!(Arc::ptr_eq(&snapshot, &store.read().unwrap()));
    assert_eq!(store.published(), 1);
    assert_eq!(p.previous_counters(), counters);
    assert_eq!(pose_bits(&p, EncoderPair::ShortEncoder), short);
    assert_eq!(pose_bits(&p, EncoderPair::PositionActual), position);
}

#[test]
fn malformed_frames_between_good_ones_are_invisible() {
    let (mut p, store) = pipeline();
    assert!(p.ingest(&frame_with(&[("PositionActual1", 10)])));
    assert!(!p.ingest("BEGIN;1;2;3;END"));
    assert!(!p.ingest("hello"));
    assert!(p.ingest(&frame_with(&[("PositionActual1", 25)])));

    let snap = store.read().unwrap();
    assert_eq!(snap.sequence(), 2);
    assert_eq!(snap.get("PositionActual1_diff"), Some(&TelemetryValue::Integer(15)));
    assert_eq!(p.rejected(), 2);
}

#[test]
fn repeated_frame_is_idempotent_for_pose() {
    let (mut p, store) = pipeline();
    let line = frame_with(&[
        ("shortLeftEncoderNbPulsesNow", 400),
        ("shortRightEncoderNbPulsesNow", 700),
        ("PositionActual1", 50),
        ("PositionActual2", -50),
    ]);
    p.process_line(&line).unwrap();
    let first = store.read().unwrap();

    p.process_line(&line).unwrap();
    let second = store.read().unwrap();

    for counter in TrackedCounter::ALL {
        assert_eq!(second.get(counter.diff_key()), Some(&TelemetryValue::Integer(0)));
    }
    for pair in [EncoderPair::ShortEncoder, EncoderPair::PositionActual] {
        assert_eq!(first.pose(pair), second.pose(pair));
    }
}

#[test]
fn swapped_positions_change_meaning() {
    let (mut p, store) = pipeline();
    let mut builder = FrameBuilder::new();
    builder.set("shortLeftEncoderNbPulsesNow", 0).unwrap();
    builder.set("shortRightEncoderNbPulsesNow", 573).unwrap();
    let mut tokens = builder.tokens().to_vec();

    let schema = FieldSchema::standard();
    let left = schema.position("shortLeftEncoderNbPulsesNow").unwrap();
    let right = schema.position("shortRightEncoderNbPulsesNow").unwrap();
    tokens.swap(left, right);
    p.process_line(&format!("BEGIN;{};END", tokens.join(";"))).unwrap();

    // The robot now turns right instead of left.
    let pose = store.read().unwrap().pose(EncoderPair::ShortEncoder).unwrap();
    assert!(pose.theta < 0.0);
}

#[test]
fn end_to_end_odometry_scenario() {
    let (mut p, store) = pipeline();
    let counts_per_meter = 360.0 / (2.0 * std::f64::consts::PI * 0.1);

    // Baseline.
    p.process_line(&FrameBuilder::new().build()).unwrap();

    // Both short counters advance by 573: straight ahead.
    p.process_line(&frame_with(&[
        ("shortLeftEncoderNbPulsesNow", 573),
        ("shortRightEncoderNbPulsesNow", 573),
    ]))
    .unwrap();
    let straight = store.read().unwrap().pose(EncoderPair::ShortEncoder).unwrap();
    let one_metre = 573.0 / counts_per_meter;
    assert!((straight.x - one_metre).abs() < 1e-12);
    assert_eq!(straight.y, 0.0);
    assert_eq!(straight.theta, 0.0);

    // Only the right counter advances: turn left by ~2 rad.
    p.process_line(&frame_with(&[
        ("shortLeftEncoderNbPulsesNow", 573),
        ("shortRightEncoderNbPulsesNow", 1146),
    ]))
    .unwrap();
    let snap = store.read().unwrap();
    let turned = snap.pose(EncoderPair::ShortEncoder).unwrap();

    let expected_theta = one_metre / 0.5;
    assert!(expected_theta < std::f64::consts::PI);
    assert!((turned.theta - expected_theta).abs() < 1e-12);
    assert!((turned.theta - 2.000_147).abs() < 1e-5);

    let half = one_metre / 2.0;
    assert!((turned.x - (one_metre + half * expected_theta.cos())).abs() < 1e-12);
    assert!((turned.y - half * expected_theta.sin()).abs() < 1e-12);

    // The position-actual estimator saw no motion at all.
    assert_eq!(
        snap.pose(EncoderPair::PositionActual),
        Some(odolink_types::Pose::origin())
    );
    assert_eq!(snap.sequence(), 3);
}

proptest! {
    #[test]
    fn diffs_match_consecutive_counter_values(
        frames in prop::collection::vec(prop::array::uniform6(-1_000_000i64..1_000_000), 1..20)
    ) {
        let (mut p, store) = pipeline();
        let mut previous = [0i64; 6];

        for values in frames {
            let mut builder = FrameBuilder::new();
            for (counter, value) in TrackedCounter::ALL.iter().zip(values) {
                builder.set(counter.field_name(), value).unwrap();
            }
            p.process_line(&builder.build()).unwrap();

            let snap = store.read().unwrap();
            for (i, counter) in TrackedCounter::ALL.iter().enumerate() {
                prop_assert_eq!(
                    snap.get(counter.diff_key()),
                    Some(&TelemetryValue::Integer(values[i] - previous[i]))
                );
            }
            previous = values;
        }
    }

    #[test]
    fn headings_stay_in_range_over_random_streams(
        frames in prop::collection::vec((-5_000i64..5_000, -5_000i64..5_000), 1..30)
    ) {
        let (mut p, store) = pipeline();
        let (mut left, mut right) = (0i64, 0i64);

        for (dl, dr) in frames {
            left += dl;
            right += dr;
            p.process_line(&frame_with(&[
                ("PositionActual1", left),
                ("PositionActual2", right),
            ]))
            .unwrap();
            let theta = store.read().unwrap().pose(EncoderPair::PositionActual).unwrap().theta;
            prop_assert!(theta > -std::f64::consts::PI && theta <= std::f64::consts::PI);
        }
    }
}
