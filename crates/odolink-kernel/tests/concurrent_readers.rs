//! Readers running alongside the producer only ever see whole snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use odolink_kernel::{SnapshotStore, TelemetryPipeline};
use odolink_middleware::FrameBuilder;
use odolink_perception::WheelOdometryConfig;
use odolink_types::TelemetryValue;

const FRAMES: i64 = 2_000;
const READERS: usize = 8;

#[test]
fn readers_observe_consistent_monotonic_snapshots() {
    let store = Arc::new(SnapshotStore::new());
    let done = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..READERS {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        readers.push(thread::spawn(move || {
            let mut last_sequence = 0;
            let mut seen = 0u64;
            while !done.load(Ordering::Acquire) {
                let Some(snap) = store.read() else {
                    thread::yield_now();
                    continue;
                };
                assert!(snap.sequence() >= last_sequence);
                last_sequence = snap.sequence();

                // Every frame sets both counters to the sequence number, so a
                // torn snapshot would show them disagreeing.
                let a = snap.get("PositionActual1").and_then(TelemetryValue::as_integer);
                let b = snap.get("PositionActual2").and_then(TelemetryValue::as_integer);
                assert_eq!(a, b);
                assert_eq!(a, Some(snap.sequence() as i64));
                assert_eq!(snap.get("PositionActual1_diff"), Some(&TelemetryValue::Integer(1)));
                seen += 1;
                thread::yield_now();
            }
            seen
        }));
    }

    let producer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut pipeline =
                TelemetryPipeline::new(Arc::new(WheelOdometryConfig::default()), store);
            let mut builder = FrameBuilder::new();
            for i in 1..=FRAMES {
                builder.set("PositionActual1", i).unwrap();
                builder.set("PositionActual2", i).unwrap();
                assert!(pipeline.ingest(&builder.build()));
            }
        })
    };

    producer.join().unwrap();
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    let last = store.read().unwrap();
    assert_eq!(last.sequence(), FRAMES as u64);
    assert_eq!(store.published(), FRAMES as u64);
}
