//! [`FeedWorker`] – the single producer thread.
//!
//! Pulls lines from a [`LineSource`] and pushes them through the
//! [`TelemetryPipeline`] one at a time.  The stop flag is checked between
//! lines and after every read timeout, so a silent serial port still stops
//! within one timeout period.
//!
//! A rejected frame is counted and skipped.  A link failure ends the thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use odolink_kernel::TelemetryPipeline;
use odolink_middleware::LineSource;
use odolink_types::TelemetryError;
use tracing::{error, info};

// ────────────────────────────────────────────────────────────────────────────
// FeedStats
// ────────────────────────────────────────────────────────────────────────────

/// Live counters of the feed thread.
#[derive(Debug, Default)]
pub struct FeedStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl FeedStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn record(&self, accepted: bool) {
        let counter = if accepted { &self.accepted } else { &self.rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Why the feed loop returned.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedExit {
    /// The source reported end of stream.
    EndOfStream,
    /// The stop flag was raised.
    Stopped,
    /// The source failed; the error is the one it returned.
    LinkFailed(TelemetryError),
}

// ────────────────────────────────────────────────────────────────────────────
// Feed loop
// ────────────────────────────────────────────────────────────────────────────

/// Drive `pipeline` from `source` on the current thread until the stream
/// ends, the link fails or `stop` is raised.
pub fn run_feed<S: LineSource + ?Sized>(
    source: &mut S,
    pipeline: &mut TelemetryPipeline,
    stop: &AtomicBool,
    stats: &FeedStats,
) -> FeedExit {
    while !stop.load(Ordering::Acquire) {
        match source.next_line() {
            Ok(Some(line)) => stats.record(pipeline.ingest(&line)),
            Ok(None) => return FeedExit::EndOfStream,
            Err(TelemetryError::Timeout) => continue,
            Err(e) => {
                error!(error = %e, "link read failed, feed stopping");
                return FeedExit::LinkFailed(e);
            }
        }
    }
    FeedExit::Stopped
}

// ────────────────────────────────────────────────────────────────────────────
// FeedWorker
// ────────────────────────────────────────────────────────────────────────────

/// Handle to the background feed thread.
pub struct FeedWorker {
    stop: Arc<AtomicBool>,
    stats: Arc<FeedStats>,
    handle: Option<JoinHandle<FeedExit>>,
}

impl FeedWorker {
    /// Spawn the feed thread.
    pub fn spawn(
        mut source: Box<dyn LineSource>,
        mut pipeline: TelemetryPipeline,
    ) -> Result<Self, TelemetryError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(FeedStats::default());

        let thread_stop = Arc::clone(&stop);
        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("odolink-feed".into())
            .spawn(move || {
                info!("feed started");
                let exit = run_feed(&mut source, &mut pipeline, &thread_stop, &thread_stats);
                info!(
                    accepted = thread_stats.accepted(),
                    rejected = thread_stats.rejected(),
                    exit = ?exit,
                    "feed finished"
                );
                exit
            })
            .map_err(|e| TelemetryError::Link(format!("failed to spawn feed thread: {e}")))?;

        Ok(Self {
            stop,
            stats,
            handle: Some(handle),
        })
    }

    pub fn stats(&self) -> &Arc<FeedStats> {
        &self.stats
    }

    /// Ask the thread to stop after its current line.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the thread.  Returns `None` if it was already joined.
    pub fn join(&mut self) -> Option<FeedExit> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(_) => Some(FeedExit::LinkFailed(TelemetryError::Unexpected(
                "feed thread panicked".into(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odolink_kernel::SnapshotStore;
    use odolink_middleware::{FrameBuilder, LineReader};
    use odolink_perception::WheelOdometryConfig;
    use std::collections::VecDeque;
    use std::io::Cursor;

    fn pipeline(store: Arc<SnapshotStore>) -> TelemetryPipeline {
        TelemetryPipeline::new(Arc::new(WheelOdometryConfig::default()), store)
    }

    struct Scripted(VecDeque<Result<Option<String>, TelemetryError>>);

    impl LineSource for Scripted {
        fn next_line(&mut self) -> Result<Option<String>, TelemetryError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    #[test]
    fn counts_accepted_and_rejected_frames() {
        let store = Arc::new(SnapshotStore::new());
        let mut p = pipeline(Arc::clone(&store));
        let good = FrameBuilder::new().build();
        let input = format!("{good}\nBEGIN;1;2;END\n{good}\n");
        let mut source = LineReader::new(Cursor::new(input.into_bytes()));

        let stats = FeedStats::default();
        let exit = run_feed(&mut source, &mut p, &AtomicBool::new(false), &stats);

        assert_eq!(exit, FeedExit::EndOfStream);
        assert_eq!(stats.accepted(), 2);
        assert_eq!(stats.rejected(), 1);
        assert_eq!(store.read().unwrap().sequence(), 2);
    }

    #[test]
    fn link_error_ends_the_loop() {
        let store = Arc::new(SnapshotStore::new());
        let mut p = pipeline(store);
        let mut source = Scripted(VecDeque::from([
            Ok(Some(FrameBuilder::new().build())),
            Err(TelemetryError::Link("device unplugged".into())),
            Ok(Some(FrameBuilder::new().build())),
        ]));

        let stats = FeedStats::default();
        let exit = run_feed(&mut source, &mut p, &AtomicBool::new(false), &stats);
        assert_eq!(exit, FeedExit::LinkFailed(TelemetryError::Link("device unplugged".into())));
        assert_eq!(stats.accepted(), 1);
    }

    #[test]
    fn raised_stop_flag_prevents_reads() {
        let mut p = pipeline(Arc::new(SnapshotStore::new()));
        let mut source = Scripted(VecDeque::from([Ok(Some(FrameBuilder::new().build()))]));
        let stats = FeedStats::default();
        let exit = run_feed(&mut source, &mut p, &AtomicBool::new(true), &stats);
        assert_eq!(exit, FeedExit::Stopped);
        assert_eq!(stats.accepted(), 0);
    }

    /// Times out forever, like a port with nothing attached.
    struct Silent;

    impl LineSource for Silent {
        fn next_line(&mut self) -> Result<Option<String>, TelemetryError> {
            thread::sleep(std::time::Duration::from_millis(5));
            Err(TelemetryError::Timeout)
        }
    }

    #[test]
    fn timeouts_are_retried() {
        let mut p = pipeline(Arc::new(SnapshotStore::new()));
        let mut source = Scripted(VecDeque::from([
            Err(TelemetryError::Timeout),
            Ok(Some(FrameBuilder::new().build())),
            Err(TelemetryError::Timeout),
        ]));
        let stats = FeedStats::default();
        let exit = run_feed(&mut source, &mut p, &AtomicBool::new(false), &stats);
        assert_eq!(exit, FeedExit::EndOfStream);
        assert_eq!(stats.accepted(), 1);
    }

    #[test]
    fn silent_link_honours_stop_request() {
        let mut worker =
            FeedWorker::spawn(Box::new(Silent), pipeline(Arc::new(SnapshotStore::new()))).unwrap();
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!worker.is_finished());

        worker.request_stop();
        assert_eq!(worker.join(), Some(FeedExit::Stopped));
    }

    #[test]
    fn worker_runs_to_end_of_stream() {
        let store = Arc::new(SnapshotStore::new());
        let frames = format!("{0}\n{0}\n{0}\n", FrameBuilder::new().build());
        let source = Box::new(LineReader::new(Cursor::new(frames.into_bytes())));

        let mut worker = FeedWorker::spawn(source, pipeline(Arc::clone(&store))).unwrap();
        assert_eq!(worker.join(), Some(FeedExit::EndOfStream));
        assert!(worker.is_finished());
        assert_eq!(worker.stats().accepted(), 3);
        assert_eq!(store.published(), 3);
        assert_eq!(worker.join(), None);
    }
}
