//! [`PulseSender`] – repeats a command at a fixed period.
//!
//! Used as a keep-alive: the controller stops its motors when it has not
//! heard a speed command for a while.  The first command goes out
//! immediately.  A failed send is logged and the sender keeps going.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use odolink_middleware::{CommandSink, OutboundCommand};
use odolink_types::TelemetryError;
use parking_lot::{Condvar, Mutex};
use tracing::{info, warn};

/// Background interval sender.
pub struct PulseSender {
    stop: Arc<(Mutex<bool>, Condvar)>,
    sent: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PulseSender {
    /// Start sending `command` to `sink` every `interval`.
    pub fn start(
        sink: Arc<dyn CommandSink>,
        command: OutboundCommand,
        interval: Duration,
    ) -> Result<Self, TelemetryError> {
        if interval.is_zero() {
            return Err(TelemetryError::Config("pulse interval must be positive".into()));
        }

        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let sent = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let thread_stop = Arc::clone(&stop);
        let thread_sent = Arc::clone(&sent);
        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("odolink-pulse".into())
            .spawn(move || {
                info!(command = %command, interval_ms = interval.as_millis() as u64, "pulse started");
                let (lock, cvar) = &*thread_stop;
                let mut stopped = lock.lock();
                while !*stopped {
                    match sink.send(&command) {
                        Ok(()) => {
                            thread_sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => warn!(error = %e, "pulse command failed"),
                    }
                    cvar.wait_for(&mut stopped, interval);
                }
                thread_running.store(false, Ordering::Release);
                info!(sent = thread_sent.load(Ordering::Relaxed), "pulse stopped");
            })
            .map_err(|e| TelemetryError::Unexpected(format!("failed to spawn pulse thread: {e}")))?;

        Ok(Self {
            stop,
            sent,
            running,
            handle: Some(handle),
            interval,
        })
    }

    /// Commands sent successfully so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wake the thread, make it exit and wait for it.
    pub fn stop(&mut self) {
        {
            let (lock, cvar) = &*self.stop;
            *lock.lock() = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PulseSender {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<String>>,
    }

    impl CommandSink for Recorder {
        fn send(&self, command: &OutboundCommand) -> Result<(), TelemetryError> {
            self.commands.lock().push(command.encode());
            Ok(())
        }
    }

    struct Broken;

    impl CommandSink for Broken {
        fn send(&self, _: &OutboundCommand) -> Result<(), TelemetryError> {
            Err(TelemetryError::Link("closed".into()))
        }
    }

    #[test]
    fn sends_immediately_then_repeats() {
        let recorder = Arc::new(Recorder::default());
        let mut pulse = PulseSender::start(
            recorder.clone(),
            OutboundCommand::pulse(),
            Duration::from_millis(10),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while pulse.sent() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        pulse.stop();

        assert!(!pulse.is_running());
        let commands = recorder.commands.lock();
        assert!(commands.len() >= 3);
        assert!(commands.iter().all(|c| c == "speed:10:10@"));
    }

    #[test]
    fn stop_interrupts_long_interval() {
        let recorder = Arc::new(Recorder::default());
        let mut pulse =
            PulseSender::start(recorder.clone(), OutboundCommand::Ping, Duration::from_secs(3600))
                .unwrap();

        let started = Instant::now();
        pulse.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(recorder.commands.lock().len() <= 1);
    }

    #[test]
    fn failures_do_not_stop_the_sender() {
        let mut pulse =
            PulseSender::start(Arc::new(Broken), OutboundCommand::Ping, Duration::from_millis(5))
                .unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(pulse.is_running());
        assert_eq!(pulse.sent(), 0);
        pulse.stop();
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = PulseSender::start(Arc::new(Broken), OutboundCommand::Ping, Duration::ZERO);
        assert!(matches!(result, Err(TelemetryError::Config(_))));
    }
}
