//! Concrete link endpoints.
//!
//! [`LineReader`] turns any [`BufRead`] (a serial port, a replay file,
//! stdin) into a [`LineSource`].  [`SharedWriter`] wraps any [`Write`] as a
//! [`CommandSink`] guarded by a [`parking_lot::Mutex`].  [`open_link`] picks
//! the right pair for a configured path.

use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::time::Duration;

use odolink_types::TelemetryError;
use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info, warn};

use crate::adapter::{CommandSink, LineSource};
use crate::command::OutboundCommand;
use crate::schema::{BEGIN_SENTINEL, END_SENTINEL};

/// Path value that selects standard input.
pub const STDIN_PATH: &str = "-";

/// Serial read timeout.  Bounds how long the feed waits before it looks at
/// its stop flag again.
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_secs(1);

// ────────────────────────────────────────────────────────────────────────────
// LineReader
// ────────────────────────────────────────────────────────────────────────────

/// Line-oriented reader with the outer framing filter.
///
/// Invalid UTF-8 is replaced, whitespace and CR/LF are trimmed, blank lines
/// are skipped silently and lines that are not delimited by the frame
/// sentinels are skipped with a warning.  Only candidate frames reach the
/// caller.
///
/// A read that times out returns [`TelemetryError::Timeout`]; bytes of a
/// partially received line are kept and completed by the next call.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    skipped: u64,
}

impl<R: BufRead + Send> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(512),
            skipped: 0,
        }
    }

    /// Lines dropped by the outer framing filter so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead + Send> LineSource for LineReader<R> {
    fn next_line(&mut self) -> Result<Option<String>, TelemetryError> {
        loop {
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) if self.buf.is_empty() => return Ok(None),
                Ok(_) => {}
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Err(TelemetryError::Timeout);
                }
                Err(e) => return Err(TelemetryError::Link(e.to_string())),
            }

            let line = String::from_utf8_lossy(&self.buf).trim().to_string();
            self.buf.clear();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(BEGIN_SENTINEL) && line.ends_with(END_SENTINEL) {
                return Ok(Some(line));
            }

            self.skipped += 1;
            warn!(line = %line, "ignoring line without frame sentinels");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SharedWriter
// ────────────────────────────────────────────────────────────────────────────

/// Mutex-guarded command writer.
pub struct SharedWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl SharedWriter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    /// A writer that discards every command (read-only links).
    pub fn discard() -> Self {
        Self::new(io::sink())
    }
}

impl CommandSink for SharedWriter {
    fn send(&self, command: &OutboundCommand) -> Result<(), TelemetryError> {
        let encoded = command.encode();
        let mut writer = self.inner.lock();
        writer
            .write_all(encoded.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| TelemetryError::Link(e.to_string()))?;
        debug!(command = %encoded, "command sent");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// open_link
// ────────────────────────────────────────────────────────────────────────────

/// Both halves of an opened link.
pub struct Link {
    pub source: Box<dyn LineSource>,
    pub sink: SharedWriter,
    /// `false` when commands are discarded (stdin or a replay file).
    pub writable: bool,
}

/// Open the link at `path`.
///
/// * `-` reads frames from stdin; commands are discarded.
/// * A regular file is replayed read-only; commands are discarded.
/// * Anything else is opened as a serial port at `baud_rate`, 8N1, no flow
///   control, with [`SERIAL_READ_TIMEOUT`].  Commands go to a clone of the
///   same port.
pub fn open_link(path: &str, baud_rate: u32) -> Result<Link, TelemetryError> {
    if path == STDIN_PATH {
        info!("reading telemetry from stdin");
        return Ok(Link {
            source: Box::new(LineReader::new(BufReader::new(io::stdin()))),
            sink: SharedWriter::discard(),
            writable: false,
        });
    }

    let link_err = |e: io::Error| TelemetryError::Link(format!("{path}: {e}"));

    if std::fs::metadata(path).is_ok_and(|m| m.is_file()) {
        info!(path = %path, "replaying telemetry file");
        let file = File::open(path).map_err(link_err)?;
        return Ok(Link {
            source: Box::new(LineReader::new(BufReader::new(file))),
            sink: SharedWriter::discard(),
            writable: false,
        });
    }

    let port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(SERIAL_READ_TIMEOUT)
        .open()
        .map_err(|e| link_err(e.into()))?;
    let writer = port.try_clone().map_err(|e| link_err(e.into()))?;
    info!(path = %path, baud_rate, "serial port opened");
    Ok(Link {
        source: Box::new(LineReader::new(BufReader::new(port))),
        sink: SharedWriter::new(writer),
        writable: true,
    })
}
