//! The link adapter seams.
//!
//! The telemetry core never touches a serial port, a file or a socket.  It
//! pulls lines from a [`LineSource`] and the operator surfaces push commands
//! into a [`CommandSink`].  Concrete implementations live in
//! [`link`][crate::link]; tests use in-memory ones.
//!
//! # Overview
//!
//! - [`LineSource`] – the inbound half: yields one raw frame line at a time.
//! - [`CommandSink`] – the outbound half: writes one [`OutboundCommand`].

use odolink_types::TelemetryError;

use crate::command::OutboundCommand;

/// Producer of raw telemetry lines.
///
/// # Contract
///
/// * `next_line` blocks until a line is available and returns it without
///   its line terminator.  `Ok(None)` means end of stream; the caller must
///   stop polling.  A source with a read timeout returns
///   [`TelemetryError::Timeout`] when it expires; the caller may retry.
///   Any other I/O failure is reported as [`TelemetryError::Link`].
pub trait LineSource: Send {
    fn next_line(&mut self) -> Result<Option<String>, TelemetryError>;
}

/// Consumer of outbound commands.
///
/// Shared between the REPL and the interval sender, hence `&self`.
pub trait CommandSink: Send + Sync {
    fn send(&self, command: &OutboundCommand) -> Result<(), TelemetryError>;
}

impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn next_line(&mut self) -> Result<Option<String>, TelemetryError> {
        (**self).next_line()
    }
}

impl<T: CommandSink + ?Sized> CommandSink for std::sync::Arc<T> {
    fn send(&self, command: &OutboundCommand) -> Result<(), TelemetryError> {
        (**self).send(command)
    }
}
