//! Outbound command encoding.
//!
//! The controller accepts short ASCII tokens terminated by `@`.  Floats are
//! rendered with their shortest round-trip form and always keep a decimal
//! point, so `Speed { left: 10.0, right: 10.0 }` goes out as
//! `speed:10.0:10.0@`.

use std::fmt;

/// Terminator appended to every outbound token.
pub const COMMAND_TERMINATOR: char = '@';

/// Token repeated by the interval sender.
pub const PULSE_TOKEN: &str = "speed:10:10@";

/// One command for the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// Per-wheel speed set-points.
    Speed { left: f64, right: f64 },
    /// Linear / angular velocity request.
    Twist { linear: f64, angular: f64 },
    /// Liveness probe (`test@`).
    Ping,
    /// Pre-formatted token; the terminator is added when missing.
    Raw(String),
}

impl OutboundCommand {
    /// The fixed command sent by the interval sender.
    pub fn pulse() -> Self {
        OutboundCommand::Raw(PULSE_TOKEN.to_string())
    }

    /// Wire bytes of this command.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundCommand::Speed { left, right } => {
                write!(f, "speed:{left:?}:{right:?}{COMMAND_TERMINATOR}")
            }
            OutboundCommand::Twist { linear, angular } => {
                write!(f, "twist:{linear:?}:{angular:?}{COMMAND_TERMINATOR}")
            }
            OutboundCommand::Ping => write!(f, "test{COMMAND_TERMINATOR}"),
            OutboundCommand::Raw(token) if token.ends_with(COMMAND_TERMINATOR) => {
                f.write_str(token)
            }
            OutboundCommand::Raw(token) => write!(f, "{token}{COMMAND_TERMINATOR}"),
        }
    }
}
