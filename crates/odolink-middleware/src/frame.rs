//! Telemetry frame decoding (and encoding, for simulators and tests).
//!
//! [`FrameParser::parse`] turns one `BEGIN;...;END` line into
//! [`TelemetryFields`].  Decoding is all-or-nothing: a frame with bad
//! sentinels, the wrong number of values, or a single value that does not
//! coerce under its [`CoercionRule`] is rejected as a whole and nothing is
//! returned for it.
//!
//! # Example
//!
//! ```rust
//! use odolink_middleware::frame::{FrameBuilder, FrameParser};
//!
//! let mut builder = FrameBuilder::new();
//! builder.set("PositionActual1", 1200).unwrap();
//! let line = builder.build();
//!
//! let fields = FrameParser::new().parse(&line).unwrap();
//! assert_eq!(fields.integer("PositionActual1"), Some(1200));
//! ```

use std::fmt;

use odolink_types::{TelemetryError, TelemetryFields, TelemetryValue};

use crate::schema::{BEGIN_SENTINEL, CoercionRule, END_SENTINEL, FieldSchema, FieldSpec};

/// Longest prefix of a rejected line carried in a framing error.
const MAX_ERROR_LINE: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// FrameParser
// ────────────────────────────────────────────────────────────────────────────

/// Decodes raw lines against a [`FieldSchema`].
#[derive(Debug, Clone, Copy)]
pub struct FrameParser {
    schema: &'static FieldSchema,
}

impl FrameParser {
    /// Parser for the standard controller schema.
    pub fn new() -> Self {
        Self {
            schema: FieldSchema::standard(),
        }
    }

    pub fn schema(&self) -> &'static FieldSchema {
        self.schema
    }

    /// Decode one frame.
    ///
    /// Empty tokens are discarded before counting, so a stray delimiter
    /// before `;END` is tolerated.
    pub fn parse(&self, line: &str) -> Result<TelemetryFields, TelemetryError> {
        let body = line
            .strip_prefix(BEGIN_SENTINEL)
            .and_then(|rest| rest.strip_suffix(END_SENTINEL))
            .ok_or_else(|| TelemetryError::Framing {
                line: line.chars().take(MAX_ERROR_LINE).collect(),
            })?;

        let tokens: Vec<&str> = body.split(';').filter(|t| !t.is_empty()).collect();
        if tokens.len() != self.schema.len() {
            return Err(TelemetryError::FieldCount {
                expected: self.schema.len(),
                actual: tokens.len(),
            });
        }

        let entries = self
            .schema
            .fields()
            .iter()
            .zip(tokens)
            .map(|(spec, token)| coerce(spec, token).map(|value| (spec.name, value)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TelemetryFields::new(entries))
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert one raw token according to its field's rule.
fn coerce(spec: &FieldSpec, token: &str) -> Result<TelemetryValue, TelemetryError> {
    let mismatch = || TelemetryError::TypeCoercion {
        field: spec.name.to_string(),
        raw_value: token.to_string(),
    };

    match spec.rule {
        CoercionRule::Integer => token
            .trim()
            .parse::<i64>()
            .map(TelemetryValue::Integer)
            .map_err(|_| mismatch()),
        CoercionRule::Decimal => token
            .trim()
            .parse::<f64>()
            .map(TelemetryValue::Decimal)
            .map_err(|_| mismatch()),
        CoercionRule::OpaqueString => Ok(TelemetryValue::Text(token.to_string())),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameBuilder
// ────────────────────────────────────────────────────────────────────────────

/// Assembles a wire line in schema order.
///
/// Every slot starts with a valid placeholder (`0`, `0.0`, or `1` for the
/// protocol version), so [`build`][Self::build] always yields a frame that
/// [`FrameParser`] accepts unless a caller sets an invalid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuilder {
    schema: &'static FieldSchema,
    tokens: Vec<String>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        let schema = FieldSchema::standard();
        let tokens = schema
            .fields()
            .iter()
            .map(|spec| {
                match spec.rule {
                    CoercionRule::Integer => "0",
                    CoercionRule::Decimal => "0.0",
                    CoercionRule::OpaqueString => "1",
                }
                .to_string()
            })
            .collect();
        Self { schema, tokens }
    }

    /// Set the raw token of `name`.
    pub fn set(
        &mut self,
        name: &str,
        value: impl fmt::Display,
    ) -> Result<&mut Self, TelemetryError> {
        let index = self
            .schema
            .position(name)
            .ok_or_else(|| TelemetryError::Unexpected(format!("unknown field {name}")))?;
        self.tokens[index] = value.to_string();
        Ok(self)
    }

    /// Raw tokens in schema order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Render the full `BEGIN;...;END` line (without a line terminator).
    pub fn build(&self) -> String {
        format!("{BEGIN_SENTINEL}{}{END_SENTINEL}", self.tokens.join(";"))
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
