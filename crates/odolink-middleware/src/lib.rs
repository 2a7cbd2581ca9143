//! `odolink-middleware` – The Wire
//!
//! Everything between raw bytes on the link and typed telemetry: the field
//! catalog, the frame decoder, the outbound command encoding, and the
//! endpoints that move lines in and commands out.
//!
//! # Modules
//!
//! - [`schema`] – Positional field catalog and per-field coercion rules.
//! - [`frame`] – All-or-nothing frame decoder ([`FrameParser`]) plus a
//!   [`FrameBuilder`] for simulators and tests.
//! - [`command`] – Outbound `@`-terminated command tokens.
//! - [`adapter`] – The [`LineSource`] / [`CommandSink`] seams.
//! - [`link`] – BufRead line reader with outer framing filter, shared
//!   command writer, and [`open_link`] (stdin, replay file or serial port).

pub mod adapter;
pub mod command;
pub mod frame;
pub mod link;
pub mod schema;

pub use adapter::{CommandSink, LineSource};
pub use command::OutboundCommand;
pub use frame::{FrameBuilder, FrameParser};
pub use link::{Link, LineReader, SharedWriter, open_link};
pub use schema::{CoercionRule, FieldSchema, FieldSpec};
