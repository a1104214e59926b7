//! Canonical protocol types for cmpsr client/server communication.
//!
//! The wire format is JSON text frames over WebSocket. Every frame carries a
//! `type` tag in kebab-case; the remaining fields are the payload. These
//! types are the single source of truth for that contract — the server and
//! any client bindings are generated from or checked against them.

pub mod events;

pub use events::{ClientCommand, ServerEvent, StatusPayload};
