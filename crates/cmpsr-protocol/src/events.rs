//! WebSocket message types for the command relay protocol.
//!
//! These types define the protocol between the browser client and the relay
//! server. Events flow server -> client; commands flow client -> server.

use serde::{Deserialize, Serialize};

/// Liveness/capability snapshot of the target application.
///
/// Field names are part of the wire contract: `cursor` is "the target
/// process is running", `composer` is "the automation surface is open and
/// can receive keystrokes". A probe failure collapses to `false` for the
/// affected field, so a snapshot never carries partial errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub cursor: bool,
    pub composer: bool,
}

impl StatusPayload {
    /// Snapshot for an unreachable target (both checks failed or timed out).
    pub fn offline() -> Self {
        Self {
            cursor: false,
            composer: false,
        }
    }
}

/// Events sent from the relay server to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Liveness/capability snapshot, sent on connect and on every poll tick.
    StatusUpdate { cursor: bool, composer: bool },

    /// One interim output line produced during a command cycle.
    CommandOutput { line: String },

    /// A command cycle was aborted or rejected; human-readable reason.
    CommandError { message: String },

    /// Terminal outcome of the most recent accepted command.
    CommandComplete { exit_code: u8 },
}

impl ServerEvent {
    pub fn status(payload: StatusPayload) -> Self {
        Self::StatusUpdate {
            cursor: payload.cursor,
            composer: payload.composer,
        }
    }

    pub fn output(line: impl Into<String>) -> Self {
        Self::CommandOutput { line: line.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::CommandError {
            message: message.into(),
        }
    }

    /// Terminal outcome: exit code 0 on success, 1 on failure.
    pub fn complete(success: bool) -> Self {
        Self::CommandComplete {
            exit_code: if success { 0 } else { 1 },
        }
    }
}

/// Commands sent from the client to the relay server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Submit one command for the current session.
    ExecuteCommand { command: String },
}
