//! Command-cycle error taxonomy.
//!
//! Every failure of an opaque external call is converted into one of these
//! kinds at the call site; only the `Display` string crosses the session
//! boundary to the client. None of these abort the session — each is scoped
//! to a single command cycle.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("the target application is not running, open it first")]
    ProcessNotRunning,

    #[error("could not bring the target application to the foreground")]
    ActivationFailed,

    #[error("could not deliver the command to the composer")]
    DeliveryFailed,

    #[error("a command is already in flight")]
    Busy,

    #[error("log watch unavailable: {0}")]
    WatchUnavailable(String),
}
