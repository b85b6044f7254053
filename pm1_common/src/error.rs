//! Error taxonomy for the PM1 chassis SDK.
//!
//! Every public operation returns `Result<_, PmError>`; no panic or boxed
//! `dyn Error` escapes the crate boundary. Several display strings are part
//! of the stable, caller-observable surface (see module-level doc on each
//! variant) and must not be reworded without updating `SPEC_FULL.md` §6.

use thiserror::Error;

/// Tagged error union for all chassis SDK operations.
#[derive(Debug, Error, Clone)]
pub enum PmError {
    /// Autodiscovery exhausted every candidate port, or a named port could not be opened.
    #[error("no available serial port")]
    NoSerial,

    /// Serial send/read fault. The session does not attempt automatic reconnection.
    ///
    /// Display is prefixed with `"IO Exception"` so callers pattern-matching on the original
    /// vendor SDK's error strings keep working.
    #[error("IO Exception: {0}")]
    IoError(String),

    /// A public API was called without an active session.
    #[error("chassis has not been initialized")]
    NotInitialized,

    /// Negative distance/time, zero radius where `turn_around` requires a nonzero one, or
    /// another argument outside its documented domain.
    #[error("target state should greater than 0")]
    IllegalArgument,

    /// Speed is zero but the requested target is nonzero, so the primitive could never finish.
    #[error("this action will never complete")]
    InfiniteAction,

    /// `cancel_all()` fired while a primitive was running.
    #[error("action canceled")]
    ActionCanceled,

    /// Handshake failed: one or more of ECU0/ECU1/TCU0 did not reply within the deadline.
    #[error("not a pm1 chassis: {0}")]
    NotAPm1Chassis(String),

    /// An operation that requires the chassis to be unlocked was attempted while locked.
    #[error("chassis is locked")]
    ChassisLocked,

    /// A critical, unrecoverable fault reported by `check_state()`.
    #[error("critical error: {0}")]
    CriticalError(String),

    /// Catch-all for unanticipated faults.
    #[error("{0}")]
    Other(String),
}

impl PmError {
    /// Wrap a lower-level I/O error, preserving the `"IO Exception"` prefix.
    pub fn io(msg: impl Into<String>) -> Self {
        PmError::IoError(msg.into())
    }
}

impl From<std::io::Error> for PmError {
    fn from(e: std::io::Error) -> Self {
        PmError::IoError(e.to_string())
    }
}
