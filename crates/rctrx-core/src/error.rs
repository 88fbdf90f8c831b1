//! Engine errors.

use rctrx_hal::HalError;
use thiserror::Error;

/// Errors surfaced on session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransceiverError {
    /// Non-blocking read with no pending frame.
    #[error("No frame pending")]
    WouldBlock,

    /// A blocking call was interrupted; the caller may retry.
    #[error("Interrupted, restart the call")]
    Interrupted,

    /// A transmit command exceeded the duration-slot capacity before its
    /// terminator, with no bytes accepted in the call.
    #[error("Transmit command exceeds the duration-slot capacity")]
    CommandTooLong,

    /// The session limit was reached on open.
    #[error("Too many open sessions (limit {0})")]
    TooManySessions(usize),

    /// A transmit command was dispatched but no carrier output is
    /// configured.
    #[error("No transmitter configured")]
    TransmitterNotConfigured,
}

/// Errors during transceiver construction.
#[derive(Debug, Error)]
pub enum InitError {
    /// Neither capability was supplied; the engine would have nothing
    /// to do.
    #[error("A receiver line or a transmitter channel must be configured")]
    NoCapabilities,

    /// A capability could not be acquired.
    #[error("Capability acquisition failed: {0}")]
    Hal(#[from] HalError),
}
