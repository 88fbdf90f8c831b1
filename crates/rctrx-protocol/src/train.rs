//! Pulse train representation.
//!
//! A pulse train is one complete remote-control signal: alternating mark
//! (carrier on) and gap (carrier off) durations in microseconds, starting
//! with a mark.

use thiserror::Error;

/// Maximum number of duration slots in a single capture or transmit command.
pub const MAX_TRAIN_LEN: usize = 256;

/// Trailing silence appended to every transmitted command, in microseconds.
///
/// Guarantees clean separation between back-to-back transmissions even when
/// the client supplies no final gap of its own.
pub const GUARD_GAP_US: u16 = 50_000;

/// Errors for pulse train construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrainError {
    /// Train exceeds the slot capacity.
    #[error("Pulse train length {0} exceeds {MAX_TRAIN_LEN} durations")]
    TooLong(usize),
}

/// An ordered sequence of mark/gap durations (µs) for one signal frame.
///
/// Even indices are marks, odd indices are gaps. Durations are 16-bit on
/// the wire; anything longer saturates at `u16::MAX` (~65 ms), which is far
/// beyond any remote-control pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseTrain {
    durations: Vec<u16>,
}

impl PulseTrain {
    /// Create a pulse train from raw durations.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::TooLong`] if there are more than
    /// [`MAX_TRAIN_LEN`] durations.
    pub fn from_durations(durations: Vec<u16>) -> Result<Self, TrainError> {
        if durations.len() > MAX_TRAIN_LEN {
            return Err(TrainError::TooLong(durations.len()));
        }
        Ok(Self { durations })
    }

    /// Number of duration slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Whether the train holds no durations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// The durations in order.
    #[must_use]
    pub fn durations(&self) -> &[u16] {
        &self.durations
    }

    /// Consume the train, yielding its durations.
    #[must_use]
    pub fn into_durations(self) -> Vec<u16> {
        self.durations
    }
}
