//! Capability traits the signal engine is written against.
//!
//! Implementations wrap whatever the platform provides (a GPIO character
//! device, a memory-mapped PWM block, a test harness); the engine only sees
//! these interfaces.

use async_trait::async_trait;
use thiserror::Error;

/// Instantaneous level of the receiver line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    Low,
    High,
}

impl LineLevel {
    /// The level on the other side of a transition.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// One detected transition on the receiver line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Monotonic timestamp of the transition, in microseconds.
    pub timestamp_us: u64,
    /// Line level sampled by the source at interrupt time. Duplicate or
    /// glitch interrupts show up as a level that does not alternate, which
    /// is exactly what the capture filter keys on.
    pub level: LineLevel,
}

/// Capability errors.
#[derive(Debug, Error)]
pub enum HalError {
    /// The line or channel is already claimed by another owner.
    #[error("Capability already in use: {0}")]
    InUse(&'static str),

    /// The platform could not provide the capability.
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

/// A subscription to rising/falling transitions on the receiver line.
///
/// Delivery order must match transition order, and timestamps must come
/// from a single monotonic microsecond clock.
#[async_trait]
pub trait EdgeSource: Send {
    /// Wait for the next transition. Returns `None` once the line is
    /// released and no buffered events remain.
    async fn next_edge(&mut self) -> Option<EdgeEvent>;
}

/// A carrier-modulated transmitter output.
///
/// Both methods are called from timing-sensitive contexts and must not
/// block; implementations that need slow register access should stage it
/// elsewhere.
pub trait CarrierOutput: Send + Sync {
    /// Program the square-wave frequency (50% duty) and switch the
    /// carrier on.
    fn enable(&self, freq_hz: u32);

    /// Switch the carrier off.
    fn disable(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_level_toggled() {
        assert_eq!(LineLevel::Low.toggled(), LineLevel::High);
        assert_eq!(LineLevel::High.toggled(), LineLevel::Low);
    }
}
