//! In-memory capability implementations.
//!
//! Used by the engine's test suites and by server backends that run without
//! hardware. Edge delivery runs through an unbounded channel so a test can
//! stage a whole burst before the capture task observes any of it; the
//! carrier mock keeps a timestamped log of every switch for assertions
//! about playback timelines.

use crate::traits::{CarrierOutput, EdgeEvent, EdgeSource, HalError, LineLevel};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

/// Handle for injecting receiver-line transitions.
///
/// The paired [`EdgeSource`] can be claimed exactly once, mirroring a real
/// interrupt line that only one driver may own.
#[derive(Debug)]
pub struct MockReceiver {
    tx: mpsc::UnboundedSender<EdgeEvent>,
    source: Mutex<Option<MockEdgeSource>>,
}

impl Default for MockReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReceiver {
    /// Create a receiver line with no events queued.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            source: Mutex::new(Some(MockEdgeSource { rx })),
        }
    }

    /// Claim the edge-interrupt subscription.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::InUse`] if the subscription was already claimed.
    pub fn claim(&self) -> Result<MockEdgeSource, HalError> {
        self.source
            .lock()
            .expect("mock receiver lock poisoned")
            .take()
            .ok_or(HalError::InUse("edge source"))
    }

    /// Inject a single transition.
    pub fn feed(&self, timestamp_us: u64, level: LineLevel) {
        trace!(timestamp_us, ?level, "Injecting edge");
        let _ = self.tx.send(EdgeEvent {
            timestamp_us,
            level,
        });
    }

    /// Inject a burst of transitions with strictly alternating levels,
    /// starting low (an idle-high receiver pulling the line down).
    pub fn feed_burst(&self, timestamps_us: &[u64]) {
        let mut level = LineLevel::Low;
        for &timestamp_us in timestamps_us {
            self.feed(timestamp_us, level);
            level = level.toggled();
        }
    }
}

/// The claimed end of a [`MockReceiver`].
#[derive(Debug)]
pub struct MockEdgeSource {
    rx: mpsc::UnboundedReceiver<EdgeEvent>,
}

#[async_trait]
impl EdgeSource for MockEdgeSource {
    async fn next_edge(&mut self) -> Option<EdgeEvent> {
        self.rx.recv().await
    }
}

/// One recorded carrier switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierChange {
    /// Carrier switched on at the given frequency.
    Enabled { at: tokio::time::Instant, freq_hz: u32 },
    /// Carrier switched off.
    Disabled { at: tokio::time::Instant },
}

impl CarrierChange {
    /// Timestamp of the switch.
    #[must_use]
    pub fn at(&self) -> tokio::time::Instant {
        match *self {
            Self::Enabled { at, .. } | Self::Disabled { at } => at,
        }
    }

    /// Whether this change switched the carrier on.
    #[must_use]
    pub fn is_enable(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Carrier output that records every switch with a timestamp.
///
/// Timestamps come from `tokio::time::Instant`, so tests running under
/// paused time see exact, deterministic playback schedules.
#[derive(Debug, Default)]
pub struct MockCarrier {
    log: Mutex<Vec<CarrierChange>>,
}

impl MockCarrier {
    /// Create a carrier output with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded switches in order.
    #[must_use]
    pub fn log(&self) -> Vec<CarrierChange> {
        self.log.lock().expect("mock carrier lock poisoned").clone()
    }

    /// Replace the log with an empty one, returning the old contents.
    pub fn take_log(&self) -> Vec<CarrierChange> {
        std::mem::take(&mut *self.log.lock().expect("mock carrier lock poisoned"))
    }
}

impl CarrierOutput for MockCarrier {
    fn enable(&self, freq_hz: u32) {
        trace!(freq_hz, "Carrier on");
        self.log
            .lock()
            .expect("mock carrier lock poisoned")
            .push(CarrierChange::Enabled {
                at: tokio::time::Instant::now(),
                freq_hz,
            });
    }

    fn disable(&self) {
        trace!("Carrier off");
        self.log
            .lock()
            .expect("mock carrier lock poisoned")
            .push(CarrierChange::Disabled {
                at: tokio::time::Instant::now(),
            });
    }
}
