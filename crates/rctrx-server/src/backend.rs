//! Device backend assembly.
//!
//! Builds the capability pair handed to the signal engine from the
//! `[device]` configuration. Without real hardware the receiver line is an
//! in-memory one that the synthetic feeder (if enabled) drives, and the
//! carrier output only logs its switches.

use crate::config::DeviceConfig;
use rctrx_hal::{CarrierOutput, EdgeSource, MockReceiver};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Assembled device capabilities.
pub struct Backend {
    /// Edge-interrupt subscription for the engine, if a receiver is configured.
    pub edge_source: Option<Box<dyn EdgeSource>>,

    /// Carrier channel for the engine, if a transmitter is configured.
    pub carrier: Option<Arc<dyn CarrierOutput>>,

    /// The feed side of the receiver line. Kept alive so the edge channel
    /// stays open, and handed to the synthetic feeder.
    pub receiver_line: Option<Arc<MockReceiver>>,
}

/// Build device capabilities from configuration.
///
/// # Errors
///
/// Returns an error if the receiver line cannot be claimed.
pub fn build(config: &DeviceConfig) -> Result<Backend, rctrx_hal::HalError> {
    let (edge_source, receiver_line) = if config.receiver {
        let line = Arc::new(MockReceiver::new());
        let source = line.claim()?;
        info!("Receiver line configured");
        (
            Some(Box::new(source) as Box<dyn EdgeSource>),
            Some(line),
        )
    } else {
        (None, None)
    };

    let carrier = if config.transmitter {
        info!("Transmitter carrier configured");
        Some(Arc::new(LogCarrier) as Arc<dyn CarrierOutput>)
    } else {
        None
    };

    Ok(Backend {
        edge_source,
        carrier,
        receiver_line,
    })
}

/// Carrier output that only traces its switches.
struct LogCarrier;

impl CarrierOutput for LogCarrier {
    fn enable(&self, freq_hz: u32) {
        debug!(freq_hz, "Carrier on");
    }

    fn disable(&self) {
        debug!("Carrier off");
    }
}

/// Demo remote-control burst fed by the synthetic feeder, as gaps between
/// consecutive line transitions in microseconds. Leader pulse and gap, four
/// data pairs, and a trailing mark.
const DEMO_PATTERN: &[u64] = &[
    9000, 4500, 560, 560, 560, 1690, 560, 560, 560, 1690, 560,
];

/// Periodically inject a demo burst on the receiver line.
///
/// Runs until the process exits. Timestamps are derived from elapsed wall
/// time so consecutive bursts land well apart and each finalizes on its own.
pub async fn synthetic_feeder(line: Arc<MockReceiver>, interval: Duration) {
    let epoch = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let base = epoch.elapsed().as_micros() as u64;
        let mut timestamps = Vec::with_capacity(DEMO_PATTERN.len() + 1);
        let mut at = base;
        timestamps.push(at);
        for &gap in DEMO_PATTERN {
            at += gap;
            timestamps.push(at);
        }
        debug!(edges = timestamps.len(), "Injecting synthetic burst");
        line.feed_burst(&timestamps);
    }
}
