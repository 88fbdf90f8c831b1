//! Timer-driven pulse playback.
//!
//! A player task alternates carrier-on (even slots) and carrier-off (odd
//! slots) phases through the whole train, then clears the
//! transmission-active flag and releases the transmit token it was handed
//! by the writing session. Releasing on this task rather than the writer's
//! is the point: the token's owner is whoever currently carries the
//! transmission forward.

use rctrx_hal::CarrierOutput;
use rctrx_protocol::PulseTrain;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

pub(crate) async fn play(
    train: PulseTrain,
    token: OwnedMutexGuard<()>,
    carrier: Arc<dyn CarrierOutput>,
    tx_active: Arc<AtomicBool>,
    carrier_hz: u32,
) {
    let durations = train.durations();
    let mut pos = 0;
    loop {
        carrier.disable();
        if pos >= durations.len() {
            break;
        }
        if pos % 2 == 0 {
            carrier.enable(carrier_hz);
        }
        tokio::time::sleep(Duration::from_micros(u64::from(durations[pos]))).await;
        pos += 1;
    }

    tx_active.store(false, Ordering::Release);
    drop(token);
    debug!(slots = durations.len(), "Playback finished");
}
