//! The transceiver facade.
//!
//! Owns the shared engine state, spawns the capture task when a receiver
//! line is supplied, and hands out session handles.

use crate::capture::{self, CaptureState};
use crate::error::{InitError, TransceiverError};
use crate::registry::{SessionRegistry, DEFAULT_MAX_SESSIONS};
use crate::session::SessionHandle;
use rctrx_hal::{CarrierOutput, EdgeSource};
use rctrx_protocol::MAX_TRAIN_LEN;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

/// Engine configuration, fixed at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransceiverConfig {
    /// Carrier frequency for transmission, in hertz.
    #[serde(default = "default_carrier_hz")]
    pub carrier_hz: u32,

    /// Maximum number of concurrently open sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Silence that closes a captured frame, in microseconds.
    #[serde(default = "default_frame_timeout_us")]
    pub frame_timeout_us: u64,

    /// Noise filter threshold, in microseconds.
    #[serde(default = "default_min_pulse_us")]
    pub min_pulse_us: u64,

    /// Capture buffer capacity in raw samples (clamped to the wire
    /// protocol's slot capacity).
    #[serde(default = "default_capture_slots")]
    pub capture_slots: usize,
}

fn default_carrier_hz() -> u32 {
    36_000
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_frame_timeout_us() -> u64 {
    capture::FRAME_TIMEOUT_US
}

fn default_min_pulse_us() -> u64 {
    capture::MIN_PULSE_US
}

fn default_capture_slots() -> usize {
    MAX_TRAIN_LEN
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            carrier_hz: default_carrier_hz(),
            max_sessions: default_max_sessions(),
            frame_timeout_us: default_frame_timeout_us(),
            min_pulse_us: default_min_pulse_us(),
            capture_slots: default_capture_slots(),
        }
    }
}

/// State shared between sessions, the capture task, and player tasks.
pub(crate) struct Shared {
    pub(crate) registry: SessionRegistry,
    /// The singleton transmit lock. Writers acquire it as an owned guard
    /// and hand that token to the player task, which releases it when
    /// playback finishes.
    pub(crate) tx_gate: Arc<Mutex<()>>,
    /// Raised for the whole lifetime of a playback; the capture task
    /// discards edges while it is set (the transmitter self-triggers the
    /// receiver).
    pub(crate) tx_active: Arc<AtomicBool>,
    pub(crate) carrier: Option<Arc<dyn CarrierOutput>>,
    pub(crate) carrier_hz: u32,
}

/// A running transceiver engine.
///
/// Dropping it aborts the capture task; open session handles keep their
/// shared state alive but will see no further frames.
pub struct Transceiver {
    shared: Arc<Shared>,
    capture_task: Option<JoinHandle<()>>,
}

impl Transceiver {
    /// Start the engine with the supplied capabilities.
    ///
    /// Must be called within a tokio runtime. At least one capability is
    /// required; a receive-only or transmit-only device is fine, a device
    /// with neither is a configuration error.
    ///
    /// # Errors
    ///
    /// [`InitError::NoCapabilities`] when both capabilities are `None`.
    pub fn new(
        config: TransceiverConfig,
        receiver: Option<Box<dyn EdgeSource>>,
        carrier: Option<Arc<dyn CarrierOutput>>,
    ) -> Result<Self, InitError> {
        if receiver.is_none() && carrier.is_none() {
            return Err(InitError::NoCapabilities);
        }

        let shared = Arc::new(Shared {
            registry: SessionRegistry::new(config.max_sessions),
            tx_gate: Arc::new(Mutex::new(())),
            tx_active: Arc::new(AtomicBool::new(false)),
            carrier,
            carrier_hz: config.carrier_hz,
        });

        let capture_task = receiver.map(|source| {
            let state = CaptureState::new(
                config.capture_slots.min(MAX_TRAIN_LEN),
                config.min_pulse_us,
            );
            tokio::spawn(capture::run_capture(
                source,
                state,
                Arc::clone(&shared),
                Duration::from_micros(config.frame_timeout_us),
            ))
        });

        info!(
            rx = capture_task.is_some(),
            tx = shared.carrier.is_some(),
            carrier_hz = shared.carrier_hz,
            "Transceiver started"
        );

        Ok(Self {
            shared,
            capture_task,
        })
    }

    /// Open a new session handle.
    ///
    /// # Errors
    ///
    /// [`TransceiverError::TooManySessions`] at the configured limit.
    pub fn open(&self) -> Result<SessionHandle, TransceiverError> {
        let session = self.shared.registry.open()?;
        Ok(SessionHandle::new(session, Arc::clone(&self.shared)))
    }

    /// Number of currently open sessions.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.shared.registry.len()
    }

    /// Stop the capture task. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
            info!("Capture task stopped");
        }
    }
}

impl Drop for Transceiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rctrx_hal::{MockCarrier, MockReceiver};
    use rctrx_protocol::{FrameEncoder, PulseTrain};
    use std::time::Duration;

    fn rx_only(receiver: &MockReceiver) -> Transceiver {
        Transceiver::new(
            TransceiverConfig::default(),
            Some(Box::new(receiver.claim().unwrap())),
            None,
        )
        .unwrap()
    }

    fn rx_tx(receiver: &MockReceiver) -> (Transceiver, Arc<MockCarrier>) {
        let carrier = Arc::new(MockCarrier::new());
        let trx = Transceiver::new(
            TransceiverConfig::default(),
            Some(Box::new(receiver.claim().unwrap())),
            Some(Arc::clone(&carrier) as _),
        )
        .unwrap();
        (trx, carrier)
    }

    /// Wire bytes (terminator included) for a command of the given durations.
    fn wire(durations: &[u16]) -> Vec<u8> {
        let train = PulseTrain::from_durations(durations.to_vec()).unwrap();
        let mut encoder = FrameEncoder::new(train);
        let mut buf = vec![0u8; durations.len() * 4 + 1];
        encoder.read(&mut buf);
        buf
    }

    #[test]
    fn test_requires_a_capability() {
        // rejected before anything is spawned, so no runtime is needed
        let result = Transceiver::new(TransceiverConfig::default(), None, None);
        assert!(matches!(result, Err(InitError::NoCapabilities)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_to_read_end_to_end() {
        let receiver = MockReceiver::new();
        let trx = rx_only(&receiver);
        let session = trx.open().unwrap();

        // scenario: a 20µs glitch at 1120 rides on an otherwise clean burst
        receiver.feed_burst(&[0, 1000, 1100, 1120, 3000, 3050, 9000]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut buf = [0u8; 64];
        let n = session.try_read(&mut buf).unwrap();
        // merged to [1120, 1880, 50, 5950]: length 4, not 6
        assert_eq!(&buf[..n], b"6004580732003e17\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_read_wakes_on_frame() {
        let receiver = MockReceiver::new();
        let trx = rx_only(&receiver);
        let session = trx.open().unwrap();

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = session.read(&mut buf).await.unwrap();
            buf[..n].to_vec()
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        receiver.feed_burst(&[0, 500, 1500, 2000]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let frame = reader.await.unwrap();
        assert!(frame.ends_with(b"\n"));
        assert_eq!(frame.len(), 3 * 4 + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_isolation() {
        let receiver = MockReceiver::new();
        let trx = rx_only(&receiver);
        let a = trx.open().unwrap();
        let b = trx.open().unwrap();

        receiver.feed_burst(&[0, 500, 1500, 2000]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // draining A leaves B's mailbox and cursor untouched
        let mut buf = [0u8; 64];
        let n = a.try_read(&mut buf).unwrap();
        let from_a = buf[..n].to_vec();
        let n = b.try_read(&mut buf).unwrap();
        assert_eq!(buf[..n].to_vec(), from_a);

        // and A has nothing further pending
        assert_eq!(a.try_read(&mut buf), Err(TransceiverError::WouldBlock));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_triggers_playback_with_guard_gap() {
        let receiver = MockReceiver::new();
        let (trx, carrier) = rx_tx(&receiver);
        let session = trx.open().unwrap();

        let start = tokio::time::Instant::now();
        let command = wire(&[1000]);
        assert_eq!(session.write(&command).await.unwrap(), command.len());
        tokio::time::sleep(Duration::from_millis(100)).await;

        // one mark plus the appended 50ms guard gap
        let log = carrier.log();
        let enables: Vec<u128> = log
            .iter()
            .filter(|c| c.is_enable())
            .map(|c| c.at().duration_since(start).as_micros())
            .collect();
        assert_eq!(enables, vec![0]);
        let last_off = log.last().unwrap();
        assert!(!last_off.is_enable());
        assert_eq!(last_off.at().duration_since(start).as_micros(), 51_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_trailing_gap_replaced_by_guard_gap() {
        let receiver = MockReceiver::new();
        let (trx, carrier) = rx_tx(&receiver);
        let session = trx.open().unwrap();

        let start = tokio::time::Instant::now();
        // mark 1000µs, client gap 10000µs: the gap slot is standardized
        session.write(&wire(&[1000, 10_000])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let last_off = carrier.log().last().copied().unwrap();
        assert_eq!(last_off.at().duration_since(start).as_micros(), 51_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmissions_fully_serialized() {
        let receiver = MockReceiver::new();
        let (trx, carrier) = rx_tx(&receiver);
        let a = trx.open().unwrap();
        let b = trx.open().unwrap();

        let start = tokio::time::Instant::now();
        a.write(&wire(&[1000])).await.unwrap();

        let second = tokio::spawn(async move { b.write(&wire(&[2000])).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        // A's playback (51ms) still owns the transmitter
        assert!(!second.is_finished());

        tokio::time::sleep(Duration::from_millis(120)).await;
        second.await.unwrap().unwrap();

        let enables: Vec<u128> = carrier
            .log()
            .iter()
            .filter(|c| c.is_enable())
            .map(|c| c.at().duration_since(start).as_micros())
            .collect();
        // B's mark starts exactly when A's guard gap ends
        assert_eq!(enables, vec![0, 51_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edges_ignored_while_transmitting() {
        let receiver = MockReceiver::new();
        let (trx, carrier) = rx_tx(&receiver);
        let session = trx.open().unwrap();

        session.write(&wire(&[1000])).await.unwrap();
        // receiver sees the transmitter's own carrier
        receiver.feed_burst(&[0, 500, 1500, 2000]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut buf = [0u8; 64];
        assert_eq!(
            session.try_read(&mut buf),
            Err(TransceiverError::WouldBlock)
        );
        assert!(!carrier.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_while_waiting_for_transmitter() {
        let receiver = MockReceiver::new();
        let (trx, _carrier) = rx_tx(&receiver);
        let a = trx.open().unwrap();
        let b = trx.open().unwrap();

        a.write(&wire(&[60_000])).await.unwrap();

        let b = Arc::new(b);
        let waiter = Arc::clone(&b);
        let second = tokio::spawn(async move { waiter.write(&wire(&[100])).await });
        tokio::time::sleep(Duration::from_millis(5)).await;

        b.interrupt();
        assert_eq!(
            second.await.unwrap(),
            Err(TransceiverError::Interrupted)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_without_transmitter_fails() {
        let receiver = MockReceiver::new();
        let trx = rx_only(&receiver);
        let session = trx.open().unwrap();

        assert_eq!(
            session.write(&wire(&[1000])).await,
            Err(TransceiverError::TransmitterNotConfigured)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_partial_success() {
        let receiver = MockReceiver::new();
        let (trx, carrier) = rx_tx(&receiver);
        let session = trx.open().unwrap();

        // 256 slots at 4 nibbles each; two extra bytes overflow
        let data = vec![b'1'; MAX_TRAIN_LEN * 4 + 2];
        assert_eq!(
            session.write(&data).await.unwrap(),
            MAX_TRAIN_LEN * 4
        );
        // nothing new accepted in a fresh call
        assert_eq!(
            session.write(b"2").await,
            Err(TransceiverError::CommandTooLong)
        );
        // the accumulated command still transmits on a terminator
        assert_eq!(session.write(b"\n").await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!carrier.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_limit_and_reuse() {
        let receiver = MockReceiver::new();
        let trx = Transceiver::new(
            TransceiverConfig {
                max_sessions: 2,
                ..TransceiverConfig::default()
            },
            Some(Box::new(receiver.claim().unwrap())),
            None,
        )
        .unwrap();

        let a = trx.open().unwrap();
        let _b = trx.open().unwrap();
        assert_eq!(
            trx.open().unwrap_err(),
            TransceiverError::TooManySessions(2)
        );

        drop(a);
        assert_eq!(trx.open_sessions(), 1);
        assert!(trx.open().is_ok());
    }
}
