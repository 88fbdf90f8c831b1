//! Edge capture and frame finalization.
//!
//! The receiver line delivers one event per transition. Events accumulate
//! as cumulative-since-first-edge timestamps; a silence longer than the
//! frame timeout closes the frame, at which point the buffer is converted
//! to consecutive durations and handed to the broadcaster.
//!
//! Both halves run inside one task ([`run_capture`]), so the edge handler
//! and the timeout finalizer are serialized by construction and the state
//! needs no locking.

use crate::broadcast;
use crate::transceiver::Shared;
use rctrx_hal::{EdgeSource, LineLevel};
use rctrx_protocol::PulseTrain;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Silence that closes a frame, in microseconds.
pub const FRAME_TIMEOUT_US: u64 = 10_000;

/// Intervals shorter than this are glitches to merge away, in microseconds.
pub const MIN_PULSE_US: u64 = 50;

/// Frames with this many raw samples or fewer are discarded as noise
/// (3 = mark + gap + mark, the shortest meaningful signal).
pub const MIN_RAW_SAMPLES: usize = 3;

/// What the capture buffer did with an edge event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Sample stored; the finalize timeout must be re-armed.
    Appended,
    /// Glitch coalesced into the previous boundary; timeout untouched.
    Merged,
    /// Event ignored (buffer full or non-alternating level).
    Discarded,
    /// Glitch at the very start of a capture; the whole capture restarts.
    Reset,
}

/// The in-progress capture buffer.
///
/// Owned exclusively by the capture task. Samples are microseconds since
/// the first accepted edge; even positions were entered on a low level,
/// odd positions on a high level.
#[derive(Debug)]
pub struct CaptureState {
    samples: Vec<u64>,
    start_us: u64,
    capacity: usize,
    min_pulse_us: u64,
}

impl CaptureState {
    /// Empty capture buffer with the given slot capacity.
    #[must_use]
    pub fn new(capacity: usize, min_pulse_us: u64) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            start_us: 0,
            capacity,
            min_pulse_us,
        }
    }

    /// Number of raw samples currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no capture is in progress.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Process one line transition.
    ///
    /// `now_us` is the transition's monotonic timestamp; `level` is the
    /// line level the source sampled at interrupt time. A level that does
    /// not alternate with the buffered position is a duplicate or glitch
    /// interrupt and is discarded without touching state.
    pub fn on_edge(&mut self, now_us: u64, level: LineLevel) -> EdgeOutcome {
        let pos = self.samples.len();
        if pos >= self.capacity {
            return EdgeOutcome::Discarded;
        }

        let expected = if pos % 2 == 0 {
            LineLevel::Low
        } else {
            LineLevel::High
        };
        if level != expected {
            trace!(pos, ?level, "Non-alternating edge discarded");
            return EdgeOutcome::Discarded;
        }

        if pos == 0 {
            self.start_us = now_us;
        }
        let since_first = now_us.saturating_sub(self.start_us);

        if pos > 0 && since_first < self.samples[pos - 1].saturating_add(self.min_pulse_us) {
            // Too close to the previous boundary: three crossings collapse
            // into one, so the entry two positions back absorbs this one.
            if pos >= 2 {
                self.samples.pop();
                if let Some(last) = self.samples.last_mut() {
                    *last = since_first;
                }
                trace!(pos, since_first, "Glitch merged");
                EdgeOutcome::Merged
            } else {
                self.samples.clear();
                trace!("Glitch at frame start, capture reset");
                EdgeOutcome::Reset
            }
        } else {
            self.samples.push(since_first);
            EdgeOutcome::Appended
        }
    }

    /// Close the frame after a silence timeout.
    ///
    /// Converts cumulative timestamps to consecutive durations (dropping
    /// the trailing boundary sample) and clears the buffer. Returns `None`
    /// when the capture was too short to be a signal.
    pub fn finalize(&mut self) -> Option<PulseTrain> {
        let raw = self.samples.len();
        let train = if raw > MIN_RAW_SAMPLES {
            let durations = self
                .samples
                .windows(2)
                .map(|pair| u16::try_from(pair[1] - pair[0]).unwrap_or(u16::MAX))
                .collect();
            PulseTrain::from_durations(durations).ok()
        } else {
            if raw > 0 {
                trace!(raw, "Short capture discarded");
            }
            None
        };
        self.samples.clear();
        self.start_us = 0;
        train
    }
}

/// Drive a [`CaptureState`] from an edge source until the source closes.
///
/// Edges arriving while a transmission is active are ignored - the
/// transmitter would trigger the receiver otherwise.
pub(crate) async fn run_capture(
    mut source: Box<dyn EdgeSource>,
    mut state: CaptureState,
    shared: Arc<Shared>,
    timeout: Duration,
) {
    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            event = source.next_edge() => {
                let Some(event) = event else {
                    debug!("Edge source closed, capture task stopping");
                    return;
                };
                if shared.tx_active.load(Ordering::Acquire) {
                    trace!("Edge ignored during transmission");
                    continue;
                }
                if state.on_edge(event.timestamp_us, event.level) == EdgeOutcome::Appended {
                    deadline = Some(Instant::now() + timeout);
                }
            }
            () = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                deadline = None;
                if let Some(train) = state.finalize() {
                    let delivered = broadcast::deliver(&shared.registry, &train).await;
                    debug!(slots = train.len(), delivered, "Frame finalized");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed cumulative timestamps with proper level alternation.
    fn feed(state: &mut CaptureState, timestamps: &[u64]) {
        let mut level = LineLevel::Low;
        for &t in timestamps {
            state.on_edge(t, level);
            level = level.toggled();
        }
    }

    #[test]
    fn test_clean_capture() {
        let mut state = CaptureState::new(8, MIN_PULSE_US);
        feed(&mut state, &[0, 1000, 1100, 3000, 9000]);
        let train = state.finalize().expect("frame accepted");
        assert_eq!(train.durations(), &[1000, 100, 1900, 6000]);
        assert!(state.is_empty());
    }

    #[test]
    fn test_noise_edge_merged_away() {
        // The 1120 edge is 20µs after 1100: below the filter, merged into
        // the boundary two positions back. Final length 4, not 6.
        let mut state = CaptureState::new(8, MIN_PULSE_US);
        assert_eq!(state.on_edge(0, LineLevel::Low), EdgeOutcome::Appended);
        assert_eq!(state.on_edge(1000, LineLevel::High), EdgeOutcome::Appended);
        assert_eq!(state.on_edge(1100, LineLevel::Low), EdgeOutcome::Appended);
        assert_eq!(state.on_edge(1120, LineLevel::High), EdgeOutcome::Merged);
        assert_eq!(state.on_edge(3000, LineLevel::Low), EdgeOutcome::Appended);
        assert_eq!(state.on_edge(3050, LineLevel::High), EdgeOutcome::Appended);
        assert_eq!(state.on_edge(9000, LineLevel::Low), EdgeOutcome::Appended);

        let train = state.finalize().expect("frame accepted");
        assert_eq!(train.len(), 4);
        assert_eq!(train.durations(), &[1120, 1880, 50, 5950]);
        // no interval below the filter remains
        assert!(train.durations().iter().all(|&d| u64::from(d) >= MIN_PULSE_US));
    }

    #[test]
    fn test_glitch_at_start_resets_capture() {
        let mut state = CaptureState::new(8, MIN_PULSE_US);
        assert_eq!(state.on_edge(0, LineLevel::Low), EdgeOutcome::Appended);
        assert_eq!(state.on_edge(20, LineLevel::High), EdgeOutcome::Reset);
        assert!(state.is_empty());
        assert!(state.finalize().is_none());
    }

    #[test]
    fn test_short_captures_discarded() {
        for count in 1..=MIN_RAW_SAMPLES {
            let mut state = CaptureState::new(8, MIN_PULSE_US);
            let timestamps: Vec<u64> = (0..count as u64).map(|i| i * 1000).collect();
            feed(&mut state, &timestamps);
            assert_eq!(state.len(), count);
            assert!(state.finalize().is_none(), "{count} raw samples");
        }
    }

    #[test]
    fn test_four_samples_accepted_with_length_three() {
        let mut state = CaptureState::new(8, MIN_PULSE_US);
        feed(&mut state, &[0, 500, 1500, 2000]);
        let train = state.finalize().expect("frame accepted");
        assert_eq!(train.durations(), &[500, 1000, 500]);
    }

    #[test]
    fn test_non_alternating_level_discarded() {
        let mut state = CaptureState::new(8, MIN_PULSE_US);
        // first edge must observe low
        assert_eq!(state.on_edge(0, LineLevel::High), EdgeOutcome::Discarded);
        assert!(state.is_empty());

        assert_eq!(state.on_edge(0, LineLevel::Low), EdgeOutcome::Appended);
        // duplicate interrupt on the same level
        assert_eq!(state.on_edge(400, LineLevel::Low), EdgeOutcome::Discarded);
        assert_eq!(state.len(), 1);
        assert_eq!(state.on_edge(500, LineLevel::High), EdgeOutcome::Appended);
    }

    #[test]
    fn test_buffer_full_discards() {
        let mut state = CaptureState::new(4, MIN_PULSE_US);
        feed(&mut state, &[0, 1000, 2000, 3000]);
        assert_eq!(state.on_edge(4000, LineLevel::Low), EdgeOutcome::Discarded);
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn test_long_interval_saturates() {
        let mut state = CaptureState::new(8, MIN_PULSE_US);
        feed(&mut state, &[0, 500, 200_000, 200_500]);
        let train = state.finalize().expect("frame accepted");
        assert_eq!(train.durations(), &[500, u16::MAX, 500]);
    }
}
