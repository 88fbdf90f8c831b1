//! Client sessions.
//!
//! Each open handle owns one [`Session`]: a single-slot inbound mailbox for
//! captured frames (read path) and a command decoder for transmit input
//! (write path). The broadcaster is the only writer of a mailbox and the
//! owning handle the only consumer, so a plain async mutex per side is all
//! the synchronization a session needs.

use crate::error::TransceiverError;
use crate::player;
use crate::transceiver::Shared;
use rctrx_protocol::{CommandDecoder, DecodeStep, FrameEncoder, PulseTrain};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace};

/// Stable identifier of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub(crate) u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Per-session state shared between the broadcaster and the owning handle.
#[derive(Debug)]
pub(crate) struct Session {
    id: SessionId,
    /// Single-slot mailbox: `Some` while a frame is pending, with the
    /// encoder carrying the read cursor through partial reads.
    mailbox: Mutex<Option<FrameEncoder>>,
    /// Signalled by the broadcaster when the mailbox fills.
    frame_ready: Notify,
    /// Signalled by `interrupt()`; wakes this session's blocked calls.
    interrupted: Notify,
    /// Transmit scratch state, owned by the write path.
    decoder: Mutex<CommandDecoder>,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            id,
            mailbox: Mutex::new(None),
            frame_ready: Notify::new(),
            interrupted: Notify::new(),
            decoder: Mutex::new(CommandDecoder::new()),
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    /// Offer a finished frame to this session.
    ///
    /// A session still holding an unread frame is skipped; the new frame is
    /// simply dropped for it. Single-slot mailboxes are the whole
    /// backpressure policy.
    pub(crate) async fn offer(&self, train: &PulseTrain) -> bool {
        let mut mailbox = self.mailbox.lock().await;
        if mailbox.is_some() {
            trace!(session = %self.id, "Mailbox full, frame dropped");
            return false;
        }
        *mailbox = Some(FrameEncoder::new(train.clone()));
        drop(mailbox);
        self.frame_ready.notify_one();
        true
    }

    /// Blocking read of the pending frame's next encoded bytes.
    pub(crate) async fn read(&self, buf: &mut [u8]) -> Result<usize, TransceiverError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            {
                let mut mailbox = self.mailbox.lock().await;
                if let Some(encoder) = mailbox.as_mut() {
                    let n = encoder.read(buf);
                    if encoder.is_done() {
                        *mailbox = None;
                    }
                    return Ok(n);
                }
            }
            tokio::select! {
                () = self.frame_ready.notified() => {}
                () = self.interrupted.notified() => {
                    return Err(TransceiverError::Interrupted);
                }
            }
        }
    }

    /// Non-blocking read; reports would-block instead of suspending.
    pub(crate) fn try_read(&self, buf: &mut [u8]) -> Result<usize, TransceiverError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut mailbox = self
            .mailbox
            .try_lock()
            .map_err(|_| TransceiverError::WouldBlock)?;
        match mailbox.as_mut() {
            Some(encoder) => {
                let n = encoder.read(buf);
                if encoder.is_done() {
                    *mailbox = None;
                }
                Ok(n)
            }
            None => Err(TransceiverError::WouldBlock),
        }
    }

    /// Wake this session's blocked calls with [`TransceiverError::Interrupted`].
    pub(crate) fn interrupt(&self) {
        self.interrupted.notify_waiters();
    }
}

/// An open client handle onto the transceiver.
///
/// Speaks the text-hex protocol: `read` produces captured frames as hex
/// durations terminated by `\n`, `write` accepts hex durations terminated
/// by `\r` or `\n` and triggers transmission at the terminator. Dropping
/// the handle closes the session.
pub struct SessionHandle {
    session: Arc<Session>,
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub(crate) fn new(session: Arc<Session>, shared: Arc<Shared>) -> Self {
        Self { session, shared }
    }

    /// This session's stable id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    /// Read the next encoded bytes of a captured frame, waiting for one if
    /// none is pending.
    ///
    /// Standard partial-read semantics: any count up to `buf.len()` may be
    /// returned. The frame ends with a single `\n`, after which the next
    /// read waits for (or returns) the next captured frame.
    ///
    /// # Errors
    ///
    /// [`TransceiverError::Interrupted`] if [`interrupt`](Self::interrupt)
    /// is called while waiting; the caller may simply retry.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, TransceiverError> {
        self.session.read(buf).await
    }

    /// Like [`read`](Self::read) but never suspends.
    ///
    /// # Errors
    ///
    /// [`TransceiverError::WouldBlock`] when no frame is pending.
    pub fn try_read(&self, buf: &mut [u8]) -> Result<usize, TransceiverError> {
        self.session.try_read(buf)
    }

    /// Feed bytes of a transmit command.
    ///
    /// Hex characters accumulate durations; a `\r` or `\n` with at least
    /// one complete value queues the command (guard gap appended) for
    /// playback and blocks until the transmitter is free to take it. An
    /// empty line just resets the accumulator.
    ///
    /// # Errors
    ///
    /// - [`TransceiverError::CommandTooLong`] when the command exceeds the
    ///   slot capacity before its terminator and nothing in this call was
    ///   accepted yet; otherwise the accepted count is returned instead
    /// - [`TransceiverError::Interrupted`] while waiting for the
    ///   transmitter
    /// - [`TransceiverError::TransmitterNotConfigured`] when dispatching
    ///   without a carrier output
    pub async fn write(&self, data: &[u8]) -> Result<usize, TransceiverError> {
        let mut decoder = self.session.decoder.lock().await;
        let mut accepted = 0usize;
        for &byte in data {
            match decoder.push(byte) {
                DecodeStep::Consumed => accepted += 1,
                DecodeStep::Dispatch(train) => {
                    accepted += 1;
                    self.start_transmission(train).await?;
                }
                DecodeStep::Overflow => {
                    debug!(session = %self.session.id, accepted, "Command overflow");
                    return if accepted > 0 {
                        Ok(accepted)
                    } else {
                        Err(TransceiverError::CommandTooLong)
                    };
                }
            }
        }
        Ok(accepted)
    }

    /// Wake this session's blocked read or write with
    /// [`TransceiverError::Interrupted`].
    pub fn interrupt(&self) {
        self.session.interrupt();
    }

    /// Acquire the transmit token and hand the train to a player task.
    ///
    /// The token is released by the player when playback finishes, not
    /// here: acquisition and release deliberately happen on different
    /// tasks, which is why it is an owned guard rather than a scoped lock.
    async fn start_transmission(&self, train: PulseTrain) -> Result<(), TransceiverError> {
        let carrier = self
            .shared
            .carrier
            .clone()
            .ok_or(TransceiverError::TransmitterNotConfigured)?;

        let token = tokio::select! {
            token = Arc::clone(&self.shared.tx_gate).lock_owned() => token,
            () = self.session.interrupted.notified() => {
                return Err(TransceiverError::Interrupted);
            }
        };

        self.shared.tx_active.store(true, Ordering::Release);
        debug!(session = %self.session.id, slots = train.len(), "Transmission started");
        tokio::spawn(player::play(
            train,
            token,
            carrier,
            Arc::clone(&self.shared.tx_active),
            self.shared.carrier_hz,
        ));
        Ok(())
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.session.id())
            .finish_non_exhaustive()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shared.registry.remove(self.session.id());
    }
}
