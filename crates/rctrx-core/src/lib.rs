//! # rctrx-core
//!
//! The signal-timing engine for the rctrx remote-control transceiver.
//!
//! This crate turns raw receiver-line transitions into finished pulse
//! frames, fans them out to client sessions, and plays transmit commands
//! back through a carrier output:
//!
//! ```text
//! ┌────────────┐    ┌───────────────┐    ┌─────────────┐    ┌─────────┐
//! │ EdgeSource │───▶│ capture task  │───▶│ broadcaster │───▶│ session │
//! └────────────┘    │ (filter +     │    └─────────────┘    │ mailbox │
//!                   │  finalize)    │                       └────┬────┘
//!                   └───────────────┘                            ▼
//!                                                            client read
//!
//! client write ──▶ CommandDecoder ──▶ player task ──▶ CarrierOutput
//! ```
//!
//! All timing-sensitive state is owned by exactly one task: the capture
//! task owns the capture buffer (edge handling and timeout finalization are
//! two arms of one `select!` loop, so they can never run concurrently), and
//! each playback run owns its own train. The singleton transmit lock is a
//! `tokio` owned mutex guard handed from the writing session to the player
//! task, which releases it when playback finishes.

pub mod capture;
pub mod error;
pub mod session;
pub mod transceiver;

mod broadcast;
mod player;
mod registry;

pub use error::{InitError, TransceiverError};
pub use registry::DEFAULT_MAX_SESSIONS;
pub use session::{SessionHandle, SessionId};
pub use transceiver::{Transceiver, TransceiverConfig};
