//! # rctrx-protocol
//!
//! Wire protocol for the rctrx remote-control pulse transceiver.
//!
//! This crate defines the text-hex byte protocol spoken on every session
//! handle, independent of any hardware or runtime:
//!
//! - [`PulseTrain`] - an ordered sequence of mark/gap durations (µs)
//! - [`FrameEncoder`] - streams a captured train as hex characters (read path)
//! - [`CommandDecoder`] - accumulates hex characters into a train to
//!   transmit (write path)
//!
//! Each 16-bit duration is emitted as four hex characters in a fixed nibble
//! permutation (bits 4-7, 0-3, 12-15, 8-11). The ordering is part of the
//! wire format and must not change.
//!
//! ## Example
//!
//! ```rust
//! use rctrx_protocol::{CommandDecoder, DecodeStep, FrameEncoder, PulseTrain};
//!
//! let mut decoder = CommandDecoder::new();
//! for &b in b"1a2b" {
//!     assert!(matches!(decoder.push(b), DecodeStep::Consumed));
//! }
//! let DecodeStep::Dispatch(train) = decoder.push(b'\n') else {
//!     panic!("terminator should dispatch");
//! };
//! // decoded value plus the appended guard gap
//! assert_eq!(train.durations(), &[0x2b1a, rctrx_protocol::GUARD_GAP_US]);
//!
//! let mut encoder = FrameEncoder::new(train);
//! let mut out = [0u8; 16];
//! let n = encoder.read(&mut out);
//! assert_eq!(&out[..n], b"1a2b50c3\n");
//! ```

pub mod codec;
pub mod train;

pub use codec::{CommandDecoder, DecodeStep, FrameEncoder};
pub use train::{PulseTrain, TrainError, GUARD_GAP_US, MAX_TRAIN_LEN};
