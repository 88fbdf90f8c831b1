//! # rctrx-hal
//!
//! Hardware capability traits consumed by the rctrx signal engine.
//!
//! The engine never touches registers or GPIO lines itself; it is written
//! against two narrow capabilities:
//!
//! - [`EdgeSource`] - delivers timestamped rising/falling transitions from
//!   the receiver line
//! - [`CarrierOutput`] - switches a square-wave carrier on and off at a
//!   programmed frequency
//!
//! The [`mock`] module provides in-memory implementations used by the test
//! suites and by the server's loopback-style backends.

pub mod mock;
pub mod traits;

pub use mock::{CarrierChange, MockCarrier, MockEdgeSource, MockReceiver};
pub use traits::{CarrierOutput, EdgeEvent, EdgeSource, HalError, LineLevel};
