//! # Transport Module
//!
//! Two alternative link policies built on one [`Framer`](crate::hdlc::framer::Framer):
//!
//! - [`arq`]: point-to-point stop-and-wait with sequence numbers, ACK and
//!   automatic link reset
//! - [`token_bus`]: multi-drop addressing with token-passing arbitration

pub mod arq;
pub mod token_bus;

pub use arq::ArqTransport;
pub use token_bus::{TokenBus, TokenState};
