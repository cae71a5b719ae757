//! # UART Link Library
//!
//! Reliable message framing for byte-oriented serial links.
//!
//! This library provides an HDLC-style framer with a CRC trailer, and two
//! transports layered on top of it: a point-to-point ARQ link with
//! acknowledgements and link reset, and a multi-drop token bus.

pub mod config;
pub mod error;
pub mod hdlc;
pub mod transport;
pub mod serial;
pub mod capture;
