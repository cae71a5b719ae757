//! # HDLC Framing Module
//!
//! Byte-stuffed, checksummed framing for unreliable byte streams.
//!
//! This module handles:
//! - Marker/escape byte stuffing (`0x7E` / `0x7D`, XOR `0x20`)
//! - CRC-16/CCITT and CRC-32 frame check sequences
//! - Byte-at-a-time frame reception with self-healing resynchronization

pub mod protocol;
pub mod crc;
pub mod framer;
