//! Byte-at-a-time I/O primitive consumed by the protocol core

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// Non-blocking single-byte source and sink
///
/// This is the only boundary the framer touches. `read_byte` must return
/// `None` immediately when nothing is pending; `write_byte` must not block
/// on the protocol's behalf (any buffering belongs to the implementation).
#[cfg_attr(test, mockall::automock)]
pub trait ByteIo {
    /// Next received byte, or `None` if nothing is pending
    fn read_byte(&mut self) -> Option<u8>;

    /// Emit one byte
    fn write_byte(&mut self, byte: u8);
}

impl<T: ByteIo + ?Sized> ByteIo for &mut T {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }
}

/// In-memory [`ByteIo`] with a receive queue and a transmit buffer
///
/// Used to bridge the synchronous protocol core to an async serial port,
/// and to wire stations together in tests.
#[derive(Debug, Default)]
pub struct BufferedIo {
    rx: VecDeque<u8>,
    tx: BytesMut,
}

impl BufferedIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue received bytes for `read_byte`
    pub fn feed(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    /// Number of received bytes not yet consumed
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Bytes written since the last call, leaving the transmit buffer empty
    pub fn take_output(&mut self) -> Bytes {
        self.tx.split().freeze()
    }

    /// Bytes written and not yet taken
    pub fn output(&self) -> &[u8] {
        &self.tx
    }
}

impl ByteIo for BufferedIo {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.extend_from_slice(&[byte]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_in_order_then_none() {
        let mut io = BufferedIo::new();
        io.feed(&[1, 2]);
        io.feed(&[3]);

        assert_eq!(io.pending(), 3);
        assert_eq!(io.read_byte(), Some(1));
        assert_eq!(io.read_byte(), Some(2));
        assert_eq!(io.read_byte(), Some(3));
        assert_eq!(io.read_byte(), None);
        assert_eq!(io.pending(), 0);
    }

    #[test]
    fn test_take_output_drains() {
        let mut io = BufferedIo::new();
        io.write_byte(0x7E);
        io.write_byte(0x00);

        assert_eq!(io.output(), &[0x7E, 0x00]);
        assert_eq!(&io.take_output()[..], &[0x7E, 0x00]);
        assert!(io.output().is_empty());
        assert!(io.take_output().is_empty());
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut io = BufferedIo::new();
        io.feed(&[9]);
        {
            let mut by_ref = &mut io;
            assert_eq!(by_ref.read_byte(), Some(9));
            by_ref.write_byte(5);
        }
        assert_eq!(io.output(), &[5]);
    }
}
