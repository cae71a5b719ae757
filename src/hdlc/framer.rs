//! # HDLC Framer
//!
//! Byte-stuffing encoder and single-frame receive state machine.
//!
//! The framer owns one [`ByteIo`] and two CRC registers (transmit and
//! receive). Transmission is streamed straight to the I/O, one stuffed byte
//! at a time. Reception consumes at most one byte per [`Framer::receive`]
//! call and never blocks.
//!
//! ## Receive capacity
//!
//! At most `CAP` logical bytes are stored. Bytes past the capacity are still
//! folded into the CRC and counted, so an oversized frame completes with its
//! true length while only the first `CAP` bytes can be copied out.
//!
//! ## Pending frames
//!
//! Only one completed frame is held. The byte after a completion resets the
//! receiver, so a frame that is not copied out before the next frame
//! completes is lost.
//!
//! ```
//! use uart_link::hdlc::crc::Crc16Ccitt;
//! use uart_link::hdlc::framer::Framer;
//! use uart_link::serial::byte_io::BufferedIo;
//!
//! let mut tx: Framer<Crc16Ccitt, BufferedIo, 32> = Framer::new(BufferedIo::new());
//! tx.transmit_block(b"ping");
//! let wire = tx.io_mut().take_output();
//!
//! let mut rx: Framer<Crc16Ccitt, BufferedIo, 32> = Framer::new(BufferedIo::new());
//! rx.io_mut().feed(&wire);
//! let mut len = 0;
//! while rx.io().pending() > 0 {
//!     len = rx.receive();
//! }
//! assert_eq!(len, 4);
//! assert_eq!(rx.received_message(), b"ping");
//! ```

use tracing::trace;

use super::crc::Crc;
use super::protocol::{needs_escape, RxState, ESCAPE, ESCAPE_XOR, MARKER};
use crate::serial::byte_io::ByteIo;

/// Framer over CRC policy `C`, I/O `IO` and receive capacity `CAP`
pub struct Framer<C: Crc, IO: ByteIo, const CAP: usize> {
    io: IO,
    tx_crc: C,
    rx_crc: C,
    state: RxState,
    /// Logical length of the frame being received. May exceed `CAP`.
    len: usize,
    data: [u8; CAP],
}

impl<C: Crc, IO: ByteIo, const CAP: usize> std::fmt::Debug for Framer<C, IO, CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framer")
            .field("state", &self.state)
            .field("len", &self.len)
            .field("capacity", &CAP)
            .finish_non_exhaustive()
    }
}

impl<C: Crc, IO: ByteIo, const CAP: usize> Framer<C, IO, CAP> {
    /// Receive buffer capacity
    pub const RX_BUFFER_LEN: usize = CAP;

    /// Create a framer over `io` with an idle receiver
    pub fn new(io: IO) -> Self {
        Self {
            io,
            tx_crc: C::default(),
            rx_crc: C::default(),
            state: RxState::Receiving,
            len: 0,
            data: [0u8; CAP],
        }
    }

    /// Reset the receiver, discarding any partial or completed frame
    pub fn init(&mut self) {
        self.len = 0;
        self.state = RxState::Receiving;
        self.rx_crc.init();
    }

    /// Open a frame: emit the marker and reset the transmit CRC
    pub fn transmit_start(&mut self) {
        self.io.write_byte(MARKER);
        self.tx_crc.init();
    }

    /// Stuff and emit one payload byte
    pub fn transmit_byte(&mut self, byte: u8) {
        self.write_escaped(byte);
        self.tx_crc.update(byte);
    }

    /// Stuff and emit several payload bytes into the open frame
    pub fn transmit_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.transmit_byte(byte);
        }
    }

    /// Close the frame: emit the CRC trailer (low byte first) and the marker
    pub fn transmit_end(&mut self) {
        self.tx_crc.finalize();
        for i in 0..C::SIZE {
            let byte = self.tx_crc.byte_at(i);
            self.write_escaped(byte);
        }
        self.io.write_byte(MARKER);
    }

    /// Emit `data` as one complete frame
    pub fn transmit_block(&mut self, data: &[u8]) {
        self.transmit_start();
        self.transmit_bytes(data);
        self.transmit_end();
    }

    fn write_escaped(&mut self, byte: u8) {
        if needs_escape(byte) {
            self.io.write_byte(ESCAPE);
            self.io.write_byte(byte ^ ESCAPE_XOR);
        } else {
            self.io.write_byte(byte);
        }
    }

    /// Consume at most one input byte
    ///
    /// # Returns
    ///
    /// * `usize` - Payload length (trailer excluded) when this byte completed
    ///   a good frame, 0 otherwise
    ///
    /// A completed empty frame also returns 0; check [`Framer::state`] for
    /// `FrameOk` to tell it apart from "nothing yet".
    pub fn receive(&mut self) -> usize {
        let Some(byte) = self.io.read_byte() else {
            return 0;
        };

        if self.state.is_terminal() {
            self.init();
        }

        match byte {
            MARKER => self.close_frame(),
            ESCAPE => {
                self.state = RxState::Escaped;
                0
            }
            _ => {
                let byte = if self.state == RxState::Escaped {
                    self.state = RxState::Receiving;
                    byte ^ ESCAPE_XOR
                } else {
                    byte
                };
                self.store(byte);
                0
            }
        }
    }

    fn close_frame(&mut self) -> usize {
        if self.state != RxState::Receiving || self.len == 0 {
            // Opening marker, back-to-back markers, or an aborted escape
            self.init();
            return 0;
        }

        if self.len >= C::SIZE && self.rx_crc.is_good() {
            self.len -= C::SIZE;
            self.state = RxState::FrameOk;
            self.len
        } else {
            trace!("Discarding frame with bad CRC ({} bytes)", self.len);
            self.state = RxState::CrcError;
            0
        }
    }

    fn store(&mut self, byte: u8) {
        self.rx_crc.update(byte);
        if self.len < CAP {
            self.data[self.len] = byte;
        }
        self.len = self.len.saturating_add(1);
    }

    /// Current receiver state
    pub fn state(&self) -> RxState {
        self.state
    }

    /// Logical length of the completed frame, 0 unless `FrameOk`
    pub fn received_len(&self) -> usize {
        match self.state {
            RxState::FrameOk => self.len,
            _ => 0,
        }
    }

    /// Stored bytes of the completed frame, clamped to the capacity
    pub fn received_message(&self) -> &[u8] {
        let stored = self.received_len().min(CAP);
        &self.data[..stored]
    }

    /// Copy the completed frame into `buf` and reset the receiver
    ///
    /// # Returns
    ///
    /// * `usize` - Bytes copied, at most `min(buf.len(), CAP)`
    pub fn copy_received_message(&mut self, buf: &mut [u8]) -> usize {
        self.copy_received_range(buf, 0, true)
    }

    /// Copy the completed frame starting at offset `pos` into `buf`
    ///
    /// # Arguments
    ///
    /// * `buf` - Destination, its length is the maximum number of bytes copied
    /// * `pos` - Offset into the frame
    /// * `reinit` - Reset the receiver afterwards, marking the frame consumed
    pub fn copy_received_range(&mut self, buf: &mut [u8], pos: usize, reinit: bool) -> usize {
        let available = self.received_message().get(pos..).unwrap_or(&[]);
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);

        if reinit {
            self.init();
        }

        count
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_io(self) -> IO {
        self.io
    }
}
