//! # Stop-and-Wait ARQ Transport
//!
//! Sequenced transport over a [`Framer`] with a one-byte control header.
//!
//! ## Header
//!
//! ```text
//!  7 6 5 4 3 2 1 0
//! +---+-----------+
//! |c c|s s s s s s|
//! +---+-----------+
//! ```
//!
//! | `cc` | Frame |
//! |------|-------|
//! | `00` | RESET |
//! | `01` | ACK   |
//! | `10` | NACK  |
//! | `11` | DATA  |
//!
//! The sequence counter advances once per DATA frame and wraps after
//! `seq_max`. Every received DATA frame is acknowledged immediately with an
//! ACK carrying the peer's sequence number. Each `transmit_start` counts as
//! unacknowledged until an ACK arrives; once `no_ack_limit` frames are
//! outstanding the next `transmit_start` resets the link first.
//!
//! Duplicate suppression is left to the caller, see
//! [`ArqTransport::last_received_sequence`].

use tracing::{debug, trace};

use crate::hdlc::crc::Crc;
use crate::hdlc::framer::Framer;
use crate::hdlc::protocol::RxState;
use crate::serial::byte_io::ByteIo;

/// Control header length
pub const HEADER_LEN: usize = 1;

/// Largest sequence number the 6-bit field can carry
pub const SEQ_FIELD_MAX: u8 = 0x3F;

/// Default sequence wrap point
pub const DEFAULT_SEQ_MAX: u8 = 63;

/// Default number of unacknowledged frames before a link reset
pub const DEFAULT_NO_ACK_LIMIT: u8 = 5;

const KIND_MASK: u8 = 0xC0;

/// Frame type carried in the top two header bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Reset,
    Ack,
    Nack,
    Data,
}

impl FrameKind {
    /// Header bits for this frame type
    pub const fn bits(self) -> u8 {
        match self {
            FrameKind::Reset => 0x00,
            FrameKind::Ack => 0x40,
            FrameKind::Nack => 0x80,
            FrameKind::Data => 0xC0,
        }
    }

    /// Frame type of a header byte
    pub const fn from_header(header: u8) -> Self {
        match header & KIND_MASK {
            0x00 => FrameKind::Reset,
            0x40 => FrameKind::Ack,
            0x80 => FrameKind::Nack,
            _ => FrameKind::Data,
        }
    }
}

/// Build a header byte
pub const fn header(kind: FrameKind, seq: u8) -> u8 {
    kind.bits() | (seq & SEQ_FIELD_MAX)
}

/// Stop-and-wait transport over a framer of capacity `CAP`
///
/// The caller sees `CAP - 1` bytes of payload per frame.
pub struct ArqTransport<C: Crc, IO: ByteIo, const CAP: usize> {
    framer: Framer<C, IO, CAP>,
    seq_max: u8,
    no_ack_limit: u8,
    seq: u8,
    no_ack: u8,
    last_rx_seq: Option<u8>,
}

impl<C: Crc, IO: ByteIo, const CAP: usize> std::fmt::Debug for ArqTransport<C, IO, CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArqTransport")
            .field("seq", &self.seq)
            .field("no_ack", &self.no_ack)
            .field("seq_max", &self.seq_max)
            .field("no_ack_limit", &self.no_ack_limit)
            .finish_non_exhaustive()
    }
}

impl<C: Crc, IO: ByteIo, const CAP: usize> ArqTransport<C, IO, CAP> {
    /// Payload capacity seen by the caller
    pub const RX_BUFFER_LEN: usize = CAP - HEADER_LEN;

    /// Create a transport with the default sequence range and no-ack limit
    pub fn new(io: IO) -> Self {
        Self::with_limits(io, DEFAULT_SEQ_MAX, DEFAULT_NO_ACK_LIMIT)
    }

    /// Create a transport with explicit limits
    ///
    /// # Arguments
    ///
    /// * `io` - Byte source and sink
    /// * `seq_max` - Sequence wrap point, clamped to 63
    /// * `no_ack_limit` - Unacknowledged frames tolerated before a reset
    pub fn with_limits(io: IO, seq_max: u8, no_ack_limit: u8) -> Self {
        const { assert!(CAP > HEADER_LEN, "ARQ frame capacity must exceed the header") };

        let seq_max = seq_max.min(SEQ_FIELD_MAX);
        Self {
            framer: Framer::new(io),
            seq_max,
            no_ack_limit,
            seq: seq_max,
            no_ack: 0,
            last_rx_seq: None,
        }
    }

    /// Reset the receiver and the sequence/no-ack counters
    pub fn init(&mut self) {
        self.framer.init();
        self.seq = self.seq_max;
        self.no_ack = 0;
        self.last_rx_seq = None;
    }

    /// Reinitialize and send a RESET frame
    pub fn transmit_reset(&mut self) {
        self.init();
        self.framer.transmit_block(&[header(FrameKind::Reset, 0)]);
    }

    /// Reject frame `seq`
    pub fn transmit_nack(&mut self, seq: u8) {
        self.framer.transmit_block(&[header(FrameKind::Nack, seq)]);
    }

    fn transmit_ack(&mut self, seq: u8) {
        self.framer.transmit_block(&[header(FrameKind::Ack, seq)]);
    }

    /// Open a DATA frame
    ///
    /// Sends a RESET first if `no_ack_limit` frames are still unacknowledged.
    pub fn transmit_start(&mut self) {
        if self.no_ack >= self.no_ack_limit {
            debug!("{} frames unacknowledged, resetting link", self.no_ack);
            self.transmit_reset();
        }
        self.no_ack = self.no_ack.saturating_add(1);

        self.framer.transmit_start();
        self.seq = if self.seq < self.seq_max { self.seq + 1 } else { 0 };
        self.framer.transmit_byte(header(FrameKind::Data, self.seq));
    }

    pub fn transmit_byte(&mut self, byte: u8) {
        self.framer.transmit_byte(byte);
    }

    pub fn transmit_bytes(&mut self, data: &[u8]) {
        self.framer.transmit_bytes(data);
    }

    pub fn transmit_end(&mut self) {
        self.framer.transmit_end();
    }

    /// Send `data` as one DATA frame
    pub fn transmit_block(&mut self, data: &[u8]) {
        self.transmit_start();
        self.transmit_bytes(data);
        self.transmit_end();
    }

    /// Consume at most one input byte
    ///
    /// # Returns
    ///
    /// * `usize` - Payload length of a DATA frame completed by this byte
    ///   (header excluded), 0 otherwise
    ///
    /// A completed DATA frame is acknowledged before this returns. An ACK
    /// clears the unacknowledged count. NACK and RESET are accepted and
    /// otherwise ignored.
    pub fn receive(&mut self) -> usize {
        let len = self.framer.receive();
        if len == 0 {
            return 0;
        }

        let Some(&control) = self.framer.received_message().first() else {
            return 0;
        };
        let seq = control & SEQ_FIELD_MAX;

        match FrameKind::from_header(control) {
            FrameKind::Data => {
                self.last_rx_seq = Some(seq);
                self.transmit_ack(seq);
                len - HEADER_LEN
            }
            FrameKind::Ack => {
                trace!("ACK {}", seq);
                self.no_ack = 0;
                0
            }
            FrameKind::Nack => {
                trace!("NACK {} ignored", seq);
                0
            }
            FrameKind::Reset => {
                debug!("Peer reset the link");
                0
            }
        }
    }

    /// Copy the last DATA payload (header stripped) and reset the receiver
    pub fn copy_received_message(&mut self, buf: &mut [u8]) -> usize {
        self.framer.copy_received_range(buf, HEADER_LEN, true)
    }

    /// Payload of the completed frame, header stripped
    pub fn received_message(&self) -> &[u8] {
        self.framer.received_message().get(HEADER_LEN..).unwrap_or(&[])
    }

    /// Framer receiver state
    pub fn state(&self) -> RxState {
        self.framer.state()
    }

    /// Sequence number of the last DATA frame sent
    pub fn sequence(&self) -> u8 {
        self.seq
    }

    /// Sequence number of the last DATA frame received since the last reset
    pub fn last_received_sequence(&self) -> Option<u8> {
        self.last_rx_seq
    }

    /// Frames sent since the last ACK
    pub fn no_ack_count(&self) -> u8 {
        self.no_ack
    }

    pub fn seq_max(&self) -> u8 {
        self.seq_max
    }

    pub fn no_ack_limit(&self) -> u8 {
        self.no_ack_limit
    }

    pub fn io(&self) -> &IO {
        self.framer.io()
    }

    pub fn io_mut(&mut self) -> &mut IO {
        self.framer.io_mut()
    }
}
