//! # Token-Passing Bus Transport
//!
//! Multi-drop addressing and token arbitration over a [`Framer`] with a
//! three-byte header.
//!
//! ## Header
//!
//! ```text
//! +---------+------+----+-----------+
//! | command | from | to | payload.. |
//! +---------+------+----+-----------+
//! ```
//!
//! `to == 0` is a broadcast. A station accepts frames that are broadcast or
//! addressed to it, and silently drops frames it sent itself (its own echo
//! on a shared bus).
//!
//! ## Token state
//!
//! | Event | New state |
//! |-------|-----------|
//! | constructed as master | `Have` |
//! | constructed as slave | `DontHave` |
//! | `transmit_give_token(to)` | `Passing` |
//! | GIVE_TOKEN addressed to us | `Have` (and ACK_TOKEN is sent back) |
//! | ACK_TOKEN addressed to us | `DontHave` |
//! | RESET received | `DontHave` |
//! | `transmit_reset()` | `Have` |
//!
//! GIVE_TOKEN and ACK_TOKEN sent as broadcast are protocol errors on the
//! sender's side and are ignored. Deciding when to transmit is up to the
//! caller, using [`TokenBus::have_token`].

use tracing::{debug, trace};

use crate::hdlc::crc::Crc;
use crate::hdlc::framer::Framer;
use crate::hdlc::protocol::RxState;
use crate::serial::byte_io::ByteIo;

/// Header length: command, from, to
pub const HEADER_LEN: usize = 3;

/// Broadcast destination address
pub const BROADCAST: u8 = 0;

/// Header command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    GiveToken,
    AckToken,
    Write,
    Read,
    /// Unassigned command byte, delivered like WRITE/READ
    Other(u8),
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        match byte {
            0 => Command::Reset,
            1 => Command::GiveToken,
            2 => Command::AckToken,
            3 => Command::Write,
            4 => Command::Read,
            other => Command::Other(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        match command {
            Command::Reset => 0,
            Command::GiveToken => 1,
            Command::AckToken => 2,
            Command::Write => 3,
            Command::Read => 4,
            Command::Other(byte) => byte,
        }
    }
}

/// Token ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Have,
    Passing,
    DontHave,
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub command: Command,
    pub from: u8,
    pub to: u8,
}

impl MessageHeader {
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }
}

/// One station on a token-passing bus, over a framer of capacity `CAP`
///
/// The caller sees `CAP - 3` bytes of payload per frame.
pub struct TokenBus<C: Crc, IO: ByteIo, const CAP: usize> {
    framer: Framer<C, IO, CAP>,
    address: u8,
    rx_count: u16,
    tx_count: u16,
    token_state: TokenState,
    token_address: u8,
}

impl<C: Crc, IO: ByteIo, const CAP: usize> std::fmt::Debug for TokenBus<C, IO, CAP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBus")
            .field("address", &self.address)
            .field("token_state", &self.token_state)
            .field("token_address", &self.token_address)
            .field("rx_count", &self.rx_count)
            .field("tx_count", &self.tx_count)
            .finish_non_exhaustive()
    }
}

impl<C: Crc, IO: ByteIo, const CAP: usize> TokenBus<C, IO, CAP> {
    /// Payload capacity seen by the caller
    pub const RX_BUFFER_LEN: usize = CAP - HEADER_LEN;

    /// Create a station
    ///
    /// # Arguments
    ///
    /// * `io` - Byte source and sink of the shared bus
    /// * `address` - This station's address (0 is reserved for broadcast)
    /// * `master` - Start holding the token
    pub fn new(io: IO, address: u8, master: bool) -> Self {
        const { assert!(CAP > HEADER_LEN, "token bus frame capacity must exceed the header") };

        Self {
            framer: Framer::new(io),
            address,
            rx_count: 0,
            tx_count: 0,
            token_state: if master { TokenState::Have } else { TokenState::DontHave },
            token_address: 0,
        }
    }

    /// Take the token and broadcast RESET
    pub fn transmit_reset(&mut self) {
        self.token_state = TokenState::Have;
        self.transmit_start(Command::Reset, BROADCAST);
        self.transmit_end();
    }

    /// Offer the token to station `to`
    pub fn transmit_give_token(&mut self, to: u8) {
        self.transmit_start(Command::GiveToken, to);
        self.transmit_end();

        self.token_address = to;
        self.token_state = TokenState::Passing;
    }

    fn transmit_ack_token(&mut self, to: u8) {
        self.transmit_start(Command::AckToken, to);
        self.transmit_end();
    }

    fn transmit_start(&mut self, command: Command, to: u8) {
        self.tx_count = self.tx_count.wrapping_add(1);

        self.framer.transmit_start();
        self.framer.transmit_byte(command.into());
        self.framer.transmit_byte(self.address);
        self.framer.transmit_byte(to);
    }

    /// Open a WRITE frame to `to`
    pub fn transmit_start_write(&mut self, to: u8) {
        self.transmit_start(Command::Write, to);
    }

    /// Open a READ frame to `to`
    pub fn transmit_start_read(&mut self, to: u8) {
        self.transmit_start(Command::Read, to);
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

    /// Send `data` as one WRITE frame to `to`
    pub fn transmit_write(&mut self, to: u8, data: &[u8]) {
        self.transmit_start_write(to);
        self.transmit_bytes(data);
        self.transmit_end();
    }

    /// Send `data` as one READ frame to `to`
    pub fn transmit_read(&mut self, to: u8, data: &[u8]) {
        self.transmit_start_read(to);
        self.transmit_bytes(data);
        self.transmit_end();
    }

    /// Consume at most one input byte
    ///
    /// # Returns
    ///
    /// * `usize` - Payload length (header excluded) of a WRITE/READ frame for
    ///   this station completed by this byte, 0 otherwise
    ///
    /// Token commands are handled here and never delivered.
    pub fn receive(&mut self) -> usize {
        let len = self.framer.receive();
        if len == 0 {
            return 0;
        }
        if len < HEADER_LEN {
            trace!("Dropping {}-byte frame, too short for a header", len);
            return 0;
        }

        self.rx_count = self.rx_count.wrapping_add(1);

        let Some(header) = self.copy_message_header() else {
            return 0;
        };

        let for_me = header.to == BROADCAST || header.to == self.address;
        if !for_me || header.from == self.address {
            return 0;
        }

        match header.command {
            Command::Reset => {
                debug!("Bus reset by station {}", header.from);
                self.token_state = TokenState::DontHave;
                0
            }
            Command::GiveToken => {
                if header.is_broadcast() {
                    trace!("Ignoring token broadcast by station {}", header.from);
                } else {
                    debug!("Token received from station {}", header.from);
                    self.token_state = TokenState::Have;
                    self.transmit_ack_token(header.from);
                    self.token_address = header.from;
                }
                0
            }
            Command::AckToken => {
                if header.is_broadcast() {
                    trace!("Ignoring token ack broadcast by station {}", header.from);
                } else {
                    debug!("Token taken by station {}", header.from);
                    self.token_state = TokenState::DontHave;
                }
                0
            }
            Command::Write | Command::Read | Command::Other(_) => len - HEADER_LEN,
        }
    }

    /// Header of the completed frame, if there is one
    pub fn copy_message_header(&self) -> Option<MessageHeader> {
        match *self.framer.received_message() {
            [command, from, to, ..] => Some(MessageHeader {
                command: command.into(),
                from,
                to,
            }),
            _ => None,
        }
    }

    /// Copy payload bytes from offset `pos` (after the header), keeping the frame
    pub fn copy_message_data(&mut self, buf: &mut [u8], pos: usize) -> usize {
        self.framer.copy_received_range(buf, pos + HEADER_LEN, false)
    }

    /// Copy the payload and reset the receiver
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

    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Frames received with a complete header
    pub fn rx_count(&self) -> u16 {
        self.rx_count
    }

    /// Frames sent, including automatic ACK_TOKEN replies
    pub fn tx_count(&self) -> u16 {
        self.tx_count
    }

    pub fn token_state(&self) -> TokenState {
        self.token_state
    }

    pub fn have_token(&self) -> bool {
        self.token_state == TokenState::Have
    }

    /// Station the token was last given to or received from
    pub fn token_address(&self) -> u8 {
        self.token_address
    }

    pub fn io(&self) -> &IO {
        self.framer.io()
    }

    pub fn io_mut(&mut self) -> &mut IO {
        self.framer.io_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdlc::crc::Crc16Ccitt;
    use crate::serial::byte_io::BufferedIo;
    use crate::transport::test_util::{decode_frames, pump};

    type Station = TokenBus<Crc16Ccitt, BufferedIo, 35>;

    fn station(address: u8, master: bool) -> Station {
        Station::new(BufferedIo::new(), address, master)
    }

    fn sent_frames(station: &mut Station) -> Vec<Vec<u8>> {
        decode_frames::<Crc16Ccitt>(&station.io_mut().take_output())
    }

    /// Move everything `from` has sent into `to`, returning delivered lengths
    fn deliver(from: &mut Station, to: &mut Station) -> Vec<usize> {
        let wire = from.io_mut().take_output();
        pump(to, &wire)
    }

    #[test]
    fn test_command_bytes() {
        assert_eq!(u8::from(Command::Reset), 0);
        assert_eq!(u8::from(Command::GiveToken), 1);
        assert_eq!(u8::from(Command::AckToken), 2);
        assert_eq!(u8::from(Command::Write), 3);
        assert_eq!(u8::from(Command::Read), 4);
        assert_eq!(Command::from(9), Command::Other(9));
        assert_eq!(u8::from(Command::from(9)), 9);
    }

    #[test]
    fn test_initial_state() {
        let master = station(1, true);
        let slave = station(2, false);

        assert!(master.have_token());
        assert_eq!(slave.token_state(), TokenState::DontHave);
        assert_eq!(Station::RX_BUFFER_LEN, 32);
    }

    #[test]
    fn test_give_token_scenario() {
        let mut a = station(1, true);
        let mut b = station(2, false);

        a.transmit_give_token(2);
        assert_eq!(a.token_state(), TokenState::Passing);
        assert_eq!(a.token_address(), 2);

        let wire = a.io_mut().take_output();
        assert_eq!(decode_frames::<Crc16Ccitt>(&wire), vec![vec![1, 1, 2]]);

        assert!(pump(&mut b, &wire).is_empty());
        assert_eq!(b.token_state(), TokenState::Have);
        assert_eq!(b.token_address(), 1);
        assert!(!b.io().output().is_empty());

        let reply = b.io_mut().take_output();
        assert_eq!(decode_frames::<Crc16Ccitt>(&reply), vec![vec![2, 2, 1]]);

        assert!(pump(&mut a, &reply).is_empty());
        assert_eq!(a.token_state(), TokenState::DontHave);
        assert!(b.have_token());
    }

    #[test]
    fn test_broadcast_give_token_ignored() {
        let mut a = station(1, true);
        let mut b = station(2, false);

        a.transmit_give_token(BROADCAST);
        deliver(&mut a, &mut b);

        assert_eq!(b.token_state(), TokenState::DontHave);
        assert!(b.io().output().is_empty());
        assert_eq!(b.rx_count(), 1);
    }

    #[test]
    fn test_broadcast_ack_token_ignored() {
        // A station whose frames carry from=2, to=0
        let mut rogue = station(2, false);
        rogue.transmit_start(Command::AckToken, BROADCAST);
        rogue.transmit_end();

        let mut a = station(1, true);
        a.transmit_give_token(2);
        a.io_mut().take_output();

        deliver(&mut rogue, &mut a);
        assert_eq!(a.token_state(), TokenState::Passing);
    }

    #[test]
    fn test_reset_takes_token_from_everyone() {
        let mut a = station(1, false);
        let mut b = station(2, true);
        let mut c = station(3, true);

        a.transmit_reset();
        assert!(a.have_token());

        let wire = a.io_mut().take_output();
        assert_eq!(decode_frames::<Crc16Ccitt>(&wire), vec![vec![0, 1, 0]]);

        assert!(pump(&mut b, &wire).is_empty());
        assert!(pump(&mut c, &wire).is_empty());
        assert_eq!(b.token_state(), TokenState::DontHave);
        assert_eq!(c.token_state(), TokenState::DontHave);
    }

    #[test]
    fn test_write_and_read_delivered_without_token_change() {
        let mut a = station(1, true);
        let mut b = station(2, false);

        a.transmit_write(2, b"set 42");
        a.transmit_start_read(2);
        a.transmit_byte(0x10);
        a.transmit_end();

        assert_eq!(deliver(&mut a, &mut b), vec![6, 1]);
        assert_eq!(b.copy_message_header(), Some(MessageHeader { command: Command::Read, from: 1, to: 2 }));
        assert_eq!(b.received_message(), &[0x10]);
        assert_eq!(b.token_state(), TokenState::DontHave);
        assert!(a.have_token());
        assert!(b.io().output().is_empty());
    }

    #[test]
    fn test_copy_message_data_and_consume() {
        let mut a = station(1, true);
        let mut b = station(2, false);

        a.transmit_read(BROADCAST, b"abcdef");
        assert_eq!(deliver(&mut a, &mut b), vec![6]);

        let mut part = [0u8; 3];
        assert_eq!(b.copy_message_data(&mut part, 2), 3);
        assert_eq!(&part, b"cde");
        assert_eq!(b.state(), RxState::FrameOk);

        let mut all = [0u8; 32];
        assert_eq!(b.copy_received_message(&mut all), 6);
        assert_eq!(&all[..6], b"abcdef");
        assert_eq!(b.state(), RxState::Receiving);
        assert_eq!(b.copy_message_header(), None);
    }

    #[test]
    fn test_frames_for_other_stations_not_delivered() {
        let mut a = station(1, true);
        let mut b = station(2, false);
        let mut c = station(3, false);

        a.transmit_write(3, b"for c");
        let wire = a.io_mut().take_output();

        assert!(pump(&mut b, &wire).is_empty());
        assert_eq!(pump(&mut c, &wire), vec![5]);
        // Still counted as seen on the bus
        assert_eq!(b.rx_count(), 1);
    }

    #[test]
    fn test_broadcast_write_delivered_to_all() {
        let mut a = station(1, true);
        let mut b = station(2, false);
        let mut c = station(3, false);

        a.transmit_write(BROADCAST, b"hello all");
        let wire = a.io_mut().take_output();

        assert_eq!(pump(&mut b, &wire), vec![9]);
        assert_eq!(pump(&mut c, &wire), vec![9]);
    }

    #[test]
    fn test_own_frames_dropped() {
        let mut a = station(1, true);
        let mut echo = station(1, false);

        // GIVE_TOKEN addressed to ourselves, from ourselves
        a.transmit_give_token(1);
        a.transmit_write(1, b"loop");
        a.transmit_write(BROADCAST, b"loop");
        a.transmit_reset();

        assert!(deliver(&mut a, &mut echo).is_empty());
        assert_eq!(echo.token_state(), TokenState::DontHave);
        assert!(echo.io().output().is_empty());
        assert_eq!(echo.rx_count(), 4);
    }

    #[test]
    fn test_short_frame_dropped() {
        use crate::hdlc::framer::Framer;

        let mut raw: Framer<Crc16Ccitt, BufferedIo, 8> = Framer::new(BufferedIo::new());
        raw.transmit_block(&[1, 2]);
        raw.transmit_block(&[]);
        let wire = raw.io_mut().take_output();

        let mut b = station(2, false);
        assert!(pump(&mut b, &wire).is_empty());
        assert_eq!(b.rx_count(), 0);
        assert_eq!(b.token_state(), TokenState::DontHave);
    }

    #[test]
    fn test_unknown_command_delivered() {
        let mut a = station(1, true);
        a.transmit_start(Command::Other(0x42), 2);
        a.transmit_bytes(b"xyz");
        a.transmit_end();

        let mut b = station(2, false);
        assert_eq!(deliver(&mut a, &mut b), vec![3]);
        assert_eq!(b.copy_message_header().map(|h| h.command), Some(Command::Other(0x42)));
    }

    #[test]
    fn test_two_masters_coexist_until_handover() {
        let mut a = station(1, true);
        let mut b = station(2, true);

        // Both stations believe they own the token; nothing resolves it
        for _ in 0..10 {
            assert_eq!(a.receive(), 0);
            assert_eq!(b.receive(), 0);
        }
        assert!(a.have_token());
        assert!(b.have_token());

        a.transmit_give_token(2);
        deliver(&mut a, &mut b);
        deliver(&mut b, &mut a);

        assert!(b.have_token());
        assert_eq!(a.token_state(), TokenState::DontHave);
    }

    #[test]
    fn test_token_round_trip_counts() {
        let mut a = station(1, true);
        let mut b = station(2, false);

        a.transmit_give_token(2);
        deliver(&mut a, &mut b);
        deliver(&mut b, &mut a);

        b.transmit_write(1, b"data");
        b.transmit_give_token(1);
        assert_eq!(deliver(&mut b, &mut a), vec![4]);
        deliver(&mut a, &mut b);

        assert!(a.have_token());
        assert_eq!(a.token_address(), 2);
        assert_eq!(b.token_state(), TokenState::DontHave);

        // a: GIVE_TOKEN + ACK_TOKEN; b: ACK_TOKEN + WRITE + GIVE_TOKEN
        assert_eq!(a.tx_count(), 2);
        assert_eq!(b.tx_count(), 3);
        assert_eq!(a.rx_count(), 3);
        assert_eq!(b.rx_count(), 2);
    }

    #[test]
    fn test_set_address() {
        let mut s = station(1, false);
        s.set_address(9);
        s.transmit_write(2, &[]);
        assert_eq!(s.address(), 9);
        assert_eq!(sent_frames(&mut s), vec![vec![3, 9, 2]]);
    }
}
