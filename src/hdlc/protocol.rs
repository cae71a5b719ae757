//! # HDLC Wire Constants
//!
//! Octet values shared by the framer and the transports built on top of it.
//!
//! Frame layout on the wire:
//!
//! ```text
//! MARKER | stuffed(payload ++ crc trailer) | MARKER
//! ```

/// Frame delimiter (`~`)
pub const MARKER: u8 = 0x7E;

/// Escape octet (`}`)
pub const ESCAPE: u8 = 0x7D;

/// XOR pattern applied to an escaped octet
pub const ESCAPE_XOR: u8 = 0x20;

/// Returns true if `byte` must be escaped before it goes on the wire
pub const fn needs_escape(byte: u8) -> bool {
    byte == MARKER || byte == ESCAPE
}

/// Receiver state of a [`Framer`](super::framer::Framer)
///
/// `FrameOk` and `CrcError` are terminal until the next call to
/// `receive()`, which resets to `Receiving` before looking at the new byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Collecting payload bytes
    Receiving,

    /// Previous byte was [`ESCAPE`]
    Escaped,

    /// A frame with a valid trailer was completed
    FrameOk,

    /// A frame was completed but its trailer did not check
    CrcError,
}

impl RxState {
    /// Whether a frame has just been completed (good or bad)
    pub fn is_terminal(self) -> bool {
        matches!(self, RxState::FrameOk | RxState::CrcError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(MARKER, b'~');
        assert_eq!(ESCAPE, b'}');
        assert_eq!(ESCAPE_XOR, 0x20);
    }

    #[test]
    fn test_escaped_octets_never_need_escape() {
        assert!(needs_escape(MARKER));
        assert!(needs_escape(ESCAPE));
        assert!(!needs_escape(MARKER ^ ESCAPE_XOR));
        assert!(!needs_escape(ESCAPE ^ ESCAPE_XOR));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RxState::FrameOk.is_terminal());
        assert!(RxState::CrcError.is_terminal());
        assert!(!RxState::Receiving.is_terminal());
        assert!(!RxState::Escaped.is_terminal());
    }
}
