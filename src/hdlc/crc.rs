//! # Frame Check Sequences
//!
//! Incremental CRC engines used for the frame trailer.
//!
//! Both engines are the reflected (LSB-first) variants used by HDLC:
//!
//! | Engine | Polynomial | Init | Final XOR | Good residue | Trailer |
//! |--------|------------|------|-----------|--------------|---------|
//! | [`Crc16Ccitt`] | 0x8408 (x^16 + x^12 + x^5 + 1) | 0xFFFF | 0xFFFF | 0xF0B8 | 2 bytes |
//! | [`Crc32`] | 0xEDB88320 | 0xFFFFFFFF | 0xFFFFFFFF | 0xDEBB20E3 | 4 bytes |
//!
//! The receiver never compares the trailer explicitly: it feeds the trailer
//! through the same engine and checks that the register landed on the good
//! residue.

/// Checksum policy plugged into a [`Framer`](super::framer::Framer)
pub trait Crc: Default {
    /// Number of trailer bytes
    const SIZE: usize;

    /// Reset the register to the initial value
    fn init(&mut self);

    /// Fold one byte into the register
    fn update(&mut self, byte: u8);

    /// Apply the final XOR, right before the trailer is serialized
    fn finalize(&mut self);

    /// Whether the (non-finalized) register holds the good residue
    fn is_good(&self) -> bool;

    /// Trailer byte `index`, little-endian
    fn byte_at(&self, index: usize) -> u8;
}

/// Reflected CCITT polynomial
const CRC16_POLY: u16 = 0x8408;

/// Reflected CRC-32 polynomial
const CRC32_POLY: u32 = 0xEDB8_8320;

/// Precomputed CRC-16 lookup table
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Precomputed CRC-32 lookup table
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

/// Generate the CRC-16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Generate the CRC-32 lookup table at compile time
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC32_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// 16-bit CCITT frame check sequence (CRC-16/X-25)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16Ccitt {
    crc: u16,
}

impl Crc16Ccitt {
    pub const INIT: u16 = 0xFFFF;
    pub const FINAL_XOR: u16 = 0xFFFF;
    pub const GOOD: u16 = 0xF0B8;

    /// Current register value
    pub fn value(&self) -> u16 {
        self.crc
    }
}

impl Default for Crc16Ccitt {
    fn default() -> Self {
        Self { crc: Self::INIT }
    }
}

impl Crc for Crc16Ccitt {
    const SIZE: usize = 2;

    fn init(&mut self) {
        self.crc = Self::INIT;
    }

    fn update(&mut self, byte: u8) {
        self.crc = (self.crc >> 8) ^ CRC16_TABLE[((self.crc ^ byte as u16) & 0xFF) as usize];
    }

    fn finalize(&mut self) {
        self.crc ^= Self::FINAL_XOR;
    }

    fn is_good(&self) -> bool {
        self.crc == Self::GOOD
    }

    fn byte_at(&self, index: usize) -> u8 {
        match index {
            0 => self.crc as u8,
            _ => (self.crc >> 8) as u8,
        }
    }
}

/// 32-bit frame check sequence (CRC-32/ISO-HDLC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    pub const INIT: u32 = 0xFFFF_FFFF;
    pub const FINAL_XOR: u32 = 0xFFFF_FFFF;
    pub const GOOD: u32 = 0xDEBB_20E3;

    /// Current register value
    pub fn value(&self) -> u32 {
        self.crc
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self { crc: Self::INIT }
    }
}

impl Crc for Crc32 {
    const SIZE: usize = 4;

    fn init(&mut self) {
        self.crc = Self::INIT;
    }

    fn update(&mut self, byte: u8) {
        self.crc = (self.crc >> 8) ^ CRC32_TABLE[((self.crc ^ byte as u32) & 0xFF) as usize];
    }

    fn finalize(&mut self) {
        self.crc ^= Self::FINAL_XOR;
    }

    fn is_good(&self) -> bool {
        self.crc == Self::GOOD
    }

    fn byte_at(&self, index: usize) -> u8 {
        match index {
            0 => self.crc as u8,
            1 => (self.crc >> 8) as u8,
            2 => (self.crc >> 16) as u8,
            _ => (self.crc >> 24) as u8,
        }
    }
}

/// Calculate the finalized CRC-16/X-25 of `data`
///
/// # Examples
///
/// ```
/// use uart_link::hdlc::crc::crc16_ccitt;
///
/// assert_eq!(crc16_ccitt(b"123456789"), 0x906E);
/// ```
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = Crc16Ccitt::default();
    for &byte in data {
        crc.update(byte);
    }
    crc.finalize();
    crc.value()
}

/// Calculate the finalized CRC-32 of `data`
///
/// # Examples
///
/// ```
/// use uart_link::hdlc::crc::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc32::default();
    for &byte in data {
        crc.update(byte);
    }
    crc.finalize();
    crc.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bit-by-bit CRC-16/X-25, for checking the table
    fn crc16_ccitt_slow(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;

        for &byte in data {
            crc ^= byte as u16;
            for _ in 0..8 {
                if (crc & 1) != 0 {
                    crc = (crc >> 1) ^ CRC16_POLY;
                } else {
                    crc >>= 1;
                }
            }
        }

        crc ^ 0xFFFF
    }

    /// Bit-by-bit CRC-32, for checking the table
    fn crc32_slow(data: &[u8]) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;

        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                if (crc & 1) != 0 {
                    crc = (crc >> 1) ^ CRC32_POLY;
                } else {
                    crc >>= 1;
                }
            }
        }

        crc ^ 0xFFFF_FFFF
    }

    /// Feed `data` followed by its own trailer and report the residue check
    fn residue_is_good<C: Crc>(data: &[u8]) -> bool {
        let mut tx = C::default();
        for &byte in data {
            tx.update(byte);
        }
        tx.finalize();

        let mut rx = C::default();
        for &byte in data {
            rx.update(byte);
        }
        for i in 0..C::SIZE {
            rx.update(tx.byte_at(i));
        }
        rx.is_good()
    }

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x906E);
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc16_single_zero_byte() {
        // Trailer 0x78 0xF0 on the wire, low byte first
        assert_eq!(crc16_ccitt(&[0x00]), 0xF078);
    }

    #[test]
    fn test_crc_empty() {
        assert_eq!(crc16_ccitt(&[]), 0x0000);
        assert_eq!(crc32(&[]), 0x0000_0000);
    }

    #[test]
    fn test_lookup_tables_match_slow() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0x7E, 0x7D, 0x5E, 0x5D],
            vec![0x00; 24],
            vec![0xFF; 10],
            b"The quick brown fox jumps over the lazy dog".to_vec(),
        ];

        for data in test_data.iter() {
            assert_eq!(crc16_ccitt(data), crc16_ccitt_slow(data), "CRC-16 mismatch for {:?}", data);
            assert_eq!(crc32(data), crc32_slow(data), "CRC-32 mismatch for {:?}", data);
        }
    }

    #[test]
    fn test_good_residue_after_trailer() {
        for data in [&b""[..], b"\x00", b"~}", b"hello, bus", &[0xFF; 64]] {
            assert!(residue_is_good::<Crc16Ccitt>(data));
            assert!(residue_is_good::<Crc32>(data));
        }
    }

    #[test]
    fn test_trailer_bytes_little_endian() {
        let mut crc = Crc32::default();
        for &byte in b"123456789" {
            crc.update(byte);
        }
        crc.finalize();

        assert_eq!(crc.byte_at(0), 0x26);
        assert_eq!(crc.byte_at(1), 0x39);
        assert_eq!(crc.byte_at(2), 0xF4);
        assert_eq!(crc.byte_at(3), 0xCB);
    }

    #[test]
    fn test_init_resets_register() {
        let mut crc = Crc16Ccitt::default();
        crc.update(0x42);
        assert_ne!(crc.value(), Crc16Ccitt::INIT);
        crc.init();
        assert_eq!(crc.value(), Crc16Ccitt::INIT);
    }

    #[test]
    fn test_crc_changes_with_data() {
        assert_ne!(crc16_ccitt(&[0x01, 0x02]), crc16_ccitt(&[0x01, 0x03]));
        assert_ne!(crc32(&[0x01, 0x02]), crc32(&[0x01, 0x03]));
    }
}
