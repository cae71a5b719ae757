//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Only the run-time knobs live here. Frame capacity and the CRC engine's
//! width are type parameters of the protocol core and are fixed at build
//! time; `[link] crc` merely selects which monomorphised stack the binary
//! starts.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{Result, UartLinkError};
use crate::transport::arq::{DEFAULT_NO_ACK_LIMIT, DEFAULT_SEQ_MAX, SEQ_FIELD_MAX};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub arq: ArqConfig,

    #[serde(default)]
    pub token_bus: TokenBusConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Largest number of bytes taken from the port per read
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
}

/// Transport selection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// Point-to-point link with acknowledgements
    #[default]
    #[serde(rename = "arq")]
    Arq,

    /// Multi-drop bus with token passing
    #[serde(rename = "token-bus")]
    TokenBus,
}

/// Frame check sequence
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcKind {
    /// CRC-16/X-25, 2 byte trailer
    #[default]
    #[serde(rename = "crc16-ccitt")]
    Crc16Ccitt,

    /// CRC-32, 4 byte trailer
    #[serde(rename = "crc32")]
    Crc32,
}

/// Link layer configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LinkConfig {
    #[serde(default)]
    pub mode: LinkMode,

    #[serde(default)]
    pub crc: CrcKind,
}

/// ARQ transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArqConfig {
    #[serde(default = "default_seq_max")]
    pub seq_max: u8,

    /// Unacknowledged frames tolerated before the link is reset
    #[serde(default = "default_no_ack_limit")]
    pub no_ack_limit: u8,
}

/// Token bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TokenBusConfig {
    #[serde(default = "default_station_address")]
    pub address: u8,

    /// Start out holding the token
    #[serde(default)]
    pub master: bool,

    /// Destination of WRITE frames typed on stdin (0 = broadcast)
    #[serde(default)]
    pub peer: u8,
}

/// Frame capture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_capture_path")]
    pub path: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_read_chunk() -> usize { 64 }

fn default_seq_max() -> u8 { DEFAULT_SEQ_MAX }
fn default_no_ack_limit() -> u8 { DEFAULT_NO_ACK_LIMIT }

fn default_station_address() -> u8 { 1 }

fn default_capture_path() -> String { "./capture.jsonl".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_chunk: default_read_chunk(),
        }
    }
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            seq_max: default_seq_max(),
            no_ack_limit: default_no_ack_limit(),
        }
    }
}

impl Default for TokenBusConfig {
    fn default() -> Self {
        Self {
            address: default_station_address(),
            master: false,
            peer: 0,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_capture_path(),
        }
    }
}

/// Baud rates accepted in `[serial] baud_rate`
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uart_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate serial port configuration
        if self.serial.port.is_empty() {
            return Err(UartLinkError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(UartLinkError::Config(
                toml::de::Error::custom(format!(
                    "baud_rate must be one of: {:?}",
                    SUPPORTED_BAUD_RATES
                ))
            ));
        }

        if self.serial.read_chunk == 0 || self.serial.read_chunk > 4096 {
            return Err(UartLinkError::Config(
                toml::de::Error::custom("read_chunk must be between 1 and 4096")
            ));
        }

        // Validate ARQ limits (6 bit sequence field)
        if self.arq.seq_max == 0 || self.arq.seq_max > SEQ_FIELD_MAX {
            return Err(UartLinkError::Config(
                toml::de::Error::custom(format!("seq_max must be between 1 and {}", SEQ_FIELD_MAX))
            ));
        }

        if self.arq.no_ack_limit == 0 {
            return Err(UartLinkError::Config(
                toml::de::Error::custom("no_ack_limit must be greater than 0")
            ));
        }

        // Address 0 is reserved for broadcast
        if self.token_bus.address == 0 {
            return Err(UartLinkError::Config(
                toml::de::Error::custom("token_bus address must be between 1 and 255")
            ));
        }

        if self.token_bus.peer == self.token_bus.address {
            return Err(UartLinkError::Config(
                toml::de::Error::custom("token_bus peer cannot be the station's own address")
            ));
        }

        // Validate capture configuration
        if self.capture.enabled && self.capture.path.is_empty() {
            return Err(UartLinkError::Config(
                toml::de::Error::custom("capture path cannot be empty when enabled")
            ));
        }

        Ok(())
    }
}
