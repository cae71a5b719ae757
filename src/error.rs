//! # Error Types
//!
//! Custom error types for UART Link using `thiserror`.
//!
//! The framing and transport core never fails: corrupted input shows up as
//! a receive state, not an error. These errors cover the outer surfaces.

use thiserror::Error;

/// Main error type for UART Link
#[derive(Debug, Error)]
pub enum UartLinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Serial device does not exist
    #[error("Serial port not found: {0}")]
    SerialPortNotFound(String),

    /// Frame capture encoding errors
    #[error("Capture error: {0}")]
    Capture(#[from] serde_json::Error),
}

/// Result type alias for UART Link
pub type Result<T> = std::result::Result<T, UartLinkError>;
