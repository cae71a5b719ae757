//! # Serial Communication Module
//!
//! Connects the byte-at-a-time protocol core to a real UART.
//!
//! This module handles:
//! - The [`ByteIo`] primitive the framer reads from and writes to
//! - [`BufferedIo`], the in-memory queue the core runs against
//! - Opening the serial port (8N1, no flow control)
//! - Moving bytes between the port and a [`BufferedIo`] asynchronously

pub mod byte_io;

pub use byte_io::{BufferedIo, ByteIo};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{Result, UartLinkError};

/// Async serial port feeding a protocol instance
///
/// Generic over the port so it can run against an in-memory mock.
pub struct SerialLink<P> {
    port: P,
    device_path: String,
    read_buf: Vec<u8>,
}

impl<P> std::fmt::Debug for SerialLink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .field("read_chunk", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}

impl SerialLink<tokio_serial::SerialStream> {
    /// Open the configured serial port
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uart_link::config::Config;
    /// use uart_link::serial::SerialLink;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// let serial = SerialLink::open(&config.serial)?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", config.port, config.baud_rate);
        let port = Self::open_port(&config.port, config.baud_rate)?;
        info!("Opened serial port {}", config.port);

        Ok(Self::new(port, config.port.clone(), config.read_chunk))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| match e.kind {
                tokio_serial::ErrorKind::NoDevice => UartLinkError::SerialPortNotFound(path.to_string()),
                _ => UartLinkError::Serial(format!("Failed to open {}: {}", path, e)),
            })?;

        Ok(port)
    }
}

impl<P: AsyncRead + AsyncWrite + Unpin> SerialLink<P> {
    /// Wrap an already opened port
    ///
    /// `read_chunk` is the largest number of bytes taken per read.
    pub fn new(port: P, device_path: impl Into<String>, read_chunk: usize) -> Self {
        Self {
            port,
            device_path: device_path.into(),
            read_buf: vec![0u8; read_chunk.max(1)],
        }
    }

    /// Wait for the next bytes from the port
    ///
    /// # Returns
    ///
    /// * `Result<Bytes>` - Received bytes, empty once the port is closed
    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        let n = self
            .port
            .read(&mut self.read_buf)
            .await
            .map_err(|e| UartLinkError::Serial(format!("Failed to read from {}: {}", self.device_path, e)))?;

        Ok(Bytes::copy_from_slice(&self.read_buf[..n]))
    }

    /// Read one chunk from the port into the receive queue of `io`
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of bytes queued, 0 once the port is closed
    pub async fn fill(&mut self, io: &mut BufferedIo) -> Result<usize> {
        let chunk = self.read_chunk().await?;
        io.feed(&chunk);
        Ok(chunk.len())
    }

    /// Write and flush `data`
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .await
            .map_err(|e| UartLinkError::Serial(format!("Failed to write: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| UartLinkError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Send everything the protocol wrote into `io` since the last call
    ///
    /// # Returns
    ///
    /// * `Result<Bytes>` - The bytes that were sent (possibly empty)
    pub async fn flush_from(&mut self, io: &mut BufferedIo) -> Result<Bytes> {
        let output = io.take_output();
        if !output.is_empty() {
            self.send(&output).await?;
        }
        Ok(output)
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}
