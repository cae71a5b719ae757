//! # UART Link
//!
//! Serial terminal speaking the framed link protocol.
//!
//! Lines typed on stdin are sent as frames; frames received from the serial
//! port are logged and optionally captured to a JSONL file.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tracing::{debug, info, warn};

use uart_link::capture::{Direction, FrameCapture};
use uart_link::config::{Config, CrcKind, LinkMode};
use uart_link::hdlc::crc::{Crc, Crc16Ccitt, Crc32};
use uart_link::serial::{BufferedIo, SerialLink};
use uart_link::transport::token_bus::Command;
use uart_link::transport::{ArqTransport, TokenBus};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Frame capacity: transport header plus payload, excluding the CRC trailer
const FRAME_CAPACITY: usize = 256;

/// A transport wired to the serial event loop
trait Station {
    fn io_mut(&mut self) -> &mut BufferedIo;

    /// Consume one received byte, returning a frame if one was delivered
    fn poll(&mut self) -> Option<Delivery>;

    /// Act on one line typed on stdin
    fn command(&mut self, line: &str);
}

/// A delivered frame
#[derive(Debug, PartialEq, Eq)]
struct Delivery {
    kind: &'static str,
    data: Vec<u8>,
}

struct ArqStation<C: Crc> {
    arq: ArqTransport<C, BufferedIo, FRAME_CAPACITY>,
}

impl<C: Crc> ArqStation<C> {
    fn new(config: &Config) -> Self {
        Self {
            arq: ArqTransport::with_limits(BufferedIo::new(), config.arq.seq_max, config.arq.no_ack_limit),
        }
    }
}

impl<C: Crc> Station for ArqStation<C> {
    fn io_mut(&mut self) -> &mut BufferedIo {
        self.arq.io_mut()
    }

    fn poll(&mut self) -> Option<Delivery> {
        if self.arq.receive() == 0 {
            return None;
        }
        debug!("Frame seq {:?} acknowledged", self.arq.last_received_sequence());
        Some(Delivery {
            kind: "data",
            data: self.arq.received_message().to_vec(),
        })
    }

    fn command(&mut self, line: &str) {
        let max = ArqTransport::<C, BufferedIo, FRAME_CAPACITY>::RX_BUFFER_LEN;
        if line.len() > max {
            warn!("Line is {} bytes, peer keeps only the first {}", line.len(), max);
        }
        self.arq.transmit_block(line.as_bytes());
    }
}

/// Line typed at a token bus station
#[derive(Debug, PartialEq, Eq)]
enum BusCommand<'a> {
    /// `/give N`
    GiveToken(u8),
    /// `/reset`
    Reset,
    /// Anything else is sent as a WRITE
    Write(&'a str),
}

impl<'a> BusCommand<'a> {
    fn parse(line: &'a str) -> std::result::Result<Self, String> {
        if let Some(arg) = line.strip_prefix("/give") {
            let arg = arg.trim();
            return arg
                .parse::<u8>()
                .map(BusCommand::GiveToken)
                .map_err(|_| format!("invalid station address '{}'", arg));
        }
        if line.trim() == "/reset" {
            return Ok(BusCommand::Reset);
        }
        Ok(BusCommand::Write(line))
    }
}

struct BusStation<C: Crc> {
    bus: TokenBus<C, BufferedIo, FRAME_CAPACITY>,
    peer: u8,
}

impl<C: Crc> BusStation<C> {
    fn new(config: &Config) -> Self {
        Self {
            bus: TokenBus::new(BufferedIo::new(), config.token_bus.address, config.token_bus.master),
            peer: config.token_bus.peer,
        }
    }
}

impl<C: Crc> Station for BusStation<C> {
    fn io_mut(&mut self) -> &mut BufferedIo {
        self.bus.io_mut()
    }

    fn poll(&mut self) -> Option<Delivery> {
        let had_token = self.bus.have_token();
        let len = self.bus.receive();
        if self.bus.have_token() != had_token {
            info!("Token {} (from station {})",
                if self.bus.have_token() { "received" } else { "released" },
                self.bus.token_address());
        }
        if len == 0 {
            return None;
        }

        let header = self.bus.copy_message_header()?;
        info!("{:?} from station {} to {}", header.command, header.from, header.to);
        let kind = match header.command {
            Command::Write => "write",
            Command::Read => "read",
            _ => "other",
        };
        let mut data = vec![0u8; len];
        let copied = self.bus.copy_message_data(&mut data, 0);
        data.truncate(copied);
        Some(Delivery { kind, data })
    }

    fn command(&mut self, line: &str) {
        match BusCommand::parse(line) {
            Ok(BusCommand::GiveToken(to)) => {
                if !self.bus.have_token() {
                    warn!("Not holding the token");
                    return;
                }
                info!("Passing token to station {}", to);
                self.bus.transmit_give_token(to);
            }
            Ok(BusCommand::Reset) => {
                info!("Resetting bus");
                self.bus.transmit_reset();
            }
            Ok(BusCommand::Write(text)) => {
                if !self.bus.have_token() {
                    warn!("Not holding the token, line dropped");
                    return;
                }
                self.bus.transmit_write(self.peer, text.as_bytes());
            }
            Err(e) => warn!("{}", e),
        }
    }
}

/// Main entry point for UART Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (first argument, or `config/default.toml`)
///    - Open the serial port and the capture file
///
/// 2. **Main Loop**
///    - Feed serial input through the transport and log delivered frames
///    - Send stdin lines as frames
///    - Flush replies and outgoing frames to the port
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded
/// - Serial port cannot be opened or fails
/// - Capture file cannot be written
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("UART Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let serial = SerialLink::open(&config.serial)?;
    info!("Serial port opened at: {}", serial.device_path());

    let capture = if config.capture.enabled {
        Some(FrameCapture::create(&config.capture.path)?)
    } else {
        None
    };

    info!("Link mode {:?} with {:?}", config.link.mode, config.link.crc);
    match config.link.crc {
        CrcKind::Crc16Ccitt => run_mode::<Crc16Ccitt, _>(&config, serial, capture).await,
        CrcKind::Crc32 => run_mode::<Crc32, _>(&config, serial, capture).await,
    }
}

async fn run_mode<C, P>(config: &Config, serial: SerialLink<P>, capture: Option<FrameCapture>) -> Result<()>
where
    C: Crc,
    P: AsyncRead + AsyncWrite + Unpin,
{
    match config.link.mode {
        LinkMode::Arq => run(ArqStation::<C>::new(config), serial, capture).await,
        LinkMode::TokenBus => run(BusStation::<C>::new(config), serial, capture).await,
    }
}

/// Drain queued input through the transport
fn drain<S: Station>(station: &mut S, capture: &mut Option<FrameCapture>, frames: &mut u64) -> Result<()> {
    while station.io_mut().pending() > 0 {
        if let Some(delivery) = station.poll() {
            *frames += 1;
            info!("Received {} frame: {}", delivery.kind, String::from_utf8_lossy(&delivery.data));
            if let Some(capture) = capture.as_mut() {
                capture.record(Direction::Rx, delivery.kind, &delivery.data)?;
            }
        }
    }
    Ok(())
}

async fn run<S, P>(mut station: S, mut serial: SerialLink<P>, mut capture: Option<FrameCapture>) -> Result<()>
where
    S: Station,
    P: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut frames: u64 = 0;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            received = serial.fill(station.io_mut()) => {
                if received? == 0 {
                    warn!("Serial port closed");
                    break;
                }
                drain(&mut station, &mut capture, &mut frames)?;
            }

            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => station.command(line.trim_end()),
                    None => {
                        debug!("stdin closed");
                        stdin_open = false;
                    }
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }

        // ACKs, token replies and stdin frames
        let sent = serial.flush_from(station.io_mut()).await?;
        if !sent.is_empty() {
            if let Some(capture) = capture.as_mut() {
                capture.record(Direction::Tx, "wire", &sent)?;
            }
        }
    }

    info!("Total frames received: {}", frames);
    Ok(())
}
