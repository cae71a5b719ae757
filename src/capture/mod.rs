//! # Frame Capture Module
//!
//! Records link traffic as JSON Lines for offline inspection.
//!
//! Each line is one [`FrameRecord`]:
//!
//! ```text
//! {"timestamp":"2026-01-01T12:00:00.000Z","direction":"rx","kind":"data","len":2,"data":"6869"}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// Direction of a captured frame relative to this station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

/// One captured frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord<'a> {
    pub timestamp: String,
    pub direction: Direction,
    pub kind: &'a str,
    pub len: usize,
    pub data: String,
}

impl<'a> FrameRecord<'a> {
    /// Build a record stamped with the current UTC time
    pub fn now(direction: Direction, kind: &'a str, data: &[u8]) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            direction,
            kind,
            len: data.len(),
            data: to_hex(data),
        }
    }
}

/// Append-only JSONL capture file
#[derive(Debug)]
pub struct FrameCapture {
    writer: BufWriter<File>,
    records: u64,
}

impl FrameCapture {
    /// Open (or create) the capture file for appending
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        info!("Capturing frames to {}", path.as_ref().display());

        Ok(Self {
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Append one record and flush it to disk
    pub fn record(&mut self, direction: Direction, kind: &str, data: &[u8]) -> Result<()> {
        let record = FrameRecord::now(direction, kind, data);
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Records written since the file was opened
    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Uppercase hex without separators
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}
