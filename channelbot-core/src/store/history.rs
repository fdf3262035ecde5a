//! Position history log: append-only CSV, one row per closed or missed position.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::Position;
use crate::error::BotError;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One row of the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(rename = "signalTStamp")]
    pub signal_time: Option<String>,
    pub size: f64,
    pub wanted_entry: Option<f64>,
    pub initial_stop: Option<f64>,
    pub open_time: Option<String>,
    pub open_price: Option<f64>,
    pub close_time: Option<String>,
    pub close_price: Option<f64>,
    pub equity_on_exit: Option<f64>,
}

impl HistoryRecord {
    pub fn from_position(position: &Position) -> Self {
        Self {
            signal_time: format_tstamp(position.signal_tstamp),
            size: position.amount,
            wanted_entry: position.wanted_entry,
            initial_stop: position.initial_stop,
            open_time: position.entry_tstamp.and_then(format_tstamp),
            open_price: position.filled_entry,
            close_time: position.exit_tstamp.and_then(format_tstamp),
            close_price: position.filled_exit,
            equity_on_exit: position.exit_equity,
        }
    }

    pub fn signal_tstamp(&self) -> Option<i64> {
        self.signal_time.as_deref().and_then(parse_tstamp)
    }

    pub fn open_tstamp(&self) -> Option<i64> {
        self.open_time.as_deref().and_then(parse_tstamp)
    }

    pub fn close_tstamp(&self) -> Option<i64> {
        self.close_time.as_deref().and_then(parse_tstamp)
    }
}

/// Unix seconds → `2024-01-02T03:04:05` (UTC).
pub fn format_tstamp(tstamp: i64) -> Option<String> {
    DateTime::from_timestamp(tstamp, 0).map(|dt| dt.naive_utc().format(TIME_FORMAT).to_string())
}

pub fn parse_tstamp(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Append-only CSV writer for finished positions.
#[derive(Debug, Clone)]
pub struct PositionHistoryLog {
    path: PathBuf,
}

impl PositionHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row. The header is written only when the file is new or empty.
    pub fn append(&self, position: &Position) -> Result<(), BotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(HistoryRecord::from_position(position))?;
        writer.flush()?;
        Ok(())
    }
}

/// Read every row of a history log.
pub fn read_history(path: &Path) -> Result<Vec<HistoryRecord>, BotError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
