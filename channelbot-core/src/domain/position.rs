use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::PositionDirection;

/// Lifecycle of a tracked position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    /// Entry order working, not yet hit.
    Pending,
    /// Entry stop hit, fill not yet confirmed.
    Triggered,
    Open,
    Closed,
    /// Entry never filled (or could not be accounted for).
    Missed,
}

impl PositionStatus {
    /// Waiting for the entry fill.
    pub fn is_waiting(&self) -> bool {
        matches!(self, PositionStatus::Pending | PositionStatus::Triggered)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, PositionStatus::Closed | PositionStatus::Missed)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionStatus::Pending => "pending",
            PositionStatus::Triggered => "triggered",
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
            PositionStatus::Missed => "missed",
        };
        f.write_str(s)
    }
}

/// A tracked intended or actual holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// `<signalId>-<LONG|SHORT>`.
    pub id: String,
    pub status: PositionStatus,
    /// Signed quantity; the sign matches the direction in `id`.
    pub amount: f64,
    /// Unknown for positions rebuilt from an exit order or residual quantity.
    pub wanted_entry: Option<f64>,
    pub initial_stop: Option<f64>,
    pub filled_entry: Option<f64>,
    pub filled_exit: Option<f64>,
    pub signal_tstamp: i64,
    pub entry_tstamp: Option<i64>,
    pub exit_tstamp: Option<i64>,
    pub exit_equity: Option<f64>,
}

impl Position {
    /// New pending position.
    pub fn new(
        id: impl Into<String>,
        entry: Option<f64>,
        amount: f64,
        stop: Option<f64>,
        tstamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            status: PositionStatus::Pending,
            amount,
            wanted_entry: entry,
            initial_stop: stop,
            filled_entry: None,
            filled_exit: None,
            signal_tstamp: tstamp,
            entry_tstamp: None,
            exit_tstamp: None,
            exit_equity: None,
        }
    }

    pub fn with_status(mut self, status: PositionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_long(&self) -> bool {
        self.amount > 0.0
    }

    pub fn direction(&self) -> Option<PositionDirection> {
        PositionDirection::from_amount(self.amount)
    }
}
