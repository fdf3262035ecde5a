//! Bar: the fundamental market data unit.

use serde::{Deserialize, Serialize};

/// OHLCV bar for the traded instrument.
///
/// Bar slices handed to the engine are ordered newest first: `bars[0]` is the
/// current (still forming) bar, `bars[1]` the last closed bar, `bars[2]` the one
/// before that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, unix seconds.
    pub tstamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(tstamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            tstamp,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
