//! Donchian channel signal source: lowest low / highest high over a window,
//! plus the latest swing points and a simple ATR.
//!
//! Bars arrive newest first. Levels are computed only for closed bars
//! (`bars[1..]`) and cached by bar timestamp, since a closed bar never
//! changes.

use std::collections::HashMap;

use crate::config::ChannelConfig;
use crate::domain::Bar;

use super::signal::{ChannelData, SignalSource};

#[derive(Debug, Clone)]
pub struct DonchianChannel {
    period: usize,
    swing_length: usize,
    atr_period: usize,
    name: String,
    data: HashMap<i64, ChannelData>,
}

impl DonchianChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            period: config.period.max(1),
            swing_length: config.swing_length.max(2),
            atr_period: config.atr_period.max(1),
            name: format!("donchian_{}_{}", config.period, config.swing_length),
            data: HashMap::new(),
        }
    }

    /// Bars (starting at the computed one) a single data point looks at.
    fn lookback(&self) -> usize {
        self.period.max(self.atr_period + 1).max(self.swing_length + 1)
    }

    fn compute(&self, bars: &[Bar], i: usize) -> Option<ChannelData> {
        if i + self.lookback() > bars.len() {
            return None;
        }

        let window = &bars[i..i + self.period];
        let long_trail = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let short_trail = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

        let atr = (i..i + self.atr_period)
            .map(|j| true_range(&bars[j], bars[j + 1].close))
            .sum::<f64>()
            / self.atr_period as f64;

        let (long_swing, short_swing) = swings(&bars[i..=i + self.swing_length]);

        if !(long_trail.is_finite() && short_trail.is_finite() && atr.is_finite()) {
            return None;
        }
        Some(ChannelData {
            long_trail,
            short_trail,
            long_swing,
            short_swing,
            atr,
        })
    }
}

/// max(high-low, |high-prev_close|, |low-prev_close|)
fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Most recent swing high and swing low in a newest-first window. A swing high
/// is a bar whose high exceeds the newer neighbour and is not below the older
/// one; swing lows mirror that.
fn swings(window: &[Bar]) -> (Option<f64>, Option<f64>) {
    let mut swing_high = None;
    let mut swing_low = None;
    for k in 1..window.len().saturating_sub(1) {
        let (newer, bar, older) = (&window[k - 1], &window[k], &window[k + 1]);
        if swing_high.is_none() && bar.high > newer.high && bar.high >= older.high {
            swing_high = Some(bar.high);
        }
        if swing_low.is_none() && bar.low < newer.low && bar.low <= older.low {
            swing_low = Some(bar.low);
        }
    }
    (swing_high, swing_low)
}

impl SignalSource for DonchianChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_bars_needed(&self) -> usize {
        self.lookback() + 1
    }

    fn on_tick(&mut self, bars: &[Bar]) {
        for i in 1..bars.len() {
            let tstamp = bars[i].tstamp;
            if self.data.contains_key(&tstamp) {
                continue;
            }
            match self.compute(bars, i) {
                Some(data) => {
                    self.data.insert(tstamp, data);
                }
                None => break,
            }
        }
        if let Some(oldest) = bars.last() {
            self.data.retain(|tstamp, _| *tstamp >= oldest.tstamp);
        }
    }

    fn data_for(&self, bar: &Bar) -> Option<&ChannelData> {
        self.data.get(&bar.tstamp)
    }
}
