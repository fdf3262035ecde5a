//! Signal source abstraction: per-bar channel levels the strategy trails to.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Channel levels computed for one closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    /// Stop level for longs (lower band).
    pub long_trail: f64,
    /// Stop level for shorts (upper band).
    pub short_trail: f64,
    /// Latest swing high, if one is in range.
    pub long_swing: Option<f64>,
    /// Latest swing low, if one is in range.
    pub short_swing: Option<f64>,
    pub atr: f64,
}

pub trait SignalSource: Send {
    fn name(&self) -> &str;

    /// Bars needed before [`data_for`](SignalSource::data_for) returns
    /// anything for `bars[1]`.
    fn min_bars_needed(&self) -> usize;

    /// Recompute from bars ordered newest first.
    fn on_tick(&mut self, bars: &[Bar]);

    fn data_for(&self, bar: &Bar) -> Option<&ChannelData>;
}
