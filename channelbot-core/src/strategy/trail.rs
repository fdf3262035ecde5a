//! Stop trailing and break-even levels.
//!
//! **Core rule:** a stop only moves in the risk-reducing direction (up for
//! longs, down for shorts). The single exception is `trail_back`, which lets a
//! trail retreat, but never past the initial stop.

use crate::config::BreakEvenConfig;
use crate::domain::{Bar, Instrument, Position, PositionDirection};

#[derive(Debug, Clone, PartialEq)]
pub struct StopTrailer {
    instrument: Instrument,
    trail_back: bool,
}

impl StopTrailer {
    pub fn new(instrument: Instrument, trail_back: bool) -> Self {
        Self { instrument, trail_back }
    }

    /// Move `current` toward `candidate` if that reduces risk.
    ///
    /// With `trail_back` (and not `only_forward`) the stop may also move back
    /// to `candidate` as long as that is still better than `initial`.
    /// Accepted levels are rounded to the tick in the risk-reducing direction.
    pub fn trail(
        &self,
        direction: PositionDirection,
        current: f64,
        candidate: f64,
        initial: Option<f64>,
        only_forward: bool,
    ) -> f64 {
        let dir = direction.sign();
        let forward = (candidate - current) * dir > 0.0;
        let allowed_back = !only_forward
            && self.trail_back
            && initial.is_some_and(|initial| (candidate - initial) * dir > 0.0);

        if forward || allowed_back {
            self.instrument.round_stop(candidate, dir)
        } else {
            current
        }
    }
}

/// Break-even stop level for `position`, if the current bar has run far enough.
///
/// Triggers once the bar's extreme (high for longs, low for shorts) is strictly
/// beyond `entry + (entry - initial_stop) * factor`; the level returned is
/// `entry + (entry - initial_stop) * buffer`.
pub fn break_even_level(position: &Position, bar: &Bar, config: &BreakEvenConfig) -> Option<f64> {
    if config.factor <= 0.0 {
        return None;
    }
    let entry = position.wanted_entry?;
    let initial = position.initial_stop?;
    let risk = entry - initial;
    let extreme = if position.is_long() { bar.high } else { bar.low };

    if (extreme - (entry + risk * config.factor)) * position.amount > 0.0 {
        Some(entry + risk * config.buffer)
    } else {
        None
    }
}
