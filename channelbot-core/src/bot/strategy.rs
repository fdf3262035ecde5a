//! Strategy capability set the engine calls into.

use crate::domain::{Account, Bar, Order, Position};
use crate::error::BotError;

use super::book::PositionBook;
use super::interface::OrderInterface;

/// Read-only inputs of one tick. Bars are ordered newest first: `bars[0]` is
/// the bar still forming, `bars[1]` the last closed one.
#[derive(Debug, Clone, Copy)]
pub struct Tick<'a> {
    pub bars: &'a [Bar],
    pub account: &'a Account,
}

impl<'a> Tick<'a> {
    pub fn new(bars: &'a [Bar], account: &'a Account) -> Self {
        Self { bars, account }
    }

    pub fn current_tstamp(&self) -> i64 {
        self.bars.first().map(|b| b.tstamp).unwrap_or_default()
    }

    /// Timestamp of the last closed bar, falling back to the current one.
    pub fn last_closed_tstamp(&self) -> i64 {
        self.bars
            .get(1)
            .or_else(|| self.bars.first())
            .map(|b| b.tstamp)
            .unwrap_or_default()
    }
}

/// What the strategy wants done with a working order.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderAction {
    Keep,
    /// Send the given order (same id, new prices) as an update.
    Update(Order),
    Cancel,
}

/// Hooks a strategy provides to the tick driver.
///
/// Only [`name`](BotStrategy::name) and
/// [`got_data_for_position_sync`](BotStrategy::got_data_for_position_sync) are
/// required; the rest default to doing nothing.
pub trait BotStrategy: Send {
    fn name(&self) -> &str;

    /// Bars a tick needs, newest first. The driver never runs with fewer than
    /// two: the forming bar and the last closed one.
    fn min_bars_needed(&self) -> usize {
        2
    }

    /// Refresh indicators. Called every tick before any order work.
    fn prep_bars(&mut self, _is_new_bar: bool, _bars: &[Bar]) {}

    /// Whether the strategy has what it needs to compute stops for positions
    /// it does not know about. Reconciliation is skipped while this is false.
    fn got_data_for_position_sync(&self, bars: &[Bar]) -> bool;

    /// Stop price to protect `amount` contracts the bot cannot account for.
    /// `None` means the strategy cannot protect them.
    fn stop_for_unmatched_amount(&self, _amount: f64, _bars: &[Bar]) -> Option<f64> {
        None
    }

    /// A position just became `open`.
    fn position_got_opened(
        &mut self,
        _position: &Position,
        _tick: Tick<'_>,
        _book: &mut PositionBook,
        _orders: &mut dyn OrderInterface,
    ) -> Result<(), BotError> {
        Ok(())
    }

    /// Decide what to do with one working order. `position` is the tracked
    /// position the order id decodes to, if any.
    fn manage_open_order(
        &mut self,
        _order: &Order,
        _position: Option<&Position>,
        _tick: Tick<'_>,
    ) -> OrderAction {
        OrderAction::Keep
    }

    /// Place new entries for the current tick.
    fn open_orders(
        &mut self,
        _tick: Tick<'_>,
        _book: &mut PositionBook,
        _orders: &mut dyn OrderInterface,
    ) -> Result<(), BotError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_timestamps() {
        let bars = vec![Bar::new(300, 1.0, 1.0, 1.0, 1.0), Bar::new(240, 1.0, 1.0, 1.0, 1.0)];
        let account = Account::new(1.0);
        let tick = Tick::new(&bars, &account);
        assert_eq!(tick.current_tstamp(), 300);
        assert_eq!(tick.last_closed_tstamp(), 240);

        let single = Tick::new(&bars[..1], &account);
        assert_eq!(single.last_closed_tstamp(), 300);
    }
}
