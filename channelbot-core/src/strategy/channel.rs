//! Channel strategy: manages stops of open positions along a price channel.
//!
//! Every stop order of a tracked position is trailed to the channel level of
//! the last closed bar (optionally tightened to the latest swing), and moved to
//! break-even once price has run far enough. Entry generation is left to
//! strategies built on top of this one.

use tracing::info;

use crate::bot::{BotStrategy, OrderAction, OrderInterface, PositionBook, Tick};
use crate::config::{BotConfig, StrategyConfig};
use crate::domain::{decode_order_type, other_direction_id, Bar, Instrument, Order, OrderType, Position};
use crate::error::BotError;

use super::donchian::DonchianChannel;
use super::signal::{ChannelData, SignalSource};
use super::sizing::PositionSizer;
use super::trail::{break_even_level, StopTrailer};

pub struct ChannelStrategy {
    signal: Box<dyn SignalSource>,
    instrument: Instrument,
    trailer: StopTrailer,
    sizer: PositionSizer,
    config: StrategyConfig,
}

impl ChannelStrategy {
    pub fn new(signal: Box<dyn SignalSource>, instrument: Instrument, config: StrategyConfig) -> Self {
        info!(
            "init {} with risk {:.3} {:?} {:.1} | be {:.1} {:.1} | trail {} {} {} {}",
            signal.name(),
            config.risk.risk_factor,
            config.risk.risk_type,
            config.risk.max_risk_mul,
            config.break_even.factor,
            config.break_even.buffer,
            config.trail.active,
            config.trail.delayed_swing,
            config.trail.trail_to_swing,
            config.trail.trail_back
        );
        Self {
            trailer: StopTrailer::new(instrument.clone(), config.trail.trail_back),
            sizer: PositionSizer::new(config.risk.clone(), instrument.is_inverse),
            signal,
            instrument,
            config,
        }
    }

    /// Channel strategy on a Donchian channel, as configured.
    pub fn from_config(config: &BotConfig) -> Self {
        let channel = DonchianChannel::new(&config.strategy.channel);
        Self::new(Box::new(channel), config.instrument.clone(), config.strategy.clone())
    }

    pub fn signal(&self) -> &dyn SignalSource {
        self.signal.as_ref()
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    fn data(&self, bars: &[Bar], idx: usize) -> Option<&ChannelData> {
        bars.get(idx).and_then(|bar| self.signal.data_for(bar))
    }

    /// Size for a new entry, risking the configured share of `equity`.
    /// `None` while the channel has no data for the last closed bar.
    pub fn position_size(&self, equity: f64, entry: f64, stop: f64, bars: &[Bar]) -> Option<f64> {
        let data = self.data(bars, 1)?;
        Some(self.sizer.size(self.sizer.risk_amount(equity), entry, stop, data.atr))
    }

    /// `(long, short)` trail levels from the last closed bar.
    pub fn trail_levels(&self, bars: &[Bar]) -> Option<(f64, f64)> {
        let data = self.data(bars, 1)?;
        let mut long = data.long_trail;
        let mut short = data.short_trail;

        let trail = &self.config.trail;
        if trail.trail_to_swing {
            if let (Some(long_swing), Some(short_swing)) = (data.long_swing, data.short_swing) {
                let confirmed = !trail.delayed_swing
                    || self
                        .data(bars, 2)
                        .is_some_and(|last| last.long_swing.is_some() && last.short_swing.is_some());
                if confirmed {
                    long = short_swing.max(long);
                    short = long_swing.min(short);
                }
            }
        }
        Some((long, short))
    }
}

impl BotStrategy for ChannelStrategy {
    fn name(&self) -> &str {
        "channel"
    }

    /// Stops come from the channel at `bars[1]`, which the signal's own
    /// minimum already covers.
    fn min_bars_needed(&self) -> usize {
        self.signal.min_bars_needed()
    }

    fn prep_bars(&mut self, is_new_bar: bool, bars: &[Bar]) {
        if is_new_bar {
            self.signal.on_tick(bars);
        }
    }

    fn got_data_for_position_sync(&self, bars: &[Bar]) -> bool {
        self.data(bars, 1).is_some()
    }

    fn stop_for_unmatched_amount(&self, amount: f64, bars: &[Bar]) -> Option<f64> {
        let data = self.data(bars, 1)?;
        let direction = amount.signum();
        let level = if amount > 0.0 { data.long_trail } else { data.short_trail };
        Some(self.instrument.round_stop(level, direction))
    }

    /// Cancel the still-waiting entry for the same signal in the other
    /// direction.
    fn position_got_opened(
        &mut self,
        position: &Position,
        tick: Tick<'_>,
        book: &mut PositionBook,
        orders: &mut dyn OrderInterface,
    ) -> Result<(), BotError> {
        let Some(other_id) = other_direction_id(&position.id) else {
            return Ok(());
        };
        if book.store().get(&other_id).is_some_and(|p| p.status.is_waiting()) {
            info!("position {} opened, canceling entry of {other_id}", position.id);
            book.cancel_entry(&other_id, tick.account, orders)?;
        }
        Ok(())
    }

    fn manage_open_order(&mut self, order: &Order, position: Option<&Position>, tick: Tick<'_>) -> OrderAction {
        let Some(position) = position else {
            return OrderAction::Keep;
        };
        if decode_order_type(&order.id) != Some(OrderType::Sl) {
            return OrderAction::Keep;
        }
        let (Some(current), Some(direction)) = (order.stop_price, position.direction()) else {
            return OrderAction::Keep;
        };
        let Some((long, short)) = self.trail_levels(tick.bars) else {
            return OrderAction::Keep;
        };

        let mut new_stop = current;
        if self.config.trail.active {
            let candidate = if position.is_long() { long } else { short };
            new_stop = self
                .trailer
                .trail(direction, new_stop, candidate, position.initial_stop, false);
        }
        if let Some(level) = tick
            .bars
            .first()
            .and_then(|bar| break_even_level(position, bar, &self.config.break_even))
        {
            new_stop = self
                .trailer
                .trail(direction, new_stop, level, position.initial_stop, true);
        }

        if new_stop != current {
            let mut updated = order.clone();
            updated.stop_price = Some(new_stop);
            OrderAction::Update(updated)
        } else {
            OrderAction::Keep
        }
    }
}
