//! Stop management through the channel strategy: break-even moves, trailing
//! and the forward-only ratchet, checked both on the strategy directly and
//! through a tick against the paper exchange.

use channelbot_core::bot::{BotStrategy, OrderAction, PaperExchange, Tick, TradingBot};
use channelbot_core::config::{BreakEvenConfig, EngineConfig, StrategyConfig, TrailConfig};
use channelbot_core::domain::{Account, Bar, Instrument, Order, Position, PositionStatus};
use channelbot_core::strategy::{ChannelData, ChannelStrategy, SignalSource};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

struct FlatChannel(ChannelData);

impl SignalSource for FlatChannel {
    fn name(&self) -> &str {
        "flat"
    }

    fn min_bars_needed(&self) -> usize {
        2
    }

    fn on_tick(&mut self, _bars: &[Bar]) {}

    fn data_for(&self, _bar: &Bar) -> Option<&ChannelData> {
        Some(&self.0)
    }
}

fn channel(long_trail: f64, short_trail: f64) -> FlatChannel {
    FlatChannel(ChannelData {
        long_trail,
        short_trail,
        long_swing: None,
        short_swing: None,
        atr: 1.0,
    })
}

fn strategy(signal: FlatChannel, trail: TrailConfig, break_even: BreakEvenConfig) -> ChannelStrategy {
    let config = StrategyConfig {
        trail,
        break_even,
        ..Default::default()
    };
    ChannelStrategy::new(Box::new(signal), Instrument::default(), config)
}

fn break_even() -> BreakEvenConfig {
    BreakEvenConfig { factor: 0.5, buffer: 0.1 }
}

/// Current bar with the given range, one closed bar behind it.
fn bars(high: f64, low: f64) -> Vec<Bar> {
    vec![
        Bar::new(120, 100.0, high, low, 100.0),
        Bar::new(60, 100.0, 100.5, 99.5, 100.0),
    ]
}

fn open_long() -> Position {
    Position::new("1-LONG", Some(100.0), 10.0, Some(90.0), 0).with_status(PositionStatus::Open)
}

fn open_short() -> Position {
    Position::new("2-SHORT", Some(100.0), -10.0, Some(110.0), 0).with_status(PositionStatus::Open)
}

fn new_stop(action: OrderAction) -> Option<f64> {
    match action {
        OrderAction::Update(order) => order.stop_price,
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Break-even
// ──────────────────────────────────────────────

#[test]
fn break_even_moves_long_stop_above_entry() {
    let mut strat = strategy(channel(80.0, 120.0), TrailConfig::default(), break_even());
    let account = Account::new(1.0);
    let sl = Order::new("1-LONG_SL_1", -10.0).with_stop(90.0);

    // trigger level is 105, strictly beyond
    let at_trigger = bars(105.0, 99.0);
    let action = strat.manage_open_order(&sl, Some(&open_long()), Tick::new(&at_trigger, &account));
    assert_eq!(action, OrderAction::Keep);

    let beyond = bars(105.5, 99.0);
    let action = strat.manage_open_order(&sl, Some(&open_long()), Tick::new(&beyond, &account));
    assert_eq!(new_stop(action), Some(101.0));
}

#[test]
fn break_even_moves_short_stop_below_entry() {
    let mut strat = strategy(channel(80.0, 120.0), TrailConfig::default(), break_even());
    let account = Account::new(1.0);
    let sl = Order::new("2-SHORT_SL_1", 10.0).with_stop(110.0);

    let run = bars(101.0, 94.0);
    let action = strat.manage_open_order(&sl, Some(&open_short()), Tick::new(&run, &account));
    assert_eq!(new_stop(action), Some(99.0));
}

#[test]
fn break_even_never_loosens_a_tighter_stop() {
    let mut strat = strategy(channel(80.0, 120.0), TrailConfig::default(), break_even());
    let account = Account::new(1.0);
    let sl = Order::new("1-LONG_SL_1", -10.0).with_stop(102.0);

    let run = bars(108.0, 99.0);
    let action = strat.manage_open_order(&sl, Some(&open_long()), Tick::new(&run, &account));
    assert_eq!(action, OrderAction::Keep);
}

// ──────────────────────────────────────────────
// Trailing
// ──────────────────────────────────────────────

#[test]
fn trail_and_break_even_take_the_tighter_level() {
    let trail = TrailConfig {
        active: true,
        ..Default::default()
    };
    let mut strat = strategy(channel(103.0, 120.0), trail, break_even());
    let account = Account::new(1.0);
    let sl = Order::new("1-LONG_SL_1", -10.0).with_stop(90.0);

    let run = bars(106.0, 99.0);
    let action = strat.manage_open_order(&sl, Some(&open_long()), Tick::new(&run, &account));
    assert_eq!(new_stop(action), Some(103.0));
}

#[test]
fn trail_back_retreats_but_not_past_initial_stop() {
    let trail = TrailConfig {
        active: true,
        trail_back: true,
        ..Default::default()
    };
    let account = Account::new(1.0);
    let sl = Order::new("1-LONG_SL_1", -10.0).with_stop(97.0);
    let quiet = bars(100.5, 99.0);

    let mut retreat = strategy(channel(95.0, 120.0), trail.clone(), BreakEvenConfig::default());
    let action = retreat.manage_open_order(&sl, Some(&open_long()), Tick::new(&quiet, &account));
    assert_eq!(new_stop(action), Some(95.0));

    let mut too_far = strategy(channel(85.0, 120.0), trail, BreakEvenConfig::default());
    let action = too_far.manage_open_order(&sl, Some(&open_long()), Tick::new(&quiet, &account));
    assert_eq!(action, OrderAction::Keep);
}

#[test]
fn without_trail_back_the_stop_holds() {
    let trail = TrailConfig {
        active: true,
        ..Default::default()
    };
    let mut strat = strategy(channel(95.0, 120.0), trail, BreakEvenConfig::default());
    let account = Account::new(1.0);
    let sl = Order::new("1-LONG_SL_1", -10.0).with_stop(97.0);

    let action = strat.manage_open_order(&sl, Some(&open_long()), Tick::new(&bars(100.5, 99.0), &account));
    assert_eq!(action, OrderAction::Keep);
}

// ──────────────────────────────────────────────
// Through the tick driver
// ──────────────────────────────────────────────

#[test]
fn tick_applies_break_even_on_the_exchange() {
    let strat = strategy(channel(80.0, 120.0), TrailConfig::default(), break_even());
    let mut bot = TradingBot::new(Box::new(strat), &EngineConfig::default());
    bot.book_mut().add_position(open_long());

    let mut ex = PaperExchange::new(1.0);
    ex.set_quantity(10.0);
    ex.inject_order(Order::new("1-LONG_SL_1", -10.0).with_stop(90.0));

    let report = bot.on_tick(&bars(106.0, 99.0), &ex.account(), &mut ex).unwrap();

    assert!(report.reconcile.in_sync);
    assert_eq!(report.updated_orders, vec!["1-LONG_SL_1".to_string()]);
    assert_eq!(ex.open_orders()[0].stop_price, Some(101.0));

    // price falls back: the stop stays at break-even
    let report = bot.on_tick(&bars(100.0, 97.0), &ex.account(), &mut ex).unwrap();
    assert!(report.updated_orders.is_empty());
    assert_eq!(ex.open_orders()[0].stop_price, Some(101.0));
}
