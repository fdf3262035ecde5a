//! Integration tests for position/order reconciliation.
//!
//! Each test sets up a local position store and an exchange state on a
//! `PaperExchange`, runs one reconciliation pass and checks both the store and
//! every request that reached the exchange.

use channelbot_core::bot::{
    BotStrategy, OrderInterface, PaperExchange, PositionBook, ReconcileReport, Reconciler,
    ResidualAction, Tick,
};
use channelbot_core::domain::{Bar, Order, Position, PositionStatus};
use channelbot_core::error::BotError;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Strategy with a fixed answer for unmatched amounts.
struct StubStrategy {
    stop: Option<f64>,
    has_data: bool,
    opened: Vec<String>,
}

impl StubStrategy {
    fn with_stop(stop: Option<f64>) -> Self {
        Self {
            stop,
            has_data: true,
            opened: Vec::new(),
        }
    }
}

impl BotStrategy for StubStrategy {
    fn name(&self) -> &str {
        "stub"
    }

    fn got_data_for_position_sync(&self, _bars: &[Bar]) -> bool {
        self.has_data
    }

    fn stop_for_unmatched_amount(&self, _amount: f64, _bars: &[Bar]) -> Option<f64> {
        self.stop
    }

    fn position_got_opened(
        &mut self,
        position: &Position,
        _tick: Tick<'_>,
        _book: &mut PositionBook,
        _orders: &mut dyn OrderInterface,
    ) -> Result<(), BotError> {
        self.opened.push(position.id.clone());
        Ok(())
    }
}

fn bars() -> Vec<Bar> {
    vec![
        Bar::new(180, 100.0, 101.0, 99.0, 100.0),
        Bar::new(120, 100.0, 101.0, 99.0, 100.0),
        Bar::new(60, 100.0, 101.0, 99.0, 100.0),
    ]
}

fn open_position(id: &str, amount: f64, stop: f64) -> Position {
    Position::new(id, Some(stop + 10.0 * amount.signum()), amount, Some(stop), 60)
        .with_status(PositionStatus::Open)
}

fn run(book: &mut PositionBook, strategy: &mut StubStrategy, ex: &mut PaperExchange) -> ReconcileReport {
    let bars = bars();
    let account = ex.account();
    Reconciler::default()
        .reconcile(Tick::new(&bars, &account), book, strategy, ex)
        .unwrap()
}

// ──────────────────────────────────────────────
// Fast path
// ──────────────────────────────────────────────

#[test]
fn matched_position_is_left_alone() {
    let mut book = PositionBook::new();
    book.add_position(open_position("1-LONG", 10.0, 100.0));
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("1-LONG_SL_5", -10.0).with_stop(100.0));
    ex.set_quantity(10.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(Some(95.0)), &mut ex);

    assert!(report.in_sync);
    assert_eq!(ex.request_count(), 0);
    assert_eq!(book.store().get("1-LONG"), Some(&open_position("1-LONG", 10.0, 100.0)));
}

#[test]
fn skips_without_strategy_data() {
    let mut book = PositionBook::new();
    book.add_position(open_position("1-LONG", 10.0, 100.0));
    let mut ex = PaperExchange::new(1.0);
    let mut strategy = StubStrategy::with_stop(Some(95.0));
    strategy.has_data = false;

    let report = run(&mut book, &mut strategy, &mut ex);

    assert!(report.skipped);
    assert_eq!(ex.request_count(), 0);
    assert_eq!(book.store().len(), 1);
}

#[test]
fn foreign_orders_are_ignored() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("manual-order", 1.0).with_limit(90.0));
    ex.inject_order(Order::new("abc_FOO", 1.0).with_limit(90.0));

    let report = run(&mut book, &mut StubStrategy::with_stop(Some(95.0)), &mut ex);

    assert!(report.in_sync);
    assert!(book.store().is_empty());
    assert_eq!(ex.request_count(), 0);
}

// ──────────────────────────────────────────────
// Orphaned orders
// ──────────────────────────────────────────────

#[test]
fn unknown_entry_is_adopted_as_pending() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("7-LONG_ENTRY", 5.0).with_stop(50.0));

    let report = run(&mut book, &mut StubStrategy::with_stop(Some(45.0)), &mut ex);

    let position = book.store().get("7-LONG").unwrap();
    assert_eq!(position.status, PositionStatus::Pending);
    assert_eq!(position.amount, 5.0);
    assert_eq!(position.wanted_entry, Some(50.0));
    assert_eq!(position.initial_stop, Some(45.0));
    assert_eq!(report.adopted, vec!["7-LONG".to_string()]);
    assert_eq!(ex.request_count(), 0);
}

#[test]
fn triggered_unknown_entry_is_adopted_as_triggered() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    let mut order = Order::new("7-SHORT_ENTRY", -5.0).with_stop(50.0);
    order.stop_triggered = true;
    ex.inject_order(order);

    run(&mut book, &mut StubStrategy::with_stop(Some(55.0)), &mut ex);

    assert_eq!(book.store().get("7-SHORT").unwrap().status, PositionStatus::Triggered);
}

#[test]
fn unknown_entry_without_stop_is_cancelled() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("7-LONG_ENTRY", 5.0).with_stop(50.0));

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(book.store().is_empty());
    assert_eq!(ex.cancelled_ids(), &["7-LONG_ENTRY".to_string()]);
    assert_eq!(report.canceled_orders, vec!["7-LONG_ENTRY".to_string()]);
}

#[test]
fn entry_order_rekeys_matching_pending_position() {
    let mut book = PositionBook::new();
    book.add_position(Position::new("old-LONG", Some(50.0), 5.0, Some(45.0), 60));
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("new-LONG_ENTRY", 5.0).with_stop(50.0));

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(!book.store().contains("old-LONG"));
    let position = book.store().get("new-LONG").unwrap();
    assert_eq!(position.id, "new-LONG");
    assert_eq!(position.initial_stop, Some(45.0));
    assert_eq!(report.renamed, vec![("old-LONG".to_string(), "new-LONG".to_string())]);
    assert_eq!(ex.request_count(), 0);
}

#[test]
fn exit_order_rekeys_matching_open_position() {
    let mut book = PositionBook::new();
    book.add_position(open_position("old-SHORT", -4.0, 110.0));
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("new-SHORT_SL_3", 4.0).with_stop(110.0));
    ex.set_quantity(-4.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(book.store().contains("new-SHORT"));
    assert_eq!(report.renamed.len(), 1);
    assert_eq!(ex.request_count(), 0);
}

#[test]
fn unknown_exits_adopt_one_open_position() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("9-LONG_SL_1", -2.0).with_stop(90.0));
    ex.inject_order(Order::new("9-LONG_TP_2", -2.0).with_limit(120.0));
    ex.set_quantity(2.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert_eq!(book.store().len(), 1);
    let position = book.store().get("9-LONG").unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.amount, 2.0);
    assert_eq!(position.initial_stop, Some(90.0));
    assert_eq!(position.wanted_entry, None);
    assert_eq!(report.adopted, vec!["9-LONG".to_string()]);
    assert_eq!(report.residual, ResidualAction::None);
    assert_eq!(ex.request_count(), 0);
}

// ──────────────────────────────────────────────
// Positions without orders
// ──────────────────────────────────────────────

#[test]
fn open_position_without_exchange_quantity_is_closed() {
    let mut book = PositionBook::new();
    book.add_position(open_position("1-LONG", 10.0, 100.0));
    let mut ex = PaperExchange::new(1.25);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(book.store().is_empty());
    let closed = &book.history()[0];
    assert_eq!(closed.status, PositionStatus::Closed);
    assert_eq!(closed.exit_equity, Some(1.25));
    assert_eq!(closed.exit_tstamp, Some(180));
    assert_eq!(closed.filled_exit, None);
    assert_eq!(report.closed, vec!["1-LONG".to_string()]);
    assert_eq!(ex.request_count(), 0);
}

#[test]
fn open_position_still_held_gets_a_stop() {
    let mut book = PositionBook::new();
    book.add_position(open_position("1-LONG", 10.0, 100.0));
    let mut ex = PaperExchange::new(1.0);
    ex.set_quantity(10.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert_eq!(ex.sent_orders().len(), 1);
    let stop = &ex.sent_orders()[0];
    assert!(stop.id.starts_with("1-LONG_SL_"));
    assert_eq!(stop.amount, -10.0);
    assert_eq!(stop.stop_price, Some(100.0));
    assert_eq!(report.stops_placed, vec![stop.id.clone()]);
    assert_eq!(book.store().get("1-LONG").unwrap().status, PositionStatus::Open);
}

#[test]
fn pending_position_covered_by_quantity_is_opened() {
    let mut book = PositionBook::new();
    book.add_position(Position::new("2-LONG", Some(101.0), 3.0, Some(95.0), 60));
    let mut ex = PaperExchange::new(1.0);
    ex.set_quantity(3.0);
    let mut strategy = StubStrategy::with_stop(None);

    let report = run(&mut book, &mut strategy, &mut ex);

    let position = book.store().get("2-LONG").unwrap();
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.entry_tstamp, Some(180));
    assert_eq!(position.filled_entry, None);
    assert_eq!(strategy.opened, vec!["2-LONG".to_string()]);
    assert_eq!(report.opened, vec!["2-LONG".to_string()]);
    // its protective stop goes out in the same pass
    assert_eq!(ex.sent_orders().len(), 1);
    assert_eq!(ex.sent_orders()[0].stop_price, Some(95.0));
}

#[test]
fn pending_position_without_quantity_is_missed() {
    let mut book = PositionBook::new();
    book.add_position(Position::new("2-SHORT", Some(99.0), -3.0, Some(105.0), 60));
    let mut ex = PaperExchange::new(1.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(book.store().is_empty());
    assert_eq!(book.history()[0].status, PositionStatus::Missed);
    assert_eq!(report.missed, vec!["2-SHORT".to_string()]);
}

#[test]
fn finished_positions_left_in_the_store_are_archived() {
    let mut book = PositionBook::new();
    let mut done = open_position("1-LONG", 10.0, 100.0).with_status(PositionStatus::Closed);
    done.exit_tstamp = Some(120);
    book.add_position(done);
    book.add_position(Position::new("2-SHORT", Some(90.0), -5.0, Some(95.0), 60).with_status(PositionStatus::Missed));
    let mut ex = PaperExchange::new(1.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(Some(95.0)), &mut ex);

    assert_eq!(report.closed, vec!["1-LONG".to_string(), "2-SHORT".to_string()]);
    assert!(book.store().is_empty());
    let statuses: Vec<_> = book.history().iter().map(|p| p.status).collect();
    assert_eq!(statuses, vec![PositionStatus::Closed, PositionStatus::Missed]);
    assert_eq!(report.residual, ResidualAction::None);
    assert_eq!(ex.request_count(), 0);
}

// ──────────────────────────────────────────────
// Residual quantity
// ──────────────────────────────────────────────

#[test]
fn residual_is_tracked_with_a_stop() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    ex.set_quantity(6.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(Some(95.0)), &mut ex);

    let position = book.store().iter().next().unwrap();
    assert!(position.id.starts_with("120+"));
    assert!(position.id.ends_with("-LONG"));
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.amount, 6.0);
    assert_eq!(position.initial_stop, Some(95.0));

    assert_eq!(ex.sent_orders().len(), 1);
    assert_eq!(ex.sent_orders()[0].amount, -6.0);
    assert_eq!(ex.sent_orders()[0].stop_price, Some(95.0));
    assert!(matches!(report.residual, ResidualAction::Tracked { amount, .. } if amount == 6.0));
}

#[test]
fn residual_without_stop_is_closed_at_market() {
    let mut book = PositionBook::new();
    let mut ex = PaperExchange::new(1.0);
    ex.set_quantity(6.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(book.store().is_empty());
    let close = &ex.sent_orders()[0];
    assert!(close.id.ends_with("_marketClose"));
    assert!(close.is_market());
    assert_eq!(close.amount, -6.0);
    assert_eq!(ex.quantity(), 0.0);
    assert!(matches!(report.residual, ResidualAction::MarketClose { amount, .. } if amount == -6.0));
}

#[test]
fn market_close_never_flips_the_position() {
    // bot tracks -3 (with stop), exchange is +4: residual +7, but only 4 exist
    let mut book = PositionBook::new();
    book.add_position(open_position("1-SHORT", -3.0, 110.0));
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("1-SHORT_SL_1", 3.0).with_stop(110.0));
    ex.set_quantity(4.0);

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert!(matches!(report.residual, ResidualAction::MarketClose { amount, .. } if amount == -4.0));
    assert_eq!(ex.quantity(), 0.0);
}

#[test]
fn residual_against_exchange_direction_is_ignored() {
    // bot tracks +10 with a stop, exchange reports flat
    let mut book = PositionBook::new();
    book.add_position(open_position("1-LONG", 10.0, 100.0));
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("1-LONG_SL_5", -10.0).with_stop(100.0));

    let report = run(&mut book, &mut StubStrategy::with_stop(None), &mut ex);

    assert_eq!(report.residual, ResidualAction::Ignored { amount: -10.0 });
    assert_eq!(ex.request_count(), 0);
    assert!(book.store().contains("1-LONG"));
}

// ──────────────────────────────────────────────
// Idempotence
// ──────────────────────────────────────────────

#[test]
fn second_pass_finds_nothing_to_do() {
    let mut book = PositionBook::new();
    book.add_position(open_position("1-LONG", 10.0, 100.0));
    book.add_position(Position::new("2-LONG", Some(101.0), 3.0, Some(95.0), 60));
    book.add_position(open_position("3-SHORT", -2.0, 120.0));
    let mut ex = PaperExchange::new(1.0);
    ex.inject_order(Order::new("7-LONG_ENTRY", 5.0).with_stop(50.0));
    ex.set_quantity(14.0);
    let mut strategy = StubStrategy::with_stop(Some(90.0));

    let first = run(&mut book, &mut strategy, &mut ex);
    assert!(!first.is_noop());
    let requests = ex.request_count();
    let positions: Vec<Position> = book.store().iter().cloned().collect();

    let second = run(&mut book, &mut strategy, &mut ex);

    assert!(second.in_sync, "second pass: {second:?}");
    assert_eq!(ex.request_count(), requests);
    let after: Vec<Position> = book.store().iter().cloned().collect();
    assert_eq!(after, positions);
}
