//! Position/order reconciliation.
//!
//! Brings the position store back in line with what the exchange reports:
//! working orders are matched to positions by id, orphaned orders adopt or
//! rename positions, positions without orders are resolved against the net
//! exchange quantity, and whatever quantity is left over is either protected
//! with a stop or closed at market.
//!
//! The pass is idempotent: once it has run, running it again against the same
//! exchange state finds nothing to do.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::domain::{
    decode_order_type, decode_position_id, encode_order_id, encode_position_id, Order, OrderType,
    Position, PositionDirection, PositionStatus, ORDER_ID_SEPARATOR,
};
use crate::error::BotError;

use super::book::PositionBook;
use super::interface::OrderInterface;
use super::strategy::{BotStrategy, Tick};

/// Quantities closer than this are treated as equal.
pub const DEFAULT_EPSILON: f64 = 0.1;

/// What happened to exchange quantity no position accounts for.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResidualAction {
    #[default]
    None,
    /// A new open position with a protective stop now tracks it.
    Tracked {
        position_id: String,
        amount: f64,
        stop: f64,
    },
    /// A market order was sent to flatten it.
    MarketClose { order_id: String, amount: f64 },
    /// Closing it would have increased exposure; left alone.
    Ignored { amount: f64 },
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Store and exchange already agreed; nothing was touched.
    pub in_sync: bool,
    /// The strategy had no data to compute stops; nothing was touched.
    pub skipped: bool,
    /// `(old id, new id)` for positions re-keyed to match an orphaned order.
    pub renamed: Vec<(String, String)>,
    /// Positions created from orphaned orders.
    pub adopted: Vec<String>,
    pub canceled_orders: Vec<String>,
    pub opened: Vec<String>,
    pub missed: Vec<String>,
    pub closed: Vec<String>,
    /// Ids of stop orders placed for unprotected open positions.
    pub stops_placed: Vec<String>,
    pub residual: ResidualAction,
}

impl ReconcileReport {
    /// True if the pass changed neither the store nor the exchange.
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty()
            && self.adopted.is_empty()
            && self.canceled_orders.is_empty()
            && self.opened.is_empty()
            && self.missed.is_empty()
            && self.closed.is_empty()
            && self.stops_placed.is_empty()
            && matches!(self.residual, ResidualAction::None | ResidualAction::Ignored { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    epsilon: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl Reconciler {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// `qty` has the same sign as `amount` and covers it up to epsilon.
    fn covers(&self, qty: f64, amount: f64) -> bool {
        qty * amount > 0.0 && qty.abs() > amount.abs() - self.epsilon
    }

    pub fn reconcile(
        &self,
        tick: Tick<'_>,
        book: &mut PositionBook,
        strategy: &mut dyn BotStrategy,
        orders: &mut dyn OrderInterface,
    ) -> Result<ReconcileReport, BotError> {
        let account = tick.account;
        let mut report = ReconcileReport::default();

        if !strategy.got_data_for_position_sync(tick.bars) {
            warn!("got no initial data, can't sync positions");
            report.skipped = true;
            return Ok(report);
        }

        let exchange_qty = account.open_position.quantity;
        let mut unmatched_positions = book.store().ids();
        let mut unmatched_orders: Vec<&Order> = Vec::new();
        for order in &account.open_orders {
            let (Some(_), Some(position_id)) =
                (decode_order_type(&order.id), decode_position_id(&order.id))
            else {
                continue;
            };
            if book.store().contains(position_id) {
                unmatched_positions.retain(|id| id != position_id);
            } else {
                unmatched_orders.push(order);
            }
        }

        let bot_qty = book.store().open_amount();
        if unmatched_orders.is_empty()
            && unmatched_positions.is_empty()
            && (bot_qty - exchange_qty).abs() < self.epsilon
        {
            report.in_sync = true;
            return Ok(report);
        }

        info!(
            "has to start order/pos sync with bot vs acc: {:.3} vs. {:.3} and {} vs {}, unmatched: {}, {}",
            bot_qty,
            exchange_qty,
            book.store().len(),
            account.open_orders.len(),
            unmatched_positions.len(),
            unmatched_orders.len()
        );

        self.match_orders(tick, book, strategy, orders, &unmatched_orders, &mut unmatched_positions, &mut report)?;
        info!("found {} existing positions on sync", book.store().len());

        let remaining = exchange_qty - book.store().open_amount();
        let remaining =
            self.resolve_positions(tick, book, strategy, orders, &unmatched_positions, remaining, &mut report)?;
        self.handle_residual(tick, book, strategy, orders, remaining, &mut report)?;

        Ok(report)
    }

    /// Pair orphaned orders with unmatched positions, adopting or cancelling
    /// the ones that have no counterpart.
    #[allow(clippy::too_many_arguments)]
    fn match_orders(
        &self,
        tick: Tick<'_>,
        book: &mut PositionBook,
        strategy: &mut dyn BotStrategy,
        orders: &mut dyn OrderInterface,
        unmatched_orders: &[&Order],
        unmatched_positions: &mut Vec<String>,
        report: &mut ReconcileReport,
    ) -> Result<(), BotError> {
        for &order in unmatched_orders {
            let (Some(order_type), Some(position_id)) =
                (decode_order_type(&order.id), decode_position_id(&order.id))
            else {
                continue;
            };
            // Ids created earlier in this pass (e.g. SL and TP of one position).
            if book.store().contains(position_id) {
                continue;
            }

            let matched = match order_type {
                OrderType::Entry => unmatched_positions.iter().position(|id| {
                    book.store().get(id).is_some_and(|p| {
                        p.status.is_waiting()
                            && p.amount == order.amount
                            && p.wanted_entry.is_some()
                            && p.wanted_entry == order.entry_price()
                    })
                }),
                OrderType::Sl | OrderType::Tp => unmatched_positions.iter().position(|id| {
                    book.store()
                        .get(id)
                        .is_some_and(|p| p.status == PositionStatus::Open && p.amount == -order.amount)
                }),
            };

            if let Some(idx) = matched {
                let old_id = unmatched_positions.remove(idx);
                if book.store_mut().rename(&old_id, position_id) {
                    info!("unmatched order {} matched to position {old_id}, adapted position id", order.id);
                    report.renamed.push((old_id, position_id.to_string()));
                }
                continue;
            }

            match order_type {
                OrderType::Entry => match strategy.stop_for_unmatched_amount(order.amount, tick.bars) {
                    Some(stop) => {
                        let status = if order.stop_triggered {
                            PositionStatus::Triggered
                        } else {
                            PositionStatus::Pending
                        };
                        warn!(
                            "found unknown entry {} {:.3} @ {:.1}, added position",
                            order.id,
                            order.amount,
                            order.display_price()
                        );
                        book.add_position(
                            Position::new(position_id, order.limit_price.or(order.stop_price), order.amount, Some(stop), tick.current_tstamp())
                                .with_status(status),
                        );
                        report.adopted.push(position_id.to_string());
                    }
                    None => {
                        warn!(
                            "found unknown entry {} {:.3} @ {:.1}, but don't know what stop to use -> canceling",
                            order.id,
                            order.amount,
                            order.display_price()
                        );
                        orders.cancel_order(order)?;
                        report.canceled_orders.push(order.id.clone());
                    }
                },
                OrderType::Sl | OrderType::Tp => {
                    warn!(
                        "found unknown exit {} {:.3} @ {:.1}, opening position for it",
                        order.id,
                        order.amount,
                        order.display_price()
                    );
                    let stop = if order_type == OrderType::Sl { order.stop_price } else { None };
                    book.add_position(
                        Position::new(position_id, None, -order.amount, stop, tick.current_tstamp())
                            .with_status(PositionStatus::Open),
                    );
                    report.adopted.push(position_id.to_string());
                }
            }
        }
        Ok(())
    }

    /// Resolve positions that have no working order. Returns the exchange
    /// quantity still unaccounted for.
    #[allow(clippy::too_many_arguments)]
    fn resolve_positions(
        &self,
        tick: Tick<'_>,
        book: &mut PositionBook,
        strategy: &mut dyn BotStrategy,
        orders: &mut dyn OrderInterface,
        unmatched_positions: &[String],
        mut remaining: f64,
        report: &mut ReconcileReport,
    ) -> Result<f64, BotError> {
        let account = tick.account;
        for id in unmatched_positions {
            let Some((status, amount, initial_stop)) =
                book.store().get(id).map(|p| (p.status, p.amount, p.initial_stop))
            else {
                continue;
            };

            if status.is_final() {
                book.close_position(id, account, orders)?;
                report.closed.push(id.clone());
            } else if status.is_waiting() {
                if self.covers(remaining, amount) {
                    info!("position {id} has no entry order but exchange holds {remaining:.3}, assuming it got opened");
                    if let Some(opened) = book.open_position(id, None, tick) {
                        strategy.position_got_opened(&opened, tick, book, orders)?;
                    }
                    self.protect(id, amount, initial_stop, tick, orders, report)?;
                    remaining -= amount;
                    report.opened.push(id.clone());
                } else {
                    info!("position {id} has no entry order and no matching exchange quantity, marking missed");
                    if let Some(position) = book.store_mut().get_mut(id) {
                        position.status = PositionStatus::Missed;
                        position.exit_tstamp = Some(tick.current_tstamp());
                    }
                    book.close_position(id, account, orders)?;
                    report.missed.push(id.clone());
                }
            } else if self.covers(remaining + amount, amount) {
                self.protect(id, amount, initial_stop, tick, orders, report)?;
            } else {
                info!("open position {id} is not backed by exchange quantity, assuming it got closed");
                if let Some(position) = book.store_mut().get_mut(id) {
                    position.status = PositionStatus::Closed;
                    position.exit_tstamp = Some(tick.current_tstamp());
                    position.exit_equity = Some(account.equity);
                }
                book.close_position(id, account, orders)?;
                remaining += amount;
                report.closed.push(id.clone());
            }
        }
        Ok(remaining)
    }

    /// Place a stop at the initial stop for an open position that has none.
    fn protect(
        &self,
        id: &str,
        amount: f64,
        initial_stop: Option<f64>,
        tick: Tick<'_>,
        orders: &mut dyn OrderInterface,
        report: &mut ReconcileReport,
    ) -> Result<(), BotError> {
        let has_stop = tick
            .account
            .orders_for_position(id)
            .any(|o| decode_order_type(&o.id) == Some(OrderType::Sl));
        match initial_stop {
            Some(_) if has_stop => debug!("open position {id} already has a stop"),
            Some(stop) => {
                let order_id = encode_order_id(id, OrderType::Sl);
                info!("open position {id} has no stop, placing {order_id} @ {stop:.1}");
                orders.send_order(Order::new(&order_id, -amount).with_stop(stop))?;
                report.stops_placed.push(order_id);
            }
            None => warn!("open position {id} has no stop order and no known stop price"),
        }
        Ok(())
    }

    fn handle_residual(
        &self,
        tick: Tick<'_>,
        book: &mut PositionBook,
        strategy: &mut dyn BotStrategy,
        orders: &mut dyn OrderInterface,
        remaining: f64,
        report: &mut ReconcileReport,
    ) -> Result<(), BotError> {
        if remaining.abs() < self.epsilon {
            return Ok(());
        }
        let Some(direction) = PositionDirection::from_amount(remaining) else {
            return Ok(());
        };
        let exchange_qty = tick.account.open_position.quantity;
        let signal_id = fresh_signal_id(book, tick.last_closed_tstamp(), direction);

        match strategy.stop_for_unmatched_amount(remaining, tick.bars) {
            Some(stop) => {
                let position_id = encode_position_id(&signal_id, direction);
                info!("couldn't account for {remaining:.3} open contracts, adding position {position_id} with stop {stop:.1}");
                book.add_position(
                    Position::new(&position_id, None, remaining, Some(stop), tick.current_tstamp())
                        .with_status(PositionStatus::Open),
                );
                orders.send_order(Order::new(encode_order_id(&position_id, OrderType::Sl), -remaining).with_stop(stop))?;
                report.residual = ResidualAction::Tracked {
                    position_id,
                    amount: remaining,
                    stop,
                };
            }
            None if exchange_qty * remaining > 0.0 => {
                let amount = -remaining.signum() * remaining.abs().min(exchange_qty.abs());
                let order_id = format!("{signal_id}{ORDER_ID_SEPARATOR}marketClose");
                info!("couldn't account for {remaining:.3} open contracts and have no stop, closing {amount:.3} at market");
                orders.send_order(Order::new(&order_id, amount))?;
                report.residual = ResidualAction::MarketClose { order_id, amount };
            }
            None => {
                info!(
                    "couldn't account for {remaining:.3} open contracts, but closing would increase exposure -> ignored"
                );
                report.residual = ResidualAction::Ignored { amount: remaining };
            }
        }
        Ok(())
    }
}

/// `<tstamp>+<0-99>`, picking a suffix whose position id is not in use.
fn fresh_signal_id(book: &PositionBook, tstamp: i64, direction: PositionDirection) -> String {
    let first: u8 = rand::thread_rng().gen_range(0..=99);
    (0..100u16)
        .map(|offset| (u16::from(first) + offset) % 100)
        .map(|suffix| format!("{tstamp}+{suffix}"))
        .find(|signal_id| !book.store().contains(&encode_position_id(signal_id, direction)))
        .unwrap_or_else(|| format!("{tstamp}+{first}+{}", book.store().len()))
}
