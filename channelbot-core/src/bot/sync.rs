//! Execution sync: walk the exchange's order history and apply new fills to
//! tracked positions.

use tracing::{info, warn};

use crate::domain::{decode_order_type, decode_position_id, OrderType, PositionStatus};
use crate::error::BotError;

use super::book::PositionBook;
use super::interface::OrderInterface;
use super::strategy::{BotStrategy, Tick};

/// What one sync pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Executions looked at (non-zero executed amount).
    pub processed: usize,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    /// Set when the exchange history got shorter than what was already seen.
    pub history_reset: bool,
}

/// Cursor over the exchange order history.
///
/// Each history entry is handled at most once: the cursor advances before the
/// entry's side effects run, so a failure mid-way never replays it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSync {
    known_order_history: usize,
}

impl ExecutionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_order_history(&self) -> usize {
        self.known_order_history
    }

    pub fn reset(&mut self) {
        self.known_order_history = 0;
    }

    pub fn sync(
        &mut self,
        tick: Tick<'_>,
        book: &mut PositionBook,
        strategy: &mut dyn BotStrategy,
        orders: &mut dyn OrderInterface,
    ) -> Result<SyncReport, BotError> {
        let account = tick.account;
        let history = &account.order_history;
        let mut report = SyncReport::default();

        if history.len() < self.known_order_history {
            warn!(
                "order history shrank from {} to {} entries, skipping execution sync",
                self.known_order_history,
                history.len()
            );
            self.known_order_history = history.len();
            report.history_reset = true;
            return Ok(report);
        }

        for (idx, order) in history.iter().enumerate().skip(self.known_order_history) {
            self.known_order_history = idx + 1;
            if order.executed_amount == 0.0 {
                continue;
            }
            report.processed += 1;

            let Some(position_id) = decode_position_id(&order.id) else {
                info!("executed order {} is not one of ours", order.id);
                continue;
            };
            let Some(status) = book.store().get(position_id).map(|p| p.status) else {
                info!("executed order not found in positions: {}", order.id);
                continue;
            };

            match decode_order_type(&order.id) {
                Some(OrderType::Entry) if status.is_waiting() => {
                    info!("position {position_id} got opened by {}", order.id);
                    if let Some(opened) = book.open_position(position_id, Some(order), tick) {
                        strategy.position_got_opened(&opened, tick, book, orders)?;
                    }
                    report.opened.push(position_id.to_string());
                }
                Some(order_type) if order_type.is_exit() && status == PositionStatus::Open => {
                    info!("position {position_id} got closed by {}", order.id);
                    if let Some(position) = book.store_mut().get_mut(position_id) {
                        position.status = PositionStatus::Closed;
                        position.filled_exit = order.executed_price;
                        position.exit_tstamp = order.execution_tstamp;
                        position.exit_equity = Some(account.equity);
                    }
                    book.close_position(position_id, account, orders)?;
                    report.closed.push(position_id.to_string());
                }
                order_type => {
                    warn!(
                        "don't know what to do with execution of {} ({:?}) for position {position_id} in status {status}",
                        order.id, order_type
                    );
                }
            }
        }

        Ok(report)
    }
}
