//! Position book: the store plus the lifecycle transitions that touch orders
//! and the history log.

use tracing::{info, warn};

use crate::domain::{
    decode_position_id, encode_order_id, Account, Order, OrderType, Position, PositionStatus,
};
use crate::error::BotError;
use crate::store::{PositionHistoryLog, PositionStore};

use super::interface::OrderInterface;
use super::strategy::Tick;

#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    store: PositionStore,
    history: Vec<Position>,
    history_log: Option<PositionHistoryLog>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_log(mut self, log: PositionHistoryLog) -> Self {
        self.history_log = Some(log);
        self
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PositionStore {
        &mut self.store
    }

    pub fn replace_store(&mut self, store: PositionStore) {
        self.store = store;
    }

    /// Positions that left the store during this run, oldest first.
    pub fn history(&self) -> &[Position] {
        &self.history
    }

    /// Start tracking a new intended position.
    pub fn add_position(&mut self, position: Position) {
        if let Some(previous) = self.store.upsert(position) {
            warn!("replaced existing position {}", previous.id);
        }
    }

    /// Mark a waiting position `open`. With an execution, the fill price and
    /// time come from it; without one the fill price stays unknown and the
    /// current bar's time is used.
    pub fn open_position(&mut self, id: &str, execution: Option<&Order>, tick: Tick<'_>) -> Option<Position> {
        let position = self.store.get_mut(id)?;
        position.status = PositionStatus::Open;
        position.filled_entry = execution.and_then(|o| o.executed_price);
        position.entry_tstamp = execution
            .and_then(|o| o.execution_tstamp)
            .or_else(|| tick.bars.first().map(|b| b.tstamp));
        Some(position.clone())
    }

    /// Remove a position from the store, record it in history and cancel every
    /// working order that still belongs to it.
    pub fn close_position(
        &mut self,
        id: &str,
        account: &Account,
        orders: &mut dyn OrderInterface,
    ) -> Result<(), BotError> {
        let Some(position) = self.store.remove(id) else {
            warn!("tried to close unknown position {id}");
            return Ok(());
        };
        info!("closing position {} ({})", position.id, position.status);
        self.archive(position);
        self.cancel_all_orders_for_position(id, account, orders)?;
        Ok(())
    }

    /// Cancel every working order whose id decodes to `position_id`.
    pub fn cancel_all_orders_for_position(
        &mut self,
        position_id: &str,
        account: &Account,
        orders: &mut dyn OrderInterface,
    ) -> Result<usize, BotError> {
        let mut cancelled = 0;
        for order in account.open_orders.iter() {
            if decode_position_id(&order.id) == Some(position_id) {
                info!("canceling order {} of position {position_id}", order.id);
                orders.cancel_order(order)?;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    /// Cancel the working entry of a waiting position and retire it as
    /// `missed`. Returns false if there was no entry order to cancel.
    pub fn cancel_entry(
        &mut self,
        position_id: &str,
        account: &Account,
        orders: &mut dyn OrderInterface,
    ) -> Result<bool, BotError> {
        let entry_id = encode_order_id(position_id, OrderType::Entry);
        let Some(order) = account.open_orders.iter().find(|o| o.id == entry_id) else {
            return Ok(false);
        };
        orders.cancel_order(order)?;
        if let Some(mut position) = self.store.remove(position_id) {
            info!("canceled entry of position {position_id}");
            position.status = PositionStatus::Missed;
            self.archive(position);
        }
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.history.clear();
    }

    fn archive(&mut self, position: Position) {
        if let Some(log) = &self.history_log {
            if let Err(e) = log.append(&position) {
                warn!("failed to write history of position {}: {e}", position.id);
            }
        }
        self.history.push(position);
    }
}
