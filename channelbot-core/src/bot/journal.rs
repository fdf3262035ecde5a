//! Order requests made during one tick.
//!
//! The account snapshot is taken before the tick starts, so it still lists
//! orders the tick has since cancelled and misses the ones it sent. Every
//! request goes through an [`OrderJournal`], and later phases of the tick read
//! the snapshot with the journal applied.

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::domain::{Account, Order};
use crate::error::BotError;

use super::interface::OrderInterface;

/// Forwards requests to the exchange and records the accepted ones.
pub struct OrderJournal<'a> {
    inner: &'a mut dyn OrderInterface,
    sent: Vec<Order>,
    updated: Vec<Order>,
    cancelled: BTreeSet<String>,
}

impl<'a> OrderJournal<'a> {
    pub fn new(inner: &'a mut dyn OrderInterface) -> Self {
        Self {
            inner,
            sent: Vec::new(),
            updated: Vec::new(),
            cancelled: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty() && self.updated.is_empty() && self.cancelled.is_empty()
    }

    /// `account` as it stands after this tick's requests: sent stop or limit
    /// orders added, updated prices applied, cancelled orders removed. Market
    /// orders execute immediately and never show up as working.
    pub fn apply<'b>(&self, account: &'b Account) -> Cow<'b, Account> {
        if self.is_empty() {
            return Cow::Borrowed(account);
        }

        let mut view = account.clone();
        for order in self.sent.iter().filter(|o| !o.is_market()) {
            match view.open_orders.iter_mut().find(|o| o.id == order.id) {
                Some(existing) => *existing = order.clone(),
                None => view.open_orders.push(order.clone()),
            }
        }
        view.open_orders.retain(|o| !self.cancelled.contains(&o.id));
        for update in &self.updated {
            if let Some(order) = view.open_orders.iter_mut().find(|o| o.id == update.id) {
                order.stop_price = update.stop_price;
                order.limit_price = update.limit_price;
            }
        }
        Cow::Owned(view)
    }
}

impl OrderInterface for OrderJournal<'_> {
    fn send_order(&mut self, order: Order) -> Result<(), BotError> {
        self.inner.send_order(order.clone())?;
        self.sent.push(order);
        Ok(())
    }

    fn update_order(&mut self, order: &Order) -> Result<(), BotError> {
        self.inner.update_order(order)?;
        self.updated.push(order.clone());
        Ok(())
    }

    fn cancel_order(&mut self, order: &Order) -> Result<(), BotError> {
        self.inner.cancel_order(order)?;
        self.cancelled.insert(order.id.clone());
        Ok(())
    }
}
