//! Paper exchange: an in-memory exchange for dry runs, tests and benchmarks.
//!
//! Stop and limit orders rest until [`PaperExchange::process_bar`] or
//! [`PaperExchange::fill_order`] fills them; market orders fill immediately at
//! the last known price. Every request is recorded so callers can audit what
//! the bot sent.

use tracing::debug;

use crate::domain::{Account, AccountPosition, Bar, Order};
use crate::error::BotError;

use super::interface::OrderInterface;

#[derive(Debug, Clone, Default)]
pub struct PaperExchange {
    open_orders: Vec<Order>,
    order_history: Vec<Order>,
    position: AccountPosition,
    equity: f64,
    last_price: f64,
    tstamp: i64,
    fail_next: Option<String>,
    sent: Vec<Order>,
    updated: Vec<Order>,
    cancelled: Vec<String>,
}

impl PaperExchange {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            ..Self::default()
        }
    }

    /// Snapshot in the shape the bot reads every tick.
    pub fn account(&self) -> Account {
        Account {
            open_orders: self.open_orders.clone(),
            order_history: self.order_history.clone(),
            open_position: self.position.clone(),
            equity: self.equity,
        }
    }

    pub fn quantity(&self) -> f64 {
        self.position.quantity
    }

    /// Force the net position, e.g. to simulate fills the bot never saw.
    pub fn set_quantity(&mut self, quantity: f64) {
        self.position.quantity = quantity;
    }

    pub fn set_equity(&mut self, equity: f64) {
        self.equity = equity;
    }

    pub fn set_market(&mut self, price: f64, tstamp: i64) {
        self.last_price = price;
        self.tstamp = tstamp;
    }

    /// Place a working order without recording it as sent by the bot.
    pub fn inject_order(&mut self, order: Order) {
        self.open_orders.push(order);
    }

    /// Make the next request fail with an exchange error.
    pub fn fail_next_request(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    pub fn open_orders(&self) -> &[Order] {
        &self.open_orders
    }

    pub fn order_history(&self) -> &[Order] {
        &self.order_history
    }

    pub fn sent_orders(&self) -> &[Order] {
        &self.sent
    }

    pub fn updated_orders(&self) -> &[Order] {
        &self.updated
    }

    pub fn cancelled_ids(&self) -> &[String] {
        &self.cancelled
    }

    /// Number of requests (send, update, cancel) received so far.
    pub fn request_count(&self) -> usize {
        self.sent.len() + self.updated.len() + self.cancelled.len()
    }

    pub fn clear_audit(&mut self) {
        self.sent.clear();
        self.updated.clear();
        self.cancelled.clear();
    }

    /// Fill a working order at `price`.
    pub fn fill_order(&mut self, order_id: &str, price: f64, tstamp: i64) -> Result<(), BotError> {
        let idx = self
            .open_orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| BotError::OrderNotFound(order_id.to_string()))?;
        let order = self.open_orders.remove(idx);
        self.execute(order, price, tstamp);
        Ok(())
    }

    /// Fill every resting order the bar trades through. Stops fill at their
    /// stop price, limits at their limit price.
    pub fn process_bar(&mut self, bar: &Bar) -> usize {
        self.last_price = bar.close;
        self.tstamp = bar.tstamp;

        let mut filled = Vec::new();
        let mut resting = Vec::new();
        for order in self.open_orders.drain(..) {
            match fill_price(&order, bar) {
                Some(price) => filled.push((order, price)),
                None => resting.push(order),
            }
        }
        self.open_orders = resting;

        let count = filled.len();
        for (order, price) in filled {
            self.execute(order, price, bar.tstamp);
        }
        count
    }

    fn execute(&mut self, mut order: Order, price: f64, tstamp: i64) {
        let before = self.position.quantity;
        let after = before + order.amount;
        if after.abs() < f64::EPSILON {
            self.position.avg_entry_price = 0.0;
        } else if before * order.amount >= 0.0 {
            self.position.avg_entry_price =
                (self.position.avg_entry_price * before.abs() + price * order.amount.abs()) / after.abs();
        } else if before * after < 0.0 {
            self.position.avg_entry_price = price;
        }
        self.position.quantity = after;

        order.executed_amount = order.amount;
        order.executed_price = Some(price);
        order.execution_tstamp = Some(tstamp);
        debug!("paper fill {} {:.1} @ {:.1}", order.id, order.amount, price);
        self.order_history.push(order);
    }

    fn check_failure(&mut self) -> Result<(), BotError> {
        match self.fail_next.take() {
            Some(reason) => Err(BotError::Exchange(reason)),
            None => Ok(()),
        }
    }
}

fn fill_price(order: &Order, bar: &Bar) -> Option<f64> {
    let buy = order.amount > 0.0;
    if let Some(stop) = order.stop_price {
        let hit = if buy { bar.high >= stop } else { bar.low <= stop };
        return hit.then_some(stop);
    }
    if let Some(limit) = order.limit_price {
        let hit = if buy { bar.low <= limit } else { bar.high >= limit };
        return hit.then_some(limit);
    }
    Some(bar.open)
}

impl OrderInterface for PaperExchange {
    fn send_order(&mut self, order: Order) -> Result<(), BotError> {
        self.check_failure()?;
        self.sent.push(order.clone());
        if order.is_market() {
            let (price, tstamp) = (self.last_price, self.tstamp);
            self.execute(order, price, tstamp);
        } else {
            self.open_orders.push(order);
        }
        Ok(())
    }

    fn update_order(&mut self, order: &Order) -> Result<(), BotError> {
        self.check_failure()?;
        let working = self
            .open_orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| BotError::OrderNotFound(order.id.clone()))?;
        working.stop_price = order.stop_price;
        working.limit_price = order.limit_price;
        self.updated.push(order.clone());
        Ok(())
    }

    fn cancel_order(&mut self, order: &Order) -> Result<(), BotError> {
        self.check_failure()?;
        let idx = self
            .open_orders
            .iter()
            .position(|o| o.id == order.id)
            .ok_or_else(|| BotError::OrderNotFound(order.id.clone()))?;
        self.open_orders.remove(idx);
        self.cancelled.push(order.id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_order_fills_immediately() {
        let mut ex = PaperExchange::new(1.0);
        ex.set_market(100.0, 10);
        ex.send_order(Order::new("x_marketClose", -3.0)).unwrap();
        assert_eq!(ex.quantity(), -3.0);
        assert!(ex.open_orders().is_empty());
        let filled = &ex.order_history()[0];
        assert_eq!(filled.executed_price, Some(100.0));
        assert_eq!(filled.executed_amount, -3.0);
    }

    #[test]
    fn stop_order_rests_until_bar_trades_through() {
        let mut ex = PaperExchange::new(1.0);
        ex.send_order(Order::new("1-LONG_ENTRY", 2.0).with_stop(105.0)).unwrap();

        assert_eq!(ex.process_bar(&Bar::new(1, 100.0, 104.0, 99.0, 103.0)), 0);
        assert_eq!(ex.process_bar(&Bar::new(2, 103.0, 106.0, 102.0, 105.5)), 1);
        assert_eq!(ex.quantity(), 2.0);
        assert_eq!(ex.order_history()[0].executed_price, Some(105.0));
        assert_eq!(ex.order_history()[0].execution_tstamp, Some(2));
    }

    #[test]
    fn update_and_cancel_unknown_order_fail() {
        let mut ex = PaperExchange::new(1.0);
        let order = Order::new("nope_SL_1", -1.0).with_stop(1.0);
        assert!(matches!(ex.update_order(&order), Err(BotError::OrderNotFound(_))));
        assert!(matches!(ex.cancel_order(&order), Err(BotError::OrderNotFound(_))));
    }

    #[test]
    fn injected_failure_hits_next_request_only() {
        let mut ex = PaperExchange::new(1.0);
        ex.fail_next_request("rate limited");
        assert!(ex.send_order(Order::new("1-LONG_ENTRY", 1.0).with_stop(5.0)).is_err());
        assert!(ex.send_order(Order::new("1-LONG_ENTRY", 1.0).with_stop(5.0)).is_ok());
        assert_eq!(ex.sent_orders().len(), 1);
    }

    #[test]
    fn average_entry_tracks_fills() {
        let mut ex = PaperExchange::new(1.0);
        ex.set_market(100.0, 1);
        ex.send_order(Order::new("a", 1.0)).unwrap();
        ex.set_market(110.0, 2);
        ex.send_order(Order::new("b", 1.0)).unwrap();
        assert!((ex.account().open_position.avg_entry_price - 105.0).abs() < 1e-9);
        ex.send_order(Order::new("c", -2.0)).unwrap();
        assert_eq!(ex.account().open_position.avg_entry_price, 0.0);
    }
}
