//! Order interface: the engine's only way to act on the exchange.

use crate::domain::Order;
use crate::error::BotError;

/// Synchronous order placement as seen by the bot.
///
/// An `Ok` only means the request was accepted by the interface. Whether the
/// exchange reflects it is checked on later ticks by the reconciler, never
/// assumed.
pub trait OrderInterface {
    fn send_order(&mut self, order: Order) -> Result<(), BotError>;

    /// Replace the prices of a working order, identified by `order.id`.
    fn update_order(&mut self, order: &Order) -> Result<(), BotError>;

    fn cancel_order(&mut self, order: &Order) -> Result<(), BotError>;
}
