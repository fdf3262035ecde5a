//! Account snapshot: what the exchange reports at the start of a tick.

use serde::{Deserialize, Serialize};

use super::ids::decode_position_id;
use super::order::Order;

/// Net exchange position for the traded instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPosition {
    /// Signed net quantity (positive = long).
    pub quantity: f64,
    pub avg_entry_price: f64,
}

/// Read-only view of the exchange account for one tick.
///
/// `order_history` is append-only on the exchange side: between two ticks its
/// length never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub open_orders: Vec<Order>,
    pub order_history: Vec<Order>,
    pub open_position: AccountPosition,
    pub equity: f64,
}

impl Account {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            ..Self::default()
        }
    }

    /// Working orders whose id decodes to `position_id`.
    pub fn orders_for_position<'a>(
        &'a self,
        position_id: &'a str,
    ) -> impl Iterator<Item = &'a Order> + 'a {
        self.open_orders
            .iter()
            .filter(move |o| decode_position_id(&o.id) == Some(position_id))
    }
}
