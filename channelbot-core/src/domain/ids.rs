//! Identity scheme: how positions and orders are named.
//!
//! Orders reach the exchange with string ids and come back in snapshots with the
//! same ids. The link from an order to its position is never stored; it is
//! recomputed from the id string every time it is needed:
//!
//! ```text
//! position id:  <signalId>-<LONG|SHORT>
//! order id:     <positionId>_<ENTRY|SL|TP>[_<0-999>]
//! ```
//!
//! Parsers are tolerant: anything that does not follow the pattern decodes to
//! `None`, which callers treat as "not one of ours".

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use super::order::OrderType;

/// Separates the position id from the order type (and random suffix).
pub const ORDER_ID_SEPARATOR: char = '_';

/// Separates the signal id from the direction. Must differ from
/// [`ORDER_ID_SEPARATOR`] and never appear in a signal id.
pub const POSITION_ID_SEPARATOR: char = '-';

/// Direction of a position, encoded into its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionDirection {
    Long,
    Short,
}

impl PositionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionDirection::Long => "LONG",
            PositionDirection::Short => "SHORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LONG" => Some(PositionDirection::Long),
            "SHORT" => Some(PositionDirection::Short),
            _ => None,
        }
    }

    /// Direction implied by a signed amount. Zero has no direction.
    pub fn from_amount(amount: f64) -> Option<Self> {
        if amount > 0.0 {
            Some(PositionDirection::Long)
        } else if amount < 0.0 {
            Some(PositionDirection::Short)
        } else {
            None
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            PositionDirection::Long => PositionDirection::Short,
            PositionDirection::Short => PositionDirection::Long,
        }
    }

    /// +1.0 for long, -1.0 for short.
    pub fn sign(&self) -> f64 {
        match self {
            PositionDirection::Long => 1.0,
            PositionDirection::Short => -1.0,
        }
    }
}

impl fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build an order id for a position.
///
/// `SL` and `TP` ids get a random suffix so a stop re-placed after a cancel
/// never reuses the id of the cancelled one.
pub fn encode_order_id(position_id: &str, order_type: OrderType) -> String {
    if position_id.contains(ORDER_ID_SEPARATOR) {
        warn!(
            "position id must not contain '{}' but does: {}",
            ORDER_ID_SEPARATOR, position_id
        );
    }
    let mut order_id = format!("{position_id}{ORDER_ID_SEPARATOR}{}", order_type.as_str());
    if matches!(order_type, OrderType::Sl | OrderType::Tp) {
        let suffix: u16 = rand::thread_rng().gen_range(0..=999);
        order_id.push(ORDER_ID_SEPARATOR);
        order_id.push_str(&suffix.to_string());
    }
    order_id
}

/// Position id part of an order id, if the id has one.
pub fn decode_position_id(order_id: &str) -> Option<&str> {
    let (position_id, _) = order_id.split_once(ORDER_ID_SEPARATOR)?;
    if position_id.is_empty() {
        None
    } else {
        Some(position_id)
    }
}

/// Order type part of an order id, if it is one we issue.
pub fn decode_order_type(order_id: &str) -> Option<OrderType> {
    let mut parts = order_id.split(ORDER_ID_SEPARATOR);
    parts.next()?;
    OrderType::parse(parts.next()?)
}

/// Build a position id from a signal id and direction.
pub fn encode_position_id(signal_id: &str, direction: PositionDirection) -> String {
    if signal_id.contains(POSITION_ID_SEPARATOR) {
        warn!(
            "signal id must not contain '{}' but does: {}",
            POSITION_ID_SEPARATOR, signal_id
        );
    }
    format!("{signal_id}{POSITION_ID_SEPARATOR}{direction}")
}

/// Split a position id into signal id and direction.
pub fn decode_position_id_full(position_id: &str) -> Option<(&str, PositionDirection)> {
    let mut parts = position_id.split(POSITION_ID_SEPARATOR);
    let signal_id = parts.next()?;
    let direction = PositionDirection::parse(parts.next()?)?;
    Some((signal_id, direction))
}

/// Id of the position for the same signal in the other direction.
pub fn other_direction_id(position_id: &str) -> Option<String> {
    let (signal_id, direction) = decode_position_id_full(position_id)?;
    Some(encode_position_id(signal_id, direction.opposite()))
}
