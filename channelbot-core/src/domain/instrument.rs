use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tick rounding policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TickPolicy {
    /// Round to nearest tick
    RoundNearest,
    /// Round down
    RoundDown,
    /// Round up
    RoundUp,
}

/// Instrument metadata: tick size and quoting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub tick_size: f64,
    /// Inverse-quoted contracts (PnL in the base currency, e.g. XBTUSD).
    #[serde(default)]
    pub is_inverse: bool,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, tick_size: f64, is_inverse: bool) -> Result<Self, InstrumentError> {
        if !(tick_size > 0.0) {
            return Err(InstrumentError::InvalidTickSize { tick_size });
        }
        Ok(Self {
            symbol: symbol.into(),
            tick_size,
            is_inverse,
        })
    }

    /// Round price according to policy
    pub fn round_price(&self, price: f64, policy: TickPolicy) -> f64 {
        let ticks = price / self.tick_size;
        let rounded_ticks = match policy {
            TickPolicy::RoundNearest => ticks.round(),
            TickPolicy::RoundDown => ticks.floor(),
            TickPolicy::RoundUp => ticks.ceil(),
        };
        rounded_ticks * self.tick_size
    }

    /// Round a stop in the risk-reducing direction: up for longs, down for shorts.
    pub fn round_stop(&self, price: f64, direction: f64) -> f64 {
        if direction < 0.0 {
            self.round_price(price, TickPolicy::RoundDown)
        } else {
            self.round_price(price, TickPolicy::RoundUp)
        }
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            symbol: "XBTUSD".to_string(),
            tick_size: 1.0,
            is_inverse: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("tick_size must be positive, got {tick_size}")]
    InvalidTickSize { tick_size: f64 },
}
