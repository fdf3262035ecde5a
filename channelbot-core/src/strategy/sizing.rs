//! Risk-based position sizing.
//!
//! The size is chosen so that a move from entry to the stop loses the risk
//! amount. For inverse instruments PnL is in the base currency, so the
//! contract count comes from the difference of reciprocal prices and is
//! truncated to whole contracts.

use crate::config::{RiskConfig, RiskType};

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizer {
    risk: RiskConfig,
    is_inverse: bool,
}

impl PositionSizer {
    pub fn new(risk: RiskConfig, is_inverse: bool) -> Self {
        Self { risk, is_inverse }
    }

    /// Amount of equity at risk per trade.
    pub fn risk_amount(&self, equity: f64) -> f64 {
        equity * self.risk.risk_factor
    }

    /// Signed size for an entry at `entry` with its stop at `exit`. Positive
    /// when the stop is below the entry (long). Zero if entry and stop coincide.
    pub fn size(&self, risk: f64, entry: f64, exit: f64, atr: f64) -> f64 {
        let mut delta = entry - exit;
        if self.risk.risk_type == RiskType::AtrBounded {
            let mul = self.risk.max_risk_mul;
            delta = (mul * delta.abs()).min(mul * atr).copysign(delta);
        }
        if delta == 0.0 || !delta.is_finite() {
            return 0.0;
        }

        if self.is_inverse {
            -(risk / (1.0 / entry - 1.0 / (entry - delta))).trunc()
        } else {
            risk / delta
        }
    }
}
