//! Bot configuration, loaded from TOML.
//!
//! Every section has defaults, so a config file only needs to name what it
//! changes. [`load_config`] parses and validates in one go.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bot::DEFAULT_EPSILON;
use crate::domain::Instrument;
use crate::store::BotStorage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub instrument: Instrument,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
    pub logging: LoggingConfig,
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.instrument.tick_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "instrument.tick_size must be positive, got {}",
                self.instrument.tick_size
            )));
        }
        if self.instrument.symbol.is_empty() {
            return Err(ConfigError::Invalid("instrument.symbol must not be empty".into()));
        }
        if let Some(id) = &self.storage.instance_id {
            if id.is_empty() || id.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!("storage.instance_id {id:?} is not a valid file key")));
            }
        }
        if !(self.engine.reconcile_epsilon > 0.0) {
            return Err(ConfigError::Invalid("engine.reconcile_epsilon must be positive".into()));
        }
        self.strategy.validate()
    }

    /// Storage location for this instance; `None` when persistence is off.
    pub fn bot_storage(&self) -> Option<BotStorage> {
        let instance_id = self.storage.instance_id.as_deref()?;
        Some(BotStorage::new(&self.storage.base_dir, &self.instrument.symbol, instance_id))
    }
}

/// Where snapshots and history live. Persistence is disabled without an
/// `instance_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub base_dir: PathBuf,
    pub instance_id: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            instance_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Apply exchange executions to positions each tick.
    pub sync_executions: bool,
    /// Quantities closer than this count as equal when reconciling.
    pub reconcile_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_executions: true,
            reconcile_epsilon: DEFAULT_EPSILON,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub risk: RiskConfig,
    pub break_even: BreakEvenConfig,
    pub trail: TrailConfig,
    pub channel: ChannelConfig,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.risk.risk_factor > 0.0) {
            return Err(ConfigError::Invalid("strategy.risk.risk_factor must be positive".into()));
        }
        if self.risk.risk_type == RiskType::AtrBounded && !(self.risk.max_risk_mul > 0.0) {
            return Err(ConfigError::Invalid(
                "strategy.risk.max_risk_mul must be positive for ATR_BOUNDED sizing".into(),
            ));
        }
        if self.break_even.factor < 0.0 {
            return Err(ConfigError::Invalid("strategy.break_even.factor must not be negative".into()));
        }
        let channel = &self.channel;
        if channel.period == 0 || channel.atr_period == 0 || channel.swing_length < 2 {
            return Err(ConfigError::Invalid(
                "strategy.channel needs period > 0, atr_period > 0 and swing_length >= 2".into(),
            ));
        }
        Ok(())
    }
}

/// How the stop distance turns into a position size.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
    /// Size so that hitting the stop loses exactly the risk amount.
    #[default]
    Fixed,
    /// Like `Fixed`, but the stop distance used for sizing is capped at
    /// `max_risk_mul` times the ATR.
    AtrBounded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of equity risked per trade.
    pub risk_factor: f64,
    pub risk_type: RiskType,
    pub max_risk_mul: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_factor: 0.01,
            risk_type: RiskType::Fixed,
            max_risk_mul: 1.0,
        }
    }
}

/// Move the stop to entry (plus buffer) once price has run `factor` times the
/// initial risk in favour. A factor of 0 disables it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BreakEvenConfig {
    pub factor: f64,
    /// Offset from entry, in units of the initial risk.
    pub buffer: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrailConfig {
    /// Trail stops along the channel.
    pub active: bool,
    /// Tighten the trail to the latest swing point when one exists.
    pub trail_to_swing: bool,
    /// Only use a swing once the previous bar also had one.
    pub delayed_swing: bool,
    /// Allow the trail to move back toward the initial stop.
    pub trail_back: bool,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            active: false,
            trail_to_swing: false,
            delayed_swing: true,
            trail_back: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    /// Bars in the channel window.
    pub period: usize,
    /// Bars searched for swing points.
    pub swing_length: usize,
    pub atr_period: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            period: 20,
            swing_length: 5,
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily log files; console only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

pub fn parse_config(text: &str) -> Result<BotConfig, ConfigError> {
    let config: BotConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<BotConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}
