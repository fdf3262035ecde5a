//! Position store: the bot's own book of intended and open positions.
//!
//! The store is an owned map mutated only by the tick driver, synchronously,
//! inside one tick. It persists as a JSON snapshot (see [`snapshot`]) and
//! closed positions are appended to a CSV log (see [`history`]).

pub mod history;
pub mod snapshot;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{Position, PositionStatus};
use crate::error::BotError;

pub use history::{format_tstamp, parse_tstamp, read_history, HistoryRecord, PositionHistoryLog};
pub use snapshot::{BotStorage, PositionSnapshot};

/// Positions keyed by id.
///
/// Iteration is in id order so every reconciliation pass visits positions in
/// the same sequence.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    positions: BTreeMap<String, Position>,
    last_processed_tstamp: i64,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Position> {
        self.positions.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Insert or replace the position stored under `position.id`.
    pub fn upsert(&mut self, position: Position) -> Option<Position> {
        self.positions.insert(position.id.clone(), position)
    }

    pub fn remove(&mut self, id: &str) -> Option<Position> {
        self.positions.remove(id)
    }

    /// Re-key a position. Refuses (and returns false) if `new_id` is taken or
    /// `old_id` is unknown.
    pub fn rename(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id {
            return self.contains(old_id);
        }
        if self.contains(new_id) {
            warn!("can't rename position {old_id} to {new_id}: id already in use");
            return false;
        }
        match self.positions.remove(old_id) {
            Some(mut position) => {
                position.id = new_id.to_string();
                self.positions.insert(new_id.to_string(), position);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.last_processed_tstamp = 0;
    }

    /// Sum of amounts of all `open` positions.
    pub fn open_amount(&self) -> f64 {
        self.positions
            .values()
            .filter(|p| p.status == PositionStatus::Open)
            .map(|p| p.amount)
            .sum()
    }

    pub fn last_processed_tstamp(&self) -> i64 {
        self.last_processed_tstamp
    }

    pub fn set_last_processed_tstamp(&mut self, tstamp: i64) {
        self.last_processed_tstamp = tstamp;
    }

    pub fn to_snapshot(&self, last_tick: Option<DateTime<Utc>>) -> PositionSnapshot {
        PositionSnapshot {
            last_processed_tstamp: self.last_processed_tstamp,
            last_tick: last_tick.map(|t| t.to_rfc3339()),
            positions: self.positions.values().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: PositionSnapshot) -> Self {
        let mut store = Self {
            positions: BTreeMap::new(),
            last_processed_tstamp: snapshot.last_processed_tstamp,
        };
        for position in snapshot.positions {
            if let Some(previous) = store.upsert(position) {
                warn!("snapshot contains position {} twice, keeping the last one", previous.id);
            }
        }
        store
    }

    /// Load a persisted snapshot. A missing or unreadable file yields an empty
    /// store; the next reconciliation rebuilds state from the exchange.
    pub fn load(path: &Path) -> Self {
        match PositionSnapshot::read(path) {
            Ok(snapshot) => {
                let store = Self::from_snapshot(snapshot);
                info!(
                    "done loading {} positions from {} last time {}",
                    store.len(),
                    path.display(),
                    store.last_processed_tstamp
                );
                store
            }
            Err(e) => {
                warn!("error loading open positions from {}: {e}", path.display());
                Self::new()
            }
        }
    }

    pub fn save(&self, path: &Path, last_tick: Option<DateTime<Utc>>) -> Result<(), BotError> {
        self.to_snapshot(last_tick).write(path)
    }
}
