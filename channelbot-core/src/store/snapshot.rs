//! Snapshot persistence: one JSON file per bot instance.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::Position;
use crate::error::BotError;

/// Serialized form of the position store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    #[serde(alias = "last_time")]
    pub last_processed_tstamp: i64,
    /// Wall-clock time of the tick that wrote the snapshot.
    #[serde(default)]
    pub last_tick: Option<String>,
    pub positions: Vec<Position>,
}

impl PositionSnapshot {
    pub fn read(path: &Path) -> Result<Self, BotError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write through a temporary sibling file and rename it into place, so a
    /// crash mid-write leaves the previous snapshot intact.
    pub fn write(&self, path: &Path) -> Result<(), BotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Where one bot instance keeps its files.
///
/// Files are keyed by `<symbol>_<instanceId>`; two instances with different ids
/// never touch the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotStorage {
    base_dir: PathBuf,
    key: String,
}

impl BotStorage {
    pub fn new(base_dir: impl Into<PathBuf>, symbol: &str, instance_id: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            key: format!("{symbol}_{instance_id}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.base_dir.join("openPositions").join(format!("{}.json", self.key))
    }

    pub fn history_path(&self) -> PathBuf {
        self.base_dir.join("positionHistory").join(format!("{}.csv", self.key))
    }
}
