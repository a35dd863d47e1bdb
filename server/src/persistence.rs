//! On-disk world snapshots.
//!
//! Entity state is written as one bincode blob. Respawn deadlines are stored
//! as absolute timestamps, so a restarted server can tell which of them
//! elapsed while it was down.

use crate::entity::{Character, Monster};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Unix milliseconds at capture.
    pub saved_at: u64,
    pub characters: Vec<Character>,
    pub monsters: Vec<Monster>,
}

impl WorldSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Box<dyn Error>> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Writes the snapshot next to `path` first and renames it into place,
    /// so a crash mid-write leaves the previous file intact.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let bytes = self.encode()?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, &bytes)?;
        fs::rename(&staging, path)?;
        info!(
            "Saved {} characters and {} monsters to {}",
            self.characters.len(),
            self.monsters.len(),
            path.display()
        );
        Ok(())
    }

    /// Loads a snapshot, or `None` when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Option<Self>, Box<dyn Error>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let snapshot = Self::decode(&bytes)?;
        info!(
            "Loaded {} characters and {} monsters from {}",
            snapshot.characters.len(),
            snapshot.monsters.len(),
            path.display()
        );
        Ok(Some(snapshot))
    }
}
