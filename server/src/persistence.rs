//! Save/Load of the whole world
//!
//! The galaxy tables, the master record and the captain registry are written
//! as one bincode blob. Writes go to a sibling `.tmp` file that is then
//! renamed over the target, so a crash mid-save leaves the previous snapshot
//! intact.

use crate::client_manager::Captain;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::galaxy::Galaxy;
use crate::game::GameState;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::GalaxySnapshot;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Tick counter at the time of the save
    pub tick: u64,
    pub galaxy: Galaxy,
    pub master: GalaxySnapshot,
    /// Registry slots; runtime-only captain fields are skipped
    pub captains: Vec<Option<Captain>>,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes a snapshot atomically.
pub fn save(path: &Path, data: &SaveData) -> ServerResult<()> {
    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut writer, data)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a snapshot, refusing files written by another format version.
pub fn load(path: &Path) -> ServerResult<SaveData> {
    let reader = BufReader::new(File::open(path)?);
    let data: SaveData = bincode::deserialize_from(reader)?;
    if data.version != SAVE_VERSION {
        return Err(ServerError::SaveVersion {
            found: data.version,
            expected: SAVE_VERSION,
        });
    }
    Ok(data)
}

impl GameState {
    pub fn to_save(&self) -> SaveData {
        SaveData {
            version: SAVE_VERSION,
            tick: self.tick,
            galaxy: self.galaxy.clone(),
            master: self.galaxy.master_record(),
            captains: self.clients.snapshot(),
        }
    }

    /// Rebuilds the world from a snapshot. Every captain comes back dormant.
    pub fn from_save(data: SaveData, config: &ServerConfig) -> Self {
        if data.master != data.galaxy.master_record() {
            warn!("Saved master record disagrees with galaxy tables; using recomputed counts");
        }
        let mut state = GameState::new(data.galaxy, config);
        state.tick = data.tick;
        state.clients.restore(data.captains);
        state
    }

    /// Writes a snapshot of the current world to `path`.
    pub fn save_to(&self, path: &Path) -> ServerResult<()> {
        save(path, &self.to_save())?;
        info!("World saved to {} at tick {}", path.display(), self.tick);
        Ok(())
    }

    /// Loads the configured save file, or generates a new galaxy when there
    /// is none or `--fresh` was given.
    pub fn load_or_generate(config: &ServerConfig) -> ServerResult<Self> {
        let path = &config.save_file;
        if config.fresh || !path.exists() {
            info!("Generating a new galaxy");
            return Ok(GameState::generate(config));
        }

        match load(path) {
            Ok(data) => {
                info!("World loaded from {} at tick {}", path.display(), data.tick);
                Ok(GameState::from_save(data, config))
            }
            Err(e @ ServerError::SaveVersion { .. }) => Err(e),
            Err(e) => Err(ServerError::Persistence(format!(
                "could not read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
