//! Persisted terrain state.
//!
//! Generated terrain is fully determined by its dimensions, scale and seed,
//! so a snapshot stores only those and regenerates the field on load.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use super::config::TerrainConfig;
use super::volume::TerrainVolume;

/// Current version of the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_players() -> usize {
    2
}

/// Everything needed to rebuild a generated volume
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    /// Format version for compatibility
    pub version: u32,
    /// Field dimensions in samples
    pub size: [usize; 3],
    /// World extent of the longest axis
    pub scale: f32,
    pub seed: u32,
    #[serde(default = "default_players")]
    pub players: usize,
    #[serde(default)]
    pub config: TerrainConfig,
}

impl TerrainSnapshot {
    pub fn new(size: [usize; 3], scale: f32, seed: u32) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            size,
            scale,
            seed,
            players: default_players(),
            config: TerrainConfig::default(),
        }
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::Serialization(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }
}

impl TerrainVolume {
    /// Snapshot of this volume's generation inputs
    pub fn snapshot(&self) -> TerrainSnapshot {
        TerrainSnapshot {
            version: SNAPSHOT_VERSION,
            size: self.size(),
            scale: self.scale(),
            seed: self.seed(),
            players: self.spawn_points().len(),
            config: self.config().clone(),
        }
    }

    /// Rebuild a volume from a snapshot: init, generate the cave, remesh.
    pub fn from_snapshot(snapshot: &TerrainSnapshot) -> Result<Self> {
        let mut volume = Self::new(snapshot.size, snapshot.scale, snapshot.config.clone())?;
        volume.generate_cave(snapshot.players, snapshot.seed);
        volume.remesh_all();
        log::info!(
            "Restored terrain {:?} (scale {}, seed {})",
            snapshot.size, snapshot.scale, snapshot.seed
        );
        Ok(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_snapshot(seed: u32) -> TerrainSnapshot {
        TerrainSnapshot {
            config: TerrainConfig { grid_size: 4, ..Default::default() },
            ..TerrainSnapshot::new([32, 32, 32], 8.0, seed)
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("terrain.json");
        let snapshot = small_snapshot(99);
        snapshot.save_sync(&path).unwrap();
        let loaded = TerrainSnapshot::load_sync(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_load_defaults_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.json");
        std::fs::write(&path, r#"{ "version": 1, "size": [64, 64, 64], "scale": 20.0, "seed": 5 }"#).unwrap();
        let loaded = TerrainSnapshot::load_sync(&path).unwrap();
        assert_eq!(loaded.players, 2);
        assert_eq!(loaded.config, TerrainConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = TerrainSnapshot::load_sync(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(Error::Io(_))));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(TerrainSnapshot::load_sync(&path), Err(Error::Serialization(_))));

        let future = TerrainSnapshot { version: SNAPSHOT_VERSION + 1, ..small_snapshot(1) };
        future.save_sync(&path).unwrap();
        assert!(matches!(TerrainSnapshot::load_sync(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_regenerates_identical_field() {
        let original = TerrainVolume::from_snapshot(&small_snapshot(2024)).unwrap();
        let snapshot = original.snapshot();
        assert_eq!(snapshot.seed, 2024);
        assert_eq!(snapshot.size, [32, 32, 32]);
        assert_eq!(snapshot.scale, 8.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.json");
        snapshot.save_sync(&path).unwrap();
        let restored = TerrainVolume::from_snapshot(&TerrainSnapshot::load_sync(&path).unwrap()).unwrap();

        assert_eq!(restored.field(), original.field());
        assert_eq!(restored.triangle_count(), original.triangle_count());
        assert_eq!(restored.spawn_points(), original.spawn_points());
    }
}
