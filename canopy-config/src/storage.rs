use std::path::PathBuf;

use canopy_util::RegionSpan;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Root folder of the file backend
    pub folder: PathBuf,
    /// Bumping this invalidates every stored chunk, they are regenerated on next load
    pub chunk_version: u32,
    /// Width in blocks of the regions sharing one default-layer entry
    pub region_size: u32,
    /// Maximum number of reads running at the same time
    pub read_threads: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::File,
            folder: PathBuf::from("canopy"),
            chunk_version: 1,
            region_size: 528,
            read_threads: 5,
        }
    }
}

impl StorageConfig {
    pub fn region_span(&self) -> Result<RegionSpan, ConfigError> {
        RegionSpan::from_blocks(self.region_size)
            .ok_or(ConfigError::InvalidRegionSize(self.region_size))
    }

    /// Rejects a region size that isn't a positive multiple of 16 and a read pool without threads.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.region_span()?;
        if self.read_threads == 0 {
            return Err(ConfigError::Invalid(
                "storage.read_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// One JSON document per chunk and per region on disk
    #[default]
    File,
    /// Nothing survives a restart, useful for tests and throwaway worlds
    Memory,
}
