use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
    sync::Arc,
};

use async_trait::async_trait;
use canopy_config::{ConfigError, StorageBackendKind, StorageConfig};
use canopy_util::{ChunkPosition, LargeChunkPosition, Position};
use thiserror::Error;

pub mod database;
pub mod executor;
pub mod file;
pub mod memory;
pub mod record;

pub use database::Database;
pub use executor::{ExecutorError, PendingWrite, ReadPool, WriteHandle, WriteQueue};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{BlockRecord, ChunkRecord, LayerRecord};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Io error: {0}")]
    IoError(std::io::ErrorKind),
    #[error("Failed to (de)serialize record: {0}")]
    Serialization(String),
    #[error("Chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkPosition),
    #[error("Only {confirmed} of {requested} overrides in {chunk} were deleted")]
    PartialDelete {
        chunk: ChunkPosition,
        confirmed: usize,
        requested: usize,
    },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("Invalid storage configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.kind())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Raw access to wherever overrides are kept.
///
/// Implementations only move records around, deciding what gets written and when
/// is up to [`Database`].
#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn read_chunk_version(&self, chunk: &ChunkPosition) -> Result<Option<u32>, StorageError>;

    async fn write_chunk_version(
        &self,
        chunk: &ChunkPosition,
        version: u32,
    ) -> Result<(), StorageError>;

    async fn read_blocks(&self, chunk: &ChunkPosition) -> Result<Vec<BlockRecord>, StorageError>;

    /// Inserts the records, replacing stored ones at the same coordinates.
    async fn upsert_blocks(
        &self,
        chunk: &ChunkPosition,
        blocks: Vec<BlockRecord>,
    ) -> Result<(), StorageError>;

    /// Deletes the records at `positions` and returns the positions that are now
    /// known to be gone, whether or not a record existed.
    async fn delete_blocks(
        &self,
        chunk: &ChunkPosition,
        positions: &[Position],
    ) -> Result<HashSet<Position>, StorageError>;

    async fn read_layers(
        &self,
        region: &LargeChunkPosition,
    ) -> Result<Option<BTreeSet<i32>>, StorageError>;

    /// Adds `layers` to the set stored for `region` and returns the union now stored.
    ///
    /// The read and the write happen as one step, so concurrent merges never drop layers.
    async fn merge_layers(
        &self,
        region: &LargeChunkPosition,
        layers: &BTreeSet<i32>,
    ) -> Result<BTreeSet<i32>, StorageError>;
}

/// Opens the store selected in the configuration, file stores live under `root`.
pub fn open_store(config: &StorageConfig, root: &Path) -> Arc<dyn OverrideStore> {
    match config.backend {
        StorageBackendKind::File => {
            let folder = root.join(&config.folder);
            log::info!("Storing block overrides in {}", folder.display());
            Arc::new(FileStore::new(folder))
        }
        StorageBackendKind::Memory => {
            log::warn!("Block overrides are kept in memory only and are lost on shutdown");
            Arc::new(MemoryStore::default())
        }
    }
}
