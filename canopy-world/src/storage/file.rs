use std::{
    collections::{BTreeSet, HashSet},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use canopy_util::{ChunkPosition, LargeChunkPosition, Position};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    io::AsyncWriteExt,
    sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock},
};
use uuid::Uuid;

use super::{BlockRecord, ChunkRecord, LayerRecord, OverrideStore, StorageError};

const CHUNKS_FOLDER: &str = "chunks";
const LAYERS_FOLDER: &str = "layers";

type FileLocks = DashMap<PathBuf, Arc<RwLock<()>>>;

/// Holds the lock of one file and forgets it once nobody else waits on it.
struct FileGuard<'a, G> {
    locks: &'a FileLocks,
    path: PathBuf,
    guard: Option<G>,
}

impl<G> Drop for FileGuard<'_, G> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.path, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// One JSON document per chunk and per region, below `<root>/<world>/`.
pub struct FileStore {
    root: PathBuf,
    // Only one task touches a file at a time
    file_locks: FileLocks,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn world_folder(&self, world: &Uuid) -> PathBuf {
        self.root.join(world.to_string())
    }

    fn chunk_path(&self, chunk: &ChunkPosition) -> PathBuf {
        self.world_folder(&chunk.world)
            .join(CHUNKS_FOLDER)
            .join(format!("{}.{}.json", chunk.x, chunk.z))
    }

    fn layers_path(&self, region: &LargeChunkPosition) -> PathBuf {
        self.world_folder(&region.world)
            .join(LAYERS_FOLDER)
            .join(format!("{}.{}.json", region.x, region.z))
    }

    /// Number of files some task currently holds or waits for.
    pub fn open_file_locks(&self) -> usize {
        self.file_locks.len()
    }

    fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        self.file_locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    async fn read_lock(&self, path: &Path) -> FileGuard<'_, OwnedRwLockReadGuard<()>> {
        let guard = self.lock_for(path).read_owned().await;
        FileGuard {
            locks: &self.file_locks,
            path: path.to_path_buf(),
            guard: Some(guard),
        }
    }

    async fn write_lock(&self, path: &Path) -> FileGuard<'_, OwnedRwLockWriteGuard<()>> {
        let guard = self.lock_for(path).write_owned().await;
        FileGuard {
            locks: &self.file_locks,
            path: path.to_path_buf(),
            guard: Some(guard),
        }
    }

    async fn read_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let value = serde_json::from_slice(&bytes).map_err(|err| {
            StorageError::Serialization(format!("{}: {err}", path.display()))
        })?;
        Ok(Some(value))
    }

    async fn write_file<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(value)?;

        let temp_path = path.with_extension("tmp");
        log::trace!("Writing tmp file to disk: {:?}", temp_path);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        // A reader sees either the old or the new document, never half of one
        tokio::fs::rename(&temp_path, path).await?;
        log::trace!("Wrote file to disk: {:?}", path);
        Ok(())
    }

    async fn read_chunk(&self, chunk: &ChunkPosition) -> Result<Option<ChunkRecord>, StorageError> {
        let path = self.chunk_path(chunk);
        let _guard = self.read_lock(&path).await;
        Self::read_file(&path).await
    }

    async fn update_chunk<F>(&self, chunk: &ChunkPosition, update: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut ChunkRecord) + Send,
    {
        let path = self.chunk_path(chunk);
        let _guard = self.write_lock(&path).await;
        let mut record = Self::read_file::<ChunkRecord>(&path)
            .await?
            .unwrap_or_default();
        update(&mut record);
        Self::write_file(&path, &record).await
    }
}

#[async_trait]
impl OverrideStore for FileStore {
    async fn read_chunk_version(&self, chunk: &ChunkPosition) -> Result<Option<u32>, StorageError> {
        Ok(self
            .read_chunk(chunk)
            .await?
            .and_then(|record| record.chunk_version))
    }

    async fn write_chunk_version(
        &self,
        chunk: &ChunkPosition,
        version: u32,
    ) -> Result<(), StorageError> {
        self.update_chunk(chunk, |record| record.chunk_version = Some(version))
            .await
    }

    async fn read_blocks(&self, chunk: &ChunkPosition) -> Result<Vec<BlockRecord>, StorageError> {
        Ok(self
            .read_chunk(chunk)
            .await?
            .map(|record| record.blocks)
            .unwrap_or_default())
    }

    async fn upsert_blocks(
        &self,
        chunk: &ChunkPosition,
        blocks: Vec<BlockRecord>,
    ) -> Result<(), StorageError> {
        self.update_chunk(chunk, |record| record.upsert(blocks)).await
    }

    async fn delete_blocks(
        &self,
        chunk: &ChunkPosition,
        positions: &[Position],
    ) -> Result<HashSet<Position>, StorageError> {
        let path = self.chunk_path(chunk);
        let _guard = self.write_lock(&path).await;
        let Some(mut record) = Self::read_file::<ChunkRecord>(&path).await? else {
            // Nothing was ever stored, so nothing is left to delete
            return Ok(positions.iter().copied().collect());
        };
        let coords = positions
            .iter()
            .map(|position| (position.x, position.y, position.z))
            .collect::<Vec<_>>();
        if record.delete(&coords) > 0 {
            Self::write_file(&path, &record).await?;
        }
        Ok(positions.iter().copied().collect())
    }

    async fn read_layers(
        &self,
        region: &LargeChunkPosition,
    ) -> Result<Option<BTreeSet<i32>>, StorageError> {
        let path = self.layers_path(region);
        let _guard = self.read_lock(&path).await;
        Ok(Self::read_file::<LayerRecord>(&path)
            .await?
            .map(|record| record.layers))
    }

    async fn merge_layers(
        &self,
        region: &LargeChunkPosition,
        layers: &BTreeSet<i32>,
    ) -> Result<BTreeSet<i32>, StorageError> {
        let path = self.layers_path(region);
        let _guard = self.write_lock(&path).await;
        let mut record = Self::read_file::<LayerRecord>(&path)
            .await?
            .unwrap_or_default();
        let before = record.layers.len();
        record.layers.extend(layers.iter().copied());
        if record.layers.len() != before || before == 0 {
            Self::write_file(&path, &record).await?;
        }
        Ok(record.layers)
    }
}
