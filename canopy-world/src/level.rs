use std::sync::Arc;

use canopy_util::{ChunkPosition, Position};
use dashmap::DashMap;
use futures::future::join_all;
use log::trace;
use uuid::Uuid;

use crate::{
    cache::ChunkBlockCache,
    storage::{Database, StorageError, WriteHandle},
    variant::{BlockVariant, ConfigSource, VariantRegistry},
};

/// Result of [`OverrideLevel::load_chunk`].
#[derive(Clone, Debug)]
pub enum LoadedChunk {
    /// The chunk was already in memory
    Cached(Arc<ChunkBlockCache>),
    /// The chunk was read from storage
    Stored(Arc<ChunkBlockCache>),
    /// Storage held nothing usable for this chunk, its overrides have to be
    /// regenerated and then confirmed with [`OverrideLevel::mark_chunk_generated`]
    Fresh(Arc<ChunkBlockCache>),
}

impl LoadedChunk {
    pub fn cache(&self) -> &Arc<ChunkBlockCache> {
        match self {
            Self::Cached(cache) | Self::Stored(cache) | Self::Fresh(cache) => cache,
        }
    }

    pub fn into_cache(self) -> Arc<ChunkBlockCache> {
        match self {
            Self::Cached(cache) | Self::Stored(cache) | Self::Fresh(cache) => cache,
        }
    }

    pub fn needs_regeneration(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Owns the override caches of every loaded chunk.
///
/// Chunks are loaded through the read pool, every save goes through the write queue of
/// the [`Database`], so saves of one chunk are applied in the order they were requested.
pub struct OverrideLevel {
    database: Arc<Database>,
    defaults: Arc<dyn ConfigSource>,
    loaded_chunks: Arc<DashMap<ChunkPosition, Arc<ChunkBlockCache>>>,
}

impl OverrideLevel {
    pub fn new(database: Arc<Database>, defaults: Arc<dyn ConfigSource>) -> Self {
        Self {
            database,
            defaults,
            loaded_chunks: Arc::new(DashMap::new()),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn init_world(&self, world: Uuid) {
        self.database.init_world(world);
    }

    /// Saves and evicts every chunk of `world`, then forgets its default layers.
    pub async fn unload_world(&self, world: &Uuid) -> Result<(), StorageError> {
        let chunks = self
            .loaded_chunks
            .iter()
            .filter(|entry| entry.key().world == *world)
            .map(|entry| *entry.key())
            .collect::<Vec<_>>();
        let mut result = Ok(());
        for chunk in chunks {
            if let Err(err) = self.unload_chunk(&chunk).await {
                log::error!("Failed to unload {chunk}: {err}");
                result = Err(err);
            }
        }
        self.database.teardown_world(world);
        result
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded_chunks.len()
    }

    pub fn is_chunk_loaded(&self, chunk: &ChunkPosition) -> bool {
        self.loaded_chunks.contains_key(chunk)
    }

    pub fn cache(&self, chunk: &ChunkPosition) -> Option<Arc<ChunkBlockCache>> {
        self.loaded_chunks.get(chunk).map(|entry| entry.value().clone())
    }

    /// Returns the cache of `chunk`, reading it from storage when it is not in memory.
    ///
    /// A chunk stored with an older chunk version is treated like one never stored.
    /// When the same chunk is loaded twice at once both callers end up with one cache.
    pub async fn load_chunk(
        &self,
        chunk: ChunkPosition,
        registry: Arc<dyn VariantRegistry>,
    ) -> Result<LoadedChunk, StorageError> {
        if let Some(cache) = self.cache(&chunk) {
            return Ok(LoadedChunk::Cached(cache));
        }

        let database = self.database.clone();
        let stored = self
            .database
            .do_database_read_async(async move {
                if !database.is_chunk_loaded(&chunk).await? {
                    return Ok(None);
                }
                database
                    .get_blocks_in_chunk(&chunk, registry.as_ref())
                    .await
                    .map(Some)
            })
            .await?;

        let is_stored = stored.is_some();
        let loaded = Arc::new(ChunkBlockCache::from_blocks(
            chunk,
            stored.unwrap_or_default(),
            self.defaults.clone(),
        ));
        let cache = self
            .loaded_chunks
            .entry(chunk)
            .or_insert_with(|| loaded.clone())
            .value()
            .clone();

        if !Arc::ptr_eq(&cache, &loaded) {
            // Someone else finished loading first
            return Ok(LoadedChunk::Cached(cache));
        }
        trace!("Loaded {chunk} with {} overrides", cache.len());
        Ok(if is_stored {
            LoadedChunk::Stored(cache)
        } else {
            LoadedChunk::Fresh(cache)
        })
    }

    /// Replaces whatever storage holds for a regenerated chunk with its cache
    /// and stamps it with the current chunk version.
    pub async fn mark_chunk_generated(
        &self,
        chunk: &ChunkPosition,
    ) -> Result<WriteHandle, StorageError> {
        let cache = self
            .cache(chunk)
            .ok_or(StorageError::ChunkNotLoaded(*chunk))?;
        let database = self.database.clone();
        let chunk = *chunk;
        Ok(self
            .database
            .do_database_write_async(async move {
                database.discard_blocks_in_chunk(&chunk).await?;
                database.save_blocks_in_chunk(&cache).await?;
                database.set_chunk_loaded(&chunk).await
            })
            .await)
    }

    /// Queues a save of `cache`.
    pub async fn save_chunk(&self, cache: Arc<ChunkBlockCache>) -> WriteHandle {
        let database = self.database.clone();
        self.database
            .do_database_write_async(async move { database.save_blocks_in_chunk(&cache).await })
            .await
    }

    /// Saves `chunk` if needed and evicts it from memory.
    ///
    /// Returns whether it was evicted. A chunk whose save failed, or that was changed
    /// again while saving, stays loaded.
    pub async fn unload_chunk(&self, chunk: &ChunkPosition) -> Result<bool, StorageError> {
        let Some(cache) = self.cache(chunk) else {
            return Ok(false);
        };
        if cache.is_dirty() {
            self.save_chunk(cache.clone()).await.wait().await?;
        }
        let evicted = self
            .loaded_chunks
            .remove_if(chunk, |_, current| Arc::ptr_eq(current, &cache) && !current.is_dirty())
            .is_some();
        if !evicted {
            log::debug!("Keeping {chunk} loaded, it changed while saving");
        }
        Ok(evicted)
    }

    /// Saves every dirty chunk and waits for the writes.
    pub async fn save_all(&self) -> Result<(), StorageError> {
        let dirty = self
            .loaded_chunks
            .iter()
            .filter(|entry| entry.value().is_dirty())
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        if dirty.is_empty() {
            return Ok(());
        }
        log::debug!("Saving {} chunks", dirty.len());

        let mut handles = Vec::with_capacity(dirty.len());
        for cache in dirty {
            handles.push(self.save_chunk(cache).await.wait());
        }
        let mut result = Ok(());
        for outcome in join_all(handles).await {
            if let Err(err) = outcome {
                result = Err(err);
            }
        }
        result
    }

    /// Stops the storage executors without losing a write.
    ///
    /// Writes that were still queued run here, then every dirty chunk is saved inline.
    /// Only chunks that are clean afterwards are evicted, the others stay loaded so the
    /// caller can retry the save.
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        log::info!("Saving block overrides...");
        for write in self.database.shutdown_now() {
            write.run().await;
        }
        let result = self.save_all().await;
        self.loaded_chunks.retain(|_, cache| cache.is_dirty());
        if !self.loaded_chunks.is_empty() {
            log::error!(
                "{} chunks could not be saved and stay loaded",
                self.loaded_chunks.len()
            );
        }
        result
    }

    pub fn get(&self, position: &Position) -> Option<BlockVariant> {
        self.loaded_chunks
            .get(&position.chunk_position())
            .and_then(|cache| cache.get(position))
    }

    pub fn put(
        &self,
        position: Position,
        variant: BlockVariant,
    ) -> Result<Option<BlockVariant>, StorageError> {
        let chunk = position.chunk_position();
        let cache = self.cache(&chunk).ok_or(StorageError::ChunkNotLoaded(chunk))?;
        Ok(cache.put(position, variant))
    }

    pub fn remove(&self, position: &Position) -> Result<Option<BlockVariant>, StorageError> {
        let chunk = position.chunk_position();
        let cache = self.cache(&chunk).ok_or(StorageError::ChunkNotLoaded(chunk))?;
        Ok(cache.remove(position))
    }
}
