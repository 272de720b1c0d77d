use std::{
    collections::{BTreeSet, HashMap},
    future::Future,
    path::Path,
    sync::Arc,
};

use canopy_config::StorageConfig;
use canopy_util::{ChunkPosition, Position};
use uuid::Uuid;

use super::{
    open_store, BlockRecord, OverrideStore, PendingWrite, ReadPool, StorageError, WriteHandle,
    WriteQueue,
};
use crate::{
    cache::ChunkBlockCache,
    layers::DefaultLayerIndex,
    variant::{BlockVariant, VariantRegistry},
};

/// Persists chunk overrides and region default layers through an [`OverrideStore`].
///
/// Writes go through a single queue so writes to one chunk apply in submission order,
/// reads share a bounded pool.
pub struct Database {
    store: Arc<dyn OverrideStore>,
    layers: Arc<DefaultLayerIndex>,
    chunk_version: u32,
    writes: WriteQueue,
    reads: ReadPool,
}

impl Database {
    /// Must be called inside a tokio runtime, the write worker is spawned right away.
    pub fn new(store: Arc<dyn OverrideStore>, config: &StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let layers = Arc::new(DefaultLayerIndex::new(config.region_span()?, store.clone()));
        Ok(Self {
            store,
            layers,
            chunk_version: config.chunk_version,
            writes: WriteQueue::new(),
            reads: ReadPool::new(config.read_threads),
        })
    }

    /// Opens the configured backend, file backends live below `root`.
    pub fn open(config: &StorageConfig, root: &Path) -> Result<Self, StorageError> {
        Self::new(open_store(config, root), config)
    }

    pub fn store(&self) -> &Arc<dyn OverrideStore> {
        &self.store
    }

    pub fn layers(&self) -> &Arc<DefaultLayerIndex> {
        &self.layers
    }

    pub fn chunk_version(&self) -> u32 {
        self.chunk_version
    }

    pub fn init_world(&self, world: Uuid) {
        self.layers.init_world(world);
    }

    pub fn teardown_world(&self, world: &Uuid) {
        self.layers.teardown_world(world);
    }

    pub fn is_layer_loaded(&self, chunk: &ChunkPosition) -> bool {
        self.layers.is_layer_loaded(chunk)
    }

    pub fn possible_default_layers(&self, chunk: &ChunkPosition) -> BTreeSet<i32> {
        self.layers.possible_default_layers(chunk)
    }

    /// Whether the stored overrides of `chunk` were written with the current chunk version.
    pub async fn is_chunk_loaded(&self, chunk: &ChunkPosition) -> Result<bool, StorageError> {
        let version = self.store.read_chunk_version(chunk).await?;
        if let Some(version) = version.filter(|version| *version != self.chunk_version) {
            log::debug!(
                "Chunk {chunk} was stored with version {version}, expected {}",
                self.chunk_version
            );
        }
        Ok(version == Some(self.chunk_version))
    }

    pub async fn set_chunk_loaded(&self, chunk: &ChunkPosition) -> Result<(), StorageError> {
        self.store
            .write_chunk_version(chunk, self.chunk_version)
            .await
    }

    /// Deletes every stored override of `chunk`, used before regenerating a stale chunk.
    pub async fn discard_blocks_in_chunk(&self, chunk: &ChunkPosition) -> Result<(), StorageError> {
        let positions = self
            .store
            .read_blocks(chunk)
            .await?
            .iter()
            .map(|record| record.position(chunk.world))
            .collect::<Vec<_>>();
        if positions.is_empty() {
            return Ok(());
        }
        log::debug!("Discarding {} stale overrides in {chunk}", positions.len());
        let confirmed = self.store.delete_blocks(chunk, &positions).await?;
        if confirmed.len() < positions.len() {
            return Err(StorageError::PartialDelete {
                chunk: *chunk,
                confirmed: confirmed.len(),
                requested: positions.len(),
            });
        }
        Ok(())
    }

    /// Writes the pending removals and every override that differs from the world default.
    ///
    /// The cache is only marked clean when the write completed and nothing changed meanwhile.
    /// Returns without writing when another save of this cache is running.
    pub async fn save_blocks_in_chunk(&self, cache: &ChunkBlockCache) -> Result<(), StorageError> {
        if !cache.try_begin_save() {
            log::debug!(
                "Chunk {} is already being saved, skipping",
                cache.chunk_position()
            );
            return Ok(());
        }
        let result = self.write_blocks(cache).await;
        if let Ok(true) = result {
            cache.mark_clean();
        }
        cache.set_safe_to_mark_clean(true);
        cache.set_saving(false);
        result.map(|_| ())
    }

    /// Returns whether everything the cache holds is now stored.
    async fn write_blocks(&self, cache: &ChunkBlockCache) -> Result<bool, StorageError> {
        let chunk = cache.chunk_position();

        let removed = cache.removed_entries();
        if !removed.is_empty() {
            let positions = removed
                .iter()
                .map(|(position, _)| *position)
                .collect::<Vec<_>>();
            let confirmed = self.store.delete_blocks(&chunk, &positions).await?;
            cache.clear_removed_positions(|position, _| confirmed.contains(position));
            if confirmed.len() < positions.len() {
                log::warn!(
                    "Only {} of {} removed overrides in {chunk} were deleted, retrying on the next save",
                    confirmed.len(),
                    positions.len()
                );
            }
        }
        let all_removed = !cache.has_removed_positions();

        if cache.is_empty() {
            return Ok(all_removed);
        }

        let records = cache
            .entries()
            .into_iter()
            .filter(|(_, variant)| variant.should_save(cache.defaults()))
            .map(|(position, variant)| BlockRecord::from_variant(&position, &variant))
            .collect::<Vec<_>>();
        if !records.is_empty() {
            log::trace!("Saving {} overrides in {chunk}", records.len());
            self.store.upsert_blocks(&chunk, records).await?;
        }
        Ok(all_removed)
    }

    /// Reads the stored overrides of `chunk`, skipping records that no longer resolve.
    pub async fn get_blocks_in_chunk(
        &self,
        chunk: &ChunkPosition,
        registry: &dyn VariantRegistry,
    ) -> Result<HashMap<Position, BlockVariant>, StorageError> {
        let records = self.store.read_blocks(chunk).await?;
        let mut blocks = HashMap::with_capacity(records.len());
        for record in records {
            let position = record.position(chunk.world);
            if !chunk.contains(&position) {
                log::warn!("Ignoring stored override at {position}, it is outside of {chunk}");
                continue;
            }
            if let Some(variant) = record.to_variant(registry) {
                blocks.insert(position, variant);
            }
        }
        Ok(blocks)
    }

    pub async fn save_default_data_layers(
        &self,
        layers: &BTreeSet<i32>,
        chunk: &ChunkPosition,
    ) -> Result<(), StorageError> {
        self.layers.record_default_layers(layers, chunk).await
    }

    pub async fn load_all_default_possible_layers_in_world(
        &self,
        chunk: &ChunkPosition,
    ) -> Result<(), StorageError> {
        self.layers.load_default_layers_for_region(chunk).await
    }

    /// Queues a write, or runs it before returning once the queue was shut down.
    pub async fn do_database_write_async<F>(&self, task: F) -> WriteHandle
    where
        F: Future<Output = Result<(), StorageError>> + Send + 'static,
    {
        self.writes.submit(task).await
    }

    pub async fn do_database_read_async<T, F>(&self, task: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, StorageError>> + Send + 'static,
    {
        self.reads.run(task).await
    }

    /// Stops both executors and hands back the writes that never started.
    pub fn shutdown_now(&self) -> Vec<PendingWrite> {
        self.reads.shutdown();
        let unstarted = self.writes.shutdown_now();
        if !unstarted.is_empty() {
            log::info!("{} storage writes were not started", unstarted.len());
        }
        unstarted
    }

    pub fn is_shut_down(&self) -> bool {
        self.writes.is_shut_down()
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.pending()
    }

    /// Waits for every write queued so far.
    pub async fn await_writes(&self) {
        self.writes.wait_idle().await;
    }

    /// Lets the queued writes finish, then stops both executors.
    pub async fn close(&self) {
        self.writes.close().await;
        self.reads.shutdown();
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::{BTreeSet, HashMap, HashSet},
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
    };

    use async_trait::async_trait;
    use canopy_config::{ConfigError, StorageConfig};
    use canopy_util::{ChunkPosition, LargeChunkPosition, Position};
    use temp_dir::TempDir;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::Database;
    use crate::{
        cache::ChunkBlockCache,
        storage::{BlockRecord, FileStore, MemoryStore, OverrideStore, StorageError},
        variant::{
            test_support::{
                cave_vines, default_oak_log, defaults, every_kind, oak_leaves, oak_log, registry,
            },
            BlockVariant,
        },
    };

    fn new_cache(chunk: ChunkPosition) -> ChunkBlockCache {
        ChunkBlockCache::new(chunk, Arc::new(defaults()))
    }

    fn memory_database() -> (Database, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let database = Database::new(store.clone(), &StorageConfig::default()).unwrap();
        (database, store)
    }

    fn persisted_state(cache: &ChunkBlockCache) -> HashMap<Position, BlockVariant> {
        cache
            .entries()
            .into_iter()
            .filter(|(_, variant)| variant.should_save(cache.defaults()))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_invalid_config() {
        let store = Arc::new(MemoryStore::default());
        let config = StorageConfig {
            read_threads: 0,
            ..Default::default()
        };
        assert!(matches!(
            Database::new(store.clone(), &config),
            Err(StorageError::Config(ConfigError::Invalid(_)))
        ));

        let config = StorageConfig {
            region_size: 20,
            ..Default::default()
        };
        assert!(matches!(
            Database::new(store, &config),
            Err(StorageError::Config(ConfigError::InvalidRegionSize(20)))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chunk_version_marker() {
        let (database, store) = memory_database();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 4, -4);
        assert!(!database.is_chunk_loaded(&chunk).await.unwrap());
        database.set_chunk_loaded(&chunk).await.unwrap();
        assert!(database.is_chunk_loaded(&chunk).await.unwrap());

        // Written by an older schema
        store.write_chunk_version(&chunk, 0).await.unwrap();
        assert!(!database.is_chunk_loaded(&chunk).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(temp_dir.path()));
        let database = Database::new(store, &StorageConfig::default()).unwrap();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        let cache = new_cache(chunk);

        for (x, variant) in every_kind().into_iter().enumerate() {
            cache.put(Position::new(chunk.world, x as i32, 64, 0), variant);
        }
        cache.put(
            Position::new(chunk.world, 0, 65, 0),
            oak_log("mossy_oak_log").strip().into(),
        );
        cache.put(
            Position::new(chunk.world, 1, 65, 0),
            oak_leaves("red_oak_leaves").with_waterlogged(true).into(),
        );
        cache.put(
            Position::new(chunk.world, 2, 65, 0),
            cave_vines("bright_vines").with_glow_berry(true).into(),
        );
        // Implied by the world, never written
        cache.put(Position::new(chunk.world, 3, 65, 0), default_oak_log().into());
        cache.put(
            Position::new(chunk.world, 4, 65, 0),
            oak_leaves("default_oak_leaves").into(),
        );

        database.save_blocks_in_chunk(&cache).await.unwrap();
        assert!(!cache.is_dirty());
        assert!(!cache.is_saving());

        let loaded = database.get_blocks_in_chunk(&chunk, &registry()).await.unwrap();
        assert_eq!(loaded, persisted_state(&cache));
        assert_eq!(loaded.len(), cache.len() - 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn removals_are_deleted() {
        let (database, _) = memory_database();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 1, 1);
        let cache = new_cache(chunk);
        let kept = Position::new(chunk.world, 16, 0, 16);
        let removed = Position::new(chunk.world, 17, 0, 16);
        cache.put(kept, oak_log("mossy_oak_log").into());
        cache.put(removed, oak_log("mossy_oak_log").into());
        database.save_blocks_in_chunk(&cache).await.unwrap();

        cache.remove(&removed);
        assert!(cache.is_dirty());
        database.save_blocks_in_chunk(&cache).await.unwrap();
        assert!(!cache.is_dirty());
        assert!(!cache.has_removed_positions());

        let loaded = database.get_blocks_in_chunk(&chunk, &registry()).await.unwrap();
        assert_eq!(loaded.keys().copied().collect::<Vec<_>>(), vec![kept]);

        // Emptying the chunk still deletes what was stored
        cache.remove(&kept);
        database.save_blocks_in_chunk(&cache).await.unwrap();
        assert!(!cache.is_dirty());
        assert!(database
            .get_blocks_in_chunk(&chunk, &registry())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_records_are_skipped_on_load() {
        let _ = env_logger::try_init();
        let (database, store) = memory_database();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        let good = Position::new(chunk.world, 0, 0, 0);
        let mut unknown = BlockRecord::from_variant(
            &Position::new(chunk.world, 1, 0, 0),
            &oak_log("mossy_oak_log").into(),
        );
        unknown.block_type = "coral".to_string();
        store
            .upsert_blocks(
                &chunk,
                vec![
                    BlockRecord::from_variant(&good, &oak_log("mossy_oak_log").into()),
                    unknown,
                ],
            )
            .await
            .unwrap();

        let loaded = database.get_blocks_in_chunk(&chunk, &registry()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&good));
    }

    /// Refuses to delete `stubborn` and counts upserts.
    struct FlakyStore {
        inner: MemoryStore,
        stubborn: Position,
        fail_upserts: AtomicBool,
        upserts: AtomicUsize,
        // Set while an upsert waits for `release`
        gate: Option<(Notify, Notify)>,
    }

    impl FlakyStore {
        fn new(stubborn: Position, gated: bool) -> Self {
            Self {
                inner: MemoryStore::default(),
                stubborn,
                fail_upserts: AtomicBool::new(false),
                upserts: AtomicUsize::new(0),
                gate: gated.then(|| (Notify::new(), Notify::new())),
            }
        }
    }

    #[async_trait]
    impl OverrideStore for FlakyStore {
        async fn read_chunk_version(
            &self,
            chunk: &ChunkPosition,
        ) -> Result<Option<u32>, StorageError> {
            self.inner.read_chunk_version(chunk).await
        }

        async fn write_chunk_version(
            &self,
            chunk: &ChunkPosition,
            version: u32,
        ) -> Result<(), StorageError> {
            self.inner.write_chunk_version(chunk, version).await
        }

        async fn read_blocks(
            &self,
            chunk: &ChunkPosition,
        ) -> Result<Vec<BlockRecord>, StorageError> {
            self.inner.read_blocks(chunk).await
        }

        async fn upsert_blocks(
            &self,
            chunk: &ChunkPosition,
            blocks: Vec<BlockRecord>,
        ) -> Result<(), StorageError> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(StorageError::IoError(std::io::ErrorKind::Other));
            }
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert_blocks(chunk, blocks).await
        }

        async fn delete_blocks(
            &self,
            chunk: &ChunkPosition,
            positions: &[Position],
        ) -> Result<HashSet<Position>, StorageError> {
            let allowed = positions
                .iter()
                .copied()
                .filter(|position| *position != self.stubborn)
                .collect::<Vec<_>>();
            self.inner.delete_blocks(chunk, &allowed).await
        }

        async fn read_layers(
            &self,
            region: &LargeChunkPosition,
        ) -> Result<Option<BTreeSet<i32>>, StorageError> {
            self.inner.read_layers(region).await
        }

        async fn merge_layers(
            &self,
            region: &LargeChunkPosition,
            layers: &BTreeSet<i32>,
        ) -> Result<BTreeSet<i32>, StorageError> {
            self.inner.merge_layers(region, layers).await
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unconfirmed_removal_is_retried() {
        let _ = env_logger::try_init();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        let stubborn = Position::new(chunk.world, 1, 1, 1);
        let deletable = Position::new(chunk.world, 2, 1, 1);
        let store = Arc::new(FlakyStore::new(stubborn, false));
        let database = Database::new(store.clone(), &StorageConfig::default()).unwrap();
        let cache = new_cache(chunk);

        cache.put(stubborn, oak_log("mossy_oak_log").into());
        cache.put(deletable, oak_log("mossy_oak_log").into());
        database.save_blocks_in_chunk(&cache).await.unwrap();
        cache.remove(&stubborn);
        cache.remove(&deletable);

        database.save_blocks_in_chunk(&cache).await.unwrap();
        assert_eq!(
            cache
                .removed_entries()
                .into_iter()
                .map(|(position, _)| position)
                .collect::<Vec<_>>(),
            vec![stubborn]
        );
        // Something is still stored that should not be
        assert!(cache.is_dirty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_write_keeps_cache_dirty() {
        let _ = env_logger::try_init();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        let store = Arc::new(FlakyStore::new(Position::new(chunk.world, 0, -100, 0), false));
        store.fail_upserts.store(true, Ordering::SeqCst);
        let database = Database::new(store.clone(), &StorageConfig::default()).unwrap();
        let cache = new_cache(chunk);
        cache.put(Position::new(chunk.world, 0, 0, 0), oak_log("mossy_oak_log").into());

        assert!(database.save_blocks_in_chunk(&cache).await.is_err());
        assert!(cache.is_dirty());
        assert!(!cache.is_saving());

        store.fail_upserts.store(false, Ordering::SeqCst);
        database.save_blocks_in_chunk(&cache).await.unwrap();
        assert!(!cache.is_dirty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mutations_during_save_converge() {
        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        let store = Arc::new(FlakyStore::new(Position::new(chunk.world, 0, -100, 0), true));
        let database = Arc::new(Database::new(store.clone(), &StorageConfig::default()).unwrap());
        let cache = Arc::new(new_cache(chunk));
        for x in 0..16 {
            cache.put(Position::new(chunk.world, x, 0, 0), oak_log("mossy_oak_log").into());
        }

        let saving = {
            let database = database.clone();
            let cache = cache.clone();
            tokio::spawn(async move { database.save_blocks_in_chunk(&cache).await })
        };
        let (entered, release) = store.gate.as_ref().unwrap();
        entered.notified().await;
        assert!(cache.is_saving());

        let mutations = (0..100)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let position = Position::new(chunk.world, i % 16, 0, i / 16);
                    match i % 4 {
                        0 => {
                            cache.remove(&position);
                        }
                        1 => {
                            cache.put(position, oak_log("mossy_oak_log").strip().into());
                        }
                        2 => {
                            cache.put(position, oak_leaves("red_oak_leaves").into());
                        }
                        _ => {
                            cache.put(position, default_oak_log().into());
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for mutation in mutations {
            mutation.await.unwrap();
        }

        release.notify_one();
        saving.await.unwrap().unwrap();
        // The save raced the mutations, so it must not have marked the cache clean
        assert!(cache.is_dirty());

        release.notify_one();
        database.save_blocks_in_chunk(&cache).await.unwrap();
        assert!(!cache.is_dirty());
        assert_eq!(store.upserts.load(Ordering::SeqCst), 2);

        let loaded = database.get_blocks_in_chunk(&chunk, &registry()).await.unwrap();
        assert_eq!(loaded, persisted_state(&cache));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_after_shutdown_runs_inline() {
        let (database, store) = memory_database();
        assert!(database.shutdown_now().is_empty());
        assert!(database.is_shut_down());

        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        let handle = {
            let store = store.clone();
            database
                .do_database_write_async(async move { store.write_chunk_version(&chunk, 1).await })
                .await
        };
        // Visible before the handle is even awaited
        assert_eq!(store.read_chunk_version(&chunk).await.unwrap(), Some(1));
        handle.wait().await.unwrap();

        // Reads are refused once shut down
        assert!(database
            .do_database_read_async(async { Ok(()) })
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queued_writes_apply_in_order() {
        let (database, store) = memory_database();
        let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
        for version in 1..=20 {
            let store = store.clone();
            drop(
                database
                    .do_database_write_async(async move {
                        store.write_chunk_version(&chunk, version).await
                    })
                    .await,
            );
        }
        database.await_writes().await;
        assert_eq!(database.pending_writes(), 0);
        assert_eq!(store.read_chunk_version(&chunk).await.unwrap(), Some(20));

        let read_store = store.clone();
        let version = database
            .do_database_read_async(async move { read_store.read_chunk_version(&chunk).await })
            .await
            .unwrap();
        assert_eq!(version, Some(20));
        database.close().await;
    }
}
