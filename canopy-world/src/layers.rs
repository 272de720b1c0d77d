use std::{collections::BTreeSet, sync::Arc};

use canopy_util::{ChunkPosition, LargeChunkPosition, RegionSpan};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::storage::{OverrideStore, StorageError};

/// Y layers where blocks may show their world default, grouped per region.
///
/// Scanning a region for default layers is expensive, the first chunk of a region
/// records what it found and the other chunks of that region reuse it.
pub struct DefaultLayerIndex {
    worlds: DashMap<Uuid, DashMap<LargeChunkPosition, BTreeSet<i32>>>,
    // Regions with a load in flight, woken once it finished
    loading: DashMap<LargeChunkPosition, Arc<Notify>>,
    span: RegionSpan,
    store: Arc<dyn OverrideStore>,
}

impl DefaultLayerIndex {
    pub fn new(span: RegionSpan, store: Arc<dyn OverrideStore>) -> Self {
        Self {
            worlds: DashMap::new(),
            loading: DashMap::new(),
            span,
            store,
        }
    }

    pub fn span(&self) -> RegionSpan {
        self.span
    }

    pub fn region_of(&self, chunk: &ChunkPosition) -> LargeChunkPosition {
        chunk.to_large_chunk(self.span)
    }

    pub fn init_world(&self, world: Uuid) {
        self.worlds.entry(world).or_default();
    }

    /// Forgets everything known about `world`. Stored layers are untouched.
    pub fn teardown_world(&self, world: &Uuid) {
        self.worlds.remove(world);
        self.loading.retain(|region, finished| {
            if region.world != *world {
                return true;
            }
            finished.notify_waiters();
            false
        });
    }

    pub fn is_world_initialized(&self, world: &Uuid) -> bool {
        self.worlds.contains_key(world)
    }

    pub fn is_region_loading(&self, chunk: &ChunkPosition) -> bool {
        self.loading.contains_key(&self.region_of(chunk))
    }

    pub fn is_layer_loaded(&self, chunk: &ChunkPosition) -> bool {
        let region = self.region_of(chunk);
        if self.loading.contains_key(&region) {
            return false;
        }
        self.worlds.get(&chunk.world).is_some_and(|regions| {
            regions
                .get(&region)
                .is_some_and(|layers| !layers.is_empty())
        })
    }

    pub fn possible_default_layers(&self, chunk: &ChunkPosition) -> BTreeSet<i32> {
        let region = self.region_of(chunk);
        self.worlds
            .get(&chunk.world)
            .and_then(|regions| regions.get(&region).map(|layers| layers.clone()))
            .unwrap_or_default()
    }

    fn merge(&self, region: LargeChunkPosition, layers: &BTreeSet<i32>) {
        let regions = self.worlds.entry(region.world).or_default();
        regions
            .entry(region)
            .or_default()
            .extend(layers.iter().copied());
    }

    /// Adds `layers` to the region of `chunk`, in memory and in storage.
    ///
    /// Layers stored earlier but not loaded yet are picked up on the way.
    pub async fn record_default_layers(
        &self,
        layers: &BTreeSet<i32>,
        chunk: &ChunkPosition,
    ) -> Result<(), StorageError> {
        if layers.is_empty() {
            return Ok(());
        }
        let region = self.region_of(chunk);
        self.merge(region, layers);
        let stored = self.store.merge_layers(&region, layers).await?;
        self.merge(region, &stored);
        Ok(())
    }

    /// Pulls the stored layers of the region of `chunk` into memory.
    ///
    /// The region counts as loading until the read finished, successful or not.
    /// A region nothing was stored for simply stays empty. A second load of a region
    /// already loading waits for the first one instead of reading again.
    pub async fn load_default_layers_for_region(
        &self,
        chunk: &ChunkPosition,
    ) -> Result<(), StorageError> {
        let region = self.region_of(chunk);
        let finished = Arc::new(Notify::new());
        let running = match self.loading.entry(region) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(finished.clone());
                None
            }
        };
        if let Some(running) = running {
            let done = running.notified();
            tokio::pin!(done);
            done.as_mut().enable();
            let still_running = self
                .loading
                .get(&region)
                .is_some_and(|current| Arc::ptr_eq(current.value(), &running));
            if still_running {
                log::trace!("Waiting for the running load of {region}");
                done.await;
            }
            return Ok(());
        }

        let outcome = match self.store.read_layers(&region).await {
            Ok(Some(layers)) => {
                log::trace!("Loaded {} default layers for {region}", layers.len());
                self.merge(region, &layers);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                log::warn!("Failed to load default layers for {region}: {err}");
                Err(err)
            }
        };
        self.loading
            .remove_if(&region, |_, current| Arc::ptr_eq(current, &finished));
        finished.notify_waiters();
        outcome
    }
}
