use std::{collections::HashMap, sync::Arc};

use canopy_util::{ChunkPosition, Position};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::variant::{BlockVariant, ConfigSource};

#[derive(Debug, Clone, Copy)]
struct CacheFlags {
    dirty: bool,
    saving: bool,
    safe_to_mark_clean: bool,
}

/// The overrides of a single chunk.
///
/// Game code mutates it synchronously while a storage task may concurrently
/// drain the removed entries and iterate the live mapping for a save.
pub struct ChunkBlockCache {
    chunk: ChunkPosition,
    blocks: DashMap<Position, BlockVariant>,
    // Positions removed since the last flush, with what was removed
    removed: DashMap<Position, BlockVariant>,
    flags: Mutex<CacheFlags>,
    defaults: Arc<dyn ConfigSource>,
}

impl ChunkBlockCache {
    pub fn new(chunk: ChunkPosition, defaults: Arc<dyn ConfigSource>) -> Self {
        Self::from_blocks(chunk, HashMap::new(), defaults)
    }

    /// A clean cache holding what storage returned for this chunk.
    pub fn from_blocks(
        chunk: ChunkPosition,
        blocks: HashMap<Position, BlockVariant>,
        defaults: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            chunk,
            blocks: blocks.into_iter().collect(),
            removed: DashMap::new(),
            flags: Mutex::new(CacheFlags {
                dirty: false,
                saving: false,
                safe_to_mark_clean: true,
            }),
            defaults,
        }
    }

    pub fn chunk_position(&self) -> ChunkPosition {
        self.chunk
    }

    pub fn defaults(&self) -> &dyn ConfigSource {
        self.defaults.as_ref()
    }

    pub fn get(&self, position: &Position) -> Option<BlockVariant> {
        self.blocks.get(position).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.blocks.contains_key(position)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Inserts or replaces the override at `position`, cancelling a pending removal.
    pub fn put(&self, position: Position, variant: BlockVariant) -> Option<BlockVariant> {
        debug_assert!(
            self.chunk.contains(&position),
            "{position} is outside of {}",
            self.chunk
        );
        let persisted = variant.should_save(self.defaults());
        let previous = self.blocks.insert(position, variant);
        if persisted {
            self.removed.remove(&position);
        } else if let Some(previous) = previous.as_ref().filter(|p| p.should_save(self.defaults())) {
            // The new value is never written, so the stored one has to be deleted instead
            self.removed.insert(position, previous.clone());
        }
        self.mark_dirty();
        previous
    }

    pub fn remove(&self, position: &Position) -> Option<BlockVariant> {
        let (_, variant) = self.blocks.remove(position)?;
        if variant.should_save(self.defaults()) {
            self.removed.insert(*position, variant.clone());
        }
        self.mark_dirty();
        Some(variant)
    }

    /// Snapshot of the live mapping.
    pub fn entries(&self) -> Vec<(Position, BlockVariant)> {
        self.blocks
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Snapshot of the removals waiting for a backend delete.
    pub fn removed_entries(&self) -> Vec<(Position, BlockVariant)> {
        self.removed
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn has_removed_positions(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Drains the pending removals through `consumer`.
    ///
    /// An entry is only cleared when `consumer` confirms the delete by returning `true`,
    /// the others stay for the next flush. An entry replaced by a newer removal while
    /// the consumer ran is kept as well.
    pub fn clear_removed_positions<F>(&self, mut consumer: F) -> usize
    where
        F: FnMut(&Position, &BlockVariant) -> bool,
    {
        let mut cleared = 0;
        for (position, variant) in self.removed_entries() {
            if !consumer(&position, &variant) {
                continue;
            }
            if self
                .removed
                .remove_if(&position, |_, pending| *pending == variant)
                .is_some()
            {
                cleared += 1;
            }
        }
        cleared
    }

    fn mark_dirty(&self) {
        let mut flags = self.flags.lock();
        flags.dirty = true;
        if flags.saving {
            // Whatever is being written right now may miss this change
            flags.safe_to_mark_clean = false;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.lock().dirty
    }

    /// Clears the dirty flag, unless a mutation raced the save in flight.
    pub fn mark_clean(&self) -> bool {
        let mut flags = self.flags.lock();
        if flags.safe_to_mark_clean {
            flags.dirty = false;
        }
        !flags.dirty
    }

    pub fn is_saving(&self) -> bool {
        self.flags.lock().saving
    }

    pub fn set_saving(&self, saving: bool) {
        self.flags.lock().saving = saving;
    }

    /// Sets the saving flag unless a save is already running, returns whether it did.
    pub fn try_begin_save(&self) -> bool {
        let mut flags = self.flags.lock();
        if flags.saving {
            return false;
        }
        flags.saving = true;
        true
    }

    pub fn is_safe_to_mark_clean(&self) -> bool {
        self.flags.lock().safe_to_mark_clean
    }

    pub fn set_safe_to_mark_clean(&self, safe: bool) {
        self.flags.lock().safe_to_mark_clean = safe;
    }
}

impl std::fmt::Debug for ChunkBlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = *self.flags.lock();
        f.debug_struct("ChunkBlockCache")
            .field("chunk", &self.chunk)
            .field("blocks", &self.blocks.len())
            .field("removed", &self.removed.len())
            .field("dirty", &flags.dirty)
            .field("saving", &flags.saving)
            .finish()
    }
}
