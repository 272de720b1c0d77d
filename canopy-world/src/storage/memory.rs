use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use canopy_util::{ChunkPosition, LargeChunkPosition, Position};
use dashmap::DashMap;

use super::{BlockRecord, ChunkRecord, OverrideStore, StorageError};

/// Keeps every record in memory, nothing outlives the process.
#[derive(Default)]
pub struct MemoryStore {
    chunks: DashMap<ChunkPosition, ChunkRecord>,
    layers: DashMap<LargeChunkPosition, BTreeSet<i32>>,
}

impl MemoryStore {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl OverrideStore for MemoryStore {
    async fn read_chunk_version(&self, chunk: &ChunkPosition) -> Result<Option<u32>, StorageError> {
        Ok(self
            .chunks
            .get(chunk)
            .and_then(|record| record.chunk_version))
    }

    async fn write_chunk_version(
        &self,
        chunk: &ChunkPosition,
        version: u32,
    ) -> Result<(), StorageError> {
        self.chunks.entry(*chunk).or_default().chunk_version = Some(version);
        Ok(())
    }

    async fn read_blocks(&self, chunk: &ChunkPosition) -> Result<Vec<BlockRecord>, StorageError> {
        Ok(self
            .chunks
            .get(chunk)
            .map(|record| record.blocks.clone())
            .unwrap_or_default())
    }

    async fn upsert_blocks(
        &self,
        chunk: &ChunkPosition,
        blocks: Vec<BlockRecord>,
    ) -> Result<(), StorageError> {
        self.chunks.entry(*chunk).or_default().upsert(blocks);
        Ok(())
    }

    async fn delete_blocks(
        &self,
        chunk: &ChunkPosition,
        positions: &[Position],
    ) -> Result<HashSet<Position>, StorageError> {
        let coords = positions
            .iter()
            .map(|position| (position.x, position.y, position.z))
            .collect::<Vec<_>>();
        if let Some(mut record) = self.chunks.get_mut(chunk) {
            record.delete(&coords);
        }
        Ok(positions.iter().copied().collect())
    }

    async fn read_layers(
        &self,
        region: &LargeChunkPosition,
    ) -> Result<Option<BTreeSet<i32>>, StorageError> {
        Ok(self.layers.get(region).map(|layers| layers.clone()))
    }

    async fn merge_layers(
        &self,
        region: &LargeChunkPosition,
        layers: &BTreeSet<i32>,
    ) -> Result<BTreeSet<i32>, StorageError> {
        let mut stored = self.layers.entry(*region).or_default();
        stored.extend(layers.iter().copied());
        Ok(stored.clone())
    }
}
