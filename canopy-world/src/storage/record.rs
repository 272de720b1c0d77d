use std::collections::{hash_map::Entry, BTreeSet, HashMap, HashSet};

use canopy_util::Position;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::variant::{BlockVariant, VariantKind, VariantRegistry};

/// Everything stored for one chunk.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_version: Option<u32>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
}

impl ChunkRecord {
    /// Replaces the records at the same coordinates and appends the others.
    pub fn upsert(&mut self, blocks: Vec<BlockRecord>) {
        let mut index = self
            .blocks
            .iter()
            .enumerate()
            .map(|(slot, block)| (block.coords(), slot))
            .collect::<HashMap<_, _>>();
        for block in blocks {
            match index.entry(block.coords()) {
                Entry::Occupied(entry) => self.blocks[*entry.get()] = block,
                Entry::Vacant(entry) => {
                    entry.insert(self.blocks.len());
                    self.blocks.push(block);
                }
            }
        }
    }

    /// Removes the records at `coords`, returns how many were matched.
    pub fn delete(&mut self, coords: &[(i32, i32, i32)]) -> usize {
        let coords = coords.iter().copied().collect::<HashSet<_>>();
        let before = self.blocks.len();
        self.blocks.retain(|block| !coords.contains(&block.coords()));
        before - self.blocks.len()
    }
}

/// One persisted override.
///
/// Only the toggle matching `block_type` is written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub block_x: i32,
    pub block_y: i32,
    pub block_z: i32,
    pub block_id: String,
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waterlogged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glow_berry: Option<bool>,
}

impl BlockRecord {
    pub fn from_variant(position: &Position, variant: &BlockVariant) -> Self {
        let mut record = Self {
            block_x: position.x,
            block_y: position.y,
            block_z: position.z,
            block_id: variant.id().to_string(),
            block_type: variant.kind().tag().to_string(),
            stripped: None,
            waterlogged: None,
            glow_berry: None,
        };
        match variant {
            BlockVariant::Log(log) => record.stripped = Some(log.stripped()),
            BlockVariant::Leaf(leaf) => record.waterlogged = Some(leaf.waterlogged()),
            BlockVariant::CaveVine(vine) => record.glow_berry = Some(vine.glow_berry()),
            BlockVariant::Ageable(_) | BlockVariant::NoteBlock(_) | BlockVariant::Sapling(_) => {}
        }
        record
    }

    pub fn coords(&self) -> (i32, i32, i32) {
        (self.block_x, self.block_y, self.block_z)
    }

    pub fn position(&self, world: Uuid) -> Position {
        Position::new(world, self.block_x, self.block_y, self.block_z)
    }

    /// Resolves the base variant and applies the stored toggle.
    pub fn to_variant(&self, registry: &dyn VariantRegistry) -> Option<BlockVariant> {
        let Some(kind) = VariantKind::from_tag(&self.block_type) else {
            log::warn!(
                "Unknown block type {} at {}, {}, {}",
                self.block_type,
                self.block_x,
                self.block_y,
                self.block_z
            );
            return None;
        };
        let Some(variant) = registry.resolve(kind, &self.block_id) else {
            log::warn!(
                "Could not find {kind} variant {} at {}, {}, {}",
                self.block_id,
                self.block_x,
                self.block_y,
                self.block_z
            );
            return None;
        };
        let variant = match variant {
            BlockVariant::Log(log) => log.with_stripped(self.stripped.unwrap_or(false)).into(),
            BlockVariant::Leaf(leaf) => leaf
                .with_waterlogged(self.waterlogged.unwrap_or(false))
                .into(),
            BlockVariant::CaveVine(vine) => vine
                .with_glow_berry(self.glow_berry.unwrap_or(false))
                .into(),
            variant @ (BlockVariant::Ageable(_)
            | BlockVariant::NoteBlock(_)
            | BlockVariant::Sapling(_)) => variant,
        };
        Some(variant)
    }
}

/// The possible default layers of one region.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerRecord {
    pub layers: BTreeSet<i32>,
}

#[cfg(test)]
mod test {
    use canopy_util::Position;
    use uuid::Uuid;

    use super::{BlockRecord, ChunkRecord};
    use crate::variant::{
        test_support::{cave_vines, oak_leaves, oak_log, registry, sugar_cane},
        BlockVariant,
    };

    #[test]
    fn json_layout() {
        let position = Position::new(Uuid::new_v4(), 1, -60, 15);
        let record = BlockRecord::from_variant(&position, &oak_log("mossy_oak_log").strip().into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "blockX": 1,
                "blockY": -60,
                "blockZ": 15,
                "blockId": "mossy_oak_log",
                "blockType": "log",
                "stripped": true,
            })
        );

        let cane = BlockRecord::from_variant(&position, &sugar_cane("tall_cane").into());
        let json = serde_json::to_value(&cane).unwrap();
        assert!(json.get("stripped").is_none());
        assert!(json.get("waterlogged").is_none());
        assert!(json.get("glowBerry").is_none());
    }

    #[test]
    fn toggles_survive_resolution() {
        let registry = registry();
        let position = Position::new(Uuid::new_v4(), 0, 0, 0);
        let variants: Vec<BlockVariant> = vec![
            oak_log("mossy_oak_log").strip().into(),
            oak_leaves("red_oak_leaves").with_waterlogged(true).into(),
            cave_vines("bright_vines").with_glow_berry(true).into(),
        ];
        for variant in variants {
            let record = BlockRecord::from_variant(&position, &variant);
            assert_eq!(record.to_variant(&registry), Some(variant));
        }
    }

    #[test]
    fn unknown_records_are_skipped() {
        let _ = env_logger::try_init();
        let registry = registry();
        let mut record =
            BlockRecord::from_variant(&Position::new(Uuid::new_v4(), 0, 0, 0), &sugar_cane("tall_cane").into());
        record.block_type = "coral".to_string();
        assert_eq!(record.to_variant(&registry), None);

        record.block_type = "ageable".to_string();
        record.block_id = "missing_cane".to_string();
        assert_eq!(record.to_variant(&registry), None);
    }

    #[test]
    fn upsert_replaces_by_coordinates() {
        let position = Position::new(Uuid::new_v4(), 4, 4, 4);
        let mut chunk = ChunkRecord::default();
        chunk.upsert(vec![BlockRecord::from_variant(&position, &oak_log("mossy_oak_log").into())]);
        chunk.upsert(vec![BlockRecord::from_variant(
            &position,
            &oak_log("mossy_oak_log").strip().into(),
        )]);
        assert_eq!(chunk.blocks.len(), 1);
        assert_eq!(chunk.blocks[0].stripped, Some(true));

        assert_eq!(chunk.delete(&[(4, 4, 4), (5, 5, 5)]), 1);
        assert!(chunk.blocks.is_empty());
    }

    #[test]
    fn upsert_full_chunk() {
        let world = Uuid::new_v4();
        let leaves: BlockVariant = oak_leaves("red_oak_leaves").into();
        let wet: BlockVariant = oak_leaves("red_oak_leaves").with_waterlogged(true).into();
        let layer = |y: i32, variant: &BlockVariant| {
            (0..16)
                .flat_map(|x| (0..16).map(move |z| (x, z)))
                .map(|(x, z)| BlockRecord::from_variant(&Position::new(world, x, y, z), variant))
                .collect::<Vec<_>>()
        };

        let mut chunk = ChunkRecord::default();
        for y in 0..64 {
            chunk.upsert(layer(y, &leaves));
        }
        assert_eq!(chunk.blocks.len(), 16 * 16 * 64);

        // Every record is replaced in place, the order stays stable
        let mut batch = Vec::new();
        for y in 0..64 {
            batch.extend(layer(y, &wet));
        }
        chunk.upsert(batch);
        assert_eq!(chunk.blocks.len(), 16 * 16 * 64);
        assert!(chunk.blocks.iter().all(|block| block.waterlogged == Some(true)));
        assert_eq!(chunk.blocks[0].coords(), (0, 0, 0));

        // Duplicates in one batch keep the last record
        let position = Position::new(world, 0, 100, 0);
        chunk.upsert(vec![
            BlockRecord::from_variant(&position, &leaves),
            BlockRecord::from_variant(&position, &wet),
        ]);
        assert_eq!(chunk.blocks.len(), 16 * 16 * 64 + 1);
        assert_eq!(chunk.blocks.last().map(|block| block.waterlogged), Some(Some(true)));
    }
}
