use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{get_local_cord, get_section_cord};
use crate::direction::BlockFace;

/// A block inside a specific world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Position {
    pub world: Uuid,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(world: Uuid, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// The chunk holding this block.
    pub const fn chunk_position(&self) -> ChunkPosition {
        ChunkPosition::new(self.world, get_section_cord(self.x), get_section_cord(self.z))
    }

    /// Coordinates inside the owning chunk, `x` and `z` are always in `0..16`.
    pub const fn chunk_relative(&self) -> (i32, i32, i32) {
        (get_local_cord(self.x), self.y, get_local_cord(self.z))
    }

    pub const fn offset(&self, face: BlockFace) -> Self {
        let (x, y, z) = face.to_offset();
        Self::new(self.world, self.x + x, self.y + y, self.z + z)
    }

    pub const fn up(&self) -> Self {
        self.offset(BlockFace::Up)
    }

    pub const fn down(&self) -> Self {
        self.offset(BlockFace::Down)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {} in {}", self.x, self.y, self.z, self.world)
    }
}

/// A 16x16 column of blocks, coordinates are in chunk units.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub world: Uuid,
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    pub const fn new(world: Uuid, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// The region this chunk belongs to. Pure function of the world and coordinates.
    pub fn to_large_chunk(&self, span: RegionSpan) -> LargeChunkPosition {
        let span = span.chunks() as i32;
        LargeChunkPosition {
            world: self.world,
            x: self.x.div_euclid(span),
            z: self.z.div_euclid(span),
        }
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.chunk_position() == *self
    }

    pub const fn min_block_x(&self) -> i32 {
        self.x << 4
    }

    pub const fn min_block_z(&self) -> i32 {
        self.z << 4
    }
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {}, {} in {}", self.x, self.z, self.world)
    }
}

/// An aggregation of many chunks sharing one default-layer entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LargeChunkPosition {
    pub world: Uuid,
    pub x: i32,
    pub z: i32,
}

impl LargeChunkPosition {
    pub const fn new(world: Uuid, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }
}

impl fmt::Display for LargeChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {}, {} in {}", self.x, self.z, self.world)
    }
}

/// Width of a large chunk, counted in chunks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RegionSpan(NonZeroU32);

impl RegionSpan {
    /// 528x528 blocks
    pub const DEFAULT: RegionSpan = match NonZeroU32::new(33) {
        Some(chunks) => RegionSpan(chunks),
        None => unreachable!(),
    };

    pub const fn from_chunks(chunks: NonZeroU32) -> Self {
        Self(chunks)
    }

    /// Returns `None` unless `blocks` is a positive multiple of 16.
    pub const fn from_blocks(blocks: u32) -> Option<Self> {
        if blocks % 16 != 0 {
            return None;
        }
        match NonZeroU32::new(blocks / 16) {
            Some(chunks) => Some(Self(chunks)),
            None => None,
        }
    }

    pub const fn chunks(&self) -> u32 {
        self.0.get()
    }

    pub const fn blocks(&self) -> u32 {
        self.0.get() * 16
    }
}

impl Default for RegionSpan {
    fn default() -> Self {
        Self::DEFAULT
    }
}
