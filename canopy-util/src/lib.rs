pub mod direction;
pub mod math;

pub use direction::{Axis, BlockFace};
pub use math::position::{ChunkPosition, LargeChunkPosition, Position, RegionSpan};
