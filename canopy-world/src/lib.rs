pub mod cache;
pub mod layers;
pub mod level;
pub mod logging;
pub mod storage;
pub mod variant;

pub use cache::ChunkBlockCache;
pub use layers::DefaultLayerIndex;
pub use level::{LoadedChunk, OverrideLevel};
pub use storage::{Database, OverrideStore, StorageError};
pub use variant::BlockVariant;
