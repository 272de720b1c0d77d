use std::sync::Arc;

use canopy_config::{DefaultVariantsConfig, StorageConfig};
use canopy_util::{ChunkPosition, Position};
use canopy_world::{
    cache::ChunkBlockCache,
    storage::{Database, MemoryStore},
    variant::{BlockVariant, LeafVariant, Material, VariantBase},
};
use criterion::{criterion_group, criterion_main, Criterion};
use uuid::Uuid;

fn leaves() -> BlockVariant {
    LeafVariant::new(
        VariantBase::new("red_oak_leaves", 1, Material::new("minecraft:oak_leaves")),
        7,
        true,
        false,
    )
    .into()
}

fn filled_cache(chunk: ChunkPosition) -> ChunkBlockCache {
    let cache = ChunkBlockCache::new(chunk, Arc::new(DefaultVariantsConfig::default()));
    for x in 0..16 {
        for z in 0..16 {
            cache.put(Position::new(chunk.world, x, 64, z), leaves());
        }
    }
    cache
}

fn bench_cache(c: &mut Criterion) {
    let chunk = ChunkPosition::new(Uuid::new_v4(), 0, 0);
    let variant = leaves();

    c.bench_function("cache put and remove", |b| {
        let cache = ChunkBlockCache::new(chunk, Arc::new(DefaultVariantsConfig::default()));
        b.iter(|| {
            for x in 0..16 {
                let position = Position::new(chunk.world, x, 64, 0);
                cache.put(position, variant.clone());
                cache.remove(&position);
            }
            cache.clear_removed_positions(|_, _| true);
        });
    });

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let database = runtime.block_on(async {
        Database::new(Arc::new(MemoryStore::default()), &StorageConfig::default()).unwrap()
    });
    let cache = filled_cache(chunk);
    c.bench_function("save full chunk", |b| {
        b.to_async(&runtime).iter(|| async {
            cache.put(Position::new(chunk.world, 0, 64, 0), leaves());
            database.save_blocks_in_chunk(&cache).await.unwrap();
        });
    });
}

criterion_group!(benches, bench_cache);
criterion_main!(benches);
