use bevy::log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::chunk::Chunk;
use crate::render::ChunkRenderCache;
use crate::types::{ChunkKey, TerrainConfig};

/// Owns every chunk, keyed by exact chunk coordinates.
pub struct ChunkRegistry {
    config: TerrainConfig,
    chunks: RwLock<HashMap<ChunkKey, Arc<Chunk>>>,
}

impl ChunkRegistry {
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            config: config.clone(),
            chunks: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: ChunkKey) -> Option<Arc<Chunk>> {
        self.read().get(&key).cloned()
    }

    /// Returns the chunk at `key`, creating it if needed. Concurrent callers
    /// for one key always receive the same instance.
    pub fn get_or_create(&self, key: ChunkKey) -> Arc<Chunk> {
        if let Some(chunk) = self.get(key) {
            return chunk;
        }

        let mut chunks = self.write();
        let chunk = chunks.entry(key).or_insert_with(|| {
            debug!("new chunk {key}");
            Arc::new(Chunk::new(key))
        });
        Arc::clone(chunk)
    }

    /// Visits a snapshot of all chunks; the visitor may call back into the registry.
    pub fn for_each(&self, mut visitor: impl FnMut(&Arc<Chunk>)) {
        let snapshot: Vec<Arc<Chunk>> = self.read().values().cloned().collect();
        for chunk in &snapshot {
            visitor(chunk);
        }
    }

    pub fn keys(&self) -> Vec<ChunkKey> {
        let mut keys: Vec<ChunkKey> = self.read().keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Render caches of built chunks within `radius` chunks of the viewer,
    /// x outer and z inner.
    pub fn nearby(&self, viewer_x: f32, viewer_z: f32, radius: i32) -> Vec<Arc<ChunkRenderCache>> {
        let center = ChunkKey::from_world_position(&self.config, viewer_x, viewer_z);

        // No terrain exists outside 0..world_chunks on either axis.
        let xs = center.x.saturating_sub(radius).max(0)
            ..=center.x.saturating_add(radius).min(self.config.world_chunks_x - 1);
        let zs = center.z.saturating_sub(radius).max(0)
            ..=center.z.saturating_add(radius).min(self.config.world_chunks_z - 1);

        let mut out = Vec::new();
        for x in xs {
            for z in zs.clone() {
                let Some(chunk) = self.get(ChunkKey::new(x, z)) else {
                    continue;
                };
                let Some(cache) = chunk.render_cache() else {
                    continue;
                };
                out.push(cache);
            }
        }
        out
    }

    /// Releases every chunk's model. Returns how many chunks held one.
    pub fn dispose(&self) -> usize {
        let mut released = 0;
        self.for_each(|chunk| {
            if chunk.dispose() {
                released += 1;
            }
        });
        if released > 0 {
            info!("released {released} chunk meshes");
        }
        released
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChunkKey, Arc<Chunk>>> {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChunkKey, Arc<Chunk>>> {
        self.chunks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_chunk_model;
    use crate::test_support::{ramp_heights, small_config, white_material};
    use std::sync::Barrier;

    fn populated(config: &TerrainConfig) -> ChunkRegistry {
        let registry = ChunkRegistry::new(config);
        let field = ramp_heights(config);
        let material = white_material();
        for x in 0..config.world_chunks_x {
            for z in 0..config.world_chunks_z {
                let key = ChunkKey::new(x, z);
                let model = build_chunk_model(&field, config, key, &material).unwrap();
                registry.get_or_create(key).set_model(model);
            }
        }
        registry
    }

    #[test]
    fn concurrent_get_or_create_returns_one_instance() {
        let registry = ChunkRegistry::new(&small_config());
        let barrier = Barrier::new(8);

        let chunks: Vec<Arc<Chunk>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.get_or_create(ChunkKey::new(3, 4))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(registry.len(), 1);
        assert!(chunks.iter().all(|c| Arc::ptr_eq(c, &chunks[0])));
    }

    #[test]
    fn keys_with_colliding_combined_hash_stay_distinct() {
        // 0 * 31 + 31 == 1 * 31 + 0
        let registry = ChunkRegistry::new(&small_config());
        let a = registry.get_or_create(ChunkKey::new(0, 31));
        let b = registry.get_or_create(ChunkKey::new(1, 0));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(ChunkKey::new(1, 0)).unwrap().key(), ChunkKey::new(1, 0));
        assert!(registry.get(ChunkKey::new(31, 0)).is_none());
    }

    #[test]
    fn nearby_from_origin_skips_negative_chunks() {
        let config = small_config();
        let registry = populated(&config);

        for radius in 0..3 {
            let found: Vec<ChunkKey> = registry
                .nearby(0.0, 0.0, radius)
                .iter()
                .map(|c| c.key)
                .collect();

            assert!(found.iter().all(|k| k.x >= 0 && k.z >= 0));
            let mut expected = Vec::new();
            for x in 0..=radius.min(config.world_chunks_x - 1) {
                for z in 0..=radius.min(config.world_chunks_z - 1) {
                    expected.push(ChunkKey::new(x, z));
                }
            }
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn nearby_visits_x_outer_z_inner() {
        let config = small_config();
        let registry = populated(&config);

        // World (5.5, 6.2) is in tile (5, 6), chunk (1, 1).
        let found: Vec<ChunkKey> = registry.nearby(5.5, 6.2, 1).iter().map(|c| c.key).collect();
        let expected: Vec<ChunkKey> = (0..=2)
            .flat_map(|x| (0..=2).map(move |z| ChunkKey::new(x, z)))
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn nearby_skips_chunks_without_model() {
        let config = small_config();
        let registry = populated(&config);
        registry.get(ChunkKey::new(1, 0)).unwrap().dispose();
        registry.get_or_create(ChunkKey::new(9, 9));

        let found: Vec<ChunkKey> = registry.nearby(0.0, 0.0, 1).iter().map(|c| c.key).collect();
        assert_eq!(
            found,
            vec![ChunkKey::new(0, 0), ChunkKey::new(0, 1), ChunkKey::new(1, 1)]
        );
        assert!(registry.nearby(40.0, 40.0, 0).is_empty());
    }

    #[test]
    fn nearby_far_outside_the_world_is_empty() {
        let config = TerrainConfig {
            chunk_size: 1,
            ..small_config()
        };
        let registry = populated(&config);
        assert_eq!(registry.nearby(0.0, 0.0, 1).len(), 4);

        assert!(registry.nearby(1.0e12, 0.0, 1).is_empty());
        assert!(registry.nearby(-1.0e12, -1.0e12, 1).is_empty());
        assert!(registry.nearby(f32::MAX, f32::MAX, i32::MAX).is_empty());
        assert!(registry.nearby(0.0, 0.0, -1).is_empty());
    }

    #[test]
    fn huge_radius_visits_only_world_chunks() {
        let config = small_config();
        let registry = populated(&config);

        let found: Vec<ChunkKey> = registry
            .nearby(1.0e12, 0.0, i32::MAX)
            .iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(found, registry.keys());
    }

    #[test]
    fn dispose_releases_each_chunk_once() {
        let config = small_config();
        let registry = populated(&config);
        let total = (config.world_chunks_x * config.world_chunks_z) as usize;

        assert_eq!(registry.dispose(), total);
        assert_eq!(registry.dispose(), 0);
        assert!(registry.nearby(0.0, 0.0, 5).is_empty());
    }

    #[test]
    fn for_each_visits_every_chunk() {
        let registry = populated(&small_config());
        let mut seen = Vec::new();
        registry.for_each(|chunk| seen.push(chunk.key()));
        seen.sort();
        assert_eq!(seen, registry.keys());
        assert_eq!(seen.len(), 12);
    }
}
