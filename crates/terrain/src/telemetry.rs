use std::fmt;

use crate::types::{ChunkKey, TerrainConfig};

/// Chunk and chunk-local tile under a world position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerTelemetry {
    pub chunk: ChunkKey,
    pub tile_x: i32,
    pub tile_z: i32,
}

impl ViewerTelemetry {
    pub fn at(config: &TerrainConfig, world_x: f32, world_z: f32) -> Self {
        let tile = config.world_to_tile(world_x, world_z);
        let n = config.chunk_size;
        Self {
            chunk: ChunkKey::from_tile(tile, n),
            tile_x: tile.x.rem_euclid(n),
            tile_z: tile.y.rem_euclid(n),
        }
    }
}

impl fmt::Display for ViewerTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk: {} Tile: {}, {}", self.chunk, self.tile_x, self.tile_z)
    }
}

/// Remembers the last chunk the viewer stood in.
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewerChunkTracker {
    current: Option<ChunkKey>,
}

impl ViewerChunkTracker {
    /// Records `chunk`; true when it differs from the previous one.
    pub fn update(&mut self, chunk: ChunkKey) -> bool {
        if self.current == Some(chunk) {
            return false;
        }
        self.current = Some(chunk);
        true
    }

    pub fn current(&self) -> Option<ChunkKey> {
        self.current
    }
}
