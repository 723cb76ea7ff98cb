use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TerrainError;

// --- Config ---

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Tiles per chunk edge.
    pub chunk_size: i32,
    pub world_chunks_x: i32,
    pub world_chunks_z: i32,
    /// World units per tile edge.
    pub tile_size: f32,
    /// Height of a full-intensity heightmap sample.
    pub max_height: f32,
    pub view_radius_chunks: i32,
    pub debug_lines: bool,
    /// Path of the heightmap raster.
    pub heightmap: String,
    /// Path relative to the Bevy asset root (the `assets/` folder).
    pub texture: Option<String>,
    pub tint_srgb: (f32, f32, f32),
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            world_chunks_x: 4,
            world_chunks_z: 4,
            tile_size: 1.0,
            max_height: 10.0,
            view_radius_chunks: 3,
            debug_lines: false,
            heightmap: "assets/heightmap.png".to_string(),
            texture: None,
            tint_srgb: (1.0, 1.0, 1.0),
        }
    }
}

impl TerrainConfig {
    pub fn load_from_ron_file(path: impl AsRef<Path>) -> Result<Self, TerrainError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TerrainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, TerrainError> {
        let config: TerrainConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TerrainError> {
        if self.chunk_size < 1 {
            return Err(TerrainError::InvalidConfig(format!(
                "chunk_size must be at least 1, got {}",
                self.chunk_size
            )));
        }
        if self.world_chunks_x < 1 || self.world_chunks_z < 1 {
            return Err(TerrainError::InvalidConfig(format!(
                "world must be at least 1x1 chunks, got {}x{}",
                self.world_chunks_x, self.world_chunks_z
            )));
        }
        for (axis, chunks) in [("X", self.world_chunks_x), ("Z", self.world_chunks_z)] {
            if chunks.checked_mul(self.chunk_size).is_none() {
                return Err(TerrainError::InvalidConfig(format!(
                    "world {axis} length of {chunks} chunks of {} tiles does not fit in i32",
                    self.chunk_size
                )));
            }
        }
        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            return Err(TerrainError::InvalidConfig(format!(
                "tile_size must be finite and positive, got {}",
                self.tile_size
            )));
        }
        if !self.max_height.is_finite() || self.max_height < 0.0 {
            return Err(TerrainError::InvalidConfig(format!(
                "max_height must be finite and non-negative, got {}",
                self.max_height
            )));
        }
        if self.view_radius_chunks < 0 {
            return Err(TerrainError::InvalidConfig(format!(
                "view_radius_chunks must not be negative, got {}",
                self.view_radius_chunks
            )));
        }
        Ok(())
    }

    /// World size in tiles on X (x) and Z (y).
    pub fn world_extent_tiles(&self) -> IVec2 {
        IVec2::new(
            self.world_chunks_x * self.chunk_size,
            self.world_chunks_z * self.chunk_size,
        )
    }

    pub fn chunk_world_size(&self) -> f32 {
        self.chunk_size as f32 * self.tile_size
    }

    pub fn contains_chunk(&self, key: ChunkKey) -> bool {
        (0..self.world_chunks_x).contains(&key.x) && (0..self.world_chunks_z).contains(&key.z)
    }

    /// Integer tile coordinate under a world position (XZ plane).
    pub fn world_to_tile(&self, world_x: f32, world_z: f32) -> IVec2 {
        IVec2::new(
            (world_x / self.tile_size).floor() as i32,
            (world_z / self.tile_size).floor() as i32,
        )
    }
}

// --- Chunks ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub x: i32,
    pub z: i32,
}

impl ChunkKey {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn from_tile(tile: IVec2, chunk_size: i32) -> Self {
        Self::new(tile.x.div_euclid(chunk_size), tile.y.div_euclid(chunk_size))
    }

    pub fn from_world_position(config: &TerrainConfig, world_x: f32, world_z: f32) -> Self {
        Self::from_tile(config.world_to_tile(world_x, world_z), config.chunk_size)
    }

    /// World tile coordinate of this chunk's first tile.
    pub fn origin_tile(self, chunk_size: i32) -> IVec2 {
        IVec2::new(self.x * chunk_size, self.z * chunk_size)
    }
}

impl From<IVec2> for ChunkKey {
    fn from(v: IVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<ChunkKey> for IVec2 {
    fn from(key: ChunkKey) -> Self {
        IVec2::new(key.x, key.z)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.x, self.z)
    }
}

// --- Tiles ---

/// A tile inside the world, as its chunk plus the local offset in that chunk.
///
/// Only constructed through checked constructors, so a `TileAddress` always
/// lies inside the world it was created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileAddress {
    chunk: ChunkKey,
    local_x: u32,
    local_z: u32,
}

impl TileAddress {
    pub fn from_world_tile(
        config: &TerrainConfig,
        tile_x: i32,
        tile_z: i32,
    ) -> Result<Self, TerrainError> {
        let extent = config.world_extent_tiles();
        if !(0..extent.x).contains(&tile_x) || !(0..extent.y).contains(&tile_z) {
            return Err(TerrainError::OutOfBounds {
                x: tile_x,
                z: tile_z,
                extent_x: extent.x,
                extent_z: extent.y,
            });
        }

        let n = config.chunk_size;
        Ok(Self {
            chunk: ChunkKey::new(tile_x.div_euclid(n), tile_z.div_euclid(n)),
            local_x: tile_x.rem_euclid(n) as u32,
            local_z: tile_z.rem_euclid(n) as u32,
        })
    }

    pub fn new(
        config: &TerrainConfig,
        chunk: ChunkKey,
        local_x: u32,
        local_z: u32,
    ) -> Result<Self, TerrainError> {
        if !config.contains_chunk(chunk) {
            let extent = config.world_extent_tiles();
            return Err(TerrainError::OutOfBounds {
                x: chunk.x.saturating_mul(config.chunk_size),
                z: chunk.z.saturating_mul(config.chunk_size),
                extent_x: extent.x,
                extent_z: extent.y,
            });
        }
        let n = config.chunk_size as u32;
        if local_x >= n || local_z >= n {
            return Err(TerrainError::LocalTileOutOfBounds {
                local_x,
                local_z,
                chunk_size: n,
            });
        }
        let tile = chunk.origin_tile(config.chunk_size)
            + IVec2::new(local_x as i32, local_z as i32);
        Self::from_world_tile(config, tile.x, tile.y)
    }

    pub fn chunk(&self) -> ChunkKey {
        self.chunk
    }

    pub fn local_x(&self) -> u32 {
        self.local_x
    }

    pub fn local_z(&self) -> u32 {
        self.local_z
    }

    pub fn world_tile(&self, chunk_size: i32) -> IVec2 {
        self.chunk.origin_tile(chunk_size) + IVec2::new(self.local_x as i32, self.local_z as i32)
    }
}

/// The four vertices of a tile quad. +X is east, +Z is north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileCorner {
    SouthWest,
    SouthEast,
    NorthEast,
    NorthWest,
}

impl TileCorner {
    pub const ALL: [TileCorner; 4] = [
        TileCorner::SouthWest,
        TileCorner::SouthEast,
        TileCorner::NorthEast,
        TileCorner::NorthWest,
    ];

    /// Vertex slot of this corner inside a tile's 4-vertex block.
    pub fn slot(self) -> usize {
        match self {
            TileCorner::SouthWest => 0,
            TileCorner::SouthEast => 1,
            TileCorner::NorthEast => 2,
            TileCorner::NorthWest => 3,
        }
    }
}
