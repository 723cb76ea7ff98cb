use thiserror::Error;

use crate::types::ChunkKey;

/// Horizontal world axis, used to report which side of the world is misconfigured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Z => f.write_str("Z"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("invalid terrain config: {0}")]
    InvalidConfig(String),

    #[error(
        "world {axis} length of {supplied} chunks is larger than the heightmap supports \
         ({raster_len} px): max world {axis} length supported is {max_supported} chunks"
    )]
    WorldExceedsHeightmap {
        axis: Axis,
        supplied: i32,
        raster_len: u32,
        max_supported: u32,
    },

    #[error("tile ({x}, {z}) is outside the world ({extent_x} x {extent_z} tiles)")]
    OutOfBounds {
        x: i32,
        z: i32,
        extent_x: i32,
        extent_z: i32,
    },

    #[error("local tile ({local_x}, {local_z}) is outside a chunk of {chunk_size} tiles")]
    LocalTileOutOfBounds {
        local_x: u32,
        local_z: u32,
        chunk_size: u32,
    },

    #[error("chunk {0} does not exist")]
    ChunkNotFound(ChunkKey),

    #[error("chunk {0} has no mesh")]
    MissingModel(ChunkKey),

    #[error("invalid vertex layout: {0}")]
    InvalidLayout(String),

    #[error("vertex buffer holds {len} floats but offset {offset} was requested")]
    BufferTooSmall { len: usize, offset: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode heightmap: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to parse terrain config ron: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),
}
