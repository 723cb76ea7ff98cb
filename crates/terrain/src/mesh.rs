use bevy::color::Color;
use glam::{IVec2, Vec2, Vec3};
use std::sync::Arc;

use crate::editor::corner_position_offset;
use crate::error::TerrainError;
use crate::heightmap::HeightField;
use crate::material::TerrainMaterial;
use crate::types::{ChunkKey, TerrainConfig, TileCorner};
use crate::vertex::{VertexBuffer, VertexLayout, pack_color};

/// A tile quad has 4 vertices, one at each corner.
pub const QUAD_VERTICES: usize = 4;
pub const QUAD_INDICES: usize = 6;

/// Texture rectangle mapped onto every tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    /// UVs in corner slot order.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.min.x, self.max.y),
            Vec2::new(self.max.x, self.max.y),
            Vec2::new(self.max.x, self.min.y),
            Vec2::new(self.min.x, self.min.y),
        ]
    }
}

/// A range of the chunk index buffer with its own material binding.
#[derive(Clone, Debug)]
pub struct MeshPart {
    pub id: String,
    pub index_offset: usize,
    pub index_count: usize,
    pub material: Arc<TerrainMaterial>,
}

/// Geometry of one chunk: one interleaved vertex buffer, one index buffer and
/// one part per tile, in tile order.
#[derive(Clone, Debug)]
pub struct ChunkModel {
    key: ChunkKey,
    origin: Vec3,
    chunk_size: u32,
    vertices: VertexBuffer,
    indices: Vec<u32>,
    parts: Vec<MeshPart>,
}

impl ChunkModel {
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// World position of the chunk's local origin; vertex positions are relative to it.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    /// Position of the tile block among all tiles (x-major).
    pub fn tile_index(&self, local_x: u32, local_z: u32) -> Result<usize, TerrainError> {
        let n = self.chunk_size;
        if local_x >= n || local_z >= n {
            return Err(TerrainError::LocalTileOutOfBounds {
                local_x,
                local_z,
                chunk_size: n,
            });
        }
        Ok(local_x as usize * n as usize + local_z as usize)
    }

    pub fn part(&self, local_x: u32, local_z: u32) -> Result<&MeshPart, TerrainError> {
        let index = self.tile_index(local_x, local_z)?;
        Ok(&self.parts[index])
    }

    pub fn corner_position(
        &self,
        local_x: u32,
        local_z: u32,
        corner: TileCorner,
    ) -> Result<Vec3, TerrainError> {
        self.tile_index(local_x, local_z)?;
        let offset = corner_position_offset(
            self.vertices.layout(),
            self.chunk_size,
            local_x,
            local_z,
            corner,
        );
        self.vertices
            .as_slice()
            .get(offset..offset + 3)
            .map(Vec3::from_slice)
            .ok_or(TerrainError::BufferTooSmall {
                len: self.vertices.as_slice().len(),
                offset: offset + 2,
            })
    }

    pub(crate) fn with_vertices(&self, vertices: VertexBuffer) -> Self {
        Self {
            key: self.key,
            origin: self.origin,
            chunk_size: self.chunk_size,
            vertices,
            indices: self.indices.clone(),
            parts: self.parts.clone(),
        }
    }

    pub(crate) fn with_parts(&self, parts: Vec<MeshPart>) -> Self {
        Self {
            key: self.key,
            origin: self.origin,
            chunk_size: self.chunk_size,
            vertices: self.vertices.clone(),
            indices: self.indices.clone(),
            parts,
        }
    }
}

pub fn build_chunk_model(
    heights: &HeightField,
    config: &TerrainConfig,
    key: ChunkKey,
    material: &Arc<TerrainMaterial>,
) -> Result<ChunkModel, TerrainError> {
    build_chunk_model_with_layout(heights, config, key, material, VertexLayout::terrain())
}

pub fn build_chunk_model_with_layout(
    heights: &HeightField,
    config: &TerrainConfig,
    key: ChunkKey,
    material: &Arc<TerrainMaterial>,
    layout: VertexLayout,
) -> Result<ChunkModel, TerrainError> {
    if !config.contains_chunk(key) {
        let extent = config.world_extent_tiles();
        return Err(TerrainError::OutOfBounds {
            x: key.x.saturating_mul(config.chunk_size),
            z: key.z.saturating_mul(config.chunk_size),
            extent_x: extent.x,
            extent_z: extent.y,
        });
    }
    let origin_tile = key.origin_tile(config.chunk_size);

    let n = config.chunk_size.max(1) as usize;
    let tile_size = config.tile_size;
    let color = pack_color(Color::WHITE);
    let uvs = UvRect::FULL.corners();

    let tile_count = n * n;
    let mut vertices = VertexBuffer::with_capacity(layout, tile_count * QUAD_VERTICES);
    let mut indices: Vec<u32> = Vec::with_capacity(tile_count * QUAD_INDICES);
    let mut parts: Vec<MeshPart> = Vec::with_capacity(tile_count);

    // Tile order must match `editor::tile_vertex_offset`: x outer, z inner.
    for x in 0..n {
        for z in 0..n {
            let local = IVec2::new(x as i32, z as i32);
            let tile = origin_tile + local;

            let base = vertices.vertex_count() as u32;
            for corner in TileCorner::ALL {
                let step = corner_step(corner);
                let grid = local + step;
                let height = heights.height(tile.x + step.x, tile.y + step.y);
                let position = Vec3::new(grid.x as f32 * tile_size, height, grid.y as f32 * tile_size);
                vertices.push_vertex(position, color, uvs[corner.slot()]);
            }

            let index_offset = indices.len();
            indices.extend_from_slice(&quad_indices(base));
            parts.push(MeshPart {
                id: format!("{key}/{x}/{z}"),
                index_offset,
                index_count: QUAD_INDICES,
                material: Arc::clone(material),
            });
        }
    }

    Ok(ChunkModel {
        key,
        origin: Vec3::new(
            origin_tile.x as f32 * tile_size,
            0.0,
            origin_tile.y as f32 * tile_size,
        ),
        chunk_size: n as u32,
        vertices,
        indices,
        parts,
    })
}

/// Two triangles over a quad emitted at vertex `base`, counter-clockwise seen from +Y.
pub fn quad_indices(base: u32) -> [u32; QUAD_INDICES] {
    [base + 2, base + 1, base + 3, base, base + 3, base + 1]
}

fn corner_step(corner: TileCorner) -> IVec2 {
    match corner {
        TileCorner::SouthWest => IVec2::new(0, 0),
        TileCorner::SouthEast => IVec2::new(1, 0),
        TileCorner::NorthEast => IVec2::new(1, 1),
        TileCorner::NorthWest => IVec2::new(0, 1),
    }
}
