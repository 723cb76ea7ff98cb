//! Point edits on already-built chunk models.
//!
//! Every edit reads a snapshot of the whole interleaved buffer, patches it and
//! returns a new model. Offsets inside the buffer are only ever computed by
//! [`tile_vertex_offset`] and [`corner_position_offset`].

use bevy::color::Color;
use glam::Vec3;
use std::sync::Arc;

use crate::error::TerrainError;
use crate::mesh::{ChunkModel, QUAD_VERTICES};
use crate::types::TileCorner;
use crate::vertex::{VertexBuffer, VertexLayout};

/// Float offset of the first vertex of tile `(local_x, local_z)`.
pub fn tile_vertex_offset(layout: &VertexLayout, chunk_size: u32, local_x: u32, local_z: u32) -> usize {
    let tile = local_x as usize * chunk_size as usize + local_z as usize;
    layout.stride() * QUAD_VERTICES * tile
}

/// Float offset of the X component of `corner`'s position; Y and Z follow it.
pub fn corner_position_offset(
    layout: &VertexLayout,
    chunk_size: u32,
    local_x: u32,
    local_z: u32,
    corner: TileCorner,
) -> usize {
    tile_vertex_offset(layout, chunk_size, local_x, local_z)
        + corner.slot() * layout.stride()
        + layout.position_offset()
}

pub fn resize_tile_corner(
    model: &ChunkModel,
    local_x: u32,
    local_z: u32,
    corner: TileCorner,
    delta: Vec3,
) -> Result<ChunkModel, TerrainError> {
    resize_tile(model, local_x, local_z, &[(corner, delta)])
}

/// Moves any subset of a tile's corners in one pass over the buffer.
pub fn resize_tile(
    model: &ChunkModel,
    local_x: u32,
    local_z: u32,
    deltas: &[(TileCorner, Vec3)],
) -> Result<ChunkModel, TerrainError> {
    model.tile_index(local_x, local_z)?;

    let layout = model.vertices().layout();
    let mut data = model.vertices().as_slice().to_vec();
    for &(corner, delta) in deltas {
        let offset = corner_position_offset(layout, model.chunk_size(), local_x, local_z, corner);
        let len = data.len();
        let Some(position) = data.get_mut(offset..offset + 3) else {
            return Err(TerrainError::BufferTooSmall {
                len,
                offset: offset + 2,
            });
        };
        position[0] += delta.x;
        position[1] += delta.y;
        position[2] += delta.z;
    }

    let vertices = VertexBuffer::from_raw(layout.clone(), data)?;
    Ok(model.with_vertices(vertices))
}

/// Binds a new material instance with `tint` to one tile's part.
///
/// Parts of other tiles keep whatever material they had, shared or not.
pub fn recolor_tile(
    model: &ChunkModel,
    local_x: u32,
    local_z: u32,
    tint: Color,
) -> Result<ChunkModel, TerrainError> {
    let index = model.tile_index(local_x, local_z)?;
    let mut parts = model.parts().to_vec();
    let part = &mut parts[index];
    part.material = Arc::new(part.material.tinted(tint));
    Ok(model.with_parts(parts))
}
