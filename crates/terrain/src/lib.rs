pub mod chunk;
pub mod editor;
pub mod error;
pub mod heightmap;
pub mod material;
pub mod mesh;
pub mod registry;
pub mod render;
pub mod telemetry;
pub mod types;
pub mod vertex;
pub mod world;

#[cfg(test)]
mod test_support;

pub use error::*;
pub use render::{TerrainChunk, TerrainTelemetry, TerrainViewerWorldXz, TerrainWorldRes};
pub use types::*;
pub use world::*;

use bevy::prelude::*;

/// Draws the chunks around `TerrainViewerWorldXz`. The app inserts the
/// generated world as a `TerrainWorldRes`.
pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<render::TerrainViewerWorldXz>()
            .init_resource::<render::LoadedChunkEntities>()
            .init_resource::<render::TerrainMaterialHandles>()
            .init_resource::<render::TerrainTelemetry>()
            .add_systems(
                Update,
                (
                    render::update_terrain_telemetry,
                    render::sync_nearby_chunks,
                    render::draw_chunk_borders.run_if(render::debug_lines_enabled),
                )
                    .chain(),
            );
    }
}
