use bevy::color::Color;
use std::sync::Arc;

use crate::heightmap::HeightField;
use crate::material::TerrainMaterial;
use crate::types::TerrainConfig;

pub fn small_config() -> TerrainConfig {
    TerrainConfig {
        chunk_size: 4,
        world_chunks_x: 4,
        world_chunks_z: 3,
        tile_size: 1.0,
        max_height: 51.0,
        view_radius_chunks: 1,
        ..Default::default()
    }
}

/// A raster exactly as large as the world, with a ramp in both axes.
pub fn ramp_heights(config: &TerrainConfig) -> HeightField {
    let extent = config.world_extent_tiles();
    let (w, d) = (extent.x as u32, extent.y as u32);
    let samples = (0..d)
        .flat_map(|z| (0..w).map(move |x| ((x * 5 + z * 11) % 256) as u8))
        .collect();
    HeightField::from_samples(w, d, samples, config).expect("ramp raster fits the world")
}

pub fn white_material() -> Arc<TerrainMaterial> {
    Arc::new(TerrainMaterial::new("texture", Color::WHITE, None))
}
