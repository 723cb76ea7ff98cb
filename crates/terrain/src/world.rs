use bevy::color::Color;
use bevy::log::{debug, info};
use bevy::tasks::{ComputeTaskPool, TaskPool};
use glam::Vec3;
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::editor;
use crate::error::TerrainError;
use crate::heightmap::HeightField;
use crate::material::TerrainMaterial;
use crate::mesh::{ChunkModel, build_chunk_model};
use crate::registry::ChunkRegistry;
use crate::render::ChunkRenderCache;
use crate::telemetry::ViewerTelemetry;
use crate::types::{ChunkKey, TerrainConfig, TileAddress, TileCorner};

/// The whole terrain: config, chunk registry and the shared base material.
pub struct TerrainWorld {
    config: TerrainConfig,
    registry: ChunkRegistry,
    material: Arc<TerrainMaterial>,
}

impl TerrainWorld {
    pub fn new(config: TerrainConfig, material: Arc<TerrainMaterial>) -> Result<Self, TerrainError> {
        config.validate()?;
        Ok(Self {
            registry: ChunkRegistry::new(&config),
            config,
            material,
        })
    }

    /// A world using the texture and tint named in `config`.
    pub fn from_config(config: TerrainConfig) -> Result<Self, TerrainError> {
        let (r, g, b) = config.tint_srgb;
        let material = TerrainMaterial::new("texture", Color::srgb(r, g, b), config.texture.clone());
        Self::new(config, Arc::new(material))
    }

    /// Loads the configured heightmap, bakes every chunk and drops the raster.
    pub fn from_heightmap_file(config: TerrainConfig) -> Result<Self, TerrainError> {
        let world = Self::from_config(config)?;
        let heights = HeightField::load(&world.config.heightmap, &world.config)?;
        world.generate(&heights)?;
        drop(heights);
        debug!("released heightmap {}", world.config.heightmap);
        Ok(world)
    }

    /// Bakes every chunk of the world from `heights` in parallel and installs
    /// the models. Returns the number of chunks built.
    pub fn generate(&self, heights: &HeightField) -> Result<usize, TerrainError> {
        heights.check_world_fits(&self.config)?;

        let keys: Vec<ChunkKey> = (0..self.config.world_chunks_x)
            .flat_map(|x| (0..self.config.world_chunks_z).map(move |z| ChunkKey::new(x, z)))
            .collect();

        let config = &self.config;
        let material = &self.material;
        let pool = ComputeTaskPool::get_or_init(TaskPool::default);
        let results = pool.scope(|scope| {
            for key in keys {
                scope.spawn(async move { build_chunk_model(heights, config, key, material) });
            }
        });

        let mut built = 0;
        for result in results {
            let model = result?;
            self.registry.get_or_create(model.key()).set_model(model);
            built += 1;
        }

        let extent = self.config.world_extent_tiles();
        info!(
            "generated {built} chunks ({}x{} tiles of {})",
            extent.x, extent.y, self.config.tile_size
        );
        Ok(built)
    }

    /// Bakes one chunk without installing it.
    pub fn build_chunk(&self, heights: &HeightField, key: ChunkKey) -> Result<ChunkModel, TerrainError> {
        build_chunk_model(heights, &self.config, key, &self.material)
    }

    pub fn tile_address(&self, tile_x: i32, tile_z: i32) -> Result<TileAddress, TerrainError> {
        TileAddress::from_world_tile(&self.config, tile_x, tile_z)
    }

    /// Address of the tile under a world position (XZ plane).
    pub fn tile_address_at(&self, world_x: f32, world_z: f32) -> Result<TileAddress, TerrainError> {
        let tile = self.config.world_to_tile(world_x, world_z);
        self.tile_address(tile.x, tile.y)
    }

    pub fn resize_tile_corner(
        &self,
        address: TileAddress,
        corner: TileCorner,
        delta: Vec3,
    ) -> Result<(), TerrainError> {
        self.resize_tile(address, &[(corner, delta)])
    }

    pub fn resize_tile(
        &self,
        address: TileAddress,
        deltas: &[(TileCorner, Vec3)],
    ) -> Result<(), TerrainError> {
        let (address, chunk) = self.chunk_for(address)?;
        chunk.edit(|model| {
            editor::resize_tile(model, address.local_x(), address.local_z(), deltas)
        })?;
        debug!(
            "resized {} corner(s) of tile {}/{} in chunk {}",
            deltas.len(),
            address.local_x(),
            address.local_z(),
            address.chunk()
        );
        Ok(())
    }

    pub fn recolor_tile(&self, address: TileAddress, tint: Color) -> Result<(), TerrainError> {
        let (address, chunk) = self.chunk_for(address)?;
        chunk.edit(|model| {
            editor::recolor_tile(model, address.local_x(), address.local_z(), tint)
        })?;
        debug!(
            "recolored tile {}/{} in chunk {}",
            address.local_x(),
            address.local_z(),
            address.chunk()
        );
        Ok(())
    }

    /// World-space position of one tile corner.
    pub fn corner_position(&self, address: TileAddress, corner: TileCorner) -> Result<Vec3, TerrainError> {
        let (address, chunk) = self.chunk_for(address)?;
        chunk
            .with_model(|model| {
                model
                    .corner_position(address.local_x(), address.local_z(), corner)
                    .map(|local| model.origin() + local)
            })
            .ok_or(TerrainError::MissingModel(address.chunk()))?
    }

    /// Render caches around the viewer, within the configured view radius.
    pub fn nearby(&self, viewer_x: f32, viewer_z: f32) -> Vec<Arc<ChunkRenderCache>> {
        self.nearby_within(viewer_x, viewer_z, self.config.view_radius_chunks)
    }

    pub fn nearby_within(&self, viewer_x: f32, viewer_z: f32, radius: i32) -> Vec<Arc<ChunkRenderCache>> {
        self.registry.nearby(viewer_x, viewer_z, radius)
    }

    pub fn telemetry(&self, viewer_x: f32, viewer_z: f32) -> ViewerTelemetry {
        ViewerTelemetry::at(&self.config, viewer_x, viewer_z)
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    pub fn material(&self) -> &Arc<TerrainMaterial> {
        &self.material
    }

    /// Releases every chunk. Safe to call more than once.
    pub fn dispose(&self) -> usize {
        self.registry.dispose()
    }

    // Re-validates the address against this world before looking up its chunk.
    fn chunk_for(&self, address: TileAddress) -> Result<(TileAddress, Arc<Chunk>), TerrainError> {
        let address = TileAddress::new(
            &self.config,
            address.chunk(),
            address.local_x(),
            address.local_z(),
        )?;
        let chunk = self
            .registry
            .get(address.chunk())
            .ok_or(TerrainError::ChunkNotFound(address.chunk()))?;
        Ok((address, chunk))
    }
}

impl Drop for TerrainWorld {
    fn drop(&mut self) {
        self.registry.dispose();
    }
}
