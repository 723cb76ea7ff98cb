use bevy::log::info;
use image::RgbaImage;
use std::path::Path;

use crate::error::{Axis, TerrainError};
use crate::types::TerrainConfig;

/// Height samples read from a raster image.
///
/// One 8-bit sample per pixel, taken from the most significant byte of the
/// RGBA8888 pixel (the red channel once decoded as RGBA). Dropping the field
/// releases the raster; chunks never need it after they are baked.
#[derive(Clone, Debug)]
pub struct HeightField {
    width: u32,
    depth: u32,
    samples: Vec<u8>,
    max_height: f32,
}

impl HeightField {
    pub fn load(path: impl AsRef<Path>, config: &TerrainConfig) -> Result<Self, TerrainError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TerrainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();
        let field = Self::from_image(&image, config)?;
        info!(
            "loaded heightmap {} ({}x{} px)",
            path.display(),
            field.width,
            field.depth
        );
        Ok(field)
    }

    pub fn from_image(image: &RgbaImage, config: &TerrainConfig) -> Result<Self, TerrainError> {
        let samples = image.pixels().map(|p| p.0[0]).collect();
        Self::from_samples(image.width(), image.height(), samples, config)
    }

    /// Builds a field from row-major samples (`z * width + x`).
    pub fn from_samples(
        width: u32,
        depth: u32,
        samples: Vec<u8>,
        config: &TerrainConfig,
    ) -> Result<Self, TerrainError> {
        if width == 0 || depth == 0 {
            return Err(TerrainError::InvalidConfig(format!(
                "heightmap must not be empty, got {width}x{depth} px"
            )));
        }
        if samples.len() != width as usize * depth as usize {
            return Err(TerrainError::InvalidConfig(format!(
                "heightmap of {width}x{depth} px needs {} samples, got {}",
                width as usize * depth as usize,
                samples.len()
            )));
        }

        let field = Self {
            width,
            depth,
            samples,
            max_height: config.max_height,
        };
        field.check_world_fits(config)?;
        Ok(field)
    }

    /// Fails when the configured world is larger than this raster.
    pub fn check_world_fits(&self, config: &TerrainConfig) -> Result<(), TerrainError> {
        check_axis(Axis::X, config.world_chunks_x, config.chunk_size, self.width)?;
        check_axis(Axis::Z, config.world_chunks_z, config.chunk_size, self.depth)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    /// Height at a grid coordinate, in `[0, max_height]`.
    ///
    /// Every coordinate outside the raster, negative ones included, is clamped
    /// per axis and reads the nearest edge sample. Nothing reads as zero. The
    /// far corners of the last tile row/column land one past the raster when
    /// the world fills it exactly, so they repeat the last row/column.
    pub fn height(&self, x: i32, z: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let z = z.clamp(0, self.depth as i32 - 1) as usize;
        let sample = self.samples[z * self.width as usize + x];
        sample as f32 / 255.0 * self.max_height
    }
}

fn check_axis(axis: Axis, world_chunks: i32, chunk_size: i32, raster_len: u32) -> Result<(), TerrainError> {
    let world_len = world_chunks as i64 * chunk_size as i64;
    if world_len > raster_len as i64 {
        return Err(TerrainError::WorldExceedsHeightmap {
            axis,
            supplied: world_chunks,
            raster_len,
            max_supported: raster_len / chunk_size.max(1) as u32,
        });
    }
    Ok(())
}
