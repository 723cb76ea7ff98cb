use bevy::color::Color;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(u64);

impl MaterialId {
    fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Surface description bound to mesh parts. Every instance has its own id,
/// so parts sharing one `Arc` share one material on the render side.
#[derive(Debug)]
pub struct TerrainMaterial {
    id: MaterialId,
    pub name: String,
    pub tint: Color,
    /// Path relative to the Bevy asset root (the `assets/` folder).
    pub texture: Option<String>,
}

impl TerrainMaterial {
    pub fn new(name: impl Into<String>, tint: Color, texture: Option<String>) -> Self {
        Self {
            id: MaterialId::next(),
            name: name.into(),
            tint,
            texture,
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// A new material instance with the same texture and a different tint.
    pub fn tinted(&self, tint: Color) -> Self {
        Self::new(format!("{}-tinted", self.name), tint, self.texture.clone())
    }
}
