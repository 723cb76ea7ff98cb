use bevy::color::{Color, ColorToComponents};
use glam::{Vec2, Vec3};

use crate::error::TerrainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    /// RGBA8888 packed into the bits of one float.
    ColorPacked,
    TexCoord,
}

impl VertexAttribute {
    pub fn components(self) -> usize {
        match self {
            VertexAttribute::Position => 3,
            VertexAttribute::ColorPacked => 1,
            VertexAttribute::TexCoord => 2,
        }
    }
}

/// Attribute order of an interleaved vertex buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Result<Self, TerrainError> {
        for (i, attr) in attributes.iter().enumerate() {
            if attributes[..i].contains(attr) {
                return Err(TerrainError::InvalidLayout(format!("{attr:?} appears twice")));
            }
        }
        if !attributes.contains(&VertexAttribute::Position) {
            return Err(TerrainError::InvalidLayout("no position attribute".to_string()));
        }
        Ok(Self { attributes })
    }

    /// Position, packed color, texture coordinates.
    pub fn terrain() -> Self {
        Self {
            attributes: vec![
                VertexAttribute::Position,
                VertexAttribute::ColorPacked,
                VertexAttribute::TexCoord,
            ],
        }
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Floats per vertex.
    pub fn stride(&self) -> usize {
        self.attributes.iter().map(|a| a.components()).sum()
    }

    /// Float offset of `attribute` inside one vertex.
    pub fn offset_of(&self, attribute: VertexAttribute) -> Option<usize> {
        let mut offset = 0;
        for attr in &self.attributes {
            if *attr == attribute {
                return Some(offset);
            }
            offset += attr.components();
        }
        None
    }

    pub fn position_offset(&self) -> usize {
        // `new` rejects layouts without a position.
        self.offset_of(VertexAttribute::Position).unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexBuffer {
    layout: VertexLayout,
    data: Vec<f32>,
}

impl VertexBuffer {
    pub fn with_capacity(layout: VertexLayout, vertices: usize) -> Self {
        let data = Vec::with_capacity(layout.stride() * vertices);
        Self { layout, data }
    }

    pub fn from_raw(layout: VertexLayout, data: Vec<f32>) -> Result<Self, TerrainError> {
        if data.len() % layout.stride() != 0 {
            return Err(TerrainError::InvalidLayout(format!(
                "{} floats is not a whole number of {}-float vertices",
                data.len(),
                layout.stride()
            )));
        }
        Ok(Self { layout, data })
    }

    /// Appends one vertex, writing each attribute the layout declares in layout order.
    pub fn push_vertex(&mut self, position: Vec3, color: f32, uv: Vec2) {
        for attr in &self.layout.attributes {
            match attr {
                VertexAttribute::Position => {
                    self.data.extend_from_slice(&[position.x, position.y, position.z])
                }
                VertexAttribute::ColorPacked => self.data.push(color),
                VertexAttribute::TexCoord => self.data.extend_from_slice(&[uv.x, uv.y]),
            }
        }
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.layout.stride()
    }

    pub fn attribute(&self, vertex: usize, attribute: VertexAttribute) -> Option<&[f32]> {
        let start = vertex * self.layout.stride() + self.layout.offset_of(attribute)?;
        self.data.get(start..start + attribute.components())
    }

    pub fn position(&self, vertex: usize) -> Option<Vec3> {
        self.attribute(vertex, VertexAttribute::Position)
            .map(Vec3::from_slice)
    }
}

/// Packs a color as ABGR8888 float bits.
///
/// The lowest alpha bit is dropped so the pattern can never be a NaN, which
/// would not survive a float copy bit-exact.
pub fn pack_color(color: Color) -> f32 {
    let [r, g, b, a] = color.to_srgba().to_f32_array();
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u32;
    let bits = (channel(a) << 24) | (channel(b) << 16) | (channel(g) << 8) | channel(r);
    f32::from_bits(bits & 0xfeff_ffff)
}

pub fn unpack_color(packed: f32) -> Color {
    let bits = packed.to_bits();
    let channel = |shift: u32| ((bits >> shift) & 0xff) as f32 / 255.0;
    Color::srgba(channel(0), channel(8), channel(16), channel(24))
}
