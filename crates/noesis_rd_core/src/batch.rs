//! Draw batch record
//!
//! A [`Batch`] is one draw call worth of state. It owns all of its data, so a
//! device can never keep a reference into producer memory past the call.

use smallvec::SmallVec;

use crate::handle::TextureId;
use crate::shader::Shader;
use crate::state::{RenderState, SamplerState};

/// A constant block paired with the producer-supplied hash of its value
///
/// Devices compare hashes, never values, to decide whether to upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hashed<T> {
    pub value: T,
    pub hash: u32,
}

impl<T> Hashed<T> {
    pub const fn new(value: T, hash: u32) -> Self {
        Self { value, hash }
    }
}

/// Texture reference with the sampler used to read it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureSlot {
    pub texture: Option<TextureId>,
    pub sampler: SamplerState,
}

impl TextureSlot {
    pub const EMPTY: TextureSlot = TextureSlot {
        texture: None,
        sampler: SamplerState::from_bits(0),
    };

    pub const fn new(texture: TextureId, sampler: SamplerState) -> Self {
        Self {
            texture: Some(texture),
            sampler,
        }
    }
}

/// The five texture units a batch can bind, in binding order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureUnit {
    Pattern,
    Ramps,
    Image,
    Glyphs,
    Shadow,
}

impl TextureUnit {
    pub const ALL: [TextureUnit; 5] = [
        TextureUnit::Pattern,
        TextureUnit::Ramps,
        TextureUnit::Image,
        TextureUnit::Glyphs,
        TextureUnit::Shadow,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            TextureUnit::Pattern => "pattern",
            TextureUnit::Ramps => "ramps",
            TextureUnit::Image => "image",
            TextureUnit::Glyphs => "glyphs",
            TextureUnit::Shadow => "shadow",
        }
    }
}

/// Effect parameters, at most one 16-float constant block
pub type EffectParams = SmallVec<[f32; 16]>;

/// One draw call
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub shader: Shader,
    pub render_state: RenderState,
    pub stencil_ref: u8,

    /// Byte offset of the first vertex, relative to the last vertex map
    pub vertex_offset: u32,
    pub num_vertices: u32,
    /// First index, relative to the last index map
    pub start_index: u32,
    pub num_indices: u32,

    /// Texture slots indexed by [`TextureUnit`]
    pub textures: [TextureSlot; 5],

    pub effect_params: Option<Hashed<EffectParams>>,

    pub proj_mtx: Option<Hashed<[f32; 16]>>,
    pub opacity: Option<Hashed<f32>>,
    pub rgba: Option<Hashed<[f32; 4]>>,
    pub radial_grad: Option<Hashed<[f32; 8]>>,
}

impl Batch {
    /// A batch with no textures and no constants
    pub fn new(shader: Shader, render_state: RenderState) -> Self {
        Self {
            shader,
            render_state,
            stencil_ref: 0,
            vertex_offset: 0,
            num_vertices: 0,
            start_index: 0,
            num_indices: 0,
            textures: [TextureSlot::EMPTY; 5],
            effect_params: None,
            proj_mtx: None,
            opacity: None,
            rgba: None,
            radial_grad: None,
        }
    }

    pub fn texture(&self, unit: TextureUnit) -> &TextureSlot {
        &self.textures[unit as usize]
    }

    pub fn set_texture(&mut self, unit: TextureUnit, slot: TextureSlot) {
        self.textures[unit as usize] = slot;
    }

    /// Texture whose dimensions feed the glyph/image constant block
    ///
    /// Glyphs take priority over the image.
    pub fn dimension_source(&self) -> Option<TextureId> {
        self.texture(TextureUnit::Glyphs)
            .texture
            .or(self.texture(TextureUnit::Image).texture)
    }

    /// Effect parameters, when the batch declares any
    pub fn effect(&self) -> Option<&Hashed<EffectParams>> {
        self.effect_params
            .as_ref()
            .filter(|params| !params.value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn glyphs_win_dimension_source() {
        let mut arena: SlotMap<TextureId, ()> = SlotMap::with_key();
        let image = arena.insert(());
        let glyphs = arena.insert(());

        let mut batch = Batch::new(Shader::SdfSolid, RenderState::default());
        assert_eq!(batch.dimension_source(), None);

        batch.set_texture(TextureUnit::Image, TextureSlot::new(image, SamplerState::default()));
        assert_eq!(batch.dimension_source(), Some(image));

        batch.set_texture(TextureUnit::Glyphs, TextureSlot::new(glyphs, SamplerState::default()));
        assert_eq!(batch.dimension_source(), Some(glyphs));
    }

    #[test]
    fn empty_effect_block_is_absent() {
        let mut batch = Batch::new(Shader::Rgba, RenderState::default());
        batch.effect_params = Some(Hashed::new(EffectParams::new(), 7));
        assert!(batch.effect().is_none());

        batch.effect_params = Some(Hashed::new(EffectParams::from_slice(&[1.0, 2.0]), 7));
        assert_eq!(batch.effect().map(|p| p.value.len()), Some(2));
    }
}
