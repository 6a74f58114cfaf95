//! Fixed-function variants and cache keys
//!
//! A render state byte selects one of a small set of rasterizer, blend and
//! depth/stencil configurations. Backends build their pipeline objects from
//! these variants, never from the raw byte.

use crate::batch::{Batch, TextureSlot};
use crate::error::Result;
use crate::handle::TextureId;
use crate::shader::Shader;
use crate::state::{BlendMode, RenderState, StencilMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterizerVariant {
    pub wireframe: bool,
    pub scissor: bool,
}

impl RasterizerVariant {
    /// Index in `0..4`, wireframe in bit 0
    pub const fn index(self) -> u8 {
        (self.wireframe as u8) | ((self.scissor as u8) << 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendVariant {
    /// Blending off, source replaces destination
    Src,
    /// Premultiplied alpha over
    SrcOver,
    /// Premultiplied alpha over with per-channel coverage
    SrcOverDual,
    /// No color writes, only stencil is touched
    ColorDisabled,
}

impl BlendVariant {
    pub const fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilVariant {
    Disabled,
    /// Pass where equal to the reference, keep the value
    EqualKeep,
    /// Pass where equal to the reference, increment on pass
    EqualIncr,
    /// Pass where equal to the reference, decrement on pass
    EqualDecr,
    /// Always pass and write zero, used to clear tiles
    ClearZero,
}

impl StencilVariant {
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// The fixed-function configuration a render state selects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateVariants {
    pub rasterizer: RasterizerVariant,
    pub blend: BlendVariant,
    pub stencil: StencilVariant,
}

impl StateVariants {
    pub fn from_render_state(state: RenderState) -> Result<Self> {
        let rasterizer = RasterizerVariant {
            wireframe: state.wireframe(),
            scissor: state.scissor_enable(),
        };

        // Blend mode is validated even when color writes are off
        let blend_mode = state.blend_mode()?;
        let blend = if !state.color_enable() {
            BlendVariant::ColorDisabled
        } else {
            match blend_mode {
                BlendMode::Src => BlendVariant::Src,
                BlendMode::SrcOver => BlendVariant::SrcOver,
                BlendMode::SrcOverDual => BlendVariant::SrcOverDual,
            }
        };

        let stencil = match state.stencil_mode() {
            StencilMode::Disabled => StencilVariant::Disabled,
            StencilMode::EqualKeep => StencilVariant::EqualKeep,
            StencilMode::EqualIncr => StencilVariant::EqualIncr,
            StencilMode::EqualDecr => StencilVariant::EqualDecr,
        };

        Ok(Self {
            rasterizer,
            blend,
            stencil,
        })
    }

    /// Variants of the tile clear pipeline: color replaced, stencil zeroed
    pub const fn tile_clear() -> Self {
        Self {
            rasterizer: RasterizerVariant {
                wireframe: false,
                scissor: true,
            },
            blend: BlendVariant::Src,
            stencil: StencilVariant::ClearZero,
        }
    }

    /// Backend label, e.g. `noesis_Path_Solid_212_0`
    pub fn label(&self, shader: &str, stencil_ref: u8) -> String {
        format!(
            "noesis_{}_{}{}{}_{}",
            shader,
            self.rasterizer.index(),
            self.blend.index(),
            self.stencil.index(),
            stencil_ref
        )
    }
}

/// Pipeline cache key, generic over the backend's output description
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey<O> {
    pub render_state: RenderState,
    pub shader: Shader,
    pub stencil_ref: u8,
    pub output: O,
}

impl<O> PipelineKey<O> {
    pub fn for_batch(batch: &Batch, output: O) -> Self {
        Self {
            render_state: batch.render_state,
            shader: batch.shader,
            stencil_ref: batch.stencil_ref,
            output,
        }
    }
}

/// Resource set cache key: the five texture slots of a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceSetKey {
    pub slots: [TextureSlot; 5],
}

impl ResourceSetKey {
    pub fn for_batch(batch: &Batch) -> Self {
        Self {
            slots: batch.textures,
        }
    }

    /// Whether any slot binds `texture`
    pub fn references(&self, texture: TextureId) -> bool {
        self.slots.iter().any(|slot| slot.texture == Some(texture))
    }
}
