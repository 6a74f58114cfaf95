//! Packed render and sampler states
//!
//! Both states travel as a single byte. Equality and hashing use the raw byte,
//! so two states with identical bits are the same cache key.

use std::fmt;

use crate::error::{RenderError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Render state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Src,
    SrcOver,
    SrcOverDual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilMode {
    Disabled,
    EqualKeep,
    EqualIncr,
    EqualDecr,
}

/// Render state byte
///
/// | Bits | Field          |
/// |------|----------------|
/// | 0    | scissor enable |
/// | 1    | color enable   |
/// | 2-3  | blend mode     |
/// | 4-5  | stencil mode   |
/// | 6    | wireframe      |
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderState(u8);

impl RenderState {
    const SCISSOR: u8 = 1 << 0;
    const COLOR: u8 = 1 << 1;
    const WIREFRAME: u8 = 1 << 6;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Assemble a state from its fields
    pub fn new(
        scissor: bool,
        color: bool,
        blend: BlendMode,
        stencil: StencilMode,
        wireframe: bool,
    ) -> Self {
        let mut bits = ((blend as u8) << 2) | ((stencil as u8) << 4);
        if scissor {
            bits |= Self::SCISSOR;
        }
        if color {
            bits |= Self::COLOR;
        }
        if wireframe {
            bits |= Self::WIREFRAME;
        }
        Self(bits)
    }

    pub const fn scissor_enable(self) -> bool {
        self.0 & Self::SCISSOR != 0
    }

    pub const fn color_enable(self) -> bool {
        self.0 & Self::COLOR != 0
    }

    pub const fn wireframe(self) -> bool {
        self.0 & Self::WIREFRAME != 0
    }

    pub fn blend_mode(self) -> Result<BlendMode> {
        match (self.0 >> 2) & 3 {
            0 => Ok(BlendMode::Src),
            1 => Ok(BlendMode::SrcOver),
            2 => Ok(BlendMode::SrcOverDual),
            other => Err(RenderError::InvalidBlendMode(other)),
        }
    }

    pub fn stencil_mode(self) -> StencilMode {
        match (self.0 >> 4) & 3 {
            0 => StencilMode::Disabled,
            1 => StencilMode::EqualKeep,
            2 => StencilMode::EqualIncr,
            _ => StencilMode::EqualDecr,
        }
    }
}

impl fmt::Debug for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderState")
            .field("scissor", &self.scissor_enable())
            .field("color", &self.color_enable())
            .field("blend", &self.blend_mode().ok())
            .field("stencil", &self.stencil_mode())
            .field("wireframe", &self.wireframe())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sampler state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Clamp between 0.0 and 1.0
    ClampToEdge,
    /// Out of range coordinates return transparent zero
    ClampToZero,
    Repeat,
    /// Repeat, flipping horizontally
    MirrorU,
    /// Repeat, flipping vertically
    MirrorV,
    /// MirrorU and MirrorV combined
    Mirror,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MinMagFilter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MipFilter {
    /// Sample level 0 only
    Disabled,
    Nearest,
    Linear,
}

/// Sampler state byte
///
/// | Bits | Field          |
/// |------|----------------|
/// | 0-2  | wrap mode      |
/// | 3    | min/mag filter |
/// | 4-5  | mip filter     |
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState(u8);

/// Decoded sampler fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub wrap: WrapMode,
    pub filter: MinMagFilter,
    pub mip: MipFilter,
}

impl SamplerState {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn new(wrap: WrapMode, filter: MinMagFilter, mip: MipFilter) -> Self {
        Self((wrap as u8) | ((filter as u8) << 3) | ((mip as u8) << 4))
    }

    pub fn wrap_mode(self) -> Result<WrapMode> {
        match self.0 & 7 {
            0 => Ok(WrapMode::ClampToEdge),
            1 => Ok(WrapMode::ClampToZero),
            2 => Ok(WrapMode::Repeat),
            3 => Ok(WrapMode::MirrorU),
            4 => Ok(WrapMode::MirrorV),
            5 => Ok(WrapMode::Mirror),
            other => Err(RenderError::InvalidWrapMode(other)),
        }
    }

    pub fn min_mag_filter(self) -> MinMagFilter {
        match (self.0 >> 3) & 1 {
            0 => MinMagFilter::Nearest,
            _ => MinMagFilter::Linear,
        }
    }

    pub fn mip_filter(self) -> Result<MipFilter> {
        match (self.0 >> 4) & 3 {
            0 => Ok(MipFilter::Disabled),
            1 => Ok(MipFilter::Nearest),
            2 => Ok(MipFilter::Linear),
            other => Err(RenderError::InvalidMipFilter(other)),
        }
    }

    /// Decode every field, failing on the first unrecognised one
    pub fn decode(self) -> Result<SamplerDesc> {
        Ok(SamplerDesc {
            wrap: self.wrap_mode()?,
            filter: self.min_mag_filter(),
            mip: self.mip_filter()?,
        })
    }
}

impl fmt::Debug for SamplerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(desc) => write!(f, "SamplerState({:?}_{:?}_{:?})", desc.wrap, desc.filter, desc.mip),
            Err(_) => write!(f, "SamplerState(invalid {:#04x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_state_fields() {
        let state = RenderState::new(
            true,
            true,
            BlendMode::SrcOver,
            StencilMode::EqualIncr,
            false,
        );
        assert_eq!(state.bits(), 0b0010_0111);
        assert!(state.scissor_enable());
        assert!(state.color_enable());
        assert!(!state.wireframe());
        assert_eq!(state.blend_mode().unwrap(), BlendMode::SrcOver);
        assert_eq!(state.stencil_mode(), StencilMode::EqualIncr);
    }

    #[test]
    fn every_stencil_and_filter_value_decodes() {
        let modes: Vec<_> = (0..4u8)
            .map(|bits| RenderState::from_bits(bits << 4).stencil_mode())
            .collect();
        assert_eq!(
            modes,
            [
                StencilMode::Disabled,
                StencilMode::EqualKeep,
                StencilMode::EqualIncr,
                StencilMode::EqualDecr
            ]
        );
        assert_eq!(SamplerState::from_bits(0).min_mag_filter(), MinMagFilter::Nearest);
        assert_eq!(SamplerState::from_bits(1 << 3).min_mag_filter(), MinMagFilter::Linear);
    }

    #[test]
    fn blend_mode_three_is_invalid() {
        let state = RenderState::from_bits(3 << 2);
        assert!(matches!(
            state.blend_mode(),
            Err(RenderError::InvalidBlendMode(3))
        ));
    }

    #[test]
    fn sampler_roundtrips_fields() {
        let sampler = SamplerState::new(WrapMode::MirrorV, MinMagFilter::Linear, MipFilter::Nearest);
        let desc = sampler.decode().unwrap();
        assert_eq!(desc.wrap, WrapMode::MirrorV);
        assert_eq!(desc.filter, MinMagFilter::Linear);
        assert_eq!(desc.mip, MipFilter::Nearest);
        assert_eq!(SamplerState::from_bits(sampler.bits()), sampler);
    }

    #[test]
    fn unrecognised_sampler_fields_fail() {
        assert!(matches!(
            SamplerState::from_bits(6).decode(),
            Err(RenderError::InvalidWrapMode(6))
        ));
        assert!(matches!(
            SamplerState::from_bits(7).decode(),
            Err(RenderError::InvalidWrapMode(7))
        ));
        assert!(matches!(
            SamplerState::from_bits(3 << 4).decode(),
            Err(RenderError::InvalidMipFilter(3))
        ));
    }
}
