//! Render device error types

use thiserror::Error;

use crate::handle::{RenderTargetId, TextureId};

/// Errors raised while decoding a batch from its binary layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Header shorter than the fixed batch layout
    #[error("batch header is {actual} bytes, expected {expected}")]
    TruncatedHeader { expected: usize, actual: usize },

    /// A constant reference points outside the payload
    #[error("{field} references floats {start}..{end} but payload holds {len}")]
    PayloadOutOfRange {
        field: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },

    /// Effect parameter block larger than the effect constant buffer
    #[error("effect parameter block of {0} floats exceeds 16")]
    EffectParamsTooLarge(u32),
}

/// Render device errors
///
/// Every variant is fatal for the operation that raised it: the device performs
/// no partial backend work before returning.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Shader id outside the shader table
    #[error("invalid shader id: {0}")]
    InvalidShader(u8),

    /// Blend mode bits that name no blend mode
    #[error("invalid blend mode: {0}")]
    InvalidBlendMode(u8),

    /// Wrap mode bits that name no wrap mode
    #[error("invalid wrap mode: {0}")]
    InvalidWrapMode(u8),

    /// Mip filter bits that name no mip filter
    #[error("invalid mip filter: {0}")]
    InvalidMipFilter(u8),

    /// Texture format byte that names no format
    #[error("invalid texture format: {0}")]
    InvalidTextureFormat(u8),

    /// Render target sample count outside 1, 2, 4, 8, 16, 32
    #[error("invalid sample count: {0}")]
    InvalidSampleCount(u32),

    /// Sample count valid in general but rejected by the backend for this format
    #[error("sample count {0} not supported by the backend")]
    UnsupportedSampleCount(u32),

    /// Texture or render target with a zero width or height
    #[error("empty extent {width}x{height}")]
    EmptyExtent { width: u32, height: u32 },

    /// Mipmapped textures are not supported
    #[error("textures with {0} mip levels are not supported")]
    UnsupportedMipLevels(u32),

    /// Update addressed a mip level the texture does not have
    #[error("mip level {level} out of range for texture with {levels} level(s)")]
    InvalidMipLevel { level: u32, levels: u32 },

    /// Texture handle not registered with this device
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    /// Render target handle not registered with this device
    #[error("unknown render target {0:?}")]
    UnknownRenderTarget(RenderTargetId),

    /// Tile or resolve call without an active render target
    #[error("no render target is active")]
    NoActiveRenderTarget,

    /// `begin_tile` called while a tile is already open
    #[error("a tile is already open")]
    TileAlreadyOpen,

    /// `end_tile` called without a matching `begin_tile`
    #[error("no tile is open")]
    NoOpenTile,

    /// Frame-scoped call outside `begin_render` / `end_render`
    #[error("device is not between begin_render and end_render")]
    NotRendering,

    /// Buffer mapped twice without an unmap in between
    #[error("{0} buffer is already mapped")]
    AlreadyMapped(&'static str),

    /// Unmap without a preceding map
    #[error("{0} buffer is not mapped")]
    NotMapped(&'static str),

    /// Draw targeting the swap chain before a frame target was supplied
    #[error("no frame target set and no render target active")]
    NoFrameTarget,

    /// Sub-rectangle update reaching past the texture edge
    #[error("update rect {x},{y} {width}x{height} exceeds texture {texture_width}x{texture_height}")]
    UpdateOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        texture_width: u32,
        texture_height: u32,
    },

    /// Pixel data length does not match the addressed region
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    DataSizeMismatch { expected: usize, actual: usize },

    /// Single ring allocation larger than the whole ring
    #[error("{buffer} allocation of {requested} bytes exceeds capacity {capacity}")]
    AllocationTooLarge {
        buffer: &'static str,
        requested: u32,
        capacity: u32,
    },

    /// Batch wire decoding failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Backend bring-up or capability failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for render device operations
pub type Result<T> = std::result::Result<T, RenderError>;
