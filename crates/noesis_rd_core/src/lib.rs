//! Noesis render device core
//!
//! Backend-independent half of the render device adapter:
//!
//! - **Shader table**: vertex format, stride and input layout per shader
//! - **States**: packed render and sampler states and the variants they select
//! - **Batches**: the draw record and its binary wire layout
//! - **Ring allocation**: offsets into fixed-size dynamic buffers
//! - **Constant debouncing**: hash-keyed upload skipping
//! - **Contract**: the [`RenderDevice`] trait the UI engine drives
//!
//! # Example
//!
//! ```rust
//! use noesis_rd_core::{Batch, BlendMode, RenderState, Shader, StencilMode, StateVariants};
//!
//! let state = RenderState::new(false, true, BlendMode::SrcOver, StencilMode::Disabled, false);
//! let batch = Batch::new(Shader::PathSolid, state);
//!
//! assert_eq!(batch.shader.format().stride(), 12);
//! let variants = StateVariants::from_render_state(batch.render_state).unwrap();
//! assert_eq!(variants.label(batch.shader.name(), 0), "noesis_Path_Solid_010_0");
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod handle;
pub mod ring;
pub mod shader;
pub mod state;
pub mod stats;
pub mod texture;
pub mod tile;
pub mod trace;
pub mod variant;
pub mod wire;

pub use batch::{Batch, EffectParams, Hashed, TextureSlot, TextureUnit};
pub use cache::StateCache;
pub use config::{DeviceCaps, DeviceConfig};
pub use constants::{ConstantTracker, ConstantUpdates, Upload};
pub use device::{fill_indices, fill_vertices, RenderDevice};
pub use error::{DecodeError, RenderError, Result};
pub use handle::{RenderTargetId, TextureId, WireHandle};
pub use ring::RingAllocator;
pub use shader::{Semantic, Shader, ShaderFamily, VertexFormat, VertexLayout};
pub use state::{
    BlendMode, MinMagFilter, MipFilter, RenderState, SamplerDesc, SamplerState, StencilMode,
    WrapMode,
};
pub use stats::DeviceStats;
pub use texture::{TextureFormat, TextureInfo, TextureRegion};
pub use tile::{ScissorRect, Tile};
pub use trace::TracingDevice;
pub use variant::{
    BlendVariant, PipelineKey, RasterizerVariant, ResourceSetKey, StateVariants, StencilVariant,
};
pub use wire::{decode_batch, encode_batch};
