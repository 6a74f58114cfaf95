//! Noesis render device on wgpu
//!
//! [`GpuRenderDevice`] implements [`noesis_rd_core::RenderDevice`]: it keeps
//! the vertex and index rings, caches pipelines, resource sets and samplers,
//! and renders each batch in its own pass.
//!
//! ```no_run
//! use noesis_rd_core::{DeviceConfig, RenderDevice};
//! use noesis_rd_gpu::{GpuContext, GpuRenderDevice};
//!
//! let context = GpuContext::headless_blocking().unwrap();
//! let mut device = GpuRenderDevice::new(context, DeviceConfig::default()).unwrap();
//! let target = device.create_render_target("scene", 256, 256, 1).unwrap();
//! device.begin_render(true).unwrap();
//! device.set_render_target(target).unwrap();
//! device.end_render().unwrap();
//! ```

pub mod buffer;
pub mod context;
pub mod device;
pub mod pipeline;
pub mod readback;
pub mod sampler;
pub mod shaders;
pub mod target;
pub mod texture;

pub use context::{ContextError, GpuContext, DEPTH_STENCIL_FORMAT, TARGET_FORMAT};
pub use device::{FrameTarget, GpuRenderDevice};
pub use pipeline::OutputFormat;
pub use shaders::{GeneratedShaders, ShaderSource};
