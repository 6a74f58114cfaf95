//! wgpu device bring-up

use std::sync::Arc;

use noesis_rd_core::RenderError;
use smallvec::SmallVec;
use thiserror::Error;

/// Color format of render targets
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth/stencil format of render targets
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Features used when the adapter has them
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::POLYGON_MODE_LINE
    .union(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
    .union(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

/// Sample counts every wgpu device supports for render attachments
const GUARANTEED_SAMPLE_COUNTS: [u32; 2] = [1, 4];

#[derive(Error, Debug)]
pub enum ContextError {
    /// Failed to request GPU adapter
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,

    /// Failed to request GPU device
    #[error("failed to request GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

impl From<ContextError> for RenderError {
    fn from(err: ContextError) -> Self {
        RenderError::Backend(err.to_string())
    }
}

/// Device and queue a render device draws with
#[derive(Clone, Debug)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    /// Sample counts usable for both target formats
    pub sample_counts: SmallVec<[u32; 6]>,
}

impl GpuContext {
    /// Create a context without a surface
    pub async fn headless() -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ContextError::AdapterNotFound)?;

        let info = adapter.get_info();
        tracing::info!("render device adapter: {} ({:?})", info.name, info.backend);

        let required_features = adapter.features() & OPTIONAL_FEATURES;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("noesis_rd device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        let sample_counts = if required_features
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
        {
            supported_sample_counts(&adapter)
        } else {
            SmallVec::from_slice(&GUARANTEED_SAMPLE_COUNTS)
        };
        tracing::debug!(
            "render device features {:?}, sample counts {:?}",
            required_features,
            sample_counts
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            sample_counts,
        })
    }

    /// Blocking variant of [`GpuContext::headless`]
    pub fn headless_blocking() -> Result<Self, ContextError> {
        pollster::block_on(Self::headless())
    }

    /// Wrap a device created elsewhere, e.g. alongside a window surface
    pub fn from_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            sample_counts: SmallVec::from_slice(&GUARANTEED_SAMPLE_COUNTS),
        }
    }

    pub fn features(&self) -> wgpu::Features {
        self.device.features()
    }

    pub fn supports_sample_count(&self, count: u32) -> bool {
        self.sample_counts.contains(&count)
    }
}

fn supported_sample_counts(adapter: &wgpu::Adapter) -> SmallVec<[u32; 6]> {
    let color = adapter.get_texture_format_features(TARGET_FORMAT).flags;
    let depth = adapter.get_texture_format_features(DEPTH_STENCIL_FORMAT).flags;
    [1, 2, 4, 8, 16, 32]
        .into_iter()
        .filter(|&count| {
            count == 1
                || (color.sample_count_supported(count) && depth.sample_count_supported(count))
        })
        .collect()
}
