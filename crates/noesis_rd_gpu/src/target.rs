//! Offscreen render targets
//!
//! A target renders into a multisampled color texture when its sample count
//! is above one, and straight into its single-sample texture otherwise. The
//! single-sample texture is what batches sample after a resolve.

use std::sync::Arc;

use noesis_rd_core::{RenderError, Result, TextureId};

use crate::context::{GpuContext, DEPTH_STENCIL_FORMAT, TARGET_FORMAT};
use crate::pipeline::OutputFormat;

const VALID_SAMPLE_COUNTS: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Reject sample counts the engine may not request or the adapter lacks
pub fn check_sample_count(context: &GpuContext, sample_count: u32) -> Result<()> {
    if !VALID_SAMPLE_COUNTS.contains(&sample_count) {
        return Err(RenderError::InvalidSampleCount(sample_count));
    }
    if !context.supports_sample_count(sample_count) {
        return Err(RenderError::UnsupportedSampleCount(sample_count));
    }
    Ok(())
}

pub struct ManagedRenderTarget {
    label: String,
    width: u32,
    height: u32,
    sample_count: u32,
    /// Shared between a target and its clones
    msaa: Option<Arc<wgpu::Texture>>,
    msaa_view: Option<wgpu::TextureView>,
    depth: Arc<wgpu::Texture>,
    depth_view: wgpu::TextureView,
    resolve: Arc<wgpu::Texture>,
    resolve_view: wgpu::TextureView,
    texture: TextureId,
}

fn attachment(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    sample_count: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn create_depth(device: &wgpu::Device, label: &str, width: u32, height: u32, samples: u32) -> wgpu::Texture {
    attachment(
        device,
        &format!("{} depth/stencil", label),
        width,
        height,
        samples,
        DEPTH_STENCIL_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT,
    )
}

/// Single-sample color texture batches read the target through
pub fn create_resolve_texture(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::Texture {
    attachment(
        device,
        label,
        width,
        height,
        1,
        TARGET_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
    )
}

impl ManagedRenderTarget {
    /// Create the attachments of a new target
    ///
    /// `resolve` is the single-sample texture, already registered as `texture`.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
        resolve: Arc<wgpu::Texture>,
        texture: TextureId,
    ) -> Self {
        let msaa = (sample_count > 1).then(|| {
            Arc::new(attachment(
                device,
                &format!("{} color", label),
                width,
                height,
                sample_count,
                TARGET_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ))
        });
        let depth = Arc::new(create_depth(device, label, width, height, sample_count));

        Self::assemble(label, width, height, sample_count, msaa, depth, resolve, texture)
    }

    /// A target sharing this one's multisampled color with its own depth/stencil
    pub fn clone_with(
        &self,
        device: &wgpu::Device,
        label: &str,
        resolve: Arc<wgpu::Texture>,
        texture: TextureId,
    ) -> Self {
        let depth = Arc::new(create_depth(
            device,
            label,
            self.width,
            self.height,
            self.sample_count,
        ));

        Self::assemble(
            label,
            self.width,
            self.height,
            self.sample_count,
            self.msaa.clone(),
            depth,
            resolve,
            texture,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
        msaa: Option<Arc<wgpu::Texture>>,
        depth: Arc<wgpu::Texture>,
        resolve: Arc<wgpu::Texture>,
        texture: TextureId,
    ) -> Self {
        let view = |texture: &wgpu::Texture| texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            label: label.to_string(),
            width,
            height,
            sample_count,
            msaa_view: msaa.as_deref().map(view),
            msaa,
            depth_view: view(depth.as_ref()),
            depth,
            resolve_view: view(resolve.as_ref()),
            resolve,
            texture,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Managed texture holding the resolved color
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn msaa(&self) -> Option<&Arc<wgpu::Texture>> {
        self.msaa.as_ref()
    }

    pub fn msaa_view(&self) -> Option<&wgpu::TextureView> {
        self.msaa_view.as_ref()
    }

    pub fn depth(&self) -> &Arc<wgpu::Texture> {
        &self.depth
    }

    pub fn resolve(&self) -> &Arc<wgpu::Texture> {
        &self.resolve
    }

    pub fn resolve_view(&self) -> &wgpu::TextureView {
        &self.resolve_view
    }

    /// View draws render into
    pub fn color_view(&self) -> &wgpu::TextureView {
        self.msaa_view.as_ref().unwrap_or(&self.resolve_view)
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat {
            color: TARGET_FORMAT,
            depth_stencil: Some(DEPTH_STENCIL_FORMAT),
            sample_count: self.sample_count,
        }
    }
}
