//! Managed textures
//!
//! Engine textures are single-level. Each keeps a CPU shadow of its pixels:
//! an update patches the shadow and re-uploads the whole image.

use std::sync::Arc;

use noesis_rd_core::texture::blit_region;
use noesis_rd_core::{RenderError, Result, TextureFormat, TextureInfo, TextureRegion};

/// Backend format for an engine texture format
pub fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
    }
}

pub fn check_extent(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyExtent { width, height });
    }
    Ok(())
}

pub struct ManagedTexture {
    label: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    inverted: bool,
    texture: Arc<wgpu::Texture>,
    view: wgpu::TextureView,
    /// Allocated on first update for textures the engine never uploaded
    shadow: Option<Vec<u8>>,
}

impl ManagedTexture {
    /// Create a sampled texture, optionally filled with tightly packed pixels
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        check_extent(width, height)?;
        let expected = format.region_size(width, height);
        if let Some(data) = data {
            if data.len() != expected {
                return Err(RenderError::DataSizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let mut managed = Self::wrap(label, width, height, format, false, Arc::new(texture));
        if let Some(data) = data {
            managed.shadow = Some(data.to_vec());
            managed.upload(queue);
        }
        Ok(managed)
    }

    /// Register a texture created elsewhere, e.g. a render target's resolve texture
    pub fn wrap(
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        inverted: bool,
        texture: Arc<wgpu::Texture>,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            label: label.to_string(),
            width,
            height,
            format,
            inverted,
            texture,
            view,
            shadow: None,
        }
    }

    /// Replace `region` with `data` and push the whole image
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<()> {
        if level != 0 {
            return Err(RenderError::InvalidMipLevel { level, levels: 1 });
        }
        region.check_bounds(self.width, self.height)?;
        let expected = self.format.region_size(region.width, region.height);
        if data.len() != expected {
            return Err(RenderError::DataSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let size = self.format.region_size(self.width, self.height);
        let shadow = self.shadow.get_or_insert_with(|| vec![0; size]);
        blit_region(shadow, self.width, self.format, region, data);
        self.upload(queue);
        Ok(())
    }

    fn upload(&self, queue: &wgpu::Queue) {
        let Some(shadow) = &self.shadow else {
            return;
        };
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            shadow,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * self.format.bytes_per_pixel()),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn info(&self) -> TextureInfo {
        TextureInfo {
            label: self.label.clone(),
            width: self.width,
            height: self.height,
            levels: 1,
            format: self.format,
            inverted: self.inverted,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> &Arc<wgpu::Texture> {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// 1x1 transparent texture bound to empty slots
pub fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<ManagedTexture> {
    ManagedTexture::new(
        device,
        queue,
        "noesis empty slot",
        1,
        1,
        TextureFormat::Rgba8,
        Some(&[0; 4]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_filterable_unorm() {
        assert_eq!(wgpu_format(TextureFormat::Rgba8), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(wgpu_format(TextureFormat::R8), wgpu::TextureFormat::R8Unorm);
    }

    #[test]
    fn zero_extent_is_rejected() {
        assert!(check_extent(4, 4).is_ok());
        assert!(matches!(
            check_extent(0, 4),
            Err(RenderError::EmptyExtent { width: 0, height: 4 })
        ));
    }
}
