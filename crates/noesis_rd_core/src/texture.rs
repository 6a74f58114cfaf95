//! Texture formats and queries

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// Pixel formats the UI engine can request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    /// Four channels, 8 bits each
    Rgba8,
    /// Single 8-bit channel, used by glyph atlases and gradient ramps
    R8,
}

impl TextureFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::R8 => 1,
        }
    }

    /// Format for the wire byte
    pub fn from_u8(value: u8) -> Result<TextureFormat> {
        match value {
            0 => Ok(TextureFormat::Rgba8),
            1 => Ok(TextureFormat::R8),
            other => Err(RenderError::InvalidTextureFormat(other)),
        }
    }

    /// Bytes of a tightly packed `width` x `height` region
    pub const fn region_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel() as usize
    }
}

/// Everything the UI engine may ask about a texture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub format: TextureFormat,
    /// Rows are stored bottom-up, the engine must flip texture coordinates
    pub inverted: bool,
}

impl TextureInfo {
    pub fn has_mipmaps(&self) -> bool {
        self.levels > 1
    }
}

/// Axis-aligned region of a texture addressed by an update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the region against a texture's extent
    pub fn check_bounds(&self, texture_width: u32, texture_height: u32) -> Result<()> {
        let fits_x = self
            .x
            .checked_add(self.width)
            .is_some_and(|right| right <= texture_width);
        let fits_y = self
            .y
            .checked_add(self.height)
            .is_some_and(|bottom| bottom <= texture_height);
        if fits_x && fits_y {
            Ok(())
        } else {
            Err(RenderError::UpdateOutOfBounds {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                texture_width,
                texture_height,
            })
        }
    }
}

/// Copy a tightly packed region into a row-major image buffer
///
/// `shadow` holds the whole texture with rows `texture_width * bpp` bytes apart.
pub fn blit_region(
    shadow: &mut [u8],
    texture_width: u32,
    format: TextureFormat,
    region: TextureRegion,
    data: &[u8],
) {
    let bpp = format.bytes_per_pixel() as usize;
    let stride = texture_width as usize * bpp;
    let row_bytes = region.width as usize * bpp;
    if row_bytes == 0 {
        return;
    }

    for (row, src) in data.chunks_exact(row_bytes).enumerate() {
        let start = (region.y as usize + row) * stride + region.x as usize * bpp;
        shadow[start..start + row_bytes].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_formats() {
        assert_eq!(TextureFormat::from_u8(0).unwrap(), TextureFormat::Rgba8);
        assert_eq!(TextureFormat::from_u8(1).unwrap(), TextureFormat::R8);
        assert!(matches!(
            TextureFormat::from_u8(2),
            Err(RenderError::InvalidTextureFormat(2))
        ));
        assert_eq!(TextureFormat::Rgba8.region_size(64, 64), 64 * 64 * 4);
        assert_eq!(TextureFormat::R8.region_size(3, 5), 15);
    }

    #[test]
    fn region_bounds() {
        assert!(TextureRegion::new(0, 0, 64, 64).check_bounds(64, 64).is_ok());
        assert!(TextureRegion::new(60, 0, 5, 1).check_bounds(64, 64).is_err());
        assert!(TextureRegion::new(0, u32::MAX, 1, 2)
            .check_bounds(64, 64)
            .is_err());
    }

    #[test]
    fn blit_places_rows_at_stride() {
        let mut shadow = vec![0u8; 4 * 3];
        let data = [1, 2, 3, 4];
        blit_region(
            &mut shadow,
            4,
            TextureFormat::R8,
            TextureRegion::new(1, 1, 2, 2),
            &data,
        );
        assert_eq!(shadow, vec![0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0]);
    }
}
