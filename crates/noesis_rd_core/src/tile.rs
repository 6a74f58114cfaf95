//! Tiles and scissor rectangles

use serde::{Deserialize, Serialize};

/// Rectangle of an offscreen surface, origin at the bottom-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Rectangle in backend framebuffer coordinates, origin at the top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scissor for this tile on a surface `surface_height` pixels tall
    ///
    /// The engine counts rows from the bottom, the framebuffer from the top:
    /// `y' = surface_height - (y + height)`. Tiles reaching past the surface
    /// edge clamp to row 0.
    pub fn to_scissor(&self, surface_height: u32) -> ScissorRect {
        ScissorRect {
            x: self.x,
            y: surface_height.saturating_sub(self.y.saturating_add(self.height)),
            width: self.width,
            height: self.height,
        }
    }
}

impl ScissorRect {
    /// Rectangle covering a whole `width` x `height` attachment
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Intersection with a `width` x `height` attachment
    ///
    /// The backend rejects scissors that leave the attachment.
    pub fn clamp_to(&self, width: u32, height: u32) -> ScissorRect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        ScissorRect {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_flips_to_top_left_origin() {
        let scissor = Tile::new(10, 5, 20, 15).to_scissor(100);
        assert_eq!(
            scissor,
            ScissorRect {
                x: 10,
                y: 80,
                width: 20,
                height: 15
            }
        );
    }

    #[test]
    fn full_surface_tile_maps_to_full_rect() {
        assert_eq!(
            Tile::new(0, 0, 64, 32).to_scissor(32),
            ScissorRect::full(64, 32)
        );
    }

    #[test]
    fn clamp_keeps_scissor_inside_attachment() {
        let clamped = ScissorRect {
            x: 50,
            y: 90,
            width: 100,
            height: 100,
        }
        .clamp_to(64, 100);
        assert_eq!(
            clamped,
            ScissorRect {
                x: 50,
                y: 90,
                width: 14,
                height: 10
            }
        );
        assert!(ScissorRect { x: 70, y: 0, width: 4, height: 4 }
            .clamp_to(64, 64)
            .is_empty());
    }
}
