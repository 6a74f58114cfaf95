//! The render device contract
//!
//! The UI engine drives a device through this callback set. A frame looks like:
//!
//! ```text
//! begin_render(offscreen = true)
//!     set_render_target(rt)
//!     begin_tile(tile, w, h) ... end_tile()      (per tile)
//!     map_vertices / unmap_vertices, map_indices / unmap_indices
//!     draw_batch(batch) ...
//!     resolve_render_target(rt, tiles)
//! end_render()
//! begin_render(offscreen = false)
//!     ... draws into the frame target ...
//! end_render()
//! ```

use crate::batch::Batch;
use crate::config::DeviceCaps;
use crate::error::Result;
use crate::handle::{RenderTargetId, TextureId};
use crate::stats::DeviceStats;
use crate::texture::{TextureFormat, TextureInfo, TextureRegion};
use crate::tile::Tile;

/// A backend the UI engine can render through
pub trait RenderDevice {
    /// Backend surface a non-offscreen frame draws into
    type FrameTarget;

    fn caps(&self) -> DeviceCaps;

    fn stats(&self) -> DeviceStats;

    /// Surface used by draws while no render target is active
    fn set_frame_target(&mut self, target: Option<Self::FrameTarget>);

    // ─────────────────────────────────────────────────────────────────────────
    // Frame
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_render(&mut self, offscreen: bool) -> Result<()>;

    /// Close the frame; deactivates the current render target
    fn end_render(&mut self) -> Result<()>;

    /// Reserve `bytes` of vertex memory for the engine to fill
    fn map_vertices(&mut self, bytes: u32) -> Result<&mut [u8]>;

    fn unmap_vertices(&mut self) -> Result<()>;

    /// Reserve `bytes` of 16-bit index memory for the engine to fill
    fn map_indices(&mut self, bytes: u32) -> Result<&mut [u8]>;

    fn unmap_indices(&mut self) -> Result<()>;

    /// Draw one batch against the most recent vertex and index maps
    fn draw_batch(&mut self, batch: &Batch) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Textures
    // ─────────────────────────────────────────────────────────────────────────

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        levels: u32,
        format: TextureFormat,
        data: Option<&[u8]>,
    ) -> Result<TextureId>;

    /// Replace a region of a texture with tightly packed pixels
    fn update_texture(
        &mut self,
        texture: TextureId,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<()>;

    fn texture_info(&self, texture: TextureId) -> Result<TextureInfo>;

    fn drop_texture(&mut self, texture: TextureId) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Render targets
    // ─────────────────────────────────────────────────────────────────────────

    fn create_render_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Result<RenderTargetId>;

    /// New target sharing `source`'s multisampled color with its own depth
    fn clone_render_target(&mut self, label: &str, source: RenderTargetId)
        -> Result<RenderTargetId>;

    fn set_render_target(&mut self, target: RenderTargetId) -> Result<()>;

    /// Single-sample texture holding the target's resolved color
    fn render_target_texture(&self, target: RenderTargetId) -> Result<TextureId>;

    fn drop_render_target(&mut self, target: RenderTargetId) -> Result<()>;

    /// Clear stencil inside `tile` of the active target
    fn begin_tile(&mut self, tile: Tile, surface_width: u32, surface_height: u32) -> Result<()>;

    fn end_tile(&mut self) -> Result<()>;

    /// Resolve the multisampled color of `target` inside `tiles`
    fn resolve_render_target(&mut self, target: RenderTargetId, tiles: &[Tile]) -> Result<()>;
}

/// Map `bytes` of vertex memory, let `fill` write it, and unmap
pub fn fill_vertices<D, R>(
    device: &mut D,
    bytes: u32,
    fill: impl FnOnce(&mut [u8]) -> R,
) -> Result<R>
where
    D: RenderDevice + ?Sized,
{
    let out = fill(device.map_vertices(bytes)?);
    device.unmap_vertices()?;
    Ok(out)
}

/// Map `bytes` of index memory, let `fill` write it, and unmap
pub fn fill_indices<D, R>(
    device: &mut D,
    bytes: u32,
    fill: impl FnOnce(&mut [u8]) -> R,
) -> Result<R>
where
    D: RenderDevice + ?Sized,
{
    let out = fill(device.map_indices(bytes)?);
    device.unmap_indices()?;
    Ok(out)
}
