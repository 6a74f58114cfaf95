//! Call tracing for render devices
//!
//! [`TracingDevice`] wraps any device and logs every contract call at `trace`
//! level under the `noesis_rd::calls` target before forwarding it. Enable with
//! `RUST_LOG=noesis_rd::calls=trace`.

use crate::batch::Batch;
use crate::config::DeviceCaps;
use crate::device::RenderDevice;
use crate::error::Result;
use crate::handle::{RenderTargetId, TextureId};
use crate::stats::DeviceStats;
use crate::texture::{TextureFormat, TextureInfo, TextureRegion};
use crate::tile::Tile;

/// Device decorator that logs each call it forwards
#[derive(Debug)]
pub struct TracingDevice<D> {
    inner: D,
}

impl<D> TracingDevice<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

macro_rules! traced {
    ($name:literal, $call:expr) => {{
        let result = $call;
        if let Err(err) = &result {
            tracing::trace!(target: "noesis_rd::calls", "{} failed: {}", $name, err);
        }
        result
    }};
}

impl<D: RenderDevice> RenderDevice for TracingDevice<D> {
    type FrameTarget = D::FrameTarget;

    fn caps(&self) -> DeviceCaps {
        self.inner.caps()
    }

    fn stats(&self) -> DeviceStats {
        self.inner.stats()
    }

    fn set_frame_target(&mut self, target: Option<Self::FrameTarget>) {
        tracing::trace!(target: "noesis_rd::calls", "SetFrameTarget present={}", target.is_some());
        self.inner.set_frame_target(target)
    }

    fn begin_render(&mut self, offscreen: bool) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "BeginRender offscreen={}", offscreen);
        traced!("BeginRender", self.inner.begin_render(offscreen))
    }

    fn end_render(&mut self) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "EndRender");
        traced!("EndRender", self.inner.end_render())
    }

    fn map_vertices(&mut self, bytes: u32) -> Result<&mut [u8]> {
        tracing::trace!(target: "noesis_rd::calls", "MapVertices bytes={}", bytes);
        traced!("MapVertices", self.inner.map_vertices(bytes))
    }

    fn unmap_vertices(&mut self) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "UnmapVertices");
        traced!("UnmapVertices", self.inner.unmap_vertices())
    }

    fn map_indices(&mut self, bytes: u32) -> Result<&mut [u8]> {
        tracing::trace!(target: "noesis_rd::calls", "MapIndices bytes={}", bytes);
        traced!("MapIndices", self.inner.map_indices(bytes))
    }

    fn unmap_indices(&mut self) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "UnmapIndices");
        traced!("UnmapIndices", self.inner.unmap_indices())
    }

    fn draw_batch(&mut self, batch: &Batch) -> Result<()> {
        tracing::trace!(
            target: "noesis_rd::calls",
            "DrawBatch shader={} state={:?} stencil_ref={} indices={}+{}",
            batch.shader.name(),
            batch.render_state,
            batch.stencil_ref,
            batch.start_index,
            batch.num_indices
        );
        traced!("DrawBatch", self.inner.draw_batch(batch))
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        levels: u32,
        format: TextureFormat,
        data: Option<&[u8]>,
    ) -> Result<TextureId> {
        tracing::trace!(
            target: "noesis_rd::calls",
            "CreateTexture '{}' {}x{} levels={} {:?} data={}",
            label,
            width,
            height,
            levels,
            format,
            data.is_some()
        );
        traced!(
            "CreateTexture",
            self.inner
                .create_texture(label, width, height, levels, format, data)
        )
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<()> {
        tracing::trace!(
            target: "noesis_rd::calls",
            "UpdateTexture {:?} level={} {:?} bytes={}",
            texture,
            level,
            region,
            data.len()
        );
        traced!(
            "UpdateTexture",
            self.inner.update_texture(texture, level, region, data)
        )
    }

    fn texture_info(&self, texture: TextureId) -> Result<TextureInfo> {
        self.inner.texture_info(texture)
    }

    fn drop_texture(&mut self, texture: TextureId) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "DropTexture {:?}", texture);
        traced!("DropTexture", self.inner.drop_texture(texture))
    }

    fn create_render_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Result<RenderTargetId> {
        tracing::trace!(
            target: "noesis_rd::calls",
            "CreateRenderTarget '{}' {}x{} samples={}",
            label,
            width,
            height,
            sample_count
        );
        traced!(
            "CreateRenderTarget",
            self.inner
                .create_render_target(label, width, height, sample_count)
        )
    }

    fn clone_render_target(
        &mut self,
        label: &str,
        source: RenderTargetId,
    ) -> Result<RenderTargetId> {
        tracing::trace!(target: "noesis_rd::calls", "CloneRenderTarget '{}' from {:?}", label, source);
        traced!(
            "CloneRenderTarget",
            self.inner.clone_render_target(label, source)
        )
    }

    fn set_render_target(&mut self, target: RenderTargetId) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "SetRenderTarget {:?}", target);
        traced!("SetRenderTarget", self.inner.set_render_target(target))
    }

    fn render_target_texture(&self, target: RenderTargetId) -> Result<TextureId> {
        self.inner.render_target_texture(target)
    }

    fn drop_render_target(&mut self, target: RenderTargetId) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "DropRenderTarget {:?}", target);
        traced!("DropRenderTarget", self.inner.drop_render_target(target))
    }

    fn begin_tile(&mut self, tile: Tile, surface_width: u32, surface_height: u32) -> Result<()> {
        tracing::trace!(
            target: "noesis_rd::calls",
            "BeginTile {:?} surface={}x{}",
            tile,
            surface_width,
            surface_height
        );
        traced!(
            "BeginTile",
            self.inner.begin_tile(tile, surface_width, surface_height)
        )
    }

    fn end_tile(&mut self) -> Result<()> {
        tracing::trace!(target: "noesis_rd::calls", "EndTile");
        traced!("EndTile", self.inner.end_tile())
    }

    fn resolve_render_target(&mut self, target: RenderTargetId, tiles: &[Tile]) -> Result<()> {
        tracing::trace!(
            target: "noesis_rd::calls",
            "ResolveRenderTarget {:?} tiles={}",
            target,
            tiles.len()
        );
        traced!(
            "ResolveRenderTarget",
            self.inner.resolve_render_target(target, tiles)
        )
    }
}
