//! wgpu render device
//!
//! Every batch is recorded into its own render pass and submitted on its own
//! command buffer. Constant and ring uploads go through the queue, which
//! orders them before the next submission, so a batch always sees the data
//! written for it.

use std::sync::Arc;

use slotmap::SlotMap;
use smallvec::SmallVec;

use noesis_rd_core::constants::{EFFECT_FLOATS, PIXEL_FLOATS, TEX_DIMENSIONS_FLOATS, VERTEX_FLOATS};
use noesis_rd_core::{
    Batch, ConstantTracker, ConstantUpdates, DeviceCaps, DeviceConfig, DeviceStats, PipelineKey,
    RenderDevice, RenderError, RenderTargetId, ResourceSetKey, Result, SamplerState, ScissorRect,
    StateCache, TextureFormat, TextureId, TextureInfo, TextureRegion, Tile,
};

use crate::buffer::DynamicBuffer;
use crate::context::{GpuContext, DEPTH_STENCIL_FORMAT};
use crate::pipeline::{OutputFormat, PipelineCache};
use crate::readback;
use crate::sampler::SamplerCache;
use crate::shaders::{GeneratedShaders, ShaderLibrary, ShaderSource};
use crate::target::{check_sample_count, create_resolve_texture, ManagedRenderTarget};
use crate::texture::{check_extent, create_placeholder, ManagedTexture};

/// Surface drawn into while no render target is active
pub struct FrameTarget {
    pub view: wgpu::TextureView,
    /// View of a [`DEPTH_STENCIL_FORMAT`] texture; without one stencil
    /// modes have no effect
    pub depth_stencil: Option<wgpu::TextureView>,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

impl FrameTarget {
    fn output_format(&self) -> OutputFormat {
        OutputFormat {
            color: self.format,
            depth_stencil: self
                .depth_stencil
                .as_ref()
                .map(|_| DEPTH_STENCIL_FORMAT),
            sample_count: self.sample_count,
        }
    }
}

/// Constant buffers shared by every resource set
struct Uniforms {
    vertex: wgpu::Buffer,
    tex_dimensions: wgpu::Buffer,
    pixel: wgpu::Buffer,
    effect: wgpu::Buffer,
}

impl Uniforms {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = |label: &str, floats: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (floats * std::mem::size_of::<f32>()) as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            vertex: uniform("noesis vertex constants", VERTEX_FLOATS),
            tex_dimensions: uniform("noesis texture dimensions", TEX_DIMENSIONS_FLOATS),
            pixel: uniform("noesis pixel constants", PIXEL_FLOATS),
            effect: uniform("noesis effect constants", EFFECT_FLOATS),
        }
    }
}

/// Attachments of the pass a draw or tile clear records into
struct PassTarget<'a> {
    color: &'a wgpu::TextureView,
    depth_stencil: Option<&'a wgpu::TextureView>,
    width: u32,
    height: u32,
    output: OutputFormat,
}

impl<'a> PassTarget<'a> {
    fn begin<'e>(&self, encoder: &'e mut wgpu::CommandEncoder, label: &str) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: self.depth_stencil.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

/// Render device drawing engine batches with wgpu
pub struct GpuRenderDevice {
    context: GpuContext,
    config: DeviceConfig,

    vertices: DynamicBuffer,
    indices: DynamicBuffer,
    uniforms: Uniforms,
    constants: ConstantTracker,

    shaders: ShaderLibrary,
    pipelines: PipelineCache,
    resource_sets: StateCache<ResourceSetKey, Arc<wgpu::BindGroup>>,
    samplers: SamplerCache,

    placeholder: ManagedTexture,
    textures: SlotMap<TextureId, ManagedTexture>,
    render_targets: SlotMap<RenderTargetId, ManagedRenderTarget>,

    current_target: Option<RenderTargetId>,
    frame_target: Option<FrameTarget>,
    /// Scissor of the open tile
    tile: Option<ScissorRect>,
    rendering: bool,

    stats: DeviceStats,
}

impl GpuRenderDevice {
    pub fn new(context: GpuContext, config: DeviceConfig) -> Result<Self> {
        Self::with_shaders(context, config, Box::new(GeneratedShaders))
    }

    /// Create a device drawing with programs from `source`
    pub fn with_shaders(
        context: GpuContext,
        config: DeviceConfig,
        source: Box<dyn ShaderSource>,
    ) -> Result<Self> {
        let config = config.sanitized();
        let device = &context.device;

        let vertices = DynamicBuffer::new(
            device,
            "vertex",
            config.vertex_buffer_size,
            wgpu::BufferUsages::VERTEX,
        );
        let indices = DynamicBuffer::new(
            device,
            "index",
            config.index_buffer_size,
            wgpu::BufferUsages::INDEX,
        );
        let placeholder = create_placeholder(device, &context.queue)?;

        tracing::info!(
            "render device ready: vertex ring {} KiB, index ring {} KiB",
            vertices.capacity() / 1024,
            indices.capacity() / 1024
        );

        Ok(Self {
            vertices,
            indices,
            uniforms: Uniforms::new(device),
            constants: ConstantTracker::new(),
            shaders: ShaderLibrary::new(source),
            pipelines: PipelineCache::new(device),
            resource_sets: StateCache::new(),
            samplers: SamplerCache::new(context.features()),
            placeholder,
            textures: SlotMap::with_key(),
            render_targets: SlotMap::with_key(),
            current_target: None,
            frame_target: None,
            tile: None,
            rendering: false,
            stats: DeviceStats::default(),
            context,
            config,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn resource_set_count(&self) -> usize {
        self.resource_sets.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn texture(&self, texture: TextureId) -> Option<&ManagedTexture> {
        self.textures.get(texture)
    }

    pub fn render_target(&self, target: RenderTargetId) -> Option<&ManagedRenderTarget> {
        self.render_targets.get(target)
    }

    /// Read a texture back, tightly packed; blocks until the GPU is done
    pub fn read_texture(&self, texture: TextureId) -> Result<Vec<u8>> {
        let managed = self
            .textures
            .get(texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        readback::read_texture(
            &self.context.device,
            &self.context.queue,
            managed.texture(),
            managed.info().format.bytes_per_pixel(),
        )
    }

    fn pass_target(&self) -> Result<PassTarget<'_>> {
        match self.current_target {
            Some(id) => {
                let target = self
                    .render_targets
                    .get(id)
                    .ok_or(RenderError::UnknownRenderTarget(id))?;
                let (width, height) = target.size();
                Ok(PassTarget {
                    color: target.color_view(),
                    depth_stencil: Some(target.depth_view()),
                    width,
                    height,
                    output: target.output_format(),
                })
            }
            None => {
                let frame = self.frame_target.as_ref().ok_or(RenderError::NoFrameTarget)?;
                Ok(PassTarget {
                    color: &frame.view,
                    depth_stencil: frame.depth_stencil.as_ref(),
                    width: frame.width,
                    height: frame.height,
                    output: frame.output_format(),
                })
            }
        }
    }

    /// Bind group for the batch's texture slots, built on a miss
    fn resource_set(&mut self, batch: &Batch) -> Result<Arc<wgpu::BindGroup>> {
        let device = &self.context.device;
        let textures = &self.textures;
        let placeholder = &self.placeholder;
        let samplers = &mut self.samplers;
        let uniforms = &self.uniforms;
        let layout = self.pipelines.batch_layout();

        let key = ResourceSetKey::for_batch(batch);
        let bind_group = self.resource_sets.get_or_try_insert_with(key, |key| -> Result<_> {
            let mut views = SmallVec::<[&wgpu::TextureView; 5]>::new();
            let mut slot_samplers = SmallVec::<[Arc<wgpu::Sampler>; 5]>::new();
            for slot in &key.slots {
                let (view, sampler) = match slot.texture {
                    Some(id) => {
                        let texture = textures.get(id).ok_or(RenderError::UnknownTexture(id))?;
                        (texture.view(), slot.sampler)
                    }
                    None => (placeholder.view(), SamplerState::default()),
                };
                views.push(view);
                slot_samplers.push(samplers.get(device, sampler)?);
            }
            tracing::debug!("new resource set -> {:?}", key.slots);

            let mut entries = vec![
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.vertex.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniforms.tex_dimensions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniforms.pixel.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniforms.effect.as_entire_binding(),
                },
            ];
            for (unit, (view, sampler)) in views.iter().zip(&slot_samplers).enumerate() {
                let binding = 4 + unit as u32 * 2;
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: binding + 1,
                    resource: wgpu::BindingResource::Sampler(sampler.as_ref()),
                });
            }

            Ok(Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("noesis resource set"),
                layout,
                entries: &entries,
            })))
        })?;

        Ok(Arc::clone(bind_group))
    }

    fn upload_constants(&mut self, updates: &ConstantUpdates) {
        let queue = &self.context.queue;
        if let Some(upload) = &updates.vertex {
            queue.write_buffer(&self.uniforms.vertex, 0, bytemuck::cast_slice(&upload.data));
            self.stats.vertex_constant_uploads += 1;
        }
        if let Some(upload) = &updates.pixel {
            queue.write_buffer(&self.uniforms.pixel, 0, bytemuck::cast_slice(&upload.data));
            self.stats.pixel_constant_uploads += 1;
        }
        if let Some(upload) = &updates.tex_dimensions {
            queue.write_buffer(
                &self.uniforms.tex_dimensions,
                0,
                bytemuck::cast_slice(&upload.data),
            );
            self.stats.tex_dimension_uploads += 1;
        }
        if let Some(upload) = &updates.effect {
            queue.write_buffer(&self.uniforms.effect, 0, bytemuck::cast_slice(&upload.data));
            self.stats.effect_uploads += 1;
        }
    }

    /// Register the single-sample texture of a new render target
    fn register_target_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> (Arc<wgpu::Texture>, TextureId) {
        let resolve = Arc::new(create_resolve_texture(
            &self.context.device,
            label,
            width,
            height,
        ));
        let texture = self.textures.insert(ManagedTexture::wrap(
            label,
            width,
            height,
            TextureFormat::Rgba8,
            self.config.flipped_textures,
            Arc::clone(&resolve),
        ));
        (resolve, texture)
    }

    /// Forget resource sets that bind `texture` so its GPU memory can go
    fn purge_resource_sets(&mut self, texture: TextureId) {
        self.resource_sets.retain(|key| !key.references(texture));
    }
}

impl RenderDevice for GpuRenderDevice {
    type FrameTarget = FrameTarget;

    fn caps(&self) -> DeviceCaps {
        self.config.caps
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            pipelines_created: self.pipelines.created(),
            resource_sets_created: self.resource_sets.misses(),
            samplers_created: self.samplers.created(),
            vertex_wraps: self.vertices.wraps(),
            index_wraps: self.indices.wraps(),
            ..self.stats
        }
    }

    fn set_frame_target(&mut self, target: Option<FrameTarget>) {
        self.frame_target = target;
    }

    fn begin_render(&mut self, _offscreen: bool) -> Result<()> {
        self.rendering = true;
        Ok(())
    }

    fn end_render(&mut self) -> Result<()> {
        if !self.rendering {
            return Err(RenderError::NotRendering);
        }
        self.rendering = false;
        self.current_target = None;
        self.tile = None;
        self.stats.frames += 1;
        Ok(())
    }

    fn map_vertices(&mut self, bytes: u32) -> Result<&mut [u8]> {
        self.vertices.map(bytes)
    }

    fn unmap_vertices(&mut self) -> Result<()> {
        self.vertices.unmap(&self.context.queue)
    }

    fn map_indices(&mut self, bytes: u32) -> Result<&mut [u8]> {
        self.indices.map(bytes)
    }

    fn unmap_indices(&mut self) -> Result<()> {
        self.indices.unmap(&self.context.queue)
    }

    fn draw_batch(&mut self, batch: &Batch) -> Result<()> {
        if !self.rendering {
            return Err(RenderError::NotRendering);
        }
        let output = self.pass_target()?.output;

        let vertex_base = self.vertices.draw_pos() as u64 + batch.vertex_offset as u64;
        if vertex_base >= self.vertices.capacity() as u64 {
            return Err(RenderError::Backend(format!(
                "vertex offset {} outside the {} byte ring",
                vertex_base,
                self.vertices.capacity()
            )));
        }
        let first_index = batch
            .start_index
            .checked_add(self.indices.draw_pos() / 2)
            .filter(|first| {
                first
                    .checked_add(batch.num_indices)
                    .is_some_and(|end| end as u64 * 2 <= self.indices.capacity() as u64)
            })
            .ok_or_else(|| {
                RenderError::Backend(format!(
                    "index range {}+{} outside the {} byte ring",
                    batch.start_index,
                    batch.num_indices,
                    self.indices.capacity()
                ))
            })?;

        let dimensions = batch
            .dimension_source()
            .map(|id| {
                self.textures
                    .get(id)
                    .map(ManagedTexture::size)
                    .ok_or(RenderError::UnknownTexture(id))
            })
            .transpose()?;

        let pipeline = self.pipelines.batch(
            &self.context.device,
            &mut self.shaders,
            PipelineKey::for_batch(batch, output),
            self.config.debug_labels,
        )?;
        let bind_group = self.resource_set(batch)?;

        let updates = self.constants.plan(batch, dimensions);
        self.upload_constants(&updates);
        self.constants.commit(&updates);

        let target = self.pass_target()?;
        let scissor = match self.tile {
            Some(tile) if batch.render_state.scissor_enable() => tile,
            _ => ScissorRect::full(target.width, target.height),
        }
        .clamp_to(target.width, target.height);

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("noesis batch encoder"),
            });
        {
            let mut pass = target.begin(&mut encoder, "noesis batch");
            pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);
            pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, bind_group.as_ref(), &[]);
            pass.set_stencil_reference(batch.stencil_ref as u32);
            pass.set_vertex_buffer(0, self.vertices.buffer().slice(vertex_base..));
            pass.set_index_buffer(self.indices.buffer().slice(..), wgpu::IndexFormat::Uint16);
            if batch.num_indices > 0 {
                pass.draw_indexed(first_index..first_index + batch.num_indices, 0, 0..1);
            }
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));

        self.stats.draws += 1;
        self.stats.triangles += (batch.num_indices / 3) as u64;
        Ok(())
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
        if levels != 1 {
            return Err(RenderError::UnsupportedMipLevels(levels));
        }
        let texture = ManagedTexture::new(
            &self.context.device,
            &self.context.queue,
            label,
            width,
            height,
            format,
            data,
        )?;
        tracing::debug!("texture '{}' {}x{} {:?}", label, width, height, format);

        self.stats.textures_created += 1;
        Ok(self.textures.insert(texture))
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<()> {
        self.textures
            .get_mut(texture)
            .ok_or(RenderError::UnknownTexture(texture))?
            .update(&self.context.queue, level, region, data)?;
        self.stats.texture_updates += 1;
        Ok(())
    }

    fn texture_info(&self, texture: TextureId) -> Result<TextureInfo> {
        self.textures
            .get(texture)
            .map(ManagedTexture::info)
            .ok_or(RenderError::UnknownTexture(texture))
    }

    fn drop_texture(&mut self, texture: TextureId) -> Result<()> {
        self.textures
            .remove(texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        self.purge_resource_sets(texture);
        Ok(())
    }

    fn create_render_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Result<RenderTargetId> {
        check_sample_count(&self.context, sample_count)?;
        check_extent(width, height)?;

        let (resolve, texture) = self.register_target_texture(label, width, height);
        let target = ManagedRenderTarget::new(
            &self.context.device,
            label,
            width,
            height,
            sample_count,
            resolve,
            texture,
        );
        tracing::debug!(
            "render target '{}' {}x{} x{} samples",
            label,
            width,
            height,
            sample_count
        );

        self.stats.render_targets_created += 1;
        Ok(self.render_targets.insert(target))
    }

    fn clone_render_target(
        &mut self,
        label: &str,
        source: RenderTargetId,
    ) -> Result<RenderTargetId> {
        let (width, height) = self
            .render_targets
            .get(source)
            .ok_or(RenderError::UnknownRenderTarget(source))?
            .size();

        let (resolve, texture) = self.register_target_texture(label, width, height);
        let clone = self.render_targets[source].clone_with(
            &self.context.device,
            label,
            resolve,
            texture,
        );
        tracing::debug!("render target '{}' cloned from '{}'", label, self.render_targets[source].label());

        self.stats.render_targets_created += 1;
        Ok(self.render_targets.insert(clone))
    }

    fn set_render_target(&mut self, target: RenderTargetId) -> Result<()> {
        if !self.render_targets.contains_key(target) {
            return Err(RenderError::UnknownRenderTarget(target));
        }
        self.current_target = Some(target);
        Ok(())
    }

    fn render_target_texture(&self, target: RenderTargetId) -> Result<TextureId> {
        self.render_targets
            .get(target)
            .map(ManagedRenderTarget::texture)
            .ok_or(RenderError::UnknownRenderTarget(target))
    }

    fn drop_render_target(&mut self, target: RenderTargetId) -> Result<()> {
        let removed = self
            .render_targets
            .remove(target)
            .ok_or(RenderError::UnknownRenderTarget(target))?;
        if self.current_target == Some(target) {
            self.current_target = None;
            self.tile = None;
        }
        // The engine may have dropped the texture already
        if self.textures.remove(removed.texture()).is_some() {
            self.purge_resource_sets(removed.texture());
        }
        Ok(())
    }

    fn begin_tile(&mut self, tile: Tile, surface_width: u32, surface_height: u32) -> Result<()> {
        if self.tile.is_some() {
            return Err(RenderError::TileAlreadyOpen);
        }
        let id = self.current_target.ok_or(RenderError::NoActiveRenderTarget)?;
        let output = self
            .render_targets
            .get(id)
            .ok_or(RenderError::UnknownRenderTarget(id))?
            .output_format();
        let pipeline = self.pipelines.clear(&self.context.device, output);

        let target = self.pass_target()?;
        let scissor = tile
            .to_scissor(surface_height)
            .clamp_to(target.width.min(surface_width), target.height);

        if !scissor.is_empty() {
            let mut encoder =
                self.context
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("noesis tile clear encoder"),
                    });
            {
                let mut pass = target.begin(&mut encoder, "noesis tile clear");
                pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
                pass.set_pipeline(&pipeline);
                pass.set_stencil_reference(0);
                pass.draw(0..3, 0..1);
            }
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }

        self.tile = Some(scissor);
        self.stats.tiles_cleared += 1;
        Ok(())
    }

    fn end_tile(&mut self) -> Result<()> {
        self.tile.take().map(|_| ()).ok_or(RenderError::NoOpenTile)
    }

    fn resolve_render_target(&mut self, target: RenderTargetId, tiles: &[Tile]) -> Result<()> {
        let managed = self
            .render_targets
            .get(target)
            .ok_or(RenderError::UnknownRenderTarget(target))?;
        // Single-sample targets render straight into their texture
        let Some(msaa_view) = managed.msaa_view() else {
            return Ok(());
        };
        let (width, height) = managed.size();

        let device = &self.context.device;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("noesis resolve bind group"),
            layout: self.pipelines.resolve_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(msaa_view),
            }],
        });
        let pipeline = self.pipelines.resolve();
        let mut resolved = 0u64;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("noesis resolve encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("noesis resolve"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: managed.resolve_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            for tile in tiles {
                let scissor = tile.to_scissor(height).clamp_to(width, height);
                if scissor.is_empty() {
                    continue;
                }
                pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
                pass.draw(0..3, 0..1);
                resolved += 1;
            }
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));

        self.stats.tiles_resolved += resolved;
        Ok(())
    }
}
