//! Pipeline state cache
//!
//! One render pipeline per distinct (render state, shader, stencil ref, output)
//! tuple, built on first use. The tile clear and multisample resolve programs
//! get their own small pipelines.

use std::sync::Arc;

use noesis_rd_core::{
    BlendVariant, PipelineKey, RasterizerVariant, Result, Shader, StateCache, StateVariants,
    StencilVariant,
};

use crate::context::TARGET_FORMAT;
use crate::shaders::{self, ShaderLibrary};

/// Attachments a pipeline renders into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputFormat {
    pub color: wgpu::TextureFormat,
    pub depth_stencil: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

pub type BatchPipelineKey = PipelineKey<OutputFormat>;

// ─────────────────────────────────────────────────────────────────────────────
// Variant translation
// ─────────────────────────────────────────────────────────────────────────────

/// Primitive state for a rasterizer variant
///
/// Wireframe needs `POLYGON_MODE_LINE`; without it the variant fills.
pub fn primitive_state(rasterizer: RasterizerVariant, line_mode: bool) -> wgpu::PrimitiveState {
    let polygon_mode = if rasterizer.wireframe && line_mode {
        wgpu::PolygonMode::Line
    } else {
        wgpu::PolygonMode::Fill
    };

    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        unclipped_depth: false,
        polygon_mode,
        conservative: false,
    }
}

/// Color target for a blend variant
///
/// Colors are premultiplied. Dual-source coverage is drawn as plain over.
pub fn color_target(blend: BlendVariant, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    let (blend, write_mask) = match blend {
        BlendVariant::Src => (None, wgpu::ColorWrites::ALL),
        BlendVariant::SrcOver | BlendVariant::SrcOverDual => (
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            wgpu::ColorWrites::ALL,
        ),
        BlendVariant::ColorDisabled => (None, wgpu::ColorWrites::empty()),
    };

    wgpu::ColorTargetState {
        format,
        blend,
        write_mask,
    }
}

/// Depth/stencil state for a stencil variant; depth is never tested or written
pub fn depth_stencil_state(
    stencil: StencilVariant,
    format: wgpu::TextureFormat,
) -> wgpu::DepthStencilState {
    let face = |compare, pass_op| wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    };

    let stencil = match stencil {
        StencilVariant::Disabled => wgpu::StencilState::default(),
        StencilVariant::EqualKeep => wgpu::StencilState {
            front: face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep),
            back: face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::Keep),
            read_mask: 0xff,
            write_mask: 0,
        },
        StencilVariant::EqualIncr => wgpu::StencilState {
            front: face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::IncrementClamp),
            back: face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::IncrementClamp),
            read_mask: 0xff,
            write_mask: 0xff,
        },
        StencilVariant::EqualDecr => wgpu::StencilState {
            front: face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::DecrementClamp),
            back: face(wgpu::CompareFunction::Equal, wgpu::StencilOperation::DecrementClamp),
            read_mask: 0xff,
            write_mask: 0xff,
        },
        StencilVariant::ClearZero => wgpu::StencilState {
            front: face(wgpu::CompareFunction::Always, wgpu::StencilOperation::Zero),
            back: face(wgpu::CompareFunction::Always, wgpu::StencilOperation::Zero),
            read_mask: 0xff,
            write_mask: 0xff,
        },
    };

    wgpu::DepthStencilState {
        format,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

fn multisample_state(count: u32) -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count,
        mask: !0,
        alpha_to_coverage_enabled: false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bind group layouts
// ─────────────────────────────────────────────────────────────────────────────

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Layout shared by every table shader
fn create_batch_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        // Projection
        uniform_entry(0),
        // Glyph/image dimensions
        uniform_entry(1),
        // Color, radial gradient, opacity
        uniform_entry(2),
        // Effect parameters
        uniform_entry(3),
    ];

    // Pattern, ramps, image, glyphs, shadow
    for unit in 0..5u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 4 + unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 5 + unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("noesis batch bind group layout"),
        entries: &entries,
    })
}

fn create_resolve_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("noesis resolve bind group layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: true,
            },
            count: None,
        }],
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Pipelines for batches, tile clears and resolves
pub struct PipelineCache {
    batch_layout: wgpu::BindGroupLayout,
    batch_pipeline_layout: wgpu::PipelineLayout,
    batches: StateCache<BatchPipelineKey, Arc<wgpu::RenderPipeline>>,

    clear_module: wgpu::ShaderModule,
    clear_pipeline_layout: wgpu::PipelineLayout,
    clears: StateCache<OutputFormat, Arc<wgpu::RenderPipeline>>,

    resolve_layout: wgpu::BindGroupLayout,
    resolve: Arc<wgpu::RenderPipeline>,

    line_mode: bool,
    warned_wireframe: bool,
    warned_dual: bool,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device) -> Self {
        let batch_layout = create_batch_layout(device);
        let batch_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("noesis batch pipeline layout"),
            bind_group_layouts: &[&batch_layout],
            push_constant_ranges: &[],
        });

        let clear_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("noesis clear shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::CLEAR_SHADER.into()),
        });
        let clear_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("noesis clear pipeline layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let resolve_layout = create_resolve_layout(device);
        let resolve = Arc::new(create_resolve_pipeline(device, &resolve_layout));

        Self {
            batch_layout,
            batch_pipeline_layout,
            batches: StateCache::new(),
            clear_module,
            clear_pipeline_layout,
            clears: StateCache::new(),
            resolve_layout,
            resolve,
            line_mode: device.features().contains(wgpu::Features::POLYGON_MODE_LINE),
            warned_wireframe: false,
            warned_dual: false,
        }
    }

    pub fn batch_layout(&self) -> &wgpu::BindGroupLayout {
        &self.batch_layout
    }

    pub fn resolve_layout(&self) -> &wgpu::BindGroupLayout {
        &self.resolve_layout
    }

    pub fn resolve(&self) -> Arc<wgpu::RenderPipeline> {
        Arc::clone(&self.resolve)
    }

    /// Number of batch pipelines built so far
    pub fn created(&self) -> u64 {
        self.batches.misses()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn contains(&self, key: &BatchPipelineKey) -> bool {
        self.batches.contains(key)
    }

    /// Pipeline for `key`, built on a miss
    ///
    /// Render state bits are validated before anything is created.
    pub fn batch(
        &mut self,
        device: &wgpu::Device,
        shaders: &mut ShaderLibrary,
        key: BatchPipelineKey,
        debug_labels: bool,
    ) -> Result<Arc<wgpu::RenderPipeline>> {
        let layout = &self.batch_pipeline_layout;
        let line_mode = self.line_mode;
        let warned_wireframe = &mut self.warned_wireframe;
        let warned_dual = &mut self.warned_dual;

        let pipeline = self.batches.get_or_try_insert_with(key, |key| -> Result<_> {
            let variants = StateVariants::from_render_state(key.render_state)?;
            let label = variants.label(key.shader.name(), key.stencil_ref);
            tracing::debug!("new pipeline state -> {}", label);

            if variants.rasterizer.wireframe && !line_mode && !*warned_wireframe {
                tracing::warn!("wireframe requested without POLYGON_MODE_LINE, filling instead");
                *warned_wireframe = true;
            }
            if variants.blend == BlendVariant::SrcOverDual && !*warned_dual {
                tracing::warn!("dual-source blending unavailable, using premultiplied over");
                *warned_dual = true;
            }

            let module = shaders.module(device, key.shader);
            Ok(Arc::new(create_batch_pipeline(
                device,
                layout,
                module,
                key.shader,
                variants,
                key.output,
                line_mode,
                debug_labels.then_some(label.as_str()),
            )))
        })?;

        Ok(Arc::clone(pipeline))
    }

    /// Tile clear pipeline for an output
    pub fn clear(&mut self, device: &wgpu::Device, output: OutputFormat) -> Arc<wgpu::RenderPipeline> {
        let module = &self.clear_module;
        let layout = &self.clear_pipeline_layout;

        let pipeline = self.clears.get_or_try_insert_with(output, |output| {
            tracing::debug!("new clear pipeline -> {:?}", output);
            let variants = StateVariants::tile_clear();
            Ok::<_, std::convert::Infallible>(Arc::new(device.create_render_pipeline(
                &wgpu::RenderPipelineDescriptor {
                    label: Some("noesis tile clear pipeline"),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        targets: &[Some(color_target(variants.blend, output.color))],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: primitive_state(variants.rasterizer, false),
                    depth_stencil: output
                        .depth_stencil
                        .map(|format| depth_stencil_state(variants.stencil, format)),
                    multisample: multisample_state(output.sample_count),
                    multiview: None,
                    cache: None,
                },
            )))
        });

        match pipeline {
            Ok(pipeline) => Arc::clone(pipeline),
            Err(never) => match never {},
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn create_batch_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    shader: Shader,
    variants: StateVariants,
    output: OutputFormat,
    line_mode: bool,
    label: Option<&str>,
) -> wgpu::RenderPipeline {
    let format = shader.format();
    let attributes = shaders::vertex_attributes(&format.layout());

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label,
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: format.stride() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(color_target(variants.blend, output.color))],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: primitive_state(variants.rasterizer, line_mode),
        depth_stencil: output
            .depth_stencil
            .map(|format| depth_stencil_state(variants.stencil, format)),
        multisample: multisample_state(output.sample_count),
        multiview: None,
        cache: None,
    })
}

fn create_resolve_pipeline(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("noesis resolve shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::RESOLVE_SHADER.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("noesis resolve pipeline layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("noesis resolve pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[Some(color_target(BlendVariant::Src, TARGET_FORMAT))],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: primitive_state(
            RasterizerVariant {
                wireframe: false,
                scissor: true,
            },
            false,
        ),
        depth_stencil: None,
        multisample: multisample_state(1),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    #[test]
    fn stencil_variants_use_equal_except_clear() {
        for variant in [
            StencilVariant::EqualKeep,
            StencilVariant::EqualIncr,
            StencilVariant::EqualDecr,
        ] {
            let state = depth_stencil_state(variant, DEPTH);
            assert_eq!(state.stencil.front.compare, wgpu::CompareFunction::Equal);
            assert_eq!(state.stencil.front, state.stencil.back);
            assert!(!state.depth_write_enabled);
        }

        let clear = depth_stencil_state(StencilVariant::ClearZero, DEPTH);
        assert_eq!(clear.stencil.front.compare, wgpu::CompareFunction::Always);
        assert_eq!(clear.stencil.front.pass_op, wgpu::StencilOperation::Zero);

        let disabled = depth_stencil_state(StencilVariant::Disabled, DEPTH);
        assert!(!disabled.stencil.is_enabled());
    }

    #[test]
    fn stencil_ops_follow_mode() {
        let op = |variant| depth_stencil_state(variant, DEPTH).stencil.front.pass_op;
        assert_eq!(op(StencilVariant::EqualKeep), wgpu::StencilOperation::Keep);
        assert_eq!(op(StencilVariant::EqualIncr), wgpu::StencilOperation::IncrementClamp);
        assert_eq!(op(StencilVariant::EqualDecr), wgpu::StencilOperation::DecrementClamp);
    }

    #[test]
    fn color_disabled_masks_all_channels() {
        let target = color_target(BlendVariant::ColorDisabled, TARGET_FORMAT);
        assert_eq!(target.write_mask, wgpu::ColorWrites::empty());

        let src = color_target(BlendVariant::Src, TARGET_FORMAT);
        assert!(src.blend.is_none());
        assert_eq!(src.write_mask, wgpu::ColorWrites::ALL);

        let over = color_target(BlendVariant::SrcOver, TARGET_FORMAT);
        assert_eq!(over.blend, Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING));
        assert_eq!(
            color_target(BlendVariant::SrcOverDual, TARGET_FORMAT).blend,
            over.blend
        );
    }

    #[test]
    fn wireframe_needs_line_mode() {
        let wire = RasterizerVariant {
            wireframe: true,
            scissor: false,
        };
        assert_eq!(primitive_state(wire, true).polygon_mode, wgpu::PolygonMode::Line);
        assert_eq!(primitive_state(wire, false).polygon_mode, wgpu::PolygonMode::Fill);
        assert_eq!(primitive_state(wire, true).cull_mode, None);
    }
}
