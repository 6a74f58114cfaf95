//! WGSL programs for the shader table
//!
//! Every table shader shares one bind group:
//!
//! | Binding | Resource                                   |
//! |---------|--------------------------------------------|
//! | 0       | vertex constants (projection)              |
//! | 1       | texture dimensions (w, h, 1/w, 1/h)        |
//! | 2       | pixel constants (rgba / radial / opacity)  |
//! | 3       | effect constants                           |
//! | 4..13   | pattern, ramps, image, glyphs, shadow      |
//!
//! Vertex attributes use one location per semantic, so any program can read
//! any vertex format that carries what it needs.

use std::borrow::Cow;
use std::fmt::Write as _;

use noesis_rd_core::shader::{AttributeFormat, Paint, Semantic};
use noesis_rd_core::{Shader, ShaderFamily, VertexFormat, VertexLayout};
use smallvec::SmallVec;

/// Source of the WGSL program for each table shader
///
/// Programs expose `vs_main` and `fs_main` and follow the bind group layout
/// described at the top of this module.
pub trait ShaderSource {
    fn wgsl(&self, shader: Shader) -> Cow<'static, str>;
}

/// Programs generated from each shader's family, paint and vertex format
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneratedShaders;

impl ShaderSource for GeneratedShaders {
    fn wgsl(&self, shader: Shader) -> Cow<'static, str> {
        Cow::Owned(generate(shader))
    }
}

/// Compiled modules, built on first use
pub struct ShaderLibrary {
    source: Box<dyn ShaderSource>,
    modules: Vec<Option<wgpu::ShaderModule>>,
}

impl ShaderLibrary {
    pub fn new(source: Box<dyn ShaderSource>) -> Self {
        Self {
            source,
            modules: (0..Shader::COUNT).map(|_| None).collect(),
        }
    }

    pub fn module(&mut self, device: &wgpu::Device, shader: Shader) -> &wgpu::ShaderModule {
        let source = &self.source;
        self.modules[shader.index()].get_or_insert_with(|| {
            tracing::debug!("compiling shader {}", shader.name());
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.name()),
                source: wgpu::ShaderSource::Wgsl(source.wgsl(shader)),
            })
        })
    }
}

/// Map a table attribute format to the wgpu vertex format
pub fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        AttributeFormat::Unorm16x4 => wgpu::VertexFormat::Unorm16x4,
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
    }
}

pub fn vertex_attributes(layout: &VertexLayout) -> SmallVec<[wgpu::VertexAttribute; 6]> {
    layout
        .attributes
        .iter()
        .map(|attribute| wgpu::VertexAttribute {
            format: vertex_format(attribute.format),
            offset: attribute.offset as u64,
            shader_location: attribute.location,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed programs
// ─────────────────────────────────────────────────────────────────────────────

/// Full-screen triangle writing transparent black, for tile clears
pub const CLEAR_SHADER: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.0);
}
"#;

/// Full-screen triangle averaging the samples of a multisampled color texture
pub const RESOLVE_SHADER: &str = r#"
@group(0) @binding(0) var color_tex: texture_multisampled_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let coord = vec2<i32>(position.xy);
    let samples = i32(textureNumSamples(color_tex));
    var sum = vec4<f32>(0.0);
    for (var i = 0; i < samples; i += 1) {
        sum += textureLoad(color_tex, coord, i);
    }
    return sum / f32(samples);
}
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Generated programs
// ─────────────────────────────────────────────────────────────────────────────

const BINDINGS: &str = r#"
struct VertexConstants {
    proj: mat4x4<f32>,
}

struct TexDimensions {
    size: vec4<f32>,
}

struct PixelConstants {
    data: array<vec4<f32>, 3>,
}

struct EffectConstants {
    data: array<vec4<f32>, 4>,
}

@group(0) @binding(0) var<uniform> vertex_cb: VertexConstants;
@group(0) @binding(1) var<uniform> tex_dims: TexDimensions;
@group(0) @binding(2) var<uniform> pixel_cb: PixelConstants;
@group(0) @binding(3) var<uniform> effect_cb: EffectConstants;
@group(0) @binding(4) var pattern_tex: texture_2d<f32>;
@group(0) @binding(5) var pattern_smp: sampler;
@group(0) @binding(6) var ramps_tex: texture_2d<f32>;
@group(0) @binding(7) var ramps_smp: sampler;
@group(0) @binding(8) var image_tex: texture_2d<f32>;
@group(0) @binding(9) var image_smp: sampler;
@group(0) @binding(10) var glyphs_tex: texture_2d<f32>;
@group(0) @binding(11) var glyphs_smp: sampler;
@group(0) @binding(12) var shadow_tex: texture_2d<f32>;
@group(0) @binding(13) var shadow_smp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv0: vec2<f32>,
    @location(2) uv1: vec2<f32>,
    @location(3) rect: vec4<f32>,
    @location(4) coverage: f32,
}
"#;

/// Separable gaussian over `TAPS` texels, clamped to `rect`
const BLUR_FN: &str = r#"
fn blur(tex: texture_2d<f32>, smp: sampler, uv: vec2<f32>, dir: vec2<f32>, rect: vec4<f32>) -> vec4<f32> {
    let radius = TAPS / 2;
    let sigma = f32(TAPS) / 6.0;
    var sum = vec4<f32>(0.0);
    var total = 0.0;
    for (var i = -radius; i <= radius; i += 1) {
        let x = f32(i);
        let w = exp(-0.5 * x * x / (sigma * sigma));
        let p = clamp(uv + dir * x, rect.xy, rect.zw);
        sum += textureSampleLevel(tex, smp, p, 0.0) * w;
        total += w;
    }
    return sum / total;
}

fn blur_spread() -> f32 {
    return select(1.0, effect_cb.data[1].z, effect_cb.data[1].z > 0.0);
}
"#;

fn wgsl_type(format: AttributeFormat) -> &'static str {
    match format {
        AttributeFormat::Float32x2 => "vec2<f32>",
        AttributeFormat::Unorm8x4 | AttributeFormat::Unorm16x4 => "vec4<f32>",
        AttributeFormat::Float32 => "f32",
    }
}

fn field_name(semantic: Semantic) -> &'static str {
    match semantic {
        Semantic::Position => "pos",
        Semantic::Color => "color",
        Semantic::Tex0 => "uv0",
        Semantic::Tex1 => "uv1",
        Semantic::Tex2 => "rect",
        Semantic::Coverage => "coverage",
    }
}

fn vertex_stage(format: VertexFormat) -> String {
    let layout = format.layout();
    let mut src = String::from("struct VertexInput {\n");
    for attribute in &layout.attributes {
        let _ = writeln!(
            src,
            "    @location({}) {}: {},",
            attribute.location,
            field_name(attribute.semantic),
            wgsl_type(attribute.format)
        );
    }
    src.push_str("}\n\n");

    let has = |flag| format.contains(flag);
    let color = if has(VertexFormat::COLOR) { "in.color" } else { "vec4<f32>(1.0)" };
    let uv0 = if has(VertexFormat::TEX0) { "in.uv0" } else { "vec2<f32>(0.0)" };
    let uv1 = if has(VertexFormat::TEX1) { "in.uv1" } else { "vec2<f32>(0.0)" };
    let rect = if has(VertexFormat::TEX2) {
        "in.rect"
    } else if has(VertexFormat::SDF) {
        // glyph texel coordinates, differentiated by the pixel stage
        "vec4<f32>(in.uv1 * tex_dims.size.xy, 0.0, 0.0)"
    } else {
        "vec4<f32>(0.0, 0.0, 1.0, 1.0)"
    };
    let coverage = if has(VertexFormat::COVERAGE) { "in.coverage" } else { "1.0" };

    let _ = write!(
        src,
        r#"@vertex
fn vs_main(in: VertexInput) -> VertexOutput {{
    var out: VertexOutput;
    out.position = vec4<f32>(in.pos, 0.0, 1.0) * vertex_cb.proj;
    out.color = {color};
    out.uv0 = {uv0};
    out.uv1 = {uv1};
    out.rect = {rect};
    out.coverage = {coverage};
    return out;
}}
"#
    );
    src
}

fn paint_expr(paint: Paint) -> &'static str {
    match paint {
        Paint::Solid => "    let paint = in.color;\n",
        Paint::Linear => {
            "    let paint = textureSampleLevel(ramps_tex, ramps_smp, in.uv0, 0.0) * pixel_cb.data[0].x;\n"
        }
        Paint::Radial => {
            r#"    let g0 = pixel_cb.data[0];
    let g1 = pixel_cb.data[1];
    let dd = g1.x * in.uv0.x - g1.y * in.uv0.y;
    let u = g0.x * in.uv0.x + g0.y * in.uv0.y
        + g0.z * sqrt(max(in.uv0.x * in.uv0.x + in.uv0.y * in.uv0.y - dd * dd, 0.0));
    let paint = textureSampleLevel(ramps_tex, ramps_smp, vec2<f32>(u, g1.w), 0.0) * pixel_cb.data[2].x;
"#
        }
        Paint::Pattern => {
            "    let paint = textureSampleLevel(pattern_tex, pattern_smp, in.uv0, 0.0) * pixel_cb.data[0].x;\n"
        }
    }
}

fn pixel_body(shader: Shader) -> String {
    let paint = shader.paint().map(paint_expr).unwrap_or("");
    let body = match shader.family() {
        ShaderFamily::Rgba => "    return pixel_cb.data[0];\n",
        ShaderFamily::Mask => "    return vec4<f32>(1.0);\n",
        ShaderFamily::Path => "    return paint;\n",
        ShaderFamily::PathAa => "    return paint * in.coverage;\n",
        ShaderFamily::Sdf | ShaderFamily::SdfLcd => {
            r#"    let d = textureSampleLevel(glyphs_tex, glyphs_smp, in.uv1, 0.0).r;
    let w = max(0.125 * length(fwidth(in.rect.xy)), 1e-4);
    return paint * smoothstep(0.5 - w, 0.5 + w, d);
"#
        }
        ShaderFamily::ImageOpacity => {
            "    return textureSampleLevel(image_tex, image_smp, in.uv1, 0.0) * paint.a;\n"
        }
        ShaderFamily::ImageShadowV => {
            r#"    let dir = vec2<f32>(0.0, tex_dims.size.w) * blur_spread();
    let a = blur(image_tex, image_smp, in.uv1, dir, in.rect).a;
    return vec4<f32>(0.0, 0.0, 0.0, a);
"#
        }
        ShaderFamily::ImageShadowH => {
            r#"    let dir = vec2<f32>(tex_dims.size.z, 0.0) * blur_spread();
    let offset = effect_cb.data[1].xy * tex_dims.size.zw;
    let a = blur(shadow_tex, shadow_smp, in.uv1 - offset, dir, in.rect).a;
    let shadow = effect_cb.data[0] * a;
    let image = textureSampleLevel(image_tex, image_smp, in.uv1, 0.0);
    return (image + shadow * (1.0 - image.a)) * paint.a;
"#
        }
        ShaderFamily::ImageBlurV => {
            r#"    let dir = vec2<f32>(0.0, tex_dims.size.w) * blur_spread();
    return blur(image_tex, image_smp, in.uv1, dir, in.rect);
"#
        }
        ShaderFamily::ImageBlurH => {
            r#"    let dir = vec2<f32>(tex_dims.size.z, 0.0) * blur_spread();
    return blur(image_tex, image_smp, in.uv1, dir, in.rect) * paint.a;
"#
        }
    };
    format!("@fragment\nfn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{\n{paint}{body}}}\n")
}

/// WGSL program for a table shader
pub fn generate(shader: Shader) -> String {
    let mut src = format!("// {}\n", shader.name());
    src.push_str(BINDINGS);
    if let Some(taps) = shader.kernel_taps() {
        let _ = writeln!(src, "\nconst TAPS: i32 = {taps};");
        src.push_str(BLUR_FN);
    }
    src.push('\n');
    src.push_str(&vertex_stage(shader.format()));
    src.push('\n');
    src.push_str(&pixel_body(shader));
    src
}
