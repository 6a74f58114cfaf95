//! GPU integration tests
//!
//! Each test returns early when no adapter is available.

use std::sync::Arc;

use noesis_rd_core::*;
use noesis_rd_gpu::{GpuContext, GpuRenderDevice};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn create_test_context() -> Option<GpuContext> {
    GpuContext::headless().await.ok()
}

fn create_test_device() -> Option<GpuRenderDevice> {
    let context = pollster::block_on(create_test_context())?;
    GpuRenderDevice::new(context, DeviceConfig::default()).ok()
}

/// Pixel-space projection for a `width` x `height` target, row-vector convention
#[rustfmt::skip]
fn ortho(width: f32, height: f32) -> [f32; 16] {
    [
        2.0 / width, 0.0, 0.0, 0.0,
        0.0, -2.0 / height, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        -1.0, 1.0, 0.0, 1.0,
    ]
}

/// Write a solid-colored quad (position + color vertices) and its indices
fn fill_quad<D: RenderDevice>(device: &mut D, rect: [f32; 4], rgba: [u8; 4]) {
    let [x0, y0, x1, y1] = rect;
    let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];

    fill_vertices(device, 4 * 12, |bytes| {
        for (vertex, (x, y)) in bytes.chunks_exact_mut(12).zip(corners) {
            vertex[0..4].copy_from_slice(&x.to_le_bytes());
            vertex[4..8].copy_from_slice(&y.to_le_bytes());
            vertex[8..12].copy_from_slice(&rgba);
        }
    })
    .unwrap();

    fill_indices(device, 6 * 2, |bytes| {
        for (slot, index) in bytes.chunks_exact_mut(2).zip([0u16, 1, 2, 0, 2, 3]) {
            slot.copy_from_slice(&index.to_le_bytes());
        }
    })
    .unwrap();
}

fn solid_batch(size: f32, stencil_ref: u8) -> Batch {
    let state = RenderState::new(false, true, BlendMode::SrcOver, StencilMode::Disabled, false);
    let mut batch = Batch::new(Shader::PathSolid, state);
    batch.stencil_ref = stencil_ref;
    batch.num_vertices = 4;
    batch.num_indices = 6;
    batch.proj_mtx = Some(Hashed::new(ortho(size, size), 1));
    batch
}

fn pixel(pixels: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let at = ((y * width + x) * 4) as usize;
    [pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]]
}

// ─────────────────────────────────────────────────────────────────────────────
// Textures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_update_reads_back_opaque_white() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let texture = device
        .create_texture("white", 64, 64, 1, TextureFormat::Rgba8, None)
        .unwrap();
    device
        .update_texture(texture, 0, TextureRegion::new(0, 0, 64, 64), &[0xFF; 64 * 64 * 4])
        .unwrap();

    let pixels = device.read_texture(texture).unwrap();
    assert_eq!(pixels.len(), 64 * 64 * 4);
    assert!(pixels.iter().all(|&b| b == 0xFF));
    assert_eq!(device.stats().texture_updates, 1);
}

#[test]
fn partial_update_keeps_the_rest_of_the_shadow() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let texture = device
        .create_texture("glyphs", 8, 4, 1, TextureFormat::R8, Some(&[7; 32]))
        .unwrap();
    device
        .update_texture(texture, 0, TextureRegion::new(2, 1, 3, 2), &[9; 6])
        .unwrap();

    let pixels = device.read_texture(texture).unwrap();
    assert_eq!(pixels[0], 7);
    assert_eq!(pixels[8 + 2], 9);
    assert_eq!(pixels[16 + 4], 9);
    assert_eq!(pixels[16 + 5], 7);
}

#[test]
fn texture_errors_leave_no_texture_behind() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    assert!(matches!(
        device.create_texture("mips", 16, 16, 4, TextureFormat::Rgba8, None),
        Err(RenderError::UnsupportedMipLevels(4))
    ));
    assert!(matches!(
        device.create_texture("short", 4, 4, 1, TextureFormat::Rgba8, Some(&[0; 10])),
        Err(RenderError::DataSizeMismatch { expected: 64, actual: 10 })
    ));

    let texture = device
        .create_texture("ok", 4, 4, 1, TextureFormat::Rgba8, None)
        .unwrap();
    assert!(matches!(
        device.update_texture(texture, 1, TextureRegion::new(0, 0, 1, 1), &[0; 4]),
        Err(RenderError::InvalidMipLevel { level: 1, .. })
    ));
    assert!(matches!(
        device.update_texture(texture, 0, TextureRegion::new(3, 3, 2, 2), &[0; 16]),
        Err(RenderError::UpdateOutOfBounds { .. })
    ));
    assert_eq!(device.stats().textures_created, 1);

    device.drop_texture(texture).unwrap();
    assert!(matches!(
        device.texture_info(texture),
        Err(RenderError::UnknownTexture(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Batches
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stencil_ref_splits_pipeline_cache() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("scene", 32, 32, 1).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 32.0, 32.0], [255, 0, 0, 255]);

    device.draw_batch(&solid_batch(32.0, 0)).unwrap();
    assert_eq!(device.pipelines().len(), 1);

    device.draw_batch(&solid_batch(32.0, 0)).unwrap();
    assert_eq!(device.pipelines().len(), 1);

    device.draw_batch(&solid_batch(32.0, 1)).unwrap();
    assert_eq!(device.pipelines().len(), 2);
    device.end_render().unwrap();

    let stats = device.stats();
    assert_eq!(stats.pipelines_created, 2);
    assert_eq!(stats.draws, 3);
    assert_eq!(stats.vertex_constant_uploads, 1);
    assert_eq!(device.resource_set_count(), 1);
}

#[test]
fn solid_quad_covers_the_target() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("scene", 16, 16, 1).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 8.0, 16.0], [0, 255, 0, 255]);
    device.draw_batch(&solid_batch(16.0, 0)).unwrap();
    device.end_render().unwrap();

    let texture = device.render_target_texture(target).unwrap();
    let pixels = device.read_texture(texture).unwrap();
    assert_eq!(pixel(&pixels, 16, 2, 8), [0, 255, 0, 255]);
    assert_eq!(pixel(&pixels, 16, 13, 8), [0, 0, 0, 0]);
}

#[test]
fn invalid_state_fails_before_drawing() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("scene", 8, 8, 1).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 8.0, 8.0], [255, 255, 255, 255]);

    let mut batch = solid_batch(8.0, 0);
    batch.render_state = RenderState::from_bits(3 << 2 | 1 << 1);
    assert!(matches!(
        device.draw_batch(&batch),
        Err(RenderError::InvalidBlendMode(3))
    ));

    let mut batch = solid_batch(8.0, 0);
    let image = device
        .create_texture("image", 2, 2, 1, TextureFormat::Rgba8, None)
        .unwrap();
    batch.set_texture(TextureUnit::Image, TextureSlot::new(image, SamplerState::from_bits(7)));
    assert!(matches!(
        device.draw_batch(&batch),
        Err(RenderError::InvalidWrapMode(7))
    ));

    // The second batch's pipeline is valid and stays cached
    let stats = device.stats();
    assert_eq!(stats.draws, 0);
    assert_eq!(stats.vertex_constant_uploads, 0);
    assert_eq!(device.pipelines().len(), 1);
    assert_eq!(device.resource_set_count(), 0);
}

#[test]
fn index_range_outside_the_ring_fails_before_drawing() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("scene", 8, 8, 1).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 8.0, 8.0], [255, 255, 255, 255]);
    fill_quad(&mut device, [0.0, 0.0, 8.0, 8.0], [255, 255, 255, 255]);

    // Start plus the ring position wraps u32
    let mut batch = solid_batch(8.0, 0);
    batch.start_index = u32::MAX - 2;
    assert!(matches!(device.draw_batch(&batch), Err(RenderError::Backend(_))));

    let mut batch = solid_batch(8.0, 0);
    batch.start_index = 1_000_000;
    assert!(matches!(device.draw_batch(&batch), Err(RenderError::Backend(_))));

    let mut batch = solid_batch(8.0, 0);
    batch.num_indices = u32::MAX;
    assert!(matches!(device.draw_batch(&batch), Err(RenderError::Backend(_))));

    assert_eq!(device.stats().draws, 0);
    device.draw_batch(&solid_batch(8.0, 0)).unwrap();
    device.end_render().unwrap();
    assert_eq!(device.stats().draws, 1);
}

#[test]
fn draws_need_a_frame_or_render_target() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let batch = solid_batch(8.0, 0);
    assert!(matches!(device.draw_batch(&batch), Err(RenderError::NotRendering)));

    device.begin_render(false).unwrap();
    assert!(matches!(device.draw_batch(&batch), Err(RenderError::NoFrameTarget)));
    device.end_render().unwrap();
}

#[test]
fn dropping_a_texture_purges_its_resource_sets() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("scene", 8, 8, 1).unwrap();
    let image = device
        .create_texture("image", 2, 2, 1, TextureFormat::Rgba8, Some(&[255; 16]))
        .unwrap();

    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 8.0, 8.0], [255, 255, 255, 255]);

    let plain = solid_batch(8.0, 0);
    let mut textured = solid_batch(8.0, 0);
    textured.set_texture(TextureUnit::Image, TextureSlot::new(image, SamplerState::default()));
    device.draw_batch(&plain).unwrap();
    device.draw_batch(&textured).unwrap();
    assert_eq!(device.resource_set_count(), 2);

    device.drop_texture(image).unwrap();
    assert_eq!(device.resource_set_count(), 1);
    assert!(matches!(
        device.draw_batch(&textured),
        Err(RenderError::UnknownTexture(_))
    ));
    device.end_render().unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Render targets
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn clone_shares_multisampled_color() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let source = device.create_render_target("source", 64, 64, 4).unwrap();
    let clone = device.clone_render_target("clone", source).unwrap();

    let a = device.render_target(source).unwrap();
    let b = device.render_target(clone).unwrap();
    assert!(Arc::ptr_eq(a.msaa().unwrap(), b.msaa().unwrap()));
    assert!(!Arc::ptr_eq(a.depth(), b.depth()));
    assert!(!Arc::ptr_eq(a.resolve(), b.resolve()));
    assert_ne!(a.texture(), b.texture());
    assert_eq!(b.sample_count(), 4);
}

#[test]
fn sample_counts_are_validated() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    assert!(matches!(
        device.create_render_target("rt", 8, 8, 3),
        Err(RenderError::InvalidSampleCount(3))
    ));
    assert!(matches!(
        device.create_render_target("rt", 0, 8, 1),
        Err(RenderError::EmptyExtent { .. })
    ));
    assert_eq!(device.stats().render_targets_created, 0);
}

#[test]
fn render_target_texture_reports_target_size() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("ui", 40, 20, 1).unwrap();
    let texture = device.render_target_texture(target).unwrap();
    let info = device.texture_info(texture).unwrap();
    assert_eq!((info.width, info.height), (40, 20));
    assert_eq!(info.format, TextureFormat::Rgba8);
    assert!(!info.has_mipmaps());

    device.drop_render_target(target).unwrap();
    assert!(device.texture_info(texture).is_err());
    assert!(matches!(
        device.set_render_target(target),
        Err(RenderError::UnknownRenderTarget(_))
    ));
}

#[test]
fn tiles_need_an_active_target() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let tile = Tile::new(0, 0, 8, 8);
    device.begin_render(true).unwrap();
    assert!(matches!(
        device.begin_tile(tile, 8, 8),
        Err(RenderError::NoActiveRenderTarget)
    ));

    let target = device.create_render_target("rt", 8, 8, 1).unwrap();
    device.set_render_target(target).unwrap();
    device.begin_tile(tile, 8, 8).unwrap();
    assert!(matches!(
        device.begin_tile(tile, 8, 8),
        Err(RenderError::TileAlreadyOpen)
    ));
    device.end_tile().unwrap();
    assert!(matches!(device.end_tile(), Err(RenderError::NoOpenTile)));
    device.end_render().unwrap();

    assert_eq!(device.stats().tiles_cleared, 1);
}

#[test]
fn tile_clear_only_touches_the_flipped_rect() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("rt", 16, 16, 1).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 16.0, 16.0], [255, 255, 255, 255]);
    device.draw_batch(&solid_batch(16.0, 0)).unwrap();

    // Tile rows 0..4 count from the bottom, framebuffer rows 12..16 from the top
    device.begin_tile(Tile::new(0, 0, 16, 4), 16, 16).unwrap();
    device.end_tile().unwrap();
    device.end_render().unwrap();

    let pixels = device
        .read_texture(device.render_target_texture(target).unwrap())
        .unwrap();
    assert_eq!(pixel(&pixels, 16, 8, 14), [0, 0, 0, 0]);
    assert_eq!(pixel(&pixels, 16, 8, 2), [255, 255, 255, 255]);
}

#[test]
fn resolve_averages_samples_into_the_texture() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("msaa", 16, 16, 4).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    fill_quad(&mut device, [0.0, 0.0, 16.0, 16.0], [0, 0, 255, 255]);
    device.draw_batch(&solid_batch(16.0, 0)).unwrap();
    device
        .resolve_render_target(target, &[Tile::new(0, 0, 16, 16)])
        .unwrap();
    device.end_render().unwrap();

    let pixels = device
        .read_texture(device.render_target_texture(target).unwrap())
        .unwrap();
    assert_eq!(pixel(&pixels, 16, 8, 8), [0, 0, 255, 255]);
    assert_eq!(device.stats().tiles_resolved, 1);
}

#[test]
fn resolve_counts_only_tiles_inside_the_target() {
    let Some(mut device) = create_test_device() else {
        return;
    };

    let target = device.create_render_target("msaa", 16, 16, 4).unwrap();
    device.begin_render(true).unwrap();
    device.set_render_target(target).unwrap();
    device
        .resolve_render_target(target, &[Tile::new(0, 0, 8, 8), Tile::new(32, 32, 8, 8)])
        .unwrap();
    device.end_render().unwrap();

    assert_eq!(device.stats().tiles_resolved, 1);
}
