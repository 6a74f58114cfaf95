//! Drive a device through one offscreen frame of a scene

use noesis_rd_core::{
    fill_indices, fill_vertices, Batch, Hashed, RenderDevice, RenderState, RenderTargetId,
    Result, Shader, StencilMode,
};

use crate::scene::{Quad, Scene};

/// Position (2 x f32) + color (4 x u8)
const VERTEX_STRIDE: u32 = 12;
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Pixel-space projection, row-vector convention, y down
#[rustfmt::skip]
pub fn ortho(width: f32, height: f32) -> [f32; 16] {
    [
        2.0 / width, 0.0, 0.0, 0.0,
        0.0, -2.0 / height, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        -1.0, 1.0, 0.0, 1.0,
    ]
}

fn quad_batch(quad: &Quad, projection: Hashed<[f32; 16]>) -> Batch {
    let state = RenderState::new(
        quad.scissor,
        true,
        quad.blend.into(),
        StencilMode::Disabled,
        false,
    );
    let mut batch = Batch::new(Shader::PathSolid, state);
    batch.num_vertices = 4;
    batch.num_indices = QUAD_INDICES.len() as u32;
    batch.proj_mtx = Some(projection);
    batch
}

fn fill_quad<D: RenderDevice + ?Sized>(device: &mut D, quad: &Quad) -> Result<()> {
    let [x0, y0, x1, y1] = quad.rect;
    let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];

    fill_vertices(device, 4 * VERTEX_STRIDE, |bytes| {
        for (vertex, (x, y)) in bytes.chunks_exact_mut(VERTEX_STRIDE as usize).zip(corners) {
            vertex[0..4].copy_from_slice(&x.to_le_bytes());
            vertex[4..8].copy_from_slice(&y.to_le_bytes());
            vertex[8..12].copy_from_slice(&quad.color);
        }
    })?;

    fill_indices(device, QUAD_INDICES.len() as u32 * 2, |bytes| {
        for (slot, index) in bytes.chunks_exact_mut(2).zip(QUAD_INDICES) {
            slot.copy_from_slice(&index.to_le_bytes());
        }
    })
}

/// Render every quad into every tile of a fresh target and resolve it
///
/// The target is left alive so its texture can be read back.
pub fn draw_scene<D: RenderDevice + ?Sized>(device: &mut D, scene: &Scene) -> Result<RenderTargetId> {
    let (width, height) = (scene.target.width, scene.target.height);
    let target = device.create_render_target("scene", width, height, scene.target.samples)?;
    // One projection for the whole scene, uploaded once
    let projection = Hashed::new(ortho(width as f32, height as f32), 1);
    let tiles = scene.tiles();

    device.begin_render(true)?;
    device.set_render_target(target)?;
    for tile in &tiles {
        device.begin_tile(*tile, width, height)?;
        for quad in &scene.quads {
            fill_quad(device, quad)?;
            device.draw_batch(&quad_batch(quad, projection))?;
        }
        device.end_tile()?;
    }
    device.resolve_render_target(target, &tiles)?;
    device.end_render()?;

    tracing::info!(
        "rendered {} quads into {} tiles of {}x{} ({}x MSAA)",
        scene.quads.len(),
        tiles.len(),
        width,
        height,
        scene.target.samples
    );
    Ok(target)
}
