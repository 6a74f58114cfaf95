//! Constant block upload debouncing
//!
//! Four constant blocks feed the shaders. A block is uploaded only when the
//! hash supplied with the batch differs from the hash of the last upload.
//! Planning does not change state; a device commits the plan once the uploads
//! were issued, so a failed draw never suppresses a later upload.

use crate::batch::Batch;

/// Floats in the vertex constant block (projection matrix)
pub const VERTEX_FLOATS: usize = 16;
/// Floats in the pixel constant block (rgba, radial gradient, opacity)
pub const PIXEL_FLOATS: usize = 12;
/// Floats in the texture dimensions block
pub const TEX_DIMENSIONS_FLOATS: usize = 4;
/// Floats in the effect parameter block
pub const EFFECT_FLOATS: usize = 16;

/// A block due for upload, with the hash that identifies it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Upload<const N: usize> {
    pub data: [f32; N],
    pub hash: u32,
}

/// Blocks a batch needs uploaded before its draw
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstantUpdates {
    pub vertex: Option<Upload<VERTEX_FLOATS>>,
    pub pixel: Option<Upload<PIXEL_FLOATS>>,
    pub tex_dimensions: Option<Upload<TEX_DIMENSIONS_FLOATS>>,
    pub effect: Option<Upload<EFFECT_FLOATS>>,
}

impl ConstantUpdates {
    pub fn is_empty(&self) -> bool {
        self.vertex.is_none()
            && self.pixel.is_none()
            && self.tex_dimensions.is_none()
            && self.effect.is_none()
    }
}

/// Hash of the last upload per block, `None` until the first one
#[derive(Clone, Debug, Default)]
pub struct ConstantTracker {
    vertex: Option<u32>,
    pixel: Option<u32>,
    tex_dimensions: Option<u32>,
    effect: Option<u32>,
}

fn changed(last: Option<u32>, hash: u32) -> bool {
    last != Some(hash)
}

/// Row-major to column-major
pub fn transpose(m: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[col * 4 + row] = m[row * 4 + col];
        }
    }
    out
}

impl ConstantTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Work out which blocks `batch` needs uploaded
    ///
    /// `tex_dimensions` is the size of the batch's glyph texture, or of its
    /// image texture when there are no glyphs.
    pub fn plan(&self, batch: &Batch, tex_dimensions: Option<(u32, u32)>) -> ConstantUpdates {
        let mut updates = ConstantUpdates::default();

        if let Some(proj) = &batch.proj_mtx {
            if changed(self.vertex, proj.hash) {
                updates.vertex = Some(Upload {
                    data: transpose(&proj.value),
                    hash: proj.hash,
                });
            }
        }

        if batch.rgba.is_some() || batch.radial_grad.is_some() || batch.opacity.is_some() {
            let hash = batch.rgba.map_or(0, |b| b.hash)
                ^ batch.radial_grad.map_or(0, |b| b.hash)
                ^ batch.opacity.map_or(0, |b| b.hash);
            if changed(self.pixel, hash) {
                let rgba = batch.rgba.iter().flat_map(|b| b.value);
                let radial = batch.radial_grad.iter().flat_map(|b| b.value);
                let opacity = batch.opacity.iter().map(|b| b.value);

                let mut data = [0.0; PIXEL_FLOATS];
                for (slot, value) in data.iter_mut().zip(rgba.chain(radial).chain(opacity)) {
                    *slot = value;
                }
                updates.pixel = Some(Upload { data, hash });
            }
        }

        if let Some((width, height)) = tex_dimensions {
            let hash = (width << 16) | height;
            if changed(self.tex_dimensions, hash) {
                let (w, h) = (width as f32, height as f32);
                updates.tex_dimensions = Some(Upload {
                    data: [w, h, 1.0 / w, 1.0 / h],
                    hash,
                });
            }
        }

        if let Some(effect) = batch.effect() {
            if changed(self.effect, effect.hash) {
                let mut data = [0.0; EFFECT_FLOATS];
                for (slot, value) in data.iter_mut().zip(effect.value.iter()) {
                    *slot = *value;
                }
                updates.effect = Some(Upload {
                    data,
                    hash: effect.hash,
                });
            }
        }

        updates
    }

    /// Record the uploads of a plan as applied
    pub fn commit(&mut self, updates: &ConstantUpdates) {
        if let Some(upload) = &updates.vertex {
            self.vertex = Some(upload.hash);
        }
        if let Some(upload) = &updates.pixel {
            self.pixel = Some(upload.hash);
        }
        if let Some(upload) = &updates.tex_dimensions {
            self.tex_dimensions = Some(upload.hash);
        }
        if let Some(upload) = &updates.effect {
            self.effect = Some(upload.hash);
        }
    }

    /// Forget every uploaded hash, forcing the next batch to upload
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{EffectParams, Hashed};
    use crate::shader::Shader;
    use crate::state::RenderState;

    fn batch_with(proj_hash: u32, rgba_hash: u32) -> Batch {
        let mut batch = Batch::new(Shader::PathSolid, RenderState::default());
        let mut proj = [0.0; 16];
        proj[1] = 2.0;
        batch.proj_mtx = Some(Hashed::new(proj, proj_hash));
        batch.rgba = Some(Hashed::new([1.0, 0.5, 0.25, 1.0], rgba_hash));
        batch
    }

    fn run(tracker: &mut ConstantTracker, batch: &Batch) -> ConstantUpdates {
        let updates = tracker.plan(batch, None);
        tracker.commit(&updates);
        updates
    }

    #[test]
    fn same_projection_uploads_once() {
        let mut tracker = ConstantTracker::new();
        let first = run(&mut tracker, &batch_with(7, 1));
        let second = run(&mut tracker, &batch_with(7, 1));

        let vertex = first.vertex.unwrap();
        // element (row 0, col 1) moves to (row 1, col 0)
        assert_eq!(vertex.data[4], 2.0);
        assert_eq!(vertex.data[1], 0.0);
        assert!(second.vertex.is_none());
        assert!(second.is_empty());
    }

    #[test]
    fn differing_rgba_uploads_every_time() {
        let mut tracker = ConstantTracker::new();
        let first = run(&mut tracker, &batch_with(7, 1));
        let second = run(&mut tracker, &batch_with(7, 2));

        assert_eq!(first.pixel.unwrap().data[..4], [1.0, 0.5, 0.25, 1.0]);
        assert!(second.pixel.is_some());
    }

    #[test]
    fn zero_hash_still_uploads_first_time() {
        let mut tracker = ConstantTracker::new();
        let first = run(&mut tracker, &batch_with(0, 0));
        assert!(first.vertex.is_some());
        assert!(first.pixel.is_some());
    }

    #[test]
    fn plan_without_commit_keeps_state() {
        let tracker = ConstantTracker::new();
        let batch = batch_with(7, 1);
        assert!(tracker.plan(&batch, None).vertex.is_some());
        assert!(tracker.plan(&batch, None).vertex.is_some());
    }

    #[test]
    fn pixel_block_packs_present_values_in_order() {
        let mut tracker = ConstantTracker::new();
        let mut batch = Batch::new(Shader::PathRadial, RenderState::default());
        let grad = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        batch.radial_grad = Some(Hashed::new(grad, 0x10));
        batch.opacity = Some(Hashed::new(0.5, 0x01));

        let pixel = run(&mut tracker, &batch).pixel.unwrap();
        assert_eq!(pixel.hash, 0x11);
        assert_eq!(pixel.data[..8], grad);
        assert_eq!(pixel.data[8], 0.5);
        assert_eq!(pixel.data[9..], [0.0; 3]);
    }

    #[test]
    fn texture_dimensions_follow_size() {
        let mut tracker = ConstantTracker::new();
        let batch = Batch::new(Shader::SdfSolid, RenderState::default());

        let first = tracker.plan(&batch, Some((256, 128)));
        tracker.commit(&first);
        let dims = first.tex_dimensions.unwrap();
        assert_eq!(dims.data, [256.0, 128.0, 1.0 / 256.0, 1.0 / 128.0]);
        assert_eq!(dims.hash, (256 << 16) | 128);

        assert!(tracker.plan(&batch, Some((256, 128))).tex_dimensions.is_none());
        assert!(tracker.plan(&batch, Some((128, 256))).tex_dimensions.is_some());
        assert!(tracker.plan(&batch, None).tex_dimensions.is_none());
    }

    #[test]
    fn effect_block_only_when_declared() {
        let mut tracker = ConstantTracker::new();
        let mut batch = Batch::new(Shader::ImageBlur35V, RenderState::default());
        assert!(run(&mut tracker, &batch).effect.is_none());

        batch.effect_params = Some(Hashed::new(EffectParams::from_slice(&[3.0, 4.0]), 9));
        let effect = run(&mut tracker, &batch).effect.unwrap();
        assert_eq!(effect.data[..2], [3.0, 4.0]);
        assert!(run(&mut tracker, &batch).effect.is_none());
    }
}
