//! Binary batch layout
//!
//! A batch crosses the producer boundary as a fixed little-endian header plus a
//! float payload holding the variable constant blocks. The header stores each
//! block as a float index into the payload (`NULL_REF` for absent) followed by
//! the block's hash.
//!
//! ```text
//! offset  size  field
//! 0       1     shader id
//! 1       1     render state
//! 2       1     stencil reference
//! 4       4     vertex byte offset
//! 8       4     vertex count
//! 12      4     start index
//! 16      4     index count
//! 24      80    5 texture slots: u64 handle, u8 sampler, 7 pad
//! 104     12    effect params: ref, float count, hash
//! 116     8     projection matrix: ref, hash
//! 124     8     opacity: ref, hash
//! 132     8     rgba: ref, hash
//! 140     8     radial gradient: ref, hash
//! ```

use crate::batch::{Batch, EffectParams, Hashed, TextureSlot};
use crate::error::{DecodeError, Result};
use crate::handle::{TextureId, WireHandle};
use crate::shader::Shader;
use crate::state::{RenderState, SamplerState};

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 152;

/// Reference value marking an absent constant block
pub const NULL_REF: u32 = u32::MAX;

const SHADER: usize = 0;
const RENDER_STATE: usize = 1;
const STENCIL_REF: usize = 2;
const VERTEX_OFFSET: usize = 4;
const NUM_VERTICES: usize = 8;
const START_INDEX: usize = 12;
const NUM_INDICES: usize = 16;
const SLOTS: usize = 24;
const SLOT_SIZE: usize = 16;
const EFFECT: usize = 104;
const PROJ_MTX: usize = 116;
const OPACITY: usize = 124;
const RGBA: usize = 132;
const RADIAL_GRAD: usize = 140;

const MAX_EFFECT_FLOATS: u32 = 16;

fn read_u32(header: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&header[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(header: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&header[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn write_u32(header: &mut [u8], offset: usize, value: u32) {
    header[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn payload_range<'a>(
    payload: &'a [f32],
    field: &'static str,
    start: u32,
    len: usize,
) -> std::result::Result<&'a [f32], DecodeError> {
    let start = start as usize;
    let end = start.saturating_add(len);
    payload.get(start..end).ok_or(DecodeError::PayloadOutOfRange {
        field,
        start,
        end,
        len: payload.len(),
    })
}

fn read_block<const N: usize>(
    header: &[u8],
    payload: &[f32],
    offset: usize,
    field: &'static str,
) -> std::result::Result<Option<Hashed<[f32; N]>>, DecodeError> {
    let reference = read_u32(header, offset);
    if reference == NULL_REF {
        return Ok(None);
    }
    let mut value = [0.0; N];
    value.copy_from_slice(payload_range(payload, field, reference, N)?);
    Ok(Some(Hashed::new(value, read_u32(header, offset + 4))))
}

/// Decode a batch from its header and float payload
pub fn decode_batch(header: &[u8], payload: &[f32]) -> Result<Batch> {
    if header.len() < HEADER_SIZE {
        return Err(DecodeError::TruncatedHeader {
            expected: HEADER_SIZE,
            actual: header.len(),
        }
        .into());
    }

    let shader = Shader::from_id(header[SHADER])?;
    let mut batch = Batch::new(shader, RenderState::from_bits(header[RENDER_STATE]));
    batch.stencil_ref = header[STENCIL_REF];
    batch.vertex_offset = read_u32(header, VERTEX_OFFSET);
    batch.num_vertices = read_u32(header, NUM_VERTICES);
    batch.start_index = read_u32(header, START_INDEX);
    batch.num_indices = read_u32(header, NUM_INDICES);

    for (i, slot) in batch.textures.iter_mut().enumerate() {
        let offset = SLOTS + i * SLOT_SIZE;
        *slot = TextureSlot {
            texture: TextureId::from_wire(read_u64(header, offset)),
            sampler: SamplerState::from_bits(header[offset + 8]),
        };
    }

    let effect_ref = read_u32(header, EFFECT);
    let effect_size = read_u32(header, EFFECT + 4);
    if effect_size > MAX_EFFECT_FLOATS {
        return Err(DecodeError::EffectParamsTooLarge(effect_size).into());
    }
    if effect_ref != NULL_REF && effect_size != 0 {
        let values = payload_range(payload, "effect_params", effect_ref, effect_size as usize)?;
        batch.effect_params = Some(Hashed::new(
            EffectParams::from_slice(values),
            read_u32(header, EFFECT + 8),
        ));
    }

    batch.proj_mtx = read_block::<16>(header, payload, PROJ_MTX, "proj_mtx")?;
    batch.opacity =
        read_block::<1>(header, payload, OPACITY, "opacity")?.map(|b| Hashed::new(b.value[0], b.hash));
    batch.rgba = read_block::<4>(header, payload, RGBA, "rgba")?;
    batch.radial_grad = read_block::<8>(header, payload, RADIAL_GRAD, "radial_grad")?;

    Ok(batch)
}

fn push_block(
    header: &mut [u8],
    payload: &mut Vec<f32>,
    offset: usize,
    block: Option<(&[f32], u32)>,
) {
    match block {
        Some((values, hash)) => {
            write_u32(header, offset, payload.len() as u32);
            write_u32(header, offset + 4, hash);
            payload.extend_from_slice(values);
        }
        None => {
            write_u32(header, offset, NULL_REF);
            write_u32(header, offset + 4, 0);
        }
    }
}

/// Encode a batch into a header and the float payload it references
pub fn encode_batch(batch: &Batch) -> ([u8; HEADER_SIZE], Vec<f32>) {
    let mut header = [0u8; HEADER_SIZE];
    let mut payload = Vec::new();

    header[SHADER] = batch.shader as u8;
    header[RENDER_STATE] = batch.render_state.bits();
    header[STENCIL_REF] = batch.stencil_ref;
    write_u32(&mut header, VERTEX_OFFSET, batch.vertex_offset);
    write_u32(&mut header, NUM_VERTICES, batch.num_vertices);
    write_u32(&mut header, START_INDEX, batch.start_index);
    write_u32(&mut header, NUM_INDICES, batch.num_indices);

    for (i, slot) in batch.textures.iter().enumerate() {
        let offset = SLOTS + i * SLOT_SIZE;
        let handle = slot.texture.map_or(0, |id| id.to_wire());
        header[offset..offset + 8].copy_from_slice(&handle.to_le_bytes());
        header[offset + 8] = slot.sampler.bits();
    }

    match &batch.effect_params {
        Some(params) if !params.value.is_empty() => {
            write_u32(&mut header, EFFECT, payload.len() as u32);
            write_u32(&mut header, EFFECT + 4, params.value.len() as u32);
            write_u32(&mut header, EFFECT + 8, params.hash);
            payload.extend_from_slice(&params.value);
        }
        _ => {
            write_u32(&mut header, EFFECT, NULL_REF);
        }
    }

    push_block(
        &mut header,
        &mut payload,
        PROJ_MTX,
        batch.proj_mtx.as_ref().map(|b| (&b.value[..], b.hash)),
    );
    push_block(
        &mut header,
        &mut payload,
        OPACITY,
        batch.opacity.as_ref().map(|b| (std::slice::from_ref(&b.value), b.hash)),
    );
    push_block(
        &mut header,
        &mut payload,
        RGBA,
        batch.rgba.as_ref().map(|b| (&b.value[..], b.hash)),
    );
    push_block(
        &mut header,
        &mut payload,
        RADIAL_GRAD,
        batch.radial_grad.as_ref().map(|b| (&b.value[..], b.hash)),
    );

    (header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TextureUnit;
    use crate::error::RenderError;
    use crate::state::{BlendMode, StencilMode};
    use slotmap::SlotMap;

    fn sample_batch() -> Batch {
        let mut arena: SlotMap<TextureId, ()> = SlotMap::with_key();
        let glyphs = arena.insert(());

        let mut batch = Batch::new(
            Shader::SdfSolid,
            RenderState::new(true, true, BlendMode::SrcOver, StencilMode::EqualKeep, false),
        );
        batch.stencil_ref = 3;
        batch.vertex_offset = 96;
        batch.num_vertices = 4;
        batch.start_index = 12;
        batch.num_indices = 6;
        batch.set_texture(
            TextureUnit::Glyphs,
            TextureSlot::new(glyphs, SamplerState::from_bits(0b1000)),
        );
        batch.proj_mtx = Some(Hashed::new([1.0; 16], 0xAB));
        batch.rgba = Some(Hashed::new([0.25, 0.5, 0.75, 1.0], 0xCD));
        batch
    }

    #[test]
    fn header_layout_offsets() {
        let batch = sample_batch();
        let (header, payload) = encode_batch(&batch);

        assert_eq!(header[SHADER], Shader::SdfSolid as u8);
        assert_eq!(read_u32(&header, VERTEX_OFFSET), 96);
        assert_eq!(read_u32(&header, START_INDEX), 12);
        // projection is the first block in the payload, rgba follows it
        assert_eq!(read_u32(&header, PROJ_MTX), 0);
        assert_eq!(read_u32(&header, RGBA), 16);
        assert_eq!(read_u32(&header, OPACITY), NULL_REF);
        assert_eq!(payload.len(), 20);
    }

    #[test]
    fn decode_reads_what_encode_wrote() {
        let batch = sample_batch();
        let (header, payload) = encode_batch(&batch);
        assert_eq!(decode_batch(&header, &payload).unwrap(), batch);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = decode_batch(&[0u8; 40], &[]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Decode(DecodeError::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: 40
            })
        ));
    }

    #[test]
    fn reference_past_payload_is_rejected() {
        let batch = sample_batch();
        let (header, payload) = encode_batch(&batch);
        let err = decode_batch(&header, &payload[..10]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Decode(DecodeError::PayloadOutOfRange {
                field: "proj_mtx",
                ..
            })
        ));
    }

    #[test]
    fn unknown_shader_is_rejected() {
        let (mut header, payload) = encode_batch(&sample_batch());
        header[SHADER] = 200;
        assert!(matches!(
            decode_batch(&header, &payload),
            Err(RenderError::InvalidShader(200))
        ));
    }

    #[test]
    fn oversized_effect_block_is_rejected() {
        let (mut header, payload) = encode_batch(&sample_batch());
        write_u32(&mut header, EFFECT, 0);
        write_u32(&mut header, EFFECT + 4, 17);
        assert!(matches!(
            decode_batch(&header, &payload),
            Err(RenderError::Decode(DecodeError::EffectParamsTooLarge(17)))
        ));
    }
}
