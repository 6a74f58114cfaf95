//! Sampler cache keyed by the packed sampler byte

use std::sync::Arc;

use noesis_rd_core::{MinMagFilter, MipFilter, Result, SamplerDesc, SamplerState, StateCache, WrapMode};

/// Address modes for a wrap mode, `(u, v)`
///
/// Clamp-to-zero needs `ADDRESS_MODE_CLAMP_TO_BORDER`; without it the sampler
/// clamps to the edge.
pub fn address_modes(wrap: WrapMode, clamp_to_border: bool) -> (wgpu::AddressMode, wgpu::AddressMode) {
    use wgpu::AddressMode::*;

    match wrap {
        WrapMode::ClampToEdge => (ClampToEdge, ClampToEdge),
        WrapMode::ClampToZero if clamp_to_border => (ClampToBorder, ClampToBorder),
        WrapMode::ClampToZero => (ClampToEdge, ClampToEdge),
        WrapMode::Repeat => (Repeat, Repeat),
        WrapMode::MirrorU => (MirrorRepeat, Repeat),
        WrapMode::MirrorV => (Repeat, MirrorRepeat),
        WrapMode::Mirror => (MirrorRepeat, MirrorRepeat),
    }
}

fn filter_mode(filter: MinMagFilter) -> wgpu::FilterMode {
    match filter {
        MinMagFilter::Nearest => wgpu::FilterMode::Nearest,
        MinMagFilter::Linear => wgpu::FilterMode::Linear,
    }
}

/// Descriptor for a decoded sampler state
pub fn sampler_descriptor(desc: SamplerDesc, clamp_to_border: bool) -> wgpu::SamplerDescriptor<'static> {
    let (address_mode_u, address_mode_v) = address_modes(desc.wrap, clamp_to_border);
    let filter = filter_mode(desc.filter);
    let (mipmap_filter, lod_max_clamp) = match desc.mip {
        // Level 0 only
        MipFilter::Disabled => (wgpu::FilterMode::Nearest, 0.0),
        MipFilter::Nearest => (wgpu::FilterMode::Nearest, 32.0),
        MipFilter::Linear => (wgpu::FilterMode::Linear, 32.0),
    };
    let border_color = (address_mode_u == wgpu::AddressMode::ClampToBorder)
        .then_some(wgpu::SamplerBorderColor::TransparentBlack);

    wgpu::SamplerDescriptor {
        label: Some("noesis sampler"),
        address_mode_u,
        address_mode_v,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        lod_min_clamp: 0.0,
        lod_max_clamp,
        compare: None,
        anisotropy_clamp: 1,
        border_color,
    }
}

pub struct SamplerCache {
    samplers: StateCache<SamplerState, Arc<wgpu::Sampler>>,
    clamp_to_border: bool,
    warned_border: bool,
}

impl SamplerCache {
    pub fn new(features: wgpu::Features) -> Self {
        Self {
            samplers: StateCache::new(),
            clamp_to_border: features.contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER),
            warned_border: false,
        }
    }

    /// Sampler for `state`, failing on bits that name no mode
    pub fn get(&mut self, device: &wgpu::Device, state: SamplerState) -> Result<Arc<wgpu::Sampler>> {
        let clamp_to_border = self.clamp_to_border;
        let warned_border = &mut self.warned_border;

        let sampler = self.samplers.get_or_try_insert_with(state, |state| -> Result<_> {
            let desc = state.decode()?;
            tracing::debug!("new sampler state -> {:?}", state);

            if desc.wrap == WrapMode::ClampToZero && !clamp_to_border && !*warned_border {
                tracing::warn!("clamp-to-zero requested without ADDRESS_MODE_CLAMP_TO_BORDER, clamping to edge");
                *warned_border = true;
            }

            Ok(Arc::new(device.create_sampler(&sampler_descriptor(desc, clamp_to_border))))
        })?;

        Ok(Arc::clone(sampler))
    }

    /// Number of samplers built so far
    pub fn created(&self) -> u64 {
        self.samplers.misses()
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}
