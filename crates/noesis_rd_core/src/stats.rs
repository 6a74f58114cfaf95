//! Device counters

use std::fmt;

use serde::Serialize;

/// Running totals kept by a render device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub frames: u64,
    pub draws: u64,
    pub triangles: u64,

    pub pipelines_created: u64,
    pub resource_sets_created: u64,
    pub samplers_created: u64,

    pub vertex_constant_uploads: u64,
    pub pixel_constant_uploads: u64,
    pub tex_dimension_uploads: u64,
    pub effect_uploads: u64,

    pub vertex_wraps: u64,
    pub index_wraps: u64,

    pub textures_created: u64,
    pub texture_updates: u64,
    pub render_targets_created: u64,
    pub tiles_cleared: u64,
    pub tiles_resolved: u64,
}

impl fmt::Display for DeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames:            {}", self.frames)?;
        writeln!(f, "draws:             {} ({} triangles)", self.draws, self.triangles)?;
        writeln!(
            f,
            "state objects:     {} pipelines, {} resource sets, {} samplers",
            self.pipelines_created, self.resource_sets_created, self.samplers_created
        )?;
        writeln!(
            f,
            "constant uploads:  vertex {}, pixel {}, dimensions {}, effect {}",
            self.vertex_constant_uploads,
            self.pixel_constant_uploads,
            self.tex_dimension_uploads,
            self.effect_uploads
        )?;
        writeln!(
            f,
            "ring wraps:        vertex {}, index {}",
            self.vertex_wraps, self.index_wraps
        )?;
        writeln!(
            f,
            "textures:          {} created, {} updates",
            self.textures_created, self.texture_updates
        )?;
        write!(
            f,
            "render targets:    {} created, {} tiles cleared, {} tiles resolved",
            self.render_targets_created, self.tiles_cleared, self.tiles_resolved
        )
    }
}
