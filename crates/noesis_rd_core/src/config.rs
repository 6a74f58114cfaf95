//! Render device configuration
//!
//! Loaded from TOML (every field optional) and adjustable from the
//! environment at startup:
//!
//! - `NOESIS_RD_VERTEX_BUFFER_KB=1024`
//! - `NOESIS_RD_INDEX_BUFFER_KB=256`

use serde::{Deserialize, Serialize};

/// Default vertex ring size
pub const DEFAULT_VERTEX_BUFFER_SIZE: u32 = 512 * 1024;
/// Default index ring size
pub const DEFAULT_INDEX_BUFFER_SIZE: u32 = 128 * 1024;

const MIN_BUFFER_SIZE: u32 = 4 * 1024;

/// Capabilities reported to the UI engine
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCaps {
    /// Offset in pixels to the center of a pixel
    pub center_pixel_offset: f32,
    /// Colors are blended in linear space
    pub linear_rendering: bool,
    /// Dual-source blending for LCD text is available
    pub subpixel_rendering: bool,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            center_pixel_offset: 0.0,
            linear_rendering: false,
            subpixel_rendering: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Vertex ring capacity in bytes
    pub vertex_buffer_size: u32,
    /// Index ring capacity in bytes
    pub index_buffer_size: u32,
    pub caps: DeviceCaps,
    /// Render target textures are stored bottom-up
    pub flipped_textures: bool,
    /// Name backend objects after their labels
    pub debug_labels: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_size: DEFAULT_VERTEX_BUFFER_SIZE,
            index_buffer_size: DEFAULT_INDEX_BUFFER_SIZE,
            caps: DeviceCaps::default(),
            flipped_textures: false,
            debug_labels: true,
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
}

/// Round up to a 4-byte multiple, at least 4 KiB
fn sanitize_size(bytes: u32) -> u32 {
    bytes.max(MIN_BUFFER_SIZE).saturating_add(3) & !3
}

impl DeviceConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        let config: DeviceConfig = toml::from_str(source)?;
        Ok(config.sanitized())
    }

    /// Apply `NOESIS_RD_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(kb) = env_u32("NOESIS_RD_VERTEX_BUFFER_KB") {
            self.vertex_buffer_size = kb.saturating_mul(1024);
            tracing::info!(
                "render device override: vertex_buffer_size={} KiB",
                kb
            );
        }
        if let Some(kb) = env_u32("NOESIS_RD_INDEX_BUFFER_KB") {
            self.index_buffer_size = kb.saturating_mul(1024);
            tracing::info!("render device override: index_buffer_size={} KiB", kb);
        }
        self.sanitized()
    }

    /// Buffer sizes rounded to valid ring capacities
    pub fn sanitized(mut self) -> Self {
        self.vertex_buffer_size = sanitize_size(self.vertex_buffer_size);
        self.index_buffer_size = sanitize_size(self.index_buffer_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = DeviceConfig::from_toml_str("").unwrap();
        assert_eq!(config, DeviceConfig::default());
        assert_eq!(config.vertex_buffer_size, 512 * 1024);
        assert_eq!(config.index_buffer_size, 128 * 1024);
        assert!(config.debug_labels);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = DeviceConfig::from_toml_str(
            r#"
            index_buffer_size = 65537
            flipped_textures = true

            [caps]
            linear_rendering = true
            "#,
        )
        .unwrap();
        assert_eq!(config.index_buffer_size, 65540);
        assert_eq!(config.vertex_buffer_size, DEFAULT_VERTEX_BUFFER_SIZE);
        assert!(config.flipped_textures);
        assert!(config.caps.linear_rendering);
        assert!(!config.caps.subpixel_rendering);
    }

    #[test]
    fn tiny_buffers_are_raised_to_minimum() {
        let config = DeviceConfig {
            vertex_buffer_size: 10,
            ..DeviceConfig::default()
        }
        .sanitized();
        assert_eq!(config.vertex_buffer_size, 4 * 1024);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(DeviceConfig::from_toml_str("vertex_buffer_size = \"big\"").is_err());
    }
}
