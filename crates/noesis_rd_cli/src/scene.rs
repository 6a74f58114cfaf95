//! Scene files for the headless harness
//!
//! ```toml
//! [target]
//! width = 256
//! height = 256
//! samples = 4
//!
//! [[tile]]
//! x = 0
//! y = 0
//! width = 128
//! height = 256
//!
//! [[quad]]
//! rect = [16.0, 16.0, 240.0, 240.0]
//! color = [255, 0, 0, 255]
//! ```
//!
//! Tile rows count from the bottom of the target. Without `[[tile]]` entries
//! the whole target is one tile.

use anyhow::{bail, Context, Result};
use noesis_rd_core::{BlendMode, Tile};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Scene {
    pub target: TargetDesc,
    #[serde(default, rename = "tile")]
    pub tiles: Vec<Tile>,
    #[serde(default, rename = "quad")]
    pub quads: Vec<Quad>,
}

#[derive(Debug, Deserialize)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_samples")]
    pub samples: u32,
}

fn default_samples() -> u32 {
    1
}

/// A solid rectangle in target pixels
#[derive(Debug, Deserialize)]
pub struct Quad {
    /// `[x0, y0, x1, y1]`, y down
    pub rect: [f32; 4],
    /// Premultiplied RGBA
    pub color: [u8; 4],
    #[serde(default)]
    pub blend: QuadBlend,
    /// Clip to the open tile
    #[serde(default = "default_true")]
    pub scissor: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadBlend {
    Src,
    #[default]
    SrcOver,
}

impl From<QuadBlend> for BlendMode {
    fn from(blend: QuadBlend) -> Self {
        match blend {
            QuadBlend::Src => BlendMode::Src,
            QuadBlend::SrcOver => BlendMode::SrcOver,
        }
    }
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Failed to parse scene {}", path.display()))
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let scene: Scene = toml::from_str(source)?;
        scene.validate()?;
        Ok(scene)
    }

    fn validate(&self) -> Result<()> {
        let TargetDesc { width, height, .. } = self.target;
        if width == 0 || height == 0 {
            bail!("target must not be empty, got {}x{}", width, height);
        }
        for tile in &self.tiles {
            let right = tile.x.checked_add(tile.width);
            let top = tile.y.checked_add(tile.height);
            if !matches!((right, top), (Some(r), Some(t)) if r <= width && t <= height) {
                bail!("tile {:?} exceeds the {}x{} target", tile, width, height);
            }
        }
        Ok(())
    }

    /// Tiles to render, the full target when none are listed
    pub fn tiles(&self) -> Vec<Tile> {
        if self.tiles.is_empty() {
            vec![Tile {
                x: 0,
                y: 0,
                width: self.target.width,
                height: self.target.height,
            }]
        } else {
            self.tiles.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scene_covers_the_whole_target() {
        let scene = Scene::from_toml_str(
            r#"
            [target]
            width = 32
            height = 16
            "#,
        )
        .unwrap();
        assert_eq!(scene.target.samples, 1);
        assert!(scene.quads.is_empty());
        assert_eq!(
            scene.tiles(),
            vec![Tile {
                x: 0,
                y: 0,
                width: 32,
                height: 16
            }]
        );
    }

    #[test]
    fn quads_default_to_clipped_src_over() {
        let scene = Scene::from_toml_str(
            r#"
            [target]
            width = 64
            height = 64
            samples = 4

            [[quad]]
            rect = [0.0, 0.0, 8.0, 8.0]
            color = [0, 0, 255, 255]

            [[quad]]
            rect = [4.0, 4.0, 12.0, 12.0]
            color = [0, 128, 0, 128]
            blend = "src"
            scissor = false
            "#,
        )
        .unwrap();
        assert_eq!(scene.quads.len(), 2);
        assert_eq!(scene.quads[0].blend, QuadBlend::SrcOver);
        assert!(scene.quads[0].scissor);
        assert_eq!(BlendMode::from(scene.quads[1].blend), BlendMode::Src);
        assert!(!scene.quads[1].scissor);
    }

    #[test]
    fn out_of_bounds_tiles_are_rejected() {
        let err = Scene::from_toml_str(
            r#"
            [target]
            width = 64
            height = 64

            [[tile]]
            x = 32
            y = 0
            width = 64
            height = 64
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn empty_targets_are_rejected() {
        assert!(Scene::from_toml_str("[target]\nwidth = 0\nheight = 4").is_err());
    }
}
