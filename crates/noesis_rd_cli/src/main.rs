//! noesis-rd - headless harness for the Noesis render device
//!
//! Renders a TOML scene offscreen and writes the resolved target as a PNG:
//!
//! ```text
//! noesis-rd render --scene scene.toml --out scene.png
//! noesis-rd render --config device.toml --scene scene.toml --out scene.png --stats-json stats.json
//! noesis-rd config --config device.toml
//! ```
//!
//! Set `RUST_LOG=noesis_rd::calls=trace` to log every device call.

mod render;
mod scene;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use noesis_rd_core::{DeviceConfig, RenderDevice, TracingDevice};
use noesis_rd_gpu::{GpuContext, GpuRenderDevice};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use scene::Scene;

#[derive(Parser, Debug)]
#[command(name = "noesis-rd")]
#[command(about = "Headless harness for the Noesis render device")]
#[command(version)]
struct Cli {
    /// Device configuration (TOML, every field optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene offscreen and write it as a PNG
    Render {
        /// Scene file
        #[arg(short, long)]
        scene: PathBuf,

        /// Output image
        #[arg(short, long, default_value = "out.png")]
        out: PathBuf,

        /// Also write device statistics as JSON
        #[arg(long)]
        stats_json: Option<PathBuf>,
    },

    /// Print the effective device configuration
    Config,
}

fn load_config(path: Option<&Path>) -> Result<DeviceConfig> {
    let config = match path {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            DeviceConfig::from_toml_str(&source)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => DeviceConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn render(config: DeviceConfig, scene: &Path, out: &Path, stats_json: Option<&Path>) -> Result<()> {
    let scene = Scene::load(scene)?;
    let context = GpuContext::headless_blocking().context("Failed to create GPU context")?;
    let device = GpuRenderDevice::new(context, config).context("Failed to create render device")?;
    let mut device = TracingDevice::new(device);

    let target = render::draw_scene(&mut device, &scene).context("Failed to render scene")?;
    let texture = device.render_target_texture(target)?;
    let pixels = device.inner().read_texture(texture)?;

    let (width, height) = (scene.target.width, scene.target.height);
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .context("Readback size does not match the target")?;
    image
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    tracing::info!("wrote {}", out.display());

    let stats = device.stats();
    println!("{}", stats);
    if let Some(path) = stats_json {
        let json = serde_json::to_string_pretty(&stats)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Render {
            scene,
            out,
            stats_json,
        } => render(config, &scene, &out, stats_json.as_deref()),
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
