use anyhow::{Context, Result};
use renderer::{OutputMode, Renderer, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{self, FileConfig};

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let file = config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let config = build_config(cli, file);
    tracing::info!(
        image = %config.image_path.display(),
        strategy = %config.strategy,
        "starting gblur"
    );
    Renderer::new(config).run()
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Command-line flags override the config file, which overrides the defaults.
fn build_config(cli: Cli, file: FileConfig) -> RendererConfig {
    let defaults = RendererConfig::default();

    let output = match cli.export {
        Some(path) => OutputMode::Export {
            path,
            backend: cli.backend.or(file.export.backend).unwrap_or_default(),
        },
        None => OutputMode::Window,
    };

    RendererConfig {
        image_path: cli.image,
        strategy: cli.strategy,
        window_size: cli.size.or(file.window.size).unwrap_or(defaults.window_size),
        window_title: file.window.title.unwrap_or(defaults.window_title),
        shader_dir: cli.shader_dir.or(file.shaders.dir),
        gpu_power: cli.power.or(file.gpu.power).unwrap_or(defaults.gpu_power),
        vsync: !cli.no_vsync && file.window.vsync.unwrap_or(defaults.vsync),
        output,
    }
}
