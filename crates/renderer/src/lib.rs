//! Renderer crate for gblur, a GPU Gaussian image blur.
//!
//! The crate loads an image once, then filters it every frame with one of three
//! strategies and presents the result in a window or writes it to disk:
//!
//! ```text
//!   CLI / gblur
//!        │ RendererConfig
//!        ▼
//!   Renderer::run ──▶ SourceImage::open ──▶ FilterPipeline::new(strategy)
//!        │                                         │ encode_frame()
//!        ├─ Window ──▶ WindowState ──▶ GpuState (wgpu) ◀┘
//!        └─ Export ──▶ GpuState (headless) | CpuContext ──▶ PNG
//! ```
//!
//! `FilterPipeline` knows the pass sequence of each strategy and nothing about
//! the graphics API. It drives any [`GraphicsContext`]: the `wgpu` frame
//! encoder, or the CPU reference context used for `--backend cpu` and tests.

mod compile;
mod error;
mod gpu;
mod kernel;
mod pipeline;
mod reference;
mod source;
mod types;
mod window;

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;

pub use error::SetupError;
pub use kernel::{BilinearTap, GaussianKernel, DEFAULT_RADIUS, DEFAULT_SIGMA};
pub use pipeline::{
    Axis, Direction, FilterPipeline, GraphicsContext, Pass, ProgramKind, RenderTarget,
    SurfaceSlot, TextureSource, Viewport,
};
pub use reference::{render_frame, CpuContext};
pub use source::SourceImage;
pub use types::{
    ExportBackend, Extent, FilterStrategy, GpuPowerPreference, OutputMode, ParseStrategyError,
    RendererConfig,
};

use gpu::{GpuContext, GpuState};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
    kernel: GaussianKernel,
}

impl Renderer {
    /// Builds a renderer with the default kernel.
    pub fn new(config: RendererConfig) -> Self {
        Self::with_kernel(config, GaussianKernel::default())
    }

    pub fn with_kernel(config: RendererConfig, kernel: GaussianKernel) -> Self {
        Self { config, kernel }
    }

    /// Loads the image, builds every GPU resource, then either runs the window
    /// loop or exports one frame. Any set-up failure is returned before the
    /// first frame.
    pub fn run(&mut self) -> Result<()> {
        let source = SourceImage::open(&self.config.image_path)?;
        let pipeline = FilterPipeline::new(self.config.strategy, source.extent());
        self.log_cost(&source);

        match self.config.output.clone() {
            OutputMode::Window => window::run(&self.config, &source, pipeline, &self.kernel),
            OutputMode::Export { path, backend } => {
                let frame = self.export_frame(&source, pipeline, backend)?;
                save_png(&frame, &path)?;
                tracing::info!(path = %path.display(), %backend, "exported filtered frame");
                Ok(())
            }
        }
    }

    /// Renders a single frame at image resolution.
    pub fn export_frame(
        &self,
        source: &SourceImage,
        pipeline: FilterPipeline,
        backend: ExportBackend,
    ) -> Result<RgbaImage> {
        match backend {
            ExportBackend::Cpu => Ok(render_frame(
                &pipeline,
                source,
                self.kernel.clone(),
                source.extent(),
            )),
            ExportBackend::Gpu => {
                let context = GpuContext::headless(self.config.gpu_power)?;
                let mut state = GpuState::new(
                    context,
                    source,
                    pipeline,
                    &self.kernel,
                    self.config.shader_dir.as_deref(),
                )?;
                state.render_export()
            }
        }
    }

    fn log_cost(&self, source: &SourceImage) {
        let fetches = match self.config.strategy {
            FilterStrategy::Naive => self.kernel.direct_fetches(),
            FilterStrategy::Separable => self.kernel.separable_fetches(),
            FilterStrategy::SeparableBilinear => self.kernel.bilinear_fetches(),
        };
        tracing::info!(
            strategy = %self.config.strategy,
            image = %source.extent(),
            radius = self.kernel.radius(),
            sigma = self.kernel.sigma(),
            fetches_per_pixel = fetches,
            "filter configured"
        );
    }
}

fn save_png(frame: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    frame
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}
