use std::path::PathBuf;

use crate::types::Extent;

/// Start-up failures. Every variant is fatal; nothing in the per-frame path
/// produces one.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to decode image at {path}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image at {path} has zero width or height")]
    EmptyImage { path: PathBuf },
    #[error("gaussian kernel of radius {radius} needs a finite positive sigma, got {sigma}")]
    InvalidKernel { radius: u32, sigma: f32 },
    #[error("failed to read {stage} shader source at {path}")]
    ShaderRead {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build {program} program ({stage} stage):\n{diagnostic}")]
    ProgramBuild {
        program: &'static str,
        stage: &'static str,
        diagnostic: String,
    },
    #[error("render surface {label} ({extent}) is incomplete: {reason}")]
    IncompleteSurface {
        label: &'static str,
        extent: Extent,
        reason: String,
    },
}
