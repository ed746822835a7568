//! `wgpu` implementation of the filter pipeline.
//!
//! - `context` owns instance, adapter, device, and (when windowed) the
//!   presentation surface, and reconfigures it on resize.
//! - `surfaces` allocates the source texture and the two off-screen render
//!   surfaces, rejecting any the device cannot render into or sample.
//! - `programs` compiles the GLSL programs with the kernel prelude and links
//!   one pipeline per program and target format.
//! - `quad` uploads the full-screen quad drawn by every pass.
//! - `uniforms` holds the per-axis direction buffers of the 1-D programs.
//! - `readback` copies a rendered texture back for export.
//! - `state` glues everything together and implements the frame encoder the
//!   orchestrator drives.

mod context;
mod programs;
mod quad;
mod readback;
mod state;
mod surfaces;
mod uniforms;

pub(crate) use context::GpuContext;
pub(crate) use state::GpuState;
