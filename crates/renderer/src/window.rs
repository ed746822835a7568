use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{GpuContext, GpuState};
use crate::kernel::GaussianKernel;
use crate::pipeline::FilterPipeline;
use crate::source::SourceImage;
use crate::types::{Extent, RendererConfig};

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// GPU state plus the window it presents into.
///
/// Field order matters: `gpu` holds a surface created from raw handles of
/// `window` and must drop first.
pub(crate) struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    stats: FrameStats,
}

impl WindowState {
    pub(crate) fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        source: &SourceImage,
        pipeline: FilterPipeline,
        kernel: &GaussianKernel,
    ) -> Result<Self> {
        let size = extent_of(window.inner_size());
        let context = GpuContext::windowed(window.as_ref(), size, config.gpu_power, config.vsync)?;
        let gpu = GpuState::new(
            context,
            source,
            pipeline,
            kernel,
            config.shader_dir.as_deref(),
        )?;
        Ok(Self {
            gpu,
            window,
            stats: FrameStats::new(Instant::now()),
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        tracing::debug!(width = new_size.width, height = new_size.height, "window resized");
        self.gpu.resize(extent_of(new_size));
    }

    pub(crate) fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        if extent_of(self.window.inner_size()).is_empty() {
            return Ok(());
        }
        self.gpu.render()?;
        self.stats.frame_presented(Instant::now());
        Ok(())
    }
}

/// Counts presented frames and reports a rate once per interval.
struct FrameStats {
    window_start: Instant,
    frames: u32,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    fn frame_presented(&mut self, now: Instant) {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= STATS_INTERVAL {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            tracing::debug!(fps = fps.round(), frames = self.frames, "render stats");
            self.frames = 0;
            self.window_start = now;
        }
    }
}

fn extent_of(size: PhysicalSize<u32>) -> Extent {
    Extent::new(size.width, size.height)
}

/// Escape or `e` closes the window.
fn is_exit_key(event: &KeyEvent) -> bool {
    if event.state != ElementState::Pressed {
        return false;
    }
    match &event.logical_key {
        Key::Named(NamedKey::Escape) => true,
        Key::Character(value) => value.as_str().eq_ignore_ascii_case("e"),
        _ => false,
    }
}

/// Opens the window and presents a filtered frame on every redraw until the
/// user closes it.
pub(crate) fn run(
    config: &RendererConfig,
    source: &SourceImage,
    pipeline: FilterPipeline,
    kernel: &GaussianKernel,
) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window_title.as_str())
        .with_inner_size(PhysicalSize::new(
            config.window_size.width,
            config.window_size.height,
        ))
        .build(&event_loop)
        .context("failed to create window")?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config, source, pipeline, kernel)?;
    state.window().request_redraw();

    let mut result = Ok(());
    let run_result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if is_exit_key(&event) {
                            tracing::info!("exit key pressed; closing window");
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(new_size);
                    }
                    WindowEvent::RedrawRequested => match state.render_frame() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            tracing::debug!("surface lost or outdated; reconfiguring");
                            state.gpu.reconfigure();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            tracing::warn!("surface timeout; skipping frame");
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            result = Err(anyhow!("surface out of memory"));
                            elwt.exit();
                        }
                        Err(other) => {
                            tracing::warn!(error = ?other, "surface error; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                state.window().request_redraw();
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stats_reset_after_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);
        for _ in 0..10 {
            stats.frame_presented(start + Duration::from_millis(10));
        }
        assert_eq!(stats.frames, 10);
        stats.frame_presented(start + STATS_INTERVAL);
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.window_start, start + STATS_INTERVAL);
    }

    #[test]
    fn extent_follows_physical_size() {
        assert_eq!(extent_of(PhysicalSize::new(800, 600)), Extent::new(800, 600));
        assert!(extent_of(PhysicalSize::new(0, 600)).is_empty());
    }
}
