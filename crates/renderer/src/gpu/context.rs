use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::types::{Extent, GpuPowerPreference};

/// Format used for off-screen surfaces and headless export targets.
pub(crate) const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct Presentation {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    presentation: Option<Presentation>,
}

impl GpuContext {
    /// Creates a device able to present to `target`.
    pub(crate) fn windowed<T>(
        target: &T,
        initial_size: Extent,
        gpu_power: GpuPowerPreference,
        vsync: bool,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // SAFETY: the window outlives the surface; `WindowState` drops GPU state first.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = request_adapter(&instance, gpu_power, Some(&surface))?;
        let (device, queue) = request_device(&adapter)?;

        let max_dimension = device.limits().max_texture_dimension_2d;
        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        if width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested window is {width}x{height}"
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        if surface_format.is_srgb() {
            tracing::warn!(
                ?surface_format,
                "no linear (non-sRGB) surface format available; output will be re-encoded"
            );
        }

        let present_mode = choose_present_mode(&surface_caps.present_modes, vsync);
        tracing::debug!(?surface_format, ?present_mode, "configuring window surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            presentation: Some(Presentation { surface, config }),
        })
    }

    /// Creates a device with no presentation surface, for exports.
    pub(crate) fn headless(gpu_power: GpuPowerPreference) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, gpu_power, None)?;
        let (device, queue) = request_device(&adapter)?;
        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            presentation: None,
        })
    }

    /// Format of the target the final pass writes.
    pub(crate) fn visible_format(&self) -> wgpu::TextureFormat {
        self.presentation
            .as_ref()
            .map_or(OFFSCREEN_FORMAT, |presentation| presentation.config.format)
    }

    pub(crate) fn resize(&mut self, new_size: Extent) {
        if new_size.is_empty() {
            return;
        }
        if let Some(presentation) = self.presentation.as_mut() {
            presentation.config.width = new_size.width;
            presentation.config.height = new_size.height;
            presentation
                .surface
                .configure(&self.device, &presentation.config);
        }
    }

    /// Re-applies the current configuration after the surface was lost or outdated.
    pub(crate) fn reconfigure(&self) {
        if let Some(presentation) = self.presentation.as_ref() {
            presentation
                .surface
                .configure(&self.device, &presentation.config);
        }
    }

    pub(crate) fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        match self.presentation.as_ref() {
            Some(presentation) => presentation.surface.get_current_texture(),
            None => Err(wgpu::SurfaceError::Lost),
        }
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_adapter(
    instance: &wgpu::Instance,
    gpu_power: GpuPowerPreference,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter> {
    let power_preference = match gpu_power {
        GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
        GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
    };
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    tracing::info!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );
    Ok(adapter)
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("gblur device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")
}

/// `Fifo` when vsync is requested, otherwise the lowest-latency mode available.
fn choose_present_mode(modes: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    let preferred: &[wgpu::PresentMode] = if vsync {
        &[wgpu::PresentMode::Fifo]
    } else {
        &[wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
    };
    preferred
        .iter()
        .copied()
        .find(|mode| modes.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_selects_fifo() {
        let modes = [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Fifo];
        assert_eq!(choose_present_mode(&modes, true), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn no_vsync_prefers_immediate_then_mailbox() {
        let all = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];
        assert_eq!(choose_present_mode(&all, false), wgpu::PresentMode::Immediate);
        let no_immediate = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Mailbox];
        assert_eq!(
            choose_present_mode(&no_immediate, false),
            wgpu::PresentMode::Mailbox
        );
        assert_eq!(
            choose_present_mode(&[wgpu::PresentMode::Fifo], false),
            wgpu::PresentMode::Fifo
        );
    }
}
