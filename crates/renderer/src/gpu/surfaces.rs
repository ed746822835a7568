use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::SetupError;
use crate::pipeline::SurfaceSlot;
use crate::source::SourceImage;
use crate::types::Extent;

use super::context::OFFSCREEN_FORMAT;

/// A sampled or rendered texture with its default view.
pub(crate) struct RenderSurface {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub extent: Extent,
}

/// The two off-screen colour targets used by the separable strategies.
pub(crate) struct RenderSurfacePool {
    surfaces: [RenderSurface; 2],
}

impl RenderSurfacePool {
    pub(crate) fn new(
        device: &wgpu::Device,
        adapter: &wgpu::Adapter,
        extent: Extent,
    ) -> Result<Self, SetupError> {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let a = create_render_surface(device, adapter, SurfaceSlot::A.label(), extent, usage)?;
        let b = create_render_surface(device, adapter, SurfaceSlot::B.label(), extent, usage)?;
        tracing::debug!(%extent, format = ?OFFSCREEN_FORMAT, "allocated render surfaces");
        Ok(Self { surfaces: [a, b] })
    }

    pub(crate) fn surface(&self, slot: SurfaceSlot) -> &RenderSurface {
        &self.surfaces[slot.index()]
    }
}

/// Creates a colour texture at `extent` and fails if the device cannot render
/// into and sample from it.
pub(crate) fn create_render_surface(
    device: &wgpu::Device,
    adapter: &wgpu::Adapter,
    label: &'static str,
    extent: Extent,
    usage: wgpu::TextureUsages,
) -> Result<RenderSurface, SetupError> {
    check_completeness(device, adapter, label, extent, usage)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let texture = device.create_texture(&texture_descriptor(label, extent, usage));
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(SetupError::IncompleteSurface {
            label,
            extent,
            reason: error.to_string(),
        });
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(RenderSurface {
        texture,
        view,
        extent,
    })
}

/// Uploads the decoded image as an immutable RGBA8 texture.
pub(crate) fn upload_source(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    adapter: &wgpu::Adapter,
    source: &SourceImage,
) -> Result<RenderSurface, SetupError> {
    let label = "source image";
    let extent = source.extent();
    let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
    check_completeness(device, adapter, label, extent, usage)?;

    let texture = device.create_texture_with_data(
        queue,
        &texture_descriptor(label, extent, usage),
        TextureDataOrder::LayerMajor,
        &source.to_rgba8(),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(RenderSurface {
        texture,
        view,
        extent,
    })
}

fn texture_descriptor(
    label: &'static str,
    extent: Extent,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'static> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage,
        view_formats: &[],
    }
}

fn check_completeness(
    device: &wgpu::Device,
    adapter: &wgpu::Adapter,
    label: &'static str,
    extent: Extent,
    usage: wgpu::TextureUsages,
) -> Result<(), SetupError> {
    let incomplete = |reason: String| SetupError::IncompleteSurface {
        label,
        extent,
        reason,
    };

    if extent.is_empty() {
        return Err(incomplete("zero-sized attachment".to_string()));
    }
    let max_dimension = device.limits().max_texture_dimension_2d;
    if extent.width > max_dimension || extent.height > max_dimension {
        return Err(incomplete(format!(
            "exceeds the device limit of {max_dimension} texels per side"
        )));
    }

    let features = adapter.get_texture_format_features(OFFSCREEN_FORMAT);
    if !features.allowed_usages.contains(usage) {
        return Err(incomplete(format!(
            "{OFFSCREEN_FORMAT:?} does not support {usage:?}"
        )));
    }
    if !features
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    {
        return Err(incomplete(format!(
            "{OFFSCREEN_FORMAT:?} is not filterable"
        )));
    }
    Ok(())
}

/// Linear filtering with clamp-to-edge addressing. Sampling beyond the image
/// border repeats the edge texel.
pub(crate) fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("blur sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
