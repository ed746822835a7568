use std::sync::mpsc;

use anyhow::{anyhow, ensure, Context, Result};
use image::RgbaImage;

use super::surfaces::RenderSurface;

/// Rounds a row length up to the copy alignment `wgpu` requires.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies an RGBA8 texture into host memory and strips the row padding.
pub(crate) fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &RenderSurface,
) -> Result<RgbaImage> {
    let extent = surface.extent;
    ensure!(!extent.is_empty(), "readback size must be positive");

    let padded_row = padded_bytes_per_row(extent.width);
    let tight_row = extent.width as usize * 4;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size: u64::from(padded_row) * u64::from(extent.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &surface.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(extent.height),
            },
        },
        wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .context("failed to wait for readback")?;
    receiver
        .recv()
        .context("map_async callback dropped")?
        .context("failed to map readback buffer")?;

    let data = slice.get_mapped_range();
    let mut tight = Vec::with_capacity(tight_row * extent.height as usize);
    for row in data.chunks_exact(padded_row as usize) {
        tight.extend_from_slice(&row[..tight_row]);
    }
    drop(data);
    staging.unmap();

    RgbaImage::from_raw(extent.width, extent.height, tight)
        .ok_or_else(|| anyhow!("readback produced a short buffer for {extent}"))
}
