//! CPU implementation of [`GraphicsContext`].
//!
//! `CpuContext` executes the same pass list as the GPU encoder with the same
//! texture semantics: RGBA8 storage that quantises on every write, clamp-to-edge
//! addressing, and bilinear filtering with 8 bits of sub-texel precision. It is
//! used for `--backend cpu` exports and as the ground truth in tests.

use image::RgbaImage;

use crate::kernel::GaussianKernel;
use crate::pipeline::{
    Direction, FilterPipeline, GraphicsContext, ProgramKind, RenderTarget, TextureSource,
    Viewport,
};
use crate::source::SourceImage;
use crate::types::Extent;

const SUBTEXEL_STEPS: f32 = 256.0;

#[derive(Debug, Clone)]
struct Texture {
    extent: Extent,
    texels: Vec<[u8; 4]>,
}

impl Texture {
    fn blank(extent: Extent) -> Self {
        Self {
            extent,
            texels: vec![[0, 0, 0, 0]; extent.area()],
        }
    }

    fn from_source(source: &SourceImage) -> Self {
        let texels = source
            .to_rgba8()
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
            .collect();
        Self {
            extent: source.extent(),
            texels,
        }
    }

    fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, i64::from(self.extent.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.extent.height) - 1) as usize;
        let texel = self.texels[y * self.extent.width as usize + x];
        texel.map(|channel| f32::from(channel) / 255.0)
    }

    /// Linear, clamp-to-edge sample at normalised coordinates.
    fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let x = uv[0] * self.extent.width as f32 - 0.5;
        let y = uv[1] * self.extent.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = quantise_fraction(x - x0);
        let fy = quantise_fraction(y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = lerp(self.texel(x0, y0), self.texel(x0 + 1, y0), fx);
        let bottom = lerp(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), fx);
        lerp(top, bottom, fy)
    }

    fn to_image(&self) -> RgbaImage {
        let raw = self.texels.iter().flatten().copied().collect();
        RgbaImage::from_raw(self.extent.width, self.extent.height, raw)
            .unwrap_or_else(|| RgbaImage::new(self.extent.width, self.extent.height))
    }
}

fn quantise_fraction(fraction: f32) -> f32 {
    (fraction * SUBTEXEL_STEPS).round() / SUBTEXEL_STEPS
}

fn lerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

fn quantise(color: [f32; 4]) -> [u8; 4] {
    color.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn offset(uv: [f32; 2], step: [f32; 2], scale: f32) -> [f32; 2] {
    [uv[0] + step[0] * scale, uv[1] + step[1] * scale]
}

fn accumulate(total: &mut [f32; 4], color: [f32; 4], weight: f32) {
    for (sum, channel) in total.iter_mut().zip(color) {
        *sum += channel * weight;
    }
}

/// Software rendering context with two off-screen surfaces and a visible target.
pub struct CpuContext {
    kernel: GaussianKernel,
    image: Texture,
    surfaces: [Texture; 2],
    visible: Texture,
    target: RenderTarget,
    viewport: Viewport,
    source: TextureSource,
    program: ProgramKind,
    direction: [f32; 2],
}

impl CpuContext {
    pub fn new(source: &SourceImage, kernel: GaussianKernel) -> Self {
        let extent = source.extent();
        Self {
            kernel,
            image: Texture::from_source(source),
            surfaces: [Texture::blank(extent), Texture::blank(extent)],
            visible: Texture::blank(extent),
            target: RenderTarget::Visible,
            viewport: Viewport::covering(extent),
            source: TextureSource::Image,
            program: ProgramKind::Passthrough,
            direction: [0.0, 0.0],
        }
    }

    /// Contents of the visible target after the last frame.
    pub fn visible(&self) -> RgbaImage {
        self.visible.to_image()
    }

    fn source_texture(&self) -> &Texture {
        match self.source {
            TextureSource::Image => &self.image,
            TextureSource::Surface(slot) => &self.surfaces[slot.index()],
        }
    }

    fn target_texture(&mut self) -> &mut Texture {
        match self.target {
            RenderTarget::Surface(slot) => &mut self.surfaces[slot.index()],
            RenderTarget::Visible => &mut self.visible,
        }
    }

    fn shade(&self, source: &Texture, uv: [f32; 2]) -> [f32; 4] {
        match self.program {
            ProgramKind::Passthrough => source.sample(uv),
            ProgramKind::DirectGaussian => {
                let radius = self.kernel.radius() as i32;
                let texel = [
                    1.0 / source.extent.width as f32,
                    1.0 / source.extent.height as f32,
                ];
                let mut total = [0.0; 4];
                let mut weight_sum = 0.0;
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let weight = self.kernel.weight(dx) * self.kernel.weight(dy);
                        let at = [
                            uv[0] + dx as f32 * texel[0],
                            uv[1] + dy as f32 * texel[1],
                        ];
                        accumulate(&mut total, source.sample(at), weight);
                        weight_sum += weight;
                    }
                }
                total.map(|channel| channel / weight_sum)
            }
            ProgramKind::Gaussian1d => {
                let radius = self.kernel.radius() as i32;
                let mut total = [0.0; 4];
                for i in -radius..=radius {
                    let at = offset(uv, self.direction, i as f32);
                    accumulate(&mut total, source.sample(at), self.kernel.weight(i));
                }
                total
            }
            ProgramKind::Gaussian1dBilinear => {
                let taps = self.kernel.bilinear_taps();
                let mut total = [0.0; 4];
                accumulate(&mut total, source.sample(uv), taps[0].weight);
                for tap in &taps[1..] {
                    let ahead = source.sample(offset(uv, self.direction, tap.offset));
                    let behind = source.sample(offset(uv, self.direction, -tap.offset));
                    accumulate(&mut total, ahead, tap.weight);
                    accumulate(&mut total, behind, tap.weight);
                }
                total
            }
        }
    }
}

impl GraphicsContext for CpuContext {
    fn bind_target(&mut self, target: RenderTarget, viewport: Viewport) {
        self.target = target;
        self.viewport = viewport;
        if target == RenderTarget::Visible && self.visible.extent != viewport.extent() {
            self.visible = Texture::blank(viewport.extent());
        }
    }

    fn bind_source(&mut self, source: TextureSource) {
        self.source = source;
    }

    fn use_program(&mut self, program: ProgramKind) {
        self.program = program;
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction.step;
    }

    fn draw_quad(&mut self) {
        let viewport = self.viewport;
        if viewport.width == 0 || viewport.height == 0 {
            return;
        }

        let source = self.source_texture();
        let mut shaded = Vec::with_capacity(viewport.extent().area());
        for py in 0..viewport.height {
            for px in 0..viewport.width {
                let uv = [
                    (px as f32 + 0.5) / viewport.width as f32,
                    (py as f32 + 0.5) / viewport.height as f32,
                ];
                shaded.push(quantise(self.shade(source, uv)));
            }
        }

        let target = self.target_texture();
        let extent = target.extent;
        for (i, color) in shaded.into_iter().enumerate() {
            let x = viewport.x + i as u32 % viewport.width;
            let y = viewport.y + i as u32 / viewport.width;
            if x < extent.width && y < extent.height {
                target.texels[(y * extent.width + x) as usize] = color;
            }
        }
    }
}

/// Renders one frame of `pipeline` on the CPU and returns the visible target.
pub fn render_frame(
    pipeline: &FilterPipeline,
    source: &SourceImage,
    kernel: GaussianKernel,
    window: Extent,
) -> RgbaImage {
    let mut context = CpuContext::new(source, kernel);
    pipeline.encode_frame(&mut context, window);
    context.visible()
}
