use std::path::Path;

use anyhow::Result;
use image::RgbaImage;

use crate::compile::ShaderLibrary;
use crate::kernel::GaussianKernel;
use crate::pipeline::{
    Direction, FilterPipeline, GraphicsContext, ProgramKind, RenderTarget, SurfaceSlot,
    TextureSource, Viewport,
};
use crate::source::SourceImage;
use crate::types::Extent;

use super::context::GpuContext;
use super::programs::{texture_bind_group, FilterProgramSet};
use super::quad::FullScreenQuad;
use super::readback::read_rgba8;
use super::surfaces::{
    create_render_surface, create_sampler, upload_source, RenderSurface, RenderSurfacePool,
};
use super::uniforms::DirectionBindings;

/// Everything the frame loop needs, created once before the first frame.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: FilterPipeline,
    programs: FilterProgramSet,
    quad: FullScreenQuad,
    directions: DirectionBindings,
    _source: RenderSurface,
    surfaces: Option<RenderSurfacePool>,
    source_group: wgpu::BindGroup,
    surface_groups: Option<[wgpu::BindGroup; 2]>,
}

impl GpuState {
    pub(crate) fn new(
        context: GpuContext,
        source: &SourceImage,
        pipeline: FilterPipeline,
        kernel: &GaussianKernel,
        shader_dir: Option<&Path>,
    ) -> Result<Self> {
        let device = &context.device;
        let image_extent = source.extent();

        let library = ShaderLibrary::new(shader_dir);
        let programs =
            FilterProgramSet::build(device, &library, kernel, context.visible_format())?;

        let source_texture = upload_source(device, &context.queue, &context.adapter, source)?;
        let surfaces = if pipeline.uses_surfaces() {
            Some(RenderSurfacePool::new(device, &context.adapter, image_extent)?)
        } else {
            None
        };

        let sampler = create_sampler(device);
        let source_group = texture_bind_group(
            device,
            programs.texture_layout(),
            "source image group",
            &source_texture.view,
            &sampler,
        );
        let surface_groups = surfaces.as_ref().map(|pool| {
            SurfaceSlot::ALL.map(|slot| {
                texture_bind_group(
                    device,
                    programs.texture_layout(),
                    slot.label(),
                    &pool.surface(slot).view,
                    &sampler,
                )
            })
        });

        let quad = FullScreenQuad::new(device);
        let directions = DirectionBindings::new(device, programs.direction_layout(), image_extent);

        tracing::info!(
            strategy = %pipeline.strategy(),
            image = %image_extent,
            passes = pipeline.passes().len(),
            "gpu filter pipeline ready"
        );

        Ok(Self {
            context,
            pipeline,
            programs,
            quad,
            directions,
            _source: source_texture,
            surfaces,
            source_group,
            surface_groups,
        })
    }

    pub(crate) fn resize(&mut self, new_size: Extent) {
        self.context.resize(new_size);
    }

    pub(crate) fn reconfigure(&self) {
        self.context.reconfigure();
    }

    /// Renders one frame into the window surface and presents it.
    pub(crate) fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.acquire_frame()?;
        let window = Extent::new(frame.texture.width(), frame.texture.height());
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.encode(&mut encoder, &view, window);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Renders one frame at image resolution off-screen and reads it back.
    pub(crate) fn render_export(&mut self) -> Result<RgbaImage> {
        let extent = self.pipeline.image_extent();
        let target = create_render_surface(
            &self.context.device,
            &self.context.adapter,
            "export target",
            extent,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        )?;

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("export encoder"),
                });
        self.encode(&mut encoder, &target.view, extent);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        read_rgba8(&self.context.device, &self.context.queue, &target)
    }

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        visible: &wgpu::TextureView,
        window: Extent,
    ) {
        let mut frame = FrameEncoder {
            state: self,
            encoder,
            visible,
            bound: BoundState::default(),
        };
        self.pipeline.encode_frame(&mut frame, window);
    }

    fn target_view<'a>(
        &'a self,
        target: RenderTarget,
        visible: &'a wgpu::TextureView,
    ) -> &'a wgpu::TextureView {
        match (target, self.surfaces.as_ref()) {
            (RenderTarget::Surface(slot), Some(pool)) => &pool.surface(slot).view,
            _ => visible,
        }
    }

    fn source_group(&self, source: TextureSource) -> &wgpu::BindGroup {
        match (source, self.surface_groups.as_ref()) {
            (TextureSource::Surface(slot), Some(groups)) => &groups[slot.index()],
            _ => &self.source_group,
        }
    }
}

#[derive(Default)]
struct BoundState {
    target: Option<(RenderTarget, Viewport)>,
    source: Option<TextureSource>,
    program: Option<ProgramKind>,
    direction: Option<Direction>,
}

/// Records one render pass per `draw_quad`, using whatever was bound since the
/// previous draw.
struct FrameEncoder<'a> {
    state: &'a GpuState,
    encoder: &'a mut wgpu::CommandEncoder,
    visible: &'a wgpu::TextureView,
    bound: BoundState,
}

impl GraphicsContext for FrameEncoder<'_> {
    fn bind_target(&mut self, target: RenderTarget, viewport: Viewport) {
        self.bound.target = Some((target, viewport));
    }

    fn bind_source(&mut self, source: TextureSource) {
        self.bound.source = Some(source);
    }

    fn use_program(&mut self, program: ProgramKind) {
        self.bound.program = Some(program);
    }

    fn set_direction(&mut self, direction: Direction) {
        self.bound.direction = Some(direction);
    }

    fn draw_quad(&mut self) {
        let (Some((target, viewport)), Some(source), Some(program)) =
            (self.bound.target, self.bound.source, self.bound.program)
        else {
            tracing::warn!("draw issued before target, source, and program were bound");
            return;
        };
        if viewport.width == 0 || viewport.height == 0 {
            return;
        }

        let state = self.state;
        let view = state.target_view(target, self.visible);
        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(state.programs.pipeline(program, target));
        pass.set_bind_group(0, state.source_group(source), &[]);
        if program.uses_direction() {
            let Some(direction) = self.bound.direction else {
                tracing::warn!(
                    program = program.label(),
                    "1-D program drawn without a direction"
                );
                return;
            };
            pass.set_bind_group(1, state.directions.bind_group(direction), &[]);
        }
        state.quad.draw(&mut pass);
    }
}
