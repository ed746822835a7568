use wgpu::naga::ShaderStage;

use crate::compile::{compile_module, inject_prelude, ShaderLibrary};
use crate::error::SetupError;
use crate::kernel::GaussianKernel;
use crate::pipeline::{ProgramKind, RenderTarget};

use super::context::OFFSCREEN_FORMAT;
use super::quad::FullScreenQuad;
use super::uniforms::direction_layout;

/// One linked program, built for both colour formats it may render into.
struct FilterProgram {
    offscreen: wgpu::RenderPipeline,
    visible: wgpu::RenderPipeline,
}

/// Every fragment program, compiled and linked at start-up.
pub(crate) struct FilterProgramSet {
    texture_layout: wgpu::BindGroupLayout,
    direction_layout: wgpu::BindGroupLayout,
    /// Indexed by [`program_index`], in [`ProgramKind::ALL`] order.
    programs: Vec<FilterProgram>,
}

impl FilterProgramSet {
    pub(crate) fn build(
        device: &wgpu::Device,
        library: &ShaderLibrary,
        kernel: &GaussianKernel,
        visible_format: wgpu::TextureFormat,
    ) -> Result<Self, SetupError> {
        let texture_layout = texture_layout(device);
        let direction_layout = direction_layout(device);
        let prelude = kernel.glsl_prelude();

        let vertex_source = inject_prelude(&library.vertex_source()?, &prelude);
        let vertex_module =
            compile_module(device, "full-screen quad", ShaderStage::Vertex, vertex_source)?;

        let sampled_only = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sampled program layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });
        let directional = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("directional program layout"),
            bind_group_layouts: &[&texture_layout, &direction_layout],
            push_constant_ranges: &[],
        });

        let build = |program: ProgramKind| -> Result<FilterProgram, SetupError> {
            let fragment_source = inject_prelude(&library.fragment_source(program)?, &prelude);
            let fragment_module = compile_module(
                device,
                program.label(),
                ShaderStage::Fragment,
                fragment_source,
            )?;
            let layout = if program.uses_direction() {
                &directional
            } else {
                &sampled_only
            };
            let offscreen = link(
                device,
                program,
                layout,
                &vertex_module,
                &fragment_module,
                OFFSCREEN_FORMAT,
            )?;
            let visible = link(
                device,
                program,
                layout,
                &vertex_module,
                &fragment_module,
                visible_format,
            )?;
            Ok(FilterProgram { offscreen, visible })
        };

        let programs = ProgramKind::ALL
            .into_iter()
            .map(build)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            radius = kernel.radius(),
            sigma = kernel.sigma(),
            "filter programs ready"
        );

        Ok(Self {
            texture_layout,
            direction_layout,
            programs,
        })
    }

    pub(crate) fn texture_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_layout
    }

    pub(crate) fn direction_layout(&self) -> &wgpu::BindGroupLayout {
        &self.direction_layout
    }

    pub(crate) fn pipeline(
        &self,
        program: ProgramKind,
        target: RenderTarget,
    ) -> &wgpu::RenderPipeline {
        let program = &self.programs[program_index(program)];
        match target {
            RenderTarget::Surface(_) => &program.offscreen,
            RenderTarget::Visible => &program.visible,
        }
    }
}

fn program_index(program: ProgramKind) -> usize {
    match program {
        ProgramKind::Passthrough => 0,
        ProgramKind::DirectGaussian => 1,
        ProgramKind::Gaussian1d => 2,
        ProgramKind::Gaussian1dBilinear => 3,
    }
}

/// Group 0: the sampled texture and its sampler.
fn texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("source texture layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub(crate) fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &'static str,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Links the two stages into a pipeline; interface mismatches surface here.
fn link(
    device: &wgpu::Device,
    program: ProgramKind,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, SetupError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.label()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[FullScreenQuad::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(SetupError::ProgramBuild {
            program: program.label(),
            stage: "link",
            diagnostic: error.to_string(),
        });
    }
    Ok(pipeline)
}
