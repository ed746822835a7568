use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::pipeline::{Axis, Direction};
use crate::types::Extent;

/// std140 image of the `BlurDirection` block: one `vec2` padded to 16 bytes.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DirectionUniform {
    pub texel_step: [f32; 2],
    pub _padding: [f32; 2],
}

unsafe impl Zeroable for DirectionUniform {}
unsafe impl Pod for DirectionUniform {}

impl From<Direction> for DirectionUniform {
    fn from(direction: Direction) -> Self {
        Self {
            texel_step: direction.step,
            _padding: [0.0; 2],
        }
    }
}

pub(crate) fn direction_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("direction layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(
                    std::mem::size_of::<DirectionUniform>() as u64,
                ),
            },
            count: None,
        }],
    })
}

/// One immutable uniform buffer per axis.
///
/// The step only depends on the image extent, so both are written once at
/// start-up and each 1-D pass binds the group for its axis. No buffer is
/// rewritten between passes of the same command encoder.
pub(crate) struct DirectionBindings {
    groups: [(Direction, wgpu::BindGroup); 2],
    _buffers: [wgpu::Buffer; 2],
}

impl DirectionBindings {
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        image_extent: Extent,
    ) -> Self {
        let build = |axis: Axis| {
            let direction = Direction::texel_step(axis, image_extent);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(axis_label(axis)),
                contents: bytemuck::bytes_of(&DirectionUniform::from(direction)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(axis_label(axis)),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (direction, group, buffer)
        };

        let (vertical, vertical_group, vertical_buffer) = build(Axis::Vertical);
        let (horizontal, horizontal_group, horizontal_buffer) = build(Axis::Horizontal);
        Self {
            groups: [(vertical, vertical_group), (horizontal, horizontal_group)],
            _buffers: [vertical_buffer, horizontal_buffer],
        }
    }

    pub(crate) fn bind_group(&self, direction: Direction) -> &wgpu::BindGroup {
        let (stored, group) = match direction.axis {
            Axis::Vertical => &self.groups[0],
            Axis::Horizontal => &self.groups[1],
        };
        debug_assert_eq!(*stored, direction, "direction differs from the uploaded step");
        group
    }
}

fn axis_label(axis: Axis) -> &'static str {
    match axis {
        Axis::Vertical => "vertical direction",
        Axis::Horizontal => "horizontal direction",
    }
}
