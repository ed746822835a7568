//! Pass sequencing for the three filtering strategies.
//!
//! `FilterPipeline` is built once from the selected [`FilterStrategy`] and the
//! source image extent. Each frame it replays its fixed pass list against a
//! [`GraphicsContext`]: the `wgpu` frame encoder in production, the CPU
//! reference context or a recording double in tests.
//!
//! ```text
//!   Naive:              image ──DirectGaussian──────────────▶ visible
//!   Separable:          image ──Passthrough──▶ A ──1D(vert)──▶ B ──1D(horiz)──▶ visible
//!   SeparableBilinear:  image ──Passthrough──▶ A ──1D'(vert)─▶ B ──1D'(horiz)─▶ visible
//! ```
//!
//! Off-screen passes always run at image resolution; only the pass that writes
//! the visible target uses the window extent, which is read fresh every frame.

use crate::types::{Extent, FilterStrategy};

/// One of the two off-screen render surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceSlot {
    A,
    B,
}

impl SurfaceSlot {
    pub const ALL: [SurfaceSlot; 2] = [SurfaceSlot::A, SurfaceSlot::B];

    pub fn index(self) -> usize {
        match self {
            SurfaceSlot::A => 0,
            SurfaceSlot::B => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SurfaceSlot::A => "surface A",
            SurfaceSlot::B => "surface B",
        }
    }
}

/// Destination of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Surface(SurfaceSlot),
    /// The window surface, or the export target when running headless.
    Visible,
}

/// Texture sampled by a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// The uploaded source image.
    Image,
    Surface(SurfaceSlot),
}

impl TextureSource {
    fn reads(self, target: RenderTarget) -> bool {
        matches!(
            (self, target),
            (TextureSource::Surface(read), RenderTarget::Surface(written)) if read == written
        )
    }
}

/// Fragment programs available to a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Passthrough,
    DirectGaussian,
    Gaussian1d,
    Gaussian1dBilinear,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 4] = [
        ProgramKind::Passthrough,
        ProgramKind::DirectGaussian,
        ProgramKind::Gaussian1d,
        ProgramKind::Gaussian1dBilinear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::Passthrough => "passthrough",
            ProgramKind::DirectGaussian => "direct gaussian",
            ProgramKind::Gaussian1d => "1-D gaussian",
            ProgramKind::Gaussian1dBilinear => "1-D bilinear gaussian",
        }
    }

    /// Whether the program reads the direction uniform.
    pub fn uses_direction(self) -> bool {
        matches!(
            self,
            ProgramKind::Gaussian1d | ProgramKind::Gaussian1dBilinear
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// Texture-space step between two neighbouring taps of a 1-D pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    pub axis: Axis,
    pub step: [f32; 2],
}

impl Direction {
    /// One texel along `axis` for a texture of size `extent`.
    pub fn texel_step(axis: Axis, extent: Extent) -> Self {
        let step = match axis {
            Axis::Vertical => [0.0, 1.0 / extent.height as f32],
            Axis::Horizontal => [1.0 / extent.width as f32, 0.0],
        };
        Self { axis, step }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport covering the whole of `extent`.
    pub fn covering(extent: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }
}

/// The operations the orchestrator issues, in the order it issues them.
///
/// Implementations must not carry viewport state from one pass to the next:
/// every `bind_target` supplies the viewport that applies until the next one.
pub trait GraphicsContext {
    fn bind_target(&mut self, target: RenderTarget, viewport: Viewport);
    fn bind_source(&mut self, source: TextureSource);
    fn use_program(&mut self, program: ProgramKind);
    fn set_direction(&mut self, direction: Direction);
    fn draw_quad(&mut self);
}

/// A single full-screen draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pass {
    pub target: RenderTarget,
    pub source: TextureSource,
    pub program: ProgramKind,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone)]
pub struct FilterPipeline {
    strategy: FilterStrategy,
    image_extent: Extent,
    passes: Vec<Pass>,
}

impl FilterPipeline {
    pub fn new(strategy: FilterStrategy, image_extent: Extent) -> Self {
        let passes = match strategy {
            FilterStrategy::Naive => vec![Pass {
                target: RenderTarget::Visible,
                source: TextureSource::Image,
                program: ProgramKind::DirectGaussian,
                direction: None,
            }],
            FilterStrategy::Separable => {
                separable_passes(ProgramKind::Gaussian1d, image_extent).to_vec()
            }
            FilterStrategy::SeparableBilinear => {
                separable_passes(ProgramKind::Gaussian1dBilinear, image_extent).to_vec()
            }
        };

        debug_assert!(
            passes.iter().all(|pass| !pass.source.reads(pass.target)),
            "a pass may not sample the surface it renders into"
        );
        debug_assert!(
            passes
                .last()
                .is_some_and(|pass| pass.target == RenderTarget::Visible),
            "the final pass must write the visible target"
        );

        Self {
            strategy,
            image_extent,
            passes,
        }
    }

    pub fn strategy(&self) -> FilterStrategy {
        self.strategy
    }

    pub fn image_extent(&self) -> Extent {
        self.image_extent
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Whether any pass renders into an off-screen surface.
    pub fn uses_surfaces(&self) -> bool {
        self.passes
            .iter()
            .any(|pass| matches!(pass.target, RenderTarget::Surface(_)))
    }

    pub fn viewport_for(&self, target: RenderTarget, window: Extent) -> Viewport {
        match target {
            RenderTarget::Surface(_) => Viewport::covering(self.image_extent),
            RenderTarget::Visible => Viewport::covering(window),
        }
    }

    /// Issues the full pass sequence for one frame.
    pub fn encode_frame<C>(&self, context: &mut C, window: Extent)
    where
        C: GraphicsContext + ?Sized,
    {
        for pass in &self.passes {
            context.bind_target(pass.target, self.viewport_for(pass.target, window));
            context.bind_source(pass.source);
            context.use_program(pass.program);
            if let Some(direction) = pass.direction {
                context.set_direction(direction);
            }
            context.draw_quad();
        }
    }
}

fn separable_passes(program: ProgramKind, image_extent: Extent) -> [Pass; 3] {
    [
        Pass {
            target: RenderTarget::Surface(SurfaceSlot::A),
            source: TextureSource::Image,
            program: ProgramKind::Passthrough,
            direction: None,
        },
        Pass {
            target: RenderTarget::Surface(SurfaceSlot::B),
            source: TextureSource::Surface(SurfaceSlot::A),
            program,
            direction: Some(Direction::texel_step(Axis::Vertical, image_extent)),
        },
        Pass {
            target: RenderTarget::Visible,
            source: TextureSource::Surface(SurfaceSlot::B),
            program,
            direction: Some(Direction::texel_step(Axis::Horizontal, image_extent)),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Target(RenderTarget, Viewport),
        Source(TextureSource),
        Program(ProgramKind),
        Direction(Direction),
        Draw,
    }

    #[derive(Default)]
    struct RecordingContext {
        calls: Vec<Call>,
    }

    impl GraphicsContext for RecordingContext {
        fn bind_target(&mut self, target: RenderTarget, viewport: Viewport) {
            self.calls.push(Call::Target(target, viewport));
        }

        fn bind_source(&mut self, source: TextureSource) {
            self.calls.push(Call::Source(source));
        }

        fn use_program(&mut self, program: ProgramKind) {
            self.calls.push(Call::Program(program));
        }

        fn set_direction(&mut self, direction: Direction) {
            self.calls.push(Call::Direction(direction));
        }

        fn draw_quad(&mut self) {
            self.calls.push(Call::Draw);
        }
    }

    const IMAGE: Extent = Extent::new(640, 480);
    const WINDOW: Extent = Extent::new(1024, 768);

    fn record(strategy: FilterStrategy, window: Extent) -> Vec<Call> {
        let pipeline = FilterPipeline::new(strategy, IMAGE);
        let mut context = RecordingContext::default();
        pipeline.encode_frame(&mut context, window);
        context.calls
    }

    #[test]
    fn naive_draws_once_into_visible_target() {
        let calls = record(FilterStrategy::Naive, WINDOW);
        assert_eq!(
            calls,
            vec![
                Call::Target(RenderTarget::Visible, Viewport::covering(WINDOW)),
                Call::Source(TextureSource::Image),
                Call::Program(ProgramKind::DirectGaussian),
                Call::Draw,
            ]
        );
        assert!(!FilterPipeline::new(FilterStrategy::Naive, IMAGE).uses_surfaces());
    }

    #[test]
    fn separable_runs_copy_vertical_then_horizontal() {
        let calls = record(FilterStrategy::Separable, WINDOW);
        let image_viewport = Viewport::covering(IMAGE);
        assert_eq!(
            calls,
            vec![
                Call::Target(RenderTarget::Surface(SurfaceSlot::A), image_viewport),
                Call::Source(TextureSource::Image),
                Call::Program(ProgramKind::Passthrough),
                Call::Draw,
                Call::Target(RenderTarget::Surface(SurfaceSlot::B), image_viewport),
                Call::Source(TextureSource::Surface(SurfaceSlot::A)),
                Call::Program(ProgramKind::Gaussian1d),
                Call::Direction(Direction {
                    axis: Axis::Vertical,
                    step: [0.0, 1.0 / 480.0],
                }),
                Call::Draw,
                Call::Target(RenderTarget::Visible, Viewport::covering(WINDOW)),
                Call::Source(TextureSource::Surface(SurfaceSlot::B)),
                Call::Program(ProgramKind::Gaussian1d),
                Call::Direction(Direction {
                    axis: Axis::Horizontal,
                    step: [1.0 / 640.0, 0.0],
                }),
                Call::Draw,
            ]
        );
    }

    #[test]
    fn bilinear_reuses_separable_structure() {
        let exact = record(FilterStrategy::Separable, WINDOW);
        let bilinear = record(FilterStrategy::SeparableBilinear, WINDOW);
        assert_eq!(exact.len(), bilinear.len());
        for (exact, bilinear) in exact.iter().zip(&bilinear) {
            match (exact, bilinear) {
                (Call::Program(ProgramKind::Gaussian1d), Call::Program(program)) => {
                    assert_eq!(*program, ProgramKind::Gaussian1dBilinear);
                }
                (left, right) => assert_eq!(left, right),
            }
        }
    }

    #[test]
    fn window_viewport_follows_resize_between_frames() {
        let pipeline = FilterPipeline::new(FilterStrategy::SeparableBilinear, IMAGE);
        let resized = Extent::new(300, 900);
        for window in [WINDOW, resized, WINDOW] {
            let mut context = RecordingContext::default();
            pipeline.encode_frame(&mut context, window);
            let viewports: Vec<_> = context
                .calls
                .iter()
                .filter_map(|call| match call {
                    Call::Target(target, viewport) => Some((*target, *viewport)),
                    _ => None,
                })
                .collect();
            assert_eq!(viewports.len(), 3);
            assert_eq!(viewports[0].1, Viewport::covering(IMAGE));
            assert_eq!(viewports[1].1, Viewport::covering(IMAGE));
            assert_eq!(viewports[2], (RenderTarget::Visible, Viewport::covering(window)));
        }
    }

    #[test]
    fn every_surface_is_written_before_it_is_read() {
        for strategy in FilterStrategy::ALL {
            let pipeline = FilterPipeline::new(strategy, IMAGE);
            let mut written = Vec::new();
            for pass in pipeline.passes() {
                if let TextureSource::Surface(slot) = pass.source {
                    assert!(written.contains(&slot), "{strategy}: {slot:?} read before write");
                }
                assert!(!pass.source.reads(pass.target));
                if let RenderTarget::Surface(slot) = pass.target {
                    written.push(slot);
                }
            }
            assert_eq!(
                pipeline.passes().last().map(|pass| pass.target),
                Some(RenderTarget::Visible)
            );
        }
    }

    #[test]
    fn only_one_dimensional_programs_receive_a_direction() {
        for strategy in FilterStrategy::ALL {
            for pass in FilterPipeline::new(strategy, IMAGE).passes() {
                assert_eq!(pass.direction.is_some(), pass.program.uses_direction());
            }
        }
    }
}
