use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Width/height pair in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by the extent.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Filtering strategy chosen once at start-up.
///
/// The numeric selectors `1`, `2`, `3` are the command-line spelling; nothing
/// else parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStrategy {
    /// Single pass sampling the full 2-D neighbourhood.
    Naive,
    /// Copy pass followed by a vertical and a horizontal 1-D pass.
    Separable,
    /// Same as `Separable`, with 1-D passes that lean on hardware bilinear filtering.
    SeparableBilinear,
}

impl FilterStrategy {
    pub const ALL: [FilterStrategy; 3] = [
        FilterStrategy::Naive,
        FilterStrategy::Separable,
        FilterStrategy::SeparableBilinear,
    ];

    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            1 => Some(FilterStrategy::Naive),
            2 => Some(FilterStrategy::Separable),
            3 => Some(FilterStrategy::SeparableBilinear),
            _ => None,
        }
    }
}

impl fmt::Display for FilterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStrategy::Naive => f.write_str("naive"),
            FilterStrategy::Separable => f.write_str("separable"),
            FilterStrategy::SeparableBilinear => f.write_str("separable-bilinear"),
        }
    }
}

/// Error returned when a strategy selector is outside `1..=3`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid strategy '{input}'; expected 1 (naive), 2 (separable), or 3 (separable-bilinear)")]
pub struct ParseStrategyError {
    input: String,
}

impl FromStr for FilterStrategy {
    type Err = ParseStrategyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(FilterStrategy::from_selector)
            .ok_or_else(|| ParseStrategyError {
                input: value.to_string(),
            })
    }
}

/// Adapter power preference forwarded to `wgpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Where headless frames are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportBackend {
    /// Render through `wgpu` off-screen and read the result back.
    #[default]
    Gpu,
    /// Render through the CPU reference context; needs no adapter.
    Cpu,
}

impl fmt::Display for ExportBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportBackend::Gpu => f.write_str("gpu"),
            ExportBackend::Cpu => f.write_str("cpu"),
        }
    }
}

/// How the renderer delivers frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Open a window and present a filtered frame every refresh.
    Window,
    /// Render a single frame at image resolution and write it as PNG.
    Export { path: PathBuf, backend: ExportBackend },
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the CLI and config file: which image to filter,
/// which strategy to use, and how the result is delivered.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Image that is loaded once and filtered every frame.
    pub image_path: PathBuf,
    /// Filtering strategy resolved from the command line.
    pub strategy: FilterStrategy,
    /// Initial window size in physical pixels.
    pub window_size: Extent,
    /// Window title.
    pub window_title: String,
    /// Optional directory holding shader sources that replace the built-in copies.
    pub shader_dir: Option<PathBuf>,
    /// Adapter power preference.
    pub gpu_power: GpuPowerPreference,
    /// Present with vsync (`Fifo`) when true.
    pub vsync: bool,
    /// Window presentation or headless export.
    pub output: OutputMode,
}

impl Default for RendererConfig {
    /// A 1024x768 window running the separable strategy with no image selected.
    fn default() -> Self {
        Self {
            image_path: PathBuf::new(),
            strategy: FilterStrategy::Separable,
            window_size: Extent::new(1024, 768),
            window_title: "gblur".to_string(),
            shader_dir: None,
            gpu_power: GpuPowerPreference::default(),
            vsync: true,
            output: OutputMode::Window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_selectors_only() {
        assert_eq!("1".parse::<FilterStrategy>().unwrap(), FilterStrategy::Naive);
        assert_eq!(
            " 2 ".parse::<FilterStrategy>().unwrap(),
            FilterStrategy::Separable
        );
        assert_eq!(
            "3".parse::<FilterStrategy>().unwrap(),
            FilterStrategy::SeparableBilinear
        );
        for bad in ["0", "4", "-1", "naive", "", "2.0", "300"] {
            assert!(bad.parse::<FilterStrategy>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parse_error_lists_valid_range() {
        let err = "7".parse::<FilterStrategy>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'7'"));
        assert!(message.contains("1 (naive)"));
        assert!(message.contains("3 (separable-bilinear)"));
    }

    #[test]
    fn selectors_map_in_declaration_order() {
        for (selector, strategy) in (1u8..).zip(FilterStrategy::ALL) {
            assert_eq!(FilterStrategy::from_selector(selector), Some(strategy));
        }
        assert_eq!(FilterStrategy::from_selector(0), None);
        assert_eq!(FilterStrategy::from_selector(4), None);
    }
}
