use std::path::PathBuf;

use clap::Parser;
use renderer::{ExportBackend, Extent, FilterStrategy, GpuPowerPreference};

#[derive(Parser, Debug)]
#[command(
    name = "gblur",
    author,
    version,
    about = "Gaussian blur of an image, rendered on the GPU"
)]
pub struct Cli {
    /// Image to blur (PNG, JPEG, BMP, or GIF).
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Filtering strategy: 1 (naive), 2 (separable), or 3 (separable-bilinear).
    #[arg(value_name = "1|2|3", value_parser = parse_strategy)]
    pub strategy: FilterStrategy,

    /// Window size in physical pixels (e.g. `1280x720`). Defaults to 1024x768.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<Extent>,

    /// TOML config file; defaults to `config.toml` in the user config directory.
    #[arg(long, value_name = "FILE", env = "GBLUR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory with shader sources that replace the built-in copies.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Render one frame at image resolution, write it as PNG, and exit.
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Export backend: `gpu` (default) or `cpu`.
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<ExportBackend>,

    /// Adapter power preference: `low` or `high`.
    #[arg(long, value_name = "PREFERENCE", value_parser = parse_power)]
    pub power: Option<GpuPowerPreference>,

    /// Present without waiting for vertical blank.
    #[arg(long)]
    pub no_vsync: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_strategy(value: &str) -> Result<FilterStrategy, String> {
    value
        .parse::<FilterStrategy>()
        .map_err(|err| err.to_string())
}

pub fn parse_size(value: &str) -> Result<Extent, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WxH, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok(Extent::new(width, height))
}

pub fn parse_backend(value: &str) -> Result<ExportBackend, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gpu" | "wgpu" => Ok(ExportBackend::Gpu),
        "cpu" | "reference" => Ok(ExportBackend::Cpu),
        other => Err(format!("unknown backend '{other}'; expected gpu or cpu")),
    }
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        other => Err(format!(
            "unknown power preference '{other}'; expected low or high"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_accepts_only_one_to_three() {
        assert_eq!(parse_strategy("1"), Ok(FilterStrategy::Naive));
        assert_eq!(parse_strategy("3"), Ok(FilterStrategy::SeparableBilinear));
        let err = parse_strategy("4").unwrap_err();
        assert!(err.contains("expected 1 (naive), 2 (separable), or 3"));
        assert!(parse_strategy("abc").is_err());
    }

    #[test]
    fn size_accepts_common_separators() {
        assert_eq!(parse_size("1280x720"), Ok(Extent::new(1280, 720)));
        assert_eq!(parse_size(" 640 X 480 "), Ok(Extent::new(640, 480)));
        assert_eq!(parse_size("800×600"), Ok(Extent::new(800, 600)));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("1280").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn backend_and_power_are_case_insensitive() {
        assert_eq!(parse_backend("CPU"), Ok(ExportBackend::Cpu));
        assert_eq!(parse_backend("gpu"), Ok(ExportBackend::Gpu));
        assert!(parse_backend("metal").is_err());
        assert_eq!(parse_power("Low"), Ok(GpuPowerPreference::Low));
        assert_eq!(parse_power("high-performance"), Ok(GpuPowerPreference::High));
        assert!(parse_power("medium").is_err());
    }

    #[test]
    fn cli_parses_positionals_and_flags() {
        let cli = Cli::try_parse_from([
            "gblur",
            "photo.png",
            "2",
            "--size",
            "320x200",
            "--export",
            "out.png",
            "--backend",
            "cpu",
            "--no-vsync",
        ])
        .unwrap();
        assert_eq!(cli.image, PathBuf::from("photo.png"));
        assert_eq!(cli.strategy, FilterStrategy::Separable);
        assert_eq!(cli.size, Some(Extent::new(320, 200)));
        assert_eq!(cli.export, Some(PathBuf::from("out.png")));
        assert_eq!(cli.backend, Some(ExportBackend::Cpu));
        assert!(cli.no_vsync);
    }

    #[test]
    fn cli_rejects_missing_or_extra_positionals() {
        assert!(Cli::try_parse_from(["gblur", "photo.png"]).is_err());
        assert!(Cli::try_parse_from(["gblur", "photo.png", "1", "extra"]).is_err());
        assert!(Cli::try_parse_from(["gblur", "photo.png", "0"]).is_err());
    }
}
