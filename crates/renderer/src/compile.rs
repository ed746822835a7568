use std::borrow::Cow;
use std::path::{Path, PathBuf};

use wgpu::naga::ShaderStage;

use crate::error::SetupError;
use crate::pipeline::ProgramKind;

const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.vert");
const PASSTHROUGH_FRAG: &str = include_str!("../shaders/passthrough.frag");
const GAUSSIAN_2D_FRAG: &str = include_str!("../shaders/gaussian2d.frag");
const GAUSSIAN_1D_FRAG: &str = include_str!("../shaders/gaussian1d.frag");
const GAUSSIAN_1D_BILINEAR_FRAG: &str = include_str!("../shaders/gaussian1d_bilinear.frag");

pub(crate) const VERTEX_FILE: &str = "fullscreen.vert";

pub(crate) fn fragment_file(program: ProgramKind) -> &'static str {
    match program {
        ProgramKind::Passthrough => "passthrough.frag",
        ProgramKind::DirectGaussian => "gaussian2d.frag",
        ProgramKind::Gaussian1d => "gaussian1d.frag",
        ProgramKind::Gaussian1dBilinear => "gaussian1d_bilinear.frag",
    }
}

fn builtin_fragment(program: ProgramKind) -> &'static str {
    match program {
        ProgramKind::Passthrough => PASSTHROUGH_FRAG,
        ProgramKind::DirectGaussian => GAUSSIAN_2D_FRAG,
        ProgramKind::Gaussian1d => GAUSSIAN_1D_FRAG,
        ProgramKind::Gaussian1dBilinear => GAUSSIAN_1D_BILINEAR_FRAG,
    }
}

/// Resolves shader sources, either the copies embedded in the binary or files
/// from a user-supplied directory using the same file names.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShaderLibrary {
    shader_dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub(crate) fn new(shader_dir: Option<&Path>) -> Self {
        Self {
            shader_dir: shader_dir.map(Path::to_path_buf),
        }
    }

    pub(crate) fn vertex_source(&self) -> Result<Cow<'static, str>, SetupError> {
        self.load("vertex", VERTEX_FILE, FULLSCREEN_VERT)
    }

    pub(crate) fn fragment_source(
        &self,
        program: ProgramKind,
    ) -> Result<Cow<'static, str>, SetupError> {
        self.load(
            "fragment",
            fragment_file(program),
            builtin_fragment(program),
        )
    }

    fn load(
        &self,
        stage: &'static str,
        file: &str,
        builtin: &'static str,
    ) -> Result<Cow<'static, str>, SetupError> {
        let Some(dir) = &self.shader_dir else {
            return Ok(Cow::Borrowed(builtin));
        };
        let path = dir.join(file);
        let source = std::fs::read_to_string(&path).map_err(|source| SetupError::ShaderRead {
            stage,
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), stage, "loaded shader override");
        Ok(Cow::Owned(source))
    }
}

/// A shader source with the kernel prelude spliced in.
pub(crate) struct PreparedSource {
    pub text: String,
    /// Lines inserted ahead of the author's code after the `#version` line.
    pub injected_lines: usize,
}

/// Places `prelude` directly after the `#version` directive, or at the top
/// when the source has none.
pub(crate) fn inject_prelude(source: &str, prelude: &str) -> PreparedSource {
    let mut text = String::with_capacity(source.len() + prelude.len() + 1);
    let mut lines = source.lines().peekable();

    while let Some(line) = lines.peek().copied() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            text.push_str(line);
            text.push('\n');
            lines.next();
            continue;
        }
        if trimmed.starts_with("#version") {
            text.push_str(line);
            text.push('\n');
            lines.next();
        }
        break;
    }

    text.push_str(prelude);
    if !prelude.is_empty() && !prelude.ends_with('\n') {
        text.push('\n');
    }
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    PreparedSource {
        text,
        injected_lines: prelude.lines().count(),
    }
}

/// naga reports positions in the spliced text, so the diagnostic says how far
/// lines after the prelude are shifted.
fn annotate_diagnostic(diagnostic: String, injected_lines: usize) -> String {
    if injected_lines == 0 {
        return diagnostic;
    }
    format!(
        "{diagnostic}\nnote: lines after `#version` are shifted by {injected_lines} \
         injected kernel definition lines"
    )
}

/// Compiles GLSL for one stage of `program`, turning any validation error
/// raised while the module is created into [`SetupError::ProgramBuild`].
pub(crate) fn compile_module(
    device: &wgpu::Device,
    program: &'static str,
    stage: ShaderStage,
    source: PreparedSource,
) -> Result<wgpu::ShaderModule, SetupError> {
    let stage_name = stage_name(stage);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.text),
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(SetupError::ProgramBuild {
            program,
            stage: stage_name,
            diagnostic: annotate_diagnostic(error.to_string(), source.injected_lines),
        });
    }
    tracing::debug!(program, stage = stage_name, "compiled shader module");
    Ok(module)
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

#[cfg(test)]
mod tests {
    use wgpu::naga;

    use super::*;
    use crate::kernel::GaussianKernel;

    #[test]
    fn prelude_follows_version_directive() {
        let source = "// header\n#version 450\nvoid main() {}\n";
        let prepared = inject_prelude(source, "#define A 1");
        assert_eq!(
            prepared.text,
            "// header\n#version 450\n#define A 1\nvoid main() {}\n"
        );
        assert_eq!(prepared.injected_lines, 1);
    }

    #[test]
    fn prelude_leads_when_version_missing() {
        let prepared = inject_prelude("void main() {}\n", "#define A 1\n#define B 2\n");
        assert_eq!(prepared.text, "#define A 1\n#define B 2\nvoid main() {}\n");
        assert_eq!(prepared.injected_lines, 2);
    }

    #[test]
    fn diagnostic_notes_line_shift() {
        let annotated = annotate_diagnostic("error at glsl:9:15".to_string(), 6);
        assert!(annotated.starts_with("error at glsl:9:15\n"));
        assert!(annotated.contains("shifted by 6 injected kernel definition lines"));
        assert_eq!(annotate_diagnostic("plain".to_string(), 0), "plain");
    }

    #[test]
    fn missing_override_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let library = ShaderLibrary::new(Some(dir.path()));
        let err = library.vertex_source().unwrap_err();
        match err {
            SetupError::ShaderRead { stage, path, .. } => {
                assert_eq!(stage, "vertex");
                assert_eq!(path, dir.path().join(VERTEX_FILE));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn override_directory_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("passthrough.frag"), "custom").unwrap();
        let library = ShaderLibrary::new(Some(dir.path()));
        let source = library.fragment_source(ProgramKind::Passthrough).unwrap();
        assert_eq!(source, "custom");
    }

    fn validate(stage: naga::ShaderStage, source: &str) {
        let mut frontend = naga::front::glsl::Frontend::default();
        let module = frontend
            .parse(&naga::front::glsl::Options::from(stage), source)
            .unwrap_or_else(|err| panic!("parse failed: {err:?}\n{source}"));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("validation failed: {err:?}\n{source}"));
    }

    #[test]
    fn builtin_shaders_compile_with_prelude() {
        let library = ShaderLibrary::default();
        for kernel in [GaussianKernel::default(), GaussianKernel::new(3, 1.5).unwrap()] {
            let prelude = kernel.glsl_prelude();
            let vertex = library.vertex_source().unwrap();
            validate(
                naga::ShaderStage::Vertex,
                &inject_prelude(&vertex, &prelude).text,
            );
            for program in ProgramKind::ALL {
                let fragment = library.fragment_source(program).unwrap();
                validate(
                    naga::ShaderStage::Fragment,
                    &inject_prelude(&fragment, &prelude).text,
                );
            }
        }
    }
}
