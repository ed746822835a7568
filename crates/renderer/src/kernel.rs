//! Discrete Gaussian kernel shared by the GPU programs and the CPU reference.
//!
//! Weights are stored for the non-negative half of the kernel only
//! (`weights[0]` is the centre tap) and are normalised so the full symmetric
//! kernel sums to one. The same numbers are injected into the GLSL sources as
//! constants, so both execution paths convolve with an identical kernel.

use std::fmt::Write as _;

use crate::error::SetupError;

pub const DEFAULT_RADIUS: u32 = 8;
pub const DEFAULT_SIGMA: f32 = 3.0;

/// One texture fetch of the bilinear 1-D program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearTap {
    /// Distance from the centre texel, in texels. Non-integer for merged pairs.
    pub offset: f32,
    /// Combined weight of the texels covered by this fetch.
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    radius: u32,
    sigma: f32,
    weights: Vec<f32>,
    taps: Vec<BilinearTap>,
}

impl GaussianKernel {
    /// Builds the kernel for `radius` taps on each side of the centre.
    /// `sigma` must be finite and positive.
    pub fn new(radius: u32, sigma: f32) -> Result<Self, SetupError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(SetupError::InvalidKernel { radius, sigma });
        }
        Ok(Self::build(radius, sigma))
    }

    fn build(radius: u32, sigma: f32) -> Self {
        let two_sigma_sq = 2.0 * f64::from(sigma) * f64::from(sigma);
        let raw: Vec<f64> = (0..=radius)
            .map(|i| (-(f64::from(i) * f64::from(i)) / two_sigma_sq).exp())
            .collect();
        let total = raw[0] + 2.0 * raw[1..].iter().sum::<f64>();
        let weights: Vec<f32> = raw.iter().map(|w| (w / total) as f32).collect();
        let taps = merge_bilinear_taps(&weights);

        Self {
            radius,
            sigma,
            weights,
            taps,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Half-kernel weights, centre first.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Weight of the tap `offset` texels away from the centre, in either direction.
    pub fn weight(&self, offset: i32) -> f32 {
        self.weights
            .get(offset.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Half-kernel bilinear fetches, centre first.
    pub fn bilinear_taps(&self) -> &[BilinearTap] {
        &self.taps
    }

    /// Texture fetches per output pixel for the direct 2-D program.
    pub fn direct_fetches(&self) -> usize {
        let side = 2 * self.radius as usize + 1;
        side * side
    }

    /// Texture fetches per output pixel for both exact 1-D passes together.
    pub fn separable_fetches(&self) -> usize {
        2 * (2 * self.radius as usize + 1)
    }

    /// Texture fetches per output pixel for both bilinear 1-D passes together.
    pub fn bilinear_fetches(&self) -> usize {
        2 * (2 * (self.taps.len() - 1) + 1)
    }

    /// GLSL macros consumed by the fragment programs.
    ///
    /// The weight tables expand to array constructors so each program copies
    /// them into a local array it can index dynamically.
    pub fn glsl_prelude(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#define KERNEL_RADIUS {}", self.radius);
        let _ = writeln!(out, "#define KERNEL_TAPS {}", self.weights.len());
        let _ = writeln!(
            out,
            "#define KERNEL_WEIGHTS float[{}]({})",
            self.weights.len(),
            glsl_floats(self.weights.iter().copied())
        );
        let _ = writeln!(out, "#define BILINEAR_TAPS {}", self.taps.len());
        let _ = writeln!(
            out,
            "#define BILINEAR_OFFSETS float[{}]({})",
            self.taps.len(),
            glsl_floats(self.taps.iter().map(|tap| tap.offset))
        );
        let _ = writeln!(
            out,
            "#define BILINEAR_WEIGHTS float[{}]({})",
            self.taps.len(),
            glsl_floats(self.taps.iter().map(|tap| tap.weight))
        );
        out
    }
}

impl Default for GaussianKernel {
    fn default() -> Self {
        Self::build(DEFAULT_RADIUS, DEFAULT_SIGMA)
    }
}

/// Pairs adjacent taps `(i, i + 1)` for `i = 1, 3, 5, ..` into one fetch placed
/// at their weighted centroid. An odd tail tap stays on its texel centre.
fn merge_bilinear_taps(weights: &[f32]) -> Vec<BilinearTap> {
    let mut taps = Vec::with_capacity(weights.len() / 2 + 1);
    taps.push(BilinearTap {
        offset: 0.0,
        weight: weights[0],
    });

    let mut index = 1;
    while index < weights.len() {
        let near = weights[index];
        match weights.get(index + 1) {
            Some(&far) => {
                let weight = near + far;
                let offset = (index as f32 * near + (index + 1) as f32 * far) / weight;
                taps.push(BilinearTap { offset, weight });
            }
            None => taps.push(BilinearTap {
                offset: index as f32,
                weight: near,
            }),
        }
        index += 2;
    }
    taps
}

fn glsl_floats(values: impl Iterator<Item = f32>) -> String {
    values
        .map(|value| format!("{value:.9}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_kernel_is_normalised() {
        for radius in [0, 1, 4, 8, 13] {
            let kernel = GaussianKernel::new(radius, 3.0).unwrap();
            let total: f32 = (-(radius as i32)..=radius as i32)
                .map(|offset| kernel.weight(offset))
                .sum();
            assert!((total - 1.0).abs() < 1e-5, "radius {radius}: {total}");
        }
    }

    #[test]
    fn weights_decrease_away_from_centre() {
        let kernel = GaussianKernel::default();
        for pair in kernel.weights().windows(2) {
            assert!(pair[0] > pair[1]);
        }
        assert_eq!(kernel.weight(-3), kernel.weight(3));
        assert_eq!(kernel.weight(DEFAULT_RADIUS as i32 + 1), 0.0);
    }

    #[test]
    fn bilinear_taps_preserve_weight_and_first_moment() {
        let kernel = GaussianKernel::new(8, 3.0).unwrap();
        let taps = kernel.bilinear_taps();
        assert_eq!(taps.len(), 5);

        let exact_weight: f32 = kernel.weights()[1..].iter().sum();
        let merged_weight: f32 = taps[1..].iter().map(|tap| tap.weight).sum();
        assert!((exact_weight - merged_weight).abs() < 1e-6);

        let exact_moment: f32 = kernel.weights()[1..]
            .iter()
            .enumerate()
            .map(|(i, w)| (i + 1) as f32 * w)
            .sum();
        let merged_moment: f32 = taps[1..].iter().map(|tap| tap.offset * tap.weight).sum();
        assert!((exact_moment - merged_moment).abs() < 1e-5);

        for (pair, tap) in taps[1..].iter().enumerate() {
            let near = (2 * pair + 1) as f32;
            assert!(tap.offset > near && tap.offset < near + 1.0);
        }
    }

    #[test]
    fn odd_radius_keeps_tail_tap_on_texel_centre() {
        let kernel = GaussianKernel::new(3, 1.5).unwrap();
        let taps = kernel.bilinear_taps();
        assert_eq!(taps.len(), 3);
        assert_eq!(taps[2].offset, 3.0);
        assert_eq!(taps[2].weight, kernel.weights()[3]);
    }

    #[test]
    fn fetch_counts_follow_strategy_cost() {
        let kernel = GaussianKernel::new(8, 3.0).unwrap();
        assert_eq!(kernel.direct_fetches(), 289);
        assert_eq!(kernel.separable_fetches(), 34);
        assert_eq!(kernel.bilinear_fetches(), 18);
    }

    #[test]
    fn rejects_degenerate_sigma() {
        for sigma in [0.0, -1.5, f32::NAN, f32::INFINITY] {
            let err = GaussianKernel::new(4, sigma).unwrap_err();
            assert!(matches!(err, SetupError::InvalidKernel { radius: 4, .. }));
        }
    }

    #[test]
    fn default_matches_explicit_constants() {
        assert_eq!(
            GaussianKernel::default(),
            GaussianKernel::new(DEFAULT_RADIUS, DEFAULT_SIGMA).unwrap()
        );
    }

    #[test]
    fn prelude_declares_all_constants() {
        let prelude = GaussianKernel::new(2, 1.0).unwrap().glsl_prelude();
        assert!(prelude.contains("#define KERNEL_RADIUS 2\n"));
        assert!(prelude.contains("#define KERNEL_TAPS 3\n"));
        assert!(prelude.contains("#define KERNEL_WEIGHTS float[3]("));
        assert!(prelude.contains("#define BILINEAR_TAPS 2\n"));
        assert!(prelude.contains("#define BILINEAR_OFFSETS float[2](0.000000000, "));
        assert!(prelude.contains("#define BILINEAR_WEIGHTS float[2]("));
    }
}
