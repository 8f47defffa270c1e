//! Seed point sampling
//!
//! Candidates are drawn uniformly inside the source bounds from a ChaCha8
//! stream, then thinned by rejection against a density field: a candidate
//! survives when a second uniform draw falls below the density at its
//! normalized position. Dense regions therefore receive more, smaller
//! fragments. The stream is consumed identically whether or not a candidate
//! is accepted, so the output depends only on seed, count and density.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::density::DensityField;
use crate::error::{Result, ShatterError};
use crate::mesh::{Bounds, TriMesh};

/// A Voronoi seed
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedPoint {
    /// World-space position
    pub position: Vec3,
    /// Density at the position when the seed was accepted
    pub density: f32,
}

impl SeedPoint {
    /// Seed at `position` with full density
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            density: 1.0,
        }
    }
}

/// Deterministic seed generator
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// let bounds = Bounds::new(Vec3::ZERO, Vec3::ONE);
/// let generator = SampleGenerator::new(42, 16).unwrap();
///
/// let a = generator.generate(&bounds, &UniformDensity);
/// let b = generator.generate(&bounds, &UniformDensity);
/// assert_eq!(a.len(), 16);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleGenerator {
    seed: i64,
    count: usize,
}

impl SampleGenerator {
    /// Generator drawing `count` candidates from the stream seeded by `seed`
    ///
    /// # Arguments
    ///
    /// * `seed` - Random seed, any value including negatives
    /// * `count` - Number of candidates (the host's `num_samples`)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `count` is negative.
    pub fn new(seed: i64, count: i32) -> Result<Self> {
        let count = usize::try_from(count).map_err(|_| {
            ShatterError::InvalidConfig(format!("sample count must be >= 0 (got {})", count))
        })?;
        Ok(Self { seed, count })
    }

    /// Random seed
    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Number of candidates drawn (upper bound on the output length)
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sample seeds inside `bounds`
    ///
    /// # Arguments
    ///
    /// * `bounds` - Box candidates are drawn from
    /// * `density` - Acceptance probability at normalized coordinates
    ///
    /// # Returns
    ///
    /// At most `count` seeds, in draw order. Exactly `count` for a density
    /// of 1 everywhere.
    pub fn generate<D>(&self, bounds: &Bounds, density: &D) -> Vec<SeedPoint>
    where
        D: DensityField + ?Sized,
    {
        self.sample(bounds, density, |_| true)
    }

    /// Sample seeds inside `bounds` that also lie inside the closed `mesh`
    ///
    /// Candidates outside the mesh are rejected, so concave sources do not
    /// waste seeds on empty space.
    pub fn generate_inside<D>(&self, bounds: &Bounds, density: &D, mesh: &TriMesh) -> Vec<SeedPoint>
    where
        D: DensityField + ?Sized,
    {
        self.sample(bounds, density, |p| mesh.contains_point(p))
    }

    fn sample<D, F>(&self, bounds: &Bounds, density: &D, accept: F) -> Vec<SeedPoint>
    where
        D: DensityField + ?Sized,
        F: Fn(Vec3) -> bool,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed as u64);

        (0..self.count)
            .filter_map(|_| {
                // Four draws per candidate, accepted or not, so streams stay aligned
                let uvw = Vec3::new(rng.gen(), rng.gen(), rng.gen());
                let threshold: f32 = rng.gen();

                let value = density.sample(uvw).clamp(0.0, 1.0);
                if threshold >= value {
                    return None;
                }
                let position = bounds.lerp(uvw);
                accept(position).then_some(SeedPoint {
                    position,
                    density: value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::{UniformDensity, VolumeTexture};

    fn bounds() -> Bounds {
        Bounds::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_negative_count() {
        let result = SampleGenerator::new(1, -5);
        assert!(matches!(result, Err(ShatterError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_count() {
        let generator = SampleGenerator::new(1, 0).unwrap();
        assert!(generator.generate(&bounds(), &UniformDensity).is_empty());
    }

    #[test]
    fn test_determinism() {
        let generator = SampleGenerator::new(42, 100).unwrap();
        let a = generator.generate(&bounds(), &UniformDensity);
        let b = generator.generate(&bounds(), &UniformDensity);
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
    }

    #[test]
    fn test_different_seeds() {
        let a = SampleGenerator::new(1, 10).unwrap().generate(&bounds(), &UniformDensity);
        let b = SampleGenerator::new(2, 10).unwrap().generate(&bounds(), &UniformDensity);
        assert_ne!(a, b);
    }

    #[test]
    fn test_negative_seed_is_valid() {
        let seeds = SampleGenerator::new(-42, 10).unwrap().generate(&bounds(), &UniformDensity);
        assert_eq!(seeds.len(), 10);
    }

    #[test]
    fn test_seeds_inside_bounds() {
        let b = bounds();
        let seeds = SampleGenerator::new(9, 500).unwrap().generate(&b, &UniformDensity);
        assert!(seeds.iter().all(|s| b.contains(s.position)));
    }

    #[test]
    fn test_density_rejection() {
        // Density 1 in the lower half along x, 0 in the upper half
        let texture = VolumeTexture::from_fn(4, 1, 1, |x, _, _| if x < 2 { 1.0 } else { 0.0 });
        let b = bounds();
        let seeds = SampleGenerator::new(3, 400).unwrap().generate(&b, &texture);

        assert!(!seeds.is_empty());
        assert!(seeds.len() < 400);
        // Trilinear filtering ramps between texel centers at u = 0.375 and 0.625
        for seed in &seeds {
            assert!(b.normalize(seed.position).x < 0.625);
            assert!(seed.density > 0.0);
        }
    }

    #[test]
    fn test_density_prefix_stability() {
        // Fewer candidates give a prefix of the longer run
        let b = bounds();
        let short = SampleGenerator::new(11, 20).unwrap().generate(&b, &UniformDensity);
        let long = SampleGenerator::new(11, 40).unwrap().generate(&b, &UniformDensity);
        assert_eq!(&long[..20], &short[..]);
    }

    #[test]
    fn test_generate_inside_mesh() {
        let sphere = TriMesh::icosphere(1.0, 2);
        let seeds = SampleGenerator::new(5, 300)
            .unwrap()
            .generate_inside(&bounds(), &UniformDensity, &sphere);

        assert!(seeds.len() < 300);
        assert!(seeds.iter().all(|s| s.position.length() < 1.0));
    }
}
