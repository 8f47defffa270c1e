//! Lloyd relaxation of seed points
//!
//! Moves every seed to the centroid of its bounded Voronoi cell. A few
//! iterations turn clumpy random seeds into evenly sized fragments; zero
//! iterations keep the raw random look.

use glam::DVec3;
use std::time::Instant;

use super::partition::VoronoiPartitioner;
use super::sampling::SeedPoint;
use crate::error::Result;

/// Options for Lloyd relaxation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxOptions {
    /// Maximum number of iterations to run
    pub max_iterations: usize,
    /// Stop when the largest seed displacement drops below this fraction of
    /// the bounds diagonal (0.0 disables early termination)
    pub convergence_threshold: f32,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            convergence_threshold: 0.001,
        }
    }
}

/// Apply Lloyd relaxation inside the partitioner's bounds
///
/// Seed densities are preserved; empty cells (coincident seeds) keep their
/// position.
///
/// # Arguments
///
/// * `seeds` - Seeds to move, returned in the same order
/// * `partitioner` - Bounds the cells are clipped to
/// * `options` - Iteration limit and convergence threshold
///
/// # Errors
///
/// Returns `DegenerateInput` if the seeds cannot be partitioned.
pub fn relax_seeds(
    mut seeds: Vec<SeedPoint>,
    partitioner: &VoronoiPartitioner,
    options: RelaxOptions,
) -> Result<Vec<SeedPoint>> {
    let threshold = f64::from(options.convergence_threshold) * f64::from(partitioner.bounds().diagonal());
    let start = Instant::now();

    for iteration in 0..options.max_iterations {
        let cells = partitioner.partition_with_geometry(&seeds)?;

        let mut max_displacement: f64 = 0.0;
        // Move every seed to its bounded cell centroid
        for (seed, (_, geometry)) in seeds.iter_mut().zip(&cells) {
            if geometry.volume <= 0.0 {
                continue;
            }
            let old: DVec3 = seed.position.as_dvec3();
            max_displacement = max_displacement.max(old.distance(geometry.centroid));
            seed.position = geometry.centroid.as_vec3();
        }

        log::debug!(
            "relax iteration {}: max displacement {:.6} (threshold {:.6})",
            iteration + 1,
            max_displacement,
            threshold
        );

        // A zero threshold runs every iteration
        if threshold > 0.0 && max_displacement < threshold {
            log::debug!("relaxation converged after {} iterations", iteration + 1);
            break;
        }
    }

    log::debug!("relaxation finished in {:?}", start.elapsed());
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::UniformDensity;
    use crate::generation::sampling::SampleGenerator;
    use crate::mesh::Bounds;
    use glam::Vec3;

    fn setup() -> (VoronoiPartitioner, Vec<SeedPoint>) {
        let bounds = Bounds::new(Vec3::ZERO, Vec3::ONE);
        let seeds = SampleGenerator::new(42, 30).unwrap().generate(&bounds, &UniformDensity);
        (VoronoiPartitioner::new(bounds), seeds)
    }

    fn volume_spread(partitioner: &VoronoiPartitioner, seeds: &[SeedPoint]) -> f64 {
        let cells = partitioner.partition_with_geometry(seeds).unwrap();
        let volumes: Vec<f64> = cells.iter().map(|(_, g)| g.volume).collect();
        let max = volumes.iter().copied().fold(f64::MIN, f64::max);
        let min = volumes.iter().copied().fold(f64::MAX, f64::min);
        max - min
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let (partitioner, seeds) = setup();
        let relaxed = relax_seeds(seeds.clone(), &partitioner, RelaxOptions::default()).unwrap();
        assert_eq!(relaxed, seeds);
    }

    #[test]
    fn test_relaxation_evens_out_cells() {
        let (partitioner, seeds) = setup();
        let before = volume_spread(&partitioner, &seeds);

        let options = RelaxOptions {
            max_iterations: 10,
            convergence_threshold: 0.0,
        };
        let relaxed = relax_seeds(seeds.clone(), &partitioner, options).unwrap();
        let after = volume_spread(&partitioner, &relaxed);

        assert_eq!(relaxed.len(), seeds.len());
        assert!(after < before, "spread {} should shrink below {}", after, before);
        let bounds = partitioner.bounds().expanded(1e-4);
        assert!(relaxed.iter().all(|s| bounds.contains(s.position)));
    }

    #[test]
    fn test_relaxation_is_deterministic() {
        let (partitioner, seeds) = setup();
        let options = RelaxOptions {
            max_iterations: 3,
            convergence_threshold: 0.0,
        };
        let a = relax_seeds(seeds.clone(), &partitioner, options).unwrap();
        let b = relax_seeds(seeds, &partitioner, options).unwrap();
        assert_eq!(a, b);
    }
}
