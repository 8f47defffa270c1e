//! Seed sampling and Voronoi partitioning
//!
//! The first half of the fracture pipeline: random seeds inside the source
//! bounds, optional Lloyd relaxation, then one bounded Voronoi cell per seed.

mod partition;
mod polyhedron;
mod relax;
mod sampling;

pub use partition::VoronoiPartitioner;
pub use relax::{relax_seeds, RelaxOptions};
pub use sampling::{SampleGenerator, SeedPoint};

pub(crate) use partition::{check_affine_span, seed_positions};

use crate::cell::Cell;
use crate::config::GeneratorConfig;
use crate::density::DensityField;
use crate::error::Result;
use crate::mesh::{Bounds, TriMesh};

/// Margin added around the source bounds, as a fraction of their diagonal
///
/// Keeps the bounds planes of border cells off the source surface so they
/// never produce coplanar cuts.
pub const BOUNDS_MARGIN: f32 = 0.01;

/// Sample (and optionally relax) seeds for `mesh` according to `config`
///
/// # Errors
///
/// Returns `InvalidConfig` for a negative sample count, or
/// `DegenerateInput` if relaxation cannot partition the seeds.
pub fn generate_seeds<D>(mesh: &TriMesh, bounds: &Bounds, config: &GeneratorConfig, density: &D) -> Result<Vec<SeedPoint>>
where
    D: DensityField + ?Sized,
{
    let sampler = SampleGenerator::new(config.random_seed, config.num_samples)?;
    let seeds = if config.interior_only {
        sampler.generate_inside(bounds, density, mesh)
    } else {
        sampler.generate(bounds, density)
    };

    if config.relax_iterations == 0 {
        return Ok(seeds);
    }
    let options = RelaxOptions {
        max_iterations: config.relax_iterations,
        convergence_threshold: config.relax_convergence,
    };
    relax_seeds(seeds, &partitioner_for(bounds, config), options)
}

/// Partitioner covering `bounds` plus [`BOUNDS_MARGIN`]
pub fn partitioner_for(bounds: &Bounds, config: &GeneratorConfig) -> VoronoiPartitioner {
    let margin = (bounds.diagonal() * BOUNDS_MARGIN).max(f32::EPSILON);
    VoronoiPartitioner::new(bounds.expanded(margin)).with_epsilon(config.clip.epsilon)
}

/// Partition seeds into cells covering `bounds` plus [`BOUNDS_MARGIN`]
///
/// # Errors
///
/// Returns `DegenerateInput` for fewer than 4 or coplanar seeds.
pub fn generate_cells(seeds: &[SeedPoint], bounds: &Bounds, config: &GeneratorConfig) -> Result<Vec<Cell>> {
    partitioner_for(bounds, config).partition(seeds)
}
