//! The fracture pipeline and its result
//!
//! [`VoronoiGenerator`] runs sampling, partitioning, clipping and assembly
//! for one source mesh and returns a [`Shatter`] holding the fragments
//! together with the cells, seeds and diagnostics they came from.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::cell::Cell;
use crate::clip::MeshClipper;
use crate::config::{ClipOptions, GeneratorConfig};
use crate::density::{DensityField, UniformDensity};
use crate::error::{Result, ShatterError};
use crate::fragment::{ClipOutcome, DroppedCell, Fragment, FragmentAssembler};
use crate::generation::{generate_cells, generate_seeds, SeedPoint};
use crate::mesh::{SourceHandle, SourceMesh, TriMesh};

#[cfg(feature = "spatial-index")]
use crate::generation::seed_positions;
#[cfg(feature = "spatial-index")]
use glam::Vec3;
#[cfg(feature = "spatial-index")]
use crate::spatial::SpatialIndex;

/// Pipeline stage of a [`VoronoiGenerator`]
///
/// A call moves `Idle → Sampling → Partitioning → Clipping → Assembled` and
/// returns to `Idle` when it finishes, successfully or not.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    /// No generation running
    #[default]
    Idle,
    /// Drawing seeds
    Sampling,
    /// Building Voronoi cells
    Partitioning,
    /// Clipping the source against cells
    Clipping,
    /// Building fragments from clip results
    Assembled,
}

impl Stage {
    const ALL: [Stage; 5] = [
        Stage::Idle,
        Stage::Sampling,
        Stage::Partitioning,
        Stage::Clipping,
        Stage::Assembled,
    ];

    fn from_u8(value: u8) -> Self {
        Self::ALL.get(value as usize).copied().unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Sampling => "sampling",
            Stage::Partitioning => "partitioning",
            Stage::Clipping => "clipping",
            Stage::Assembled => "assembly",
        };
        f.write_str(name)
    }
}

/// Fractures source meshes into Voronoi fragments
///
/// A generator runs one call at a time and reports its progress through
/// [`VoronoiGenerator::stage`]. Share it by reference to watch a running
/// call from another thread. Clones share the cancel token but track their
/// own stage, so clones can run concurrently without mixing up stages.
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// let source = SourceMesh::new(TriMesh::cuboid(Vec3::splat(0.5)), SourceHandle(1));
/// let config = GeneratorConfigBuilder::new()
///     .seed(42)
///     .num_samples(8)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// let fragments = VoronoiGenerator::new().create_from_mesh(&source, &config).unwrap();
/// assert_eq!(fragments.len(), 8);
/// ```
#[derive(Debug, Default)]
pub struct VoronoiGenerator {
    cancel: CancelToken,
    stage: AtomicU8,
}

impl Clone for VoronoiGenerator {
    fn clone(&self) -> Self {
        Self {
            cancel: self.cancel.clone(),
            stage: AtomicU8::new(Stage::Idle as u8),
        }
    }
}

impl VoronoiGenerator {
    /// Create a generator with its own cancel token
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `token` to cancel generation from elsewhere
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancel token observed by this generator
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Stage of the call currently running, `Idle` if none
    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Fracture `source` and return its fragments in seed order
    ///
    /// # Errors
    ///
    /// See [`VoronoiGenerator::shatter`].
    pub fn create_from_mesh(&self, source: &SourceMesh, config: &GeneratorConfig) -> Result<Vec<Fragment>> {
        Ok(self.shatter(source, config)?.into_fragments())
    }

    /// Fracture `source`, using `config.density` (uniform when unset)
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for invalid parameters, a source without triangles,
    ///   out-of-range indices or non-finite positions
    /// - `DegenerateInput` if fewer than 4 seeds survive or they are coplanar
    /// - `GenerationFailed` if no fragment could be produced
    /// - `Cancelled` if the cancel token fires
    pub fn shatter(&self, source: &SourceMesh, config: &GeneratorConfig) -> Result<Shatter> {
        match &config.density {
            Some(texture) => self.shatter_with_density(source, config, texture),
            None => self.shatter_with_density(source, config, &UniformDensity),
        }
    }

    /// Fracture `source` with a custom density field
    ///
    /// # Type Parameters
    ///
    /// * `D` - Any [`DensityField`], including closures `Fn(Vec3) -> f32`
    ///
    /// # Arguments
    ///
    /// * `source` - Mesh instance to fracture
    /// * `config` - Fracture configuration; `config.density` is ignored
    /// * `density` - Density sampled at coordinates normalized to the source bounds
    ///
    /// # Returns
    ///
    /// `Result<Shatter>` - Fragments with their cells and seeds, or error
    ///
    /// # Errors
    ///
    /// See [`VoronoiGenerator::shatter`].
    pub fn shatter_with_density<D>(&self, source: &SourceMesh, config: &GeneratorConfig, density: &D) -> Result<Shatter>
    where
        D: DensityField + ?Sized,
    {
        let result = self.run(source, config, density);
        self.set_stage(Stage::Idle);
        result
    }

    fn run<D>(&self, source: &SourceMesh, config: &GeneratorConfig, density: &D) -> Result<Shatter>
    where
        D: DensityField + ?Sized,
    {
        config.validate()?;
        source.mesh.validate()?;
        let start = Instant::now();

        self.enter(Stage::Sampling)?;
        let world = source.world_mesh();
        // A non-finite transform only shows up after it is applied
        world.validate()?;
        let bounds = world
            .bounds()
            .ok_or_else(|| ShatterError::InvalidConfig("source mesh has no triangles".to_string()))?;
        let weld = bounds.diagonal() * config.clip.weld_epsilon;
        let mesh = if weld > 0.0 { world.welded(weld) } else { world };
        if mesh.is_empty() {
            return Err(ShatterError::InvalidConfig("source mesh has no triangles".to_string()));
        }

        let report = mesh.edge_report();
        if !report.is_manifold() {
            log::warn!(
                "source {:?} is not a closed manifold ({} boundary, {} non-manifold edges); fragments may be dropped",
                source.handle,
                report.boundary_edges,
                report.non_manifold_edges
            );
        }

        let seeds = generate_seeds(&mesh, &bounds, config, density)?;
        log::debug!("sampled {} seeds from {} candidates in {:?}", seeds.len(), config.num_samples, start.elapsed());

        self.enter(Stage::Partitioning)?;
        let partition_start = Instant::now();
        let cells = generate_cells(&seeds, &bounds, config)?;
        log::debug!("partitioned {} cells in {:?}", cells.len(), partition_start.elapsed());

        self.enter(Stage::Clipping)?;
        let outcomes = self.clip_cells(&mesh, &cells, config.clip)?;

        self.enter(Stage::Assembled)?;
        let assembly = FragmentAssembler::new(source.handle)
            .recenter(config.recenter)
            .assemble(&cells, outcomes);

        if assembly.fragments.is_empty() {
            return Err(match assembly.dropped.first() {
                Some(first) => ShatterError::GenerationFailed(format!(
                    "all {} intersecting cells failed to clip, first: {}",
                    assembly.dropped.len(),
                    first.error
                )),
                None => ShatterError::GenerationFailed("no cell intersects the source mesh".to_string()),
            });
        }

        log::info!(
            "shattered source {:?} into {} fragments ({} dropped) in {:?}",
            source.handle,
            assembly.fragments.len(),
            assembly.dropped.len(),
            start.elapsed()
        );

        Ok(Shatter::new(
            assembly.fragments,
            cells,
            seeds,
            assembly.dropped,
            source.handle,
            mesh.volume(),
        ))
    }

    /// Clip `mesh` against every cell, checking the cancel token before each one
    fn clip_cells(&self, mesh: &TriMesh, cells: &[Cell], options: ClipOptions) -> Result<Vec<ClipOutcome>> {
        let start = Instant::now();
        let clipper = MeshClipper::new(options);
        let clip_one = |cell: &Cell| -> ClipOutcome {
            // Skip remaining cells once cancelled, the stage error follows
            if self.cancel.is_cancelled() {
                return ClipOutcome::Empty;
            }
            clipper.clip(mesh, cell).into()
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<ClipOutcome> = cells.par_iter().map(clip_one).collect();
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<ClipOutcome> = cells.iter().map(clip_one).collect();

        if self.cancel.is_cancelled() {
            return Err(ShatterError::Cancelled { stage: Stage::Clipping });
        }
        log::debug!("clipped {} cells in {:?}", cells.len(), start.elapsed());
        Ok(outcomes)
    }

    fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Release);
    }

    fn enter(&self, stage: Stage) -> Result<()> {
        self.set_stage(stage);
        if self.cancel.is_cancelled() {
            return Err(ShatterError::Cancelled { stage });
        }
        Ok(())
    }
}

/// Outcome of one fracture
///
/// Fragments are ordered by seed index. Queries taking a `seed_index`
/// return nothing for seeds whose cell produced no fragment.
#[derive(Debug, Clone)]
pub struct Shatter {
    fragments: Vec<Fragment>,
    cells: Vec<Cell>,
    seeds: Vec<SeedPoint>,
    dropped: Vec<DroppedCell>,
    source: SourceHandle,
    source_volume: f32,

    /// Seed index to position in `fragments`
    by_seed: Vec<Option<usize>>,

    /// Spatial index over seeds of non-empty cells (optional, requires spatial-index feature)
    #[cfg(feature = "spatial-index")]
    spatial_index: SpatialIndex,
    #[cfg(feature = "spatial-index")]
    indexed_seeds: Vec<usize>,
}

impl Shatter {
    fn new(
        fragments: Vec<Fragment>,
        cells: Vec<Cell>,
        seeds: Vec<SeedPoint>,
        dropped: Vec<DroppedCell>,
        source: SourceHandle,
        source_volume: f32,
    ) -> Self {
        let mut by_seed = vec![None; cells.len()];
        for (slot, fragment) in fragments.iter().enumerate() {
            by_seed[fragment.seed_index] = Some(slot);
        }

        #[cfg(feature = "spatial-index")]
        let indexed_seeds: Vec<usize> = cells.iter().filter(|c| !c.is_empty()).map(|c| c.seed_index).collect();
        #[cfg(feature = "spatial-index")]
        let spatial_index = {
            let positions = seed_positions(&seeds);
            let points: Vec<Vec3> = indexed_seeds.iter().map(|&i| positions[i]).collect();
            SpatialIndex::new(&points)
        };

        Self {
            fragments,
            cells,
            seeds,
            dropped,
            source,
            source_volume,
            by_seed,
            #[cfg(feature = "spatial-index")]
            spatial_index,
            #[cfg(feature = "spatial-index")]
            indexed_seeds,
        }
    }

    /// All fragments in seed order
    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Take the fragments, dropping everything else
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    /// Get the number of fragments
    #[inline]
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Get the fragment cut from the cell of `seed_index`
    ///
    /// # Arguments
    ///
    /// * `seed_index` - Seed index (0 to seeds().len()-1)
    pub fn get_fragment(&self, seed_index: usize) -> Option<&Fragment> {
        let slot = (*self.by_seed.get(seed_index)?)?;
        self.fragments.get(slot)
    }

    /// All cells, indexed by seed
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// All seeds, including those whose cell produced no fragment
    #[inline]
    pub fn seeds(&self) -> &[SeedPoint] {
        &self.seeds
    }

    /// Cells dropped because clipping failed
    #[inline]
    pub fn dropped(&self) -> &[DroppedCell] {
        &self.dropped
    }

    /// Handle of the source mesh
    #[inline]
    pub fn source(&self) -> SourceHandle {
        self.source
    }

    /// Volume of the (welded, world-space) source mesh
    #[inline]
    pub fn source_volume(&self) -> f32 {
        self.source_volume
    }

    /// Sum of all fragment volumes
    pub fn total_volume(&self) -> f32 {
        self.fragments.iter().map(Fragment::volume).sum()
    }

    /// Seed indices of fragments whose cells share a face with `seed_index`'s
    ///
    /// Empty if `seed_index` has no fragment.
    pub fn fragment_neighbors(&self, seed_index: usize) -> Vec<usize> {
        if self.get_fragment(seed_index).is_none() {
            return Vec::new();
        }
        self.cells[seed_index]
            .neighbors
            .iter()
            .copied()
            .filter(|&n| self.get_fragment(n).is_some())
            .collect()
    }

    /// Fragments within `hops` neighbor steps of `seed_index` (BFS)
    ///
    /// # Arguments
    ///
    /// * `seed_index` - Starting fragment
    /// * `hops` - Maximum number of neighbor steps
    ///
    /// # Returns
    ///
    /// Sorted seed indices including `seed_index` itself, or an empty
    /// vector if it has no fragment.
    pub fn find_fragments_within_hops(&self, seed_index: usize, hops: usize) -> Vec<usize> {
        if self.get_fragment(seed_index).is_none() {
            return vec![];
        }

        let mut visited = HashSet::new();
        let mut current = vec![seed_index];
        visited.insert(seed_index);

        for _ in 0..hops {
            let mut next = Vec::new();
            for &id in &current {
                for neighbor in self.fragment_neighbors(id) {
                    if visited.insert(neighbor) {
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            current = next;
        }

        let mut found: Vec<usize> = visited.into_iter().collect();
        found.sort_unstable();
        found
    }

    /// Find the fragment whose cell contains `point` (requires spatial-index feature)
    ///
    /// Returns `None` if that cell produced no fragment. The point is not
    /// tested against the fragment surface.
    #[cfg(feature = "spatial-index")]
    pub fn find_fragment_at(&self, point: Vec3) -> Option<&Fragment> {
        let slot = self.spatial_index.find_nearest(point)?;
        self.get_fragment(*self.indexed_seeds.get(slot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfigBuilder;
    use crate::density::{NoiseDensity, VolumeTexture};
    use crate::generation::VoronoiPartitioner;
    use crate::mesh::Bounds;
    use glam::{Affine3A, Quat, Vec3};
    use std::sync::Mutex;

    fn cube_source() -> SourceMesh {
        SourceMesh::new(TriMesh::cuboid(Vec3::splat(0.5)), SourceHandle(1))
    }

    fn config(seed: i64, samples: i32) -> GeneratorConfig {
        GeneratorConfigBuilder::new()
            .seed(seed)
            .num_samples(samples)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_unit_cube_eight_fragments() {
        let shatter = VoronoiGenerator::new().shatter(&cube_source(), &config(42, 8)).unwrap();

        assert_eq!(shatter.fragment_count(), 8);
        assert!(shatter.dropped().is_empty());
        assert!((shatter.total_volume() - 1.0).abs() < 0.01);
        assert!((shatter.source_volume() - 1.0).abs() < 1e-5);
        for fragment in shatter.fragments() {
            assert!(!fragment.mesh.is_empty());
            assert!(fragment.mesh.is_closed_manifold());
            assert!(fragment.volume() > 0.0);
            assert_eq!(fragment.source, SourceHandle(1));
        }
    }

    #[test]
    fn test_fragments_stay_in_their_cells() {
        let shatter = VoronoiGenerator::new().shatter(&cube_source(), &config(7, 20)).unwrap();
        for fragment in shatter.fragments() {
            let cell = &shatter.cells()[fragment.seed_index];
            for p in &fragment.world_mesh().positions {
                assert!(cell.contains(*p, 1e-4), "vertex {} escapes cell {}", p, fragment.seed_index);
            }
        }
    }

    #[test]
    fn test_negative_samples_rejected() {
        let config = GeneratorConfig {
            num_samples: -1,
            ..GeneratorConfig::default()
        };
        let result = VoronoiGenerator::new().shatter(&cube_source(), &config);
        assert!(matches!(result, Err(ShatterError::InvalidConfig(_))));
    }

    #[test]
    fn test_too_few_samples() {
        let result = VoronoiGenerator::new().shatter(&cube_source(), &config(1, 3));
        assert!(matches!(result, Err(ShatterError::DegenerateInput(_))));
    }

    #[test]
    fn test_empty_source() {
        let source = SourceMesh::new(TriMesh::default(), SourceHandle(0));
        let result = VoronoiGenerator::new().shatter(&source, &config(1, 8));
        assert!(matches!(result, Err(ShatterError::InvalidConfig(_))));
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        let generator = VoronoiGenerator::new().with_cancel_token(token.clone());
        token.cancel();

        let result = generator.shatter(&cube_source(), &config(1, 8));
        assert_eq!(result.unwrap_err(), ShatterError::Cancelled { stage: Stage::Sampling });
        assert_eq!(generator.stage(), Stage::Idle);

        token.reset();
        assert!(generator.shatter(&cube_source(), &config(1, 8)).is_ok());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut source = cube_source();
        source.mesh.indices.push([0, 1, 99]);
        let result = VoronoiGenerator::new().shatter(&source, &config(1, 8));
        assert!(matches!(result, Err(ShatterError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_finite_vertex_rejected() {
        let mut source = cube_source();
        source.mesh.positions[0] = Vec3::NAN;
        let result = VoronoiGenerator::new().shatter(&source, &config(1, 8));
        assert!(matches!(result, Err(ShatterError::InvalidConfig(_))));

        let scaled = cube_source().with_transform(Affine3A::from_scale(Vec3::splat(f32::INFINITY)));
        let result = VoronoiGenerator::new().shatter(&scaled, &config(1, 8));
        assert!(matches!(result, Err(ShatterError::InvalidConfig(_))));
    }

    #[test]
    fn test_every_cell_failing_is_generation_failure() {
        // Every triangle twice: each cell sees non-manifold edges
        let mut source = cube_source();
        let doubled = source.mesh.indices.clone();
        source.mesh.indices.extend(doubled);

        let result = VoronoiGenerator::new().shatter(&source, &config(42, 8));
        assert!(matches!(result, Err(ShatterError::GenerationFailed(_))));
    }

    #[test]
    fn test_failed_cells_are_dropped() {
        // One duplicated triangle only breaks the cells around it
        let mut source = cube_source();
        let first = source.mesh.indices[0];
        source.mesh.indices.push(first);

        let shatter = VoronoiGenerator::new().shatter(&source, &config(42, 24)).unwrap();
        assert!(!shatter.dropped().is_empty());
        assert!(shatter.fragment_count() > 0);
        assert!(shatter.fragment_count() + shatter.dropped().len() <= 24);
        for dropped in shatter.dropped() {
            assert!(matches!(
                &dropped.error,
                ShatterError::ClipFailure { cell, .. } if *cell == dropped.seed_index
            ));
            assert!(shatter.get_fragment(dropped.seed_index).is_none());
        }
        for fragment in shatter.fragments() {
            assert!(fragment.mesh.is_closed_manifold());
        }
    }

    #[test]
    fn test_cancelled_while_clipping() {
        let token = CancelToken::new();
        let generator = VoronoiGenerator::new().with_cancel_token(token.clone());
        let mesh = TriMesh::cuboid(Vec3::splat(0.5));
        let bounds = Bounds::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let seeds = crate::generation::SampleGenerator::new(4, 12)
            .unwrap()
            .generate(&bounds, &UniformDensity);
        let cells = VoronoiPartitioner::new(bounds).partition(&seeds).unwrap();

        assert_eq!(generator.clip_cells(&mesh, &cells, ClipOptions::default()).unwrap().len(), 12);

        token.cancel();
        let result = generator.clip_cells(&mesh, &cells, ClipOptions::default());
        assert_eq!(result.unwrap_err(), ShatterError::Cancelled { stage: Stage::Clipping });
    }

    #[test]
    fn test_cancelled_mid_run() {
        // Cancelling while seeds are drawn stops the run at the next stage
        let token = CancelToken::new();
        let generator = VoronoiGenerator::new().with_cancel_token(token.clone());
        let density = |_: Vec3| -> f32 {
            token.cancel();
            1.0
        };

        let result = generator.shatter_with_density(&cube_source(), &config(2, 8), &density);
        assert_eq!(result.unwrap_err(), ShatterError::Cancelled { stage: Stage::Partitioning });
        assert_eq!(generator.stage(), Stage::Idle);
    }

    #[test]
    fn test_clones_track_their_own_stage() {
        let generator = VoronoiGenerator::new();
        let clone = generator.clone();
        let seen = Mutex::new(Vec::new());
        let density = |_: Vec3| -> f32 {
            if let Ok(mut seen) = seen.lock() {
                seen.push((generator.stage(), clone.stage()));
            }
            1.0
        };

        generator.shatter_with_density(&cube_source(), &config(2, 8), &density).unwrap();
        let seen = seen.into_inner().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&s| s == (Stage::Sampling, Stage::Idle)));
        assert_eq!(generator.stage(), Stage::Idle);
    }

    #[test]
    fn test_interior_only_seeds() {
        let source = SourceMesh::new(TriMesh::icosphere(1.0, 2), SourceHandle(3));
        let config = GeneratorConfigBuilder::new()
            .seed(21)
            .num_samples(32)
            .unwrap()
            .interior_only(true)
            .build()
            .unwrap();
        let shatter = VoronoiGenerator::new().shatter(&source, &config).unwrap();

        assert!(shatter.seeds().len() < 32);
        let world = source.world_mesh();
        for seed in shatter.seeds() {
            assert!(world.contains_point(seed.position));
        }
        let expected = shatter.source_volume();
        assert!((shatter.total_volume() - expected).abs() < expected * 0.01);
    }

    #[test]
    fn test_relaxation_moves_seeds() {
        let relaxed_config = GeneratorConfigBuilder::new()
            .seed(17)
            .num_samples(16)
            .unwrap()
            .relax_iterations(3)
            .unwrap()
            .build()
            .unwrap();
        let generator = VoronoiGenerator::new();
        let plain = generator.shatter(&cube_source(), &config(17, 16)).unwrap();
        let relaxed = generator.shatter(&cube_source(), &relaxed_config).unwrap();

        assert_eq!(relaxed.seeds().len(), 16);
        assert_ne!(plain.seeds(), relaxed.seeds());
        assert!((relaxed.total_volume() - 1.0).abs() < 0.01);
        for fragment in relaxed.fragments() {
            assert!(fragment.mesh.is_closed_manifold());
        }
    }

    #[test]
    fn test_closure_density() {
        let generator = VoronoiGenerator::new();
        let left_half = |uvw: Vec3| -> f32 { if uvw.x < 0.5 { 1.0 } else { 0.0 } };
        let shatter = generator.shatter_with_density(&cube_source(), &config(6, 48), &left_half).unwrap();

        assert!(shatter.seeds().len() < 48);
        assert!(shatter.seeds().iter().all(|s| s.position.x < 1e-5));
        assert!((shatter.total_volume() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_noise_density() {
        let generator = VoronoiGenerator::new();
        let noise = NoiseDensity::new(3).with_frequency(2.0);
        let a = generator.shatter_with_density(&cube_source(), &config(6, 48), &noise).unwrap();
        let b = generator.shatter_with_density(&cube_source(), &config(6, 48), &noise).unwrap();

        assert!(a.seeds().len() < 48);
        assert_eq!(a.fragments(), b.fragments());
        assert!((a.total_volume() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_transformed_source() {
        let transform = Affine3A::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(10.0, -3.0, 5.0),
        );
        let source = cube_source().with_transform(transform);
        let shatter = VoronoiGenerator::new().shatter(&source, &config(5, 12)).unwrap();

        assert!((shatter.total_volume() - 8.0).abs() < 0.08);
        let world = source.world_mesh().bounds().unwrap().expanded(1e-3);
        for fragment in shatter.fragments() {
            assert!(world.contains(fragment.position));
        }
    }

    #[test]
    fn test_neighbors_and_hops() {
        let shatter = VoronoiGenerator::new().shatter(&cube_source(), &config(3, 24)).unwrap();
        let first = shatter.fragments()[0].seed_index;

        let neighbors = shatter.fragment_neighbors(first);
        assert!(!neighbors.is_empty());
        for &n in &neighbors {
            assert!(shatter.fragment_neighbors(n).contains(&first));
        }

        assert_eq!(shatter.find_fragments_within_hops(first, 0), vec![first]);
        assert_eq!(shatter.find_fragments_within_hops(first, 1).len(), 1 + neighbors.len());
        assert!(shatter.find_fragments_within_hops(first, 2).len() >= neighbors.len() + 1);
        assert!(shatter.find_fragments_within_hops(usize::MAX, 2).is_empty());
    }

    #[cfg(feature = "spatial-index")]
    #[test]
    fn test_find_fragment_at() {
        let shatter = VoronoiGenerator::new().shatter(&cube_source(), &config(11, 16)).unwrap();
        for fragment in shatter.fragments() {
            let found = shatter.find_fragment_at(fragment.position).unwrap();
            assert_eq!(found.seed_index, fragment.seed_index);
        }
    }

    #[test]
    fn test_determinism() {
        let generator = VoronoiGenerator::new();
        let a = generator.create_from_mesh(&cube_source(), &config(99, 16)).unwrap();
        let b = generator.create_from_mesh(&cube_source(), &config(99, 16)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_density_texture_reduces_fragments() {
        // Only the lower half along x accepts seeds
        let texture = VolumeTexture::from_fn(4, 1, 1, |x, _, _| if x < 2 { 1.0 } else { 0.0 });
        let config = GeneratorConfigBuilder::new()
            .seed(8)
            .num_samples(40)
            .unwrap()
            .density(texture)
            .build()
            .unwrap();
        let shatter = VoronoiGenerator::new().shatter(&cube_source(), &config).unwrap();

        assert!(shatter.seeds().len() < 40);
        assert!(shatter.seeds().iter().all(|s| s.position.x < 0.125 + 1e-5));
        assert!((shatter.total_volume() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Clipping.to_string(), "clipping");
        assert_eq!(Stage::from_u8(Stage::Partitioning as u8), Stage::Partitioning);
        assert_eq!(Stage::from_u8(200), Stage::Idle);
    }
}
