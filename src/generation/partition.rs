//! Bounded 3D Voronoi partition of seed points
//!
//! Every cell starts as the partition bounds and is cut by the bisector
//! planes of the other seeds, nearest first. Once the next seed is farther
//! than twice the cell's radius no later bisector can reach the cell, so the
//! loop stops (the security radius used by voro++ style cell builders).
//! Bisectors that survive as faces are exactly the Delaunay edges of the
//! seed, which gives the neighbor graph without building tetrahedra.

use std::collections::HashSet;

use glam::{DVec3, Vec3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "spatial-index")]
use kiddo::immutable::float::kdtree::ImmutableKdTree;
#[cfg(feature = "spatial-index")]
use kiddo::SquaredEuclidean;
#[cfg(feature = "spatial-index")]
use std::num::NonZeroUsize;

use super::polyhedron::ConvexCell;
use super::sampling::SeedPoint;
use crate::cell::{Cell, CellPlane, HalfSpace, PlaneSource};
use crate::error::{Result, ShatterError};
use crate::mesh::Bounds;

/// Relative tolerance used when none is configured
const DEFAULT_EPSILON: f64 = 1e-9;

/// Candidates fetched per seed before the batch grows
const INITIAL_CANDIDATES: usize = 32;

/// Outward normals of the bounds faces, indexed like [`PlaneSource::Bound`]
const BOUND_NORMALS: [DVec3; 6] = [
    DVec3::NEG_X,
    DVec3::X,
    DVec3::NEG_Y,
    DVec3::Y,
    DVec3::NEG_Z,
    DVec3::Z,
];

/// Bounded geometry of a cell, used by relaxation
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellGeometry {
    pub volume: f64,
    pub centroid: DVec3,
}

/// Computes bounded Voronoi cells for a set of seeds
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// let bounds = Bounds::new(Vec3::ZERO, Vec3::ONE);
/// let seeds: Vec<SeedPoint> = [
///     Vec3::new(0.2, 0.2, 0.2),
///     Vec3::new(0.8, 0.2, 0.2),
///     Vec3::new(0.2, 0.8, 0.2),
///     Vec3::new(0.2, 0.2, 0.8),
/// ]
/// .into_iter()
/// .map(SeedPoint::new)
/// .collect();
///
/// let cells = VoronoiPartitioner::new(bounds).partition(&seeds).unwrap();
/// assert_eq!(cells.len(), 4);
/// assert!(cells[0].neighbors.contains(&1));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VoronoiPartitioner {
    bounds: Bounds,
    epsilon: f64,
}

impl VoronoiPartitioner {
    /// Partitioner clipping cells to `bounds`
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            epsilon: DEFAULT_EPSILON,
        }
    }

    /// Set the geometric tolerance, relative to the bounds diagonal
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.max(0.0);
        self
    }

    /// Bounds every cell is clipped to
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Compute one cell per seed, in seed order
    ///
    /// # Arguments
    ///
    /// * `seeds` - At least 4 seeds spanning a volume
    ///
    /// # Returns
    ///
    /// `Result<Vec<Cell>>` - `cells[i]` belongs to `seeds[i]`
    ///
    /// # Errors
    ///
    /// Returns `DegenerateInput` if fewer than 4 seeds are given or all
    /// seeds lie in one plane.
    pub fn partition(&self, seeds: &[SeedPoint]) -> Result<Vec<Cell>> {
        Ok(self
            .partition_with_geometry(seeds)?
            .into_iter()
            .map(|(cell, _)| cell)
            .collect())
    }

    /// Like [`partition`](Self::partition), also returning bounded volumes
    /// and centroids
    pub(crate) fn partition_with_geometry(
        &self,
        seeds: &[SeedPoint],
    ) -> Result<Vec<(Cell, CellGeometry)>> {
        let points: Vec<DVec3> = seeds.iter().map(|s| s.position.as_dvec3()).collect();
        let epsilon = self.absolute_epsilon();
        check_affine_span(&points, epsilon)?;

        let candidates = Candidates::new(&points);
        let build = |index: usize| self.build_cell(index, &candidates, epsilon);

        #[cfg(feature = "parallel")]
        let cells = (0..points.len()).into_par_iter().map(build).collect();
        #[cfg(not(feature = "parallel"))]
        let cells = (0..points.len()).map(build).collect();

        Ok(cells)
    }

    fn absolute_epsilon(&self) -> f64 {
        (f64::from(self.bounds.diagonal()) * self.epsilon).max(f64::MIN_POSITIVE)
    }

    fn build_cell(&self, index: usize, candidates: &Candidates<'_>, epsilon: f64) -> (Cell, CellGeometry) {
        let points = candidates.points;
        let seed = points[index];
        let empty = || {
            (
                Cell::empty(index, seed.as_vec3()),
                CellGeometry {
                    volume: 0.0,
                    centroid: seed,
                },
            )
        };

        let mut polyhedron = ConvexCell::from_bounds(&self.bounds);
        let mut radius = polyhedron.max_radius(seed);

        // Batches grow until the security radius is reached or every seed was seen
        let others = points.len() - 1;
        let mut batch = INITIAL_CANDIDATES.min(others);
        let mut visited = HashSet::new();
        'search: loop {
            for (distance_squared, j) in candidates.nearest(index, batch) {
                if !visited.insert(j) {
                    continue;
                }
                let distance = distance_squared.sqrt();
                if distance <= epsilon {
                    // Coincident seeds: the lower index keeps the region
                    if j < index {
                        return empty();
                    }
                    continue;
                }
                // Seeds beyond twice the radius cannot cut the cell
                if distance * 0.5 > radius + epsilon {
                    break 'search;
                }

                let plane = HalfSpace::bisector(seed, points[j]);
                if polyhedron.clip(&plane, PlaneSource::Neighbor(j), epsilon) {
                    if polyhedron.is_empty() {
                        return empty();
                    }
                    radius = polyhedron.max_radius(seed);
                }
            }
            if batch >= others {
                break;
            }
            batch = (batch * 2).min(others);
        }

        if polyhedron.is_empty() {
            return empty();
        }

        let mut planes = Vec::new();
        let mut neighbors = Vec::new();
        for source in polyhedron.sources() {
            let half_space = match source {
                PlaneSource::Neighbor(j) => {
                    neighbors.push(j);
                    HalfSpace::bisector(seed, points[j])
                }
                PlaneSource::Bound(face) => self.bound_plane(face),
            };
            planes.push(CellPlane { half_space, source });
        }

        let (volume, centroid) = polyhedron.volume_and_centroid();
        let cell = Cell {
            seed_index: index,
            seed: seed.as_vec3(),
            planes,
            neighbors,
        };
        (cell, CellGeometry { volume, centroid })
    }

    fn bound_plane(&self, face: u8) -> HalfSpace {
        let normal = BOUND_NORMALS[face as usize % 6];
        let point = if face % 2 == 0 {
            self.bounds.min
        } else {
            self.bounds.max
        };
        HalfSpace::new(normal, point.as_dvec3())
    }
}

/// Other seeds of a cell, nearest first
///
/// With `spatial-index` the seeds go into a KD-tree and each cell asks for
/// a growing number of nearest neighbors, otherwise every cell sorts all
/// seeds.
struct Candidates<'a> {
    points: &'a [DVec3],
    #[cfg(feature = "spatial-index")]
    tree: ImmutableKdTree<f64, usize, 3, 32>,
}

impl<'a> Candidates<'a> {
    fn new(points: &'a [DVec3]) -> Self {
        #[cfg(feature = "spatial-index")]
        let tree = {
            let coords: Vec<[f64; 3]> = points.iter().map(|p| p.to_array()).collect();
            ImmutableKdTree::new_from_slice(&coords)
        };
        Self {
            points,
            #[cfg(feature = "spatial-index")]
            tree,
        }
    }

    /// Up to `count` seeds other than `index`, ordered by distance then index
    fn nearest(&self, index: usize, count: usize) -> Vec<(f64, usize)> {
        let seed = self.points[index];
        let distance = |j: usize| (self.points[j].distance_squared(seed), j);

        #[cfg(feature = "spatial-index")]
        let mut order: Vec<(f64, usize)> = match NonZeroUsize::new(count + 1) {
            Some(quantity) if count < self.points.len() - 1 => self
                .tree
                .nearest_n::<SquaredEuclidean>(&seed.to_array(), quantity)
                .into_iter()
                .map(|n| n.item)
                .filter(|&j| j != index)
                .map(distance)
                .collect(),
            _ => self.all_except(index, distance),
        };
        #[cfg(not(feature = "spatial-index"))]
        let mut order = self.all_except(index, distance);

        // Ties broken by index so the result is reproducible
        order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        order.truncate(count);
        order
    }

    fn all_except(&self, index: usize, distance: impl Fn(usize) -> (f64, usize)) -> Vec<(f64, usize)> {
        (0..self.points.len()).filter(|&j| j != index).map(distance).collect()
    }
}

/// Check that points span a volume
///
/// # Errors
///
/// Returns `DegenerateInput` for fewer than 4 points, or points that are
/// coincident, collinear or coplanar within `epsilon`.
pub(crate) fn check_affine_span(points: &[DVec3], epsilon: f64) -> Result<()> {
    if points.len() < 4 {
        return Err(ShatterError::DegenerateInput(format!(
            "at least 4 non-coplanar seeds are required, got {}",
            points.len()
        )));
    }

    let p0 = points[0];
    let (spread, p1) = farthest(points, |p| p.distance(p0));
    if spread <= epsilon {
        return Err(ShatterError::DegenerateInput("all seeds coincide".to_string()));
    }

    let axis = (p1 - p0) / spread;
    let (offset, p2) = farthest(points, |p| (p - p0).reject_from_normalized(axis).length());
    if offset <= epsilon {
        return Err(ShatterError::DegenerateInput("all seeds are collinear".to_string()));
    }

    let normal = axis.cross(p2 - p0).normalize();
    let (height, _) = farthest(points, |p| (p - p0).dot(normal).abs());
    if height <= epsilon {
        return Err(ShatterError::DegenerateInput("all seeds are coplanar".to_string()));
    }

    Ok(())
}

/// Point with the highest score, and that score
fn farthest(points: &[DVec3], score: impl Fn(DVec3) -> f64) -> (f64, DVec3) {
    points
        .iter()
        .map(|&p| (score(p), p))
        .fold((f64::NEG_INFINITY, points[0]), |best, cur| if cur.0 > best.0 { cur } else { best })
}

/// Seed positions as plain vectors
pub(crate) fn seed_positions(seeds: &[SeedPoint]) -> Vec<Vec3> {
    seeds.iter().map(|s| s.position).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::sampling::SampleGenerator;
    use crate::density::UniformDensity;

    fn seeds(points: &[Vec3]) -> Vec<SeedPoint> {
        points.iter().copied().map(SeedPoint::new).collect()
    }

    fn unit_bounds() -> Bounds {
        Bounds::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn test_too_few_seeds() {
        let partitioner = VoronoiPartitioner::new(unit_bounds());
        let result = partitioner.partition(&seeds(&[Vec3::ZERO, Vec3::X, Vec3::Y]));
        assert!(matches!(result, Err(ShatterError::DegenerateInput(_))));
    }

    #[test]
    fn test_coplanar_seeds() {
        let partitioner = VoronoiPartitioner::new(unit_bounds());
        let flat = seeds(&[
            Vec3::new(0.1, 0.1, 0.5),
            Vec3::new(0.9, 0.1, 0.5),
            Vec3::new(0.1, 0.9, 0.5),
            Vec3::new(0.9, 0.9, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
        ]);
        let result = partitioner.partition(&flat);
        assert!(matches!(result, Err(ShatterError::DegenerateInput(_))));
    }

    #[test]
    fn test_collinear_and_coincident_seeds() {
        let partitioner = VoronoiPartitioner::new(unit_bounds());
        let line = seeds(&[Vec3::ZERO, Vec3::splat(0.25), Vec3::splat(0.5), Vec3::ONE]);
        assert!(partitioner.partition(&line).is_err());

        let same = seeds(&[Vec3::splat(0.5); 5]);
        assert!(partitioner.partition(&same).is_err());
    }

    #[test]
    fn test_cells_fill_bounds() {
        let bounds = unit_bounds();
        let generator = SampleGenerator::new(7, 40).unwrap();
        let seeds = generator.generate(&bounds, &UniformDensity);
        let cells = VoronoiPartitioner::new(bounds)
            .partition_with_geometry(&seeds)
            .unwrap();

        let total: f64 = cells.iter().map(|(_, g)| g.volume).sum();
        assert!((total - 1.0).abs() < 1e-6);

        for (cell, geometry) in &cells {
            assert!(!cell.is_empty());
            assert!(cell.contains(cell.seed, 1e-6));
            assert!(cell.contains(geometry.centroid.as_vec3(), 1e-5));
        }
    }

    #[test]
    fn test_candidates_nearest_first() {
        let seeds = SampleGenerator::new(5, 120).unwrap().generate(&unit_bounds(), &UniformDensity);
        let points: Vec<DVec3> = seeds.iter().map(|s| s.position.as_dvec3()).collect();
        let candidates = Candidates::new(&points);

        for index in [0, 17, 119] {
            let full = candidates.nearest(index, points.len() - 1);
            assert_eq!(full.len(), points.len() - 1);
            assert!(full.windows(2).all(|w| w[0].0 <= w[1].0));

            let few = candidates.nearest(index, 8);
            assert_eq!(few, full[..8].to_vec());
        }
    }

    #[test]
    fn test_many_seeds_fill_bounds() {
        // More seeds than one candidate batch
        let bounds = unit_bounds();
        let seeds = SampleGenerator::new(99, 400).unwrap().generate(&bounds, &UniformDensity);
        let cells = VoronoiPartitioner::new(bounds).partition_with_geometry(&seeds).unwrap();

        let total: f64 = cells.iter().map(|(_, g)| g.volume).sum();
        assert!((total - 1.0).abs() < 1e-6);
        for (cell, _) in &cells {
            for &n in &cell.neighbors {
                assert!(cells[n].0.neighbors.contains(&cell.seed_index));
            }
        }
    }

    #[test]
    fn test_neighbor_symmetry() {
        let bounds = unit_bounds();
        let seeds = SampleGenerator::new(12345, 30).unwrap().generate(&bounds, &UniformDensity);
        let cells = VoronoiPartitioner::new(bounds).partition(&seeds).unwrap();

        for cell in &cells {
            assert!(!cell.neighbors.is_empty());
            for &n in &cell.neighbors {
                assert!(
                    cells[n].neighbors.contains(&cell.seed_index),
                    "neighbor relationship should be symmetric"
                );
            }
        }
    }

    #[test]
    fn test_grid_degeneracy_is_deterministic() {
        // Eight cospherical seeds: every cell meets the others in one point
        let bounds = unit_bounds();
        let mut grid = Vec::new();
        for z in [0.25, 0.75] {
            for y in [0.25, 0.75] {
                for x in [0.25, 0.75] {
                    grid.push(Vec3::new(x, y, z));
                }
            }
        }
        let partitioner = VoronoiPartitioner::new(bounds);
        let first = partitioner.partition_with_geometry(&seeds(&grid)).unwrap();
        let second = partitioner.partition(&seeds(&grid)).unwrap();

        for ((cell, geometry), again) in first.iter().zip(&second) {
            assert_eq!(cell, again);
            assert!((geometry.volume - 0.125).abs() < 1e-9);
            // Only the three face-adjacent seeds share a face
            assert_eq!(cell.neighbors.len(), 3);
        }
    }

    #[test]
    fn test_coincident_seed_gets_empty_cell() {
        let points = [
            Vec3::new(0.2, 0.2, 0.2),
            Vec3::new(0.8, 0.2, 0.2),
            Vec3::new(0.2, 0.8, 0.2),
            Vec3::new(0.2, 0.2, 0.8),
            Vec3::new(0.8, 0.2, 0.2),
        ];
        let cells = VoronoiPartitioner::new(unit_bounds()).partition(&seeds(&points)).unwrap();

        assert!(!cells[1].is_empty());
        assert!(cells[4].is_empty());
        assert!(!cells[0].neighbors.contains(&4));
    }

    #[test]
    fn test_bound_planes_face_outward() {
        let partitioner = VoronoiPartitioner::new(unit_bounds());
        for face in 0..6u8 {
            let plane = partitioner.bound_plane(face);
            assert!(plane.contains(DVec3::splat(0.5), 0.0));
            assert!(!plane.contains(DVec3::splat(0.5) + plane.normal, 0.0));
        }
    }
}
