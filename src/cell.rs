//! Voronoi Cell Structure
//!
//! A cell is the region of space closer to its seed than to any other seed,
//! stored as an intersection of half-spaces. Cells carry no mesh data; the
//! geometry of a fragment comes from clipping the source mesh against them.

use glam::{DVec3, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closed half-space `normal · p <= offset`
///
/// Kept in double precision: bisector planes of nearby seeds are nearly
/// parallel and single precision loses the sliver between them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfSpace {
    /// Unit outward normal
    pub normal: DVec3,
    /// Plane offset along the normal
    pub offset: f64,
}

impl HalfSpace {
    /// Half-space with an outward `normal` (normalized here) through `point`
    pub fn new(normal: DVec3, point: DVec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            offset: normal.dot(point),
        }
    }

    /// Half-space of points at least as close to `seed` as to `other`
    pub fn bisector(seed: DVec3, other: DVec3) -> Self {
        Self::new(other - seed, (seed + other) * 0.5)
    }

    /// Signed distance, negative inside
    #[inline]
    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) - self.offset
    }

    /// Check whether a point is inside, allowing `epsilon` slack
    #[inline]
    pub fn contains(&self, point: DVec3, epsilon: f64) -> bool {
        self.signed_distance(point) <= epsilon
    }

    /// Orthonormal in-plane axes `(u, v)` with `u × v = normal`
    ///
    /// Polygons that are counter-clockwise in `(u, v)` face along the normal.
    pub fn basis(&self) -> (DVec3, DVec3) {
        let n = self.normal;
        let helper = if n.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
        let u = (helper - n * n.dot(helper)).normalize();
        let v = n.cross(u);
        (u, v)
    }
}

/// What produced a cell boundary plane
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlaneSource {
    /// Bisector with the seed at this index
    Neighbor(usize),
    /// Face of the partition bounds (0..6: -X, +X, -Y, +Y, -Z, +Z)
    Bound(u8),
}

/// One bounding plane of a cell
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPlane {
    /// The half-space itself
    pub half_space: HalfSpace,
    /// Neighbor seed or bounds face it came from
    pub source: PlaneSource,
}

/// A single bounded Voronoi cell
///
/// # Emptiness
///
/// A cell with no planes is empty: its seed coincides with a seed of lower
/// index (which keeps the region) or lies outside the partition bounds.
/// Clipping against an empty cell yields an empty mesh.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Index of the seed this cell belongs to
    pub seed_index: usize,

    /// Seed position
    pub seed: Vec3,

    /// Bounding planes, bisectors first (ordered by neighbor index) then
    /// bounds faces
    pub planes: Vec<CellPlane>,

    /// Indices of seeds sharing a face with this cell (Delaunay neighbors),
    /// sorted ascending
    pub neighbors: Vec<usize>,
}

impl Cell {
    /// Build a cell directly from half-spaces
    ///
    /// Useful for custom cuts (slabs, wedges) that do not come from a
    /// Voronoi partition. The cell has no neighbors.
    pub fn from_half_spaces(seed_index: usize, seed: Vec3, half_spaces: Vec<HalfSpace>) -> Self {
        let planes = half_spaces
            .into_iter()
            .enumerate()
            .map(|(i, half_space)| CellPlane {
                half_space,
                source: PlaneSource::Bound(i.min(u8::MAX as usize) as u8),
            })
            .collect();
        Self {
            seed_index,
            seed,
            planes,
            neighbors: Vec::new(),
        }
    }

    /// An empty cell for `seed_index`
    pub fn empty(seed_index: usize, seed: Vec3) -> Self {
        Self {
            seed_index,
            seed,
            planes: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    /// Check whether the cell covers no volume
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Get the number of neighboring cells
    #[inline]
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Iterate over the half-spaces only
    pub fn half_spaces(&self) -> impl Iterator<Item = &HalfSpace> + '_ {
        self.planes.iter().map(|p| &p.half_space)
    }

    /// Check whether a point lies inside every half-space (with slack)
    pub fn contains(&self, point: Vec3, epsilon: f32) -> bool {
        if self.is_empty() {
            return false;
        }
        let p = point.as_dvec3();
        self.half_spaces().all(|h| h.contains(p, f64::from(epsilon)))
    }
}
