//! Mesh clipping against convex cells
//!
//! The source mesh is cut by each half-space of a cell in turn. Triangles
//! crossing a plane are clipped Sutherland–Hodgman style with intersection
//! vertices shared along edges, and the opening left on the plane is closed
//! with a cap (see [`cap`]). The result is a closed mesh whenever the input
//! is closed.

mod cap;

use glam::DVec3;
use std::collections::HashMap;

use crate::cell::{Cell, HalfSpace};
use crate::config::ClipOptions;
use crate::error::{Result, ShatterError};
use crate::mesh::TriMesh;

/// Clips a closed source mesh against Voronoi cells
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// let cube = TriMesh::cuboid(Vec3::splat(0.5));
/// let slab = Cell::from_half_spaces(
///     0,
///     Vec3::ZERO,
///     vec![HalfSpace::new(DVec3::X, DVec3::ZERO)],
/// );
///
/// let half = MeshClipper::default().clip(&cube, &slab).unwrap();
/// assert!((half.volume() - 0.5).abs() < 1e-5);
/// assert!(half.is_closed_manifold());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshClipper {
    options: ClipOptions,
}

impl MeshClipper {
    /// Create a clipper with the given tolerances
    pub fn new(options: ClipOptions) -> Self {
        Self { options }
    }

    /// Clipping tolerances
    pub fn options(&self) -> &ClipOptions {
        &self.options
    }

    /// Intersect `mesh` with `cell`
    ///
    /// # Arguments
    ///
    /// * `mesh` - Closed, welded mesh in the cell's coordinate space
    /// * `cell` - Convex cell to keep
    ///
    /// # Returns
    ///
    /// The part of `mesh` inside `cell` with compact vertices and outward
    /// winding, or an empty mesh if the cell is empty or does not overlap
    /// the mesh.
    ///
    /// # Errors
    ///
    /// Returns `ClipFailure` if the share of open or non-manifold edges in
    /// the result exceeds [`ClipOptions::manifold_tolerance`].
    pub fn clip(&self, mesh: &TriMesh, cell: &Cell) -> Result<TriMesh> {
        if cell.is_empty() || mesh.is_empty() {
            return Ok(TriMesh::default());
        }
        let Some(bounds) = mesh.bounds() else {
            return Ok(TriMesh::default());
        };
        let epsilon = (f64::from(bounds.diagonal()) * self.options.epsilon).max(f64::MIN_POSITIVE);

        let corners = bounds.corners().map(|c| c.as_dvec3());
        let disjoint = cell
            .half_spaces()
            .any(|h| corners.iter().all(|&c| h.signed_distance(c) > epsilon));
        if disjoint {
            return Ok(TriMesh::default());
        }

        let mut work = WorkMesh::from_mesh(mesh);
        let mut open_chains = 0;
        for plane in cell.half_spaces() {
            match work.cut(plane, epsilon) {
                Cut::Inside => {}
                Cut::Outside => return Ok(TriMesh::default()),
                Cut::Capped { open } => open_chains += open,
            }
        }

        let result = work.into_mesh();
        let report = result.edge_report();
        if report.defect_ratio() > self.options.manifold_tolerance {
            return Err(ShatterError::ClipFailure {
                cell: cell.seed_index,
                reason: format!(
                    "{} boundary and {} non-manifold edges out of {} ({} open cap chains)",
                    report.boundary_edges, report.non_manifold_edges, report.edge_count, open_chains
                ),
            });
        }
        Ok(result)
    }
}

/// Outcome of cutting the working mesh with one plane
enum Cut {
    /// Nothing lies outside the plane
    Inside,
    /// Nothing lies inside the plane
    Outside,
    /// The mesh was cut and capped; `open` counts cap chains that did not close
    Capped { open: usize },
}

/// Double precision copy of the mesh being clipped
struct WorkMesh {
    positions: Vec<DVec3>,
    triangles: Vec<[u32; 3]>,
}

impl WorkMesh {
    fn from_mesh(mesh: &TriMesh) -> Self {
        let mut work = Self {
            positions: mesh.positions.iter().map(|p| p.as_dvec3()).collect(),
            triangles: mesh.indices.clone(),
        };
        work.compact();
        work
    }

    fn into_mesh(self) -> TriMesh {
        TriMesh {
            positions: self.positions.iter().map(|p| p.as_vec3()).collect(),
            indices: self.triangles,
        }
    }

    fn cut(&mut self, plane: &HalfSpace, epsilon: f64) -> Cut {
        let mut distances: Vec<f64> = self.positions.iter().map(|&p| plane.signed_distance(p)).collect();
        let mut sides: Vec<i8> = distances
            .iter()
            .map(|&d| {
                if d > epsilon {
                    1
                } else if d < -epsilon {
                    -1
                } else {
                    0
                }
            })
            .collect();

        if !sides.contains(&1) {
            return Cut::Inside;
        }
        if !sides.contains(&-1) {
            return Cut::Outside;
        }

        // Snap near-plane vertices onto the plane
        for (i, side) in sides.iter().enumerate() {
            if *side == 0 {
                self.positions[i] -= plane.normal * distances[i];
                distances[i] = 0.0;
            }
        }

        let mut kept = Vec::with_capacity(self.triangles.len());
        let mut cap_edges = Vec::new();
        let mut splits: HashMap<(u32, u32), u32> = HashMap::new();

        for tri in std::mem::take(&mut self.triangles) {
            let s = tri.map(|i| sides[i as usize]);
            if !s.contains(&-1) {
                // Outside, touching from outside, or coplanar
                continue;
            }
            if !s.contains(&1) {
                collect_cap_edges(&tri, &sides, &mut cap_edges);
                kept.push(tri);
                continue;
            }

            let mut polygon: Vec<u32> = Vec::with_capacity(4);
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                let (sa, sb) = (sides[a as usize], sides[b as usize]);
                if sa <= 0 {
                    polygon.push(a);
                }
                if sa * sb < 0 {
                    polygon.push(self.split_edge(a, b, &mut distances, &mut sides, &mut splits));
                }
            }
            collect_cap_edges(&polygon, &sides, &mut cap_edges);
            for k in 1..polygon.len().saturating_sub(1) {
                kept.push([polygon[0], polygon[k], polygon[k + 1]]);
            }
        }

        if kept.is_empty() {
            return Cut::Outside;
        }

        // Edges shared with coplanar geometry cancel out
        let edges = cap::cancel_opposite(cap_edges);
        let (loops, open) = cap::chain_loops(&edges);
        kept.extend(cap::triangulate(&loops, &self.positions, plane));

        self.triangles = kept;
        self.compact();
        Cut::Capped { open }
    }

    /// Vertex where edge `a`-`b` meets the plane, shared by both triangles
    /// using the edge
    fn split_edge(
        &mut self,
        a: u32,
        b: u32,
        distances: &mut Vec<f64>,
        sides: &mut Vec<i8>,
        splits: &mut HashMap<(u32, u32), u32>,
    ) -> u32 {
        let key = (a.min(b), a.max(b));
        if let Some(&index) = splits.get(&key) {
            return index;
        }
        // Interpolate from the lower index so both triangles get the same point
        let (lo, hi) = (key.0 as usize, key.1 as usize);
        let t = distances[lo] / (distances[lo] - distances[hi]);
        let point = self.positions[lo] + (self.positions[hi] - self.positions[lo]) * t;

        let index = self.positions.len() as u32;
        self.positions.push(point);
        distances.push(0.0);
        sides.push(0);
        splits.insert(key, index);
        index
    }

    /// Drop unreferenced vertices and triangles with repeated indices
    fn compact(&mut self) {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut positions = Vec::new();
        self.triangles.retain(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
        for tri in &mut self.triangles {
            for index in tri.iter_mut() {
                let slot = &mut remap[*index as usize];
                if *slot == u32::MAX {
                    *slot = positions.len() as u32;
                    positions.push(self.positions[*index as usize]);
                }
                *index = *slot;
            }
        }
        self.positions = positions;
    }
}

/// Record reversed copies of polygon edges lying on the plane
fn collect_cap_edges(polygon: &[u32], sides: &[i8], out: &mut Vec<(u32, u32)>) {
    let n = polygon.len();
    for k in 0..n {
        let (a, b) = (polygon[k], polygon[(k + 1) % n]);
        if sides[a as usize] == 0 && sides[b as usize] == 0 {
            out.push((b, a));
        }
    }
}
