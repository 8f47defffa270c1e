//! Triangle meshes consumed and produced by the fracture pipeline
//!
//! Meshes are engine-agnostic indexed triangle lists:
//! - Bevy: Convert to `Mesh` with `ATTRIBUTE_POSITION` and `Indices::U32`
//! - Godot: Convert to `ArrayMesh` via `flat_indices()`
//! - wgpu: Use directly as vertex/index buffers

mod bounds;
mod primitives;
mod topology;

pub use bounds::Bounds;
pub use topology::{analyze_edges, EdgeReport};

use glam::{Affine3A, DVec3, Vec3};
use std::collections::HashMap;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShatterError};

/// Indexed triangle mesh
///
/// Triangles are wound counter-clockwise when seen from outside, so closed
/// meshes have positive [`TriMesh::volume`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Triangle vertex indices
    pub indices: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Create a mesh, validating that every index refers to a vertex
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range indices or non-finite positions.
    pub fn new(positions: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self> {
        let mesh = Self { positions, indices };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Check that every index refers to a vertex and every position is finite
    ///
    /// Fields are public, so meshes built as struct literals are only
    /// checked here.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first offending vertex or triangle.
    pub fn validate(&self) -> Result<()> {
        if let Some((i, p)) = self.positions.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(ShatterError::InvalidConfig(format!(
                "mesh vertex {} has non-finite position {}",
                i, p
            )));
        }
        let count = self.positions.len() as u32;
        if let Some(tri) = self.indices.iter().find(|t| t.iter().any(|&i| i >= count)) {
            return Err(ShatterError::InvalidConfig(format!(
                "triangle {:?} references a vertex outside 0..{}",
                tri, count
            )));
        }
        Ok(())
    }

    /// Create a mesh from a flat index buffer (three indices per triangle)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the index count is not a multiple of three
    /// or an index is out of range.
    pub fn from_flat_indices(positions: Vec<Vec3>, indices: &[u32]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(ShatterError::InvalidConfig(format!(
                "index buffer length {} is not a multiple of 3",
                indices.len()
            )));
        }
        let triangles = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Self::new(positions, triangles)
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Check if the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Flat index buffer for engines that expect `[u32]`
    pub fn flat_indices(&self) -> Vec<u32> {
        self.indices.iter().flatten().copied().collect()
    }

    /// Corner positions of one triangle
    #[inline]
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.indices[index];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Bounding box of the vertices used by triangles
    ///
    /// Unreferenced vertices are ignored. Returns `None` when no triangle
    /// references a vertex.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(
            self.indices
                .iter()
                .flatten()
                .filter_map(|&i| self.positions.get(i as usize).copied()),
        )
    }

    /// Enclosed volume (divergence theorem), positive for outward winding
    pub fn volume(&self) -> f32 {
        self.volume_and_moment().0 as f32
    }

    /// Volume centroid, `None` when the enclosed volume is degenerate
    pub fn centroid(&self) -> Option<Vec3> {
        let (volume, moment) = self.volume_and_moment();
        if volume.abs() <= f64::EPSILON {
            return None;
        }
        Some((moment / volume).as_vec3())
    }

    /// Average of all vertex positions, `None` for an empty mesh
    pub fn vertex_centroid(&self) -> Option<Vec3> {
        if self.positions.is_empty() {
            return None;
        }
        let sum: DVec3 = self.positions.iter().map(|p| p.as_dvec3()).sum();
        Some((sum / self.positions.len() as f64).as_vec3())
    }

    fn volume_and_moment(&self) -> (f64, DVec3) {
        let mut volume = 0.0;
        let mut moment = DVec3::ZERO;
        for tri in &self.indices {
            let a = self.positions[tri[0] as usize].as_dvec3();
            let b = self.positions[tri[1] as usize].as_dvec3();
            let c = self.positions[tri[2] as usize].as_dvec3();
            let v = a.dot(b.cross(c)) / 6.0;
            volume += v;
            moment += v * (a + b + c) / 4.0;
        }
        (volume, moment)
    }

    /// Total triangle area
    pub fn surface_area(&self) -> f32 {
        (0..self.indices.len())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                (b - a).cross(c - a).length() * 0.5
            })
            .sum()
    }

    /// Unit normal of every triangle (zero for degenerate triangles)
    pub fn face_normals(&self) -> Vec<Vec3> {
        (0..self.indices.len())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                (b - a).cross(c - a).normalize_or_zero()
            })
            .collect()
    }

    /// Edge sharing report (see [`EdgeReport`])
    pub fn edge_report(&self) -> EdgeReport {
        analyze_edges(&self.indices)
    }

    /// Check that the mesh is a closed, consistently wound manifold
    pub fn is_closed_manifold(&self) -> bool {
        !self.is_empty() && self.edge_report().is_manifold()
    }

    /// Copy with every vertex moved by `offset`
    pub fn translated(&self, offset: Vec3) -> TriMesh {
        TriMesh {
            positions: self.positions.iter().map(|&p| p + offset).collect(),
            indices: self.indices.clone(),
        }
    }

    /// Copy with `transform` applied to every vertex
    ///
    /// Mirroring transforms flip the winding so the result keeps outward
    /// facing triangles.
    pub fn transformed(&self, transform: &Affine3A) -> TriMesh {
        let positions = self
            .positions
            .iter()
            .map(|&p| transform.transform_point3(p))
            .collect();
        let indices = if transform.matrix3.determinant() < 0.0 {
            self.indices.iter().map(|&[a, b, c]| [a, c, b]).collect()
        } else {
            self.indices.clone()
        };
        TriMesh { positions, indices }
    }

    /// Merge vertices closer than `epsilon` and drop collapsed triangles
    ///
    /// Host meshes are often triangle soups with split vertices along hard
    /// edges; clipping needs shared vertices to close its cuts.
    pub fn welded(&self, epsilon: f32) -> TriMesh {
        let cell = f64::from(epsilon.max(f32::MIN_POSITIVE));
        let mut lookup: HashMap<[i64; 3], u32> = HashMap::with_capacity(self.positions.len());
        let mut positions = Vec::with_capacity(self.positions.len());
        let remap: Vec<u32> = self
            .positions
            .iter()
            .map(|p| {
                let q = p.as_dvec3() / cell;
                let key = [q.x.round() as i64, q.y.round() as i64, q.z.round() as i64];
                *lookup.entry(key).or_insert_with(|| {
                    positions.push(*p);
                    (positions.len() - 1) as u32
                })
            })
            .collect();

        let indices = self
            .indices
            .iter()
            .map(|t| [remap[t[0] as usize], remap[t[1] as usize], remap[t[2] as usize]])
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
            .collect();

        TriMesh { positions, indices }
    }

    /// Generalized winding number of `point` with respect to the surface
    ///
    /// About 1 inside a closed outward-wound mesh and 0 outside.
    pub fn winding_number(&self, point: Vec3) -> f32 {
        let p = point.as_dvec3();
        let mut total = 0.0;
        for tri in &self.indices {
            let a = self.positions[tri[0] as usize].as_dvec3() - p;
            let b = self.positions[tri[1] as usize].as_dvec3() - p;
            let c = self.positions[tri[2] as usize].as_dvec3() - p;
            let (la, lb, lc) = (a.length(), b.length(), c.length());
            let numerator = a.dot(b.cross(c));
            let denominator = la * lb * lc + a.dot(b) * lc + a.dot(c) * lb + b.dot(c) * la;
            total += 2.0 * numerator.atan2(denominator);
        }
        (total / (4.0 * PI)) as f32
    }

    /// Check whether a point lies inside the closed surface
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.winding_number(point) > 0.5
    }
}

/// Opaque identifier of the host mesh instance a fragment was cut from
///
/// The crate never dereferences it; hosts map it back to their own scene
/// objects (a Godot instance id, an ECS entity, ...).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceHandle(pub u64);

/// A mesh instance to fracture: geometry, world transform and host handle
#[derive(Debug, Clone)]
pub struct SourceMesh {
    /// Geometry in the instance's local space
    pub mesh: TriMesh,
    /// Local-to-world transform
    pub transform: Affine3A,
    /// Handle copied into every fragment
    pub handle: SourceHandle,
}

impl SourceMesh {
    /// Source with an identity transform
    pub fn new(mesh: TriMesh, handle: SourceHandle) -> Self {
        Self {
            mesh,
            transform: Affine3A::IDENTITY,
            handle,
        }
    }

    /// Set the local-to-world transform
    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }

    /// Geometry in world space
    pub fn world_mesh(&self) -> TriMesh {
        self.mesh.transformed(&self.transform)
    }
}
