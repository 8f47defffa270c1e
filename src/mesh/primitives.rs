//! Closed primitive meshes for hosts, demos and tests

use glam::Vec3;
use parry3d::math::Point;
use parry3d::transformation;
use std::collections::HashMap;

use super::{Bounds, TriMesh};
use crate::error::Result;
use crate::generation::check_affine_span;

/// Counter-clockwise quads of a box, using the corner order of [`Bounds::corners`]
const BOX_QUADS: [[u32; 4]; 6] = [
    [0, 4, 6, 2], // -X
    [1, 3, 7, 5], // +X
    [0, 1, 5, 4], // -Y
    [2, 6, 7, 3], // +Y
    [0, 2, 3, 1], // -Z
    [4, 5, 7, 6], // +Z
];

impl TriMesh {
    /// Axis-aligned box centered at the origin
    pub fn cuboid(half_extents: Vec3) -> TriMesh {
        Self::from_bounds(&Bounds::new(-half_extents, half_extents))
    }

    /// Box filling `bounds`
    pub fn from_bounds(bounds: &Bounds) -> TriMesh {
        let indices = BOX_QUADS
            .iter()
            .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
            .collect();
        TriMesh {
            positions: bounds.corners().to_vec(),
            indices,
        }
    }

    /// Regular tetrahedron with vertices on a sphere of `radius`
    pub fn tetrahedron(radius: f32) -> TriMesh {
        let s = radius / 3f32.sqrt();
        TriMesh {
            positions: vec![
                Vec3::new(s, s, s),
                Vec3::new(s, -s, -s),
                Vec3::new(-s, s, -s),
                Vec3::new(-s, -s, s),
            ],
            indices: vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]],
        }
    }

    /// Geodesic sphere made by subdividing an icosahedron
    ///
    /// Each subdivision level multiplies the triangle count by four.
    pub fn icosphere(radius: f32, subdivisions: u32) -> TriMesh {
        let t = (1.0 + 5f32.sqrt()) / 2.0;
        let mut positions: Vec<Vec3> = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
        .collect();

        let mut indices: Vec<[u32; 3]> = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vec3>| -> u32 {
                let key = (a.min(b), a.max(b));
                *midpoints.entry(key).or_insert_with(|| {
                    let p = (positions[a as usize] + positions[b as usize]).normalize();
                    positions.push(p);
                    (positions.len() - 1) as u32
                })
            };

            indices = indices
                .iter()
                .flat_map(|&[a, b, c]| {
                    let ab = midpoint(a, b, &mut positions);
                    let bc = midpoint(b, c, &mut positions);
                    let ca = midpoint(c, a, &mut positions);
                    [[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]
                })
                .collect();
        }

        for p in &mut positions {
            *p *= radius;
        }

        let mut mesh = TriMesh { positions, indices };
        mesh.make_outward();
        mesh
    }

    /// Convex hull of a point cloud
    ///
    /// # Errors
    ///
    /// Returns `DegenerateInput` if the points do not span a volume.
    pub fn convex_hull(points: &[Vec3]) -> Result<TriMesh> {
        let scale = Bounds::from_points(points.iter().copied())
            .map(|b| b.diagonal())
            .unwrap_or(0.0);
        let span: Vec<_> = points.iter().map(|p| p.as_dvec3()).collect();
        check_affine_span(&span, f64::from(scale) * 1e-6)?;

        let cloud: Vec<Point<f32>> = points.iter().map(|p| Point::new(p.x, p.y, p.z)).collect();
        let (vertices, indices) = transformation::convex_hull(&cloud);

        let mut mesh = TriMesh {
            positions: vertices.iter().map(|v| Vec3::new(v.x, v.y, v.z)).collect(),
            indices,
        };
        mesh.make_outward();
        Ok(mesh)
    }

    /// Flip all triangles if the mesh is wound inside out
    fn make_outward(&mut self) {
        if self.volume() < 0.0 {
            for tri in &mut self.indices {
                tri.swap(1, 2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_cuboid() {
        let mesh = TriMesh::cuboid(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!((mesh.volume() - 48.0).abs() < 1e-4);
        assert!(mesh.is_closed_manifold());
    }

    #[test]
    fn test_tetrahedron() {
        let mesh = TriMesh::tetrahedron(1.0);
        assert!(mesh.volume() > 0.0);
        assert!(mesh.is_closed_manifold());
        for p in &mesh.positions {
            assert!((p.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_icosphere() {
        let mesh = TriMesh::icosphere(2.0, 2);
        assert_eq!(mesh.triangle_count(), 20 * 16);
        assert!(mesh.is_closed_manifold());

        let sphere_volume = 4.0 / 3.0 * PI * 8.0;
        let volume = mesh.volume();
        assert!(volume > 0.9 * sphere_volume && volume < sphere_volume);
    }

    #[test]
    fn test_convex_hull_of_cube_corners() {
        let mut points = Bounds::new(Vec3::ZERO, Vec3::ONE).corners().to_vec();
        points.push(Vec3::splat(0.5)); // interior point is discarded
        let hull = TriMesh::convex_hull(&points).unwrap();

        assert!((hull.volume() - 1.0).abs() < 1e-4);
        assert!(hull.is_closed_manifold());
    }

    #[test]
    fn test_convex_hull_rejects_flat_input() {
        let points = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
        assert!(TriMesh::convex_hull(&points).is_err());
    }
}
