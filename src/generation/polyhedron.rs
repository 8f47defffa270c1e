//! Convex polyhedra cut down by half-spaces
//!
//! Each Voronoi cell is built by starting from the partition bounds and
//! clipping away everything on the far side of a bisector plane. Faces
//! remember which plane produced them, so the surviving faces name the
//! cell's Delaunay neighbors.

use glam::DVec3;

use crate::cell::{HalfSpace, PlaneSource};
use crate::mesh::Bounds;

/// Planar convex polygon, counter-clockwise seen from outside
#[derive(Debug, Clone)]
struct Face {
    vertices: Vec<DVec3>,
    source: PlaneSource,
}

/// Convex polyhedron as a list of outward-facing polygons
#[derive(Debug, Clone)]
pub(crate) struct ConvexCell {
    faces: Vec<Face>,
}

impl ConvexCell {
    /// Box filling `bounds`
    pub fn from_bounds(bounds: &Bounds) -> Self {
        let lo = bounds.min.as_dvec3();
        let hi = bounds.max.as_dvec3();
        let c = |x: bool, y: bool, z: bool| {
            DVec3::new(
                if x { hi.x } else { lo.x },
                if y { hi.y } else { lo.y },
                if z { hi.z } else { lo.z },
            )
        };
        let quads = [
            [c(false, false, false), c(false, false, true), c(false, true, true), c(false, true, false)],
            [c(true, false, false), c(true, true, false), c(true, true, true), c(true, false, true)],
            [c(false, false, false), c(true, false, false), c(true, false, true), c(false, false, true)],
            [c(false, true, false), c(false, true, true), c(true, true, true), c(true, true, false)],
            [c(false, false, false), c(false, true, false), c(true, true, false), c(true, false, false)],
            [c(false, false, true), c(true, false, true), c(true, true, true), c(false, true, true)],
        ];
        let faces = quads
            .iter()
            .enumerate()
            .map(|(i, quad)| Face {
                vertices: quad.to_vec(),
                source: PlaneSource::Bound(i as u8),
            })
            .collect();
        Self { faces }
    }

    /// Check whether everything has been clipped away
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Largest distance from `center` to a vertex (0 for an empty cell)
    pub fn max_radius(&self, center: DVec3) -> f64 {
        self.faces
            .iter()
            .flat_map(|f| f.vertices.iter())
            .map(|v| v.distance(center))
            .fold(0.0, f64::max)
    }

    /// Sources of the faces that are still present, sorted
    pub fn sources(&self) -> Vec<PlaneSource> {
        let mut sources: Vec<PlaneSource> = self.faces.iter().map(|f| f.source).collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Keep the part inside `plane`
    ///
    /// Vertices within `epsilon` of the plane count as on it. Returns `true`
    /// if the cell changed.
    pub fn clip(&mut self, plane: &HalfSpace, source: PlaneSource, epsilon: f64) -> bool {
        let mut any_outside = false;
        let mut any_inside = false;
        for v in self.faces.iter().flat_map(|f| f.vertices.iter()) {
            let d = plane.signed_distance(*v);
            any_outside |= d > epsilon;
            any_inside |= d < -epsilon;
        }
        if !any_outside {
            return false;
        }
        // Entirely outside: the cell vanishes
        if !any_inside {
            self.faces.clear();
            return true;
        }

        let snap = |d: f64| if d.abs() <= epsilon { 0.0 } else { d };
        let mut cut_points: Vec<DVec3> = Vec::new();
        let mut faces = Vec::with_capacity(self.faces.len() + 1);

        for face in &self.faces {
            let distances: Vec<f64> = face
                .vertices
                .iter()
                .map(|v| snap(plane.signed_distance(*v)))
                .collect();
            let n = face.vertices.len();
            let mut kept = Vec::with_capacity(n + 1);

            // Sutherland-Hodgman over the face outline
            for i in 0..n {
                let j = (i + 1) % n;
                let (a, b) = (face.vertices[i], face.vertices[j]);
                let (da, db) = (distances[i], distances[j]);
                if da <= 0.0 {
                    kept.push(a);
                    if da == 0.0 {
                        cut_points.push(a);
                    }
                }
                if (da < 0.0 && db > 0.0) || (da > 0.0 && db < 0.0) {
                    let p = a + (b - a) * (da / (da - db));
                    kept.push(p);
                    cut_points.push(p);
                }
            }

            dedup_ring(&mut kept, epsilon);
            if kept.len() >= 3 {
                faces.push(Face {
                    vertices: kept,
                    source: face.source,
                });
            }
        }

        // The cut points outline the new face on the plane
        let cap = order_cap(cut_points, plane, epsilon);
        if cap.len() >= 3 {
            faces.push(Face {
                vertices: cap,
                source,
            });
        }

        self.faces = faces;
        true
    }

    /// Enclosed volume and volume centroid
    pub fn volume_and_centroid(&self) -> (f64, DVec3) {
        let vertex_count: usize = self.faces.iter().map(|f| f.vertices.len()).sum();
        if vertex_count == 0 {
            return (0.0, DVec3::ZERO);
        }
        let reference: DVec3 =
            self.faces.iter().flat_map(|f| f.vertices.iter()).copied().sum::<DVec3>() / vertex_count as f64;

        let mut volume = 0.0;
        let mut moment = DVec3::ZERO;
        for face in &self.faces {
            let a = face.vertices[0];
            for w in face.vertices[1..].windows(2) {
                let (b, c) = (w[0], w[1]);
                let v = (a - reference).dot((b - reference).cross(c - reference)) / 6.0;
                volume += v;
                moment += v * (reference + a + b + c) / 4.0;
            }
        }

        if volume.abs() <= f64::EPSILON {
            return (0.0, reference);
        }
        (volume, moment / volume)
    }
}

/// Remove consecutive near-duplicate vertices of a closed ring
fn dedup_ring(ring: &mut Vec<DVec3>, epsilon: f64) {
    ring.dedup_by(|a, b| a.distance(*b) <= epsilon);
    while ring.len() > 1 && ring[0].distance(ring[ring.len() - 1]) <= epsilon {
        ring.pop();
    }
}

/// Order the cut points counter-clockwise around the plane normal
fn order_cap(mut points: Vec<DVec3>, plane: &HalfSpace, epsilon: f64) -> Vec<DVec3> {
    let mut unique: Vec<DVec3> = Vec::with_capacity(points.len());
    for p in points.drain(..) {
        if unique.iter().all(|q| q.distance(p) > epsilon) {
            unique.push(p);
        }
    }
    if unique.len() < 3 {
        return unique;
    }

    let center = unique.iter().copied().sum::<DVec3>() / unique.len() as f64;
    let (u, v) = plane.basis();
    let mut with_angle: Vec<(f64, DVec3)> = unique
        .into_iter()
        .map(|p| {
            let d = p - center;
            (d.dot(v).atan2(d.dot(u)), p)
        })
        .collect();
    with_angle.sort_by(|a, b| a.0.total_cmp(&b.0));
    with_angle.into_iter().map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn unit_box() -> ConvexCell {
        ConvexCell::from_bounds(&Bounds::new(Vec3::ZERO, Vec3::ONE))
    }

    #[test]
    fn test_box_volume() {
        let (volume, centroid) = unit_box().volume_and_centroid();
        assert!((volume - 1.0).abs() < 1e-12);
        assert!((centroid - DVec3::splat(0.5)).length() < 1e-12);
    }

    #[test]
    fn test_clip_in_half() {
        let mut cell = unit_box();
        let plane = HalfSpace::new(DVec3::X, DVec3::new(0.25, 0.0, 0.0));
        assert!(cell.clip(&plane, PlaneSource::Neighbor(9), 1e-9));

        let (volume, centroid) = cell.volume_and_centroid();
        assert!((volume - 0.25).abs() < 1e-12);
        assert!((centroid.x - 0.125).abs() < 1e-12);
        assert!(cell.sources().contains(&PlaneSource::Neighbor(9)));
        assert!(!cell.sources().contains(&PlaneSource::Bound(1)));
    }

    #[test]
    fn test_clip_diagonal_corner() {
        let mut cell = unit_box();
        let plane = HalfSpace::new(DVec3::ONE, DVec3::new(1.0, 0.0, 0.0));
        cell.clip(&plane, PlaneSource::Neighbor(0), 1e-9);

        let (volume, _) = cell.volume_and_centroid();
        assert!((volume - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_outside_and_away() {
        let mut cell = unit_box();
        let far = HalfSpace::new(DVec3::X, DVec3::new(5.0, 0.0, 0.0));
        assert!(!cell.clip(&far, PlaneSource::Neighbor(0), 1e-9));

        let everything = HalfSpace::new(DVec3::X, DVec3::new(-1.0, 0.0, 0.0));
        assert!(cell.clip(&everything, PlaneSource::Neighbor(1), 1e-9));
        assert!(cell.is_empty());
        assert_eq!(cell.max_radius(DVec3::ZERO), 0.0);
    }

    #[test]
    fn test_touching_plane_adds_no_face() {
        let mut cell = unit_box();
        // Plane through a single corner only touches the box
        let plane = HalfSpace::new(DVec3::ONE, DVec3::ONE);
        assert!(!cell.clip(&plane, PlaneSource::Neighbor(4), 1e-9));
        assert!(!cell.sources().contains(&PlaneSource::Neighbor(4)));
    }
}
