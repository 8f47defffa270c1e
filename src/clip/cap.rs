//! Cap construction for planar cuts
//!
//! After a cut, the boundary edges left on the plane are chained into
//! loops, split into outer boundaries and holes by their signed area in the
//! plane, holes are bridged into their enclosing loop, and the result is
//! ear-clipped. Loops arrive already oriented so that the cap faces along
//! the plane normal.

use glam::{DVec2, DVec3};
use std::collections::{BTreeMap, HashMap};

use crate::cell::HalfSpace;

type Ring = Vec<(u32, DVec2)>;

/// Remove pairs of opposite directed edges
///
/// Returns the remaining edges sorted, with multiplicity.
pub(super) fn cancel_opposite(edges: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    let mut pending: HashMap<(u32, u32), usize> = HashMap::with_capacity(edges.len());
    for (a, b) in edges {
        // A reversed edge cancels one pending copy
        if let Some(count) = pending.get_mut(&(b, a)).filter(|count| **count > 0) {
            *count -= 1;
            continue;
        }
        *pending.entry((a, b)).or_insert(0) += 1;
    }

    let mut remaining: Vec<(u32, u32)> = pending
        .into_iter()
        .flat_map(|(edge, count)| std::iter::repeat(edge).take(count))
        .collect();
    remaining.sort_unstable();
    remaining
}

/// Chain directed edges into closed loops
///
/// A vertex visited twice splits off a sub-loop, so pinched cross sections
/// become separate loops. Returns the loops and the number of chains that
/// ended without closing.
pub(super) fn chain_loops(edges: &[(u32, u32)]) -> (Vec<Vec<u32>>, usize) {
    let mut outgoing: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for &(a, b) in edges {
        outgoing.entry(a).or_default().push(b);
    }
    // Pop smallest end first
    for ends in outgoing.values_mut() {
        ends.sort_unstable_by(|a, b| b.cmp(a));
    }

    let starts: Vec<u32> = outgoing.keys().copied().collect();
    let mut loops = Vec::new();
    let mut open = 0;

    for start in starts {
        while outgoing.get(&start).is_some_and(|ends| !ends.is_empty()) {
            let mut path = vec![start];
            let mut on_path: HashMap<u32, usize> = HashMap::from([(start, 0)]);
            let mut current = start;

            loop {
                let Some(next) = outgoing.get_mut(&current).and_then(|ends| ends.pop()) else {
                    open += 1;
                    break;
                };

                match on_path.get(&next).copied() {
                    // Back on the path: split off the cycle and keep walking
                    Some(k) => {
                        let cycle: Vec<u32> = path.drain(k..).collect();
                        for v in &cycle {
                            on_path.remove(v);
                        }
                        if cycle.len() >= 3 {
                            loops.push(cycle);
                        }
                        if path.is_empty() {
                            break;
                        }
                        on_path.insert(next, path.len());
                        path.push(next);
                    }
                    None => {
                        on_path.insert(next, path.len());
                        path.push(next);
                    }
                }
                current = next;
            }
        }
    }

    (loops, open)
}

/// Triangulate closed loops lying in `plane`
///
/// Loops that are counter-clockwise in the plane basis are outer boundaries,
/// clockwise loops are holes and get bridged into the smallest outer loop
/// containing them.
pub(super) fn triangulate(loops: &[Vec<u32>], positions: &[DVec3], plane: &HalfSpace) -> Vec<[u32; 3]> {
    let (u, v) = plane.basis();
    let project = |i: u32| {
        let p = positions[i as usize];
        DVec2::new(p.dot(u), p.dot(v))
    };

    let mut outers: Vec<(Ring, f64)> = Vec::new();
    let mut holes: Vec<Ring> = Vec::new();
    for ids in loops {
        let ring: Ring = ids.iter().map(|&i| (i, project(i))).collect();
        let area = signed_area(&ring);
        // Zero area loops are slivers and add nothing to the cap
        if area > 0.0 {
            outers.push((ring, area));
        } else if area < 0.0 {
            holes.push(ring);
        }
    }

    let mut assigned: Vec<Vec<Ring>> = vec![Vec::new(); outers.len()];
    for hole in holes {
        // Holes never cross their outer loop, one vertex decides containment
        let corner = hole[0].1;
        let container = outers
            .iter()
            .enumerate()
            .filter(|(_, (ring, _))| point_in_ring(corner, ring))
            .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
            .map(|(index, _)| index);
        match container {
            Some(index) => assigned[index].push(hole),
            None => log::trace!("cap hole with {} vertices has no enclosing loop", hole.len()),
        }
    }

    let mut triangles = Vec::new();
    for ((mut ring, _), mut ring_holes) in outers.into_iter().zip(assigned) {
        // Rightmost holes first so later bridges can pass through earlier holes
        ring_holes.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));
        for hole in &ring_holes {
            bridge_hole(&mut ring, hole);
        }
        ear_clip(&ring, &mut triangles);
    }
    triangles
}

fn signed_area(ring: &[(u32, DVec2)]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| ring[i].1.perp_dot(ring[(i + 1) % n].1))
        .sum::<f64>()
        * 0.5
}

fn max_x(ring: &Ring) -> f64 {
    ring.iter().map(|(_, p)| p.x).fold(f64::MIN, f64::max)
}

/// Even-odd point in polygon test
fn point_in_ring(point: DVec2, ring: &[(u32, DVec2)]) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let a = ring[i].1;
        let b = ring[(i + 1) % n].1;
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

#[inline]
fn cross(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - b)
}

/// Inclusive point in triangle test for a counter-clockwise triangle
fn in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    (b - a).perp_dot(p - a) >= 0.0 && (c - b).perp_dot(p - b) >= 0.0 && (a - c).perp_dot(p - c) >= 0.0
}

/// Splice `hole` into `ring` through a mutually visible vertex pair
///
/// Casts a ray from the hole's rightmost vertex along +x, takes the nearest
/// hit edge and connects to its right endpoint, or to a reflex vertex inside
/// the triangle spanned by the hit, choosing the one with the smallest angle
/// to the ray.
fn bridge_hole(ring: &mut Ring, hole: &Ring) {
    // Rightmost hole vertex, lowest y on ties
    let Some(m_index) = (0..hole.len()).max_by(|&a, &b| {
        let (pa, pb) = (hole[a].1, hole[b].1);
        pa.x.total_cmp(&pb.x).then(pb.y.total_cmp(&pa.y))
    }) else {
        return;
    };
    let m = hole[m_index].1;
    let n = ring.len();

    // Nearest ring edge crossed by the ray from m towards +x
    let mut hit: Option<(f64, usize)> = None;
    for i in 0..n {
        let a = ring[i].1;
        let b = ring[(i + 1) % n].1;
        if a.y == b.y || (a.y - m.y) * (b.y - m.y) > 0.0 {
            continue;
        }
        let x = a.x + (m.y - a.y) * (b.x - a.x) / (b.y - a.y);
        // Keep the edge endpoint with the larger x
        if x >= m.x && hit.map_or(true, |(best, _)| x < best) {
            let candidate = if a.x > b.x { i } else { (i + 1) % n };
            hit = Some((x, candidate));
        }
    }

    let target = match hit {
        Some((x, candidate)) => {
            let i = DVec2::new(x, m.y);
            let p = ring[candidate].1;
            let (t0, t1, t2) = if m.y < p.y { (m, i, p) } else { (m, p, i) };
            // Ring vertices inside (m, hit, p) would block the bridge; take
            // the one closest in angle to the ray instead
            let mut best = candidate;
            let mut best_tan = f64::INFINITY;
            for (j, &(_, q)) in ring.iter().enumerate() {
                if j == candidate || q == p || q.x <= m.x || !in_triangle(q, t0, t1, t2) {
                    continue;
                }
                let tan = (q.y - m.y).abs() / (q.x - m.x);
                let closer = tan == best_tan && q.distance_squared(m) < ring[best].1.distance_squared(m);
                if tan < best_tan || closer {
                    best_tan = tan;
                    best = j;
                }
            }
            best
        }
        // No crossing (hole outside the ring): nearest ring vertex
        None => (0..n)
            .min_by(|&a, &b| ring[a].1.distance_squared(m).total_cmp(&ring[b].1.distance_squared(m)))
            .unwrap_or(0),
    };

    // ring[..=target], the whole hole from m, back to m, then back to target
    let mut spliced = Vec::with_capacity(n + hole.len() + 2);
    spliced.extend_from_slice(&ring[..=target]);
    spliced.extend(hole[m_index..].iter().chain(&hole[..m_index]).copied());
    spliced.push(hole[m_index]);
    spliced.push(ring[target]);
    spliced.extend_from_slice(&ring[target + 1..]);
    *ring = spliced;
}

/// Ear-clip a simple (possibly bridged) polygon
///
/// When no clean ear exists, the most convex corner is clipped anyway so
/// the cap always closes.
fn ear_clip(ring: &[(u32, DVec2)], out: &mut Vec<[u32; 3]>) {
    // Bridged rings keep the outer orientation
    let orientation = if signed_area(ring) < 0.0 { -1.0 } else { 1.0 };
    let mut remaining: Vec<usize> = (0..ring.len()).collect();

    let mut emit = |a: usize, b: usize, c: usize| {
        let (ia, ib, ic) = (ring[a].0, ring[b].0, ring[c].0);
        if ia != ib && ib != ic && ia != ic {
            out.push([ia, ib, ic]);
        }
    };

    while remaining.len() > 3 {
        let n = remaining.len();
        let mut ear = None;
        let mut fallback = (f64::NEG_INFINITY, 0);

        for k in 0..n {
            let (a, b, c) = (remaining[(k + n - 1) % n], remaining[k], remaining[(k + 1) % n]);
            let (pa, pb, pc) = (ring[a].1, ring[b].1, ring[c].1);
            let convexity = orientation * cross(pa, pb, pc);
            // Track the most convex corner in case no ear is found
            if convexity > fallback.0 {
                fallback = (convexity, k);
            }
            if convexity <= 0.0 {
                continue;
            }

            let (t0, t1, t2) = if orientation > 0.0 { (pa, pb, pc) } else { (pa, pc, pb) };
            // Bridge duplicates share positions with the corner and never block it
            let blocked = remaining.iter().any(|&j| {
                let q = ring[j].1;
                j != a && j != b && j != c && q != pa && q != pb && q != pc && in_triangle(q, t0, t1, t2)
            });
            if !blocked {
                ear = Some(k);
                break;
            }
        }

        let k = ear.unwrap_or(fallback.1);
        emit(remaining[(k + n - 1) % n], remaining[k], remaining[(k + 1) % n]);
        remaining.remove(k);
    }

    if let [a, b, c] = remaining[..] {
        emit(a, b, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(ids: [u32; 4], half: f64, ccw: bool) -> (Vec<u32>, Vec<DVec3>) {
        let mut corners = vec![
            DVec3::new(0.0, -half, -half),
            DVec3::new(0.0, half, -half),
            DVec3::new(0.0, half, half),
            DVec3::new(0.0, -half, half),
        ];
        if !ccw {
            corners.reverse();
        }
        (ids.to_vec(), corners)
    }

    fn area_3d(triangles: &[[u32; 3]], positions: &[DVec3], normal: DVec3) -> f64 {
        triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| positions[i as usize]);
                (b - a).cross(c - a).dot(normal) * 0.5
            })
            .sum()
    }

    #[test]
    fn test_cancel_opposite() {
        let edges = vec![(1, 2), (2, 1), (2, 3), (3, 4), (2, 3)];
        assert_eq!(cancel_opposite(edges), vec![(2, 3), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_chain_single_loop() {
        let (loops, open) = chain_loops(&[(0, 1), (2, 0), (1, 2)]);
        assert_eq!(open, 0);
        assert_eq!(loops, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_chain_pinched_and_open() {
        // Two triangles sharing vertex 0, plus a dangling chain 7 -> 8
        let edges = [(0, 1), (1, 2), (2, 0), (0, 3), (3, 4), (4, 0), (7, 8)];
        let (loops, open) = chain_loops(&edges);
        assert_eq!(loops.len(), 2);
        assert!(loops.iter().all(|l| l.len() == 3 && l.contains(&0)));
        assert_eq!(open, 1);
    }

    #[test]
    fn test_triangulate_square_faces_normal() {
        let plane = HalfSpace::new(DVec3::X, DVec3::ZERO);
        let (u, v) = plane.basis();
        // Counter-clockwise in the plane basis
        let positions: Vec<DVec3> = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|&(x, y)| u * x + v * y)
            .collect();
        let triangles = triangulate(&[vec![0, 1, 2, 3]], &positions, &plane);
        assert_eq!(triangles.len(), 2);
        assert!((area_3d(&triangles, &positions, DVec3::X) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangulate_with_hole() {
        let plane = HalfSpace::new(DVec3::X, DVec3::ZERO);
        let (u, v) = plane.basis();
        let to_3d = |x: f64, y: f64| u * x + v * y;

        let mut positions = Vec::new();
        for &(x, y) in &[(-2.0, -2.0), (2.0, -2.0), (2.0, 2.0), (-2.0, 2.0)] {
            positions.push(to_3d(x, y));
        }
        // Clockwise hole
        for &(x, y) in &[(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)] {
            positions.push(to_3d(x, y));
        }
        let loops = vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]];
        let triangles = triangulate(&loops, &positions, &plane);

        // 16 - 4 = 12 units of area, every triangle facing the normal
        assert!((area_3d(&triangles, &positions, DVec3::X) - 12.0).abs() < 1e-9);
        for t in &triangles {
            let [a, b, c] = t.map(|i| positions[i as usize]);
            assert!((b - a).cross(c - a).dot(DVec3::X) >= -1e-12);
        }
        // Every hole edge is used by the cap in the loop direction
        for (a, b) in [(4, 5), (5, 6), (6, 7), (7, 4)] {
            let used = triangles
                .iter()
                .any(|t| (0..3).any(|k| t[k] == a && t[(k + 1) % 3] == b));
            assert!(used, "hole edge {}->{} missing", a, b);
        }
    }

    #[test]
    fn test_reverse_loop_is_not_an_outer() {
        let (ids, positions) = square([0, 1, 2, 3], 1.0, true);
        let plane = HalfSpace::new(DVec3::X, DVec3::ZERO);
        let forward = triangulate(&[ids.clone()], &positions, &plane);
        let backward = triangulate(&[ids.into_iter().rev().collect()], &positions, &plane);
        // One direction is an outer loop, the other an orphan hole
        assert!(forward.is_empty() != backward.is_empty());
    }

    #[test]
    fn test_collinear_vertices() {
        let plane = HalfSpace::new(DVec3::Z, DVec3::ZERO);
        let (u, v) = plane.basis();
        let ring = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0), (0.0, 2.0)];
        let positions: Vec<DVec3> = ring.iter().map(|&(x, y)| u * x + v * y).collect();
        let triangles = triangulate(&[vec![0, 1, 2, 3, 4, 5]], &positions, &plane);
        assert!((area_3d(&triangles, &positions, DVec3::Z) - 4.0).abs() < 1e-9);
    }
}
