//! Edge topology checks for closed triangle meshes

use std::collections::HashMap;

/// Summary of how the edges of a triangle mesh are shared
///
/// A closed, consistently wound manifold uses every undirected edge exactly
/// twice, once in each direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeReport {
    /// Number of distinct undirected edges
    pub edge_count: usize,
    /// Edges used by exactly one triangle
    pub boundary_edges: usize,
    /// Edges used more than twice, or twice in the same direction
    pub non_manifold_edges: usize,
}

impl EdgeReport {
    /// No boundary edges
    pub fn is_closed(&self) -> bool {
        self.boundary_edges == 0
    }

    /// Closed with consistent winding everywhere
    pub fn is_manifold(&self) -> bool {
        self.boundary_edges == 0 && self.non_manifold_edges == 0
    }

    /// Share of defective edges in `[0, 1]`
    pub fn defect_ratio(&self) -> f64 {
        if self.edge_count == 0 {
            return 0.0;
        }
        (self.boundary_edges + self.non_manifold_edges) as f64 / self.edge_count as f64
    }
}

/// Count directed edge usage of a triangle list
pub fn analyze_edges(triangles: &[[u32; 3]]) -> EdgeReport {
    let mut directed: HashMap<(u32, u32), u32> = HashMap::with_capacity(triangles.len() * 3);

    for tri in triangles {
        for k in 0..3 {
            let a = tri[k];
            let b = tri[(k + 1) % 3];
            *directed.entry((a, b)).or_insert(0) += 1;
        }
    }

    let mut report = EdgeReport::default();
    for (&(a, b), &forward) in &directed {
        let backward = directed.get(&(b, a)).copied().unwrap_or(0);
        // Visit each undirected edge once, from its lower endpoint or when
        // the reverse direction is absent.
        if backward > 0 && a > b {
            continue;
        }
        report.edge_count += 1;
        match (forward, backward) {
            (1, 1) => {}
            (1, 0) => report.boundary_edges += 1,
            _ => report.non_manifold_edges += 1,
        }
    }

    report
}
