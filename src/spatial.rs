//! Spatial indexing for fast position-to-fragment lookups
//!
//! This module is only available with the `spatial-index` feature.

use glam::Vec3;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

/// KD-tree over seed positions
///
/// The nearest seed to a point owns the Voronoi cell containing it, so a
/// single nearest-neighbor query answers "which fragment is here".
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// let seeds = vec![
///     Vec3::new(1.0, 0.0, 0.0),
///     Vec3::new(0.0, 1.0, 0.0),
///     Vec3::new(0.0, 0.0, 1.0),
/// ];
///
/// let index = SpatialIndex::new(&seeds);
/// assert_eq!(index.find_nearest(Vec3::new(1.0, 0.1, 0.0)), Some(0));
/// ```
#[derive(Clone)]
pub struct SpatialIndex {
    tree: Option<ImmutableKdTree<f32, usize, 3, 32>>,
}

impl SpatialIndex {
    /// Build the index from seed positions
    pub fn new(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self { tree: None };
        }
        let points: Vec<[f32; 3]> = points.iter().map(|p| p.to_array()).collect();
        Self {
            tree: Some(ImmutableKdTree::new_from_slice(&points)),
        }
    }

    /// Position in the input slice of the point nearest to `position`
    ///
    /// Returns `None` for an empty index.
    pub fn find_nearest(&self, position: Vec3) -> Option<usize> {
        let tree = self.tree.as_ref()?;
        let result = tree.nearest_one::<SquaredEuclidean>(&position.to_array());
        Some(result.item as usize)
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("built", &self.tree.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_index_basic() {
        let seeds = vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 0.0),
        ];

        let index = SpatialIndex::new(&seeds);

        assert_eq!(index.find_nearest(Vec3::new(0.9, 0.1, 0.0)), Some(0));
        assert_eq!(index.find_nearest(Vec3::new(0.0, 0.95, 0.0)), Some(1));
        assert_eq!(index.find_nearest(Vec3::new(0.0, 0.1, 0.9)), Some(2));
        assert_eq!(index.find_nearest(Vec3::new(-0.8, 0.0, 0.0)), Some(3));
    }

    #[test]
    fn test_spatial_index_exact_match() {
        let seeds = vec![Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 10.0, 0.0)];
        let index = SpatialIndex::new(&seeds);

        assert_eq!(index.find_nearest(seeds[0]), Some(0));
        assert_eq!(index.find_nearest(seeds[1]), Some(1));
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new(&[]);
        assert_eq!(index.find_nearest(Vec3::ZERO), None);
    }
}
