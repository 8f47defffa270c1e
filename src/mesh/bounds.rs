//! Axis-aligned bounding boxes

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Bounds {
    /// Create bounds from two corners (components are sorted)
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest bounds enclosing all points, `None` for an empty iterator
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    /// Edge lengths along each axis
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Center point
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Length of the diagonal
    #[inline]
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    /// Bounds grown by `margin` on every side
    pub fn expanded(&self, margin: f32) -> Self {
        let m = Vec3::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Smallest bounds enclosing both
    pub fn union(&self, other: &Bounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Check whether a point lies inside or on the boundary
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Map a point to normalized `[0, 1]^3` coordinates
    ///
    /// Flat axes map to `0.5` so density lookups on planar sources stay
    /// well defined.
    pub fn normalize(&self, point: Vec3) -> Vec3 {
        let size = self.size();
        let axis = |p: f32, min: f32, extent: f32| {
            if extent > f32::EPSILON {
                (p - min) / extent
            } else {
                0.5
            }
        };
        Vec3::new(
            axis(point.x, self.min.x, size.x),
            axis(point.y, self.min.y, size.y),
            axis(point.z, self.min.z, size.z),
        )
    }

    /// Point at normalized coordinates (inverse of [`Bounds::normalize`])
    #[inline]
    pub fn lerp(&self, uvw: Vec3) -> Vec3 {
        self.min + self.size() * uvw
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}
