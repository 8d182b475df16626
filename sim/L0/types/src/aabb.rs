//! Axis-aligned bounding boxes used for actor activation and collision.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
///
/// An empty box has `min > max` on every axis; extending it with a point
/// makes it a degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vector3<f64>,
    /// Maximum corner.
    pub max: Vector3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Box from two corners.
    #[must_use]
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// Box containing nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Vector3::repeat(f64::INFINITY),
            max: Vector3::repeat(f64::NEG_INFINITY),
        }
    }

    /// Box around a set of points.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vector3<f64>>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.extend(p);
        }
        b
    }

    /// Whether the box contains no point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow to include `p`.
    pub fn extend(&mut self, p: &Vector3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grow to include another box.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Box enlarged by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: self.min - Vector3::repeat(margin),
            max: self.max + Vector3::repeat(margin),
        }
    }

    /// Box moved by `offset`.
    #[must_use]
    pub fn translated(&self, offset: &Vector3<f64>) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Overlap test (touching counts as intersecting).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Whether `p` lies inside the box.
    #[must_use]
    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vector3<f64> {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths.
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_never_intersects() {
        let a = Aabb::empty();
        let b = Aabb::new(Vector3::zeros(), Vector3::repeat(1.0));
        assert!(a.is_empty());
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
    }

    #[test]
    fn from_points_and_center() {
        let pts = [Vector3::new(0.0, 1.0, 0.0), Vector3::new(2.0, -1.0, 4.0)];
        let b = Aabb::from_points(pts.iter());
        assert_relative_eq!(b.center(), Vector3::new(1.0, 0.0, 2.0));
        assert_relative_eq!(b.size(), Vector3::new(2.0, 2.0, 4.0));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb::new(Vector3::zeros(), Vector3::repeat(1.0));
        let b = a.translated(&Vector3::new(1.0, 0.0, 0.0));
        let c = a.translated(&Vector3::new(1.01, 0.0, 0.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.expanded(0.02).intersects(&c));
    }
}
