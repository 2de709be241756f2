// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding volumes used for broad-phase pruning

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in model space (f64 precision)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a box from two corners (order-independent)
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Inverted box that any `expand` call will overwrite
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Bounding box of a point set, `None` if empty
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut bounds = Self::empty();
        for p in points {
            bounds.expand(p);
        }
        bounds.is_valid().then_some(bounds)
    }

    /// Check if at least one point was added
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Expand to include a point
    #[inline]
    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Grow uniformly by `margin` on every side
    pub fn expanded_by(&self, margin: f64) -> Self {
        Self {
            min: Point3::new(self.min.x - margin, self.min.y - margin, self.min.z - margin),
            max: Point3::new(self.max.x + margin, self.max.y + margin, self.max.z + margin),
        }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Closed-interval overlap test (touching boxes intersect)
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Overlap box, `None` when disjoint
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        if !self.intersects(other) {
            return None;
        }
        Some(Aabb {
            min: Point3::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: Point3::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        })
    }

    /// Whether `other` lies fully inside this box
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Volume of the box (zero for flat boxes)
    pub fn volume(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        (self.max.x - self.min.x) * (self.max.y - self.min.y) * (self.max.z - self.min.z)
    }

    /// Center point
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Plan-view rectangle
    pub fn xy(&self) -> Rect2 {
        Rect2 {
            min: Point2::new(self.min.x, self.min.y),
            max: Point2::new(self.max.x, self.max.y),
        }
    }

    /// Vertical extent as `(z_min, z_max)`
    pub fn z_range(&self) -> (f64, f64) {
        (self.min.z, self.max.z)
    }
}

/// Axis-aligned rectangle in plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Rect2 {
    /// Bounding rectangle of a point set, `None` if empty
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point2<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Rect2 {
            min: *first,
            max: *first,
        };
        for p in iter {
            rect.min.x = rect.min.x.min(p.x);
            rect.min.y = rect.min.y.min(p.y);
            rect.max.x = rect.max.x.max(p.x);
            rect.max.y = rect.max.y.max(p.y);
        }
        Some(rect)
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect2) -> Self {
        Rect2 {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Closed-interval overlap test
    #[inline]
    pub fn intersects(&self, other: &Rect2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn area(&self) -> f64 {
        ((self.max.x - self.min.x) * (self.max.y - self.min.y)).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(min: [f64; 3], max: [f64; 3]) -> Aabb {
        Aabb::new(
            Point3::new(min[0], min[1], min[2]),
            Point3::new(max[0], max[1], max[2]),
        )
    }

    #[test]
    fn test_touching_boxes_intersect() {
        let a = aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = aabb([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]);
        assert!(a.intersects(&b));
        assert_eq!(a.intersection(&b).map(|i| i.volume()), Some(0.0));
    }

    #[test]
    fn test_disjoint_boxes() {
        let a = aabb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = aabb([0.0, 0.0, 1.5], [1.0, 1.0, 3.0]);
        assert!(!a.intersects(&b));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_from_points_and_union() {
        let pts = [Point3::new(1.0, -2.0, 0.5), Point3::new(-1.0, 3.0, 2.0)];
        let bounds = Aabb::from_points(pts.iter()).unwrap();
        assert_eq!(bounds.min, Point3::new(-1.0, -2.0, 0.5));
        assert_eq!(bounds.max, Point3::new(1.0, 3.0, 2.0));

        let other = aabb([5.0, 5.0, 5.0], [6.0, 6.0, 6.0]);
        let merged = bounds.union(&other);
        assert!(merged.contains(&bounds));
        assert!(merged.contains(&other));
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_xy_projection() {
        let rect = aabb([0.0, 1.0, 2.0], [3.0, 5.0, 9.0]).xy();
        assert_eq!(rect.area(), 12.0);
    }
}
