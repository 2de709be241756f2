// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D Profile definitions and triangulation

use crate::bool2d::{compute_signed_area, ensure_ccw, ensure_cw, is_valid_contour};
use crate::bounds::Rect2;
use crate::error::{Error, Result};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// 2D Profile with optional holes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile2D {
    /// Outer boundary (counter-clockwise)
    pub outer: Vec<Point2<f64>>,
    /// Holes (clockwise)
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Profile2D {
    /// Create a new profile
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    /// Create a profile with holes
    pub fn with_holes(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self { outer, holes }
    }

    /// Axis-aligned `dx` × `dy` rectangle with its corner at the origin
    pub fn rectangle(dx: f64, dy: f64) -> Self {
        Self::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(dx, 0.0),
            Point2::new(dx, dy),
            Point2::new(0.0, dy),
        ])
    }

    /// Add a hole to the profile
    pub fn add_hole(&mut self, hole: Vec<Point2<f64>>) {
        self.holes.push(hole);
    }

    /// Copy with the outer ring counter-clockwise and holes clockwise
    pub fn normalized(&self) -> Self {
        Self {
            outer: ensure_ccw(&self.outer),
            holes: self.holes.iter().map(|h| ensure_cw(h)).collect(),
        }
    }

    /// Check the outer ring and every hole enclose a positive area
    pub fn is_valid(&self) -> bool {
        is_valid_contour(&self.outer) && self.holes.iter().all(|h| is_valid_contour(h))
    }

    /// Net enclosed area (outer minus holes)
    pub fn area(&self) -> f64 {
        let outer = compute_signed_area(&self.outer).abs();
        let holes: f64 = self
            .holes
            .iter()
            .map(|h| compute_signed_area(h).abs())
            .sum();
        (outer - holes).max(0.0)
    }

    /// Total boundary length including hole rings
    pub fn perimeter(&self) -> f64 {
        ring_length(&self.outer) + self.holes.iter().map(|h| ring_length(h)).sum::<f64>()
    }

    /// Bounding rectangle of the outer ring
    pub fn bounds(&self) -> Option<Rect2> {
        Rect2::from_points(self.outer.iter())
    }

    /// Convex outer ring without holes
    pub fn is_convex(&self) -> bool {
        if !self.holes.is_empty() || self.outer.len() < 3 {
            return false;
        }
        let n = self.outer.len();
        let mut sign = 0i8;
        for i in 0..n {
            let p0 = &self.outer[i];
            let p1 = &self.outer[(i + 1) % n];
            let p2 = &self.outer[(i + 2) % n];
            let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);
            if cross.abs() > 1e-12 {
                let current = if cross > 0.0 { 1i8 } else { -1i8 };
                if sign == 0 {
                    sign = current;
                } else if sign != current {
                    return false;
                }
            }
        }
        sign != 0
    }

    /// Triangulate the profile using earcutr
    /// Returns triangle indices into the flattened vertex array
    pub fn triangulate(&self) -> Result<Triangulation> {
        if self.outer.len() < 3 {
            return Err(Error::DegenerateSolid(
                "profile must have at least 3 vertices".to_string(),
            ));
        }

        // Flatten vertices for earcutr
        let mut vertices = Vec::with_capacity(
            (self.outer.len() + self.holes.iter().map(|h| h.len()).sum::<usize>()) * 2,
        );

        for p in &self.outer {
            vertices.push(p.x);
            vertices.push(p.y);
        }

        let mut hole_indices = Vec::with_capacity(self.holes.len());
        for hole in &self.holes {
            hole_indices.push(vertices.len() / 2);
            for p in hole {
                vertices.push(p.x);
                vertices.push(p.y);
            }
        }

        let indices = earcutr::earcut(&vertices, &hole_indices, 2)
            .map_err(|e| Error::Triangulation(format!("{:?}", e)))?;

        let points = vertices
            .chunks_exact(2)
            .map(|c| Point2::new(c[0], c[1]))
            .collect();

        Ok(Triangulation { points, indices })
    }
}

/// Triangulated profile result
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// All vertices (outer + holes)
    pub points: Vec<Point2<f64>>,
    /// Triangle indices
    pub indices: Vec<usize>,
}

fn ring_length(ring: &[Point2<f64>]) -> f64 {
    if ring.len() < 2 {
        return 0.0;
    }
    let n = ring.len();
    (0..n).map(|i| (ring[(i + 1) % n] - ring[i]).norm()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_area_and_perimeter() {
        let profile = Profile2D::rectangle(5.0, 10.0);
        assert!((profile.area() - 50.0).abs() < 1e-12);
        assert!((profile.perimeter() - 30.0).abs() < 1e-12);
        assert!(profile.is_convex());
    }

    #[test]
    fn test_profile_with_hole() {
        let mut profile = Profile2D::rectangle(10.0, 10.0);
        profile.add_hole(vec![
            Point2::new(4.0, 4.0),
            Point2::new(4.0, 6.0),
            Point2::new(6.0, 6.0),
            Point2::new(6.0, 4.0),
        ]);
        assert!((profile.area() - 96.0).abs() < 1e-12);
        assert!((profile.perimeter() - 48.0).abs() < 1e-12);
        assert!(!profile.is_convex());

        let tri = profile.triangulate().unwrap();
        assert_eq!(tri.points.len(), 8);
        assert_eq!(tri.indices.len() % 3, 0);
    }

    #[test]
    fn test_l_shape_is_not_convex() {
        let profile = Profile2D::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ]);
        assert!(!profile.is_convex());
        assert!((profile.area() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_winding() {
        let cw = Profile2D::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
        ]);
        let normalized = cw.normalized();
        assert!(compute_signed_area(&normalized.outer) > 0.0);
    }
}
