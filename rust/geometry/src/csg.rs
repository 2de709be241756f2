// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CSG (Constructive Solid Geometry) Operations
//!
//! Two intersection kernels over boundary polygons:
//!
//! - [`ClippingProcessor`]: half-space clipping for convex operands. Each
//!   operand's faces are clipped to the other's planes; the kept pieces are
//!   exactly the boundary of the intersection.
//! - [`bsp_intersection`]: general solids through csgrs BSP booleans.

use crate::deadline::Deadline;
use crate::error::Result;
use crate::solid::{newell_vector, polygon_area, Polygon3};
use csgrs::mesh::{polygon::Polygon, vertex::Vertex, Mesh as CSGMesh};
use nalgebra::{Point3, Vector3};

/// Plane definition for clipping
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Point on the plane
    pub point: Point3<f64>,
    /// Normal vector (unit length)
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Create a new plane
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            point,
            normal: normal.normalize(),
        }
    }

    /// Supporting plane of a polygon, `None` when it has no area
    pub fn from_polygon(points: &[Point3<f64>]) -> Option<Self> {
        let normal = newell_vector(points).try_normalize(1e-12)?;
        Some(Self {
            point: points[0],
            normal,
        })
    }

    /// Calculate signed distance from point to plane
    /// Positive = in front, Negative = behind
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        (point - self.point).dot(&self.normal)
    }
}

/// How a polygon relates to a single clipping plane
#[derive(Debug, Clone)]
pub enum ClipResult {
    /// Entirely behind (inside the half-space)
    Inside(Polygon3),
    /// Entirely in front
    Outside,
    /// Lies in the plane
    Coplanar { same_facing: bool },
    /// Crosses the plane; the inside piece
    Split(Polygon3),
}

/// Convex half-space clipper
pub struct ClippingProcessor {
    /// Distance below which a point counts as on the plane
    pub epsilon: f64,
}

impl ClippingProcessor {
    /// Create a new clipping processor
    pub fn new() -> Self {
        Self { epsilon: 1e-9 }
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Sutherland-Hodgman step: keep the part with `signed_distance <= 0`
    pub fn clip_polygon(&self, polygon: &[Point3<f64>], plane: &Plane) -> ClipResult {
        let distances: Vec<f64> = polygon.iter().map(|p| plane.signed_distance(p)).collect();

        if distances.iter().all(|d| d.abs() <= self.epsilon) {
            let same_facing = newell_vector(polygon).dot(&plane.normal) > 0.0;
            return ClipResult::Coplanar { same_facing };
        }
        if distances.iter().all(|&d| d <= self.epsilon) {
            return ClipResult::Inside(polygon.to_vec());
        }
        if distances.iter().all(|&d| d >= -self.epsilon) {
            return ClipResult::Outside;
        }

        let n = polygon.len();
        let mut out = Vec::with_capacity(n + 1);
        for i in 0..n {
            let (p, dp) = (polygon[i], distances[i]);
            let (q, dq) = (polygon[(i + 1) % n], distances[(i + 1) % n]);
            if dp <= self.epsilon {
                out.push(p);
            }
            // Strict crossing only; on-plane endpoints were kept above
            if (dp < -self.epsilon && dq > self.epsilon) || (dp > self.epsilon && dq < -self.epsilon)
            {
                let t = dp / (dp - dq);
                out.push(p + (q - p) * t);
            }
        }
        ClipResult::Split(out)
    }

    /// Clip `polygon` to the inside of a convex solid given by its face planes
    ///
    /// `keep_coplanar_same` decides whether a polygon lying in one of the
    /// planes with matching orientation survives; opposite orientation never
    /// does (the solids only touch there).
    pub fn clip_to_convex(
        &self,
        polygon: &[Point3<f64>],
        planes: &[Plane],
        keep_coplanar_same: bool,
    ) -> Option<Polygon3> {
        let mut current = polygon.to_vec();
        for plane in planes {
            match self.clip_polygon(&current, plane) {
                ClipResult::Inside(p) | ClipResult::Split(p) => current = p,
                ClipResult::Outside => return None,
                ClipResult::Coplanar { same_facing } => {
                    if !(same_facing && keep_coplanar_same) {
                        return None;
                    }
                }
            }
            if current.len() < 3 {
                return None;
            }
        }
        (polygon_area(&current) > self.epsilon * self.epsilon).then_some(current)
    }

    /// Boundary of the intersection of two convex solids
    pub fn convex_intersection(
        &self,
        a: &[Polygon3],
        b: &[Polygon3],
        deadline: &Deadline,
    ) -> Result<Vec<Polygon3>> {
        let planes_a: Vec<Plane> = a.iter().filter_map(|p| Plane::from_polygon(p)).collect();
        let planes_b: Vec<Plane> = b.iter().filter_map(|p| Plane::from_polygon(p)).collect();

        let mut result = Vec::new();
        for polygon in a {
            deadline.check()?;
            if let Some(kept) = self.clip_to_convex(polygon, &planes_b, true) {
                result.push(kept);
            }
        }
        // Shared same-facing faces were already taken from A
        for polygon in b {
            deadline.check()?;
            if let Some(kept) = self.clip_to_convex(polygon, &planes_a, false) {
                result.push(kept);
            }
        }
        Ok(result)
    }
}

impl Default for ClippingProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert boundary polygons to a csgrs mesh
fn polygons_to_csgrs(polygons: &[Polygon3]) -> CSGMesh<()> {
    let csg_polygons: Vec<Polygon<()>> = polygons
        .iter()
        .filter_map(|poly| {
            let normal = newell_vector(poly).try_normalize(1e-12)?;
            let vertices = poly.iter().map(|p| Vertex::new(*p, normal)).collect();
            Some(Polygon::new(vertices, None))
        })
        .collect();
    CSGMesh::from_polygons(&csg_polygons, None)
}

/// Convert csgrs polygons back to plain point loops
fn csgrs_to_polygons(mesh: &CSGMesh<()>) -> Vec<Polygon3> {
    mesh.polygons
        .iter()
        .filter(|p| p.vertices.len() >= 3)
        .map(|p| p.vertices.iter().map(|v| v.pos).collect::<Polygon3>())
        .filter(|p| polygon_area(p) > 0.0)
        .collect()
}

/// Boundary of the intersection of two arbitrary closed solids (BSP boolean)
pub fn bsp_intersection(
    a: &[Polygon3],
    b: &[Polygon3],
    deadline: &Deadline,
) -> Result<Vec<Polygon3>> {
    use csgrs::traits::CSG;

    deadline.check()?;
    let a_csg = polygons_to_csgrs(a);
    let b_csg = polygons_to_csgrs(b);
    let result = a_csg.intersection(&b_csg);
    // The boolean itself is not interruptible; refuse to hand back late work
    deadline.check()?;
    Ok(csgrs_to_polygons(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::{polygons_signed_volume, Prism};
    use approx::assert_relative_eq;

    fn cuboid(origin: [f64; 3], size: [f64; 3]) -> Vec<Polygon3> {
        Prism::cuboid(
            Point3::new(origin[0], origin[1], origin[2]),
            size[0],
            size[1],
            size[2],
        )
        .unwrap()
        .boundary()
        .unwrap()
    }

    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, 5.0)), 5.0);
        assert_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, -5.0)), -5.0);
        assert_eq!(plane.signed_distance(&Point3::new(5.0, 5.0, 0.0)), 0.0);
    }

    #[test]
    fn test_clip_polygon_cases() {
        let clipper = ClippingProcessor::new();
        let plane = Plane::new(Point3::origin(), Vector3::z());
        let below = vec![
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, -1.0),
            Point3::new(0.5, 1.0, -1.0),
        ];
        assert!(matches!(
            clipper.clip_polygon(&below, &plane),
            ClipResult::Inside(_)
        ));

        let above: Polygon3 = below.iter().map(|p| Point3::new(p.x, p.y, 1.0)).collect();
        assert!(matches!(
            clipper.clip_polygon(&above, &plane),
            ClipResult::Outside
        ));

        let flat: Polygon3 = below.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        assert!(matches!(
            clipper.clip_polygon(&flat, &plane),
            ClipResult::Coplanar { same_facing: true }
        ));

        // Vertical square straddling z = 0: lower half kept
        let wall = vec![
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(2.0, 0.0, -1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        match clipper.clip_polygon(&wall, &plane) {
            ClipResult::Split(p) => assert_relative_eq!(polygon_area(&p), 2.0, epsilon = 1e-12),
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_convex_overlap_volume() {
        let a = cuboid([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = cuboid([1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        let boundary = ClippingProcessor::new()
            .convex_intersection(&a, &b, &Deadline::none())
            .unwrap();
        assert_relative_eq!(polygons_signed_volume(&boundary), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_identical_convex_solids() {
        let a = cuboid([0.0, 0.0, 0.0], [2.0, 3.0, 4.0]);
        let boundary = ClippingProcessor::new()
            .convex_intersection(&a, &a, &Deadline::none())
            .unwrap();
        assert_eq!(boundary.len(), 6);
        assert_relative_eq!(polygons_signed_volume(&boundary), 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_touching_convex_solids() {
        let a = cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = cuboid([1.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let boundary = ClippingProcessor::new()
            .convex_intersection(&a, &b, &Deadline::none())
            .unwrap();
        assert_relative_eq!(polygons_signed_volume(&boundary), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bsp_overlap_volume() {
        let a = cuboid([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = cuboid([1.0, 1.0, 1.0], [2.0, 2.0, 2.0]);
        let boundary = bsp_intersection(&a, &b, &Deadline::none()).unwrap();
        assert_relative_eq!(polygons_signed_volume(&boundary), 1.0, epsilon = 1e-6);
    }
}
