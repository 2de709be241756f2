// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar face triangulation
//!
//! 3D faces are flattened into their own plane, cut into triangles with
//! earcutr (or a fan when the face is convex), and every triangle is wound to
//! agree with the face normal.

use crate::bool2d::compute_signed_area;
use crate::error::{Error, Result};
use crate::solid::newell_vector;
use nalgebra::{Point2, Point3, Vector3};

/// Convex when every turn has the same sign
fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i8;
    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];
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
    true
}

/// Fan around the first vertex
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.extend_from_slice(&[0, i, i + 1]);
    }
    indices
}

/// Triangulate a simple 2D polygon, triangles wound like the input ring
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    triangulate_polygon_with_holes(points, &[])
}

/// Triangulate a 2D polygon with holes
///
/// Indices refer to the concatenation of `outer` and every hole. Triangles
/// share the orientation of `outer`.
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    let n = outer.len();
    if n < 3 {
        return Err(Error::Triangulation(format!(
            "outer ring has {n} points, need at least 3"
        )));
    }

    let holes: Vec<&Vec<Point2<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();
    if holes.is_empty() && is_convex(outer) {
        return Ok(fan_triangulate(n));
    }

    let mut flat = Vec::with_capacity(2 * (n + holes.iter().map(|h| h.len()).sum::<usize>()));
    let mut points: Vec<Point2<f64>> = Vec::with_capacity(flat.capacity() / 2);
    for p in outer {
        flat.extend_from_slice(&[p.x, p.y]);
        points.push(*p);
    }
    let mut hole_starts = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_starts.push(flat.len() / 2);
        for p in hole {
            flat.extend_from_slice(&[p.x, p.y]);
            points.push(*p);
        }
    }

    let mut indices = earcutr::earcut(&flat, &hole_starts, 2)
        .map_err(|e| Error::Triangulation(format!("{:?}", e)))?;
    if indices.is_empty() {
        return Err(Error::Triangulation("ring produced no triangles".to_string()));
    }

    // earcut does not promise an output winding; match the outer ring
    let want_ccw = compute_signed_area(outer) > 0.0;
    for tri in indices.chunks_exact_mut(3) {
        let area = compute_signed_area(&[points[tri[0]], points[tri[1]], points[tri[2]]]);
        if (area > 0.0) != want_ccw {
            tri.swap(1, 2);
        }
    }

    Ok(indices)
}

/// Orthonormal in-plane basis `(u, v)` with `u × v = normal`
pub fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let reference = if normal.x.abs() <= normal.y.abs() && normal.x.abs() <= normal.z.abs() {
        Vector3::x()
    } else if normal.y.abs() <= normal.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let u = reference.cross(normal).normalize();
    let v = normal.cross(&u);
    (u, v)
}

/// Flatten points into the plane through `points[0]` with the given normal
///
/// Counter-clockwise around `normal` in 3D stays counter-clockwise in 2D.
pub fn project_to_2d(points: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<Point2<f64>> {
    let Some(origin) = points.first() else {
        return Vec::new();
    };
    let (u, v) = plane_basis(normal);
    points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(&u), d.dot(&v))
        })
        .collect()
}

/// Unit normal of a planar polygon (Newell), `None` when degenerate
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    newell_vector(points).try_normalize(1e-12)
}

/// Triangulate a planar 3D face, triangles counter-clockwise around its normal
pub fn triangulate_face(points: &[Point3<f64>]) -> Result<Vec<[usize; 3]>> {
    let normal = calculate_polygon_normal(points)
        .ok_or_else(|| Error::Triangulation("face has no area".to_string()))?;
    let flat = project_to_2d(points, &normal);
    let indices = triangulate_polygon(&flat)?;
    Ok(indices
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_convex_square_uses_fan() {
        let indices = triangulate_polygon(&square()).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_too_few_points() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(matches!(
            triangulate_polygon(&pts),
            Err(Error::Triangulation(_))
        ));
    }

    #[test]
    fn test_square_with_hole_keeps_winding() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        let hole = vec![
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 7.0),
            Point2::new(7.0, 7.0),
            Point2::new(7.0, 3.0),
        ];
        let indices = triangulate_polygon_with_holes(&outer, &[hole.clone()]).unwrap();
        let all: Vec<Point2<f64>> = outer.iter().chain(hole.iter()).copied().collect();

        let mut total = 0.0;
        for t in indices.chunks_exact(3) {
            let a = compute_signed_area(&[all[t[0]], all[t[1]], all[t[2]]]);
            assert!(a > 0.0);
            total += a;
        }
        assert_relative_eq!(total, 84.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_triangles_follow_normal() {
        // Concave L-shaped face in a vertical plane, facing +Y
        let face = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(1.0, 0.0, 2.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let normal = calculate_polygon_normal(&face).unwrap();
        assert_relative_eq!(normal.y, 1.0, epsilon = 1e-12);

        let tris = triangulate_face(&face).unwrap();
        assert_eq!(tris.len(), 4);
        for t in tris {
            let n = newell_vector(&[face[t[0]], face[t[1]], face[t[2]]]);
            assert!(n.dot(&normal) > 0.0);
        }
    }

    #[test]
    fn test_projection_preserves_orientation() {
        let face = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(1.0, 0.0, 5.0),
            Point3::new(1.0, 1.0, 5.0),
            Point3::new(0.0, 1.0, 5.0),
        ];
        let flat = project_to_2d(&face, &Vector3::z());
        assert_relative_eq!(compute_signed_area(&flat), 1.0, epsilon = 1e-12);
    }
}
