// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D Boolean Operations for Footprints and Prism Profiles
//!
//! Polygon booleans are delegated to the i_overlay crate. Footprints are
//! passed as flat ring lists with the even-odd fill rule, so holes and
//! multi-ring footprints need no special casing. Plan-view overlap checks and
//! the exact prism-vs-prism clash path both go through here.

use crate::bounds::Rect2;
use crate::footprint::Footprint;
use crate::profile::Profile2D;
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

/// Minimum area threshold - polygons smaller than this are considered degenerate
const MIN_AREA_THRESHOLD: f64 = 1e-10;

/// Boolean intersection of two footprints
pub fn intersect_footprints(a: &Footprint, b: &Footprint) -> Footprint {
    if a.is_empty() || b.is_empty() {
        return Footprint::default();
    }
    if let (Some(ra), Some(rb)) = (a.bounds(), b.bounds()) {
        if !ra.intersects(&rb) {
            return Footprint::default();
        }
    }

    let subject = footprint_to_paths(a);
    let clip = footprint_to_paths(b);
    let result = subject.overlay(&clip, OverlayRule::Intersect, FillRule::EvenOdd);
    shapes_to_footprint(&result)
}

/// Area of the overlap between two footprints
pub fn intersection_area(a: &Footprint, b: &Footprint) -> f64 {
    intersect_footprints(a, b).area()
}

/// Check whether two footprints share a region of positive area
pub fn footprints_overlap(a: &Footprint, b: &Footprint) -> bool {
    intersection_area(a, b) > MIN_AREA_THRESHOLD
}

/// Boolean intersection of two profiles (used by the prism clash path)
pub fn intersect_profiles(a: &Profile2D, b: &Profile2D) -> Footprint {
    intersect_footprints(
        &Footprint::from_profile(a.clone()),
        &Footprint::from_profile(b.clone()),
    )
}

/// Union two footprints into one
pub fn union_footprints(a: &Footprint, b: &Footprint) -> Footprint {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    let subject = footprint_to_paths(a);
    let clip = footprint_to_paths(b);
    let result = subject.overlay(&clip, OverlayRule::Union, FillRule::EvenOdd);
    shapes_to_footprint(&result)
}

/// Union an arbitrary set of (possibly overlapping) simple rings
///
/// Rings are re-oriented counter-clockwise and merged with the non-zero fill
/// rule, so a ring covered twice still counts once.
pub fn union_rings(rings: &[Vec<Point2<f64>>]) -> Footprint {
    let subject: Vec<Vec<[f64; 2]>> = rings
        .iter()
        .filter(|r| is_valid_contour(r))
        .map(|r| contour_to_path(&ensure_ccw(r)))
        .collect();

    if subject.is_empty() {
        return Footprint::default();
    }

    let clip: Vec<Vec<[f64; 2]>> = Vec::new();
    let result = subject.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    shapes_to_footprint(&result)
}

/// Check if a contour is valid (has area, not degenerate)
pub fn is_valid_contour(contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }

    let area = compute_signed_area(contour).abs();
    area > MIN_AREA_THRESHOLD
}

/// Compute the signed area of a 2D contour
/// Positive = counter-clockwise, Negative = clockwise
pub fn compute_signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = contour.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }

    area * 0.5
}

/// Ensure contour has counter-clockwise winding (positive area)
pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if compute_signed_area(contour) < 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Ensure contour has clockwise winding (for holes)
pub fn ensure_cw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if compute_signed_area(contour) > 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Simplify a contour by removing collinear and repeated points
pub fn simplify_contour(contour: &[Point2<f64>], epsilon: f64) -> Vec<Point2<f64>> {
    if contour.len() <= 3 {
        return contour.to_vec();
    }

    // Drop consecutive duplicates first so the collinearity test sees real edges
    let mut deduped: Vec<Point2<f64>> = Vec::with_capacity(contour.len());
    for p in contour {
        if deduped.last().map_or(true, |q| (p - q).norm() > epsilon) {
            deduped.push(*p);
        }
    }
    while deduped.len() > 1 {
        let first = deduped[0];
        match deduped.last() {
            Some(last) if (first - last).norm() <= epsilon => {
                deduped.pop();
            }
            _ => break,
        }
    }

    let n = deduped.len();
    if n < 3 {
        return contour.to_vec();
    }

    let mut result = Vec::with_capacity(n);
    for i in 0..n {
        let prev = &deduped[(i + n - 1) % n];
        let curr = &deduped[i];
        let next = &deduped[(i + 1) % n];

        let cross = (curr.x - prev.x) * (next.y - prev.y) - (curr.y - prev.y) * (next.x - prev.x);

        if cross.abs() > epsilon {
            result.push(*curr);
        }
    }

    // Ensure we have at least 3 points
    if result.len() < 3 {
        return deduped;
    }

    result
}

/// Check if a point is inside a contour using ray casting
pub fn point_in_contour(point: &Point2<f64>, contour: &[Point2<f64>]) -> bool {
    if contour.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = contour.len();

    let mut j = n - 1;
    for i in 0..n {
        let pi = &contour[i];
        let pj = &contour[j];

        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Compute bounding rectangle of a contour
pub fn contour_bounds(contour: &[Point2<f64>]) -> Option<Rect2> {
    Rect2::from_points(contour.iter())
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

/// Flatten a footprint into i_overlay paths (outer rings CCW, holes CW)
fn footprint_to_paths(footprint: &Footprint) -> Vec<Vec<[f64; 2]>> {
    let mut paths = Vec::new();
    for polygon in &footprint.polygons {
        paths.push(contour_to_path(&ensure_ccw(&polygon.outer)));
        for hole in &polygon.holes {
            paths.push(contour_to_path(&ensure_cw(hole)));
        }
    }
    paths
}

/// Convert a Point2 contour to i_overlay path format
fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

/// Convert i_overlay result shapes back to a footprint
///
/// i_overlay returns Vec<Vec<Vec<[f64; 2]>>> where:
/// - Outer Vec: list of shapes
/// - Middle Vec: list of contours per shape (first is outer, rest are holes)
/// - Inner Vec: list of points per contour
fn shapes_to_footprint(shapes: &[Vec<Vec<[f64; 2]>>]) -> Footprint {
    let mut polygons = Vec::with_capacity(shapes.len());

    for shape in shapes {
        let Some(outer_path) = shape.first() else {
            continue;
        };
        let outer: Vec<Point2<f64>> = outer_path.iter().map(|p| Point2::new(p[0], p[1])).collect();
        if !is_valid_contour(&outer) {
            continue;
        }

        let holes = shape
            .iter()
            .skip(1)
            .map(|c| c.iter().map(|p| Point2::new(p[0], p[1])).collect::<Vec<_>>())
            .filter(|h| is_valid_contour(h))
            .map(|h| ensure_cw(&h))
            .collect();

        polygons.push(Profile2D::with_holes(ensure_ccw(&outer), holes));
    }

    Footprint::new(polygons)
}
