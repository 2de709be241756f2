// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plan-view footprints of solids
//!
//! A footprint is the region a solid covers when seen from above. Vertical
//! prisms and cylinders have a constant horizontal cross-section, which is
//! taken directly. Every other solid is orthogonally projected: the
//! upward-facing boundary polygons are flattened onto XY and merged.

use crate::bool2d::{compute_signed_area, simplify_contour, union_rings};
use crate::bounds::Rect2;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::profile::Profile2D;
use crate::solid::{circle_segments, Solid};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Projected faces with less plan area than this are vertical
const VERTICAL_FACE_AREA: f64 = 1e-12;

/// Collinear/duplicate point threshold applied after merging
const SIMPLIFY_EPSILON: f64 = 1e-9;

/// Multi-polygon in plan (each polygon may carry holes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub polygons: Vec<Profile2D>,
}

impl Footprint {
    pub fn new(polygons: Vec<Profile2D>) -> Self {
        Self { polygons }
    }

    pub fn from_profile(profile: Profile2D) -> Self {
        Self {
            polygons: vec![profile],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Net covered area
    pub fn area(&self) -> f64 {
        self.polygons.iter().map(Profile2D::area).sum()
    }

    /// Total ring length including holes
    pub fn perimeter(&self) -> f64 {
        self.polygons.iter().map(Profile2D::perimeter).sum()
    }

    pub fn bounds(&self) -> Option<Rect2> {
        self.polygons
            .iter()
            .filter_map(Profile2D::bounds)
            .reduce(|acc, r| acc.union(&r))
    }

    /// Well-Known-Text rendering (`POLYGON` for one part, else `MULTIPOLYGON`)
    pub fn to_wkt(&self) -> String {
        crate::wkt::write_footprint(self)
    }

    /// Drop collinear vertices from every ring
    pub fn simplified(&self) -> Self {
        let polygons = self
            .polygons
            .iter()
            .map(|p| {
                Profile2D::with_holes(
                    simplify_contour(&p.outer, SIMPLIFY_EPSILON),
                    p.holes
                        .iter()
                        .map(|h| simplify_contour(h, SIMPLIFY_EPSILON))
                        .collect(),
                )
            })
            .collect();
        Self { polygons }
    }
}

/// Project a solid onto the XY plane
///
/// Fails with [`Error::ZeroAreaProjection`] when the result covers no area
/// (e.g. a vertical sheet).
pub fn project_footprint(
    solid: &Solid,
    chord_tolerance: f64,
    deadline: &Deadline,
) -> Result<Footprint> {
    deadline.check()?;

    let footprint = match solid {
        Solid::Prism(prism) if prism.is_vertical() => {
            let (profile, _, _) = prism.plan_profile();
            Footprint::from_profile(profile)
        }
        Solid::Cylinder(cylinder) if cylinder.is_vertical() => {
            let segments = circle_segments(cylinder.radius, chord_tolerance, 16, 1 << 16)?;
            let (ring, _, _) = cylinder.plan_ring(segments);
            Footprint::from_profile(Profile2D::new(ring))
        }
        _ => project_boundary(solid, chord_tolerance, deadline)?,
    };

    let footprint = footprint.simplified();
    if footprint.area() <= VERTICAL_FACE_AREA {
        return Err(Error::ZeroAreaProjection);
    }
    Ok(footprint)
}

/// Merge every upward-facing boundary polygon flattened onto XY
///
/// For a closed solid each vertical line through its shadow leaves the solid
/// through an upward-facing face, so those faces alone cover the shadow.
fn project_boundary(
    solid: &Solid,
    chord_tolerance: f64,
    deadline: &Deadline,
) -> Result<Footprint> {
    let rings: Vec<Vec<Point2<f64>>> = solid
        .boundary(chord_tolerance)?
        .into_iter()
        .map(|poly| {
            poly.iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect::<Vec<_>>()
        })
        .filter(|ring| compute_signed_area(ring) > VERTICAL_FACE_AREA)
        .collect();

    deadline.check()?;
    Ok(union_rings(&rings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::{Cylinder, Polyhedron, Prism};
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

    #[test]
    fn test_vertical_prism_footprint_is_profile() {
        let wall = Prism::cuboid(Point3::new(1.0, 2.0, 0.0), 5.0, 0.2, 3.0).unwrap();
        let fp = project_footprint(&Solid::from(wall), 1e-3, &Deadline::none()).unwrap();
        assert_eq!(fp.polygons.len(), 1);
        assert_relative_eq!(fp.area(), 1.0, epsilon = 1e-9);
        let b = fp.bounds().unwrap();
        assert_relative_eq!(b.min.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(b.max.y, 2.2, epsilon = 1e-12);
    }

    #[test]
    fn test_lying_prism_footprint_is_projected() {
        // Beam extruded along +X: profile in local XY rotated so local Z -> world X
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let placement = Isometry3::from_parts(Translation3::new(0.0, 0.0, 3.0), rotation);
        let beam = Prism::new(Profile2D::rectangle(0.4, 0.3), 6.0, placement).unwrap();
        assert!(!beam.is_vertical());
        let fp = project_footprint(&Solid::from(beam), 1e-3, &Deadline::none()).unwrap();
        assert_relative_eq!(fp.area(), 6.0 * 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_polyhedron_footprint() {
        let block =
            Polyhedron::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 3.0, 1.0)).unwrap();
        let fp = project_footprint(&Solid::from(block), 1e-3, &Deadline::none()).unwrap();
        assert_relative_eq!(fp.area(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(fp.perimeter(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cylinder_footprint_approaches_disk() {
        let column = Cylinder::new(Isometry3::identity(), 0.3, 3.0).unwrap();
        let fp = project_footprint(&Solid::from(column), 1e-4, &Deadline::none()).unwrap();
        let disk = std::f64::consts::PI * 0.09;
        assert!(fp.area() < disk);
        assert!(disk - fp.area() < 0.01 * disk);
    }

    #[test]
    fn test_expired_deadline() {
        let block =
            Polyhedron::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap();
        let deadline = Deadline::none();
        deadline.cancel();
        assert_eq!(
            project_footprint(&Solid::from(block), 1e-3, &deadline),
            Err(Error::Timeout)
        );
    }
}
