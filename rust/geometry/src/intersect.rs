// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Solid/solid intersection
//!
//! [`intersect_solids`] routes each pair to the cheapest kernel that is exact
//! for it:
//!
//! 1. **Extrusion**: both solids are vertical extrusions (prisms, or
//!    cylinders discretised at the chord tolerance). The intersection is the
//!    plan-profile overlap times the shared Z interval.
//! 2. **Convex clip**: both solids are convex. Half-space clipping of each
//!    boundary against the other.
//! 3. **BSP**: anything else goes through the csgrs boolean.
//!
//! The reported volume is always integrated over the resulting boundary.

use crate::bool2d::intersect_footprints;
use crate::csg::{bsp_intersection, ClippingProcessor};
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::footprint::Footprint;
use crate::mesh::Mesh;
use crate::profile::Profile2D;
use crate::solid::{circle_segments, polygons_signed_volume, Polygon3, Prism, Solid};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

/// Tuning for the exact kernels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelOptions {
    /// Sagitta bound for discretising curved faces
    pub chord_tolerance: f64,
    /// On-plane distance for half-space clipping
    pub clip_epsilon: f64,
    /// Keep the intersection boundary in the result
    pub keep_geometry: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            chord_tolerance: 1e-3,
            clip_epsilon: 1e-9,
            keep_geometry: false,
        }
    }
}

/// Which kernel produced an intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    /// Bounding boxes do not touch; no kernel ran
    Disjoint,
    Extrusion,
    ConvexClip,
    Bsp,
}

/// Result of intersecting two solids
#[derive(Debug, Clone)]
pub struct Intersection {
    /// Non-negative overlap volume
    pub volume: f64,
    pub kernel: Kernel,
    /// Outward boundary of the overlap (empty unless geometry was requested)
    pub boundary: Vec<Polygon3>,
}

impl Intersection {
    fn disjoint() -> Self {
        Self {
            volume: 0.0,
            kernel: Kernel::Disjoint,
            boundary: Vec::new(),
        }
    }

    /// Whether an exact kernel was invoked
    pub fn used_kernel(&self) -> bool {
        self.kernel != Kernel::Disjoint
    }

    /// Flat-shaded triangle mesh of the overlap boundary
    pub fn mesh(&self) -> Result<Mesh> {
        Mesh::from_polygons(&self.boundary)
    }
}

/// Exact intersection of two solids
pub fn intersect_solids(
    a: &Solid,
    b: &Solid,
    options: &KernelOptions,
    deadline: &Deadline,
) -> Result<Intersection> {
    if !(options.chord_tolerance.is_finite() && options.chord_tolerance > 0.0) {
        return Err(Error::InvalidArgument(format!(
            "chord tolerance must be positive, got {}",
            options.chord_tolerance
        )));
    }
    deadline.check()?;

    if !a.bounds().intersects(&b.bounds()) {
        return Ok(Intersection::disjoint());
    }

    if let (Some(ea), Some(eb)) = (
        plan_extrusion(a, options.chord_tolerance)?,
        plan_extrusion(b, options.chord_tolerance)?,
    ) {
        return extrusion_intersection(&ea, &eb, options, deadline);
    }

    let boundary_a = a.boundary(options.chord_tolerance)?;
    let boundary_b = b.boundary(options.chord_tolerance)?;
    deadline.check()?;

    let (kernel, boundary) = if a.is_convex() && b.is_convex() {
        let clipper = ClippingProcessor::with_epsilon(options.clip_epsilon);
        (
            Kernel::ConvexClip,
            clipper.convex_intersection(&boundary_a, &boundary_b, deadline)?,
        )
    } else {
        (
            Kernel::Bsp,
            bsp_intersection(&boundary_a, &boundary_b, deadline)?,
        )
    };

    let volume = polygons_signed_volume(&boundary).max(0.0);
    tracing::debug!(?kernel, faces = boundary.len(), volume, "solid intersection");
    Ok(Intersection {
        volume,
        kernel,
        boundary: if options.keep_geometry {
            boundary
        } else {
            Vec::new()
        },
    })
}

/// Plan footprint and Z interval of a vertical extrusion
struct PlanExtrusion {
    footprint: Footprint,
    z_min: f64,
    z_max: f64,
}

fn plan_extrusion(solid: &Solid, chord_tolerance: f64) -> Result<Option<PlanExtrusion>> {
    match solid {
        Solid::Prism(p) if p.is_vertical() => {
            let (profile, z_min, z_max) = p.plan_profile();
            Ok(Some(PlanExtrusion {
                footprint: Footprint::from_profile(profile),
                z_min,
                z_max,
            }))
        }
        Solid::Cylinder(c) if c.is_vertical() => {
            let segments = circle_segments(c.radius, chord_tolerance, 16, 1 << 16)?;
            let (ring, z_min, z_max) = c.plan_ring(segments);
            Ok(Some(PlanExtrusion {
                footprint: Footprint::from_profile(Profile2D::new(ring)),
                z_min,
                z_max,
            }))
        }
        _ => Ok(None),
    }
}

fn extrusion_intersection(
    a: &PlanExtrusion,
    b: &PlanExtrusion,
    options: &KernelOptions,
    deadline: &Deadline,
) -> Result<Intersection> {
    let z_min = a.z_min.max(b.z_min);
    let z_max = a.z_max.min(b.z_max);
    let height = z_max - z_min;
    if height <= 0.0 {
        return Ok(Intersection {
            volume: 0.0,
            kernel: Kernel::Extrusion,
            boundary: Vec::new(),
        });
    }

    let overlap = intersect_footprints(&a.footprint, &b.footprint);
    deadline.check()?;

    let mut boundary = Vec::new();
    if options.keep_geometry {
        for polygon in overlap.polygons.iter().cloned() {
            // Slivers below the degenerate threshold carry no volume
            if let Ok(prism) =
                Prism::new(polygon, height, Isometry3::translation(0.0, 0.0, z_min))
            {
                boundary.extend(prism.boundary()?);
            }
        }
    }

    Ok(Intersection {
        volume: (overlap.area() * height).max(0.0),
        kernel: Kernel::Extrusion,
        boundary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::volume;
    use crate::solid::{Cylinder, Polyhedron};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn wall(x: f64, y: f64, dx: f64, dy: f64) -> Solid {
        Solid::from(Prism::cuboid(Point3::new(x, y, 0.0), dx, dy, 3.0).unwrap())
    }

    #[test]
    fn test_crossing_walls_use_extrusion_kernel() {
        let a = wall(0.0, 0.0, 5.0, 0.2);
        let b = wall(2.0, -1.0, 0.3, 2.0);
        let hit = intersect_solids(&a, &b, &KernelOptions::default(), &Deadline::none()).unwrap();
        assert_eq!(hit.kernel, Kernel::Extrusion);
        assert_relative_eq!(hit.volume, 0.3 * 0.2 * 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_self_intersection_equals_volume() {
        let a = wall(1.0, 1.0, 4.0, 0.25);
        let hit = intersect_solids(&a, &a, &KernelOptions::default(), &Deadline::none()).unwrap();
        let v = volume(&a, &Deadline::none()).unwrap();
        assert_relative_eq!(hit.volume, v, epsilon = 1e-6);
    }

    #[test]
    fn test_disjoint_boxes_skip_kernel() {
        let a = wall(0.0, 0.0, 1.0, 1.0);
        let b = wall(5.0, 5.0, 1.0, 1.0);
        let hit = intersect_solids(&a, &b, &KernelOptions::default(), &Deadline::none()).unwrap();
        assert_eq!(hit.volume, 0.0);
        assert!(!hit.used_kernel());
    }

    #[test]
    fn test_polyhedra_use_convex_clip() {
        let a = Solid::from(
            Polyhedron::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)).unwrap(),
        );
        let b = Solid::from(
            Polyhedron::cuboid(Point3::new(1.0, 0.5, -1.0), Point3::new(4.0, 1.5, 1.0)).unwrap(),
        );
        let options = KernelOptions {
            keep_geometry: true,
            ..KernelOptions::default()
        };
        let hit = intersect_solids(&a, &b, &options, &Deadline::none()).unwrap();
        assert_eq!(hit.kernel, Kernel::ConvexClip);
        assert_relative_eq!(hit.volume, 1.0, epsilon = 1e-9);
        let mesh = hit.mesh().unwrap();
        assert!(mesh.is_closed());
    }

    #[test]
    fn test_l_shaped_beam_uses_bsp() {
        // L-profile extruded horizontally along +Y
        let profile = Profile2D::new(vec![
            nalgebra::Point2::new(0.0, 0.0),
            nalgebra::Point2::new(2.0, 0.0),
            nalgebra::Point2::new(2.0, 1.0),
            nalgebra::Point2::new(1.0, 1.0),
            nalgebra::Point2::new(1.0, 2.0),
            nalgebra::Point2::new(0.0, 2.0),
        ]);
        let placement = Isometry3::new(
            Vector3::zeros(),
            Vector3::new(-std::f64::consts::FRAC_PI_2, 0.0, 0.0),
        );
        let beam = Solid::from(Prism::new(profile, 4.0, placement).unwrap());
        let block = Solid::from(
            Polyhedron::cuboid(Point3::new(-1.0, 1.0, -3.0), Point3::new(3.0, 2.0, 3.0)).unwrap(),
        );
        let hit =
            intersect_solids(&beam, &block, &KernelOptions::default(), &Deadline::none()).unwrap();
        assert_eq!(hit.kernel, Kernel::Bsp);
        // One metre slice of an L with area 3
        assert_relative_eq!(hit.volume, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_column_in_slab() {
        let slab = Solid::from(Prism::cuboid(Point3::new(-2.0, -2.0, 2.8), 4.0, 4.0, 0.4).unwrap());
        let column = Solid::from(Cylinder::new(Isometry3::identity(), 0.2, 3.0).unwrap());
        let options = KernelOptions {
            chord_tolerance: 1e-5,
            ..KernelOptions::default()
        };
        let hit = intersect_solids(&slab, &column, &options, &Deadline::none()).unwrap();
        assert_eq!(hit.kernel, Kernel::Extrusion);
        let exact = std::f64::consts::PI * 0.04 * 0.2;
        assert!((hit.volume - exact).abs() < 1e-3 * exact);
    }

    #[test]
    fn test_invalid_chord_tolerance() {
        let a = wall(0.0, 0.0, 1.0, 1.0);
        let options = KernelOptions {
            chord_tolerance: 0.0,
            ..KernelOptions::default()
        };
        assert!(matches!(
            intersect_solids(&a, &a, &options, &Deadline::none()),
            Err(Error::InvalidArgument(_))
        ));
    }
}
