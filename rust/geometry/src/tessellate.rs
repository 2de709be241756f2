// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Solid to triangle mesh
//!
//! Planar faces are triangulated as they are; the tolerance only drives the
//! discretisation of curved faces, so the triangle count never drops when the
//! tolerance shrinks.

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::solid::{circle_segments, Cylinder, Solid};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Refinement limits for curved faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TessellationOptions {
    /// Halvings of the angular step before giving up
    pub max_refinements: u32,
    /// Hard cap on segments around a circle
    pub max_segments: u32,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self {
            max_refinements: 12,
            max_segments: 4096,
        }
    }
}

/// Triangulate a solid so no triangle deviates more than `tolerance` from it
pub fn tessellate(
    solid: &Solid,
    tolerance: f64,
    options: &TessellationOptions,
    deadline: &Deadline,
) -> Result<Mesh> {
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "tessellation tolerance must be positive, got {tolerance}"
        )));
    }
    deadline.check()?;

    let mesh = match solid {
        Solid::Prism(p) => Mesh::from_polygons(&p.boundary()?)?,
        Solid::Polyhedron(p) => Mesh::from_polygons(&p.boundary())?,
        Solid::Cylinder(c) => {
            let segments = circle_segments(
                c.radius,
                tolerance,
                options.max_refinements,
                options.max_segments,
            )?;
            tracing::debug!(radius = c.radius, tolerance, segments, "cylinder discretised");
            cylinder_mesh(c, segments)?
        }
    };
    deadline.check()?;

    mesh.validate()?;
    if !mesh.is_closed() {
        return Err(Error::TessellationDidNotConverge {
            tolerance,
            attempts: options.max_refinements,
        });
    }
    Ok(mesh)
}

/// Flat caps plus a smooth-shaded side band
fn cylinder_mesh(cylinder: &Cylinder, segments: u32) -> Result<Mesh> {
    let n = segments as usize;
    let mut mesh = Mesh::anchored(cylinder.bounds().min, 4 * n, 12 * n);

    let axis = cylinder.axis();
    let ring: Vec<(Point3<f64>, Point3<f64>, Vector3<f64>)> = (0..segments)
        .map(|i| {
            let theta = 2.0 * PI * f64::from(i) / f64::from(segments);
            let (s, c) = theta.sin_cos();
            let local = Point3::new(cylinder.radius * c, cylinder.radius * s, 0.0);
            let bottom = cylinder.placement * local;
            let top = cylinder.placement * Point3::new(local.x, local.y, cylinder.height);
            let radial = cylinder.placement * Vector3::new(c, s, 0.0);
            (bottom, top, radial)
        })
        .collect();

    // Bottom cap, wound clockwise seen from +axis
    let base = mesh.vertex_count() as u32;
    for (bottom, _, _) in &ring {
        mesh.add_vertex(*bottom, -axis);
    }
    for i in 1..segments - 1 {
        mesh.add_triangle(base, base + i + 1, base + i);
    }

    let base = mesh.vertex_count() as u32;
    for (_, top, _) in &ring {
        mesh.add_vertex(*top, axis);
    }
    for i in 1..segments - 1 {
        mesh.add_triangle(base, base + i, base + i + 1);
    }

    let base = mesh.vertex_count() as u32;
    for (bottom, top, radial) in &ring {
        mesh.add_vertex(*bottom, *radial);
        mesh.add_vertex(*top, *radial);
    }
    for i in 0..segments {
        let j = (i + 1) % segments;
        let (b0, t0) = (base + 2 * i, base + 2 * i + 1);
        let (b1, t1) = (base + 2 * j, base + 2 * j + 1);
        mesh.add_triangle(b0, b1, t1);
        mesh.add_triangle(b0, t1, t0);
    }

    Ok(mesh)
}
