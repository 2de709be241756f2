// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exact volume and surface area
//!
//! Measures come straight from the boundary representation and never from a
//! tessellation, so they do not move with any export tolerance.

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::solid::{polygon_area, Solid, DEGENERATE_EPSILON};
use std::f64::consts::PI;

/// Enclosed volume
pub fn volume(solid: &Solid, deadline: &Deadline) -> Result<f64> {
    deadline.check()?;
    let v = match solid {
        Solid::Prism(p) => p.profile.area() * p.depth,
        Solid::Polyhedron(p) => p.signed_volume(),
        Solid::Cylinder(c) => PI * c.radius * c.radius * c.height,
    };
    positive(v, "volume")
}

/// Total boundary area
pub fn surface_area(solid: &Solid, deadline: &Deadline) -> Result<f64> {
    deadline.check()?;
    let a = match solid {
        Solid::Prism(p) => 2.0 * p.profile.area() + p.profile.perimeter() * p.depth,
        Solid::Polyhedron(p) => {
            let mut total = 0.0;
            for face in 0..p.faces().len() {
                total += polygon_area(&p.face_points(face));
            }
            total
        }
        Solid::Cylinder(c) => 2.0 * PI * c.radius * (c.radius + c.height),
    };
    positive(a, "surface area")
}

fn positive(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() && value > DEGENERATE_EPSILON {
        Ok(value)
    } else {
        Err(Error::DegenerateSolid(format!("{what} is {value}")))
    }
}
