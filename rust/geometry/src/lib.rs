// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIMQ Geometry Kernel
//!
//! Exact geometric operators over building-element solids: volume and
//! surface area, solid/solid intersection, plan footprints with 2D
//! booleans (i_overlay), tessellation, and binary glTF export.
//!
//! Every long-running operation takes a [`Deadline`] and fails with
//! [`Error::Timeout`] once it expires instead of returning partial work.

pub mod bool2d;
pub mod bounds;
pub mod csg;
pub mod deadline;
pub mod error;
pub mod footprint;
pub mod gltf;
pub mod intersect;
pub mod mesh;
pub mod metrics;
pub mod profile;
pub mod solid;
pub mod tessellate;
pub mod triangulation;
pub mod wkt;

// Re-export nalgebra types for convenience
pub use nalgebra::{Isometry3, Point2, Point3, Vector2, Vector3};

pub use bounds::{Aabb, Rect2};
pub use deadline::Deadline;
pub use error::{Error, Result};
pub use footprint::{project_footprint, Footprint};
pub use gltf::{export_glb, SceneMesh};
pub use intersect::{intersect_solids, Intersection, Kernel, KernelOptions};
pub use mesh::Mesh;
pub use metrics::{surface_area, volume};
pub use profile::Profile2D;
pub use solid::{Cylinder, Polygon3, Polyhedron, Prism, Solid, VertexWelder};
pub use tessellate::{tessellate, TessellationOptions};
