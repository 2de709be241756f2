// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Solid representations of building elements
//!
//! A [`Solid`] is the exact boundary representation handed to every kernel
//! in this crate. Three shapes cover what building models actually contain:
//!
//! - [`Prism`]: a planar profile (with holes) extruded along its local +Z.
//!   Walls, slabs, beams and most columns land here.
//! - [`Polyhedron`]: a faceted B-rep with shared vertices and planar faces,
//!   validated to be closed, two-manifold and outward oriented.
//! - [`Cylinder`]: a circular extrusion, the one curved case that shows up
//!   often enough (round columns, pipes) to deserve closed-form metrics.
//!
//! Solids are immutable once built. Every constructor validates, so holding a
//! `Solid` means holding a closed volume.

use crate::bool2d::{compute_signed_area, ensure_ccw};
use crate::bounds::Aabb;
use crate::error::{Error, Result};
use crate::profile::Profile2D;
use nalgebra::{Isometry3, Point2, Point3, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::f64::consts::PI;

/// Planar polygon in model space, counter-clockwise seen from outside
pub type Polygon3 = Vec<Point3<f64>>;

/// Measures below this are treated as collapsed
pub const DEGENERATE_EPSILON: f64 = 1e-9;

/// Distance tolerance for planarity/convexity checks
const PLANE_EPSILON: f64 = 1e-7;

/// Starting segment count for circle discretisation
const MIN_CIRCLE_SEGMENTS: u32 = 8;

/// Boundary representation of one building element
#[derive(Debug, Clone)]
pub enum Solid {
    Prism(Prism),
    Polyhedron(Polyhedron),
    Cylinder(Cylinder),
}

impl Solid {
    /// Axis-aligned box fully containing the solid
    pub fn bounds(&self) -> Aabb {
        match self {
            Solid::Prism(p) => p.bounds(),
            Solid::Polyhedron(p) => p.bounds(),
            Solid::Cylinder(c) => c.bounds(),
        }
    }

    /// Whether the solid is convex (enables the half-space clipping kernel)
    pub fn is_convex(&self) -> bool {
        match self {
            Solid::Prism(p) => p.profile.is_convex(),
            Solid::Polyhedron(p) => p.is_convex(),
            Solid::Cylinder(_) => true,
        }
    }

    /// Prism extruded straight up or down (enables the exact 2D clash path)
    pub fn as_vertical_prism(&self) -> Option<&Prism> {
        match self {
            Solid::Prism(p) if p.is_vertical() => Some(p),
            _ => None,
        }
    }

    /// Whether any face is curved
    pub fn has_curved_faces(&self) -> bool {
        matches!(self, Solid::Cylinder(_))
    }

    /// Boundary polygons, curved faces discretised within `chord_tolerance`
    ///
    /// Polygons are planar, simple and wound counter-clockwise seen from
    /// outside. Faces with holes are split into triangles.
    pub fn boundary(&self, chord_tolerance: f64) -> Result<Vec<Polygon3>> {
        match self {
            Solid::Prism(p) => p.boundary(),
            Solid::Polyhedron(p) => Ok(p.boundary()),
            Solid::Cylinder(c) => {
                let segments = circle_segments(c.radius, chord_tolerance, 16, 1 << 16)?;
                Ok(c.boundary(segments))
            }
        }
    }
}

impl From<Prism> for Solid {
    fn from(prism: Prism) -> Self {
        Solid::Prism(prism)
    }
}

impl From<Polyhedron> for Solid {
    fn from(polyhedron: Polyhedron) -> Self {
        Solid::Polyhedron(polyhedron)
    }
}

impl From<Cylinder> for Solid {
    fn from(cylinder: Cylinder) -> Self {
        Solid::Cylinder(cylinder)
    }
}

// ============================================================================
// Prism
// ============================================================================

/// Planar profile extruded along local +Z
#[derive(Debug, Clone)]
pub struct Prism {
    /// Profile in the local XY plane (outer CCW, holes CW)
    pub profile: Profile2D,
    /// Extrusion length along local +Z
    pub depth: f64,
    /// Rigid placement of the local frame in model space
    pub placement: Isometry3<f64>,
}

impl Prism {
    /// Create a validated prism
    pub fn new(profile: Profile2D, depth: f64, placement: Isometry3<f64>) -> Result<Self> {
        if !depth.is_finite() || depth <= DEGENERATE_EPSILON {
            return Err(Error::DegenerateSolid(format!(
                "collapsed extrusion depth {depth}"
            )));
        }
        if !profile.is_valid() {
            return Err(Error::DegenerateSolid(
                "profile encloses no area".to_string(),
            ));
        }
        if profile.area() <= DEGENERATE_EPSILON {
            return Err(Error::DegenerateSolid(
                "profile holes cover the whole outer ring".to_string(),
            ));
        }
        Ok(Self {
            profile: profile.normalized(),
            depth,
            placement,
        })
    }

    /// Axis-aligned box `dx` × `dy` × `dz` with its minimum corner at `origin`
    pub fn cuboid(origin: Point3<f64>, dx: f64, dy: f64, dz: f64) -> Result<Self> {
        Self::new(
            Profile2D::rectangle(dx, dy),
            dz,
            Isometry3::translation(origin.x, origin.y, origin.z),
        )
    }

    /// Extrusion direction in model space
    pub fn direction(&self) -> Vector3<f64> {
        self.placement * Vector3::z()
    }

    /// Local +Z maps to world ±Z
    pub fn is_vertical(&self) -> bool {
        let d = self.direction();
        d.x.abs() < PLANE_EPSILON && d.y.abs() < PLANE_EPSILON
    }

    /// Map a profile point at local height `z` into model space
    #[inline]
    pub fn to_world(&self, p: &Point2<f64>, z: f64) -> Point3<f64> {
        self.placement * Point3::new(p.x, p.y, z)
    }

    /// Profile transformed into world XY plus the world Z extent
    ///
    /// Only meaningful for vertical prisms; the returned profile keeps CCW
    /// orientation when the extrusion points down.
    pub fn plan_profile(&self) -> (Profile2D, f64, f64) {
        let map_ring = |ring: &[Point2<f64>]| -> Vec<Point2<f64>> {
            ring.iter()
                .map(|p| {
                    let w = self.to_world(p, 0.0);
                    Point2::new(w.x, w.y)
                })
                .collect()
        };
        let profile = Profile2D::with_holes(
            map_ring(&self.profile.outer),
            self.profile.holes.iter().map(|h| map_ring(h)).collect(),
        )
        .normalized();

        let z0 = self.to_world(&Point2::origin(), 0.0).z;
        let z1 = self.to_world(&Point2::origin(), self.depth).z;
        (profile, z0.min(z1), z0.max(z1))
    }

    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for p in &self.profile.outer {
            bounds.expand(&self.to_world(p, 0.0));
            bounds.expand(&self.to_world(p, self.depth));
        }
        bounds
    }

    /// Boundary polygons: caps plus one quad per profile edge
    pub fn boundary(&self) -> Result<Vec<Polygon3>> {
        let mut polygons = Vec::new();

        if self.profile.holes.is_empty() {
            // Bottom cap faces -Z (reverse), top cap faces +Z
            polygons.push(
                self.profile
                    .outer
                    .iter()
                    .rev()
                    .map(|p| self.to_world(p, 0.0))
                    .collect(),
            );
            polygons.push(
                self.profile
                    .outer
                    .iter()
                    .map(|p| self.to_world(p, self.depth))
                    .collect(),
            );
        } else {
            let tri = self.profile.triangulate()?;
            for t in tri.indices.chunks_exact(3) {
                let (a, b, c) = (tri.points[t[0]], tri.points[t[1]], tri.points[t[2]]);
                // earcut output winding is not guaranteed, normalise to CCW
                let ccw = compute_signed_area(&[a, b, c]) > 0.0;
                let (b, c) = if ccw { (b, c) } else { (c, b) };
                polygons.push(vec![
                    self.to_world(&a, 0.0),
                    self.to_world(&c, 0.0),
                    self.to_world(&b, 0.0),
                ]);
                polygons.push(vec![
                    self.to_world(&a, self.depth),
                    self.to_world(&b, self.depth),
                    self.to_world(&c, self.depth),
                ]);
            }
        }

        for ring in std::iter::once(&self.profile.outer).chain(self.profile.holes.iter()) {
            let n = ring.len();
            for i in 0..n {
                let p0 = &ring[i];
                let p1 = &ring[(i + 1) % n];
                polygons.push(vec![
                    self.to_world(p0, 0.0),
                    self.to_world(p1, 0.0),
                    self.to_world(p1, self.depth),
                    self.to_world(p0, self.depth),
                ]);
            }
        }

        Ok(polygons)
    }
}

// ============================================================================
// Polyhedron
// ============================================================================

/// Closed, two-manifold faceted B-rep with outward-facing faces
#[derive(Debug, Clone)]
pub struct Polyhedron {
    vertices: Vec<Point3<f64>>,
    faces: Vec<Vec<u32>>,
}

/// Undirected edge key (smaller index first)
#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Polyhedron {
    /// Build and validate a polyhedron from shared vertices and face loops
    ///
    /// Faces may arrive with inconsistent winding; they are re-oriented so
    /// every shell faces outward. Open or non-manifold input is rejected.
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<Vec<u32>>) -> Result<Self> {
        if vertices.iter().any(|v| !v.coords.iter().all(|c| c.is_finite())) {
            return Err(Error::DegenerateSolid("non-finite vertex".to_string()));
        }

        let mut cleaned: Vec<Vec<u32>> = Vec::with_capacity(faces.len());
        for face in faces {
            let mut loop_: Vec<u32> = Vec::with_capacity(face.len());
            for idx in face {
                if idx as usize >= vertices.len() {
                    return Err(Error::DegenerateSolid(format!(
                        "face references vertex {idx} of {}",
                        vertices.len()
                    )));
                }
                if loop_.last() != Some(&idx) {
                    loop_.push(idx);
                }
            }
            if loop_.len() > 1 && loop_.first() == loop_.last() {
                loop_.pop();
            }
            if loop_.len() < 3 {
                continue;
            }
            let pts: Vec<Point3<f64>> = loop_.iter().map(|&i| vertices[i as usize]).collect();
            if newell_vector(&pts).norm() * 0.5 <= DEGENERATE_EPSILON {
                continue;
            }
            cleaned.push(loop_);
        }

        if cleaned.len() < 4 {
            return Err(Error::DegenerateSolid(format!(
                "{} usable faces, a closed solid needs at least 4",
                cleaned.len()
            )));
        }

        let mut polyhedron = Self {
            vertices,
            faces: cleaned,
        };
        polyhedron.orient()?;

        if polyhedron.signed_volume() <= DEGENERATE_EPSILON {
            return Err(Error::DegenerateSolid("zero enclosed volume".to_string()));
        }

        Ok(polyhedron)
    }

    /// Axis-aligned box between two corners
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Result<Self> {
        let b = Aabb::new(min, max);
        let (lo, hi) = (b.min, b.max);
        let vertices = vec![
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
        ];
        let faces = vec![
            vec![0, 3, 2, 1], // bottom
            vec![4, 5, 6, 7], // top
            vec![0, 1, 5, 4], // front
            vec![1, 2, 6, 5], // right
            vec![2, 3, 7, 6], // back
            vec![3, 0, 4, 7], // left
        ];
        Self::new(vertices, faces)
    }

    /// Wrap polygons that are already known to bound a closed volume
    ///
    /// Vertices are welded on a micrometre grid; the result is validated like
    /// any other polyhedron.
    pub fn from_polygons(polygons: &[Polygon3]) -> Result<Self> {
        let mut welder = VertexWelder::new(1e-6);
        let faces: Vec<Vec<u32>> = polygons
            .iter()
            .map(|poly| poly.iter().map(|p| welder.insert(*p)).collect())
            .collect();
        Self::new(welder.into_vertices(), faces)
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<u32>] {
        &self.faces
    }

    /// Points of one face in winding order
    pub fn face_points(&self, face: usize) -> Polygon3 {
        self.faces[face]
            .iter()
            .map(|&i| self.vertices[i as usize])
            .collect()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter()).unwrap_or_else(Aabb::empty)
    }

    /// All faces as point loops
    pub fn boundary(&self) -> Vec<Polygon3> {
        (0..self.faces.len()).map(|f| self.face_points(f)).collect()
    }

    /// Signed volume via the divergence theorem (positive when outward)
    pub fn signed_volume(&self) -> f64 {
        polygons_signed_volume(&self.boundary())
    }

    /// Every vertex lies on or behind every face plane
    pub fn is_convex(&self) -> bool {
        let scale = self.bounds().max.coords.amax().max(1.0);
        let tolerance = PLANE_EPSILON * scale;
        self.faces.iter().enumerate().all(|(f, _)| {
            let pts = self.face_points(f);
            let Some(normal) = newell_vector(&pts).try_normalize(1e-12) else {
                return false;
            };
            let origin = centroid(&pts);
            self.vertices
                .iter()
                .all(|v| (v - origin).dot(&normal) <= tolerance)
        })
    }

    /// Check closure/manifoldness and make face winding consistent and outward
    fn orient(&mut self) -> Result<()> {
        // Undirected edge -> faces using it, with the direction each face walks it
        let mut edge_faces: FxHashMap<(u32, u32), SmallVec<[(usize, bool); 2]>> =
            FxHashMap::default();
        for (f, face) in self.faces.iter().enumerate() {
            let n = face.len();
            for i in 0..n {
                let (a, b) = (face[i], face[(i + 1) % n]);
                edge_faces
                    .entry(edge_key(a, b))
                    .or_default()
                    .push((f, a < b));
            }
        }

        let open = edge_faces.values().filter(|v| v.len() == 1).count();
        if open > 0 {
            return Err(Error::NonClosedSolid(open));
        }
        let non_manifold = edge_faces.values().filter(|v| v.len() > 2).count();
        if non_manifold > 0 {
            return Err(Error::NonManifoldSolid(non_manifold));
        }

        // Face adjacency, then flood-fill a consistent orientation per shell
        let mut adjacency: Vec<Vec<(usize, bool, bool)>> = vec![Vec::new(); self.faces.len()];
        for uses in edge_faces.values() {
            let (f, df) = uses[0];
            let (g, dg) = uses[1];
            adjacency[f].push((g, df, dg));
            adjacency[g].push((f, dg, df));
        }

        let mut flip: Vec<Option<bool>> = vec![None; self.faces.len()];
        let mut shells: Vec<Vec<usize>> = Vec::new();
        for seed in 0..self.faces.len() {
            if flip[seed].is_some() {
                continue;
            }
            flip[seed] = Some(false);
            let mut shell = vec![seed];
            let mut stack = vec![seed];
            while let Some(f) = stack.pop() {
                let flip_f = flip[f].unwrap_or(false);
                for &(g, dir_f, dir_g) in &adjacency[f] {
                    // Neighbours must walk the shared edge in opposite directions
                    let wanted = dir_g == (dir_f ^ flip_f);
                    match flip[g] {
                        None => {
                            flip[g] = Some(wanted);
                            shell.push(g);
                            stack.push(g);
                        }
                        Some(existing) if existing != wanted => {
                            return Err(Error::DegenerateSolid(
                                "non-orientable surface".to_string(),
                            ));
                        }
                        Some(_) => {}
                    }
                }
            }
            shells.push(shell);
        }

        for (f, face) in self.faces.iter_mut().enumerate() {
            if flip[f] == Some(true) {
                face.reverse();
            }
        }

        // Each shell must enclose positive volume on its own
        for shell in shells {
            let polys: Vec<Polygon3> = shell.iter().map(|&f| self.face_points(f)).collect();
            if polygons_signed_volume(&polys) < 0.0 {
                for &f in &shell {
                    self.faces[f].reverse();
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Cylinder
// ============================================================================

/// Right circular cylinder along local +Z
#[derive(Debug, Clone)]
pub struct Cylinder {
    /// Base circle centre and axis frame
    pub placement: Isometry3<f64>,
    pub radius: f64,
    pub height: f64,
}

impl Cylinder {
    pub fn new(placement: Isometry3<f64>, radius: f64, height: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= DEGENERATE_EPSILON {
            return Err(Error::DegenerateSolid(format!("collapsed radius {radius}")));
        }
        if !height.is_finite() || height <= DEGENERATE_EPSILON {
            return Err(Error::DegenerateSolid(format!("collapsed height {height}")));
        }
        Ok(Self {
            placement,
            radius,
            height,
        })
    }

    /// Unit axis in model space
    pub fn axis(&self) -> Vector3<f64> {
        self.placement * Vector3::z()
    }

    pub fn base_center(&self) -> Point3<f64> {
        self.placement * Point3::origin()
    }

    pub fn top_center(&self) -> Point3<f64> {
        self.placement * Point3::new(0.0, 0.0, self.height)
    }

    /// Exact box: each disk extends `r·sqrt(1 - a_i²)` along world axis i
    pub fn bounds(&self) -> Aabb {
        let a = self.axis();
        let ext = Vector3::new(
            self.radius * (1.0 - a.x * a.x).max(0.0).sqrt(),
            self.radius * (1.0 - a.y * a.y).max(0.0).sqrt(),
            self.radius * (1.0 - a.z * a.z).max(0.0).sqrt(),
        );
        let base = self.base_center();
        let top = self.top_center();
        Aabb::new(base - ext, base + ext).union(&Aabb::new(top - ext, top + ext))
    }

    /// Axis is world ±Z
    pub fn is_vertical(&self) -> bool {
        let a = self.axis();
        a.x.abs() < PLANE_EPSILON && a.y.abs() < PLANE_EPSILON
    }

    /// Inscribed circle ring in the local XY plane (CCW)
    pub fn ring(&self, segments: u32) -> Vec<Point2<f64>> {
        (0..segments)
            .map(|i| {
                let theta = 2.0 * PI * f64::from(i) / f64::from(segments);
                Point2::new(self.radius * theta.cos(), self.radius * theta.sin())
            })
            .collect()
    }

    /// Inscribed polygonal boundary with `segments` sides
    pub fn boundary(&self, segments: u32) -> Vec<Polygon3> {
        let ring = self.ring(segments);
        let lift = |p: &Point2<f64>, z: f64| self.placement * Point3::new(p.x, p.y, z);

        let mut polygons = Vec::with_capacity(ring.len() + 2);
        polygons.push(ring.iter().rev().map(|p| lift(p, 0.0)).collect());
        polygons.push(ring.iter().map(|p| lift(p, self.height)).collect());
        let n = ring.len();
        for i in 0..n {
            let (p0, p1) = (&ring[i], &ring[(i + 1) % n]);
            polygons.push(vec![
                lift(p0, 0.0),
                lift(p1, 0.0),
                lift(p1, self.height),
                lift(p0, self.height),
            ]);
        }
        polygons
    }

    /// Plan-view disk polygon for vertical cylinders, plus the Z extent
    pub fn plan_ring(&self, segments: u32) -> (Vec<Point2<f64>>, f64, f64) {
        let ring = self
            .ring(segments)
            .iter()
            .map(|p| {
                let w = self.placement * Point3::new(p.x, p.y, 0.0);
                Point2::new(w.x, w.y)
            })
            .collect::<Vec<_>>();
        let (z0, z1) = (self.base_center().z, self.top_center().z);
        (ensure_ccw(&ring), z0.min(z1), z0.max(z1))
    }
}

/// Segment count whose chord sagitta stays within `tolerance`
///
/// Starts at 8 segments and doubles (halving the angular step) until
/// `r·(1 - cos(π/n)) <= tolerance`. Fails when that takes more than
/// `max_refinements` doublings or exceeds `max_segments`.
pub fn circle_segments(
    radius: f64,
    tolerance: f64,
    max_refinements: u32,
    max_segments: u32,
) -> Result<u32> {
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "tolerance must be positive, got {tolerance}"
        )));
    }

    let mut segments = MIN_CIRCLE_SEGMENTS;
    for _ in 0..=max_refinements {
        let sagitta = radius * (1.0 - (PI / f64::from(segments)).cos());
        if sagitta <= tolerance {
            return Ok(segments);
        }
        segments = segments.saturating_mul(2);
        if segments > max_segments {
            break;
        }
    }

    Err(Error::TessellationDidNotConverge {
        tolerance,
        attempts: max_refinements,
    })
}

// ============================================================================
// Shared polygon helpers
// ============================================================================

/// Newell's area vector (direction = normal, length = 2 × area)
pub fn newell_vector(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::<f64>::zeros();
    if n < 3 {
        return normal;
    }
    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Area of a planar polygon
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    newell_vector(points).norm() * 0.5
}

/// Vertex average of a polygon
pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

/// Signed volume enclosed by outward-wound polygons (divergence theorem)
///
/// Each polygon is fanned around its centroid, which keeps the sum exact for
/// non-convex planar faces as well.
pub fn polygons_signed_volume(polygons: &[Polygon3]) -> f64 {
    let mut six_v = 0.0;
    for poly in polygons {
        if poly.len() < 3 {
            continue;
        }
        let c = centroid(poly).coords;
        let n = poly.len();
        for i in 0..n {
            let a = poly[i].coords;
            let b = poly[(i + 1) % n].coords;
            six_v += c.dot(&a.cross(&b));
        }
    }
    six_v / 6.0
}

/// Welds nearly coincident points onto shared indices
pub struct VertexWelder {
    scale: f64,
    lookup: FxHashMap<(i64, i64, i64), u32>,
    vertices: Vec<Point3<f64>>,
}

impl VertexWelder {
    /// `tolerance` is the grid pitch; points in the same cell are merged
    pub fn new(tolerance: f64) -> Self {
        Self {
            scale: 1.0 / tolerance.max(1e-12),
            lookup: FxHashMap::default(),
            vertices: Vec::new(),
        }
    }

    pub fn insert(&mut self, p: Point3<f64>) -> u32 {
        let key = (
            (p.x * self.scale).round() as i64,
            (p.y * self.scale).round() as i64,
            (p.z * self.scale).round() as i64,
        );
        let vertices = &mut self.vertices;
        *self.lookup.entry(key).or_insert_with(|| {
            vertices.push(p);
            (vertices.len() - 1) as u32
        })
    }

    pub fn into_vertices(self) -> Vec<Point3<f64>> {
        self.vertices
    }
}
