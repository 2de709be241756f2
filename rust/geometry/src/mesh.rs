// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use crate::solid::Polygon3;
use crate::triangulation::{calculate_polygon_normal, triangulate_face};
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Grid pitch used to pair edges of flat-shaded triangles
const WELD_SCALE: f64 = 1e6;

/// Triangle mesh
///
/// Positions are stored in f32 relative to `origin`, so georeferenced
/// coordinates keep sub-millimetre precision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Model-space anchor that `positions` are relative to
    #[serde(default)]
    pub origin: [f64; 3],
    /// Vertex positions (x, y, z) relative to `origin`
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self::anchored(Point3::origin(), vertex_count, index_count)
    }

    /// Empty mesh whose positions will be stored relative to `origin`
    pub fn anchored(origin: Point3<f64>, vertex_count: usize, index_count: usize) -> Self {
        Self {
            origin: [origin.x, origin.y, origin.z],
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Flat-shaded mesh of planar outward-wound polygons, anchored at their
    /// minimum corner
    pub fn from_polygons(polygons: &[Polygon3]) -> Result<Self> {
        let origin = Aabb::from_points(polygons.iter().flatten())
            .map_or_else(Point3::origin, |b| b.min);
        let mut mesh = Mesh::anchored(origin, polygons.len() * 4, polygons.len() * 6);
        for polygon in polygons {
            let Some(normal) = calculate_polygon_normal(polygon) else {
                continue;
            };
            let triangles = triangulate_face(polygon)?;
            let base = mesh.vertex_count() as u32;
            for p in polygon {
                mesh.add_vertex(*p, normal);
            }
            for [a, b, c] in triangles {
                mesh.add_triangle(base + a as u32, base + b as u32, base + c as u32);
            }
        }
        Ok(mesh)
    }

    /// Add a vertex with normal
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        let p = position - self.origin_point();
        self.positions
            .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        self.normals
            .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    #[inline]
    pub fn origin_point(&self) -> Point3<f64> {
        Point3::from(self.origin)
    }

    /// Merge another mesh into this one, rebasing its positions onto this origin
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.origin = other.origin;
        }
        let shift = other.origin_point() - self.origin_point();
        let vertex_offset = self.vertex_count() as u32;
        self.positions.extend(
            other
                .positions
                .chunks_exact(3)
                .flat_map(|p| {
                    [
                        (f64::from(p[0]) + shift.x) as f32,
                        (f64::from(p[1]) + shift.y) as f32,
                        (f64::from(p[2]) + shift.z) as f32,
                    ]
                }),
        );
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Model-space position of one vertex
    #[inline]
    pub fn position(&self, index: u32) -> Point3<f64> {
        self.origin_point() + self.local(index)
    }

    #[inline]
    fn local(&self, index: u32) -> Vector3<f64> {
        let i = index as usize * 3;
        Vector3::new(
            f64::from(self.positions[i]),
            f64::from(self.positions[i + 1]),
            f64::from(self.positions[i + 2]),
        )
    }

    /// Bounding box of all positions, `None` for an empty mesh
    pub fn bounds(&self) -> Option<Aabb> {
        let points: Vec<Point3<f64>> = (0..self.vertex_count() as u32)
            .map(|i| self.position(i))
            .collect();
        Aabb::from_points(points.iter())
    }

    /// Component-wise min/max of stored (origin-relative) positions, as glTF
    /// accessors want them
    pub fn position_range(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for chunk in self.positions.chunks_exact(3) {
            for k in 0..3 {
                min[k] = min[k].min(chunk[k]);
                max[k] = max[k].max(chunk[k]);
            }
        }
        (min, max)
    }

    /// Structural checks: attribute lengths agree and indices are in range
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 || self.normals.len() != self.positions.len() {
            return Err(Error::Export(format!(
                "attribute length mismatch: {} positions, {} normals",
                self.positions.len(),
                self.normals.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::Export(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let count = self.vertex_count() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= count) {
            return Err(Error::Export(format!(
                "index {bad} out of range for {count} vertices"
            )));
        }
        Ok(())
    }

    /// Every edge is shared by exactly two triangles walking it in opposite
    /// directions (positions compared on a micrometre grid)
    pub fn is_closed(&self) -> bool {
        if self.indices.is_empty() || self.validate().is_err() {
            return false;
        }

        let key = |i: u32| {
            let p = self.position(i);
            (
                (p.x * WELD_SCALE).round() as i64,
                (p.y * WELD_SCALE).round() as i64,
                (p.z * WELD_SCALE).round() as i64,
            )
        };

        let mut directed: FxHashMap<_, i32> = FxHashMap::default();
        for tri in self.indices.chunks_exact(3) {
            let k = [key(tri[0]), key(tri[1]), key(tri[2])];
            for e in 0..3 {
                let (a, b) = (k[e], k[(e + 1) % 3]);
                if a == b {
                    continue;
                }
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }

        directed
            .iter()
            .all(|(&(a, b), &count)| directed.get(&(b, a)).copied().unwrap_or(0) == count)
    }

    /// Enclosed volume by the divergence theorem (f64 accumulation, origin-relative)
    pub fn signed_volume(&self) -> f64 {
        self.indices
            .chunks_exact(3)
            .map(|t| {
                let (a, b, c) = (self.local(t[0]), self.local(t[1]), self.local(t[2]));
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::Prism;
    use approx::assert_relative_eq;

    fn unit_box() -> Mesh {
        let prism = Prism::cuboid(Point3::origin(), 1.0, 1.0, 1.0).unwrap();
        Mesh::from_polygons(&prism.boundary().unwrap()).unwrap()
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
        assert!(mesh.bounds().is_none());
    }

    #[test]
    fn test_box_mesh_is_closed() {
        let mesh = unit_box();
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.validate().is_ok());
        assert!(mesh.is_closed());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_open_mesh_detected() {
        let mut mesh = unit_box();
        mesh.indices.truncate(mesh.indices.len() - 3);
        assert!(!mesh.is_closed());
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = unit_box();
        let b = unit_box();
        let before = a.vertex_count() as u32;
        a.merge(&b);
        assert_eq!(a.triangle_count(), 24);
        assert_eq!(a.indices[36], b.indices[0] + before);
    }

    #[test]
    fn test_georeferenced_positions_keep_precision() {
        // f32 spacing at 2e5 is about 0.016
        let prism = Prism::cuboid(Point3::new(200_000.0, 150_000.0, 50.0), 0.01, 0.01, 0.01).unwrap();
        let mesh = Mesh::from_polygons(&prism.boundary().unwrap()).unwrap();
        assert_eq!(mesh.origin, [200_000.0, 150_000.0, 50.0]);
        let bounds = mesh.bounds().unwrap();
        assert_relative_eq!(bounds.max.x - bounds.min.x, 0.01, epsilon = 1e-6);
        assert_relative_eq!(mesh.signed_volume(), 1e-6, epsilon = 1e-9);
        assert!(mesh.is_closed());
    }

    #[test]
    fn test_merge_rebases_origin() {
        let near = unit_box();
        let far = Mesh::from_polygons(
            &Prism::cuboid(Point3::new(10.0, 0.0, 0.0), 1.0, 1.0, 1.0)
                .unwrap()
                .boundary()
                .unwrap(),
        )
        .unwrap();
        let mut merged = Mesh::new();
        merged.merge(&near);
        merged.merge(&far);
        let bounds = merged.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, 0.0);
        assert_relative_eq!(bounds.max.x, 11.0, epsilon = 1e-6);
        assert_relative_eq!(merged.signed_volume(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut mesh = unit_box();
        mesh.indices[0] = 10_000;
        assert!(matches!(mesh.validate(), Err(Error::Export(_))));
    }
}
