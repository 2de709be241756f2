// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shape access: turning element handles into validated solids.

use crate::element::{Element, ElementId};
use crate::error::{EngineError, Result};
use bimq_geometry::{Point3, Polyhedron, Solid, VertexWelder};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Welding grid for loader-supplied vertex soups (m)
const WELD_TOLERANCE: f64 = 1e-6;

/// Opaque per-element geometry handle supplied by the model loader
pub trait ShapeSource: Send + Sync + fmt::Debug {
    /// Build the element's solid; fails if it is absent or not a closed volume
    fn realize(&self) -> bimq_geometry::Result<Solid>;
}

impl ShapeSource for Solid {
    fn realize(&self) -> bimq_geometry::Result<Solid> {
        Ok(self.clone())
    }
}

/// Vertex/face soup as produced by mesh-based loaders
#[derive(Debug, Clone)]
pub struct FacetedShape {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<Vec<u32>>,
}

impl FacetedShape {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<Vec<u32>>) -> Self {
        Self { vertices, faces }
    }

    /// From flat `[x, y, z, ...]` positions and triangle indices
    pub fn from_triangles(positions: &[f64], indices: &[u32]) -> Self {
        let vertices = positions
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect();
        let faces = indices.chunks_exact(3).map(|t| t.to_vec()).collect();
        Self { vertices, faces }
    }
}

impl ShapeSource for FacetedShape {
    fn realize(&self) -> bimq_geometry::Result<Solid> {
        let mut welder = VertexWelder::new(WELD_TOLERANCE);
        let mut faces = Vec::with_capacity(self.faces.len());
        for face in &self.faces {
            let mut welded = Vec::with_capacity(face.len());
            for &idx in face {
                let p = self.vertices.get(idx as usize).ok_or_else(|| {
                    bimq_geometry::Error::DegenerateSolid(format!(
                        "face references vertex {idx} of {}",
                        self.vertices.len()
                    ))
                })?;
                welded.push(welder.insert(*p));
            }
            faces.push(welded);
        }
        Ok(Solid::from(Polyhedron::new(welder.into_vertices(), faces)?))
    }
}

/// Loader bounds may be this far inside the realized solid before it is logged (m)
const BOUNDS_SLACK: f64 = 1e-6;

/// Realized solids of one model instance, kept for that instance's lifetime
///
/// Realization runs outside the lock; when two callers race on the same
/// element the first published entry wins. Failures are not cached.
#[derive(Default)]
pub struct SolidCache {
    entries: RwLock<FxHashMap<ElementId, Arc<Solid>>>,
}

impl SolidCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_realize(&self, element: &Element) -> Result<Arc<Solid>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(solid) = entries.get(&element.id) {
                return Ok(Arc::clone(solid));
            }
        }

        let shape = element
            .shape
            .as_ref()
            .ok_or(EngineError::Geometry(bimq_geometry::Error::MissingShape))?;
        let solid = Arc::new(shape.realize()?);
        let bounds = solid.bounds();
        if !element.bounds.expanded_by(BOUNDS_SLACK).contains(&bounds) {
            tracing::warn!(
                element = %element.id,
                declared = ?element.bounds,
                realized = ?bounds,
                "declared bounds do not contain the solid"
            );
        }
        tracing::debug!(element = %element.id, "realized solid");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(element.id.clone()).or_insert(solid)))
    }

    pub fn get(&self, id: &ElementId) -> Option<Arc<Solid>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SolidCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolidCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimq_geometry::{Aabb, Deadline};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Unit cube as 12 triangles with per-triangle (unshared) vertices
    fn cube_soup() -> FacetedShape {
        let c = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        let tris: [[usize; 3]; 12] = [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [1, 2, 6],
            [1, 6, 5],
            [2, 3, 7],
            [2, 7, 6],
            [3, 0, 4],
            [3, 4, 7],
        ];
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for tri in tris {
            for corner in tri {
                indices.push((positions.len() / 3) as u32);
                positions.extend_from_slice(&c[corner]);
            }
        }
        FacetedShape::from_triangles(&positions, &indices)
    }

    #[derive(Debug)]
    struct CountingShape {
        inner: Solid,
        calls: AtomicUsize,
    }

    impl ShapeSource for CountingShape {
        fn realize(&self) -> bimq_geometry::Result<Solid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.clone())
        }
    }

    #[test]
    fn test_faceted_soup_is_welded() {
        let solid = cube_soup().realize().unwrap();
        let volume = bimq_geometry::volume(&solid, &Deadline::none()).unwrap();
        assert!((volume - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_soup_is_rejected() {
        let mut soup = cube_soup();
        soup.faces.truncate(10);
        assert!(matches!(
            soup.realize(),
            Err(bimq_geometry::Error::NonClosedSolid(_))
        ));
    }

    #[test]
    fn test_cache_realizes_once() {
        let shape = Arc::new(CountingShape {
            inner: cube_soup().realize().unwrap(),
            calls: AtomicUsize::new(0),
        });
        let element = Element::new("e1", "IfcColumn", Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)))
            .with_shape(shape.clone());
        let cache = SolidCache::new();
        let a = cache.get_or_realize(&element).unwrap();
        let b = cache.get_or_realize(&element).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(shape.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &cache.get(&element.id).unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_shape_not_cached() {
        let element = Element::new("e1", "IfcColumn", Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
        let cache = SolidCache::new();
        let err = cache.get_or_realize(&element).unwrap_err();
        assert_eq!(err, EngineError::Geometry(bimq_geometry::Error::MissingShape));
        assert!(cache.is_empty());
    }
}
