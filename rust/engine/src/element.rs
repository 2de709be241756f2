// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loaded models: elements, storeys and their identifiers
//!
//! A [`Model`] is immutable once built. The loader hands over elements with
//! bounds, type and storey metadata plus an opaque [`ShapeSource`]; the engine
//! never parses files itself. Realized solids and meshes are cached on the
//! model instance, so a reload under the same id starts from empty caches.

use crate::assets::MeshCache;
use crate::error::{EngineError, Result};
use crate::shape::{ShapeSource, SolidCache};
use bimq_geometry::{Aabb, Solid};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Element GUID
    ElementId
);
string_id!(StoreyId);
string_id!(ModelId);

/// Horizontal building level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storey {
    pub id: StoreyId,
    pub name: String,
    /// Floor level (m)
    pub elevation: f64,
    /// Clear height up to the next storey (m)
    pub height: f64,
}

impl Storey {
    pub fn new(id: impl Into<StoreyId>, name: impl Into<String>, elevation: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            elevation,
            height,
        }
    }

    /// Vertical extent `[elevation, elevation + height]`
    pub fn z_range(&self) -> (f64, f64) {
        (self.elevation, self.elevation + self.height)
    }
}

/// One building element
#[derive(Clone)]
pub struct Element {
    pub id: ElementId,
    /// Semantic type tag such as `IfcWall`
    pub element_type: String,
    pub name: Option<String>,
    pub storey: Option<StoreyId>,
    /// Declared model-space bounds. Used for storey selection only; clash
    /// and plan scans index the realized solid's bounds.
    pub bounds: Aabb,
    pub shape: Option<Arc<dyn ShapeSource>>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("element_type", &self.element_type)
            .field("storey", &self.storey)
            .field("bounds", &self.bounds)
            .field("has_shape", &self.shape.is_some())
            .finish()
    }
}

impl Element {
    /// Element without geometry (realizing it fails)
    pub fn new(id: impl Into<ElementId>, element_type: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            name: None,
            storey: None,
            bounds,
            shape: None,
        }
    }

    /// Element whose bounds come from an already-built solid
    pub fn from_solid(id: impl Into<ElementId>, element_type: impl Into<String>, solid: Solid) -> Self {
        let bounds = solid.bounds();
        Self::new(id, element_type, bounds).with_shape(Arc::new(solid))
    }

    pub fn with_shape(mut self, shape: Arc<dyn ShapeSource>) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_storey(mut self, storey: impl Into<StoreyId>) -> Self {
        self.storey = Some(storey.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Case-insensitive type match
    pub fn is_type(&self, element_type: &str) -> bool {
        self.element_type.eq_ignore_ascii_case(element_type)
    }
}

/// Immutable set of elements and storeys
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    elements: Vec<Element>,
    by_id: FxHashMap<ElementId, usize>,
    storeys: Vec<Storey>,
    solids: SolidCache,
    meshes: MeshCache,
}

impl Model {
    pub fn id(&self) -> &ModelId {
        &self.id
    }

    /// All elements, ascending by id
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: &ElementId) -> Result<&Element> {
        self.by_id
            .get(id)
            .map(|&i| &self.elements[i])
            .ok_or_else(|| EngineError::NotFound(format!("element {id} in model {}", self.id)))
    }

    pub fn storeys(&self) -> &[Storey] {
        &self.storeys
    }

    pub fn storey(&self, id: &StoreyId) -> Result<&Storey> {
        self.storeys
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("storey {id} in model {}", self.id)))
    }

    pub fn solids(&self) -> &SolidCache {
        &self.solids
    }

    pub fn meshes(&self) -> &MeshCache {
        &self.meshes
    }

    pub fn elements_of_type<'a>(&'a self, element_type: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements.iter().filter(move |e| e.is_type(element_type))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Collects elements and storeys, then validates them into a [`Model`]
#[derive(Debug)]
pub struct ModelBuilder {
    id: ModelId,
    elements: Vec<Element>,
    storeys: Vec<Storey>,
}

impl ModelBuilder {
    pub fn new(id: impl Into<ModelId>) -> Self {
        Self {
            id: id.into(),
            elements: Vec::new(),
            storeys: Vec::new(),
        }
    }

    pub fn storey(mut self, storey: Storey) -> Self {
        self.storeys.push(storey);
        self
    }

    pub fn element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn elements(mut self, elements: impl IntoIterator<Item = Element>) -> Self {
        self.elements.extend(elements);
        self
    }

    /// Sort by id and reject duplicates, bad bounds and dangling storeys
    pub fn build(self) -> Result<Model> {
        let Self {
            id,
            mut elements,
            mut storeys,
        } = self;

        storeys.sort_by(|a, b| a.elevation.total_cmp(&b.elevation).then_with(|| a.id.cmp(&b.id)));
        for (i, storey) in storeys.iter().enumerate() {
            if storeys[..i].iter().any(|s| s.id == storey.id) {
                return Err(EngineError::InvalidArgument(format!(
                    "duplicate storey id {}",
                    storey.id
                )));
            }
            if !(storey.elevation.is_finite() && storey.height.is_finite() && storey.height >= 0.0) {
                return Err(EngineError::InvalidArgument(format!(
                    "storey {} has an invalid vertical extent",
                    storey.id
                )));
            }
        }

        elements.sort_by(|a, b| a.id.cmp(&b.id));
        for pair in elements.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(EngineError::InvalidArgument(format!(
                    "duplicate element id {}",
                    pair[0].id
                )));
            }
        }

        for element in &elements {
            if !element.bounds.is_valid() {
                return Err(EngineError::InvalidArgument(format!(
                    "element {} has empty bounds",
                    element.id
                )));
            }
            if let Some(storey) = &element.storey {
                if !storeys.iter().any(|s| &s.id == storey) {
                    return Err(EngineError::InvalidArgument(format!(
                        "element {} references unknown storey {storey}",
                        element.id
                    )));
                }
            }
        }

        let by_id = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();

        Ok(Model {
            id,
            elements,
            by_id,
            storeys,
            solids: SolidCache::new(),
            meshes: MeshCache::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimq_geometry::{Point3, Prism};

    fn wall(id: &str, x: f64) -> Element {
        let prism = Prism::cuboid(Point3::new(x, 0.0, 0.0), 1.0, 0.2, 3.0).unwrap();
        Element::from_solid(id, "IfcWall", Solid::from(prism)).with_storey("L0")
    }

    #[test]
    fn test_elements_sorted_by_id() {
        let model = ModelBuilder::new("m")
            .storey(Storey::new("L0", "Ground", 0.0, 3.0))
            .element(wall("c", 0.0))
            .element(wall("a", 2.0))
            .element(wall("b", 4.0))
            .build()
            .unwrap();
        let ids: Vec<&str> = model.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(model.element(&"b".into()).unwrap().bounds.min.x, 4.0);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = ModelBuilder::new("m")
            .storey(Storey::new("L0", "Ground", 0.0, 3.0))
            .element(wall("a", 0.0))
            .element(wall("a", 2.0))
            .build();
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_storey_rejected() {
        let result = ModelBuilder::new("m").element(wall("a", 0.0)).build();
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_lookup_misses_are_not_found() {
        let model = ModelBuilder::new("m").build().unwrap();
        assert!(matches!(model.element(&"x".into()), Err(EngineError::NotFound(_))));
        assert!(matches!(model.storey(&"L9".into()), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_type_filter_ignores_case() {
        let model = ModelBuilder::new("m")
            .storey(Storey::new("L0", "Ground", 0.0, 3.0))
            .element(wall("a", 0.0))
            .build()
            .unwrap();
        assert_eq!(model.elements_of_type("ifcwall").count(), 1);
        assert_eq!(model.elements_of_type("IfcSlab").count(), 0);
    }
}
