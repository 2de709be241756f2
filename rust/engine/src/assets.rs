// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tessellated mesh assets and scene export
//!
//! Assets are keyed by (model, element, tolerance). The asset id is an
//! injective encoding of that key: `/`, `@` and `%` inside ids are
//! percent-escaped, so distinct keys never share an id. Asking twice for the
//! same geometry returns the same id and the transport layer can cache
//! exported blobs by it. Each [`Model`](crate::element::Model) instance owns
//! its own [`MeshCache`].

use crate::context::ScanContext;
use crate::element::{Element, ElementId, ModelId};
use crate::error::{EngineError, Result};
use bimq_geometry::{export_glb, tessellate, Aabb, Mesh, SceneMesh, TessellationOptions};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Opaque handle to a cached mesh
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

fn escape(out: &mut String, id: &str) {
    for c in id.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '@' => out.push_str("%40"),
            c => out.push(c),
        }
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let decoded = match rest.get(at..at + 3) {
            Some("%25") => '%',
            Some("%2F") => '/',
            Some("%40") => '@',
            _ => {
                out.push('%');
                rest = &rest[at + 1..];
                continue;
            }
        };
        out.push(decoded);
        rest = &rest[at + 3..];
    }
    out.push_str(rest);
    out
}

impl AssetId {
    pub fn for_key(model: &ModelId, element: &ElementId, tolerance: f64) -> Self {
        let mut id = String::with_capacity(model.as_str().len() + element.as_str().len() + 18);
        escape(&mut id, model.as_str());
        id.push('/');
        escape(&mut id, element.as_str());
        id.push_str(&format!("@{:016x}", tolerance.to_bits()));
        Self(id)
    }

    /// Model the asset belongs to, if the id is well formed
    pub fn model(&self) -> Option<ModelId> {
        let (model, _) = self.0.split_once('/')?;
        Some(ModelId(unescape(model)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tessellated element
#[derive(Debug)]
pub struct MeshAsset {
    pub asset_id: AssetId,
    pub model: ModelId,
    pub element_id: ElementId,
    pub tolerance: f64,
    pub mesh: Mesh,
}

/// What callers get back instead of the mesh itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshAssetRef {
    pub asset_id: AssetId,
    pub element_id: ElementId,
    pub tolerance: f64,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub bounds: Option<Aabb>,
}

impl From<&MeshAsset> for MeshAssetRef {
    fn from(asset: &MeshAsset) -> Self {
        Self {
            asset_id: asset.asset_id.clone(),
            element_id: asset.element_id.clone(),
            tolerance: asset.tolerance,
            vertex_count: asset.mesh.vertex_count(),
            triangle_count: asset.mesh.triangle_count(),
            bounds: asset.mesh.bounds(),
        }
    }
}

/// Read-mostly mesh cache; first published entry wins
#[derive(Default)]
pub struct MeshCache {
    assets: RwLock<FxHashMap<AssetId, Arc<MeshAsset>>>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &AssetId) -> Option<Arc<MeshAsset>> {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Cached mesh for `element` at `tolerance`, tessellating on a miss
    pub fn get_or_tessellate(
        &self,
        ctx: &ScanContext<'_>,
        element: &Element,
        tolerance: f64,
        options: &TessellationOptions,
    ) -> Result<Arc<MeshAsset>> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(EngineError::InvalidArgument(format!(
                "tessellation tolerance must be positive, got {tolerance}"
            )));
        }
        let asset_id = AssetId::for_key(ctx.model.id(), &element.id, tolerance);
        if let Some(asset) = self.get(&asset_id) {
            return Ok(asset);
        }

        let solid = ctx.solid(element)?;
        let mesh = tessellate(&solid, tolerance, options, ctx.deadline)?;
        tracing::debug!(
            element = %element.id,
            tolerance,
            triangles = mesh.triangle_count(),
            "tessellated element"
        );

        let asset = Arc::new(MeshAsset {
            asset_id: asset_id.clone(),
            model: ctx.model.id().clone(),
            element_id: element.id.clone(),
            tolerance,
            mesh,
        });
        let mut assets = self.assets.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(assets.entry(asset_id).or_insert(asset)))
    }

    /// Binary glTF scene of this cache's assets, in the order given
    pub fn export_scene(&self, ids: &[AssetId]) -> Result<Vec<u8>> {
        let assets = ids
            .iter()
            .map(|id| {
                self.get(id)
                    .ok_or_else(|| EngineError::NotFound(format!("mesh asset {id}")))
            })
            .collect::<Result<Vec<_>>>()?;
        export_assets(&assets)
    }

    pub fn len(&self) -> usize {
        self.assets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binary glTF scene with one node per asset, in the order given
pub fn export_assets(assets: &[Arc<MeshAsset>]) -> Result<Vec<u8>> {
    let scene: Vec<SceneMesh<'_>> = assets
        .iter()
        .map(|a| SceneMesh {
            element_id: a.element_id.as_str(),
            asset_id: a.asset_id.as_str(),
            tolerance: a.tolerance,
            mesh: &a.mesh,
        })
        .collect();
    Ok(export_glb(&scene)?)
}

impl fmt::Debug for MeshCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::KernelCounters;
    use crate::element::{Model, ModelBuilder};
    use bimq_geometry::gltf::read_glb_json;
    use bimq_geometry::{Cylinder, Deadline, Isometry3, Solid};

    fn model() -> Model {
        let column = Cylinder::new(Isometry3::translation(1.0, 1.0, 0.0), 0.2, 3.0).unwrap();
        ModelBuilder::new("m")
            .element(Element::from_solid("C1", "IfcColumn", Solid::from(column)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_same_key_same_asset() {
        let m = model();
        let (counters, deadline) = (KernelCounters::default(), Deadline::none());
        let ctx = ScanContext { model: &m, counters: &counters, deadline: &deadline };
        let cache = MeshCache::new();
        let column = m.element(&"C1".into()).unwrap();
        let opts = TessellationOptions::default();

        let a = cache.get_or_tessellate(&ctx, column, 0.01, &opts).unwrap();
        let b = cache.get_or_tessellate(&ctx, column, 0.01, &opts).unwrap();
        let fine = cache.get_or_tessellate(&ctx, column, 0.001, &opts).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.asset_id, fine.asset_id);
        assert!(fine.mesh.triangle_count() > a.mesh.triangle_count());
        assert_eq!(cache.len(), 2);

        let reference = MeshAssetRef::from(a.as_ref());
        assert_eq!(reference.triangle_count, a.mesh.triangle_count());
        assert!(reference.bounds.is_some());
    }

    #[test]
    fn test_export_resolves_cached_assets() {
        let m = model();
        let (counters, deadline) = (KernelCounters::default(), Deadline::none());
        let ctx = ScanContext { model: &m, counters: &counters, deadline: &deadline };
        let cache = MeshCache::new();
        let column = m.element(&"C1".into()).unwrap();
        let asset = cache
            .get_or_tessellate(&ctx, column, 0.01, &TessellationOptions::default())
            .unwrap();

        let glb = cache.export_scene(&[asset.asset_id.clone()]).unwrap();
        let doc = read_glb_json(&glb).unwrap();
        assert_eq!(doc["nodes"][1]["extras"]["elementId"], "C1");
        assert_eq!(doc["nodes"][1]["extras"]["assetId"], asset.asset_id.as_str());

        let missing = cache.export_scene(&[AssetId("m/x@0".into())]);
        assert!(matches!(missing, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn test_ids_with_separators_stay_distinct() {
        let plain = AssetId::for_key(&"a/b".into(), &"c".into(), 0.01);
        let nested = AssetId::for_key(&"a".into(), &"b/c".into(), 0.01);
        assert_ne!(plain, nested);
        assert_eq!(plain.model(), Some(ModelId::from("a/b")));
        assert_eq!(nested.model(), Some(ModelId::from("a")));

        let at = AssetId::for_key(&"m".into(), &"x@1".into(), 0.01);
        let escaped = AssetId::for_key(&"m".into(), &"x%401".into(), 0.01);
        assert_ne!(at, escaped);
        assert_eq!(escaped.model(), Some(ModelId::from("m")));

        let percent = AssetId::for_key(&"50%/2F".into(), &"e".into(), 0.01);
        assert_eq!(percent.model(), Some(ModelId::from("50%/2F")));
    }

    #[test]
    fn test_bad_tolerance_rejected() {
        let m = model();
        let (counters, deadline) = (KernelCounters::default(), Deadline::none());
        let ctx = ScanContext { model: &m, counters: &counters, deadline: &deadline };
        let cache = MeshCache::new();
        let column = m.element(&"C1".into()).unwrap();
        let opts = TessellationOptions::default();
        assert!(matches!(
            cache.get_or_tessellate(&ctx, column, 0.0, &opts),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(cache.is_empty());
    }
}
