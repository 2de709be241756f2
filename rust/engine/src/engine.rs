// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine facade: model registry, caches and the operator surface.
//!
//! Every call names its model explicitly and takes a [`Deadline`]; use
//! [`GeometryEngine::deadline`] for the configured default. Batch scans run
//! on the engine's own rayon pool.

use crate::assets::{export_assets, AssetId, MeshAssetRef};
use crate::clash::{self, ClashFilter, ClashOptions, ClashReport, ClashResult};
use crate::config::EngineConfig;
use crate::context::{KernelCounters, KernelStats, ScanContext};
use crate::element::{ElementId, Model, ModelId, StoreyId};
use crate::error::{EngineError, Result};
use crate::plan::{self, PlanOptions, PlanReport};
use bimq_geometry::{surface_area, volume, Deadline};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Volume and area of one element; `None` where it could not be measured
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementMetrics {
    pub element_id: ElementId,
    pub element_type: String,
    pub volume: Option<f64>,
    pub surface_area: Option<f64>,
}

pub struct GeometryEngine {
    config: EngineConfig,
    models: RwLock<FxHashMap<ModelId, Arc<Model>>>,
    counters: KernelCounters,
    pool: rayon::ThreadPool,
}

impl GeometryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("bimq-geometry-{i}"))
            .build()
            .map_err(|e| EngineError::InvalidArgument(format!("worker pool: {e}")))?;

        tracing::info!(
            worker_threads = config.worker_threads,
            clash_volume_tolerance = config.clash_volume_tolerance,
            plan_area_tolerance = config.plan_area_tolerance,
            geometry_timeout_secs = config.geometry_timeout_secs,
            "Starting geometry engine"
        );

        Ok(Self {
            config,
            models: RwLock::new(FxHashMap::default()),
            counters: KernelCounters::default(),
            pool,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fresh deadline using the configured timeout
    pub fn deadline(&self) -> Deadline {
        self.config.deadline()
    }

    // ------------------------------------------------------------------
    // Model registry
    // ------------------------------------------------------------------

    /// Register a model, replacing any model with the same id
    ///
    /// Caches live on the model instance: calls still running against the
    /// replaced instance keep publishing into its caches, never the new one's.
    pub fn load_model(&self, model: Model) -> Arc<Model> {
        let id = model.id().clone();
        let model = Arc::new(model);
        let previous = self
            .models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::clone(&model));
        tracing::info!(
            model = %id,
            elements = model.len(),
            storeys = model.storeys().len(),
            replaced = previous.is_some(),
            "model loaded"
        );
        model
    }

    pub fn unload_model(&self, id: &ModelId) -> Result<()> {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(format!("model {id}")))?;
        tracing::info!(model = %id, "model unloaded");
        Ok(())
    }

    pub fn model(&self, id: &ModelId) -> Result<Arc<Model>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("model {id}")))
    }

    fn context<'a>(&'a self, model: &'a Model, deadline: &'a Deadline) -> ScanContext<'a> {
        ScanContext {
            model,
            counters: &self.counters,
            deadline,
        }
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub fn volume(&self, model: &ModelId, element: &ElementId, deadline: &Deadline) -> Result<f64> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let solid = ctx.solid(ctx.element(element)?)?;
        Ok(volume(&solid, deadline)?)
    }

    pub fn surface_area(&self, model: &ModelId, element: &ElementId, deadline: &Deadline) -> Result<f64> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let solid = ctx.solid(ctx.element(element)?)?;
        Ok(surface_area(&solid, deadline)?)
    }

    /// Volume and area of every element of a type, ascending by id
    ///
    /// Per-element failures become `None`; an expired deadline fails the call.
    pub fn element_metrics(
        &self,
        model: &ModelId,
        element_type: &str,
        deadline: &Deadline,
    ) -> Result<Vec<ElementMetrics>> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let elements: Vec<_> = model.elements_of_type(element_type).collect();

        self.pool.install(|| {
            elements
                .par_iter()
                .map(|element| {
                    let measured = ctx.solid(element).and_then(|solid| {
                        Ok((volume(&solid, deadline)?, surface_area(&solid, deadline)?))
                    });
                    let (volume, surface_area) = match measured {
                        Ok((v, a)) => (Some(v), Some(a)),
                        Err(EngineError::Timeout) => return Err(EngineError::Timeout),
                        Err(error) => {
                            tracing::warn!(element = %element.id, error = %error, "metrics failed");
                            (None, None)
                        }
                    };
                    Ok(ElementMetrics {
                        element_id: element.id.clone(),
                        element_type: element.element_type.clone(),
                        volume,
                        surface_area,
                    })
                })
                .collect()
        })
    }

    // ------------------------------------------------------------------
    // Clashes
    // ------------------------------------------------------------------

    fn clash_options(&self, include_geometry: bool) -> ClashOptions {
        ClashOptions {
            volume_tolerance: self.config.clash_volume_tolerance,
            kernel: self.config.kernel_options(include_geometry),
        }
    }

    pub fn clash_between(
        &self,
        model: &ModelId,
        a: &ElementId,
        b: &ElementId,
        include_geometry: bool,
        deadline: &Deadline,
    ) -> Result<ClashResult> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let (a, b) = (ctx.element(a)?, ctx.element(b)?);
        clash::clash_between(&ctx, a, b, &self.clash_options(include_geometry))
    }

    pub fn detect_clashes(
        &self,
        model: &ModelId,
        filter: &ClashFilter,
        include_geometry: bool,
        deadline: &Deadline,
    ) -> Result<ClashReport> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let options = self.clash_options(include_geometry);
        Ok(self.pool.install(|| clash::detect_clashes(&ctx, filter, &options)))
    }

    // ------------------------------------------------------------------
    // Plan overlap
    // ------------------------------------------------------------------

    fn plan_options(&self, return_wkt: bool) -> PlanOptions {
        PlanOptions {
            area_tolerance: self.config.plan_area_tolerance,
            z_tolerance: self.config.plan_z_tolerance,
            chord_tolerance: self.config.kernel_chord_tolerance,
            return_wkt,
        }
    }

    pub fn detect_plan_clashes(
        &self,
        model: &ModelId,
        storey: &StoreyId,
        filter: &ClashFilter,
        return_wkt: bool,
        deadline: &Deadline,
    ) -> Result<PlanReport> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let options = self.plan_options(return_wkt);
        self.pool
            .install(|| plan::detect_plan_clashes(&ctx, storey, filter, &options))
    }

    pub fn overlaps_2d_on_storey(
        &self,
        model: &ModelId,
        storey: &StoreyId,
        elements: &[ElementId],
        return_wkt: bool,
        deadline: &Deadline,
    ) -> Result<PlanReport> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let options = self.plan_options(return_wkt);
        self.pool
            .install(|| plan::overlaps_2d_on_storey(&ctx, storey, elements, &options))
    }

    // ------------------------------------------------------------------
    // Tessellation & export
    // ------------------------------------------------------------------

    /// Tessellate (or fetch) an element's mesh; `None` uses the configured tolerance
    pub fn get_element_geometry(
        &self,
        model: &ModelId,
        element: &ElementId,
        tolerance: Option<f64>,
        deadline: &Deadline,
    ) -> Result<MeshAssetRef> {
        let model = self.model(model)?;
        let ctx = self.context(&model, deadline);
        let element = ctx.element(element)?;
        let tolerance = tolerance.unwrap_or(self.config.tessellation_tolerance);
        let asset = model.meshes().get_or_tessellate(
            &ctx,
            element,
            tolerance,
            &self.config.tessellation_options(),
        )?;
        Ok(MeshAssetRef::from(asset.as_ref()))
    }

    /// GLB scene of previously returned assets; ids of unloaded or replaced
    /// models are `NotFound` unless re-requested from the current instance
    pub fn export_scene(&self, assets: &[AssetId]) -> Result<Vec<u8>> {
        let not_found = |id: &AssetId| EngineError::NotFound(format!("mesh asset {id}"));
        let resolved = assets
            .iter()
            .map(|id| {
                let model = id.model().ok_or_else(|| not_found(id))?;
                let model = self.model(&model).map_err(|_| not_found(id))?;
                model.meshes().get(id).ok_or_else(|| not_found(id))
            })
            .collect::<Result<Vec<_>>>()?;
        export_assets(&resolved)
    }

    // ------------------------------------------------------------------
    // Instrumentation
    // ------------------------------------------------------------------

    pub fn kernel_stats(&self) -> KernelStats {
        self.counters.snapshot()
    }

    pub fn reset_kernel_stats(&self) {
        self.counters.reset();
    }
}
