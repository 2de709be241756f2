// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BIMQ Geometry Engine
//!
//! Spatial and geometric operators over loaded building models: exact
//! metrics, broad/narrow-phase clash detection, storey plan overlap and
//! mesh export. The model loader is an external collaborator; it hands the
//! engine [`Element`]s with bounds, storey/type metadata and a
//! [`ShapeSource`] per element.
//!
//! ```no_run
//! use bimq_engine::{ClashFilter, EngineConfig, GeometryEngine, ModelBuilder};
//!
//! # fn main() -> bimq_engine::Result<()> {
//! let engine = GeometryEngine::new(EngineConfig::from_env())?;
//! let model = engine.load_model(ModelBuilder::new("tower").build()?);
//! let report = engine.detect_clashes(model.id(), &ClashFilter::All, false, &engine.deadline())?;
//! println!("{} clashes", report.found().count());
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod clash;
pub mod config;
pub mod context;
pub mod element;
pub mod engine;
pub mod error;
pub mod index;
pub mod plan;
pub mod report;
pub mod shape;

pub use assets::{export_assets, AssetId, MeshAsset, MeshAssetRef, MeshCache};
pub use clash::{ClashEntry, ClashFilter, ClashOptions, ClashReport, ClashResult};
pub use config::EngineConfig;
pub use context::{KernelCounters, KernelStats, ScanContext};
pub use element::{Element, ElementId, Model, ModelBuilder, ModelId, Storey, StoreyId};
pub use engine::{ElementMetrics, GeometryEngine};
pub use error::{EngineError, Result};
pub use index::{BoxIndex3, RectIndex2, SpatialIndex};
pub use plan::{PlanEntry, PlanOptions, PlanOverlap, PlanReport};
pub use report::{ScanEntry, ScanReport, ScanStats};
pub use shape::{FacetedShape, ShapeSource, SolidCache};

pub use bimq_geometry::{self as geometry, Deadline};
