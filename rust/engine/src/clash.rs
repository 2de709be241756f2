// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 3D clash detection
//!
//! Broad phase: R-tree over realized solid bounds, each unordered pair once with the
//! smaller id first. Narrow phase: exact solid intersection, evaluated in
//! parallel; results are ordered after all pairs finish.

use crate::context::ScanContext;
use crate::element::{Element, ElementId};
use crate::error::{EngineError, Result};
use crate::index::{envelope3, BoxIndex3};
use crate::report::{assemble, PairOutcome, ScanEntry, ScanReport};
use bimq_geometry::{intersect_solids, Kernel, KernelOptions, Mesh, Solid};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which elements take part in a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClashFilter {
    #[default]
    All,
    /// Only elements of these types, against each other
    Types(Vec<String>),
    /// Pairs with one element from each side
    Between { a: Vec<String>, b: Vec<String> },
}

fn type_in(element: &Element, types: &[String]) -> bool {
    types.iter().any(|t| element.is_type(t))
}

impl ClashFilter {
    /// Whether an element may appear in any pair
    pub fn admits(&self, element: &Element) -> bool {
        match self {
            ClashFilter::All => true,
            ClashFilter::Types(types) => type_in(element, types),
            ClashFilter::Between { a, b } => type_in(element, a) || type_in(element, b),
        }
    }

    /// Whether the pair qualifies, in either order
    pub fn admits_pair(&self, x: &Element, y: &Element) -> bool {
        match self {
            ClashFilter::All => true,
            ClashFilter::Types(types) => type_in(x, types) && type_in(y, types),
            ClashFilter::Between { a, b } => {
                (type_in(x, a) && type_in(y, b)) || (type_in(x, b) && type_in(y, a))
            }
        }
    }
}

/// Overlap between two elements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClashResult {
    pub element_a: ElementId,
    pub element_b: ElementId,
    /// Intersection volume (m³), never negative
    pub volume: f64,
    pub kernel: Kernel,
    /// Intersection boundary, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Mesh>,
}

pub type ClashEntry = ScanEntry<ClashResult>;
pub type ClashReport = ScanReport<ClashResult>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClashOptions {
    /// Volumes at or below this are not reported by scans
    pub volume_tolerance: f64,
    pub kernel: KernelOptions,
}

/// Exact intersection of two elements
///
/// Disjoint solid bounds short-circuit to zero volume without running a kernel.
pub fn clash_between(
    ctx: &ScanContext<'_>,
    a: &Element,
    b: &Element,
    options: &ClashOptions,
) -> Result<ClashResult> {
    ctx.deadline.check()?;
    let solid_a = ctx.solid(a)?;
    let solid_b = ctx.solid(b)?;
    clash_solids(ctx, a, &solid_a, b, &solid_b, options)
}

fn clash_solids(
    ctx: &ScanContext<'_>,
    a: &Element,
    solid_a: &Solid,
    b: &Element,
    solid_b: &Solid,
    options: &ClashOptions,
) -> Result<ClashResult> {
    let empty = |kernel| ClashResult {
        element_a: a.id.clone(),
        element_b: b.id.clone(),
        volume: 0.0,
        kernel,
        geometry: None,
    };
    if !solid_a.bounds().intersects(&solid_b.bounds()) {
        return Ok(empty(Kernel::Disjoint));
    }

    ctx.deadline.check()?;
    let hit = intersect_solids(solid_a, solid_b, &options.kernel, ctx.deadline)?;
    if hit.used_kernel() {
        ctx.counters.record_exact();
    }

    let geometry = if options.kernel.keep_geometry && hit.volume > 0.0 {
        Some(hit.mesh()?)
    } else {
        None
    };

    Ok(ClashResult {
        volume: hit.volume,
        kernel: hit.kernel,
        geometry,
        ..empty(hit.kernel)
    })
}

/// Clash every qualifying pair of the model
///
/// Solids are realized up front and indexed by their own bounds. An element
/// that fails to realize is indexed by its declared bounds instead, so every
/// pair it may take part in surfaces as a failure.
pub fn detect_clashes(
    ctx: &ScanContext<'_>,
    filter: &ClashFilter,
    options: &ClashOptions,
) -> ClashReport {
    let elements: Vec<&Element> = ctx
        .model
        .elements()
        .iter()
        .filter(|e| filter.admits(e))
        .collect();
    let solids: Vec<Result<Arc<Solid>>> = elements.par_iter().map(|e| ctx.solid(e)).collect();

    let index = BoxIndex3::build(elements.iter().zip(&solids).enumerate().map(
        |(slot, (element, solid))| {
            let bounds = solid.as_ref().map_or(element.bounds, |s| s.bounds());
            (slot, envelope3(&bounds))
        },
    ));
    let pairs: Vec<(usize, usize)> = index
        .candidate_pairs()
        .into_iter()
        .filter(|&(i, j)| filter.admits_pair(elements[i], elements[j]))
        .collect();

    tracing::debug!(
        model = %ctx.model.id(),
        elements = elements.len(),
        unresolved = solids.iter().filter(|s| s.is_err()).count(),
        candidate_pairs = pairs.len(),
        "clash broad phase"
    );

    let outcomes: Vec<PairOutcome<ClashResult>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let (a, b) = (elements[i], elements[j]);
            let outcome = ctx
                .deadline
                .check()
                .map_err(EngineError::from)
                .and_then(|()| {
                    let solid_a = solids[i].as_ref().map_err(Clone::clone)?;
                    let solid_b = solids[j].as_ref().map_err(Clone::clone)?;
                    clash_solids(ctx, a, solid_a, b, solid_b, options)
                })
                .map(|hit| (hit.volume > options.volume_tolerance).then_some(hit));
            (a.id.clone(), b.id.clone(), outcome)
        })
        .collect();

    let report = assemble(outcomes, elements.len());
    tracing::info!(
        model = %ctx.model.id(),
        clashes = report.found().count(),
        failures = report.stats.failures,
        truncated = report.truncated,
        "clash scan finished"
    );
    report
}
