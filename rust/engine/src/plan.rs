// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storey plan overlap
//!
//! Elements belonging to a storey are projected onto XY and intersected with
//! 2D booleans. This is the cheap first pass before exact 3D clashes.
//!
//! An element belongs to a storey when it is assigned to it or when its Z
//! extent meets the storey's extent widened by `z_tolerance`. Pairs whose Z
//! extents are further apart than `z_tolerance` are skipped, so a ceiling
//! never "overlaps" the floor slab under it.
//!
//! Membership reads the declared element bounds; the plan index and the
//! per-pair Z cull read the realized solid.

use crate::clash::ClashFilter;
use crate::context::ScanContext;
use crate::element::{Element, ElementId, Storey, StoreyId};
use crate::error::Result;
use crate::index::{envelope2, RectIndex2};
use crate::report::{assemble, PairOutcome, ScanEntry, ScanReport};
use bimq_geometry::bool2d::intersect_footprints;
use bimq_geometry::{project_footprint, Aabb, Footprint};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanOptions {
    /// Overlaps at or below this area (m²) are not reported
    pub area_tolerance: f64,
    /// Vertical slack (m) for storey membership and pair culling
    pub z_tolerance: f64,
    pub chord_tolerance: f64,
    /// Attach the overlap region as WKT
    pub return_wkt: bool,
}

/// Footprint overlap between two elements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOverlap {
    pub element_a: ElementId,
    pub element_b: ElementId,
    /// Overlap area (m²)
    pub area: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
}

pub type PlanEntry = ScanEntry<PlanOverlap>;
pub type PlanReport = ScanReport<PlanOverlap>;

pub fn on_storey(element: &Element, storey: &Storey, z_tolerance: f64) -> bool {
    if element.storey.as_ref() == Some(&storey.id) {
        return true;
    }
    let (lo, hi) = storey.z_range();
    let (z_min, z_max) = element.bounds.z_range();
    z_min <= hi + z_tolerance && z_max >= lo - z_tolerance
}

fn z_overlap(a: &Aabb, b: &Aabb, z_tolerance: f64) -> bool {
    let (a_min, a_max) = a.z_range();
    let (b_min, b_max) = b.z_range();
    a_min <= b_max + z_tolerance && b_min <= a_max + z_tolerance
}

/// Overlaps among the given elements on one storey
///
/// Unknown ids fail the call; known elements off the storey are ignored.
pub fn overlaps_2d_on_storey(
    ctx: &ScanContext<'_>,
    storey: &StoreyId,
    element_ids: &[ElementId],
    options: &PlanOptions,
) -> Result<PlanReport> {
    let storey = ctx.model.storey(storey)?;
    let mut elements = element_ids
        .iter()
        .map(|id| ctx.element(id))
        .collect::<Result<Vec<&Element>>>()?;
    elements.sort_by(|a, b| a.id.cmp(&b.id));
    elements.dedup_by(|a, b| a.id == b.id);
    elements.retain(|e| on_storey(e, storey, options.z_tolerance));
    Ok(scan_storey(ctx, storey, elements, &ClashFilter::All, options))
}

/// Overlaps among all qualifying elements of a storey
pub fn detect_plan_clashes(
    ctx: &ScanContext<'_>,
    storey: &StoreyId,
    filter: &ClashFilter,
    options: &PlanOptions,
) -> Result<PlanReport> {
    let storey = ctx.model.storey(storey)?;
    let elements = ctx
        .model
        .elements()
        .iter()
        .filter(|e| filter.admits(e) && on_storey(e, storey, options.z_tolerance))
        .collect();
    Ok(scan_storey(ctx, storey, elements, filter, options))
}

/// Footprint plus the realized solid's bounds
fn footprint_of(
    ctx: &ScanContext<'_>,
    element: &Element,
    options: &PlanOptions,
) -> Result<(Footprint, Aabb)> {
    let solid = ctx.solid(element)?;
    let footprint = project_footprint(&solid, options.chord_tolerance, ctx.deadline)?;
    Ok((footprint, solid.bounds()))
}

fn overlap_pair(
    ctx: &ScanContext<'_>,
    a: &Result<(Footprint, Aabb)>,
    b: &Result<(Footprint, Aabb)>,
    options: &PlanOptions,
) -> Result<Option<(f64, Option<String>)>> {
    let (a, _) = a.as_ref().map_err(Clone::clone)?;
    let (b, _) = b.as_ref().map_err(Clone::clone)?;
    ctx.deadline.check()?;

    let overlap = intersect_footprints(a, b);
    ctx.counters.record_footprint();
    let area = overlap.area();
    if area <= options.area_tolerance {
        return Ok(None);
    }
    let wkt = options.return_wkt.then(|| overlap.to_wkt());
    Ok(Some((area, wkt)))
}

/// `elements` must be sorted by id
fn scan_storey(
    ctx: &ScanContext<'_>,
    storey: &Storey,
    elements: Vec<&Element>,
    filter: &ClashFilter,
    options: &PlanOptions,
) -> PlanReport {
    let footprints: Vec<Result<(Footprint, Aabb)>> = elements
        .par_iter()
        .map(|e| footprint_of(ctx, e, options))
        .collect();

    // Failed projections fall back to the element's declared bounds so their
    // pairs still surface as failures
    let extents: Vec<Aabb> = elements
        .iter()
        .zip(&footprints)
        .map(|(element, footprint)| footprint.as_ref().map_or(element.bounds, |(_, b)| *b))
        .collect();
    let index = RectIndex2::build(footprints.iter().zip(&extents).enumerate().map(
        |(slot, (footprint, extent))| {
            let rect = footprint
                .as_ref()
                .ok()
                .and_then(|(f, _)| f.bounds())
                .unwrap_or_else(|| extent.xy());
            (slot, envelope2(&rect))
        },
    ));
    let pairs: Vec<(usize, usize)> = index
        .candidate_pairs()
        .into_iter()
        .filter(|&(i, j)| {
            filter.admits_pair(elements[i], elements[j])
                && z_overlap(&extents[i], &extents[j], options.z_tolerance)
        })
        .collect();

    tracing::debug!(
        model = %ctx.model.id(),
        storey = %storey.id,
        elements = elements.len(),
        candidate_pairs = pairs.len(),
        "plan broad phase"
    );

    let outcomes: Vec<PairOutcome<PlanOverlap>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let (a, b) = (elements[i], elements[j]);
            let outcome = overlap_pair(ctx, &footprints[i], &footprints[j], options).map(|hit| {
                hit.map(|(area, wkt)| PlanOverlap {
                    element_a: a.id.clone(),
                    element_b: b.id.clone(),
                    area,
                    wkt,
                })
            });
            (a.id.clone(), b.id.clone(), outcome)
        })
        .collect();

    let report = assemble(outcomes, elements.len());
    tracing::info!(
        model = %ctx.model.id(),
        storey = %storey.id,
        overlaps = report.found().count(),
        failures = report.stats.failures,
        truncated = report.truncated,
        "plan scan finished"
    );
    report
}
