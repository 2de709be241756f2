// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-call context shared by the scan engines.

use crate::element::{Element, ElementId, Model};
use crate::error::Result;
use bimq_geometry::{Deadline, Solid};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts of exact kernel invocations
#[derive(Debug, Default)]
pub struct KernelCounters {
    exact_intersections: AtomicUsize,
    footprint_intersections: AtomicUsize,
}

/// Point-in-time copy of [`KernelCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KernelStats {
    pub exact_intersections: usize,
    pub footprint_intersections: usize,
}

impl KernelCounters {
    pub fn record_exact(&self) {
        self.exact_intersections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_footprint(&self) {
        self.footprint_intersections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> KernelStats {
        KernelStats {
            exact_intersections: self.exact_intersections.load(Ordering::Relaxed),
            footprint_intersections: self.footprint_intersections.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.exact_intersections.store(0, Ordering::Relaxed);
        self.footprint_intersections.store(0, Ordering::Relaxed);
    }
}

/// Borrowed state for one engine call
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub model: &'a Model,
    pub counters: &'a KernelCounters,
    pub deadline: &'a Deadline,
}

impl<'a> ScanContext<'a> {
    pub fn element(&self, id: &ElementId) -> Result<&'a Element> {
        self.model.element(id)
    }

    pub fn solid(&self, element: &Element) -> Result<Arc<Solid>> {
        self.model.solids().get_or_realize(element)
    }
}
