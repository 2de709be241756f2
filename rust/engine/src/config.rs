// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration loaded from environment variables.

use crate::error::{EngineError, Result};
use bimq_geometry::{Deadline, KernelOptions, TessellationOptions};
use std::str::FromStr;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Smallest intersection volume (m³) reported as a clash.
    pub clash_volume_tolerance: f64,
    /// Smallest footprint overlap area (m²) reported as a plan clash.
    pub plan_area_tolerance: f64,
    /// Vertical slack (m) when matching elements to storeys and to each other.
    pub plan_z_tolerance: f64,
    /// Default chord deviation (m) for exported meshes.
    pub tessellation_tolerance: f64,
    /// Chord deviation (m) when exact kernels discretise curved faces.
    pub kernel_chord_tolerance: f64,
    /// Refinement attempts before tessellation gives up.
    pub tessellation_max_refinements: u32,
    /// Segment cap for a full circle.
    pub tessellation_max_segments: u32,
    /// Default deadline for one engine call, in seconds.
    pub geometry_timeout_secs: u64,
    /// Number of worker threads for pairwise evaluation.
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clash_volume_tolerance: 1e-6,
            plan_area_tolerance: 1e-6,
            plan_z_tolerance: 0.20,
            tessellation_tolerance: 0.01,
            kernel_chord_tolerance: 0.001,
            tessellation_max_refinements: 12,
            tessellation_max_segments: 4096,
            geometry_timeout_secs: 300,
            worker_threads: num_cpus::get(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            clash_volume_tolerance: env_or("CLASH_VOLUME_TOLERANCE", d.clash_volume_tolerance),
            plan_area_tolerance: env_or("PLAN_AREA_TOLERANCE", d.plan_area_tolerance),
            plan_z_tolerance: env_or("PLAN_Z_TOLERANCE", d.plan_z_tolerance),
            tessellation_tolerance: env_or("TESSELLATION_TOLERANCE", d.tessellation_tolerance),
            kernel_chord_tolerance: env_or("KERNEL_CHORD_TOLERANCE", d.kernel_chord_tolerance),
            tessellation_max_refinements: env_or(
                "TESSELLATION_MAX_REFINEMENTS",
                d.tessellation_max_refinements,
            ),
            tessellation_max_segments: env_or(
                "TESSELLATION_MAX_SEGMENTS",
                d.tessellation_max_segments,
            ),
            geometry_timeout_secs: env_or("GEOMETRY_TIMEOUT_SECS", d.geometry_timeout_secs),
            worker_threads: env_or("WORKER_THREADS", d.worker_threads),
        }
    }

    /// Reject non-positive tolerances and limits.
    pub fn validate(&self) -> Result<()> {
        let tolerances = [
            ("clash_volume_tolerance", self.clash_volume_tolerance),
            ("plan_area_tolerance", self.plan_area_tolerance),
            ("tessellation_tolerance", self.tessellation_tolerance),
            ("kernel_chord_tolerance", self.kernel_chord_tolerance),
        ];
        for (name, value) in tolerances {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidArgument(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.plan_z_tolerance.is_finite() && self.plan_z_tolerance >= 0.0) {
            return Err(EngineError::InvalidArgument(format!(
                "plan_z_tolerance must not be negative, got {}",
                self.plan_z_tolerance
            )));
        }
        if self.tessellation_max_refinements == 0
            || self.tessellation_max_segments < 8
            || self.geometry_timeout_secs == 0
            || self.worker_threads == 0
        {
            return Err(EngineError::InvalidArgument(
                "refinements, segments, timeout and worker threads must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn kernel_options(&self, keep_geometry: bool) -> KernelOptions {
        KernelOptions {
            chord_tolerance: self.kernel_chord_tolerance,
            keep_geometry,
            ..KernelOptions::default()
        }
    }

    pub fn tessellation_options(&self) -> TessellationOptions {
        TessellationOptions {
            max_refinements: self.tessellation_max_refinements,
            max_segments: self.tessellation_max_segments,
        }
    }

    /// Fresh deadline for one call using the configured timeout.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_secs(self.geometry_timeout_secs))
    }
}
