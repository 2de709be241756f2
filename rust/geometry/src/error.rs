// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("degenerate solid: {0}")]
    DegenerateSolid(String),

    #[error("non-closed solid: {0} boundary edges")]
    NonClosedSolid(usize),

    #[error("non-manifold solid: {0} edges shared by more than two faces")]
    NonManifoldSolid(usize),

    #[error("element has no shape representation")]
    MissingShape,

    #[error("zero-area projection")]
    ZeroAreaProjection,

    #[error("tessellation did not converge: tolerance {tolerance} after {attempts} refinement attempts")]
    TessellationDidNotConverge { tolerance: f64, attempts: u32 },

    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("invalid WKT: {0}")]
    Wkt(String),

    #[error("scene export failed: {0}")]
    Export(String),
}

impl Error {
    /// Short machine-readable reason, stable across releases.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::DegenerateSolid(_) => "degenerate solid",
            Error::NonClosedSolid(_) => "non-closed solid",
            Error::NonManifoldSolid(_) => "non-manifold solid",
            Error::MissingShape => "absent geometry",
            Error::ZeroAreaProjection => "zero-area projection",
            Error::TessellationDidNotConverge { .. } => "tessellation did not converge",
            Error::Triangulation(_) => "triangulation failed",
            Error::InvalidArgument(_) => "invalid argument",
            Error::Timeout => "timeout",
            Error::Wkt(_) => "invalid wkt",
            Error::Export(_) => "export failed",
        }
    }

    /// Whether this error describes the shape itself rather than the call.
    pub fn is_geometric(&self) -> bool {
        !matches!(self, Error::InvalidArgument(_) | Error::Timeout)
    }
}
