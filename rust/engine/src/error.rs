// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types surfaced by the engine.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error kinds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Geometry error ({}): {0}", .0.reason())]
    Geometry(bimq_geometry::Error),

    #[error("Deadline exceeded")]
    Timeout,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// Stable error code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Geometry(_) => "GEOMETRY_ERROR",
            EngineError::Timeout => "TIMEOUT",
            EngineError::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }
}

impl From<bimq_geometry::Error> for EngineError {
    fn from(err: bimq_geometry::Error) -> Self {
        match err {
            bimq_geometry::Error::Timeout => EngineError::Timeout,
            bimq_geometry::Error::InvalidArgument(msg) => EngineError::InvalidArgument(msg),
            other => EngineError::Geometry(other),
        }
    }
}

/// Serialized as `{ "code": ..., "message": ... }` in scan reports.
impl Serialize for EngineError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("EngineError", 2)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_errors_keep_their_reason() {
        let err = EngineError::from(bimq_geometry::Error::NonClosedSolid(3));
        assert_eq!(err.code(), "GEOMETRY_ERROR");
        assert_eq!(
            err.to_string(),
            "Geometry error (non-closed solid): non-closed solid: 3 boundary edges"
        );
    }

    #[test]
    fn test_kernel_timeout_maps_to_timeout() {
        assert_eq!(EngineError::from(bimq_geometry::Error::Timeout), EngineError::Timeout);
        assert!(matches!(
            EngineError::from(bimq_geometry::Error::InvalidArgument("x".into())),
            EngineError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_serializes_code_and_message() {
        let json = serde_json::to_value(EngineError::NotFound("element W1".into())).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Not found: element W1");
    }
}
