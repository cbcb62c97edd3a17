//! Error types for `bygg-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unsupported geometry type: {0}")]
  UnsupportedGeometry(String),

  #[error("invalid geometry: {0}")]
  InvalidGeometry(String),

  #[error("confidence {0} is outside [0, 1]")]
  ConfidenceOutOfRange(f64),

  #[error("{0} evidence carries no usable year")]
  IncompleteEvidence(String),

  #[error("unknown evidence type: {0:?}")]
  UnknownEvidenceType(String),

  #[error("unknown evidence method: {0:?}")]
  UnknownEvidenceMethod(String),

  #[error("unknown estimate method: {0:?}")]
  UnknownEstimateMethod(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
