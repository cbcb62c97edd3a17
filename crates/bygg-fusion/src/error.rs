//! Error type for `bygg-fusion`.
//!
//! Only stage-level failures live here. Problems with a single record are
//! counted in the stage summary and logged, never returned.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("cannot read {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("corrupt input {}: {source}", path.display())]
  Input {
    path:   PathBuf,
    #[source]
    source: bygg_geojson::Error,
  },

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
