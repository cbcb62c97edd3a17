//! Error types for the bygg-geojson codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("document is a bare geometry, expected features")]
  NotFeatures,

  #[error("feature has no geometry")]
  MissingGeometry,

  #[error("feature is missing required property {0:?}")]
  MissingProperty(&'static str),

  #[error("geometry error: {0}")]
  Geometry(#[from] bygg_core::Error),

  #[error("GeoJSON error: {0}")]
  GeoJson(#[from] geojson::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
