//! Reader for normalized building feature collections.
//!
//! External normalizers turn each source's raw records into GeoJSON features
//! that share one canonical property set:
//!
//! | key      | meaning                                        |
//! |----------|------------------------------------------------|
//! | `_src`   | source id                                      |
//! | `_src_id`| source-local record id                         |
//! | `sd`/`ed`| start / end date, when the source knows them   |
//! | `ev`     | evidence strength hint: `high`/`medium`/`low`  |
//! | `bt`     | building type                                  |
//! | `nm`     | name                                           |
//! | `mlc`    | machine-detection confidence                   |
//!
//! This crate maps those features onto [`bygg_core`] types. Pure synchronous;
//! no database dependencies.
//!
//! ```no_run
//! let text = std::fs::read_to_string("sefrak.geojson").unwrap();
//! for feature in bygg_geojson::parse_collection(&text).unwrap() {
//!   match feature {
//!     Ok(f) => println!("{} {:?}", f.building_id(), f.start_year),
//!     Err(e) => eprintln!("skipped: {e}"),
//!   }
//! }
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};

use bygg_core::building::{Footprint, NewBuilding, building_id};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ─── Public types
// ─────────────────────────────────────────────────────────────

/// The `ev` hint a normalizer attaches to dated records.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EvidenceStrength {
  High,
  Medium,
  Low,
}

/// One feature in canonical shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeature {
  pub source_id:          String,
  pub source_local_id:    String,
  pub footprint:          Footprint,
  pub start_year:         Option<i32>,
  pub end_year:           Option<i32>,
  pub strength:           Option<EvidenceStrength>,
  pub building_type:      Option<String>,
  pub name:               Option<String>,
  /// `mlc`, when the source is a machine detector.
  pub machine_confidence: Option<f64>,
  /// The complete property object, source-specific extras included.
  pub properties:         serde_json::Map<String, serde_json::Value>,
}

impl NormalizedFeature {
  pub fn building_id(&self) -> String {
    building_id(&self.source_id, &self.source_local_id)
  }

  /// The building row this feature upserts.
  pub fn to_new_building(&self) -> NewBuilding {
    let mut nb = NewBuilding::new(
      &self.source_id,
      &self.source_local_id,
      self.footprint.clone(),
    );
    nb.building_type = self.building_type.clone();
    nb.name = self.name.clone();
    nb
  }
}

// ─── Public API
// ───────────────────────────────────────────────────────────────

/// Parse a feature collection (or a single feature).
///
/// A document that is not valid GeoJSON yields `Err`. Otherwise each feature
/// is parsed independently: a malformed feature yields `Err(…)` in its
/// position without aborting the rest.
pub fn parse_collection(input: &str) -> Result<Vec<Result<NormalizedFeature>>> {
  let features = match input.parse::<geojson::GeoJson>()? {
    geojson::GeoJson::FeatureCollection(fc) => fc.features,
    geojson::GeoJson::Feature(f) => vec![f],
    geojson::GeoJson::Geometry(_) => return Err(Error::NotFeatures),
  };
  Ok(features.into_iter().map(parse::parse_feature).collect())
}

/// Parse one GeoJSON feature into canonical shape.
pub fn parse_feature(feature: geojson::Feature) -> Result<NormalizedFeature> {
  parse::parse_feature(feature)
}
