//! Tunables for the fusion stages.
//!
//! Every struct deserializes with defaults for missing keys, so an empty
//! configuration file yields the stock behavior.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FusionConfig {
  pub reference: ReferencePoint,
  pub matcher:   MatcherConfig,
  pub heuristic: HeuristicConfig,
  /// Per-source interpretation, keyed by source id.
  pub sources:   BTreeMap<String, SourceProfile>,
}

impl FusionConfig {
  /// Reject tunables the stages cannot work with.
  pub fn validate(&self) -> Result<()> {
    let ReferencePoint { lat, lon } = self.reference;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
      return Err(invalid(format!("reference ({lat}, {lon}) is not a lon/lat position")));
    }

    let m = &self.matcher;
    unit("matcher.min_overlap", m.min_overlap)?;
    non_negative("matcher.max_distance_m", m.max_distance_m)?;
    positive("matcher.point_buffer_m", m.point_buffer_m)?;

    let h = &self.heuristic;
    for (i, band) in h.bands.iter().enumerate() {
      unit(&format!("heuristic.bands[{i}].confidence"), band.confidence)?;
      if let Some(max_km) = band.max_km {
        positive(&format!("heuristic.bands[{i}].max_km"), max_km)?;
      }
    }
    positive("heuristic.neighbor_radius_m", h.neighbor_radius_m)?;
    unit("heuristic.neighbor_min_confidence", h.neighbor_min_confidence)?;
    unit("heuristic.neighbor_confidence_cap", h.neighbor_confidence_cap)?;
    unit("heuristic.combined_cap", h.combined_cap)?;
    unit("heuristic.min_useful_confidence", h.min_useful_confidence)?;
    unit("heuristic.fallback_confidence", h.fallback_confidence)?;
    if h.neighbor_saturation == 0 {
      return Err(invalid("heuristic.neighbor_saturation must be at least 1".into()));
    }

    for (id, profile) in &self.sources {
      if let Some(c) = profile.confidence {
        unit(&format!("sources.{id}.confidence"), c)?;
      }
      if profile.kind == SourceKind::Map && profile.map_year.is_none() {
        return Err(invalid(format!("sources.{id} is a map but has no map_year")));
      }
    }
    Ok(())
  }
}

fn invalid(message: String) -> Error {
  Error::Config(message)
}

fn unit(key: &str, value: f64) -> Result<()> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(invalid(format!("{key} = {value} is outside [0, 1]")))
  }
}

fn non_negative(key: &str, value: f64) -> Result<()> {
  if value.is_finite() && value >= 0.0 {
    Ok(())
  } else {
    Err(invalid(format!("{key} = {value} must be a non-negative number")))
  }
}

fn positive(key: &str, value: f64) -> Result<()> {
  if value.is_finite() && value > 0.0 {
    Ok(())
  } else {
    Err(invalid(format!("{key} = {value} must be a positive number")))
  }
}

/// Origin of the local metric frame and of the center-distance heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferencePoint {
  pub lat: f64,
  pub lon: f64,
}

impl Default for ReferencePoint {
  fn default() -> Self {
    Self { lat: 63.4305, lon: 10.3951 }
  }
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
  /// Polygon intersection over an R-tree, with the distance fallback.
  #[default]
  Overlap,
  /// Nearest centroid only. Overlap ratios are reported as `0.0`.
  Centroid,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatcherConfig {
  /// Smallest overlap ratio accepted as an overlap match.
  pub min_overlap:    f64,
  /// Largest centroid distance accepted as a distance match, in meters.
  pub max_distance_m: f64,
  /// Radius used to turn point footprints into search shapes, in meters.
  pub point_buffer_m: f64,
  pub strategy:       MatchStrategy,
}

impl Default for MatcherConfig {
  fn default() -> Self {
    Self {
      min_overlap:    0.1,
      max_distance_m: 30.0,
      point_buffer_m: 15.0,
      strategy:       MatchStrategy::Overlap,
    }
  }
}

// ─── Heuristics ──────────────────────────────────────────────────────────────

/// One ring of the center-distance heuristic. A band without `max_km`
/// catches everything beyond the previous band.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DistanceBand {
  #[serde(default)]
  pub max_km:     Option<f64>,
  pub year:       i32,
  pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeuristicConfig {
  /// Ordered from the center outwards.
  pub bands:                   Vec<DistanceBand>,
  pub neighbor_radius_m:       f64,
  /// Only estimates strictly above this confidence act as neighbors.
  pub neighbor_min_confidence: f64,
  pub neighbor_confidence_cap: f64,
  /// Neighbor count at which the interpolation reaches full confidence.
  pub neighbor_saturation:     usize,
  pub combined_cap:            f64,
  /// Evidence-based estimates below this are re-estimated heuristically.
  pub min_useful_confidence:   f64,
  pub fallback_year:           i32,
  pub fallback_confidence:     f64,
}

impl Default for HeuristicConfig {
  fn default() -> Self {
    let band = |max_km, year, confidence| DistanceBand { max_km, year, confidence };
    Self {
      bands:                   vec![
        band(Some(0.5), 1750, 0.5),
        band(Some(1.0), 1850, 0.45),
        band(Some(2.0), 1900, 0.4),
        band(Some(3.0), 1950, 0.3),
        band(None, 1990, 0.2),
      ],
      neighbor_radius_m:       300.0,
      neighbor_min_confidence: 0.5,
      neighbor_confidence_cap: 0.6,
      neighbor_saturation:     5,
      combined_cap:            0.7,
      min_useful_confidence:   0.1,
      fallback_year:           1950,
      fallback_confidence:     0.15,
    }
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  /// Registry-style records carrying construction years.
  #[default]
  Dated,
  /// Detections on a historical map of a known year.
  Map,
  /// Hand-entered corrections.
  Manual,
  /// Geometry only; never produces evidence.
  Footprint,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SourceProfile {
  #[serde(default)]
  pub kind:       SourceKind,
  /// Survey year of the map. Required for `map` sources.
  #[serde(default)]
  pub map_year:   Option<i32>,
  /// Confidence used when a feature carries no strength of its own.
  #[serde(default)]
  pub confidence: Option<f64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_gives_defaults() {
    let config: FusionConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, FusionConfig::default());
    assert_eq!(config.matcher.max_distance_m, 30.0);
    assert_eq!(config.heuristic.bands.last().unwrap().max_km, None);
  }

  #[test]
  fn defaults_are_valid() {
    FusionConfig::default().validate().unwrap();
  }

  #[test]
  fn out_of_range_tunables_are_rejected() {
    let cases: [fn(&mut FusionConfig); 11] = [
      |c| c.matcher.point_buffer_m = 0.0,
      |c| c.matcher.point_buffer_m = -5.0,
      |c| c.matcher.min_overlap = 1.5,
      |c| c.matcher.min_overlap = -0.1,
      |c| c.matcher.max_distance_m = -1.0,
      |c| c.matcher.max_distance_m = f64::NAN,
      |c| c.heuristic.combined_cap = 1.2,
      |c| c.heuristic.neighbor_radius_m = 0.0,
      |c| c.heuristic.neighbor_saturation = 0,
      |c| c.heuristic.bands[0].confidence = 2.0,
      |c| c.reference.lat = 123.0,
    ];
    for (i, mutate) in cases.into_iter().enumerate() {
      let mut config = FusionConfig::default();
      mutate(&mut config);
      assert!(matches!(config.validate(), Err(Error::Config(_))), "case {i}");
    }
  }

  #[test]
  fn map_source_needs_a_year() {
    let mut config = FusionConfig::default();
    config.sources.insert("ml".into(), SourceProfile { kind: SourceKind::Map, ..Default::default() });
    assert!(matches!(config.validate(), Err(Error::Config(_))));
    config.sources.get_mut("ml").unwrap().map_year = Some(1880);
    config.validate().unwrap();
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let config: FusionConfig = serde_json::from_value(serde_json::json!({
      "matcher": { "strategy": "centroid" },
      "sources": { "ml": { "kind": "map", "map_year": 1880 } }
    }))
    .unwrap();

    assert_eq!(config.matcher.strategy, MatchStrategy::Centroid);
    assert_eq!(config.matcher.min_overlap, 0.1);
    let ml = &config.sources["ml"];
    assert_eq!(ml.kind, SourceKind::Map);
    assert_eq!(ml.map_year, Some(1880));
    assert_eq!(ml.confidence, None);
  }
}
