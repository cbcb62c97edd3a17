//! Per-source interpretation of normalized features.
//!
//! Each configured source id maps to an adapter that decides what temporal
//! claim, if any, a feature from that source makes. Sources without a
//! profile are read as dated records.

use std::collections::HashMap;

use bygg_core::evidence::{EvidenceMethod, NewEvidence};
use bygg_geojson::{EvidenceStrength, NormalizedFeature};

use crate::{
  Error, Result,
  config::{SourceKind, SourceProfile},
};

/// Confidence of dated records that carry no `ev` strength.
pub const UNKNOWN_SOURCE_CONFIDENCE: f64 = 0.6;
/// Confidence of map detections that carry no `mlc` score.
pub const MAP_DEFAULT_CONFIDENCE: f64 = 0.7;
pub const MANUAL_DEFAULT_CONFIDENCE: f64 = 1.0;

pub fn strength_confidence(strength: EvidenceStrength) -> f64 {
  match strength {
    EvidenceStrength::High => 0.9,
    EvidenceStrength::Medium => 0.7,
    EvidenceStrength::Low => 0.5,
  }
}

pub trait SourceAdapter: Send + Sync {
  /// The evidence row `feature` contributes, or `None` if it makes no
  /// temporal claim.
  fn interpret(&self, feature: &NormalizedFeature) -> Option<NewEvidence>;
}

/// Attach the feature's identity and raw properties to a claim.
fn with_provenance(mut evidence: NewEvidence, feature: &NormalizedFeature) -> NewEvidence {
  evidence.source_local_id = Some(feature.source_local_id.clone());
  evidence.raw_properties = Some(serde_json::Value::Object(feature.properties.clone()));
  evidence
}

// ─── Adapters ────────────────────────────────────────────────────────────────

/// Records with a construction year in `sd`.
#[derive(Debug, Clone)]
pub struct DatedRecords {
  pub default_confidence: f64,
  pub method:             EvidenceMethod,
}

impl SourceAdapter for DatedRecords {
  fn interpret(&self, feature: &NormalizedFeature) -> Option<NewEvidence> {
    let year = feature.start_year?;
    let (confidence, reason) = match feature.strength {
      Some(strength) => (strength_confidence(strength), format!("ev_{strength}")),
      None => (self.default_confidence, "source_default".to_string()),
    };
    let mut evidence =
      NewEvidence::exact(&feature.building_id(), &feature.source_id, year, confidence, self.method);
    evidence.end_year = feature.end_year;
    evidence.confidence_reason = Some(reason);
    Some(with_provenance(evidence, feature))
  }
}

/// Buildings detected on a map surveyed in `map_year`.
#[derive(Debug, Clone)]
pub struct MapSnapshot {
  pub map_year:           i32,
  pub default_confidence: f64,
}

impl SourceAdapter for MapSnapshot {
  fn interpret(&self, feature: &NormalizedFeature) -> Option<NewEvidence> {
    let (confidence, reason) = match feature.machine_confidence {
      Some(mlc) => (mlc, "mlc".to_string()),
      None => (self.default_confidence, "source_default".to_string()),
    };
    let mut evidence = NewEvidence::presence(
      &feature.building_id(),
      &feature.source_id,
      self.map_year,
      confidence,
      EvidenceMethod::MapDetection,
    );
    evidence.confidence_reason = Some(reason);
    Some(with_provenance(evidence, feature))
  }
}

/// Geometry providers that say nothing about dates.
#[derive(Debug, Clone, Copy)]
pub struct FootprintOnly;

impl SourceAdapter for FootprintOnly {
  fn interpret(&self, _feature: &NormalizedFeature) -> Option<NewEvidence> {
    None
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

pub struct SourceRegistry {
  adapters: HashMap<String, Box<dyn SourceAdapter>>,
  fallback: DatedRecords,
}

impl Default for SourceRegistry {
  fn default() -> Self {
    Self {
      adapters: HashMap::new(),
      fallback: DatedRecords {
        default_confidence: UNKNOWN_SOURCE_CONFIDENCE,
        method:             EvidenceMethod::Registry,
      },
    }
  }
}

impl SourceRegistry {
  pub fn from_profiles<'a>(
    profiles: impl IntoIterator<Item = (&'a String, &'a SourceProfile)>,
  ) -> Result<Self> {
    let mut registry = Self::default();
    for (source_id, profile) in profiles {
      if let Some(c) = profile.confidence.filter(|c| !(0.0..=1.0).contains(c)) {
        return Err(Error::Config(format!(
          "source {source_id:?}: confidence {c} is outside [0, 1]"
        )));
      }
      let adapter: Box<dyn SourceAdapter> = match profile.kind {
        SourceKind::Dated => Box::new(DatedRecords {
          default_confidence: profile.confidence.unwrap_or(UNKNOWN_SOURCE_CONFIDENCE),
          method:             EvidenceMethod::Registry,
        }),
        SourceKind::Manual => Box::new(DatedRecords {
          default_confidence: profile.confidence.unwrap_or(MANUAL_DEFAULT_CONFIDENCE),
          method:             EvidenceMethod::Manual,
        }),
        SourceKind::Map => {
          let map_year = profile.map_year.ok_or_else(|| {
            Error::Config(format!("source {source_id:?} is a map but has no map_year"))
          })?;
          Box::new(MapSnapshot {
            map_year,
            default_confidence: profile.confidence.unwrap_or(MAP_DEFAULT_CONFIDENCE),
          })
        }
        SourceKind::Footprint => Box::new(FootprintOnly),
      };
      registry.register(source_id, adapter);
    }
    Ok(registry)
  }

  pub fn register(&mut self, source_id: &str, adapter: Box<dyn SourceAdapter>) {
    self.adapters.insert(source_id.to_owned(), adapter);
  }

  pub fn adapter(&self, source_id: &str) -> &dyn SourceAdapter {
    match self.adapters.get(source_id) {
      Some(adapter) => adapter.as_ref(),
      None => &self.fallback,
    }
  }

  pub fn interpret(&self, feature: &NormalizedFeature) -> Option<NewEvidence> {
    self.adapter(&feature.source_id).interpret(feature)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use bygg_core::{building::Footprint, evidence::EvidenceType};
  use geo::Point;

  use super::*;

  fn feature(source: &str) -> NormalizedFeature {
    NormalizedFeature {
      source_id:          source.into(),
      source_local_id:    "17".into(),
      footprint:          Footprint::Point(Point::new(10.39, 63.43)),
      start_year:         Some(1850),
      end_year:           None,
      strength:           None,
      building_type:      None,
      name:               None,
      machine_confidence: None,
      properties:         serde_json::Map::new(),
    }
  }

  fn registry() -> SourceRegistry {
    let profiles = BTreeMap::from([
      ("ml".to_string(), SourceProfile { kind: SourceKind::Map, map_year: Some(1880), confidence: None }),
      ("osm".to_string(), SourceProfile { kind: SourceKind::Footprint, ..Default::default() }),
      ("fix".to_string(), SourceProfile { kind: SourceKind::Manual, ..Default::default() }),
    ]);
    SourceRegistry::from_profiles(&profiles).unwrap()
  }

  #[test]
  fn dated_record_uses_strength() {
    let mut f = feature("sefrak");
    f.strength = Some(EvidenceStrength::High);
    let e = registry().interpret(&f).unwrap();
    assert_eq!(e.building_id, "sefrak:17");
    assert_eq!(e.evidence_type, EvidenceType::Exact);
    assert_eq!(e.exact_year, Some(1850));
    assert_eq!(e.confidence, 0.9);
    assert_eq!(e.confidence_reason.as_deref(), Some("ev_high"));
    assert_eq!(e.source_local_id.as_deref(), Some("17"));
  }

  #[test]
  fn unknown_source_without_strength() {
    let e = registry().interpret(&feature("matrikkel")).unwrap();
    assert_eq!(e.confidence, UNKNOWN_SOURCE_CONFIDENCE);
    assert_eq!(e.method, EvidenceMethod::Registry);
  }

  #[test]
  fn dated_record_without_year_makes_no_claim() {
    let mut f = feature("sefrak");
    f.start_year = None;
    assert!(registry().interpret(&f).is_none());
  }

  #[test]
  fn map_detection_is_presence_at_map_year() {
    let mut f = feature("ml");
    f.machine_confidence = Some(0.75);
    let e = registry().interpret(&f).unwrap();
    assert_eq!(e.evidence_type, EvidenceType::Presence);
    assert_eq!((e.min_year, e.max_year), (Some(1880), Some(1880)));
    assert_eq!(e.confidence, 0.75);
    assert_eq!(e.method, EvidenceMethod::MapDetection);

    f.machine_confidence = None;
    assert_eq!(registry().interpret(&f).unwrap().confidence, MAP_DEFAULT_CONFIDENCE);
  }

  #[test]
  fn footprint_and_manual_sources() {
    assert!(registry().interpret(&feature("osm")).is_none());
    let e = registry().interpret(&feature("fix")).unwrap();
    assert_eq!(e.method, EvidenceMethod::Manual);
    assert_eq!(e.confidence, 1.0);
  }

  #[test]
  fn map_without_year_is_rejected() {
    let profiles = BTreeMap::from([(
      "ml".to_string(),
      SourceProfile { kind: SourceKind::Map, ..Default::default() },
    )]);
    assert!(matches!(SourceRegistry::from_profiles(&profiles), Err(Error::Config(_))));
  }
}
