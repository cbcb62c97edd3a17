//! Evidence — the fundamental unit of temporal knowledge about a building.
//!
//! An evidence row is an immutable, sourced claim about when a building
//! existed. Rows are never updated or deleted; the estimate for a building is
//! re-derived from its full evidence set whenever the caller asks for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Classification ──────────────────────────────────────────────────────────

/// What a claim's years mean.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvidenceType {
  /// A specific construction year, optionally with a demolition year.
  Exact,
  /// The building was visible on a dated source: `max_year` bounds
  /// construction from above, `min_year` says it still stood then.
  Presence,
}

/// How an evidence row was derived.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvidenceMethod {
  /// Read from a dated registry record.
  Registry,
  /// Machine-detected on a dated historical map.
  MapDetection,
  /// Entered as a manual correction.
  Manual,
  /// Copied from a matched building in another source.
  Propagated,
}

impl EvidenceType {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownEvidenceType(s.to_owned()))
  }
}

impl EvidenceMethod {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownEvidenceMethod(s.to_owned()))
  }
}

/// Clamp a score into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
  if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

// ─── Evidence ────────────────────────────────────────────────────────────────

/// An immutable claim about a building's existence window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
  pub evidence_id:       Uuid,
  pub building_id:       String,
  pub source_id:         String,
  pub evidence_type:     EvidenceType,
  pub exact_year:        Option<i32>,
  pub end_year:          Option<i32>,
  pub min_year:          Option<i32>,
  pub max_year:          Option<i32>,
  pub confidence:        f64,
  pub confidence_reason: Option<String>,
  pub method:            EvidenceMethod,
  pub source_local_id:   Option<String>,
  /// Original feature properties, kept for audit.
  pub raw_properties:    Option<serde_json::Value>,
  /// Store-assigned; never changes after creation.
  pub recorded_at:       DateTime<Utc>,
}

impl Evidence {
  pub fn is_propagated(&self) -> bool {
    self.method == EvidenceMethod::Propagated
  }

  /// The temporal payload of this row, for copying onto another building.
  pub fn to_new(&self, building_id: &str) -> NewEvidence {
    NewEvidence {
      building_id:       building_id.to_owned(),
      source_id:         self.source_id.clone(),
      evidence_type:     self.evidence_type,
      exact_year:        self.exact_year,
      end_year:          self.end_year,
      min_year:          self.min_year,
      max_year:          self.max_year,
      confidence:        self.confidence,
      confidence_reason: self.confidence_reason.clone(),
      method:            self.method,
      source_local_id:   self.source_local_id.clone(),
      raw_properties:    self.raw_properties.clone(),
    }
  }
}

// ─── NewEvidence ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::BuildingStore::add_evidence`].
/// `evidence_id` and `recorded_at` are always set by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidence {
  pub building_id:       String,
  pub source_id:         String,
  pub evidence_type:     EvidenceType,
  pub exact_year:        Option<i32>,
  pub end_year:          Option<i32>,
  pub min_year:          Option<i32>,
  pub max_year:          Option<i32>,
  pub confidence:        f64,
  pub confidence_reason: Option<String>,
  pub method:            EvidenceMethod,
  pub source_local_id:   Option<String>,
  pub raw_properties:    Option<serde_json::Value>,
}

impl NewEvidence {
  /// A construction-year claim.
  pub fn exact(
    building_id: &str,
    source_id: &str,
    exact_year: i32,
    confidence: f64,
    method: EvidenceMethod,
  ) -> Self {
    Self {
      building_id: building_id.to_owned(),
      source_id: source_id.to_owned(),
      evidence_type: EvidenceType::Exact,
      exact_year: Some(exact_year),
      end_year: None,
      min_year: None,
      max_year: None,
      confidence: clamp_confidence(confidence),
      confidence_reason: None,
      method,
      source_local_id: None,
      raw_properties: None,
    }
  }

  /// A "seen on a source dated `year`" claim: existed no later than `year`
  /// and still existed at `year`.
  pub fn presence(
    building_id: &str,
    source_id: &str,
    year: i32,
    confidence: f64,
    method: EvidenceMethod,
  ) -> Self {
    Self {
      building_id: building_id.to_owned(),
      source_id: source_id.to_owned(),
      evidence_type: EvidenceType::Presence,
      exact_year: None,
      end_year: None,
      min_year: Some(year),
      max_year: Some(year),
      confidence: clamp_confidence(confidence),
      confidence_reason: None,
      method,
      source_local_id: None,
      raw_properties: None,
    }
  }

  /// Reject rows that would violate the evidence invariants.
  pub fn validate(&self) -> Result<()> {
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(Error::ConfidenceOutOfRange(self.confidence));
    }
    let has_year = match self.evidence_type {
      EvidenceType::Exact => self.exact_year.is_some(),
      EvidenceType::Presence => self.max_year.is_some() || self.min_year.is_some(),
    };
    if has_year {
      Ok(())
    } else {
      Err(Error::IncompleteEvidence(self.evidence_type.to_string()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn discriminants_are_snake_case() {
    assert_eq!(EvidenceType::Presence.to_string(), "presence");
    assert_eq!(EvidenceMethod::MapDetection.to_string(), "map_detection");
    assert_eq!(
      EvidenceMethod::parse("propagated").unwrap(),
      EvidenceMethod::Propagated
    );
    assert!(EvidenceType::parse("rumour").is_err());
  }

  #[test]
  fn constructors_clamp_confidence() {
    let ev = NewEvidence::exact("a:1", "a", 1900, 1.4, EvidenceMethod::Manual);
    assert_eq!(ev.confidence, 1.0);
    let ev = NewEvidence::presence("a:1", "a", 1900, f64::NAN, EvidenceMethod::MapDetection);
    assert_eq!(ev.confidence, 0.0);
  }

  #[test]
  fn validate_requires_years_and_range() {
    let mut ev = NewEvidence::exact("a:1", "a", 1900, 0.5, EvidenceMethod::Registry);
    assert!(ev.validate().is_ok());

    ev.exact_year = None;
    assert!(matches!(ev.validate(), Err(Error::IncompleteEvidence(_))));

    let mut ev = NewEvidence::presence("a:1", "a", 1880, 0.5, EvidenceMethod::MapDetection);
    ev.confidence = 1.5;
    assert!(matches!(ev.validate(), Err(Error::ConfidenceOutOfRange(_))));
  }
}
