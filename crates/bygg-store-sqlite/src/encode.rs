//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, geometry as GeoJSON text, raw
//! properties as compact JSON, and UUIDs as hyphenated lowercase strings.
//! Enum discriminants use their snake_case labels.

use bygg_core::{
  building::{Building, Footprint},
  estimate::Estimate,
  evidence::{Evidence, EvidenceMethod, EvidenceType},
};
use chrono::{DateTime, Utc};
use geo::Point;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Raw properties ──────────────────────────────────────────────────────────

pub fn encode_properties(value: &serde_json::Value) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_properties(s: &str) -> Result<serde_json::Value> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawBuilding::from_row`].
pub const BUILDING_COLUMNS: &str = "building_id, geometry, geometry_source, \
  centroid_lon, centroid_lat, building_type, name, \
  est_start_year, est_end_year, est_confidence, est_method";

/// Column list matching [`RawEvidence::from_row`].
pub const EVIDENCE_COLUMNS: &str = "evidence_id, building_id, source_id, \
  evidence_type, min_year, max_year, exact_year, end_year, confidence, \
  confidence_reason, method, source_local_id, raw_properties, recorded_at";

/// Raw values read directly from a `buildings` row.
pub struct RawBuilding {
  pub building_id:     String,
  pub geometry:        String,
  pub geometry_source: String,
  pub centroid_lon:    Option<f64>,
  pub centroid_lat:    Option<f64>,
  pub building_type:   Option<String>,
  pub name:            Option<String>,
  pub est_start_year:  Option<i32>,
  pub est_end_year:    Option<i32>,
  pub est_confidence:  Option<f64>,
  pub est_method:      Option<String>,
}

impl RawBuilding {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      building_id:     row.get(0)?,
      geometry:        row.get(1)?,
      geometry_source: row.get(2)?,
      centroid_lon:    row.get(3)?,
      centroid_lat:    row.get(4)?,
      building_type:   row.get(5)?,
      name:            row.get(6)?,
      est_start_year:  row.get(7)?,
      est_end_year:    row.get(8)?,
      est_confidence:  row.get(9)?,
      est_method:      row.get(10)?,
    })
  }

  /// The stored estimate, if one has ever been written.
  pub fn estimate(&self) -> Result<Option<Estimate>> {
    let Some(method) = self.est_method.as_deref() else {
      return Ok(None);
    };
    Ok(Some(Estimate {
      building_id: self.building_id.clone(),
      start_year:  self.est_start_year,
      end_year:    self.est_end_year,
      confidence:  self.est_confidence.unwrap_or(0.0),
      method:      method.parse()?,
    }))
  }

  pub fn into_building(self) -> Result<Building> {
    let centroid = match (self.centroid_lon, self.centroid_lat) {
      (Some(lon), Some(lat)) => Some(Point::new(lon, lat)),
      _ => None,
    };
    Ok(Building {
      building_id: self.building_id,
      footprint: Footprint::from_geojson_str(&self.geometry)?,
      geometry_source: self.geometry_source,
      centroid,
      building_type: self.building_type,
      name: self.name,
    })
  }
}

/// Raw values read directly from an `evidence` row.
pub struct RawEvidence {
  pub evidence_id:       String,
  pub building_id:       String,
  pub source_id:         String,
  pub evidence_type:     String,
  pub min_year:          Option<i32>,
  pub max_year:          Option<i32>,
  pub exact_year:        Option<i32>,
  pub end_year:          Option<i32>,
  pub confidence:        f64,
  pub confidence_reason: Option<String>,
  pub method:            String,
  pub source_local_id:   Option<String>,
  pub raw_properties:    Option<String>,
  pub recorded_at:       String,
}

impl RawEvidence {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      evidence_id:       row.get(0)?,
      building_id:       row.get(1)?,
      source_id:         row.get(2)?,
      evidence_type:     row.get(3)?,
      min_year:          row.get(4)?,
      max_year:          row.get(5)?,
      exact_year:        row.get(6)?,
      end_year:          row.get(7)?,
      confidence:        row.get(8)?,
      confidence_reason: row.get(9)?,
      method:            row.get(10)?,
      source_local_id:   row.get(11)?,
      raw_properties:    row.get(12)?,
      recorded_at:       row.get(13)?,
    })
  }

  pub fn into_evidence(self) -> Result<Evidence> {
    Ok(Evidence {
      evidence_id:       decode_uuid(&self.evidence_id)?,
      building_id:       self.building_id,
      source_id:         self.source_id,
      evidence_type:     EvidenceType::parse(&self.evidence_type)?,
      exact_year:        self.exact_year,
      end_year:          self.end_year,
      min_year:          self.min_year,
      max_year:          self.max_year,
      confidence:        self.confidence,
      confidence_reason: self.confidence_reason,
      method:            EvidenceMethod::parse(&self.method)?,
      source_local_id:   self.source_local_id,
      raw_properties:    self
        .raw_properties
        .as_deref()
        .map(decode_properties)
        .transpose()?,
      recorded_at:       decode_dt(&self.recorded_at)?,
    })
  }
}

/// Owned column values for one `evidence` INSERT, ready to move into a
/// database closure.
pub struct EvidenceParams {
  pub evidence_id:       String,
  pub building_id:       String,
  pub source_id:         String,
  pub evidence_type:     &'static str,
  pub min_year:          Option<i32>,
  pub max_year:          Option<i32>,
  pub exact_year:        Option<i32>,
  pub end_year:          Option<i32>,
  pub confidence:        f64,
  pub confidence_reason: Option<String>,
  pub method:            &'static str,
  pub source_local_id:   Option<String>,
  pub raw_properties:    Option<String>,
  pub recorded_at:       String,
}

impl EvidenceParams {
  pub fn encode(ev: &Evidence) -> Result<Self> {
    Ok(Self {
      evidence_id:       encode_uuid(ev.evidence_id),
      building_id:       ev.building_id.clone(),
      source_id:         ev.source_id.clone(),
      evidence_type:     ev.evidence_type.into(),
      min_year:          ev.min_year,
      max_year:          ev.max_year,
      exact_year:        ev.exact_year,
      end_year:          ev.end_year,
      confidence:        ev.confidence,
      confidence_reason: ev.confidence_reason.clone(),
      method:            ev.method.into(),
      source_local_id:   ev.source_local_id.clone(),
      raw_properties:    ev
        .raw_properties
        .as_ref()
        .map(encode_properties)
        .transpose()?,
      recorded_at:       encode_dt(ev.recorded_at),
    })
  }

  pub const INSERT_SQL: &'static str = "INSERT INTO evidence (
       evidence_id, building_id, source_id, evidence_type,
       min_year, max_year, exact_year, end_year,
       confidence, confidence_reason, method, source_local_id,
       raw_properties, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn
      .prepare_cached(Self::INSERT_SQL)?
      .execute(rusqlite::params![
        self.evidence_id,
        self.building_id,
        self.source_id,
        self.evidence_type,
        self.min_year,
        self.max_year,
        self.exact_year,
        self.end_year,
        self.confidence,
        self.confidence_reason,
        self.method,
        self.source_local_id,
        self.raw_properties,
        self.recorded_at,
      ])
  }
}
