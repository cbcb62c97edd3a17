//! Feature → [`NormalizedFeature`] mapping.
//!
//! Pipeline:
//!   geojson::Feature
//!     └─ Footprint::try_from(geometry)   → point / polygon
//!     └─ required_id(`_src`, `_src_id`)  → identity
//!     └─ parse_year(`sd`, `ed`)          → optional years
//!     └─ optional text / number props    → type, name, hints

use bygg_core::building::Footprint;
use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value};

use crate::{
  EvidenceStrength, NormalizedFeature,
  error::{Error, Result},
};

// ─── Property helpers ────────────────────────────────────────────────────────

/// A required identifier: strings are trimmed, integers are stringified.
fn required_id(props: &Map<String, Value>, key: &'static str) -> Result<String> {
  let id = match props.get(key) {
    Some(Value::String(s)) => s.trim().to_string(),
    Some(Value::Number(n)) => n.to_string(),
    _ => String::new(),
  };
  if id.is_empty() {
    return Err(Error::MissingProperty(key));
  }
  Ok(id)
}

fn opt_text(props: &Map<String, Value>, key: &str) -> Option<String> {
  match props.get(key)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    _ => None,
  }
}

fn opt_number(props: &Map<String, Value>, key: &str) -> Option<f64> {
  let n = match props.get(key)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }?;
  n.is_finite().then_some(n)
}

/// Extract a year from a date-ish property value.
///
/// Accepts integers, `YYYY-MM-DD`, bare `YYYY`, and free text containing a
/// standalone run of three or four digits (e.g. `"ca. 1850"`).
pub(crate) fn parse_year(value: &Value) -> Option<i32> {
  match value {
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
      .and_then(|y| i32::try_from(y).ok()),
    Value::String(s) => year_from_text(s.trim()),
    _ => None,
  }
}

fn year_from_text(s: &str) -> Option<i32> {
  if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Some(date.year());
  }
  s.split(|c: char| !c.is_ascii_digit())
    .find(|run| (3..=4).contains(&run.len()))
    .and_then(|run| run.parse().ok())
}

// ─── Feature ─────────────────────────────────────────────────────────────────

pub fn parse_feature(feature: geojson::Feature) -> Result<NormalizedFeature> {
  let geometry = feature.geometry.ok_or(Error::MissingGeometry)?;
  let props = feature.properties.unwrap_or_default();

  let source_id = required_id(&props, "_src")?;
  let source_local_id = required_id(&props, "_src_id")?;
  let footprint = Footprint::try_from(geometry)?;

  Ok(NormalizedFeature {
    source_id,
    source_local_id,
    footprint,
    start_year: props.get("sd").and_then(parse_year),
    end_year: props.get("ed").and_then(parse_year),
    strength: opt_text(&props, "ev").and_then(|s| s.parse::<EvidenceStrength>().ok()),
    building_type: opt_text(&props, "bt"),
    name: opt_text(&props, "nm"),
    machine_confidence: opt_number(&props, "mlc"),
    properties: props,
  })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::parse_collection;

  fn feature(props: Value, geometry: Value) -> geojson::Feature {
    serde_json::from_value(json!({
      "type": "Feature",
      "properties": props,
      "geometry": geometry,
    }))
    .unwrap()
  }

  fn point() -> Value { json!({ "type": "Point", "coordinates": [10.39, 63.43] }) }

  #[test]
  fn canonical_properties_are_mapped() {
    let f = parse_feature(feature(
      json!({
        "_src": "sefrak", "_src_id": 1601, "sd": "1850", "ed": "1962-04-01",
        "ev": "High", "bt": "residential", "nm": "Bakke gård", "extra": true,
      }),
      point(),
    ))
    .unwrap();

    assert_eq!(f.building_id(), "sefrak:1601");
    assert_eq!(f.start_year, Some(1850));
    assert_eq!(f.end_year, Some(1962));
    assert_eq!(f.strength, Some(EvidenceStrength::High));
    assert_eq!(f.building_type.as_deref(), Some("residential"));
    assert_eq!(f.name.as_deref(), Some("Bakke gård"));
    assert_eq!(f.properties["extra"], json!(true));
    assert_eq!(f.footprint.kind(), "point");
  }

  #[test]
  fn missing_source_id_is_an_error() {
    let err = parse_feature(feature(json!({ "_src_id": "1" }), point())).unwrap_err();
    assert!(matches!(err, Error::MissingProperty("_src")));

    let err =
      parse_feature(feature(json!({ "_src": "osm", "_src_id": "  " }), point())).unwrap_err();
    assert!(matches!(err, Error::MissingProperty("_src_id")));
  }

  #[test]
  fn missing_geometry_is_an_error() {
    let err = parse_feature(feature(json!({ "_src": "osm", "_src_id": "1" }), Value::Null))
      .unwrap_err();
    assert!(matches!(err, Error::MissingGeometry));
  }

  #[test]
  fn machine_confidence_accepts_numeric_strings() {
    let f = parse_feature(feature(
      json!({ "_src": "ml_1880", "_src_id": "7", "mlc": "0.82" }),
      point(),
    ))
    .unwrap();
    assert_eq!(f.machine_confidence, Some(0.82));
    assert_eq!(f.start_year, None);
  }

  #[test]
  fn year_formats() {
    assert_eq!(parse_year(&json!(1850)), Some(1850));
    assert_eq!(parse_year(&json!(1850.0)), Some(1850));
    assert_eq!(parse_year(&json!("1850")), Some(1850));
    assert_eq!(parse_year(&json!("1850-06-01")), Some(1850));
    assert_eq!(parse_year(&json!("ca. 1725")), Some(1725));
    assert_eq!(parse_year(&json!("ukjent")), None);
    assert_eq!(parse_year(&json!("")), None);
    assert_eq!(parse_year(&json!(null)), None);
  }

  #[test]
  fn bad_feature_does_not_abort_collection() {
    let doc = json!({
      "type": "FeatureCollection",
      "features": [
        { "type": "Feature", "properties": { "_src": "osm", "_src_id": "1" },
          "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] } },
        { "type": "Feature", "properties": { "_src": "osm", "_src_id": "2" },
          "geometry": { "type": "Point", "coordinates": [10.0, 63.0] } },
      ],
    })
    .to_string();

    let results = parse_collection(&doc).unwrap();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(Error::Geometry(_))));
    assert_eq!(results[1].as_ref().unwrap().building_id(), "osm:2");
  }

  #[test]
  fn corrupt_document_is_an_error() {
    assert!(parse_collection("{ not json").is_err());
    let bare = json!({ "type": "Point", "coordinates": [0.0, 0.0] }).to_string();
    assert!(matches!(parse_collection(&bare), Err(Error::NotFeatures)));
  }
}
