//! Integration tests for `SqliteStore` against an in-memory database.

use bygg_core::{
  building::{Footprint, NewBuilding},
  estimate::{Estimate, EstimateMethod, HeuristicSignal},
  evidence::{EvidenceMethod, EvidenceType, NewEvidence},
  store::BuildingStore,
};
use geo::{Point, polygon};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn point_building(source: &str, local_id: &str, lon: f64, lat: f64) -> NewBuilding {
  NewBuilding::new(source, local_id, Footprint::Point(Point::new(lon, lat)))
}

fn square_building(source: &str, local_id: &str) -> NewBuilding {
  let mut nb = NewBuilding::new(
    source,
    local_id,
    Footprint::Polygon(polygon![
      (x: 10.0, y: 63.0),
      (x: 10.2, y: 63.0),
      (x: 10.2, y: 63.2),
      (x: 10.0, y: 63.2),
    ]),
  );
  nb.building_type = Some("church".into());
  nb.name = Some("Vår Frue".into());
  nb
}

// ─── Buildings ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_building() {
  let s = store().await;

  let building = s.upsert_building(square_building("osm", "w1")).await.unwrap();
  assert_eq!(building.building_id, "osm:w1");

  let fetched = s.get_building("osm:w1").await.unwrap().unwrap();
  assert_eq!(fetched, building);
  let c = fetched.centroid.unwrap();
  assert!((c.x() - 10.1).abs() < 1e-9);
  assert!((c.y() - 63.1).abs() < 1e-9);
}

#[tokio::test]
async fn get_building_missing_returns_none() {
  let s = store().await;
  assert!(s.get_building("osm:nope").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_replaces_in_place() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  let mut moved = point_building("osm", "w1", 11.0, 64.0);
  moved.name = Some("renamed".into());
  s.upsert_building(moved).await.unwrap();

  let all = s.list_buildings(None).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].name.as_deref(), Some("renamed"));
  assert_eq!(all[0].building_type, None);
  assert_eq!(all[0].centroid, Some(Point::new(11.0, 64.0)));
}

#[tokio::test]
async fn upsert_keeps_existing_estimate() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();
  s.replace_estimates(vec![Estimate {
    building_id: "osm:w1".into(),
    start_year:  Some(1880),
    end_year:    None,
    confidence:  0.75,
    method:      EstimateMethod::Presence,
  }])
  .await
  .unwrap();

  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  let est = s.get_estimate("osm:w1").await.unwrap().unwrap();
  assert_eq!(est.start_year, Some(1880));
}

#[tokio::test]
async fn list_buildings_filtered_by_source() {
  let s = store().await;
  s.upsert_building(point_building("sefrak", "2", 10.0, 63.0)).await.unwrap();
  s.upsert_building(point_building("sefrak", "1", 10.0, 63.0)).await.unwrap();
  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  let sefrak = s.list_buildings(Some("sefrak")).await.unwrap();
  let ids: Vec<_> = sefrak.iter().map(|b| b.building_id.as_str()).collect();
  assert_eq!(ids, ["sefrak:1", "sefrak:2"]);
}

// ─── Evidence ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_evidence_and_retrieve_in_insertion_order() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  let first = s
    .add_evidence(NewEvidence::presence("osm:w1", "ml_1904", 1904, 0.6, EvidenceMethod::MapDetection))
    .await
    .unwrap();
  let second = s
    .add_evidence(NewEvidence::presence("osm:w1", "ml_1880", 1880, 0.75, EvidenceMethod::MapDetection))
    .await
    .unwrap();

  let evidence = s.get_evidence_for_building("osm:w1").await.unwrap();
  assert_eq!(evidence, vec![first, second]);
  assert_eq!(evidence[1].evidence_type, EvidenceType::Presence);
  assert_eq!(evidence[1].max_year, Some(1880));
}

#[tokio::test]
async fn evidence_fields_roundtrip() {
  let s = store().await;
  s.upsert_building(point_building("sefrak", "7", 10.39, 63.43)).await.unwrap();

  let mut input = NewEvidence::exact("sefrak:7", "sefrak", 1850, 0.95, EvidenceMethod::Registry);
  input.end_year = Some(1962);
  input.confidence_reason = Some("registry_high".into());
  input.source_local_id = Some("7".into());
  input.raw_properties = Some(serde_json::json!({ "_src": "sefrak", "sd": "1850" }));

  let stored = s.add_evidence(input).await.unwrap();
  let fetched = s.get_evidence_for_building("sefrak:7").await.unwrap();

  assert_eq!(fetched.len(), 1);
  assert_eq!(fetched[0], stored);
  assert_eq!(fetched[0].end_year, Some(1962));
  assert_eq!(fetched[0].raw_properties.as_ref().unwrap()["sd"], "1850");
}

#[tokio::test]
async fn add_evidence_for_unknown_building_errors() {
  let s = store().await;
  let err = s
    .add_evidence(NewEvidence::exact("osm:ghost", "sefrak", 1850, 0.9, EvidenceMethod::Registry))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::BuildingNotFound(ref id) if id == "osm:ghost"));
}

#[tokio::test]
async fn add_evidence_rejects_out_of_range_confidence() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  let mut input = NewEvidence::exact("osm:w1", "sefrak", 1850, 0.9, EvidenceMethod::Registry);
  input.confidence = 1.2;
  let err = s.add_evidence(input).await.unwrap_err();
  assert!(matches!(err, crate::Error::Core(bygg_core::Error::ConfidenceOutOfRange(_))));
}

#[tokio::test]
async fn batch_is_all_or_nothing() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  let result = s
    .add_evidence_batch(vec![
      NewEvidence::exact("osm:w1", "sefrak", 1850, 0.9, EvidenceMethod::Registry),
      NewEvidence::exact("osm:ghost", "sefrak", 1850, 0.9, EvidenceMethod::Registry),
    ])
    .await;
  assert!(result.is_err());
  assert!(s.list_evidence().await.unwrap().is_empty());
}

#[tokio::test]
async fn buildings_with_evidence_are_distinct_and_sorted() {
  let s = store().await;
  s.upsert_building(square_building("osm", "b")).await.unwrap();
  s.upsert_building(square_building("osm", "a")).await.unwrap();
  s.upsert_building(square_building("osm", "c")).await.unwrap();

  s.add_evidence_batch(vec![
    NewEvidence::exact("osm:b", "sefrak", 1850, 0.9, EvidenceMethod::Registry),
    NewEvidence::presence("osm:b", "ml_1880", 1880, 0.7, EvidenceMethod::MapDetection),
    NewEvidence::exact("osm:a", "manual", 1901, 1.0, EvidenceMethod::Manual),
  ])
  .await
  .unwrap();

  let ids = s.list_buildings_with_evidence().await.unwrap();
  assert_eq!(ids, ["osm:a", "osm:b"]);
}

// ─── Estimates ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_estimates_overwrites_wholesale() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();

  s.replace_estimates(vec![Estimate {
    building_id: "osm:w1".into(),
    start_year:  Some(1850),
    end_year:    Some(1962),
    confidence:  0.9,
    method:      EstimateMethod::Exact,
  }])
  .await
  .unwrap();

  let heuristic = Estimate {
    building_id: "osm:w1".into(),
    start_year:  Some(1990),
    end_year:    None,
    confidence:  0.2,
    method:      EstimateMethod::Heuristic(vec![HeuristicSignal::CenterDistance]),
  };
  let written = s.replace_estimates(vec![heuristic.clone()]).await.unwrap();
  assert_eq!(written, 1);

  assert_eq!(s.get_estimate("osm:w1").await.unwrap(), Some(heuristic.clone()));
  assert_eq!(s.list_estimates().await.unwrap(), vec![heuristic]);
}

#[tokio::test]
async fn replace_estimates_ignores_unknown_buildings() {
  let s = store().await;
  let written = s
    .replace_estimates(vec![Estimate::unresolved("osm:ghost")])
    .await
    .unwrap();
  assert_eq!(written, 0);
  assert!(s.list_estimates().await.unwrap().is_empty());
}

// ─── Views and stats ─────────────────────────────────────────────────────────

#[tokio::test]
async fn materialize_returns_none_for_unknown_building() {
  let s = store().await;
  assert!(s.materialize("osm:ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn materialize_bundles_evidence_and_estimate() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();
  s.add_evidence(NewEvidence::exact("osm:w1", "sefrak", 1850, 0.9, EvidenceMethod::Registry))
    .await
    .unwrap();

  let view = s.materialize("osm:w1").await.unwrap().unwrap();
  assert_eq!(view.building.building_id, "osm:w1");
  assert_eq!(view.evidence.len(), 1);
  assert!(view.estimate.is_none());
}

#[tokio::test]
async fn stats_count_by_source_type_and_method() {
  let s = store().await;
  s.upsert_building(square_building("osm", "w1")).await.unwrap();
  s.upsert_building(point_building("sefrak", "1", 10.0, 63.0)).await.unwrap();

  let mut propagated =
    NewEvidence::exact("osm:w1", "sefrak", 1850, 0.6, EvidenceMethod::Propagated);
  propagated.confidence_reason = Some("propagated_from_sefrak:1".into());
  s.add_evidence_batch(vec![
    NewEvidence::exact("sefrak:1", "sefrak", 1850, 0.9, EvidenceMethod::Registry),
    propagated,
    NewEvidence::presence("osm:w1", "ml_1880", 1880, 0.7, EvidenceMethod::MapDetection),
  ])
  .await
  .unwrap();
  s.replace_estimates(vec![Estimate::unresolved("osm:w1")]).await.unwrap();

  let stats = s.get_stats().await.unwrap();
  assert_eq!(stats.buildings, 2);
  assert_eq!(stats.buildings_by_source["osm"], 1);
  assert_eq!(stats.evidence, 3);
  assert_eq!(stats.evidence_by_type["exact"], 2);
  assert_eq!(stats.evidence_by_type["presence"], 1);
  assert_eq!(stats.propagated_evidence, 1);
  assert_eq!(stats.estimates_by_method["none"], 1);
}
