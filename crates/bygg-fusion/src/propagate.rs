//! Evidence propagation along matches, and the `match` stage driver.
//!
//! Propagation is single hop: only original evidence is copied, and a copy
//! is never copied again. A building receives at most one row per source;
//! the first writer in a run wins.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  fmt,
  str::FromStr,
};

use bygg_core::{
  evidence::{Evidence, EvidenceMethod, NewEvidence, clamp_confidence},
  store::BuildingStore,
};
use tracing::{info, warn};

use crate::{
  Error, Result,
  config::FusionConfig,
  frame::LocalFrame,
  matcher::{Match, MatchKind, SpatialMatcher},
};

/// Prefix of the `confidence_reason` of every propagated row.
pub const PROPAGATED_FROM: &str = "propagated_from_";

/// How much a match is trusted, from the overlap ratio, else the distance.
pub fn match_confidence(m: &Match) -> f64 {
  match m.overlap_ratio {
    r if r >= 0.7 => 0.9,
    r if r >= 0.5 => 0.8,
    r if r >= 0.3 => 0.7,
    _ => match m.distance_m {
      d if d < 5.0 => 0.7,
      d if d < 10.0 => 0.6,
      _ => 0.5,
    },
  }
}

/// Plan the rows that propagation adds, against a snapshot of the store's
/// evidence grouped by building. Matches are applied in order, each in both
/// directions.
pub fn plan_propagation(
  matches: &[Match],
  snapshot: &HashMap<String, Vec<Evidence>>,
) -> Vec<NewEvidence> {
  let mut present: HashMap<String, HashSet<String>> = HashMap::new();
  let mut planned = Vec::new();

  for m in matches {
    let weight = match_confidence(m);
    for (from, to) in [
      (&m.building_id_1, &m.building_id_2),
      (&m.building_id_2, &m.building_id_1),
    ] {
      let originals = snapshot
        .get(from.as_str())
        .into_iter()
        .flatten()
        .filter(|e| !e.is_propagated());

      for original in originals {
        let sources = present.entry(to.clone()).or_insert_with(|| {
          snapshot
            .get(to.as_str())
            .into_iter()
            .flatten()
            .map(|e| e.source_id.clone())
            .collect()
        });
        if !sources.insert(original.source_id.clone()) {
          continue;
        }

        let mut copy = original.to_new(to);
        copy.confidence = clamp_confidence(original.confidence * weight);
        copy.confidence_reason = Some(format!("{PROPAGATED_FROM}{from}"));
        copy.method = EvidenceMethod::Propagated;
        planned.push(copy);
      }
    }
  }

  planned
}

// ─── Stage driver ────────────────────────────────────────────────────────────

/// An ordered pair of source ids to match, written `first:second`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePair {
  pub first:  String,
  pub second: String,
}

impl FromStr for SourcePair {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.split_once(':') {
      Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => Ok(Self {
        first:  a.trim().to_string(),
        second: b.trim().to_string(),
      }),
      _ => Err(Error::Config(format!("source pair must look like `a:b`, got {s:?}"))),
    }
  }
}

impl fmt::Display for SourcePair {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.first, self.second)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSummary {
  pub pairs:       usize,
  pub considered:  usize,
  pub by_overlap:  usize,
  pub by_distance: usize,
  pub unmatched:   usize,
  pub skipped:     usize,
  pub propagated:  usize,
}

impl fmt::Display for MatchSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} pair(s), {} building(s) considered: {} matched by overlap, {} by distance, \
       {} unmatched, {} skipped; {} evidence row(s) propagated",
      self.pairs,
      self.considered,
      self.by_overlap,
      self.by_distance,
      self.unmatched,
      self.skipped,
      self.propagated,
    )
  }
}

/// Match every listed pair of sources and propagate evidence across the
/// matches. All propagated rows are written in one transaction.
pub async fn match_sources<S>(
  store: &S,
  config: &FusionConfig,
  pairs: &[SourcePair],
) -> Result<MatchSummary>
where
  S: BuildingStore,
{
  config.validate()?;
  let matcher = SpatialMatcher::new(config.matcher, LocalFrame::new(config.reference));
  let mut summary = MatchSummary::default();
  let mut matches = Vec::new();

  for pair in pairs {
    if pair.first == pair.second {
      warn!(%pair, "a source cannot be matched against itself");
      continue;
    }
    let sources = store.list_buildings(Some(pair.first.as_str())).await.map_err(Error::store)?;
    let targets = store.list_buildings(Some(pair.second.as_str())).await.map_err(Error::store)?;

    let outcome = matcher.match_buildings(&sources, &targets);
    info!(
      %pair,
      sources = sources.len(),
      targets = targets.len(),
      matched = outcome.matches.len(),
      unmatched = outcome.unmatched,
      "matched source pair"
    );

    summary.pairs += 1;
    summary.considered += sources.len();
    summary.by_overlap += outcome.count(MatchKind::Overlap);
    summary.by_distance += outcome.count(MatchKind::Distance);
    summary.unmatched += outcome.unmatched;
    summary.skipped += outcome.skipped;
    matches.extend(outcome.matches);
  }

  let mut snapshot: HashMap<String, Vec<Evidence>> = HashMap::new();
  for evidence in store.list_evidence().await.map_err(Error::store)? {
    snapshot.entry(evidence.building_id.clone()).or_default().push(evidence);
  }

  let planned = plan_propagation(&matches, &snapshot);
  if !planned.is_empty() {
    let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &planned {
      *per_source.entry(row.source_id.as_str()).or_default() += 1;
    }
    info!(?per_source, "propagating evidence");
  }
  summary.propagated = store
    .add_evidence_batch(planned)
    .await
    .map_err(Error::store)?
    .len();

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use bygg_core::evidence::EvidenceType;

  use super::*;
  use crate::tests::stored;

  fn matched(a: &str, b: &str, overlap_ratio: f64, distance_m: f64) -> Match {
    Match {
      building_id_1: a.into(),
      building_id_2: b.into(),
      source_1:      a.split(':').next().unwrap_or_default().into(),
      source_2:      b.split(':').next().unwrap_or_default().into(),
      overlap_ratio,
      distance_m,
      kind: if overlap_ratio > 0.0 { MatchKind::Overlap } else { MatchKind::Distance },
    }
  }

  fn snapshot(rows: Vec<NewEvidence>) -> HashMap<String, Vec<Evidence>> {
    let mut map: HashMap<String, Vec<Evidence>> = HashMap::new();
    for row in rows {
      map.entry(row.building_id.clone()).or_default().push(stored(row));
    }
    map
  }

  #[test]
  fn confidence_steps() {
    let cases = [
      (0.95, 100.0, 0.9),
      (0.7, 100.0, 0.9),
      (0.6, 100.0, 0.8),
      (0.3, 100.0, 0.7),
      (0.2, 4.5, 0.7),
      (0.0, 4.5, 0.7),
      (0.0, 7.0, 0.6),
      (0.0, 12.0, 0.5),
    ];
    for (overlap, distance, expected) in cases {
      assert_eq!(match_confidence(&matched("a:1", "b:1", overlap, distance)), expected);
    }
  }

  #[test]
  fn copies_into_both_directions() {
    let snap = snapshot(vec![
      NewEvidence::exact("a:1", "a", 1900, 0.95, EvidenceMethod::Registry),
      NewEvidence::presence("b:1", "b", 1880, 0.8, EvidenceMethod::MapDetection),
    ]);
    let planned = plan_propagation(&[matched("a:1", "b:1", 0.0, 4.5)], &snap);

    assert_eq!(planned.len(), 2);
    let to_b = &planned[0];
    assert_eq!(to_b.building_id, "b:1");
    assert_eq!(to_b.source_id, "a");
    assert_eq!(to_b.evidence_type, EvidenceType::Exact);
    assert_eq!(to_b.exact_year, Some(1900));
    assert!((to_b.confidence - 0.665).abs() < 1e-9);
    assert_eq!(to_b.method, EvidenceMethod::Propagated);
    assert_eq!(to_b.confidence_reason.as_deref(), Some("propagated_from_a:1"));

    let to_a = &planned[1];
    assert_eq!(to_a.building_id, "a:1");
    assert_eq!(to_a.source_id, "b");
    assert_eq!(to_a.max_year, Some(1880));
  }

  #[test]
  fn existing_source_is_not_overwritten() {
    let snap = snapshot(vec![
      NewEvidence::exact("a:1", "a", 1900, 0.95, EvidenceMethod::Registry),
      NewEvidence::exact("b:1", "a", 1910, 0.9, EvidenceMethod::Registry),
    ]);
    let planned = plan_propagation(&[matched("a:1", "b:1", 0.9, 1.0)], &snap);
    assert!(planned.is_empty());
  }

  #[test]
  fn first_match_wins_within_a_run() {
    let snap = snapshot(vec![
      NewEvidence::exact("a:1", "a", 1900, 0.95, EvidenceMethod::Registry),
      NewEvidence::exact("a:2", "a", 1700, 0.95, EvidenceMethod::Registry),
    ]);
    let matches = [matched("a:1", "b:1", 0.9, 1.0), matched("a:2", "b:1", 0.0, 8.0)];
    let planned = plan_propagation(&matches, &snap);
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].exact_year, Some(1900));
  }

  #[test]
  fn propagated_rows_are_not_copied_again() {
    let mut copy = NewEvidence::exact("b:1", "a", 1900, 0.6, EvidenceMethod::Propagated);
    copy.confidence_reason = Some("propagated_from_a:1".into());
    let snap = snapshot(vec![copy]);
    let planned = plan_propagation(&[matched("b:1", "c:1", 0.9, 1.0)], &snap);
    assert!(planned.is_empty());
  }

  #[test]
  fn source_pair_parsing() {
    let pair: SourcePair = "sefrak:osm".parse().unwrap();
    assert_eq!(pair.first, "sefrak");
    assert_eq!(pair.second, "osm");
    assert_eq!(pair.to_string(), "sefrak:osm");
    assert!("sefrak".parse::<SourcePair>().is_err());
    assert!(":osm".parse::<SourcePair>().is_err());
  }
}
