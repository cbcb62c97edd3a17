//! Evidence-based estimation.
//!
//! A building's estimate is derived from its own evidence rows only: the
//! most confident exact claim wins; failing that, the earliest map the
//! building appears on bounds its construction from above.

use std::{collections::BTreeMap, fmt};

use bygg_core::{
  estimate::{Estimate, EstimateMethod},
  evidence::{Evidence, EvidenceType},
  store::BuildingStore,
};
use tracing::info;

use crate::{Error, Result};

/// Pick the estimate supported by `evidence`.
///
/// Among exact rows the highest confidence wins, and the earliest inserted
/// wins a tie. Presence rows contribute their `max_year`; the estimate takes
/// the minimum of those and the maximum confidence among them.
pub fn calculate_best_estimate(building_id: &str, evidence: &[Evidence]) -> Estimate {
  let best_exact = evidence
    .iter()
    .filter(|e| e.evidence_type == EvidenceType::Exact)
    .filter_map(|e| e.exact_year.map(|year| (e, year)))
    .fold(None, |best: Option<(&Evidence, i32)>, (e, year)| match best {
      Some((b, _)) if b.confidence >= e.confidence => best,
      _ => Some((e, year)),
    });

  if let Some((e, year)) = best_exact {
    return Estimate {
      building_id: building_id.to_owned(),
      start_year:  Some(year),
      end_year:    e.end_year,
      confidence:  e.confidence,
      method:      EstimateMethod::Exact,
    };
  }

  let presence = evidence
    .iter()
    .filter(|e| e.evidence_type == EvidenceType::Presence)
    .filter_map(|e| e.max_year.map(|year| (year, e.confidence)))
    .fold(None, |acc: Option<(i32, f64)>, (year, conf)| match acc {
      Some((y, c)) => Some((y.min(year), c.max(conf))),
      None => Some((year, conf)),
    });

  match presence {
    Some((year, confidence)) => Estimate {
      building_id: building_id.to_owned(),
      start_year: Some(year),
      end_year: None,
      confidence,
      method: EstimateMethod::Presence,
    },
    None => Estimate::unresolved(building_id),
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimateSummary {
  pub buildings:  usize,
  pub exact:      usize,
  pub presence:   usize,
  pub unresolved: usize,
}

impl fmt::Display for EstimateSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} building(s) estimated: {} exact, {} presence, {} unresolved",
      self.buildings, self.exact, self.presence, self.unresolved,
    )
  }
}

/// Recompute the estimate of every building that has evidence and write
/// them all in one transaction. Running it twice yields identical
/// estimates.
pub async fn update_all_estimates<S>(store: &S) -> Result<EstimateSummary>
where
  S: BuildingStore,
{
  let mut grouped: BTreeMap<String, Vec<Evidence>> = BTreeMap::new();
  for evidence in store.list_evidence().await.map_err(Error::store)? {
    grouped.entry(evidence.building_id.clone()).or_default().push(evidence);
  }

  let mut summary = EstimateSummary::default();
  let estimates: Vec<Estimate> = grouped
    .iter()
    .map(|(building_id, evidence)| {
      let estimate = calculate_best_estimate(building_id, evidence);
      match estimate.method {
        EstimateMethod::Exact => summary.exact += 1,
        EstimateMethod::Presence => summary.presence += 1,
        _ => summary.unresolved += 1,
      }
      estimate
    })
    .collect();

  summary.buildings = store.replace_estimates(estimates).await.map_err(Error::store)?;
  info!(
    buildings = summary.buildings,
    exact = summary.exact,
    presence = summary.presence,
    "estimates updated"
  );
  Ok(summary)
}

#[cfg(test)]
mod tests {
  use bygg_core::evidence::{EvidenceMethod, NewEvidence};

  use super::*;
  use crate::tests::stored;

  fn exact(year: i32, confidence: f64) -> Evidence {
    stored(NewEvidence::exact("a:1", "a", year, confidence, EvidenceMethod::Registry))
  }

  fn presence(year: i32, confidence: f64) -> Evidence {
    stored(NewEvidence::presence("a:1", "m", year, confidence, EvidenceMethod::MapDetection))
  }

  #[test]
  fn exact_beats_presence() {
    let estimate = calculate_best_estimate("a:1", &[presence(1880, 0.9), exact(1901, 0.5)]);
    assert_eq!(estimate.method, EstimateMethod::Exact);
    assert_eq!(estimate.start_year, Some(1901));
    assert_eq!(estimate.confidence, 0.5);
  }

  #[test]
  fn most_confident_exact_wins_and_first_wins_ties() {
    let estimate =
      calculate_best_estimate("a:1", &[exact(1900, 0.6), exact(1910, 0.9), exact(1920, 0.9)]);
    assert_eq!(estimate.start_year, Some(1910));
    assert_eq!(estimate.confidence, 0.9);
  }

  #[test]
  fn exact_carries_end_year() {
    let mut demolished = exact(1900, 0.9);
    demolished.end_year = Some(1975);
    let estimate = calculate_best_estimate("a:1", &[demolished]);
    assert_eq!(estimate.end_year, Some(1975));
  }

  #[test]
  fn presence_takes_earliest_map_and_best_confidence() {
    let estimate = calculate_best_estimate(
      "a:1",
      &[presence(1904, 0.9), presence(1880, 0.75), presence(1950, 0.6)],
    );
    assert_eq!(estimate.method, EstimateMethod::Presence);
    assert_eq!(estimate.start_year, Some(1880));
    assert_eq!(estimate.end_year, None);
    assert_eq!(estimate.confidence, 0.9);
  }

  #[test]
  fn no_usable_evidence_is_unresolved() {
    let mut bare = presence(1880, 0.8);
    bare.max_year = None;
    for evidence in [vec![], vec![bare]] {
      let estimate = calculate_best_estimate("a:1", &evidence);
      assert_eq!(estimate, Estimate::unresolved("a:1"));
    }
  }
}
