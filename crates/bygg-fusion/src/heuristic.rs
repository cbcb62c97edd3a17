//! Heuristic estimation for buildings that evidence leaves undated.
//!
//! Three independent signals each may produce a guess: distance from the
//! city center, building type and size, and the estimates of nearby
//! buildings. The guesses are blended into one capped estimate, and a fixed
//! fallback covers buildings no signal fires for.

use std::{collections::HashMap, fmt};

use bygg_core::{
  building::Building,
  estimate::{Estimate, EstimateMethod, HeuristicSignal},
  store::BuildingStore,
};
use tracing::{debug, info};

use crate::{
  Error, Result,
  config::{FusionConfig, HeuristicConfig},
  frame::LocalFrame,
  index::PointIndex,
};

/// One signal's opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
  pub signal:     HeuristicSignal,
  pub year:       i32,
  pub confidence: f64,
  pub reason:     String,
}

// ─── Type and size rules ─────────────────────────────────────────────────────

struct TypeRule {
  label:       &'static str,
  types:       &'static [&'static str],
  min_area_m2: f64,
  year:        i32,
  confidence:  f64,
}

const TYPE_RULES: &[TypeRule] = &[
  TypeRule {
    label:       "large_industrial",
    types:       &["industrial", "warehouse", "factory"],
    min_area_m2: 2000.0,
    year:        1960,
    confidence:  0.35,
  },
  TypeRule {
    label:       "church",
    types:       &["church", "chapel", "cathedral"],
    min_area_m2: 0.0,
    year:        1850,
    confidence:  0.3,
  },
  TypeRule {
    label:       "large_retail",
    types:       &["retail", "commercial", "supermarket", "mall"],
    min_area_m2: 1000.0,
    year:        1990,
    confidence:  0.35,
  },
  TypeRule {
    label:       "apartment_block",
    types:       &["apartments", "residential"],
    min_area_m2: 1500.0,
    year:        1970,
    confidence:  0.3,
  },
];

// ─── Estimator ───────────────────────────────────────────────────────────────

/// A trusted estimate positioned in the local frame.
struct Anchor {
  building_id: String,
  year:        i32,
  confidence:  f64,
}

pub struct HeuristicEstimator<'a> {
  config:  &'a HeuristicConfig,
  frame:   LocalFrame,
  anchors: Vec<Anchor>,
  index:   PointIndex,
}

impl<'a> HeuristicEstimator<'a> {
  /// `buildings` and `estimates` are a snapshot of the store. Only
  /// evidence-based estimates above `neighbor_min_confidence` serve as
  /// neighbors, so heuristic results never feed back into later runs.
  pub fn new(
    config: &'a HeuristicConfig,
    frame: LocalFrame,
    buildings: &[Building],
    estimates: &HashMap<String, Estimate>,
  ) -> Self {
    let mut anchors = Vec::new();
    let mut positions = Vec::new();
    for building in buildings {
      let Some(centroid) = building.centroid else { continue };
      let Some(estimate) = estimates.get(&building.building_id) else { continue };
      let Some(year) = estimate.start_year else { continue };
      if !estimate.method.is_evidence_based()
        || estimate.confidence <= config.neighbor_min_confidence
      {
        continue;
      }
      positions.push((anchors.len(), frame.project_point(centroid)));
      anchors.push(Anchor {
        building_id: building.building_id.clone(),
        year,
        confidence: estimate.confidence,
      });
    }

    Self {
      config,
      frame,
      anchors,
      index: PointIndex::bulk_load(positions),
    }
  }

  pub fn anchor_count(&self) -> usize {
    self.anchors.len()
  }

  /// Older buildings cluster around the historic center.
  pub fn center_distance(&self, building: &Building) -> Option<Guess> {
    let km = self.frame.distance_from_origin_m(building.centroid?) / 1000.0;
    if !km.is_finite() {
      return None;
    }
    let band = self
      .config
      .bands
      .iter()
      .find(|band| band.max_km.is_none_or(|max| km < max))?;
    Some(Guess {
      signal:     HeuristicSignal::CenterDistance,
      year:       band.year,
      confidence: band.confidence,
      reason:     format!("{km:.2} km from center"),
    })
  }

  /// Some building types only appear at scale in certain eras.
  pub fn type_size(&self, building: &Building) -> Option<Guess> {
    let kind = building.building_type.as_deref()?.trim().to_lowercase();
    let area = self.frame.area_m2(&building.footprint);
    let rule = TYPE_RULES.iter().find(|rule| {
      rule.types.contains(&kind.as_str()) && (rule.min_area_m2 <= 0.0 || area > rule.min_area_m2)
    })?;
    Some(Guess {
      signal:     HeuristicSignal::TypeSize,
      year:       rule.year,
      confidence: rule.confidence,
      reason:     format!("{} ({area:.0} m²)", rule.label),
    })
  }

  /// Distance-weighted mean of trusted neighbor estimates.
  pub fn neighbor_interpolation(&self, building: &Building) -> Option<Guess> {
    let center = self.frame.project_point(building.centroid?);
    let radius = self.config.neighbor_radius_m;
    if radius.is_nan() || radius <= 0.0 {
      return None;
    }

    let (mut weight_sum, mut year_sum, mut conf_sum, mut count) = (0.0, 0.0, 0.0, 0usize);
    for (slot, distance) in self.index.within(center, radius) {
      let anchor = &self.anchors[slot];
      if anchor.building_id == building.building_id {
        continue;
      }
      let weight = anchor.confidence * (1.0 - distance / radius);
      if weight.is_nan() || weight <= 0.0 {
        continue;
      }
      weight_sum += weight;
      year_sum += weight * f64::from(anchor.year);
      conf_sum += weight * anchor.confidence;
      count += 1;
    }
    if weight_sum.is_nan() || weight_sum <= 0.0 {
      return None;
    }

    let saturation = self.config.neighbor_saturation.max(1) as f64;
    let scale = (count as f64 / saturation).min(1.0);
    let confidence = (conf_sum / weight_sum * scale).min(self.config.neighbor_confidence_cap);
    Some(Guess {
      signal: HeuristicSignal::NeighborInterpolation,
      year: (year_sum / weight_sum).round() as i32,
      confidence,
      reason: format!("{count} neighbor(s) within {radius:.0} m"),
    })
  }

  /// Every signal that fires, in signal order.
  pub fn guesses(&self, building: &Building) -> Vec<Guess> {
    [
      self.center_distance(building),
      self.type_size(building),
      self.neighbor_interpolation(building),
    ]
    .into_iter()
    .flatten()
    .collect()
  }

  pub fn estimate(&self, building: &Building) -> Estimate {
    let guesses = self.guesses(building);
    for guess in &guesses {
      debug!(
        building_id = %building.building_id,
        signal = %guess.signal,
        year = guess.year,
        confidence = guess.confidence,
        reason = %guess.reason,
        "heuristic guess"
      );
    }
    combine(&building.building_id, &guesses, self.config)
  }
}

/// Confidence-weighted blend of `guesses`, capped at `combined_cap`. With no
/// guesses the configured fallback is returned.
pub fn combine(building_id: &str, guesses: &[Guess], config: &HeuristicConfig) -> Estimate {
  if guesses.is_empty() {
    return Estimate {
      building_id: building_id.to_owned(),
      start_year:  Some(config.fallback_year),
      end_year:    None,
      confidence:  config.fallback_confidence,
      method:      EstimateMethod::Default,
    };
  }

  let weight: f64 = guesses.iter().map(|g| g.confidence).sum();
  let year = if weight > 0.0 {
    guesses.iter().map(|g| f64::from(g.year) * g.confidence).sum::<f64>() / weight
  } else {
    guesses.iter().map(|g| f64::from(g.year)).sum::<f64>() / guesses.len() as f64
  };
  let best = guesses.iter().map(|g| g.confidence).fold(0.0, f64::max);

  let mut signals: Vec<HeuristicSignal> = guesses.iter().map(|g| g.signal).collect();
  signals.sort();
  signals.dedup();

  Estimate {
    building_id: building_id.to_owned(),
    start_year:  Some(year.round() as i32),
    end_year:    None,
    confidence:  best.min(config.combined_cap),
    method:      EstimateMethod::Heuristic(signals),
  }
}

// ─── Stage driver ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeuristicSummary {
  pub buildings: usize,
  pub targets:   usize,
  pub anchors:   usize,
  pub estimated: usize,
  pub defaulted: usize,
}

impl fmt::Display for HeuristicSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} of {} building(s) needed a heuristic estimate ({} neighbor anchor(s)): \
       {} estimated, {} fell back to the default",
      self.targets, self.buildings, self.anchors, self.estimated, self.defaulted,
    )
  }
}

/// Whether a building's current estimate should be replaced heuristically.
fn needs_heuristic(estimate: Option<&Estimate>, config: &HeuristicConfig) -> bool {
  match estimate {
    None => true,
    Some(e) if !e.method.is_evidence_based() => true,
    Some(e) => e.confidence < config.min_useful_confidence,
  }
}

/// Estimate every building without a useful evidence-based estimate. The
/// neighbor snapshot is taken before any write, and all results are written
/// in one transaction.
pub async fn estimate_dates<S>(store: &S, config: &FusionConfig) -> Result<HeuristicSummary>
where
  S: BuildingStore,
{
  config.validate()?;
  let buildings = store.list_buildings(None).await.map_err(Error::store)?;
  let estimates: HashMap<String, Estimate> = store
    .list_estimates()
    .await
    .map_err(Error::store)?
    .into_iter()
    .map(|e| (e.building_id.clone(), e))
    .collect();

  let estimator = HeuristicEstimator::new(
    &config.heuristic,
    LocalFrame::new(config.reference),
    &buildings,
    &estimates,
  );

  let mut summary = HeuristicSummary {
    buildings: buildings.len(),
    anchors: estimator.anchor_count(),
    ..HeuristicSummary::default()
  };
  let results: Vec<Estimate> = buildings
    .iter()
    .filter(|b| needs_heuristic(estimates.get(&b.building_id), &config.heuristic))
    .map(|b| estimator.estimate(b))
    .collect();

  summary.targets = results.len();
  summary.defaulted = results
    .iter()
    .filter(|e| e.method == EstimateMethod::Default)
    .count();
  summary.estimated = results.len() - summary.defaulted;

  store.replace_estimates(results).await.map_err(Error::store)?;
  info!(
    targets = summary.targets,
    estimated = summary.estimated,
    defaulted = summary.defaulted,
    "heuristic estimates written"
  );
  Ok(summary)
}
