//! Spatial correspondence between the buildings of two sources.
//!
//! Every building of the first set is paired with at most one building of
//! the second. Pairing prefers footprint overlap and falls back to centroid
//! distance. A target may be claimed by several source buildings.

use bygg_core::building::{Building, Footprint};
use geo::{Area, BooleanOps, BoundingRect, Polygon};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  config::{MatchStrategy, MatcherConfig},
  frame::LocalFrame,
  index::ShapeIndex,
};

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
  Overlap,
  Distance,
}

/// A correspondence between two buildings from different sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
  pub building_id_1: String,
  pub building_id_2: String,
  pub source_1:      String,
  pub source_2:      String,
  /// Intersection area over the smaller footprint area, in `[0, 1]`.
  pub overlap_ratio: f64,
  /// Centroid distance in meters.
  pub distance_m:    f64,
  pub kind:          MatchKind,
}

/// Result of matching one pair of building sets.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
  pub matches:   Vec<Match>,
  /// Source buildings with no acceptable partner.
  pub unmatched: usize,
  /// Buildings whose geometry could not be used.
  pub skipped:   usize,
}

impl MatchOutcome {
  pub fn count(&self, kind: MatchKind) -> usize {
    self.matches.iter().filter(|m| m.kind == kind).count()
  }
}

/// Ratios this close to `1.0` are full containment. The boolean ops snap
/// coordinates to a grid, so identical shapes come back a hair under one.
const FULL_OVERLAP_EPSILON: f64 = 1e-6;

/// Intersection area divided by the smaller of the two areas, clamped to
/// `[0, 1]`. Identical shapes give exactly `1.0`; degenerate inputs give
/// `0.0`.
pub fn overlap_ratio(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
  let smaller = a.unsigned_area().min(b.unsigned_area());
  if !smaller.is_finite() || smaller <= 0.0 {
    return 0.0;
  }
  if a == b {
    return 1.0;
  }
  let ratio = a.intersection(b).unsigned_area() / smaller;
  if !ratio.is_finite() {
    return 0.0;
  }
  if 1.0 - ratio < FULL_OVERLAP_EPSILON {
    return 1.0;
  }
  ratio.clamp(0.0, 1.0)
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Candidate {
  slot:     usize,
  overlap:  f64,
  distance: f64,
}

/// A building projected into the local frame.
struct Prepared<'a> {
  building: &'a Building,
  shape:    Option<Polygon<f64>>,
}

impl Prepared<'_> {
  fn is_polygon(&self) -> bool {
    matches!(self.building.footprint, Footprint::Polygon(_))
  }
}

pub struct SpatialMatcher {
  config: MatcherConfig,
  frame:  LocalFrame,
}

impl SpatialMatcher {
  pub fn new(config: MatcherConfig, frame: LocalFrame) -> Self {
    Self { config, frame }
  }

  /// Match `sources` against `targets`. Sources are visited in id order so
  /// the outcome is deterministic.
  ///
  /// Overlap is only measured between two polygon footprints. A point's
  /// buffer widens the candidate search, but a pair involving a point is
  /// always decided by centroid distance.
  pub fn match_buildings(&self, sources: &[Building], targets: &[Building]) -> MatchOutcome {
    let mut ordered: Vec<&Building> = sources.iter().collect();
    ordered.sort_by(|a, b| a.building_id.cmp(&b.building_id));

    match self.config.strategy {
      MatchStrategy::Overlap => self.match_by_overlap(&ordered, targets),
      MatchStrategy::Centroid => self.match_by_centroid(&ordered, targets),
    }
  }

  fn match_by_overlap(&self, sources: &[&Building], targets: &[Building]) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    let prepared: Vec<Prepared<'_>> = targets
      .iter()
      .map(|building| Prepared {
        building,
        shape: self.frame.search_shape(&building.footprint, self.config.point_buffer_m),
      })
      .collect();
    let index = ShapeIndex::bulk_load(
      prepared
        .iter()
        .enumerate()
        .filter_map(|(slot, p)| p.shape.as_ref().map(|s| (slot, s))),
    );
    let invalid_targets = prepared.len() - index.len();
    if invalid_targets > 0 {
      warn!(count = invalid_targets, "targets with unusable geometry left out of the index");
      outcome.skipped += invalid_targets;
    }

    for building in sources {
      let source = Prepared {
        building,
        shape: self.frame.search_shape(&building.footprint, self.config.point_buffer_m),
      };
      let Some(shape) = source.shape.as_ref() else {
        debug!(building_id = %building.building_id, "unusable geometry, skipping");
        outcome.skipped += 1;
        continue;
      };
      let Some(rect) = shape.bounding_rect() else {
        outcome.skipped += 1;
        continue;
      };

      let candidates: Vec<Candidate> = index
        .candidates(rect, self.config.max_distance_m)
        .into_iter()
        .filter(|&slot| prepared[slot].building.building_id != building.building_id)
        .map(|slot| {
          let target = &prepared[slot];
          let overlap = match (&target.shape, source.is_polygon() && target.is_polygon()) {
            (Some(target_shape), true) => overlap_ratio(shape, target_shape),
            _ => 0.0,
          };
          Candidate {
            slot,
            overlap,
            distance: self.frame.distance_m(building.centroid, target.building.centroid),
          }
        })
        .collect();

      match self.select(&candidates, targets) {
        Some((candidate, kind)) => {
          outcome
            .matches
            .push(self.to_match(building, &targets[candidate.slot], candidate, kind));
        }
        None => outcome.unmatched += 1,
      }
    }

    outcome
  }

  /// Degraded mode: nearest centroid within the distance threshold.
  fn match_by_centroid(&self, sources: &[&Building], targets: &[Building]) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    let unplaced_targets = targets.iter().filter(|t| t.centroid.is_none()).count();
    if unplaced_targets > 0 {
      warn!(count = unplaced_targets, "targets without a centroid cannot be matched");
      outcome.skipped += unplaced_targets;
    }

    for building in sources {
      if building.centroid.is_none() {
        outcome.skipped += 1;
        continue;
      }
      let candidates: Vec<Candidate> = targets
        .iter()
        .enumerate()
        .filter(|(_, t)| t.centroid.is_some() && t.building_id != building.building_id)
        .map(|(slot, t)| Candidate {
          slot,
          overlap: 0.0,
          distance: self.frame.distance_m(building.centroid, t.centroid),
        })
        .collect();

      match self.select(&candidates, targets) {
        Some((candidate, kind)) => {
          outcome
            .matches
            .push(self.to_match(building, &targets[candidate.slot], candidate, kind));
        }
        None => outcome.unmatched += 1,
      }
    }

    outcome
  }

  /// Best overlap at or above the threshold, else nearest centroid within
  /// the distance threshold. Ties fall to the smaller distance, then the
  /// smaller building id.
  fn select(&self, candidates: &[Candidate], targets: &[Building]) -> Option<(Candidate, MatchKind)> {
    let by_id = |a: &Candidate, b: &Candidate| {
      targets[a.slot].building_id.cmp(&targets[b.slot].building_id)
    };

    let best_overlap = candidates
      .iter()
      .filter(|c| c.overlap > 0.0 && c.overlap >= self.config.min_overlap)
      .min_by(|a, b| {
        b.overlap
          .total_cmp(&a.overlap)
          .then(a.distance.total_cmp(&b.distance))
          .then_with(|| by_id(a, b))
      });
    if let Some(c) = best_overlap {
      return Some((*c, MatchKind::Overlap));
    }

    candidates
      .iter()
      .filter(|c| c.distance.is_finite() && c.distance < self.config.max_distance_m)
      .min_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| by_id(a, b)))
      .map(|c| (*c, MatchKind::Distance))
  }

  fn to_match(&self, a: &Building, b: &Building, c: Candidate, kind: MatchKind) -> Match {
    debug!(
      source = %a.building_id,
      target = %b.building_id,
      ?kind,
      overlap = c.overlap,
      distance_m = c.distance,
      "matched"
    );
    Match {
      building_id_1: a.building_id.clone(),
      building_id_2: b.building_id.clone(),
      source_1:      a.geometry_source.clone(),
      source_2:      b.geometry_source.clone(),
      overlap_ratio: c.overlap,
      distance_m:    c.distance,
      kind,
    }
  }
}
