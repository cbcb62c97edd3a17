//! Read models assembled by the store: never persisted as such.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{building::Building, estimate::Estimate, evidence::Evidence};

/// Everything the store knows about one building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingView {
  pub building: Building,
  /// All evidence rows, in insertion order.
  pub evidence: Vec<Evidence>,
  pub estimate: Option<Estimate>,
}

/// Aggregate counts for observability; not consulted by any algorithm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
  pub buildings:           usize,
  pub buildings_by_source: BTreeMap<String, usize>,
  pub evidence:            usize,
  pub evidence_by_type:    BTreeMap<String, usize>,
  pub propagated_evidence: usize,
  /// Keyed by estimate method label.
  pub estimates_by_method: BTreeMap<String, usize>,
}
