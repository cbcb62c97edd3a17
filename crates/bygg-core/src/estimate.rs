//! Estimate — the single derived best guess for a building's existence window.
//!
//! Estimates are never patched. Every recomputation replaces the stored row
//! wholesale, so rerunning a stage over unchanged evidence yields identical
//! rows.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result};

// ─── Method ──────────────────────────────────────────────────────────────────

/// One of the fallback heuristics that can contribute to a guess.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HeuristicSignal {
  CenterDistance,
  TypeSize,
  NeighborInterpolation,
}

/// How an estimate was produced. Stored as a single label string:
/// `exact`, `presence`, `none`, `default`, or the `+`-joined names of the
/// heuristics that fired (e.g. `center_distance+type_size`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EstimateMethod {
  /// Taken from the most confident exact evidence.
  Exact,
  /// Bounded by the tightest presence evidence.
  Presence,
  /// Evidence exists but none of it dates the building; awaiting the
  /// heuristic pass.
  Unresolved,
  /// Weighted combination of the listed heuristics, in signal order.
  Heuristic(Vec<HeuristicSignal>),
  /// No heuristic applied; fixed fallback year.
  Default,
}

impl EstimateMethod {
  /// Derived directly from a building's own evidence.
  pub fn is_evidence_based(&self) -> bool {
    matches!(self, Self::Exact | Self::Presence)
  }

  pub fn label(&self) -> String {
    match self {
      Self::Exact => "exact".into(),
      Self::Presence => "presence".into(),
      Self::Unresolved => "none".into(),
      Self::Default => "default".into(),
      Self::Heuristic(signals) => signals
        .iter()
        .map(|s| <&'static str>::from(*s))
        .collect::<Vec<_>>()
        .join("+"),
    }
  }
}

impl fmt::Display for EstimateMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.label())
  }
}

impl FromStr for EstimateMethod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "exact" => Ok(Self::Exact),
      "presence" => Ok(Self::Presence),
      "none" => Ok(Self::Unresolved),
      "default" => Ok(Self::Default),
      "" => Err(Error::UnknownEstimateMethod(s.to_owned())),
      other => other
        .split('+')
        .map(|part| {
          part
            .parse::<HeuristicSignal>()
            .map_err(|_| Error::UnknownEstimateMethod(s.to_owned()))
        })
        .collect::<Result<Vec<_>>>()
        .map(Self::Heuristic),
    }
  }
}

impl From<EstimateMethod> for String {
  fn from(method: EstimateMethod) -> Self { method.label() }
}

impl TryFrom<String> for EstimateMethod {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

// ─── Estimate ────────────────────────────────────────────────────────────────

/// The current best-guess temporal record for a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
  pub building_id: String,
  pub start_year:  Option<i32>,
  pub end_year:    Option<i32>,
  pub confidence:  f64,
  pub method:      EstimateMethod,
}

impl Estimate {
  /// Placeholder for a building whose evidence does not date it.
  pub fn unresolved(building_id: &str) -> Self {
    Self {
      building_id: building_id.to_owned(),
      start_year:  None,
      end_year:    None,
      confidence:  0.0,
      method:      EstimateMethod::Unresolved,
    }
  }
}
