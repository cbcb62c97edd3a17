//! Fusion stages for the bygg building-date engine.
//!
//! Four stages run against any [`bygg_core::store::BuildingStore`]:
//!
//! 1. [`import_sources`] loads normalized feature files.
//! 2. [`match_sources`] pairs buildings across sources and propagates
//!    evidence along the matches.
//! 3. [`calculate_estimates`] derives an estimate from each building's own
//!    evidence.
//! 4. [`estimate_dates`] fills the remaining gaps heuristically.
//!
//! Each stage reads a snapshot, computes in memory, and writes its results
//! in as few transactions as the store allows. Stages are idempotent.

pub mod config;
pub mod error;
pub mod estimate;
pub mod frame;
pub mod heuristic;
pub mod import;
pub mod index;
pub mod matcher;
pub mod propagate;
pub mod source;

pub use config::FusionConfig;
pub use error::{Error, Result};
pub use estimate::{EstimateSummary, update_all_estimates as calculate_estimates};
pub use heuristic::{HeuristicSummary, estimate_dates};
pub use import::{ImportSummary, import_sources};
pub use propagate::{MatchSummary, SourcePair, match_sources};
pub use source::SourceRegistry;
