//! The `BuildingStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `bygg-store-sqlite`).
//! The fusion stages depend on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  building::{Building, NewBuilding},
  estimate::Estimate,
  evidence::{Evidence, NewEvidence},
  view::{BuildingView, StoreStats},
};

/// Abstraction over the persistent entity store.
///
/// Buildings are upserted by id. Evidence is append-only: no method mutates
/// or removes an evidence row. Estimates are replaced wholesale.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime.
pub trait BuildingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Buildings ─────────────────────────────────────────────────────────

  /// Insert a building or overwrite the geometry, type, and name of the
  /// existing row with the same id. The centroid is recomputed; any stored
  /// estimate is left untouched.
  fn upsert_building(
    &self,
    input: NewBuilding,
  ) -> impl Future<Output = Result<Building, Self::Error>> + Send + '_;

  /// Retrieve a building by id. Returns `None` if not found.
  fn get_building<'a>(
    &'a self,
    building_id: &'a str,
  ) -> impl Future<Output = Result<Option<Building>, Self::Error>> + Send + 'a;

  /// List buildings ordered by id, optionally restricted to one
  /// `geometry_source`.
  fn list_buildings<'a>(
    &'a self,
    geometry_source: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Building>, Self::Error>> + Send + 'a;

  // ── Evidence — append-only writes ─────────────────────────────────────

  /// Append one evidence row. Does not check for an existing row from the
  /// same source; callers own that rule.
  fn add_evidence(
    &self,
    input: NewEvidence,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  /// Append many evidence rows in a single transaction.
  fn add_evidence_batch(
    &self,
    inputs: Vec<NewEvidence>,
  ) -> impl Future<Output = Result<Vec<Evidence>, Self::Error>> + Send + '_;

  // ── Evidence — reads ──────────────────────────────────────────────────

  /// All evidence for one building, in insertion order.
  fn get_evidence_for_building<'a>(
    &'a self,
    building_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Evidence>, Self::Error>> + Send + 'a;

  /// Every evidence row in the store, in insertion order.
  fn list_evidence(
    &self,
  ) -> impl Future<Output = Result<Vec<Evidence>, Self::Error>> + Send + '_;

  /// Ids of buildings with at least one evidence row, ordered by id.
  fn list_buildings_with_evidence(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Estimates ─────────────────────────────────────────────────────────

  /// Overwrite the stored estimate of every listed building in a single
  /// transaction. Returns the number of rows written.
  fn replace_estimates(
    &self,
    estimates: Vec<Estimate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn get_estimate<'a>(
    &'a self,
    building_id: &'a str,
  ) -> impl Future<Output = Result<Option<Estimate>, Self::Error>> + Send + 'a;

  /// All stored estimates, ordered by building id.
  fn list_estimates(
    &self,
  ) -> impl Future<Output = Result<Vec<Estimate>, Self::Error>> + Send + '_;

  // ── Views ─────────────────────────────────────────────────────────────

  /// Assemble a [`BuildingView`]. Returns `None` if the building does not
  /// exist.
  fn materialize<'a>(
    &'a self,
    building_id: &'a str,
  ) -> impl Future<Output = Result<Option<BuildingView>, Self::Error>> + Send + 'a;

  fn get_stats(
    &self,
  ) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;
}
