//! The `import` stage: load normalized feature files into the store.
//!
//! Buildings are upserted on every run. A feature's evidence is appended
//! only when its building has no row from that source yet, so importing
//! the same file twice leaves the evidence table unchanged.

use std::{collections::HashSet, fmt, path::PathBuf};

use bygg_core::store::BuildingStore;
use tracing::{info, warn};

use crate::{Error, Result, source::SourceRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
  pub files:     usize,
  pub features:  usize,
  pub buildings: usize,
  /// Evidence rows appended.
  pub evidence:  usize,
  /// Evidence rows not appended because the source was already recorded.
  pub existing:  usize,
  /// Features rejected for missing ids or unusable geometry.
  pub skipped:   usize,
}

impl fmt::Display for ImportSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} file(s), {} feature(s): {} building(s) upserted, {} evidence row(s) added, \
       {} already present, {} feature(s) skipped",
      self.files, self.features, self.buildings, self.evidence, self.existing, self.skipped,
    )
  }
}

/// Import each file in turn. An unreadable or corrupt file aborts the
/// stage; a bad feature is logged and skipped. Each file's evidence is
/// written in one transaction.
pub async fn import_sources<S>(
  store: &S,
  registry: &SourceRegistry,
  paths: &[PathBuf],
) -> Result<ImportSummary>
where
  S: BuildingStore,
{
  let mut summary = ImportSummary::default();

  for path in paths {
    let text = tokio::fs::read_to_string(path)
      .await
      .map_err(|source| Error::Io { path: path.clone(), source })?;
    let features = bygg_geojson::parse_collection(&text)
      .map_err(|source| Error::Input { path: path.clone(), source })?;

    let mut pending = Vec::new();
    let mut claimed: HashSet<(String, String)> = HashSet::new();
    let (before_buildings, before_skipped) = (summary.buildings, summary.skipped);

    for (position, feature) in features.into_iter().enumerate() {
      summary.features += 1;
      let feature = match feature {
        Ok(feature) => feature,
        Err(e) => {
          warn!(path = %path.display(), position, error = %e, "skipping feature");
          summary.skipped += 1;
          continue;
        }
      };

      let building = store
        .upsert_building(feature.to_new_building())
        .await
        .map_err(Error::store)?;
      summary.buildings += 1;

      let Some(evidence) = registry.interpret(&feature) else { continue };
      let key = (building.building_id.clone(), evidence.source_id.clone());
      let recorded = store
        .get_evidence_for_building(&building.building_id)
        .await
        .map_err(Error::store)?
        .iter()
        .any(|e| e.source_id == evidence.source_id);
      if recorded || !claimed.insert(key) {
        summary.existing += 1;
        continue;
      }
      pending.push(evidence);
    }

    let added = store.add_evidence_batch(pending).await.map_err(Error::store)?.len();
    summary.evidence += added;
    summary.files += 1;
    info!(
      path = %path.display(),
      buildings = summary.buildings - before_buildings,
      evidence = added,
      skipped = summary.skipped - before_skipped,
      "imported file"
    );
  }

  Ok(summary)
}
