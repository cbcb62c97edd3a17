//! [`SqliteStore`] — the SQLite implementation of [`BuildingStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use bygg_core::{
  building::{Building, NewBuilding},
  estimate::Estimate,
  evidence::{Evidence, NewEvidence},
  store::BuildingStore,
  view::{BuildingView, StoreStats},
};

use crate::{
  encode::{
    BUILDING_COLUMNS, EVIDENCE_COLUMNS, EvidenceParams, RawBuilding, RawEvidence,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A bygg entity store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Stamp inputs with ids and timestamps, rejecting any that break the
  /// evidence invariants.
  fn stamp(inputs: Vec<NewEvidence>) -> Result<Vec<Evidence>> {
    let recorded_at = Utc::now();
    inputs
      .into_iter()
      .map(|input| {
        input.validate()?;
        Ok(Evidence {
          evidence_id:       Uuid::new_v4(),
          building_id:       input.building_id,
          source_id:         input.source_id,
          evidence_type:     input.evidence_type,
          exact_year:        input.exact_year,
          end_year:          input.end_year,
          min_year:          input.min_year,
          max_year:          input.max_year,
          confidence:        input.confidence,
          confidence_reason: input.confidence_reason,
          method:            input.method,
          source_local_id:   input.source_local_id,
          raw_properties:    input.raw_properties,
          recorded_at,
        })
      })
      .collect()
  }

  async fn query_evidence(&self, building_id: Option<String>) -> Result<Vec<Evidence>> {
    let raws: Vec<RawEvidence> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(id) = building_id {
          let mut stmt = conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence
             WHERE building_id = ?1 ORDER BY rowid"
          ))?;
          stmt
            .query_map(rusqlite::params![id], RawEvidence::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence ORDER BY rowid"
          ))?;
          stmt
            .query_map([], RawEvidence::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvidence::into_evidence).collect()
  }

  async fn query_building(&self, building_id: &str) -> Result<Option<RawBuilding>> {
    let id = building_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE building_id = ?1"),
            rusqlite::params![id],
            RawBuilding::from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(raw)
  }
}

/// Rows of a `SELECT key, COUNT(*) ... GROUP BY key` query.
fn grouped_counts(
  conn: &rusqlite::Connection,
  sql: &str,
) -> rusqlite::Result<BTreeMap<String, usize>> {
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
    })?
    .collect()
}

// ─── BuildingStore impl ──────────────────────────────────────────────────────

impl BuildingStore for SqliteStore {
  type Error = Error;

  // ── Buildings ─────────────────────────────────────────────────────────────

  async fn upsert_building(&self, input: NewBuilding) -> Result<Building> {
    let building = Building::from_new(input);

    let id_str        = building.building_id.clone();
    let geometry_str  = building.footprint.to_geojson_string()?;
    let source        = building.geometry_source.clone();
    let centroid_lon  = building.centroid.map(|c| c.x());
    let centroid_lat  = building.centroid.map(|c| c.y());
    let building_type = building.building_type.clone();
    let name          = building.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO buildings (
             building_id, geometry, geometry_source,
             centroid_lon, centroid_lat, building_type, name
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (building_id) DO UPDATE SET
             geometry        = excluded.geometry,
             geometry_source = excluded.geometry_source,
             centroid_lon    = excluded.centroid_lon,
             centroid_lat    = excluded.centroid_lat,
             building_type   = excluded.building_type,
             name            = excluded.name",
          rusqlite::params![
            id_str,
            geometry_str,
            source,
            centroid_lon,
            centroid_lat,
            building_type,
            name,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(building)
  }

  async fn get_building(&self, building_id: &str) -> Result<Option<Building>> {
    self
      .query_building(building_id)
      .await?
      .map(RawBuilding::into_building)
      .transpose()
  }

  async fn list_buildings(&self, geometry_source: Option<&str>) -> Result<Vec<Building>> {
    let source = geometry_source.map(str::to_owned);

    let raws: Vec<RawBuilding> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(src) = source {
          let mut stmt = conn.prepare(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings
             WHERE geometry_source = ?1 ORDER BY building_id"
          ))?;
          stmt
            .query_map(rusqlite::params![src], RawBuilding::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings ORDER BY building_id"
          ))?;
          stmt
            .query_map([], RawBuilding::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBuilding::into_building).collect()
  }

  // ── Evidence — append-only writes ─────────────────────────────────────────

  async fn add_evidence(&self, input: NewEvidence) -> Result<Evidence> {
    let evidence = Self::stamp(vec![input])?.remove(0);
    let params = EvidenceParams::encode(&evidence)?;

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM buildings WHERE building_id = ?1",
            rusqlite::params![params.building_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }
        params.insert(conn)?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::BuildingNotFound(evidence.building_id));
    }
    Ok(evidence)
  }

  async fn add_evidence_batch(&self, inputs: Vec<NewEvidence>) -> Result<Vec<Evidence>> {
    if inputs.is_empty() {
      return Ok(Vec::new());
    }
    let evidence = Self::stamp(inputs)?;
    let params = evidence
      .iter()
      .map(EvidenceParams::encode)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for p in &params {
          p.insert(&tx)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(evidence)
  }

  // ── Evidence — reads ──────────────────────────────────────────────────────

  async fn get_evidence_for_building(&self, building_id: &str) -> Result<Vec<Evidence>> {
    self.query_evidence(Some(building_id.to_owned())).await
  }

  async fn list_evidence(&self) -> Result<Vec<Evidence>> {
    self.query_evidence(None).await
  }

  async fn list_buildings_with_evidence(&self) -> Result<Vec<String>> {
    let ids: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT building_id FROM evidence ORDER BY building_id",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids)
  }

  // ── Estimates ─────────────────────────────────────────────────────────────

  async fn replace_estimates(&self, estimates: Vec<Estimate>) -> Result<usize> {
    let rows: Vec<(String, Option<i32>, Option<i32>, f64, String)> = estimates
      .into_iter()
      .map(|e| (e.building_id, e.start_year, e.end_year, e.confidence, e.method.label()))
      .collect();

    let written: usize = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        {
          let mut stmt = tx.prepare_cached(
            "UPDATE buildings SET
               est_start_year = ?2,
               est_end_year   = ?3,
               est_confidence = ?4,
               est_method     = ?5
             WHERE building_id = ?1",
          )?;
          for (id, start, end, confidence, method) in &rows {
            written += stmt.execute(rusqlite::params![id, start, end, confidence, method])?;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;

    Ok(written)
  }

  async fn get_estimate(&self, building_id: &str) -> Result<Option<Estimate>> {
    match self.query_building(building_id).await? {
      Some(raw) => raw.estimate(),
      None => Ok(None),
    }
  }

  async fn list_estimates(&self) -> Result<Vec<Estimate>> {
    let raws: Vec<RawBuilding> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BUILDING_COLUMNS} FROM buildings
           WHERE est_method IS NOT NULL ORDER BY building_id"
        ))?;
        let rows = stmt
          .query_map([], RawBuilding::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut estimates = Vec::with_capacity(raws.len());
    for raw in &raws {
      estimates.extend(raw.estimate()?);
    }
    Ok(estimates)
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  async fn materialize(&self, building_id: &str) -> Result<Option<BuildingView>> {
    let raw = match self.query_building(building_id).await? {
      Some(r) => r,
      None    => return Ok(None),
    };

    let estimate = raw.estimate()?;
    let building = raw.into_building()?;
    let evidence = self.get_evidence_for_building(building_id).await?;

    Ok(Some(BuildingView { building, evidence, estimate }))
  }

  async fn get_stats(&self) -> Result<StoreStats> {
    let stats = self
      .conn
      .call(|conn| {
        let conn: &rusqlite::Connection = conn;
        let count = |sql: &str| -> rusqlite::Result<usize> {
          conn.query_row(sql, [], |row| row.get::<_, i64>(0)).map(|n| n as usize)
        };
        Ok(StoreStats {
          buildings:           count("SELECT COUNT(*) FROM buildings")?,
          buildings_by_source: grouped_counts(
            conn,
            "SELECT geometry_source, COUNT(*) FROM buildings GROUP BY geometry_source",
          )?,
          evidence:            count("SELECT COUNT(*) FROM evidence")?,
          evidence_by_type:    grouped_counts(
            conn,
            "SELECT evidence_type, COUNT(*) FROM evidence GROUP BY evidence_type",
          )?,
          propagated_evidence: count(
            "SELECT COUNT(*) FROM evidence WHERE method = 'propagated'",
          )?,
          estimates_by_method: grouped_counts(
            conn,
            "SELECT est_method, COUNT(*) FROM buildings
             WHERE est_method IS NOT NULL GROUP BY est_method",
          )?,
        })
      })
      .await?;
    Ok(stats)
  }
}
