//! SQL schema for the bygg SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per (source, source_local_id). Re-imports update geometry, type,
-- and name in place. The est_* columns hold the current estimate and are
-- only ever written wholesale by replace_estimates.
CREATE TABLE IF NOT EXISTS buildings (
    building_id     TEXT PRIMARY KEY,  -- '<source>:<source_local_id>'
    geometry        TEXT NOT NULL,     -- GeoJSON geometry object
    geometry_source TEXT NOT NULL,
    centroid_lon    REAL,
    centroid_lat    REAL,
    building_type   TEXT,
    name            TEXT,
    est_start_year  INTEGER,
    est_end_year    INTEGER,
    est_confidence  REAL,
    est_method      TEXT               -- NULL until an estimate is written
);

-- Evidence is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS evidence (
    evidence_id       TEXT PRIMARY KEY,
    building_id       TEXT NOT NULL REFERENCES buildings(building_id),
    source_id         TEXT NOT NULL,
    evidence_type     TEXT NOT NULL,   -- 'exact' | 'presence'
    min_year          INTEGER,
    max_year          INTEGER,
    exact_year        INTEGER,
    end_year          INTEGER,
    confidence        REAL NOT NULL CHECK (confidence BETWEEN 0.0 AND 1.0),
    confidence_reason TEXT,
    method            TEXT NOT NULL,
    source_local_id   TEXT,
    raw_properties    TEXT,            -- JSON object or NULL
    recorded_at       TEXT NOT NULL    -- ISO 8601 UTC; store-assigned
);

CREATE INDEX IF NOT EXISTS buildings_source_idx  ON buildings(geometry_source);
CREATE INDEX IF NOT EXISTS evidence_building_idx ON evidence(building_id);
CREATE INDEX IF NOT EXISTS evidence_source_idx   ON evidence(source_id);

PRAGMA user_version = 1;
";
