//! Building — one source's view of a physical structure.
//!
//! A building row is keyed by `<source>:<source_local_id>`. It is the only
//! entity the engine updates in place: re-importing the same source record
//! replaces geometry, type, and name, and recomputes the centroid.

use geo::{Area, Coord, LineString, Point, Polygon};
use geojson::Value;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Compose the stable building id for a source record.
pub fn building_id(source_id: &str, source_local_id: &str) -> String {
  format!("{source_id}:{source_local_id}")
}

// ─── Footprint ───────────────────────────────────────────────────────────────

/// The shape a source reports for a building, in WGS84 lon/lat degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "shape", rename_all = "snake_case")]
pub enum Footprint {
  Point(Point<f64>),
  Polygon(Polygon<f64>),
}

impl Footprint {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Point(_) => "point",
      Self::Polygon(_) => "polygon",
    }
  }

  /// Mean of the exterior ring's vertices; the closing vertex is counted
  /// once. An approximation, not a geodesic centroid.
  pub fn centroid(&self) -> Option<Point<f64>> {
    match self {
      Self::Point(p) => is_finite(p.0).then_some(*p),
      Self::Polygon(poly) => {
        let ring = poly.exterior().0.as_slice();
        let open = match ring.split_last() {
          Some((last, rest)) if rest.first() == Some(last) => rest,
          _ => ring,
        };
        if open.is_empty() {
          return None;
        }
        let n = open.len() as f64;
        let (sx, sy) = open
          .iter()
          .fold((0.0, 0.0), |(x, y), c| (x + c.x, y + c.y));
        Some(Point::new(sx / n, sy / n))
      }
    }
  }

  /// GeoJSON geometry object for this footprint.
  pub fn to_geojson(&self) -> geojson::Geometry {
    let value = match self {
      Self::Point(p) => Value::Point(vec![p.x(), p.y()]),
      Self::Polygon(poly) => Value::Polygon(
        std::iter::once(poly.exterior())
          .chain(poly.interiors())
          .map(ring_positions)
          .collect(),
      ),
    };
    geojson::Geometry::new(value)
  }

  pub fn to_geojson_string(&self) -> Result<String> {
    Ok(serde_json::to_string(&self.to_geojson())?)
  }

  pub fn from_geojson_str(s: &str) -> Result<Self> {
    let geometry: geojson::Geometry = serde_json::from_str(s)?;
    Self::try_from(geometry)
  }
}

impl TryFrom<geojson::Geometry> for Footprint {
  type Error = Error;

  /// Points and polygons map directly. A multipolygon is reduced to its
  /// largest member; every other geometry type is rejected.
  fn try_from(geometry: geojson::Geometry) -> Result<Self> {
    match geometry.value {
      Value::Point(pos) => Ok(Self::Point(Point::from(position(&pos)?))),
      Value::Polygon(rings) => polygon(&rings).map(Self::Polygon),
      Value::MultiPolygon(members) => {
        let mut largest: Option<(f64, Polygon<f64>)> = None;
        for rings in &members {
          let poly = polygon(rings)?;
          let area = poly.unsigned_area();
          if largest.as_ref().is_none_or(|(best, _)| area > *best) {
            largest = Some((area, poly));
          }
        }
        largest
          .map(|(_, poly)| Self::Polygon(poly))
          .ok_or_else(|| Error::InvalidGeometry("empty multipolygon".into()))
      }
      Value::MultiPoint(_) => Err(Error::UnsupportedGeometry("MultiPoint".into())),
      Value::LineString(_) => Err(Error::UnsupportedGeometry("LineString".into())),
      Value::MultiLineString(_) => {
        Err(Error::UnsupportedGeometry("MultiLineString".into()))
      }
      Value::GeometryCollection(_) => {
        Err(Error::UnsupportedGeometry("GeometryCollection".into()))
      }
    }
  }
}

fn is_finite(c: Coord<f64>) -> bool { c.x.is_finite() && c.y.is_finite() }

fn position(pos: &[f64]) -> Result<Coord<f64>> {
  match pos {
    [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
    _ => Err(Error::InvalidGeometry(format!("bad position {pos:?}"))),
  }
}

fn ring(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
  let coords = positions
    .iter()
    .map(|p| position(p))
    .collect::<Result<Vec<_>>>()?;
  let distinct = match coords.split_last() {
    Some((last, rest)) if rest.first() == Some(last) => rest.len(),
    _ => coords.len(),
  };
  if distinct < 3 {
    return Err(Error::InvalidGeometry(format!(
      "ring needs at least 3 distinct vertices, got {distinct}"
    )));
  }
  Ok(LineString::from(coords))
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
  let Some((exterior, interiors)) = rings.split_first() else {
    return Err(Error::InvalidGeometry("polygon without rings".into()));
  };
  Ok(Polygon::new(
    ring(exterior)?,
    interiors.iter().map(|r| ring(r)).collect::<Result<_>>()?,
  ))
}

fn ring_positions(line: &LineString<f64>) -> Vec<Vec<f64>> {
  line.coords().map(|c| vec![c.x, c.y]).collect()
}

// ─── Building ────────────────────────────────────────────────────────────────

/// A physical structure as known from one source's geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
  /// `<source>:<source_local_id>`; stable across re-imports.
  pub building_id:     String,
  pub footprint:       Footprint,
  /// The source that contributed this shape.
  pub geometry_source: String,
  /// Derived from `footprint` on every write.
  pub centroid:        Option<Point<f64>>,
  pub building_type:   Option<String>,
  pub name:            Option<String>,
}

impl Building {
  /// Materialise a building from its input, deriving the centroid.
  pub fn from_new(input: NewBuilding) -> Self {
    let centroid = input.footprint.centroid();
    Self {
      building_id: input.building_id,
      footprint: input.footprint,
      geometry_source: input.geometry_source,
      centroid,
      building_type: input.building_type,
      name: input.name,
    }
  }
}

/// Input to [`crate::store::BuildingStore::upsert_building`].
#[derive(Debug, Clone)]
pub struct NewBuilding {
  pub building_id:     String,
  pub footprint:       Footprint,
  pub geometry_source: String,
  pub building_type:   Option<String>,
  pub name:            Option<String>,
}

impl NewBuilding {
  /// Building for a source record, with type and name unset.
  pub fn new(source_id: &str, source_local_id: &str, footprint: Footprint) -> Self {
    Self {
      building_id: building_id(source_id, source_local_id),
      footprint,
      geometry_source: source_id.to_owned(),
      building_type: None,
      name: None,
    }
  }
}
