//! R-tree indexes over projected geometry.
//!
//! Entries carry a slot into the caller's own vector, so the trees never own
//! building data.

use geo::{BoundingRect, Point, Polygon, Rect};
use rstar::{AABB, RTree, RTreeObject, primitives::GeomWithData};

// ─── Shapes ──────────────────────────────────────────────────────────────────

/// Bounding box of one search shape.
#[derive(Debug, Clone, Copy)]
pub struct IndexedShape {
  pub slot: usize,
  min:      [f64; 2],
  max:      [f64; 2],
}

impl RTreeObject for IndexedShape {
  type Envelope = AABB<[f64; 2]>;

  fn envelope(&self) -> Self::Envelope {
    AABB::from_corners(self.min, self.max)
  }
}

/// Envelope index used to find matching candidates.
pub struct ShapeIndex {
  tree: RTree<IndexedShape>,
}

impl ShapeIndex {
  /// Bulk-load `(slot, shape)` pairs. Shapes without a bounding box are
  /// left out.
  pub fn bulk_load<'a>(shapes: impl IntoIterator<Item = (usize, &'a Polygon<f64>)>) -> Self {
    let entries = shapes
      .into_iter()
      .filter_map(|(slot, shape)| {
        let rect = shape.bounding_rect()?;
        Some(IndexedShape {
          slot,
          min: [rect.min().x, rect.min().y],
          max: [rect.max().x, rect.max().y],
        })
      })
      .collect();
    Self { tree: RTree::bulk_load(entries) }
  }

  /// Slots whose envelope intersects `rect` grown by `margin` on every side.
  pub fn candidates(&self, rect: Rect<f64>, margin: f64) -> Vec<usize> {
    let envelope = AABB::from_corners(
      [rect.min().x - margin, rect.min().y - margin],
      [rect.max().x + margin, rect.max().y + margin],
    );
    let mut slots: Vec<usize> = self
      .tree
      .locate_in_envelope_intersecting(&envelope)
      .map(|entry| entry.slot)
      .collect();
    slots.sort_unstable();
    slots
  }

  pub fn len(&self) -> usize {
    self.tree.size()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

// ─── Points ──────────────────────────────────────────────────────────────────

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Point index used for radius queries around a projected centroid.
pub struct PointIndex {
  tree: RTree<IndexedPoint>,
}

impl PointIndex {
  pub fn bulk_load(points: impl IntoIterator<Item = (usize, Point<f64>)>) -> Self {
    let entries = points
      .into_iter()
      .filter(|(_, p)| p.x().is_finite() && p.y().is_finite())
      .map(|(slot, p)| GeomWithData::new([p.x(), p.y()], slot))
      .collect();
    Self { tree: RTree::bulk_load(entries) }
  }

  /// `(slot, distance)` for every point within `radius` of `center`,
  /// ordered by slot.
  pub fn within(&self, center: Point<f64>, radius: f64) -> Vec<(usize, f64)> {
    let query = [center.x(), center.y()];
    let mut hits: Vec<(usize, f64)> = self
      .tree
      .locate_within_distance(query, radius * radius)
      .map(|entry| {
        let [x, y] = *entry.geom();
        (entry.data, (x - query[0]).hypot(y - query[1]))
      })
      .collect();
    hits.sort_unstable_by_key(|(slot, _)| *slot);
    hits
  }

  pub fn len(&self) -> usize {
    self.tree.size()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
