//! Flat-earth projection into a local metric frame.
//!
//! Degrees are scaled to meters around a fixed reference latitude. The error
//! is negligible at city scale, which is all the matcher and the heuristics
//! ever measure.

use bygg_core::building::Footprint;
use geo::{Area, Coord, LineString, MapCoords, Point, Polygon};

use crate::config::ReferencePoint;

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Vertex count of the circle substituted for a point footprint.
pub const BUFFER_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
  origin:      Coord<f64>,
  m_per_deg_x: f64,
  m_per_deg_y: f64,
}

impl LocalFrame {
  pub fn new(reference: ReferencePoint) -> Self {
    Self {
      origin:      Coord { x: reference.lon, y: reference.lat },
      m_per_deg_x: METERS_PER_DEGREE * reference.lat.to_radians().cos(),
      m_per_deg_y: METERS_PER_DEGREE,
    }
  }

  /// Lon/lat to meters east/north of the origin.
  pub fn project(&self, c: Coord<f64>) -> Coord<f64> {
    Coord {
      x: (c.x - self.origin.x) * self.m_per_deg_x,
      y: (c.y - self.origin.y) * self.m_per_deg_y,
    }
  }

  pub fn project_point(&self, p: Point<f64>) -> Point<f64> {
    Point(self.project(p.0))
  }

  /// Distance between two lon/lat positions in meters. Missing or
  /// non-finite positions are infinitely far apart.
  pub fn distance_m(&self, a: Option<Point<f64>>, b: Option<Point<f64>>) -> f64 {
    match (a, b) {
      (Some(a), Some(b)) => {
        let delta = self.project(a.0) - self.project(b.0);
        let d = delta.x.hypot(delta.y);
        if d.is_finite() { d } else { f64::INFINITY }
      }
      _ => f64::INFINITY,
    }
  }

  /// Distance from the frame origin in meters.
  pub fn distance_from_origin_m(&self, p: Point<f64>) -> f64 {
    let c = self.project(p.0);
    c.x.hypot(c.y)
  }

  /// Planar footprint area in square meters. Points have no area.
  pub fn area_m2(&self, footprint: &Footprint) -> f64 {
    match footprint {
      Footprint::Point(_) => 0.0,
      Footprint::Polygon(p) => {
        let area = self.project_polygon(p).unsigned_area();
        if area.is_finite() { area } else { 0.0 }
      }
    }
  }

  pub fn project_polygon(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
    polygon.map_coords(|c| self.project(c))
  }

  /// The shape the matcher works with: the projected polygon, or a circle of
  /// `point_buffer_m` around a point. `None` for degenerate or non-finite
  /// geometry.
  pub fn search_shape(&self, footprint: &Footprint, point_buffer_m: f64) -> Option<Polygon<f64>> {
    let shape = match footprint {
      Footprint::Point(p) => circle(self.project(p.0), point_buffer_m, BUFFER_SEGMENTS),
      Footprint::Polygon(p) => self.project_polygon(p),
    };
    let area = shape.unsigned_area();
    (area.is_finite() && area > 0.0).then_some(shape)
  }
}

/// Regular polygon approximating a circle.
pub fn circle(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
  let ring: Vec<Coord<f64>> = (0..segments)
    .map(|i| {
      let theta = std::f64::consts::TAU * i as f64 / segments as f64;
      Coord {
        x: center.x + radius * theta.cos(),
        y: center.y + radius * theta.sin(),
      }
    })
    .collect();
  Polygon::new(LineString::from(ring), vec![])
}

#[cfg(test)]
mod tests {
  use geo::polygon;

  use super::*;

  fn frame() -> LocalFrame {
    LocalFrame::new(ReferencePoint { lat: 63.4305, lon: 10.3951 })
  }

  #[test]
  fn one_degree_of_latitude_is_111_km() {
    let f = frame();
    let d = f.distance_m(Some(Point::new(10.0, 63.0)), Some(Point::new(10.0, 64.0)));
    assert!((d - 111_000.0).abs() < 1e-6);
  }

  #[test]
  fn longitude_shrinks_with_latitude() {
    let f = frame();
    let d = f.distance_m(Some(Point::new(10.0, 63.0)), Some(Point::new(11.0, 63.0)));
    let expected = 111_000.0 * 63.4305_f64.to_radians().cos();
    assert!((d - expected).abs() < 1e-6);
  }

  #[test]
  fn missing_positions_are_infinitely_far() {
    let f = frame();
    assert_eq!(f.distance_m(None, Some(Point::new(10.0, 63.0))), f64::INFINITY);
    assert_eq!(
      f.distance_m(Some(Point::new(f64::NAN, 63.0)), Some(Point::new(10.0, 63.0))),
      f64::INFINITY
    );
  }

  #[test]
  fn polygon_area_in_square_meters() {
    let f = frame();
    // 0.001° of latitude is 111 m.
    let dx = 0.001 * 111_000.0 / (111_000.0 * 63.4305_f64.to_radians().cos());
    let square = polygon![
      (x: 10.0, y: 63.0),
      (x: 10.0 + dx, y: 63.0),
      (x: 10.0 + dx, y: 63.001),
      (x: 10.0, y: 63.001),
    ];
    let area = f.area_m2(&Footprint::Polygon(square));
    assert!((area - 111.0 * 111.0).abs() < 1e-3, "area = {area}");
    assert_eq!(f.area_m2(&Footprint::Point(Point::new(10.0, 63.0))), 0.0);
  }

  #[test]
  fn point_search_shape_is_a_circle() {
    let f = frame();
    let shape = f
      .search_shape(&Footprint::Point(Point::new(10.3951, 63.4305)), 15.0)
      .unwrap();
    assert_eq!(shape.exterior().0.len(), BUFFER_SEGMENTS + 1);
    let area = shape.unsigned_area();
    let disc = std::f64::consts::PI * 15.0 * 15.0;
    assert!(area < disc && area > disc * 0.98);
  }
}
