use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Coord, InteriorPoint, Intersects, LineString,
    MultiPolygon, Point, Polygon, Rect,
};

use crate::error::{OperationError, Result};
use crate::math::intersect_2d::{collinear_overlap_length, segments_conflict};
use crate::math::polygon_2d::{dedup_ring, ensure_ccw};
use crate::math::{Point2, AREA_TOLERANCE, TOLERANCE};

/// A set of disjoint polygons with holes.
pub type PolygonSet = MultiPolygon<f64>;

/// Boolean set algebra over polygon sets.
///
/// Implementations must be robust for simple input; non-simple input may be
/// rejected with `OperationError::BooleanFailure`.
pub trait PolygonAlgebra {
    /// Computes `a ∪ b`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying kernel fails.
    fn union(&self, a: &PolygonSet, b: &PolygonSet) -> Result<PolygonSet>;

    /// Computes `a ∩ b`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying kernel fails.
    fn intersection(&self, a: &PolygonSet, b: &PolygonSet) -> Result<PolygonSet>;

    /// Computes `a − b`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying kernel fails.
    fn difference(&self, a: &PolygonSet, b: &PolygonSet) -> Result<PolygonSet>;

    /// Returns `true` if no ring of the polygon crosses or overlaps itself.
    fn is_simple(&self, polygon: &Polygon<f64>) -> bool;
}

/// [`PolygonAlgebra`] backed by the `geo` crate's sweep-line Boolean ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoAlgebra;

impl GeoAlgebra {
    fn guarded<F>(op: &'static str, f: F) -> Result<PolygonSet>
    where
        F: FnOnce() -> PolygonSet,
    {
        catch_unwind(AssertUnwindSafe(f))
            .map(drop_slivers)
            .map_err(|_| OperationError::BooleanFailure(format!("{op} panicked")).into())
    }
}

impl PolygonAlgebra for GeoAlgebra {
    fn union(&self, a: &PolygonSet, b: &PolygonSet) -> Result<PolygonSet> {
        if a.0.is_empty() {
            return Ok(b.clone());
        }
        if b.0.is_empty() {
            return Ok(a.clone());
        }
        Self::guarded("union", || a.union(b))
    }

    fn intersection(&self, a: &PolygonSet, b: &PolygonSet) -> Result<PolygonSet> {
        if a.0.is_empty() || b.0.is_empty() || !rects_overlap(a, b) {
            return Ok(MultiPolygon::new(Vec::new()));
        }
        Self::guarded("intersection", || a.intersection(b))
    }

    fn difference(&self, a: &PolygonSet, b: &PolygonSet) -> Result<PolygonSet> {
        if a.0.is_empty() || b.0.is_empty() || !rects_overlap(a, b) {
            return Ok(a.clone());
        }
        Self::guarded("difference", || a.difference(b))
    }

    fn is_simple(&self, polygon: &Polygon<f64>) -> bool {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .all(ring_is_simple)
    }
}

/// Checks every pair of non-adjacent ring segments for crossings.
fn ring_is_simple(ring: &LineString<f64>) -> bool {
    let pts = dedup_ring(&ring_points(ring));
    let n = pts.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let (a0, a1) = (pts[i], pts[(i + 1) % n]);
        for j in i + 1..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let (b0, b1) = (pts[j], pts[(j + 1) % n]);
            if adjacent {
                // Neighbours may only meet at their shared vertex.
                if collinear_overlap_length(&a0, &a1, &b0, &b1) > TOLERANCE
                    && (a1 - a0).dot(&(b1 - b0)) < 0.0
                {
                    return false;
                }
                continue;
            }
            if segments_conflict(&a0, &a1, &b0, &b1) {
                return false;
            }
        }
    }
    true
}

fn rects_overlap(a: &PolygonSet, b: &PolygonSet) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    }
}

/// Removes zero-area polygons produced along shared boundaries.
fn drop_slivers(set: PolygonSet) -> PolygonSet {
    MultiPolygon::new(
        set.0
            .into_iter()
            .filter(|p| p.unsigned_area() > AREA_TOLERANCE)
            .collect(),
    )
}

/// Returns the points of a closed ring without the closing duplicate.
#[must_use]
pub fn ring_points(ring: &LineString<f64>) -> Vec<Point2> {
    let mut pts: Vec<Point2> = ring.coords().map(|c| Point2::new(c.x, c.y)).collect();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

/// Builds a polygon from an outer ring, oriented counter-clockwise.
#[must_use]
pub fn polygon_from_ring(points: &[Point2]) -> Polygon<f64> {
    let ring: Vec<Coord<f64>> = ensure_ccw(&dedup_ring(points))
        .into_iter()
        .map(|p| Coord { x: p.x, y: p.y })
        .collect();
    Polygon::new(LineString::new(ring), Vec::new())
}

/// Wraps a single polygon in a set.
#[must_use]
pub fn to_set(polygon: &Polygon<f64>) -> PolygonSet {
    MultiPolygon::new(vec![polygon.clone()])
}

/// Returns `true` if the set covers no area.
#[must_use]
pub fn is_negligible(set: &PolygonSet) -> bool {
    set.unsigned_area() <= AREA_TOLERANCE
}

/// Translates every coordinate of a polygon by `(dx, dy)`.
#[must_use]
pub fn translate_polygon(polygon: &Polygon<f64>, dx: f64, dy: f64) -> Polygon<f64> {
    let shift = |ring: &LineString<f64>| {
        LineString::new(
            ring.coords()
                .map(|c| Coord {
                    x: c.x + dx,
                    y: c.y + dy,
                })
                .collect(),
        )
    };
    Polygon::new(
        shift(polygon.exterior()),
        polygon.interiors().iter().map(shift).collect(),
    )
}

/// Picks a point inside the polygon, preferring its centroid.
#[must_use]
pub fn representative_point(polygon: &Polygon<f64>) -> Option<Point<f64>> {
    polygon
        .centroid()
        .filter(|c| polygon.intersects(c))
        .or_else(|| polygon.interior_point())
}

/// Smallest rectangle containing both inputs.
#[must_use]
pub fn merge_rects(a: Option<Rect<f64>>, b: Option<Rect<f64>>) -> Option<Rect<f64>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Rect::new(
            Coord {
                x: a.min().x.min(b.min().x),
                y: a.min().y.min(b.min().y),
            },
            Coord {
                x: a.max().x.max(b.max().x),
                y: a.max().y.max(b.max().y),
            },
        )),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> PolygonSet {
        to_set(&polygon_from_ring(&[
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]))
    }

    #[test]
    fn overlapping_squares() {
        let algebra = GeoAlgebra;
        let a = rect(0.0, 0.0, 2.0, 1.0);
        let b = rect(1.0, 0.0, 3.0, 1.0);
        assert_relative_eq!(algebra.union(&a, &b).unwrap().unsigned_area(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(
            algebra.intersection(&a, &b).unwrap().unsigned_area(),
            1.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            algebra.difference(&a, &b).unwrap().unsigned_area(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn touching_squares_have_negligible_intersection() {
        let algebra = GeoAlgebra;
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let b = rect(1.0, 0.0, 2.0, 1.0);
        assert!(is_negligible(&algebra.intersection(&a, &b).unwrap()));
    }

    #[test]
    fn disjoint_difference_is_identity() {
        let algebra = GeoAlgebra;
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let b = rect(5.0, 5.0, 6.0, 6.0);
        assert_eq!(algebra.difference(&a, &b).unwrap(), a);
    }

    #[test]
    fn bowtie_is_not_simple() {
        let bowtie = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]),
            Vec::new(),
        );
        assert!(!GeoAlgebra.is_simple(&bowtie));
        assert!(GeoAlgebra.is_simple(&rect(0.0, 0.0, 1.0, 1.0).0[0]));
    }

    #[test]
    fn ring_orientation_is_ccw() {
        let poly = polygon_from_ring(&[
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
        ]);
        assert!(poly.signed_area() > 0.0);
    }

    #[test]
    fn representative_point_of_l_shape_is_inside() {
        let l = polygon_from_ring(&[
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 10.0),
            Point2::new(0.0, 10.0),
        ]);
        let pt = representative_point(&l).unwrap();
        assert!(l.intersects(&pt));
    }
}
