use super::{Point3, Vector3, TOLERANCE};

/// Computes the (unnormalized) normal of a 3D polygon with Newell's method.
///
/// The length of the result equals twice the polygon's area, so a zero-length
/// normal indicates a degenerate polygon.
#[must_use]
pub fn newell_normal(points: &[Point3]) -> Vector3 {
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Returns the first triple of polygon vertices that are not collinear.
#[must_use]
pub fn non_collinear_triple(points: &[Point3]) -> Option<(Point3, Point3, Point3)> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let a = points[0];
    for i in 1..n {
        let ab = points[i] - a;
        if ab.norm() < TOLERANCE {
            continue;
        }
        for c in &points[i + 1..] {
            let cross = ab.cross(&(c - a));
            if cross.norm() > TOLERANCE * ab.norm().max(1.0) {
                return Some((a, points[i], *c));
            }
        }
    }
    None
}

/// Compute the area of a 3D polygon (coplanar points).
#[must_use]
pub fn polygon_area_3d(points: &[Point3]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    newell_normal(points).norm() * 0.5
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn newell_normal_of_ccw_square_points_up() {
        let pts = [
            p(0.0, 0.0, 2.0),
            p(1.0, 0.0, 2.0),
            p(1.0, 1.0, 2.0),
            p(0.0, 1.0, 2.0),
        ];
        let n = newell_normal(&pts).normalize();
        assert!((n.z - 1.0).abs() < TOLERANCE);
        assert!((polygon_area_3d(&pts) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn triple_skips_collinear_prefix() {
        let pts = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 1.0, 0.0),
        ];
        let (_, b, c) = non_collinear_triple(&pts).unwrap();
        assert!((b.x - 1.0).abs() < TOLERANCE);
        assert!((c.y - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn triple_of_collinear_points_is_none() {
        let pts = [p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0), p(2.0, 2.0, 2.0)];
        assert!(non_collinear_triple(&pts).is_none());
    }
}
