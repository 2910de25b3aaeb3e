use super::{Point2, Point3, TOLERANCE};

/// Computes the signed area of a closed ring (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise. The ring may or
/// may not repeat its first point at the end.
#[must_use]
pub fn signed_area_2d(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Drops the z coordinate of each point (vertical orthographic projection).
#[must_use]
pub fn project_xy(points: &[Point3]) -> Vec<Point2> {
    points.iter().map(|p| Point2::new(p.x, p.y)).collect()
}

/// Returns the ring in counter-clockwise order, reversing it if needed.
#[must_use]
pub fn ensure_ccw(points: &[Point2]) -> Vec<Point2> {
    if signed_area_2d(points) < 0.0 {
        points.iter().rev().copied().collect()
    } else {
        points.to_vec()
    }
}

/// Removes consecutive duplicate points, including a closing point equal to
/// the first one.
#[must_use]
pub fn dedup_ring(points: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for &pt in points {
        if out
            .last()
            .is_none_or(|last| (last - pt).norm() > TOLERANCE)
        {
            out.push(pt);
        }
    }
    while out.len() > 1 {
        let (first, last) = (out[0], out[out.len() - 1]);
        if (first - last).norm() > TOLERANCE {
            break;
        }
        out.pop();
    }
    out
}
