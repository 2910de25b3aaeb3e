use super::{Point2, Vector2, TOLERANCE};

/// 2D cross product of two vectors.
#[inline]
#[must_use]
pub fn cross_2d(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Bounded segment-segment intersection in 2D.
///
/// Returns `(intersection_point, t, u)` where `t` and `u` are in `[0, 1]`,
/// or `None` when the segments are parallel or do not meet.
#[must_use]
pub fn segment_segment_intersect_2d(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
) -> Option<(Point2, f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;

    let cross = cross_2d(&da, &db);
    if cross.abs() < TOLERANCE {
        return None;
    }

    let d = b0 - a0;
    let t = cross_2d(&d, &db) / cross;
    let u = cross_2d(&d, &da) / cross;

    // Use a small epsilon to include endpoints.
    let eps = TOLERANCE;
    if t >= -eps && t <= 1.0 + eps && u >= -eps && u <= 1.0 + eps {
        let t_clamped = t.clamp(0.0, 1.0);
        Some((a0 + da * t_clamped, t_clamped, u.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// Length of the shared part of two collinear segments.
///
/// Returns `0.0` when the segments are not collinear or only touch at a point.
#[must_use]
pub fn collinear_overlap_length(a0: &Point2, a1: &Point2, b0: &Point2, b1: &Point2) -> f64 {
    let da = a1 - a0;
    let len = da.norm();
    if len < TOLERANCE {
        return 0.0;
    }
    let dir = da / len;
    // Both endpoints of b must lie on the supporting line of a.
    let off0 = cross_2d(&dir, &(b0 - a0)).abs();
    let off1 = cross_2d(&dir, &(b1 - a0)).abs();
    let tol = TOLERANCE * len.max(1.0) * 1e3;
    if off0 > tol || off1 > tol {
        return 0.0;
    }
    let s0 = dir.dot(&(b0 - a0));
    let s1 = dir.dot(&(b1 - a0));
    let (lo, hi) = if s0 < s1 { (s0, s1) } else { (s1, s0) };
    (hi.min(len) - lo.max(0.0)).max(0.0)
}

/// Returns `true` if the two segments overlap along a collinear stretch or
/// cross away from their shared endpoints.
#[must_use]
pub fn segments_conflict(a0: &Point2, a1: &Point2, b0: &Point2, b1: &Point2) -> bool {
    if collinear_overlap_length(a0, a1, b0, b1) > TOLERANCE {
        return true;
    }
    match segment_segment_intersect_2d(a0, a1, b0, b1) {
        None => false,
        Some((pt, _, _)) => {
            let shared = [a0, a1]
                .iter()
                .any(|a| [b0, b1].iter().any(|b| (*a - *b).norm() < TOLERANCE));
            let at_shared_endpoint = shared
                && [a0, a1, b0, b1]
                    .iter()
                    .any(|end| (*end - pt).norm() < TOLERANCE);
            !at_shared_endpoint
        }
    }
}
