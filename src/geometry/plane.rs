use crate::error::{GeometryError, Result};
use crate::math::polygon_3d::{newell_normal, non_collinear_triple};
use crate::math::{Point3, Vector3, TOLERANCE};

/// Normals whose vertical component falls below this are treated as walls.
pub const PERPENDICULAR_TOLERANCE: f64 = 1e-9;

/// Unit normals closer than this are treated as the same direction.
pub const COPLANAR_TOLERANCE: f64 = 1e-6;

/// An infinite plane in 3D space, in implicit form.
///
/// Points `p` on the plane satisfy `normal · p + offset = 0`, with `normal`
/// kept at unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    normal: Vector3,
    offset: f64,
}

impl Plane {
    /// Creates a plane through `origin` with the given normal.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal vector is zero-length.
    pub fn from_normal(origin: Point3, normal: Vector3) -> Result<Self> {
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / len;
        Ok(Self {
            normal,
            offset: -normal.dot(&origin.coords),
        })
    }

    /// Creates the plane through three points, oriented by `(b - a) × (c - a)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the points are collinear.
    pub fn from_points(a: &Point3, b: &Point3, c: &Point3) -> Result<Self> {
        let normal = (b - a).cross(&(c - a));
        if normal.norm() < TOLERANCE {
            return Err(GeometryError::Degenerate("collinear plane points".into()).into());
        }
        Self::from_normal(*a, normal)
    }

    /// Fits the supporting plane of a planar polygon.
    ///
    /// The plane passes through the first non-collinear vertex triple and is
    /// oriented like the polygon's winding.
    ///
    /// # Errors
    ///
    /// Returns an error if every vertex triple is collinear.
    pub fn from_polygon(points: &[Point3]) -> Result<Self> {
        let (a, b, c) = non_collinear_triple(points).ok_or_else(|| {
            GeometryError::Degenerate(format!("polygon of {} collinear points", points.len()))
        })?;
        let plane = Self::from_points(&a, &b, &c)?;
        // A reflex first corner flips the triple; follow the polygon winding instead.
        if plane.normal.dot(&newell_normal(points)) < 0.0 {
            Ok(plane.flipped())
        } else {
            Ok(plane)
        }
    }

    /// Returns the unit normal.
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Foot of the perpendicular from the coordinate origin.
    fn anchor(&self) -> Point3 {
        Point3::from(self.normal * -self.offset)
    }

    /// Returns the same plane with the opposite orientation.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Signed distance from a point to the plane.
    /// Positive = on the normal side, negative = opposite.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        self.normal.dot(&point.coords) + self.offset
    }

    /// Returns `true` if the plane is vertical.
    #[must_use]
    pub fn is_perpendicular(&self) -> bool {
        self.normal.z.abs() < PERPENDICULAR_TOLERANCE
    }

    /// Solves the plane equation for z at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::HeightUndefined` for vertical planes.
    pub fn height_at(&self, x: f64, y: f64) -> Result<f64> {
        if self.is_perpendicular() {
            return Err(GeometryError::HeightUndefined { x, y }.into());
        }
        Ok(-(self.normal.x * x + self.normal.y * y + self.offset) / self.normal.z)
    }

    /// Returns `true` if both planes have the same orientation and position.
    #[must_use]
    pub fn is_coplanar_with(&self, other: &Self) -> bool {
        (self.normal - other.normal).norm() < COPLANAR_TOLERANCE
            && self.signed_distance(&other.anchor()).abs() < COPLANAR_TOLERANCE
    }

    /// Returns the plane shifted horizontally by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            normal: self.normal,
            offset: self.offset - self.normal.x * dx - self.normal.y * dy,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn horizontal_plane_height() {
        let plane = Plane::from_normal(p(0.0, 0.0, 4.0), Vector3::z()).unwrap();
        assert_relative_eq!(plane.height_at(12.0, -3.0).unwrap(), 4.0);
    }

    #[test]
    fn sloped_plane_height() {
        // z = x / 2 + 1
        let plane = Plane::from_points(&p(0.0, 0.0, 1.0), &p(2.0, 0.0, 2.0), &p(0.0, 1.0, 1.0))
            .unwrap();
        assert_relative_eq!(plane.height_at(4.0, 7.0).unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn vertical_plane_has_no_height() {
        let plane = Plane::from_normal(p(0.0, 0.0, 0.0), Vector3::x()).unwrap();
        assert!(plane.is_perpendicular());
        let err = plane.height_at(0.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            crate::RoofprintError::Geometry(GeometryError::HeightUndefined { .. })
        ));
    }

    #[test]
    fn zero_normal_rejected() {
        assert!(Plane::from_normal(p(0.0, 0.0, 0.0), Vector3::zeros()).is_err());
    }

    #[test]
    fn collinear_points_rejected() {
        assert!(
            Plane::from_points(&p(0.0, 0.0, 0.0), &p(1.0, 1.0, 1.0), &p(2.0, 2.0, 2.0)).is_err()
        );
    }

    #[test]
    fn polygon_fit_follows_winding() {
        // Clockwise when seen from above, so the normal points down.
        let pts = [
            p(0.0, 0.0, 3.0),
            p(0.0, 1.0, 3.0),
            p(1.0, 1.0, 3.0),
            p(1.0, 0.0, 3.0),
        ];
        let plane = Plane::from_polygon(&pts).unwrap();
        assert!(plane.normal().z < 0.0);
        assert_relative_eq!(plane.height_at(0.5, 0.5).unwrap(), 3.0);
    }

    #[test]
    fn coplanar_detection() {
        let a = Plane::from_normal(p(0.0, 0.0, 2.0), Vector3::z()).unwrap();
        let b = Plane::from_normal(p(5.0, 5.0, 2.0), Vector3::z() * 3.0).unwrap();
        let c = Plane::from_normal(p(0.0, 0.0, 2.5), Vector3::z()).unwrap();
        assert!(a.is_coplanar_with(&b));
        assert!(!a.is_coplanar_with(&c));
        assert!(!a.is_coplanar_with(&a.flipped()));
    }

    #[test]
    fn translation_keeps_heights_attached_to_ground() {
        // z = x
        let plane = Plane::from_points(&p(0.0, 0.0, 0.0), &p(1.0, 0.0, 1.0), &p(0.0, 1.0, 0.0))
            .unwrap();
        let moved = plane.translated(10.0, 0.0);
        assert_relative_eq!(moved.height_at(11.0, 0.0).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn signed_distance_sign() {
        let plane = Plane::from_normal(p(0.0, 0.0, 0.0), Vector3::z()).unwrap();
        assert!(plane.signed_distance(&p(0.0, 0.0, 1.0)) > 0.0);
        assert!(plane.signed_distance(&p(0.0, 0.0, -1.0)) < 0.0);
    }
}
