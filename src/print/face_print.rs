use geo::orient::{Direction, Orient};
use geo::{Area, BoundingRect, Centroid, Intersects, Point, Polygon, Rect};

use crate::error::{GeometryError, Result};
use crate::geometry::polygon::{polygon_from_ring, translate_polygon};
use crate::geometry::Plane;
use crate::math::polygon_2d::project_xy;
use crate::math::{Point2, Point3, AREA_TOLERANCE};

use super::raster_print::GridSpec;

/// The vertical projection of one facet: a ground polygon plus the plane it
/// was lifted from.
///
/// The polygon's exterior ring is counter-clockwise and its holes clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct FacePrint {
    id: usize,
    polygon: Polygon<f64>,
    plane: Plane,
}

impl FacePrint {
    /// Creates a face print, normalizing ring orientation.
    #[must_use]
    pub fn new(id: usize, polygon: Polygon<f64>, plane: Plane) -> Self {
        Self {
            id,
            polygon: polygon.orient(Direction::Default),
            plane,
        }
    }

    /// Projects a planar 3D boundary loop.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` if the loop has no three
    /// non-collinear points.
    pub fn from_points(id: usize, points: &[Point3]) -> Result<Self> {
        let plane = Plane::from_polygon(points)?;
        Ok(Self::new(id, polygon_from_ring(&project_xy(points)), plane))
    }

    /// Returns a piece of this face print: same id and plane, other outline.
    #[must_use]
    pub fn with_polygon(&self, polygon: Polygon<f64>) -> Self {
        Self::new(self.id, polygon, self.plane)
    }

    /// Identifier of the source facet.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    #[must_use]
    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Ground area covered by the print.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// Returns `true` if the print covers no measurable area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.area() <= AREA_TOLERANCE
    }

    /// Returns `true` if the source facet is a wall.
    #[must_use]
    pub fn is_perpendicular(&self) -> bool {
        self.plane.is_perpendicular()
    }

    /// Boundary-inclusive point containment; holes are outside.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygon.intersects(&Point::new(x, y))
    }

    /// Height of the facet above `(x, y)`, `None` if the point is outside.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::HeightUndefined` if the facet is vertical.
    pub fn height_at(&self, x: f64, y: f64) -> Result<Option<f64>> {
        if self.is_perpendicular() {
            return Err(GeometryError::HeightUndefined { x, y }.into());
        }
        if !self.contains(x, y) {
            return Ok(None);
        }
        self.plane.height_at(x, y).map(Some)
    }

    #[must_use]
    pub fn centroid(&self) -> Option<Point2> {
        self.polygon.centroid().map(|c| Point2::new(c.x(), c.y()))
    }

    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.polygon.bounding_rect()
    }

    /// Returns the print shifted horizontally by `(dx, dy)`, plane included.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            id: self.id,
            polygon: translate_polygon(&self.polygon, dx, dy),
            plane: self.plane.translated(dx, dy),
        }
    }

    /// Writes the facet height into every pixel of `grid` whose centre it
    /// contains. Pixels already marked in `hits` are left alone.
    ///
    /// Returns the number of pixels written.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::HeightUndefined` if the facet is vertical.
    pub fn rasterize(
        &self,
        grid: &GridSpec,
        heights: &mut [f64],
        hits: &mut [bool],
    ) -> Result<usize> {
        if self.is_perpendicular() {
            let c = self.polygon.exterior().0.first().copied().unwrap_or_default();
            return Err(GeometryError::HeightUndefined { x: c.x, y: c.y }.into());
        }
        let Some(rect) = self.bounding_rect() else {
            return Ok(0);
        };
        let Some((rows, cols)) = grid.cover(&rect) else {
            return Ok(0);
        };

        let mut written = 0;
        for row in rows {
            for col in cols.clone() {
                let i = grid.index(row, col);
                if hits[i] {
                    continue;
                }
                let c = grid.pixel_centre(row, col);
                if !self.contains(c.x, c.y) {
                    continue;
                }
                heights[i] = self.plane.height_at(c.x, c.y)?;
                hits[i] = true;
                written += 1;
            }
        }
        Ok(written)
    }
}
