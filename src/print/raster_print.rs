use std::ops::Range;

use geo::Rect;

use crate::error::{OperationError, Result};
use crate::geometry::PolygonAlgebra;
use crate::math::{Point2, Point3};

use super::{BrickPrint, FootPrint};

/// Height stored in pixels no facet covers.
pub const NO_DATA: f64 = -9999.0;

/// Largest grid a raster may allocate, in pixels.
pub const MAX_PIXELS: usize = 1 << 26;

/// Placement of a north-up pixel grid.
///
/// `origin` is the lower-left corner; row 0 is the northern-most row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub origin: Point2,
    pub width: usize,
    pub height: usize,
    pub pixel_size: f64,
}

impl GridSpec {
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if the pixel size is not a
    /// positive finite number or the grid exceeds [`MAX_PIXELS`].
    pub fn new(origin: Point2, width: usize, height: usize, pixel_size: f64) -> Result<Self> {
        let grid = Self {
            origin,
            width,
            height,
            pixel_size,
        };
        grid.check()?;
        Ok(grid)
    }

    /// Validates a grid, which may have been built field by field, and
    /// returns its pixel count.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if the pixel size is not a
    /// positive finite number or the grid exceeds [`MAX_PIXELS`].
    pub fn check(&self) -> Result<usize> {
        check_pixel_size(self.pixel_size)?;
        self.width
            .checked_mul(self.height)
            .filter(|&n| n <= MAX_PIXELS)
            .ok_or_else(|| {
                OperationError::InvalidInput(format!(
                    "{}x{} grid exceeds {MAX_PIXELS} pixels",
                    self.width, self.height
                ))
                .into()
            })
    }

    /// Smallest grid covering `rect` whose corners sit on multiples of
    /// `pixel_size`.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if the pixel size is not a
    /// positive finite number or the grid would exceed [`MAX_PIXELS`].
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn snapped(rect: &Rect<f64>, pixel_size: f64) -> Result<Self> {
        let ps = check_pixel_size(pixel_size)?;
        let (min, max) = (rect.min(), rect.max());
        let origin = Point2::new((min.x / ps).floor() * ps, (min.y / ps).floor() * ps);
        let cols = ((max.x - origin.x) / ps).ceil().max(1.0);
        let rows = ((max.y - origin.y) / ps).ceil().max(1.0);
        // Checked in floating point so the casts below cannot saturate.
        if cols * rows > MAX_PIXELS as f64 {
            return Err(OperationError::InvalidInput(format!(
                "pixel size {ps} needs a {cols}x{rows} grid"
            ))
            .into());
        }
        Self::new(origin, cols as usize, rows as usize, ps)
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major index of a pixel.
    #[must_use]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// Ground coordinates of a pixel centre.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_centre(&self, row: usize, col: usize) -> Point2 {
        Point2::new(
            self.origin.x + (col as f64 + 0.5) * self.pixel_size,
            self.origin.y + ((self.height - row) as f64 - 0.5) * self.pixel_size,
        )
    }

    /// Rows and columns whose pixel centres fall inside `rect`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cover(&self, rect: &Rect<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let ps = self.pixel_size;
        let (min, max) = (rect.min(), rect.max());
        let h = self.height as f64;
        let cols = span(
            (min.x - self.origin.x) / ps - 0.5,
            (max.x - self.origin.x) / ps - 0.5,
            self.width,
        )?;
        let rows = span(
            h - 0.5 - (max.y - self.origin.y) / ps,
            h - 0.5 - (min.y - self.origin.y) / ps,
            self.height,
        )?;
        Some((rows, cols))
    }
}

fn check_pixel_size(pixel_size: f64) -> Result<f64> {
    if pixel_size.is_finite() && pixel_size > 0.0 {
        Ok(pixel_size)
    } else {
        Err(OperationError::InvalidInput(format!("pixel size {pixel_size}")).into())
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn span(lo: f64, hi: f64, len: usize) -> Option<Range<usize>> {
    if len == 0 {
        return None;
    }
    let lo = lo.ceil().max(0.0);
    let hi = hi.floor().min((len - 1) as f64);
    if hi < lo {
        return None;
    }
    Some(lo as usize..hi as usize + 1)
}

/// A height raster sampled from a resolved footprint.
#[derive(Debug, Clone)]
pub struct RasterPrint {
    name: String,
    grid: GridSpec,
    reference: Point3,
    crs: u32,
    heights: Vec<f64>,
    hits: Vec<bool>,
}

impl RasterPrint {
    /// Samples every pixel centre of `grid` against the retained facets of
    /// `brick`; the first facet containing a centre supplies its height.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for an invalid or oversized
    /// grid, or an error if a retained facet is vertical.
    pub fn sample<A: PolygonAlgebra>(
        name: impl Into<String>,
        brick: &BrickPrint<A>,
        grid: GridSpec,
        reference: Point3,
        crs: u32,
    ) -> Result<Self> {
        let len = grid.check()?;
        let mut heights = vec![NO_DATA; len];
        let mut hits = vec![false; len];
        for facet in brick.facets() {
            facet.rasterize(&grid, &mut heights, &mut hits)?;
        }
        Ok(Self {
            name: name.into(),
            grid,
            reference,
            crs,
            heights,
            hits,
        })
    }

    /// Samples a building footprint over its bounding box, snapped outward
    /// to whole pixels.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for an empty footprint or a
    /// non-positive pixel size.
    pub fn from_footprint(footprint: &FootPrint, pixel_size: f64) -> Result<Self> {
        let rect = footprint.brick().bounding_rect().ok_or_else(|| {
            OperationError::InvalidInput(format!("footprint {} is empty", footprint.name()))
        })?;
        let grid = GridSpec::snapped(&rect, pixel_size)?;
        Self::sample(
            footprint.name(),
            footprint.brick(),
            grid,
            *footprint.reference(),
            footprint.crs(),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    #[must_use]
    pub fn reference(&self) -> &Point3 {
        &self.reference
    }

    #[must_use]
    pub fn crs(&self) -> u32 {
        self.crs
    }

    /// Height grid in row-major order; uncovered pixels hold [`NO_DATA`].
    #[must_use]
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    #[must_use]
    pub fn hits(&self) -> &[bool] {
        &self.hits
    }

    /// Height of a covered pixel, `None` if uncovered or out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.grid.height || col >= self.grid.width {
            return None;
        }
        let i = self.grid.index(row, col);
        self.hits[i].then_some(self.heights[i])
    }

    /// Number of covered pixels.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|&&h| h).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::print::FacePrint;
    use crate::surface::Aabb;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn flat(x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> FacePrint {
        FacePrint::from_points(0, &[p(x0, y0, z), p(x1, y0, z), p(x1, y1, z), p(x0, y1, z)])
            .unwrap()
    }

    fn footprint(brick: BrickPrint) -> FootPrint {
        let bbox = Aabb {
            min: p(0.0, 0.0, 0.0),
            max: p(10.0, 10.0, 3.0),
        };
        FootPrint::new("slab", brick, p(1000.0, 2000.0, 0.0), 2056, bbox)
    }

    #[test]
    fn flat_facet_round_trips() {
        let brick = BrickPrint::from_seed(flat(0.0, 0.0, 10.0, 10.0, 3.0)).unwrap();
        let raster = RasterPrint::from_footprint(&footprint(brick), 1.0).unwrap();
        assert_eq!(raster.grid().width, 10);
        assert_eq!(raster.grid().height, 10);
        assert_eq!(raster.hit_count(), 100);
        for row in 0..10 {
            for col in 0..10 {
                assert_relative_eq!(raster.get(row, col).unwrap(), 3.0);
            }
        }
        assert_eq!(raster.crs(), 2056);
        assert_relative_eq!(raster.reference().x, 1000.0);
    }

    #[test]
    fn larger_grid_leaves_no_data_outside() {
        let brick = BrickPrint::from_seed(flat(0.0, 0.0, 10.0, 10.0, 3.0)).unwrap();
        let grid = GridSpec::new(Point2::new(-5.0, -5.0), 20, 20, 1.0).unwrap();
        let raster = RasterPrint::sample("slab", &brick, grid, Point3::origin(), 0).unwrap();
        assert_eq!(raster.hit_count(), 100);
        assert!(raster.get(0, 0).is_none());
        assert_relative_eq!(raster.heights()[0], NO_DATA);
        assert_relative_eq!(raster.get(10, 10).unwrap(), 3.0);
        assert!(raster.get(20, 0).is_none());
    }

    #[test]
    fn row_zero_is_north() {
        let brick = BrickPrint::from_seed(flat(0.0, 5.0, 10.0, 10.0, 1.0)).unwrap();
        let grid = GridSpec::new(Point2::origin(), 10, 10, 1.0).unwrap();
        let raster = RasterPrint::sample("north", &brick, grid, Point3::origin(), 0).unwrap();
        assert_eq!(raster.hit_count(), 50);
        assert!(raster.get(0, 0).is_some());
        assert!(raster.get(9, 0).is_none());
    }

    #[test]
    fn snapped_grid_covers_rect() {
        let rect = Rect::new((0.3, -1.2), (4.1, 2.0));
        let grid = GridSpec::snapped(&rect, 0.5).unwrap();
        assert_relative_eq!(grid.origin.x, 0.0);
        assert_relative_eq!(grid.origin.y, -1.5);
        assert_eq!(grid.width, 9);
        assert_eq!(grid.height, 7);
        assert!(GridSpec::snapped(&rect, 0.0).is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let huge = GridSpec::new(Point2::origin(), 1 << 33, 1 << 33, 1e-8);
        assert!(matches!(
            huge,
            Err(crate::RoofprintError::Operation(OperationError::InvalidInput(_)))
        ));
        assert!(GridSpec::new(Point2::origin(), usize::MAX, 2, 1.0).is_err());
        assert!(GridSpec::new(Point2::origin(), MAX_PIXELS, 1, 1.0).is_ok());

        let rect = Rect::new((0.0, 0.0), (10.0, 10.0));
        assert!(GridSpec::snapped(&rect, 1e-8).is_err());

        // A grid assembled field by field is still checked before allocating.
        let brick = BrickPrint::from_seed(flat(0.0, 0.0, 10.0, 10.0, 3.0)).unwrap();
        let grid = GridSpec {
            origin: Point2::origin(),
            width: 1 << 33,
            height: 1 << 33,
            pixel_size: 1e-8,
        };
        let sampled = RasterPrint::sample("slab", &brick, grid, Point3::origin(), 0);
        assert!(matches!(
            sampled,
            Err(crate::RoofprintError::Operation(OperationError::InvalidInput(_)))
        ));
    }
}
