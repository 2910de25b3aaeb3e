use tracing::debug;

use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::surface::{Aabb, BuildingSurface};

use super::{BrickPrint, HeightPolicy};

/// A building's resolved roof footprint, with the georeferencing of the
/// surface it came from.
#[derive(Debug, Clone)]
pub struct FootPrint {
    name: String,
    brick: BrickPrint,
    reference: Point3,
    crs: u32,
    bbox: Aabb,
}

impl FootPrint {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        brick: BrickPrint,
        reference: Point3,
        crs: u32,
        bbox: Aabb,
    ) -> Self {
        Self {
            name: name.into(),
            brick,
            reference,
            crs,
            bbox,
        }
    }

    /// Projects every facet of `surface` and resolves their occlusion.
    ///
    /// Walls and zero-area facets are skipped. Facets the polygon kernel
    /// cannot handle are dropped with a warning.
    #[must_use]
    pub fn from_surface(surface: &BuildingSurface, policy: HeightPolicy) -> Self {
        let mut brick = BrickPrint::new().with_policy(policy);
        let mut skipped = 0;
        for facet in surface.project_facets() {
            if facet.is_degenerate() || facet.is_perpendicular() {
                skipped += 1;
                continue;
            }
            brick.push(facet);
        }
        debug!(
            building = surface.name(),
            retained = brick.len(),
            skipped,
            "resolved footprint"
        );
        Self::new(
            surface.name(),
            brick,
            *surface.reference(),
            surface.crs(),
            *surface.bbox(),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn brick(&self) -> &BrickPrint {
        &self.brick
    }

    #[must_use]
    pub fn reference(&self) -> &Point3 {
        &self.reference
    }

    #[must_use]
    pub fn crs(&self) -> u32 {
        self.crs
    }

    /// Bounding box of the source surface, in local coordinates.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }
}

/// Footprints of a whole scene sharing one coordinate system, expressed
/// around a common pivot.
#[derive(Debug, Clone)]
pub struct ScenePrint {
    pivot: Point3,
    crs: u32,
    footprints: Vec<FootPrint>,
    terrain: Option<FootPrint>,
}

impl ScenePrint {
    #[must_use]
    pub fn new(pivot: Point3, crs: u32) -> Self {
        Self {
            pivot,
            crs,
            footprints: Vec::new(),
            terrain: None,
        }
    }

    #[must_use]
    pub fn pivot(&self) -> &Point3 {
        &self.pivot
    }

    #[must_use]
    pub fn crs(&self) -> u32 {
        self.crs
    }

    #[must_use]
    pub fn footprints(&self) -> &[FootPrint] {
        &self.footprints
    }

    #[must_use]
    pub fn terrain(&self) -> Option<&FootPrint> {
        self.terrain.as_ref()
    }

    fn check_crs(&self, footprint: &FootPrint) -> Result<()> {
        if footprint.crs() == self.crs {
            Ok(())
        } else {
            Err(OperationError::InvalidInput(format!(
                "{} uses crs {}, scene uses {}",
                footprint.name(),
                footprint.crs(),
                self.crs
            ))
            .into())
        }
    }

    /// Adds a building footprint.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if its coordinate system
    /// differs from the scene's.
    pub fn push(&mut self, footprint: FootPrint) -> Result<()> {
        self.check_crs(&footprint)?;
        self.footprints.push(footprint);
        Ok(())
    }

    /// Sets the terrain footprint, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if its coordinate system
    /// differs from the scene's.
    pub fn set_terrain(&mut self, terrain: FootPrint) -> Result<()> {
        self.check_crs(&terrain)?;
        self.terrain = Some(terrain);
        Ok(())
    }

    fn rebased(&self, footprint: &FootPrint) -> BrickPrint {
        let offset = footprint.reference() - self.pivot;
        footprint.brick().translated(offset.x, offset.y)
    }

    /// Combines every footprint into one brick print around the pivot.
    ///
    /// Without `dedup` the buildings are assumed disjoint and their facets
    /// are concatenated; with it they go through occlusion resolution.
    /// Terrain is resolved last, beneath whatever is already there.
    ///
    /// # Errors
    ///
    /// Returns an error if concatenation hits a Boolean failure.
    pub fn combined(&self, dedup: bool) -> Result<BrickPrint> {
        let mut out = BrickPrint::new();
        for footprint in &self.footprints {
            let brick = self.rebased(footprint);
            if dedup {
                out.merge(&brick);
            } else {
                for facet in brick.facets() {
                    out.append_disjoint(facet.clone())?;
                }
            }
        }
        if let Some(terrain) = &self.terrain {
            let dropped = out.merge(&self.rebased(terrain));
            if dropped > 0 {
                debug!(dropped, "terrain facets dropped");
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::print::FacePrint;
    use crate::surface::tests::{p, split_box};
    use crate::surface::PruneFacets;
    use approx::assert_relative_eq;

    fn flat(id: usize, x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> FacePrint {
        FacePrint::from_points(id, &[p(x0, y0, z), p(x1, y0, z), p(x1, y1, z), p(x0, y1, z)])
            .unwrap()
    }

    fn slab(name: &str, reference: Point3, crs: u32, z: f64) -> FootPrint {
        let brick = BrickPrint::from_seed(flat(0, 0.0, 0.0, 2.0, 2.0, z)).unwrap();
        let bbox = Aabb {
            min: p(0.0, 0.0, 0.0),
            max: p(2.0, 2.0, z),
        };
        FootPrint::new(name, brick, reference, crs, bbox)
    }

    #[test]
    fn surface_footprint_keeps_roof() {
        let mut surface =
            BuildingSurface::from_sub_meshes("house", &[split_box(10.5, 20.5)], 2056).unwrap();
        PruneFacets::new().execute(&mut surface);
        let fp = FootPrint::from_surface(&surface, HeightPolicy::Centroid);
        assert_eq!(fp.name(), "house");
        assert_eq!(fp.crs(), 2056);
        assert_relative_eq!(fp.brick().area(), 2.0, epsilon = 1e-9);
        // Roof over floor: one retained piece at z = 1.
        assert_eq!(fp.brick().len(), 1);
        assert_relative_eq!(fp.brick().height_at(1.0, 1.0).unwrap().unwrap(), 1.0);
    }

    #[test]
    fn mismatched_crs_is_rejected() {
        let mut scene = ScenePrint::new(Point3::origin(), 2056);
        assert!(scene.push(slab("a", Point3::origin(), 2056, 1.0)).is_ok());
        assert!(scene.push(slab("b", Point3::origin(), 4326, 1.0)).is_err());
        assert!(scene.set_terrain(slab("t", Point3::origin(), 4326, 0.0)).is_err());
        assert_eq!(scene.footprints().len(), 1);
        assert!(scene.terrain().is_none());
    }

    #[test]
    fn combined_rebases_to_pivot() {
        let mut scene = ScenePrint::new(p(100.0, 100.0, 0.0), 0);
        scene.push(slab("a", p(100.0, 100.0, 0.0), 0, 3.0)).unwrap();
        scene.push(slab("b", p(105.0, 100.0, 0.0), 0, 4.0)).unwrap();
        let all = scene.combined(false).unwrap();
        assert_eq!(all.len(), 2);
        assert_relative_eq!(all.area(), 8.0, epsilon = 1e-9);
        assert_relative_eq!(all.height_at(6.0, 1.0).unwrap().unwrap(), 4.0);
    }

    #[test]
    fn buildings_win_over_terrain() {
        let mut scene = ScenePrint::new(Point3::origin(), 0);
        scene.push(slab("a", p(1.0, 1.0, 0.0), 0, 0.0)).unwrap();
        let terrain = FootPrint::new(
            "terrain",
            BrickPrint::from_seed(flat(0, 0.0, 0.0, 4.0, 4.0, 0.0)).unwrap(),
            Point3::origin(),
            0,
            Aabb {
                min: p(0.0, 0.0, 0.0),
                max: p(4.0, 4.0, 0.0),
            },
        );
        scene.set_terrain(terrain).unwrap();
        let all = scene.combined(true).unwrap();
        assert_relative_eq!(all.area(), 16.0, epsilon = 1e-9);
        // The building's slab ties with the terrain and keeps its area.
        let building: f64 = all.facets()[..1].iter().map(FacePrint::area).sum();
        assert_relative_eq!(building, 4.0, epsilon = 1e-9);
        assert_eq!(all.facets().len(), 2);
    }
}
