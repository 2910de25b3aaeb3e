use std::collections::HashMap;
use std::ops::AddAssign;

use geo::{Area, Coord, Intersects, MultiPolygon, Polygon, Rect};
use tracing::warn;

use crate::error::{GeometryError, OperationError, Result};
use crate::geometry::polygon::{
    is_negligible, merge_rects, representative_point, ring_points, to_set, translate_polygon,
};
use crate::geometry::{GeoAlgebra, Plane, PolygonAlgebra, PolygonSet};
use crate::math::intersect_2d::collinear_overlap_length;
use crate::math::{Point2, AREA_TOLERANCE, TOLERANCE};

use super::FacePrint;

/// Heights closer than this are treated as a tie.
pub const HEIGHT_TOLERANCE: f64 = 1e-9;

/// How two overlapping facets decide which one is on top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeightPolicy {
    /// Compare both planes at a point inside the overlap, its centroid when
    /// the centroid lies inside.
    #[default]
    Centroid,
    /// Compare the highest value each plane takes over the overlap's outer
    /// ring.
    Extremum,
}

impl HeightPolicy {
    /// Returns `true` if `new` lies strictly above `old` over `region`.
    ///
    /// # Errors
    ///
    /// Returns an error if either plane is vertical or `region` is empty.
    /// Coplanar planes always tie.
    pub fn new_is_higher(self, new: &Plane, old: &Plane, region: &Polygon<f64>) -> Result<bool> {
        // Same plane: a tie everywhere.
        if new.is_coplanar_with(old) {
            return Ok(false);
        }
        match self {
            Self::Centroid => {
                let pt = representative_point(region).ok_or_else(|| {
                    GeometryError::Degenerate("overlap has no interior point".into())
                })?;
                let (x, y) = (pt.x(), pt.y());
                Ok(new.height_at(x, y)? > old.height_at(x, y)? + HEIGHT_TOLERANCE)
            }
            Self::Extremum => {
                let mut top = None;
                for c in region.exterior().coords() {
                    let (n, o) = (new.height_at(c.x, c.y)?, old.height_at(c.x, c.y)?);
                    top = Some(match top {
                        Some((tn, to)) => (n.max(tn), o.max(to)),
                        None => (n, o),
                    });
                }
                let (n, o) =
                    top.ok_or_else(|| GeometryError::Degenerate("overlap has no vertex".into()))?;
                Ok(n > o + HEIGHT_TOLERANCE)
            }
        }
    }
}

/// What inserting a candidate facet would change.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Retained facets losing area, by index, with what survives of them.
    pub clipped: Vec<(usize, PolygonSet)>,
    /// Part of the candidate left visible.
    pub visible: PolygonSet,
}

/// The visible top surface of a set of facets, seen from above.
///
/// Retained facets never overlap each other in area. Each carries the id and
/// plane of the facet it was cut from.
#[derive(Debug, Clone)]
pub struct BrickPrint<A: PolygonAlgebra = GeoAlgebra> {
    facets: Vec<FacePrint>,
    projected: PolygonSet,
    bounds: Option<Rect<f64>>,
    policy: HeightPolicy,
    algebra: A,
}

impl Default for BrickPrint<GeoAlgebra> {
    fn default() -> Self {
        Self::with_algebra(GeoAlgebra)
    }
}

impl BrickPrint<GeoAlgebra> {
    /// Creates an empty brick print.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a brick print holding a single facet.
    ///
    /// # Errors
    ///
    /// Returns an error if the facet is degenerate, vertical or not simple.
    pub fn from_seed(facet: FacePrint) -> Result<Self> {
        let mut brick = Self::new();
        brick.insert(facet)?;
        Ok(brick)
    }
}

impl<A: PolygonAlgebra> BrickPrint<A> {
    /// Creates an empty brick print backed by a custom polygon algebra.
    #[must_use]
    pub fn with_algebra(algebra: A) -> Self {
        Self {
            facets: Vec::new(),
            projected: MultiPolygon::new(Vec::new()),
            bounds: None,
            policy: HeightPolicy::default(),
            algebra,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: HeightPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> HeightPolicy {
        self.policy
    }

    /// Retained facets in insertion order.
    #[must_use]
    pub fn facets(&self) -> &[FacePrint] {
        &self.facets
    }

    /// Union of all retained facets.
    #[must_use]
    pub fn projected_surface(&self) -> &PolygonSet {
        &self.projected
    }

    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Covered ground area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.projected.unsigned_area()
    }

    fn check_candidate(&self, facet: &FacePrint) -> Result<()> {
        let id = facet.id();
        if facet.is_degenerate() {
            return Err(GeometryError::Degenerate(format!("facet {id} has no area")).into());
        }
        if facet.is_perpendicular() {
            return Err(GeometryError::Degenerate(format!("facet {id} is vertical")).into());
        }
        if !self.algebra.is_simple(facet.polygon()) {
            return Err(
                OperationError::BooleanFailure(format!("facet {id} outline is not simple")).into(),
            );
        }
        Ok(())
    }

    /// Works out how `facet` and the retained facets occlude each other,
    /// without changing anything.
    ///
    /// Each connected component of an overlap is decided on its own, so a
    /// facet may win in one place and lose in another. Retained facets win
    /// ties.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate is rejected or a Boolean operation
    /// fails.
    pub fn resolve(&self, facet: &FacePrint) -> Result<Resolution> {
        self.check_candidate(facet)?;
        let candidate = to_set(facet.polygon());
        let overlap = self.algebra.intersection(&self.projected, &candidate)?;
        if is_negligible(&overlap) {
            return Ok(Resolution {
                clipped: Vec::new(),
                visible: candidate,
            });
        }

        let reach = facet.bounding_rect();
        let mut visible = candidate.clone();
        let mut clipped = Vec::new();
        for (i, old) in self.facets.iter().enumerate() {
            if let (Some(a), Some(b)) = (reach, old.bounding_rect()) {
                if !a.intersects(&b) {
                    continue;
                }
            }
            let old_set = to_set(old.polygon());
            let shared = self.algebra.intersection(&old_set, &candidate)?;
            if is_negligible(&shared) {
                continue;
            }

            let mut lost = Vec::new();
            let mut hidden = Vec::new();
            for component in shared.0 {
                if component.unsigned_area() <= AREA_TOLERANCE {
                    continue;
                }
                if self
                    .policy
                    .new_is_higher(facet.plane(), old.plane(), &component)?
                {
                    lost.push(component);
                } else {
                    hidden.push(component);
                }
            }
            if !lost.is_empty() {
                let rest = self.algebra.difference(&old_set, &MultiPolygon::new(lost))?;
                clipped.push((i, rest));
            }
            if !hidden.is_empty() {
                visible = self
                    .algebra
                    .difference(&visible, &MultiPolygon::new(hidden))?;
            }
        }
        Ok(Resolution { clipped, visible })
    }

    /// Inserts a facet, cutting away whatever is hidden below another.
    ///
    /// Returns the number of visible pieces of `facet` appended.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` for a zero-area or vertical facet
    /// and `OperationError::BooleanFailure` if the polygon kernel fails. The
    /// brick print is left unchanged on error.
    pub fn insert(&mut self, facet: FacePrint) -> Result<usize> {
        let Resolution { clipped, visible } = self.resolve(&facet)?;
        let projected = self.algebra.union(&self.projected, &to_set(facet.polygon()))?;

        let mut replaced: HashMap<usize, PolygonSet> = clipped.into_iter().collect();
        let mut facets = Vec::with_capacity(self.facets.len() + visible.0.len());
        for (i, old) in self.facets.drain(..).enumerate() {
            match replaced.remove(&i) {
                Some(rest) => facets.extend(
                    rest.0
                        .into_iter()
                        .filter(|p| p.unsigned_area() > AREA_TOLERANCE)
                        .map(|p| old.with_polygon(p)),
                ),
                None => facets.push(old),
            }
        }
        let before = facets.len();
        facets.extend(
            visible
                .0
                .into_iter()
                .filter(|p| p.unsigned_area() > AREA_TOLERANCE)
                .map(|p| facet.with_polygon(p)),
        );
        let appended = facets.len() - before;

        self.facets = facets;
        self.projected = projected;
        self.bounds = merge_rects(self.bounds, facet.bounding_rect());
        Ok(appended)
    }

    /// Inserts a facet, logging and dropping it on failure.
    ///
    /// Returns `true` if the facet was accepted.
    pub fn push(&mut self, facet: FacePrint) -> bool {
        let id = facet.id();
        match self.insert(facet) {
            Ok(_) => true,
            Err(err) => {
                warn!(facet = id, error = %err, "dropped facet");
                false
            }
        }
    }

    /// Appends a facet known not to overlap the retained ones.
    pub(crate) fn append_disjoint(&mut self, facet: FacePrint) -> Result<()> {
        self.check_candidate(&facet)?;
        self.projected = self.algebra.union(&self.projected, &to_set(facet.polygon()))?;
        self.bounds = merge_rects(self.bounds, facet.bounding_rect());
        self.facets.push(facet);
        Ok(())
    }

    /// The parts of `facet` that would stay visible if it were inserted.
    ///
    /// # Errors
    ///
    /// Same as [`BrickPrint::insert`].
    pub fn occlusion(&self, facet: &FacePrint) -> Result<Vec<FacePrint>> {
        let Resolution { visible, .. } = self.resolve(facet)?;
        Ok(visible
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > AREA_TOLERANCE)
            .map(|p| facet.with_polygon(p))
            .collect())
    }

    /// Inserts every retained facet of `other`, in order.
    ///
    /// Returns the number of facets dropped.
    pub fn merge<B: PolygonAlgebra>(&mut self, other: &BrickPrint<B>) -> usize {
        other
            .facets()
            .iter()
            .filter(|f| !self.push((*f).clone()))
            .count()
    }

    /// Highest retained facet above `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns an error if a retained facet is vertical.
    pub fn height_at(&self, x: f64, y: f64) -> Result<Option<f64>> {
        let mut top: Option<f64> = None;
        for facet in &self.facets {
            if let Some(z) = facet.height_at(x, y)? {
                top = Some(top.map_or(z, |t| t.max(z)));
            }
        }
        Ok(top)
    }

    /// Adjacency matrix of the retained facets: `true` where two of them
    /// share a boundary segment of positive length.
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<bool>> {
        let n = self.facets.len();
        let rings: Vec<Vec<Vec<Point2>>> = self
            .facets
            .iter()
            .map(|f| {
                std::iter::once(f.polygon().exterior())
                    .chain(f.polygon().interiors())
                    .map(ring_points)
                    .collect()
            })
            .collect();
        let rects: Vec<Option<Rect<f64>>> =
            self.facets.iter().map(FacePrint::bounding_rect).collect();

        let mut matrix = vec![vec![false; n]; n];
        for i in 0..n {
            for j in i + 1..n {
                if let (Some(a), Some(b)) = (rects[i], rects[j]) {
                    if !a.intersects(&b) {
                        continue;
                    }
                }
                if rings_touch(&rings[i], &rings[j]) {
                    matrix[i][j] = true;
                    matrix[j][i] = true;
                }
            }
        }
        matrix
    }

    /// Returns a copy shifted horizontally by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self
    where
        A: Clone,
    {
        let shift = |c: Coord<f64>| Coord {
            x: c.x + dx,
            y: c.y + dy,
        };
        Self {
            facets: self.facets.iter().map(|f| f.translated(dx, dy)).collect(),
            projected: MultiPolygon::new(
                self.projected
                    .0
                    .iter()
                    .map(|p| translate_polygon(p, dx, dy))
                    .collect(),
            ),
            bounds: self.bounds.map(|r| Rect::new(shift(r.min()), shift(r.max()))),
            policy: self.policy,
            algebra: self.algebra.clone(),
        }
    }
}

impl<A: PolygonAlgebra, B: PolygonAlgebra> AddAssign<&BrickPrint<B>> for BrickPrint<A> {
    fn add_assign(&mut self, rhs: &BrickPrint<B>) {
        self.merge(rhs);
    }
}

fn segments(ring: &[Point2]) -> impl Iterator<Item = (Point2, Point2)> + '_ {
    let n = ring.len();
    (0..n).map(move |k| (ring[k], ring[(k + 1) % n]))
}

fn rings_touch(a: &[Vec<Point2>], b: &[Vec<Point2>]) -> bool {
    a.iter().flat_map(|r| segments(r)).any(|(a0, a1)| {
        b.iter()
            .flat_map(|r| segments(r))
            .any(|(b0, b1)| collinear_overlap_length(&a0, &a1, &b0, &b1) > TOLERANCE)
    })
}
