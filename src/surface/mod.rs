//! One building's half-edge surface and the edits applied to it before
//! projection: coplanar facet pruning and border stitching.

mod project;
mod prune;
mod stitch;

pub use prune::{PruneFacets, PruneReport};
pub use stitch::WELD_TOLERANCE;

use std::collections::HashMap;

use crate::error::{GeometryError, OperationError, Result, TopologyError};
use crate::geometry::Plane;
use crate::math::polygon_3d::newell_normal;
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::topology::{FaceId, SurfaceMesh};

/// A named polygon mesh as delivered by a mesh reader.
#[derive(Debug, Clone, Default)]
pub struct SubMesh {
    /// Source name; sub-meshes of one building share a name prefix.
    pub name: String,
    /// Vertex positions in absolute coordinates.
    pub points: Vec<Point3>,
    /// Polygons as index lists into `points`.
    pub faces: Vec<Vec<usize>>,
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3,
    /// Maximum corner of the bounding box.
    pub max: Point3,
}

impl Aabb {
    /// Computes the bounding box of a point cloud, `None` if it is empty.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(
            Self {
                min: first,
                max: first,
            },
            |acc, p| Self {
                min: acc.min.inf(p),
                max: acc.max.sup(p),
            },
        ))
    }
}

/// A building's surface: a half-edge mesh in a local frame plus the
/// georeferencing needed to place it back in the world.
///
/// Coordinates are stored relative to `reference` to keep them small.
#[derive(Debug, Clone)]
pub struct BuildingSurface {
    name: String,
    reference: Point3,
    crs: u32,
    mesh: SurfaceMesh,
    bbox: Aabb,
    facets: Vec<FaceId>,
}

impl BuildingSurface {
    /// Wraps an already built mesh (in local coordinates).
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh has no vertices.
    pub fn new(
        name: impl Into<String>,
        reference: Point3,
        crs: u32,
        mesh: SurfaceMesh,
    ) -> Result<Self> {
        let bbox = Aabb::from_points(mesh.vertices().map(|(_, v)| &v.point))
            .ok_or_else(|| GeometryError::Degenerate("surface has no vertices".into()))?;
        let mut surface = Self {
            name: name.into(),
            reference,
            crs,
            mesh,
            bbox,
            facets: Vec::new(),
        };
        surface.renumber_facets();
        Ok(surface)
    }

    /// Merges every sub-mesh belonging to building `name` into one surface.
    ///
    /// A sub-mesh belongs to the building if its name is `name` itself or
    /// `name` followed by a separator such as `_`, `-` or `.`; `b1` takes
    /// `b1_roof` but not `b10`.
    ///
    /// The reference point is the floored minimum corner of the merged points
    /// (at z = 0, so heights stay absolute). Vertices with identical local
    /// coordinates are welded.
    ///
    /// # Errors
    ///
    /// Returns an error if no sub-mesh matches or the merged mesh is invalid.
    pub fn from_sub_meshes(name: &str, sub_meshes: &[SubMesh], crs: u32) -> Result<Self> {
        let parts: Vec<&SubMesh> = sub_meshes
            .iter()
            .filter(|m| belongs_to(&m.name, name))
            .collect();
        let raw = Aabb::from_points(parts.iter().flat_map(|m| m.points.iter())).ok_or_else(
            || OperationError::InvalidInput(format!("no sub-mesh with points matches {name:?}")),
        )?;
        let reference = Point3::new(raw.min.x.floor(), raw.min.y.floor(), 0.0);

        let mut points: Vec<Point3> = Vec::new();
        let mut index: HashMap<[u64; 3], usize> = HashMap::new();
        let mut faces: Vec<Vec<usize>> = Vec::new();
        for part in parts {
            let remap: Vec<usize> = part
                .points
                .iter()
                .map(|p| {
                    let local = Point3::from(p - reference);
                    let key = [local.x.to_bits(), local.y.to_bits(), local.z.to_bits()];
                    *index.entry(key).or_insert_with(|| {
                        points.push(local);
                        points.len() - 1
                    })
                })
                .collect();
            for face in &part.faces {
                let mut mapped = Vec::with_capacity(face.len());
                for &i in face {
                    let &j = remap.get(i).ok_or_else(|| {
                        OperationError::InvalidInput(format!(
                            "{}: vertex index {i} out of range",
                            part.name
                        ))
                    })?;
                    mapped.push(j);
                }
                faces.push(mapped);
            }
        }

        let mesh = SurfaceMesh::from_polygons(&points, &faces)?;
        Self::new(name, reference, crs, mesh)
    }

    /// Returns the building name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the reference point subtracted from world coordinates.
    #[must_use]
    pub fn reference(&self) -> &Point3 {
        &self.reference
    }

    /// Returns the coordinate-system identifier.
    #[must_use]
    pub fn crs(&self) -> u32 {
        self.crs
    }

    /// Returns the underlying half-edge mesh.
    #[must_use]
    pub fn mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }

    pub(crate) fn mesh_mut(&mut self) -> &mut SurfaceMesh {
        &mut self.mesh
    }

    /// Returns the bounding box in local coordinates.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// Facets in identifier order: facet `i` is `facets()[i]`.
    #[must_use]
    pub fn facets(&self) -> &[FaceId] {
        &self.facets
    }

    /// Number of facets.
    #[must_use]
    pub fn num_facets(&self) -> usize {
        self.facets.len()
    }

    /// Re-derives dense facet identifiers after topology edits.
    pub fn renumber_facets(&mut self) {
        self.facets = self.mesh.face_ids().collect();
        if let Some(bbox) = Aabb::from_points(self.mesh.vertices().map(|(_, v)| &v.point)) {
            self.bbox = bbox;
        }
    }

    /// Boundary points of a facet in loop order.
    ///
    /// # Errors
    ///
    /// Returns an error if the facet is not in the mesh.
    pub fn facet_points(&self, f: FaceId) -> Result<Vec<Point3>> {
        Ok(self.mesh.face_points(f)?)
    }

    /// Unit normal of a facet.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` if the facet has no area.
    pub fn facet_normal(&self, f: FaceId) -> Result<Vector3> {
        let normal = newell_normal(&self.facet_points(f)?);
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::Degenerate("facet normal is undefined".into()).into());
        }
        Ok(normal / len)
    }

    /// Supporting plane of a facet.
    ///
    /// # Errors
    ///
    /// Returns an error if the facet's vertices are all collinear.
    pub fn facet_plane(&self, f: FaceId) -> Result<Plane> {
        Plane::from_polygon(&self.facet_points(f)?)
    }

    /// Exports the surface as a polygon soup in local coordinates, facets in
    /// identifier order.
    ///
    /// # Errors
    ///
    /// Returns an error if a facet loop is broken.
    pub fn to_sub_mesh(&self) -> Result<SubMesh> {
        let mut index = HashMap::new();
        let mut points = Vec::with_capacity(self.mesh.num_vertices());
        for (id, v) in self.mesh.vertices() {
            index.insert(id, points.len());
            points.push(v.point);
        }
        let mut faces = Vec::with_capacity(self.facets.len());
        for &f in &self.facets {
            let mut face = Vec::new();
            for v in self.mesh.face_vertices(f)? {
                let &i = index
                    .get(&v)
                    .ok_or_else(|| TopologyError::EntityNotFound("facet vertex".into()))?;
                face.push(i);
            }
            faces.push(face);
        }
        Ok(SubMesh {
            name: self.name.clone(),
            points,
            faces,
        })
    }
}

fn belongs_to(mesh_name: &str, building: &str) -> bool {
    mesh_name
        .strip_prefix(building)
        .is_some_and(|rest| !rest.starts_with(char::is_alphanumeric))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// A 2×1×1 box whose roof and floor are each split into two squares.
    pub(crate) fn split_box(x0: f64, y0: f64) -> SubMesh {
        let mut points = Vec::new();
        for z in [0.0, 1.0] {
            for (x, y) in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (0.0, 1.0)] {
                points.push(p(x0 + x, y0 + y, z));
            }
        }
        let faces = vec![
            // floor, facing down
            vec![0, 5, 4, 1],
            vec![1, 4, 3, 2],
            // roof, facing up
            vec![6, 7, 10, 11],
            vec![7, 8, 9, 10],
            // walls
            vec![0, 1, 7, 6],
            vec![1, 2, 8, 7],
            vec![2, 3, 9, 8],
            vec![3, 4, 10, 9],
            vec![4, 5, 11, 10],
            vec![5, 0, 6, 11],
        ];
        SubMesh {
            name: "house".into(),
            points,
            faces,
        }
    }

    #[test]
    fn merged_sub_meshes_share_vertices() {
        let whole = split_box(100.5, 200.5);
        let first = SubMesh {
            name: "house_a".into(),
            points: whole.points.clone(),
            faces: whole.faces[..5].to_vec(),
        };
        let second = SubMesh {
            name: "house_b".into(),
            points: whole.points.clone(),
            faces: whole.faces[5..].to_vec(),
        };
        let other = SubMesh {
            name: "shed".into(),
            ..whole.clone()
        };
        let surface =
            BuildingSurface::from_sub_meshes("house", &[first, other, second], 2056).unwrap();
        assert_eq!(surface.num_facets(), 10);
        assert_eq!(surface.mesh().num_vertices(), 12);
        assert_eq!(surface.mesh().num_border_half_edges(), 0);
        assert_eq!(surface.crs(), 2056);
        assert_relative_eq!(surface.reference().x, 100.0);
        assert_relative_eq!(surface.reference().y, 200.0);
        assert_relative_eq!(surface.bbox().min.x, 0.5);
        assert_relative_eq!(surface.bbox().max.z, 1.0);
    }

    #[test]
    fn prefix_needs_separator() {
        let named = |name: &str, x0: f64| SubMesh {
            name: name.into(),
            ..split_box(x0, 0.0)
        };
        let meshes = [
            named("b1_walls", 0.0),
            named("b10", 10.0),
            named("b11_roof", 20.0),
            named("b1", 30.0),
        ];
        let b1 = BuildingSurface::from_sub_meshes("b1", &meshes, 0).unwrap();
        assert_eq!(b1.num_facets(), 20);
        assert_eq!(b1.mesh().num_vertices(), 24);
        let b10 = BuildingSurface::from_sub_meshes("b10", &meshes, 0).unwrap();
        assert_eq!(b10.num_facets(), 10);
        assert!(BuildingSurface::from_sub_meshes("b", &meshes, 0).is_err());

        assert!(belongs_to("b1", "b1"));
        assert!(belongs_to("b1-2", "b1"));
        assert!(!belongs_to("b10", "b1"));
        assert!(!belongs_to("a1", "b1"));
    }

    #[test]
    fn unknown_building_is_error() {
        assert!(BuildingSurface::from_sub_meshes("tower", &[split_box(0.0, 0.0)], 0).is_err());
    }

    #[test]
    fn facet_normals_point_outward() {
        let surface = BuildingSurface::from_sub_meshes("house", &[split_box(0.0, 0.0)], 0).unwrap();
        let roof = surface.facets()[2];
        let floor = surface.facets()[0];
        assert_relative_eq!(surface.facet_normal(roof).unwrap().z, 1.0);
        assert_relative_eq!(surface.facet_normal(floor).unwrap().z, -1.0);
        assert_relative_eq!(
            surface.facet_plane(roof).unwrap().height_at(0.5, 0.5).unwrap(),
            1.0
        );
    }

    #[test]
    fn export_round_trips_topology() {
        let surface = BuildingSurface::from_sub_meshes("house", &[split_box(0.0, 0.0)], 0).unwrap();
        let soup = surface.to_sub_mesh().unwrap();
        let mesh = SurfaceMesh::from_polygons(&soup.points, &soup.faces).unwrap();
        assert_eq!(mesh.num_faces(), 10);
        assert_eq!(mesh.num_border_half_edges(), 0);
    }
}
