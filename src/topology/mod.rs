pub mod builder;
pub mod face;
pub mod half_edge;
pub mod vertex;

pub use face::{FaceData, FaceId};
pub use half_edge::{HalfEdgeData, HalfEdgeId};
pub use vertex::{VertexData, VertexId};

use crate::error::TopologyError;
use crate::math::Point3;
use slotmap::SlotMap;

/// Half-edge surface mesh stored in slot-map arenas.
///
/// Entities reference each other via typed IDs (generational indices),
/// avoiding reference cycles while keeping O(1) navigation.
#[derive(Debug, Clone, Default)]
pub struct SurfaceMesh {
    vertices: SlotMap<VertexId, VertexData>,
    half_edges: SlotMap<HalfEdgeId, HalfEdgeData>,
    faces: SlotMap<FaceId, FaceData>,
}

impl SurfaceMesh {
    /// Creates a new, empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Vertex operations ---

    /// Inserts a vertex and returns its ID.
    pub fn add_vertex(&mut self, data: VertexData) -> VertexId {
        self.vertices.insert(data)
    }

    /// Returns a reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn vertex(&self, id: VertexId) -> Result<&VertexData, TopologyError> {
        self.vertices
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()))
    }

    /// Removes a vertex. Half-edges still pointing at it become dangling.
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<VertexData> {
        self.vertices.remove(id)
    }

    /// Iterates over all vertices.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &VertexData)> {
        self.vertices.iter()
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    // --- Half-edge operations ---

    /// Inserts a half-edge and returns its ID.
    pub fn add_half_edge(&mut self, data: HalfEdgeData) -> HalfEdgeId {
        self.half_edges.insert(data)
    }

    /// Returns a reference to the half-edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn half_edge(&self, id: HalfEdgeId) -> Result<&HalfEdgeData, TopologyError> {
        self.half_edges
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("half-edge".into()))
    }

    /// Returns a mutable reference to the half-edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn half_edge_mut(&mut self, id: HalfEdgeId) -> Result<&mut HalfEdgeData, TopologyError> {
        self.half_edges
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("half-edge".into()))
    }

    /// Removes a half-edge without touching its neighbours.
    pub fn remove_half_edge(&mut self, id: HalfEdgeId) -> Option<HalfEdgeData> {
        self.half_edges.remove(id)
    }

    /// Iterates over all half-edge IDs.
    pub fn half_edge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        self.half_edges.keys()
    }

    /// Number of half-edges, border half-edges included.
    #[must_use]
    pub fn num_half_edges(&self) -> usize {
        self.half_edges.len()
    }

    /// Number of half-edges lying on an open border.
    #[must_use]
    pub fn num_border_half_edges(&self) -> usize {
        self.half_edges.values().filter(|h| h.face.is_none()).count()
    }

    // --- Face operations ---

    /// Inserts a face and returns its ID.
    pub fn add_face(&mut self, data: FaceData) -> FaceId {
        self.faces.insert(data)
    }

    /// Returns a reference to the face data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn face(&self, id: FaceId) -> Result<&FaceData, TopologyError> {
        self.faces
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))
    }

    /// Returns a mutable reference to the face data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the mesh.
    pub fn face_mut(&mut self, id: FaceId) -> Result<&mut FaceData, TopologyError> {
        self.faces
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))
    }

    /// Removes a face without touching its half-edges.
    pub fn remove_face(&mut self, id: FaceId) -> Option<FaceData> {
        self.faces.remove(id)
    }

    /// Iterates over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys()
    }

    /// Number of faces.
    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    // --- Navigation ---

    /// # Errors
    ///
    /// Returns an error if the half-edge is not found.
    pub fn next(&self, h: HalfEdgeId) -> Result<HalfEdgeId, TopologyError> {
        Ok(self.half_edge(h)?.next)
    }

    /// # Errors
    ///
    /// Returns an error if the half-edge is not found.
    pub fn prev(&self, h: HalfEdgeId) -> Result<HalfEdgeId, TopologyError> {
        Ok(self.half_edge(h)?.prev)
    }

    /// # Errors
    ///
    /// Returns an error if the half-edge is not found.
    pub fn opposite(&self, h: HalfEdgeId) -> Result<HalfEdgeId, TopologyError> {
        Ok(self.half_edge(h)?.opposite)
    }

    /// # Errors
    ///
    /// Returns an error if the half-edge is not found.
    pub fn origin(&self, h: HalfEdgeId) -> Result<VertexId, TopologyError> {
        Ok(self.half_edge(h)?.origin)
    }

    /// Vertex the half-edge points to.
    ///
    /// # Errors
    ///
    /// Returns an error if the half-edge or its opposite is not found.
    pub fn target(&self, h: HalfEdgeId) -> Result<VertexId, TopologyError> {
        self.origin(self.opposite(h)?)
    }

    /// Face bounded by the half-edge, `None` on a border.
    ///
    /// # Errors
    ///
    /// Returns an error if the half-edge is not found.
    pub fn face_of(&self, h: HalfEdgeId) -> Result<Option<FaceId>, TopologyError> {
        Ok(self.half_edge(h)?.face)
    }

    /// Returns `true` if the half-edge lies on an open border.
    ///
    /// # Errors
    ///
    /// Returns an error if the half-edge is not found.
    pub fn is_border(&self, h: HalfEdgeId) -> Result<bool, TopologyError> {
        Ok(self.half_edge(h)?.face.is_none())
    }

    /// Position of a vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex is not found.
    pub fn point(&self, v: VertexId) -> Result<Point3, TopologyError> {
        Ok(self.vertex(v)?.point)
    }

    /// Walks a `next` loop starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop is broken or never closes.
    pub fn loop_half_edges(&self, start: HalfEdgeId) -> Result<Vec<HalfEdgeId>, TopologyError> {
        let mut out = vec![start];
        let mut h = self.next(start)?;
        while h != start {
            if out.len() > self.half_edges.len() {
                return Err(TopologyError::InvalidTopology(
                    "half-edge loop does not close".into(),
                ));
            }
            out.push(h);
            h = self.next(h)?;
        }
        Ok(out)
    }

    /// Boundary half-edges of a face, in loop order.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is not found or its loop is broken.
    pub fn face_half_edges(&self, f: FaceId) -> Result<Vec<HalfEdgeId>, TopologyError> {
        self.loop_half_edges(self.face(f)?.half_edge)
    }

    /// Boundary vertices of a face, in loop order.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is not found or its loop is broken.
    pub fn face_vertices(&self, f: FaceId) -> Result<Vec<VertexId>, TopologyError> {
        self.face_half_edges(f)?
            .into_iter()
            .map(|h| self.origin(h))
            .collect()
    }

    /// Boundary points of a face, in loop order.
    ///
    /// # Errors
    ///
    /// Returns an error if the face is not found or its loop is broken.
    pub fn face_points(&self, f: FaceId) -> Result<Vec<Point3>, TopologyError> {
        self.face_vertices(f)?
            .into_iter()
            .map(|v| self.point(v))
            .collect()
    }

    /// Points every vertex's outgoing pointer at a live half-edge and drops
    /// vertices no half-edge leaves from.
    pub fn repair_vertex_links(&mut self) {
        for vertex in self.vertices.values_mut() {
            vertex.half_edge = None;
        }
        for (id, h) in &self.half_edges {
            if let Some(vertex) = self.vertices.get_mut(h.origin) {
                if vertex.half_edge.is_none() {
                    vertex.half_edge = Some(id);
                }
            }
        }
        self.vertices.retain(|_, v| v.half_edge.is_some());
    }
}
