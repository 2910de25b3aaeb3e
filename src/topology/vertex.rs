use crate::math::Point3;

use super::half_edge::HalfEdgeId;

slotmap::new_key_type! {
    /// Unique identifier for a vertex in the surface mesh.
    pub struct VertexId;
}

/// Data associated with a mesh vertex.
#[derive(Debug, Clone)]
pub struct VertexData {
    /// The 3D position of the vertex.
    pub point: Point3,
    /// One half-edge leaving this vertex, if any.
    pub half_edge: Option<HalfEdgeId>,
}

impl VertexData {
    /// Creates a new, unconnected vertex at the given point.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            half_edge: None,
        }
    }
}
