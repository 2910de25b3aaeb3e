use super::half_edge::HalfEdgeId;

slotmap::new_key_type! {
    /// Unique identifier for a face in the surface mesh.
    pub struct FaceId;
}

/// Data associated with a mesh face.
///
/// A face is bounded by a single loop of half-edges.
#[derive(Debug, Clone, Copy)]
pub struct FaceData {
    /// One half-edge on the boundary loop.
    pub half_edge: HalfEdgeId,
}
