use super::face::FaceId;
use super::vertex::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for a half-edge in the surface mesh.
    pub struct HalfEdgeId;
}

/// Data associated with a directed half-edge.
///
/// Every half-edge has an opposite running the other way along the same
/// geometric edge. Half-edges without a face lie on an open border and are
/// chained into border loops through `next`/`prev`.
#[derive(Debug, Clone)]
pub struct HalfEdgeData {
    /// Vertex this half-edge leaves from.
    pub origin: VertexId,
    /// Next half-edge around the same face (or border loop).
    pub next: HalfEdgeId,
    /// Previous half-edge around the same face (or border loop).
    pub prev: HalfEdgeId,
    /// Half-edge running the other way along the same edge.
    pub opposite: HalfEdgeId,
    /// The face this half-edge bounds, `None` on a border.
    pub face: Option<FaceId>,
}
