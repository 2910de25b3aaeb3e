use std::collections::HashMap;

use slotmap::Key;

use crate::error::{GeometryError, Result, TopologyError};
use crate::math::Point3;

use super::{FaceData, HalfEdgeData, HalfEdgeId, SurfaceMesh, VertexData, VertexId};

impl SurfaceMesh {
    /// Builds a half-edge mesh from a polygon soup.
    ///
    /// `faces` index into `points`. Consecutive repeated indices are collapsed
    /// and faces left with fewer than three corners are skipped. Edges used by
    /// exactly one face, or by faces with inconsistent orientation, end up on
    /// an open border.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range or no usable face remains.
    pub fn from_polygons(points: &[Point3], faces: &[Vec<usize>]) -> Result<Self> {
        let mut mesh = Self::new();
        let vertex_ids: Vec<VertexId> = points
            .iter()
            .map(|&p| mesh.add_vertex(VertexData::new(p)))
            .collect();

        let mut directed: HashMap<(usize, usize), Vec<HalfEdgeId>> = HashMap::new();

        for face in faces {
            let mut corners: Vec<usize> = Vec::with_capacity(face.len());
            for &i in face {
                if i >= points.len() {
                    return Err(TopologyError::InvalidTopology(format!(
                        "vertex index {i} out of range ({} points)",
                        points.len()
                    ))
                    .into());
                }
                if corners.last() != Some(&i) {
                    corners.push(i);
                }
            }
            while corners.len() > 1 && corners.first() == corners.last() {
                corners.pop();
            }
            if corners.len() < 3 {
                continue;
            }

            let face_id = mesh.add_face(FaceData {
                half_edge: HalfEdgeId::null(),
            });
            let loop_ids: Vec<HalfEdgeId> = corners
                .iter()
                .map(|&i| {
                    mesh.add_half_edge(HalfEdgeData {
                        origin: vertex_ids[i],
                        next: HalfEdgeId::null(),
                        prev: HalfEdgeId::null(),
                        opposite: HalfEdgeId::null(),
                        face: Some(face_id),
                    })
                })
                .collect();
            let n = loop_ids.len();
            for k in 0..n {
                let h = mesh.half_edge_mut(loop_ids[k])?;
                h.next = loop_ids[(k + 1) % n];
                h.prev = loop_ids[(k + n - 1) % n];
                directed
                    .entry((corners[k], corners[(k + 1) % n]))
                    .or_default()
                    .push(loop_ids[k]);
            }
            mesh.face_mut(face_id)?.half_edge = loop_ids[0];
        }

        if mesh.num_faces() == 0 {
            return Err(GeometryError::Degenerate("mesh has no usable face".into()).into());
        }

        // Pair each directed edge with one running the other way.
        let mut keys: Vec<(usize, usize)> = directed.keys().copied().collect();
        keys.sort_unstable();
        for (a, b) in keys {
            if a > b {
                continue;
            }
            let (Some(forward), Some(backward)) = (directed.get(&(a, b)), directed.get(&(b, a)))
            else {
                continue;
            };
            for (&h, &o) in forward.iter().zip(backward.iter()) {
                mesh.half_edge_mut(h)?.opposite = o;
                mesh.half_edge_mut(o)?.opposite = h;
            }
        }

        mesh.rebuild_borders()?;
        Ok(mesh)
    }

    /// Discards all border half-edges and recreates them, one per face
    /// half-edge without an opposite, chained into border loops.
    ///
    /// # Errors
    ///
    /// Returns an error if a face loop references a missing half-edge.
    pub fn rebuild_borders(&mut self) -> Result<()> {
        let stale: Vec<HalfEdgeId> = self
            .half_edges
            .iter()
            .filter(|(_, h)| h.face.is_none())
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            if let Some(border) = self.remove_half_edge(id) {
                if let Ok(inner) = self.half_edge_mut(border.opposite) {
                    if inner.opposite == id {
                        inner.opposite = HalfEdgeId::null();
                    }
                }
            }
        }

        let unpaired: Vec<HalfEdgeId> = self
            .half_edges
            .iter()
            .filter(|(_, h)| h.opposite.is_null() || !self.half_edges.contains_key(h.opposite))
            .map(|(id, _)| id)
            .collect();

        let mut leaving: HashMap<VertexId, Vec<HalfEdgeId>> = HashMap::new();
        let mut borders = Vec::with_capacity(unpaired.len());
        for h in unpaired {
            let origin = self.origin(self.next(h)?)?;
            let border = self.add_half_edge(HalfEdgeData {
                origin,
                next: HalfEdgeId::null(),
                prev: HalfEdgeId::null(),
                opposite: h,
                face: None,
            });
            self.half_edge_mut(h)?.opposite = border;
            leaving.entry(origin).or_default().push(border);
            borders.push(border);
        }

        for &b in &borders {
            let end = self.target(b)?;
            let next = leaving.get_mut(&end).and_then(Vec::pop).ok_or_else(|| {
                TopologyError::InvalidTopology("border loop does not close".into())
            })?;
            self.half_edge_mut(b)?.next = next;
            self.half_edge_mut(next)?.prev = b;
        }

        self.repair_vertex_links();
        Ok(())
    }
}
