use std::collections::HashMap;

use tracing::trace;

use crate::error::Result;
use crate::math::Point3;
use crate::topology::{HalfEdgeId, VertexId};

use super::BuildingSurface;

/// Border endpoints closer than this are welded.
pub const WELD_TOLERANCE: f64 = 1e-6;

struct BorderEdge {
    id: HalfEdgeId,
    inner: HalfEdgeId,
    from: Point3,
    to: Point3,
}

/// Minimal union-find over vertex identifiers.
#[derive(Default)]
struct VertexSets {
    parent: HashMap<VertexId, VertexId>,
}

impl VertexSets {
    fn find(&mut self, v: VertexId) -> VertexId {
        let mut root = v;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        // Path compression.
        let mut x = v;
        while x != root {
            let next = self.parent.get(&x).copied().unwrap_or(root);
            self.parent.insert(x, root);
            x = next;
        }
        root
    }

    fn union(&mut self, a: VertexId, b: VertexId) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent.insert(rb, ra);
        }
    }
}

impl BuildingSurface {
    /// Welds open border edges that run along each other in opposite
    /// directions, pairing their facets and merging their end vertices.
    ///
    /// Returns the number of edges welded.
    ///
    /// # Errors
    ///
    /// Returns an error if the border loops cannot be rebuilt afterwards.
    pub fn stitch_borders(&mut self) -> Result<usize> {
        let mesh = self.mesh_mut();
        let mut borders = Vec::new();
        for id in mesh.half_edge_ids() {
            if !mesh.is_border(id)? {
                continue;
            }
            borders.push(BorderEdge {
                id,
                inner: mesh.opposite(id)?,
                from: mesh.point(mesh.origin(id)?)?,
                to: mesh.point(mesh.target(id)?)?,
            });
        }
        if borders.len() < 2 {
            return Ok(0);
        }

        let mut used = vec![false; borders.len()];
        let mut sets = VertexSets::default();
        let mut welded = 0;
        for i in 0..borders.len() {
            if used[i] {
                continue;
            }
            let a = &borders[i];
            let face_a = mesh.face_of(a.inner)?;
            let mut partner = None;
            for (j, b) in borders.iter().enumerate().skip(i + 1) {
                if used[j]
                    || (a.from - b.to).norm() > WELD_TOLERANCE
                    || (a.to - b.from).norm() > WELD_TOLERANCE
                {
                    continue;
                }
                if mesh.face_of(b.inner)? == face_a {
                    continue;
                }
                partner = Some(j);
                break;
            }
            let Some(j) = partner else {
                continue;
            };
            used[i] = true;
            used[j] = true;
            let b = &borders[j];

            mesh.half_edge_mut(a.inner)?.opposite = b.inner;
            mesh.half_edge_mut(b.inner)?.opposite = a.inner;
            sets.union(mesh.origin(a.id)?, mesh.target(b.id)?);
            sets.union(mesh.target(a.id)?, mesh.origin(b.id)?);
            trace!(from = ?a.from, to = ?a.to, "welded border edge");
            welded += 1;
        }

        if welded == 0 {
            return Ok(0);
        }

        let ids: Vec<HalfEdgeId> = mesh.half_edge_ids().collect();
        for h in ids {
            let origin = mesh.origin(h)?;
            let root = sets.find(origin);
            if root != origin {
                mesh.half_edge_mut(h)?.origin = root;
            }
        }
        mesh.rebuild_borders()?;
        self.renumber_facets();
        Ok(welded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::surface::tests::p;
    use crate::surface::SubMesh;

    /// A unit cube whose lid uses its own, slightly displaced, copies of the
    /// top corners.
    fn loose_lid() -> SubMesh {
        let mut points = vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(0.0, 1.0, 1.0),
        ];
        let lid: Vec<Point3> = points[4..]
            .iter()
            .map(|q| p(q.x + 1e-8, q.y, q.z))
            .collect();
        points.extend(lid);
        SubMesh {
            name: "cube".into(),
            points,
            faces: vec![
                vec![0, 3, 2, 1],
                vec![8, 9, 10, 11],
                vec![0, 1, 5, 4],
                vec![1, 2, 6, 5],
                vec![2, 3, 7, 6],
                vec![3, 0, 4, 7],
            ],
        }
    }

    #[test]
    fn loose_lid_is_welded() {
        let mut surface = BuildingSurface::from_sub_meshes("cube", &[loose_lid()], 0).unwrap();
        assert_eq!(surface.mesh().num_border_half_edges(), 8);
        assert_eq!(surface.mesh().num_vertices(), 12);

        assert_eq!(surface.stitch_borders().unwrap(), 4);
        assert_eq!(surface.mesh().num_border_half_edges(), 0);
        assert_eq!(surface.mesh().num_vertices(), 8);
        assert_eq!(surface.num_facets(), 6);
        for h in surface.mesh().half_edge_ids() {
            let o = surface.mesh().opposite(h).unwrap();
            assert_eq!(surface.mesh().opposite(o).unwrap(), h);
            assert_eq!(
                surface.mesh().origin(h).unwrap(),
                surface.mesh().target(o).unwrap()
            );
        }
    }

    #[test]
    fn distant_borders_stay_open() {
        let mut mesh = loose_lid();
        for q in &mut mesh.points[8..] {
            q.z += 0.5;
        }
        let mut surface = BuildingSurface::from_sub_meshes("cube", &[mesh], 0).unwrap();
        assert_eq!(surface.stitch_borders().unwrap(), 0);
        assert_eq!(surface.mesh().num_border_half_edges(), 8);
    }

    #[test]
    fn closed_surface_needs_no_welding() {
        let mut surface = BuildingSurface::from_sub_meshes(
            "house",
            &[crate::surface::tests::split_box(0.0, 0.0)],
            0,
        )
        .unwrap();
        assert_eq!(surface.stitch_borders().unwrap(), 0);
    }
}
