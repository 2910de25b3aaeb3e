use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::error::{Result, TopologyError};
use crate::geometry::plane::COPLANAR_TOLERANCE;
use crate::math::Vector3;
use crate::topology::{FaceId, HalfEdgeId, SurfaceMesh, VertexId};

use super::BuildingSurface;

impl BuildingSurface {
    /// Finds one interior edge whose two facets are coplanar and can be
    /// joined without corrupting the surface topology.
    ///
    /// Returns `Ok(None)` when no such edge remains.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` if a facet normal is undefined, in
    /// which case coplanarity cannot be decided for this surface.
    pub fn prunable(&self) -> Result<Option<HalfEdgeId>> {
        self.prunable_within(COPLANAR_TOLERANCE)
    }

    pub(crate) fn prunable_within(&self, tolerance: f64) -> Result<Option<HalfEdgeId>> {
        let mut normals: HashMap<FaceId, Vector3> = HashMap::with_capacity(self.num_facets());
        for &f in self.facets() {
            normals.insert(f, self.facet_normal(f)?);
        }

        let mesh = self.mesh();
        for h in mesh.half_edge_ids() {
            let o = mesh.opposite(h)?;
            // Visit each edge once.
            if o < h {
                continue;
            }
            let (Some(f1), Some(f2)) = (mesh.face_of(h)?, mesh.face_of(o)?) else {
                continue;
            };
            if f1 == f2 {
                continue;
            }
            let (Some(n1), Some(n2)) = (normals.get(&f1), normals.get(&f2)) else {
                continue;
            };
            if (n1 - n2).norm() >= tolerance {
                continue;
            }
            match join_is_safe(mesh, h, f1, f2) {
                Ok(()) => return Ok(Some(h)),
                Err(reason) => trace!(building = self.name(), %reason, "skipping coplanar edge"),
            }
        }
        Ok(None)
    }

    /// Removes the edge `h`, merging its two facets into one.
    ///
    /// The facet on the `h` side survives and is returned. Spike edges left
    /// behind when the facets shared a chain of several edges are removed
    /// along with vertices that become isolated.
    ///
    /// # Errors
    ///
    /// Returns `TopologyError::UnsafeJoin` if `h` is a border edge or bounds
    /// the same facet on both sides.
    pub fn join_facet(&mut self, h: HalfEdgeId) -> Result<FaceId> {
        let mesh = self.mesh_mut();
        let o = mesh.opposite(h)?;
        let (Some(keep), Some(gone)) = (mesh.face_of(h)?, mesh.face_of(o)?) else {
            return Err(TopologyError::UnsafeJoin("border edge".into()).into());
        };
        if keep == gone {
            return Err(
                TopologyError::UnsafeJoin("edge bounds the same facet on both sides".into())
                    .into(),
            );
        }

        let hp = mesh.prev(h)?;
        let hn = mesh.next(h)?;
        let op = mesh.prev(o)?;
        let on = mesh.next(o)?;

        for x in mesh.face_half_edges(gone)? {
            mesh.half_edge_mut(x)?.face = Some(keep);
        }
        link(mesh, hp, on)?;
        link(mesh, op, hn)?;
        mesh.face_mut(keep)?.half_edge = hp;

        mesh.remove_half_edge(h);
        mesh.remove_half_edge(o);
        mesh.remove_face(gone);

        remove_spikes(mesh, keep)?;
        mesh.repair_vertex_links();
        Ok(keep)
    }
}

fn link(mesh: &mut SurfaceMesh, from: HalfEdgeId, to: HalfEdgeId) -> Result<()> {
    mesh.half_edge_mut(from)?.next = to;
    mesh.half_edge_mut(to)?.prev = from;
    Ok(())
}

/// Rejects joins where the two facets also touch outside the run of shared
/// edges containing `h`; merging them would pinch the boundary or enclose a
/// hole.
fn join_is_safe(
    mesh: &SurfaceMesh,
    h: HalfEdgeId,
    f1: FaceId,
    f2: FaceId,
) -> std::result::Result<(), TopologyError> {
    let shares_edge = |x: HalfEdgeId| -> std::result::Result<bool, TopologyError> {
        Ok(mesh.face_of(mesh.opposite(x)?)? == Some(f2))
    };

    let mut chain = vec![h];
    let mut x = mesh.next(h)?;
    while shares_edge(x)? {
        if x == h {
            return Err(TopologyError::UnsafeJoin(
                "facets share their whole boundary".into(),
            ));
        }
        chain.push(x);
        x = mesh.next(x)?;
    }
    let mut x = mesh.prev(h)?;
    while x != h && shares_edge(x)? {
        chain.push(x);
        x = mesh.prev(x)?;
    }

    let mut chain_vertices: HashSet<VertexId> = HashSet::new();
    for &c in &chain {
        chain_vertices.insert(mesh.origin(c)?);
        chain_vertices.insert(mesh.target(c)?);
    }

    let v1: HashSet<VertexId> = mesh.face_vertices(f1)?.into_iter().collect();
    let v2: HashSet<VertexId> = mesh.face_vertices(f2)?.into_iter().collect();
    if v1
        .intersection(&v2)
        .any(|v| !chain_vertices.contains(v))
    {
        return Err(TopologyError::UnsafeJoin(
            "facets also touch away from the shared edge".into(),
        ));
    }
    Ok(())
}

/// Removes antenna edges (`next(x) == opposite(x)`) from a face loop.
fn remove_spikes(mesh: &mut SurfaceMesh, face: FaceId) -> Result<()> {
    loop {
        let loop_ids = mesh.face_half_edges(face)?;
        let mut spike = None;
        for &x in &loop_ids {
            if mesh.next(x)? == mesh.opposite(x)? {
                spike = Some(x);
                break;
            }
        }
        let Some(x) = spike else {
            return Ok(());
        };
        if loop_ids.len() <= 4 {
            return Err(TopologyError::InvalidTopology(
                "joined facet collapsed to a spike".into(),
            )
            .into());
        }
        let y = mesh.next(x)?;
        let before = mesh.prev(x)?;
        let after = mesh.next(y)?;
        link(mesh, before, after)?;
        mesh.face_mut(face)?.half_edge = before;
        mesh.remove_half_edge(x);
        mesh.remove_half_edge(y);
    }
}

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Number of edges removed by joining coplanar facets.
    pub joined: usize,
    /// Number of border edge pairs welded afterwards.
    pub welded: usize,
    /// `true` if the pass was abandoned and the original surface kept.
    pub skipped: bool,
}

/// Collapses coplanar facets of a building surface until none remain, then
/// stitches open borders and renumbers the facets.
#[derive(Debug, Clone, Copy)]
pub struct PruneFacets {
    tolerance: f64,
}

impl Default for PruneFacets {
    fn default() -> Self {
        Self {
            tolerance: COPLANAR_TOLERANCE,
        }
    }
}

impl PruneFacets {
    /// Creates a new `PruneFacets` operation with the default tolerance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum distance between unit normals treated as coplanar.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Executes the pruning loop in place.
    ///
    /// A geometric failure part-way through restores the original surface
    /// and reports the pass as skipped; it is not an error.
    pub fn execute(&self, surface: &mut BuildingSurface) -> PruneReport {
        let original = surface.clone();
        match self.run(surface) {
            Ok(report) => {
                debug!(
                    building = surface.name(),
                    joined = report.joined,
                    welded = report.welded,
                    facets = surface.num_facets(),
                    "pruned coplanar facets"
                );
                report
            }
            Err(err) => {
                warn!(building = original.name(), error = %err, "pruning skipped");
                *surface = original;
                PruneReport {
                    skipped: true,
                    ..PruneReport::default()
                }
            }
        }
    }

    fn run(&self, surface: &mut BuildingSurface) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        while let Some(h) = surface.prunable_within(self.tolerance)? {
            surface.join_facet(h)?;
            surface.renumber_facets();
            report.joined += 1;
        }
        report.welded = surface.stitch_borders()?;
        surface.renumber_facets();
        Ok(report)
    }
}
