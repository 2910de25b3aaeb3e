//! Batch driver: turns the sub-meshes of a scene into per-building
//! footprints and one combined scene print.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::geometry::plane::COPLANAR_TOLERANCE;
use crate::math::Point3;
use crate::print::{BrickPrint, FootPrint, HeightPolicy, RasterPrint, ScenePrint};
use crate::surface::{BuildingSurface, PruneFacets, PruneReport, SubMesh};

/// Parameters controlling scene processing.
#[derive(Debug, Clone, Copy)]
pub struct PipelineParams {
    /// Collapse coplanar facets before projection.
    pub prune: bool,
    /// Resolve occlusion between buildings when combining the scene.
    pub dedup_buildings: bool,
    /// Sample a height raster per building at this pixel size.
    pub pixel_size: Option<f64>,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    /// How overlapping facets decide which one is on top.
    pub height_policy: HeightPolicy,
    /// Maximum distance between unit normals of facets pruned together.
    pub coplanar_tolerance: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            prune: true,
            dedup_buildings: false,
            pixel_size: None,
            threads: 0,
            height_policy: HeightPolicy::Centroid,
            coplanar_tolerance: COPLANAR_TOLERANCE,
        }
    }
}

impl PipelineParams {
    #[must_use]
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    #[must_use]
    pub fn with_dedup_buildings(mut self, dedup: bool) -> Self {
        self.dedup_buildings = dedup;
        self
    }

    #[must_use]
    pub fn with_pixel_size(mut self, pixel_size: f64) -> Self {
        self.pixel_size = Some(pixel_size);
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn with_height_policy(mut self, policy: HeightPolicy) -> Self {
        self.height_policy = policy;
        self
    }

    #[must_use]
    pub fn with_coplanar_tolerance(mut self, tolerance: f64) -> Self {
        self.coplanar_tolerance = tolerance;
        self
    }
}

/// Scene-wide metadata shared by every building.
#[derive(Debug, Clone)]
pub struct SceneMeta {
    /// Common origin of the combined scene print.
    pub pivot: Point3,
    /// Coordinate-system identifier of all inputs.
    pub crs: u32,
    /// Building name prefixes, in output order.
    pub buildings: Vec<String>,
    /// Name prefix of the terrain sub-meshes, if any.
    pub terrain: Option<String>,
}

/// Everything produced for one building.
#[derive(Debug, Clone)]
pub struct BuildingOutput {
    pub surface: BuildingSurface,
    /// Adjacency between the retained facets of `footprint`.
    pub adjacency: Vec<Vec<bool>>,
    pub footprint: FootPrint,
    pub prune: PruneReport,
    pub raster: Option<RasterPrint>,
}

/// Result of processing a scene.
#[derive(Debug)]
pub struct SceneOutput {
    pub scene: ScenePrint,
    /// All footprints around the pivot, `None` if combining them failed.
    pub combined: Option<BrickPrint>,
    pub buildings: Vec<BuildingOutput>,
    /// Buildings that could not be processed, with the reason.
    pub failures: Vec<PipelineError>,
}

impl SceneOutput {
    /// Height rasters of the buildings that have one, in building order.
    #[must_use]
    pub fn rasters(&self) -> Vec<&RasterPrint> {
        self.buildings
            .iter()
            .filter_map(|b| b.raster.as_ref())
            .collect()
    }
}

/// Processes buildings in parallel on a bounded rayon pool.
#[derive(Debug, Clone, Default)]
pub struct ScenePipeline {
    params: PipelineParams,
}

impl ScenePipeline {
    #[must_use]
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Builds, prunes and projects one building.
    ///
    /// # Errors
    ///
    /// Returns an error if no sub-mesh matches `name`, the merged mesh is
    /// invalid or the raster cannot be sampled.
    pub fn process_building(
        &self,
        name: &str,
        crs: u32,
        sub_meshes: &[SubMesh],
    ) -> Result<BuildingOutput> {
        let mut surface = BuildingSurface::from_sub_meshes(name, sub_meshes, crs)?;
        let facets = surface.num_facets();
        let prune = if self.params.prune {
            PruneFacets::new()
                .with_tolerance(self.params.coplanar_tolerance)
                .execute(&mut surface)
        } else {
            PruneReport::default()
        };

        let footprint = FootPrint::from_surface(&surface, self.params.height_policy);
        let adjacency = footprint.brick().adjacency();
        let raster = match self.params.pixel_size {
            Some(pixel_size) if !footprint.brick().is_empty() => {
                Some(RasterPrint::from_footprint(&footprint, pixel_size)?)
            }
            _ => None,
        };

        debug!(
            building = name,
            facets,
            pruned = surface.num_facets(),
            retained = footprint.brick().len(),
            "building processed"
        );
        Ok(BuildingOutput {
            surface,
            adjacency,
            footprint,
            prune,
            raster,
        })
    }

    /// Runs [`ScenePipeline::process_building`] behind a panic boundary.
    fn guarded(
        &self,
        name: &str,
        crs: u32,
        sub_meshes: &[SubMesh],
    ) -> std::result::Result<BuildingOutput, PipelineError> {
        match catch_unwind(AssertUnwindSafe(|| {
            self.process_building(name, crs, sub_meshes)
        })) {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(PipelineError::BuildingFailed {
                name: name.to_string(),
                reason: err.to_string(),
            }),
            Err(payload) => Err(PipelineError::BuildingFailed {
                name: name.to_string(),
                reason: panic_message(&*payload),
            }),
        }
    }

    /// Processes every building of the scene and combines their footprints.
    ///
    /// Buildings that fail are skipped and reported in
    /// [`SceneOutput::failures`].
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ThreadPool` if the worker pool cannot be
    /// created.
    pub fn run(&self, meta: &SceneMeta, sub_meshes: &[SubMesh]) -> Result<SceneOutput> {
        info!(
            buildings = meta.buildings.len(),
            crs = meta.crs,
            threads = self.params.threads,
            "processing scene"
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.threads)
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;

        let results: Vec<_> = pool.install(|| {
            meta.buildings
                .par_iter()
                .map(|name| self.guarded(name, meta.crs, sub_meshes))
                .collect()
        });

        let mut scene = ScenePrint::new(meta.pivot, meta.crs);
        let mut buildings = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(output) => {
                    scene.push(output.footprint.clone())?;
                    buildings.push(output);
                }
                Err(failure) => {
                    warn!(error = %failure, "building skipped");
                    failures.push(failure);
                }
            }
        }

        if let Some(terrain) = &meta.terrain {
            match self.guarded(terrain, meta.crs, sub_meshes) {
                Ok(output) => scene.set_terrain(output.footprint)?,
                Err(failure) => {
                    warn!(error = %failure, "terrain skipped");
                    failures.push(failure);
                }
            }
        }

        let combined = match scene.combined(self.params.dedup_buildings) {
            Ok(brick) => Some(brick),
            Err(err) => {
                warn!(error = %err, "scene footprints not combined");
                None
            }
        };

        info!(
            processed = buildings.len(),
            failed = failures.len(),
            "scene complete"
        );
        Ok(SceneOutput {
            scene,
            combined,
            buildings,
            failures,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::surface::tests::split_box;
    use approx::assert_relative_eq;
    use tracing_subscriber::EnvFilter;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn scene_meshes() -> Vec<SubMesh> {
        let mut east = split_box(10.0, 0.0);
        east.name = "east".into();
        let mut west = split_box(0.0, 0.0);
        west.name = "west".into();
        vec![west, east]
    }

    #[test]
    fn scene_runs_and_reports_failures() {
        init_tracing();
        let meta = SceneMeta {
            pivot: Point3::origin(),
            crs: 2056,
            buildings: vec!["west".into(), "ghost".into(), "east".into()],
            terrain: None,
        };
        let pipeline = ScenePipeline::new(PipelineParams::default().with_threads(2));
        let out = pipeline.run(&meta, &scene_meshes()).unwrap();

        assert_eq!(out.buildings.len(), 2);
        assert_eq!(out.failures.len(), 1);
        assert!(matches!(
            &out.failures[0],
            PipelineError::BuildingFailed { name, .. } if name == "ghost"
        ));
        assert_eq!(out.buildings[0].footprint.name(), "west");
        assert_eq!(out.buildings[1].footprint.name(), "east");
        for building in &out.buildings {
            assert_eq!(building.prune.joined, 4);
            assert_eq!(building.surface.num_facets(), 6);
            assert_eq!(building.adjacency.len(), building.footprint.brick().len());
        }

        let combined = out.combined.as_ref().unwrap();
        assert_relative_eq!(combined.area(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(combined.height_at(11.0, 0.5).unwrap().unwrap(), 1.0);
        assert!(out.rasters().is_empty());
    }

    #[test]
    fn rasters_are_sampled_on_request() {
        init_tracing();
        let meta = SceneMeta {
            pivot: Point3::origin(),
            crs: 0,
            buildings: vec!["west".into()],
            terrain: None,
        };
        let params = PipelineParams::default()
            .with_pixel_size(0.5)
            .with_prune(false)
            .with_height_policy(HeightPolicy::Extremum);
        let out = ScenePipeline::new(params).run(&meta, &scene_meshes()).unwrap();
        let rasters = out.rasters();
        assert_eq!(rasters.len(), 1);
        assert_eq!(rasters[0].grid().width, 4);
        assert_eq!(rasters[0].grid().height, 2);
        assert_eq!(rasters[0].hit_count(), 8);
        assert_eq!(out.buildings[0].prune, PruneReport::default());
        assert_eq!(out.buildings[0].surface.num_facets(), 10);
    }

    #[test]
    fn missing_terrain_is_a_failure() {
        init_tracing();
        let meta = SceneMeta {
            pivot: Point3::origin(),
            crs: 0,
            buildings: vec!["west".into()],
            terrain: Some("ground".into()),
        };
        let params = PipelineParams::default().with_dedup_buildings(true);
        let out = ScenePipeline::new(params).run(&meta, &scene_meshes()).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert!(out.scene.terrain().is_none());
        assert_relative_eq!(out.combined.unwrap().area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let caught = catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*caught), "boom");
        let owned = catch_unwind(|| panic!("{}", String::from("owned"))).unwrap_err();
        assert_eq!(panic_message(&*owned), "owned");
    }
}
