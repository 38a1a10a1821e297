use depthseg_core::{
    to_positions, Cluster, GeometryError, NormalSample, Point3D, PointCloud, SensorPoint,
};
use depthseg_filters::{radius_outlier_removal, sanitize};
use depthseg_normals::{estimate_normals, mls_smooth};
use depthseg_segmentation::{extract_clusters, fit_line, fit_line_seeded, LineModel};
use depthseg_shape::{oriented_bounding_box, BoundingBox};
use log::{debug, info};

use crate::config::{LineInput, NormalMethod, PipelineConfig};
use crate::error::{PipelineError, Stage};

/// Everything the pipeline produced for one capture.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Finite positions of the capture, unorganized.
    pub sanitized: PointCloud<Point3D>,
    /// `sanitized` after radius outlier removal.
    pub filtered: PointCloud<Point3D>,
    /// Every kept cluster, in extraction order.
    pub clusters: Vec<Cluster>,
    /// Index into `clusters` of the cluster the later stages ran on.
    pub selected: usize,
    pub normals: PointCloud<NormalSample>,
    pub bounding_box: Option<BoundingBox>,
    pub line: Option<LineModel>,
}

impl PipelineOutput {
    pub fn selected_cluster(&self) -> &Cluster {
        &self.clusters[self.selected]
    }
}

/// Runs the stages in order: validate, convert, sanitize, outlier removal,
/// clustering, cluster selection, surface estimation, then the optional
/// shape analysis and line fitting.
///
/// Each stage consumes the previous stage's cloud and builds whatever
/// spatial index it needs from it. The first cloud-level failure aborts the
/// run and is reported with its [`Stage`]. Surface estimation counts as
/// failed when not a single sample of the selected cluster ends up with a
/// normal; isolated per-point failures are left in the output.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline from it.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(self, raw: PointCloud<SensorPoint>) -> Result<PipelineOutput, PipelineError> {
        let cfg = &self.config;

        info!("pipeline: {} stage, {} samples", Stage::Validate, raw.len());
        if raw.is_empty() {
            return Err(PipelineError::at(
                Stage::Validate,
                GeometryError::InvalidInput("empty capture".into()),
            ));
        }

        info!("pipeline: {} stage", Stage::Convert);
        let positions = to_positions(&raw);
        drop(raw);

        info!("pipeline: {} stage", Stage::Sanitize);
        let sanitized = sanitize(positions);
        debug!("pipeline: {} finite points", sanitized.len());
        if sanitized.is_empty() {
            return Err(PipelineError::at(
                Stage::Sanitize,
                GeometryError::InvalidInput("capture has no finite points".into()),
            ));
        }

        info!("pipeline: {} stage", Stage::OutlierRemoval);
        let filtered = radius_outlier_removal(
            &sanitized,
            cfg.outlier.radius,
            cfg.outlier.min_neighbors,
        );
        debug!(
            "pipeline: {} of {} points survive outlier removal",
            filtered.len(),
            sanitized.len()
        );

        info!("pipeline: {} stage", Stage::Clustering);
        let clusters = extract_clusters(
            &filtered,
            cfg.clustering.tolerance,
            cfg.clustering.min_size,
            cfg.clustering.max_size,
        );
        debug!("pipeline: {} clusters", clusters.len());

        info!("pipeline: {} stage", Stage::ClusterSelection);
        let sizes: Vec<usize> = clusters.iter().map(PointCloud::len).collect();
        let selected = cfg.clustering.selection.pick(&sizes).ok_or_else(|| {
            PipelineError::at(
                Stage::ClusterSelection,
                GeometryError::InvalidInput(format!(
                    "cannot select {:?} from {} clusters",
                    cfg.clustering.selection,
                    clusters.len()
                )),
            )
        })?;
        let cluster = &clusters[selected];
        debug!(
            "pipeline: selected cluster {} ({} points)",
            selected,
            cluster.len()
        );

        info!(
            "pipeline: {} stage ({:?})",
            Stage::SurfaceEstimation,
            cfg.normals.method
        );
        let normals = match cfg.normals.method {
            NormalMethod::Direct => estimate_normals(cluster, cfg.normals.radius),
            NormalMethod::Smoothing => {
                mls_smooth(cluster, &cfg.normals.smoothing.to_mls_params())
            }
        };
        let defined = normals.iter().filter(|s| s.has_normal()).count();
        debug!(
            "pipeline: {} of {} surface samples have a normal",
            defined,
            normals.len()
        );
        if defined == 0 {
            return Err(PipelineError::at(
                Stage::SurfaceEstimation,
                GeometryError::DegenerateGeometry(format!(
                    "no normal could be estimated on the {} points of cluster {} ({:?})",
                    cluster.len(),
                    selected,
                    cfg.normals.method
                )),
            ));
        }

        let bounding_box = if cfg.shape.enabled {
            info!("pipeline: {} stage", Stage::ShapeAnalysis);
            Some(
                oriented_bounding_box(cluster)
                    .map_err(|e| PipelineError::at(Stage::ShapeAnalysis, e))?,
            )
        } else {
            None
        };

        let line = if cfg.line.enabled {
            info!(
                "pipeline: {} stage ({:?} cloud)",
                Stage::LineFitting,
                cfg.line.input
            );
            let input = match cfg.line.input {
                LineInput::Filtered => &filtered,
                LineInput::Selected => cluster,
            };
            let params = cfg.line.to_line_params();
            let model = match cfg.line.seed {
                Some(seed) => fit_line_seeded(input, &params, seed),
                None => fit_line(input, &params),
            }
            .map_err(|e| PipelineError::at(Stage::LineFitting, e))?;
            Some(model)
        } else {
            None
        };

        Ok(PipelineOutput {
            sanitized,
            filtered,
            clusters,
            selected,
            normals,
            bounding_box,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterSelection;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Dense lattice block of `side^3` points with spacing `step`.
    fn block(origin: [f64; 3], side: usize, step: f64) -> Vec<SensorPoint> {
        let mut pts = Vec::new();
        for i in 0..side {
            for j in 0..side {
                for k in 0..side {
                    pts.push(SensorPoint {
                        x: origin[0] + i as f64 * step,
                        y: origin[1] + j as f64 * step,
                        z: origin[2] + k as f64 * step,
                        ..SensorPoint::default()
                    });
                }
            }
        }
        pts
    }

    fn small_config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.outlier.radius = 0.25;
        cfg.outlier.min_neighbors = 3;
        cfg.clustering.tolerance = 0.15;
        cfg.clustering.min_size = 20;
        cfg.normals.radius = 0.25;
        cfg
    }

    fn capture() -> PointCloud<SensorPoint> {
        let mut pts = block([0.0, 0.0, 0.0], 4, 0.1);
        pts.extend(block([5.0, 0.05, 0.025], 5, 0.1));
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            pts.push(SensorPoint {
                x: rng.gen_range(20.0..30.0),
                y: rng.gen_range(20.0..30.0),
                z: rng.gen_range(20.0..30.0),
                ..SensorPoint::default()
            });
        }
        pts.push(SensorPoint {
            x: f64::NAN,
            ..SensorPoint::default()
        });
        PointCloud::from_points(pts)
    }

    #[test]
    fn runs_all_stages() {
        let mut cfg = small_config();
        cfg.line.enabled = true;
        cfg.line.seed = Some(3);
        let out = Pipeline::new(cfg).unwrap().run(capture()).unwrap();

        assert_eq!(out.sanitized.len(), 64 + 125 + 10);
        assert_eq!(out.filtered.len(), 64 + 125);
        assert_eq!(out.clusters.len(), 2);
        assert_eq!(out.selected, 0);
        assert_eq!(out.selected_cluster().len(), 64);
        assert_eq!(out.normals.len(), 64);
        assert!(out.bounding_box.is_some());
        assert!(out.line.is_some());
    }

    #[test]
    fn largest_selection() {
        let mut cfg = small_config();
        cfg.clustering.selection = ClusterSelection::Largest;
        let out = Pipeline::new(cfg).unwrap().run(capture()).unwrap();
        assert_eq!(out.selected, 1);
        assert_eq!(out.selected_cluster().len(), 125);
    }

    #[test]
    fn normal_radius_below_spacing_fails_surface_estimation() {
        let mut cfg = small_config();
        cfg.normals.radius = 0.01;
        let err = Pipeline::new(cfg).unwrap().run(capture()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::SurfaceEstimation));
        assert!(matches!(
            err,
            PipelineError::Stage {
                source: GeometryError::DegenerateGeometry(_),
                ..
            }
        ));
    }

    #[test]
    fn smoothing_that_drops_every_point_fails_surface_estimation() {
        let mut cfg = small_config();
        cfg.normals.method = NormalMethod::Smoothing;
        cfg.normals.smoothing.search_radius = 0.01;
        let err = Pipeline::new(cfg).unwrap().run(capture()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::SurfaceEstimation));
    }

    #[test]
    fn missing_cluster_fails_selection_stage() {
        let mut cfg = small_config();
        cfg.clustering.selection = ClusterSelection::Index(5);
        let err = Pipeline::new(cfg).unwrap().run(capture()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::ClusterSelection));
    }

    #[test]
    fn empty_capture_fails_validation() {
        let err = Pipeline::new(small_config())
            .unwrap()
            .run(PointCloud::new_empty())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Validate));
    }

    #[test]
    fn all_nan_capture_fails_sanitize() {
        let raw = PointCloud::from_points(vec![
            SensorPoint {
                z: f64::NAN,
                ..SensorPoint::default()
            };
            4
        ]);
        let err = Pipeline::new(small_config()).unwrap().run(raw).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Sanitize));
    }

    #[test]
    fn flat_cluster_fails_shape_analysis() {
        let mut pts = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                pts.push(SensorPoint {
                    x: i as f64 * 0.1,
                    y: j as f64 * 0.1,
                    z: 0.0,
                    ..SensorPoint::default()
                });
            }
        }
        let err = Pipeline::new(small_config())
            .unwrap()
            .run(PointCloud::from_points(pts))
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::ShapeAnalysis));
        assert!(matches!(
            err,
            PipelineError::Stage {
                source: GeometryError::DegenerateGeometry(_),
                ..
            }
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut cfg = PipelineConfig::default();
        cfg.clustering.tolerance = -1.0;
        assert!(matches!(Pipeline::new(cfg), Err(PipelineError::Config(_))));
    }
}
