//! Geometry pipeline for depth-sensor point clouds.
//!
//! Re-exports the workspace crates under one roof so downstream users can
//! depend on `depthseg` alone.

#![forbid(unsafe_code)]

pub use depthseg_core as types;
pub use depthseg_filters as filters;
pub use depthseg_normals as normals;
pub use depthseg_pipeline as pipeline;
pub use depthseg_segmentation as segmentation;
pub use depthseg_shape as shape;
pub use depthseg_spatial as spatial;

pub use depthseg_core::{
    Cluster, GeometryError, HasPosition, NormalSample, Point3D, PointCloud, SensorPoint,
};
pub use depthseg_pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput};
