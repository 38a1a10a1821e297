use std::fmt;

use depthseg_core::GeometryError;
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Convert,
    Sanitize,
    OutlierRemoval,
    Clustering,
    ClusterSelection,
    SurfaceEstimation,
    ShapeAnalysis,
    LineFitting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Convert => "convert",
            Stage::Sanitize => "sanitize",
            Stage::OutlierRemoval => "outlier removal",
            Stage::Clustering => "clustering",
            Stage::ClusterSelection => "cluster selection",
            Stage::SurfaceEstimation => "surface estimation",
            Stage::ShapeAnalysis => "shape analysis",
            Stage::LineFitting => "line fitting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: GeometryError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn at(stage: Stage, source: GeometryError) -> Self {
        PipelineError::Stage { stage, source }
    }

    /// The stage that failed, for stage errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        PipelineError::Config(e.to_string())
    }
}
