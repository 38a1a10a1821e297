#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{
    ClusterSelection, ClusteringSection, LineInput, LineSection, NormalMethod, NormalsSection,
    OutlierSection, PipelineConfig, ShapeSection, SmoothingSection,
};
pub use error::{PipelineError, Stage};
pub use pipeline::{Pipeline, PipelineOutput};
