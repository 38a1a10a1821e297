//! Pipeline configuration loaded from TOML.
//!
//! Every section has `#[serde(default)]`, so a file only needs the keys it
//! changes. Defaults reproduce the capture setup the pipeline was tuned on.

use std::path::Path;

use depthseg_normals::MlsParams;
use depthseg_segmentation::LineParams;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub outlier: OutlierSection,
    pub clustering: ClusteringSection,
    pub normals: NormalsSection,
    pub shape: ShapeSection,
    pub line: LineSection,
}

/// Radius outlier removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierSection {
    pub radius: f64,
    pub min_neighbors: usize,
}

impl Default for OutlierSection {
    fn default() -> Self {
        Self {
            radius: 0.01,
            min_neighbors: 10,
        }
    }
}

/// Euclidean cluster extraction and which cluster feeds later stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringSection {
    pub tolerance: f64,
    pub min_size: usize,
    pub max_size: usize,
    pub selection: ClusterSelection,
}

impl Default for ClusteringSection {
    fn default() -> Self {
        Self {
            tolerance: 0.005,
            min_size: 1000,
            max_size: 25_000_000,
            selection: ClusterSelection::First,
        }
    }
}

/// Which extracted cluster is handed to surface, shape and line stages.
///
/// In TOML: `selection = "first"`, `selection = "largest"` or
/// `selection = { index = 2 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSelection {
    /// The cluster whose seed comes first in the filtered cloud.
    #[default]
    First,
    /// The cluster with the most points; ties go to the earliest.
    Largest,
    /// The n-th cluster in extraction order.
    Index(usize),
}

impl ClusterSelection {
    /// Pick a cluster given the cluster sizes in extraction order.
    pub fn pick(&self, sizes: &[usize]) -> Option<usize> {
        match *self {
            ClusterSelection::First => (!sizes.is_empty()).then_some(0),
            ClusterSelection::Largest => sizes
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, usize)>, (i, &size)| match best {
                    Some((_, best_size)) if best_size >= size => best,
                    _ => Some((i, size)),
                })
                .map(|(i, _)| i),
            ClusterSelection::Index(i) => (i < sizes.len()).then_some(i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalMethod {
    /// Covariance of the radius neighborhood; positions are kept.
    #[default]
    Direct,
    /// Moving least squares; positions are smoothed and may be dropped.
    Smoothing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalsSection {
    pub method: NormalMethod,
    /// Neighborhood radius of the direct estimator.
    pub radius: f64,
    pub smoothing: SmoothingSection,
}

impl Default for NormalsSection {
    fn default() -> Self {
        Self {
            method: NormalMethod::Direct,
            radius: 0.01,
            smoothing: SmoothingSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingSection {
    pub search_radius: f64,
    pub polynomial_order: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaussian_param: Option<f64>,
}

impl Default for SmoothingSection {
    fn default() -> Self {
        let params = MlsParams::default();
        Self {
            search_radius: params.search_radius,
            polynomial_order: params.polynomial_order,
            gaussian_param: params.gaussian_param,
        }
    }
}

impl SmoothingSection {
    pub fn to_mls_params(&self) -> MlsParams {
        MlsParams {
            search_radius: self.search_radius,
            polynomial_order: self.polynomial_order,
            gaussian_param: self.gaussian_param,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeSection {
    pub enabled: bool,
}

impl Default for ShapeSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Cloud the line fitter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineInput {
    /// The outlier-filtered cloud, before clustering.
    #[default]
    Filtered,
    /// The selected cluster.
    Selected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSection {
    pub enabled: bool,
    pub input: LineInput,
    pub distance_threshold: f64,
    pub confidence: f64,
    pub max_iterations: usize,
    pub refine: bool,
    /// Fixed RNG seed. `None` draws one from the thread RNG per run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for LineSection {
    fn default() -> Self {
        let params = LineParams::default();
        Self {
            enabled: false,
            input: LineInput::Filtered,
            distance_threshold: params.distance_threshold,
            confidence: params.confidence.unwrap_or(0.99),
            max_iterations: params.max_iterations,
            refine: params.refine,
            seed: None,
        }
    }
}

impl LineSection {
    pub fn to_line_params(&self) -> LineParams {
        LineParams {
            distance_threshold: self.distance_threshold,
            confidence: Some(self.confidence),
            max_iterations: self.max_iterations,
            refine: self.refine,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations no stage can run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        positive("outlier.radius", self.outlier.radius)?;
        positive("clustering.tolerance", self.clustering.tolerance)?;
        if self.clustering.min_size > self.clustering.max_size {
            return Err(PipelineError::Config(format!(
                "clustering.min_size ({}) exceeds clustering.max_size ({})",
                self.clustering.min_size, self.clustering.max_size
            )));
        }
        positive("normals.radius", self.normals.radius)?;
        positive(
            "normals.smoothing.search_radius",
            self.normals.smoothing.search_radius,
        )?;
        if let Some(h) = self.normals.smoothing.gaussian_param {
            positive("normals.smoothing.gaussian_param", h)?;
        }
        positive("line.distance_threshold", self.line.distance_threshold)?;
        let c = self.line.confidence;
        if !(c.is_finite() && c > 0.0 && c < 1.0) {
            return Err(PipelineError::Config(format!(
                "line.confidence must be in (0, 1), got {}",
                c
            )));
        }
        if self.line.max_iterations == 0 {
            return Err(PipelineError::Config(
                "line.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> Result<(), PipelineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "{} must be positive and finite, got {}",
            key, value
        )))
    }
}
