#![forbid(unsafe_code)]

pub mod euclidean_cluster;
pub mod ransac_line;

pub use euclidean_cluster::{extract_cluster_indices, extract_clusters};
pub use ransac_line::{fit_line, fit_line_seeded, LineModel, LineParams};
