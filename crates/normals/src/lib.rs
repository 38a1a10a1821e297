#![forbid(unsafe_code)]

pub mod convert;
mod eigen;
pub mod estimate;
pub mod mls;

pub use convert::{curvature_to_intensity, split_normals, Normals};
pub use estimate::{estimate_normal_at, estimate_normals, MIN_NORMAL_NEIGHBORS};
pub use mls::{mls_smooth, MlsParams};
