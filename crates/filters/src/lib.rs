#![forbid(unsafe_code)]

pub mod radius_outlier;
pub mod sanitize;

pub use radius_outlier::radius_outlier_removal;
pub use sanitize::{sanitize, valid_indices};
