#![forbid(unsafe_code)]

pub mod obb;

pub use obb::{oriented_bounding_box, BoundingBox};
