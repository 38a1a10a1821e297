#![forbid(unsafe_code)]

pub mod bbox;
pub mod cloud;
pub mod convert;
pub mod error;
pub mod point;
pub mod traits;

pub use bbox::Aabb;
pub use cloud::{Cluster, PointCloud};
pub use convert::{to_positions, to_sensor_points};
pub use error::GeometryError;
pub use point::{IntensityPoint, NormalSample, Point3D, SensorPoint};
pub use traits::HasPosition;
