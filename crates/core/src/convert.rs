use crate::{Point3D, PointCloud, SensorPoint};

/// Drop the auxiliary sensor channels, keeping positions and grid layout.
///
/// The result is marked non-dense: organized sensor frames routinely
/// contain NaN returns and nothing has checked for them yet.
pub fn to_positions(source: &PointCloud<SensorPoint>) -> PointCloud<Point3D> {
    let mut cloud = source.map(|p| Point3D::new(p.x, p.y, p.z));
    cloud.dense = false;
    cloud
}

/// Lift bare positions back to sensor samples with zeroed channels.
pub fn to_sensor_points(cloud: &PointCloud<Point3D>) -> PointCloud<SensorPoint> {
    cloud.map(|&p| SensorPoint::from(p))
}

impl From<Point3D> for SensorPoint {
    fn from(p: Point3D) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            ..Self::default()
        }
    }
}

impl From<SensorPoint> for Point3D {
    fn from(p: SensorPoint) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}
