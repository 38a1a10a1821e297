use nalgebra::Vector3;

/// Bare 3D position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Point3D {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl From<Vector3<f64>> for Point3D {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Raw sample as delivered by the depth sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Per-sample noise estimate reported by the sensor.
    pub noise: f32,
    pub intensity: u16,
    pub gray: u8,
}

/// Position with an estimated surface normal and curvature.
///
/// A sample whose normal could not be estimated carries NaN in `normal`
/// and `curvature`; see [`NormalSample::has_normal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub normal: Vector3<f32>,
    pub curvature: f32,
}

impl NormalSample {
    pub fn new(position: Point3D, normal: Vector3<f32>, curvature: f32) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            normal,
            curvature,
        }
    }

    /// Sample at `position` flagged as having no usable normal.
    pub fn undefined(position: Point3D) -> Self {
        Self::new(position, Vector3::repeat(f32::NAN), f32::NAN)
    }

    pub fn has_normal(&self) -> bool {
        self.normal.iter().all(|v| v.is_finite()) && self.curvature.is_finite()
    }
}

/// Position with a scalar channel, used to hand curvature maps to a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntensityPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: f32,
}
