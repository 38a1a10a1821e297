use crate::point::{IntensityPoint, NormalSample, Point3D, SensorPoint};

/// Access to the geometric position of a point type.
///
/// Every stage of the pipeline is generic over this trait so that the same
/// filters run on raw sensor samples, bare positions and normal samples.
pub trait HasPosition {
    fn position(&self) -> [f64; 3];

    /// Whether the sample carries usable data. Defaults to a finite position.
    fn is_valid(&self) -> bool {
        self.position().iter().all(|v| v.is_finite())
    }
}

impl HasPosition for Point3D {
    #[inline]
    fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl HasPosition for SensorPoint {
    #[inline]
    fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl HasPosition for NormalSample {
    #[inline]
    fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn is_valid(&self) -> bool {
        self.position().iter().all(|v| v.is_finite()) && self.has_normal()
    }
}

impl HasPosition for IntensityPoint {
    #[inline]
    fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}
