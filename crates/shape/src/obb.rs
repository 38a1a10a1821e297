use depthseg_core::{Aabb, GeometryError, HasPosition, PointCloud};
use log::debug;
use nalgebra::{Matrix3, Rotation3, SymmetricEigen, UnitQuaternion, Vector3};

/// Eigenvalue ratio `λ_min / λ_max` at or below which the covariance is
/// treated as rank-deficient.
const RANK_RATIO: f64 = 1e-12;

/// Box aligned with the principal axes of a point set.
///
/// Only the pose is stored. The extents are implicit: they are the bounds
/// of the source points expressed in the box frame, see
/// [`local_extents`](Self::local_extents).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Box center in world coordinates.
    pub centroid: Vector3<f64>,
    /// Rotation from the box frame to the world frame. Its columns are the
    /// principal axes, major first.
    pub orientation: UnitQuaternion<f64>,
}

impl BoundingBox {
    /// The three box axes as matrix columns.
    pub fn axes(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    /// Express a world point in the box frame.
    pub fn to_local(&self, point: [f64; 3]) -> Vector3<f64> {
        self.orientation
            .inverse_transform_vector(&(Vector3::from(point) - self.centroid))
    }

    /// Bounds of `cloud` in the box frame. For the cloud the box was built
    /// from these are symmetric about the origin.
    pub fn local_extents<T: HasPosition>(&self, cloud: &PointCloud<T>) -> Aabb {
        let mut bounds = Aabb::empty();
        for p in cloud.iter_positions() {
            bounds.expand_with_point(self.to_local(p).into());
        }
        bounds
    }

    /// Half side lengths of the box around `cloud`.
    pub fn half_extents<T: HasPosition>(&self, cloud: &PointCloud<T>) -> Vector3<f64> {
        Vector3::from(self.local_extents(cloud).half_extents())
    }
}

/// Oriented bounding box of `cloud` from the principal axes of its
/// position covariance.
///
/// Axes are ordered by decreasing variance. The first two are flipped so
/// that their largest-magnitude component is positive and the third is
/// their cross product, which makes the frame right-handed and
/// deterministic. An axis-aligned cuboid with extents `x > y > z` gets the
/// identity orientation.
///
/// # Errors
///
/// - [`GeometryError::InvalidInput`] for fewer than 3 points or any
///   non-finite point.
/// - [`GeometryError::DegenerateGeometry`] when the points are collinear,
///   coplanar or coincident.
pub fn oriented_bounding_box<T: HasPosition>(
    cloud: &PointCloud<T>,
) -> Result<BoundingBox, GeometryError> {
    let n = cloud.len();
    if n < 3 {
        return Err(GeometryError::InvalidInput(format!(
            "bounding box needs at least 3 points, got {}",
            n
        )));
    }
    if let Some(i) = cloud.iter().position(|p| !p.is_valid()) {
        return Err(GeometryError::InvalidInput(format!(
            "point {} is not finite",
            i
        )));
    }

    let mean = cloud
        .iter_positions()
        .fold(Vector3::zeros(), |acc, p| acc + Vector3::from(p))
        / n as f64;
    let mut cov = Matrix3::zeros();
    for p in cloud.iter_positions() {
        let d = Vector3::from(p) - mean;
        cov += d * d.transpose();
    }
    cov /= n as f64;

    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let lambda_max = eig.eigenvalues[order[0]];
    let lambda_min = eig.eigenvalues[order[2]];
    if lambda_max <= 0.0 || lambda_min <= RANK_RATIO * lambda_max {
        return Err(GeometryError::DegenerateGeometry(format!(
            "rank-deficient covariance (eigenvalues {:.3e}..{:.3e})",
            lambda_min, lambda_max
        )));
    }

    let e0 = canonical_sign(eig.eigenvectors.column(order[0]).normalize());
    let e1 = canonical_sign(eig.eigenvectors.column(order[1]).normalize());
    let e2 = e0.cross(&e1);

    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[e0, e1, e2]));
    let orientation = UnitQuaternion::from_rotation_matrix(&rotation);

    let mut local = Aabb::empty();
    for p in cloud.iter_positions() {
        local.expand_with_point(rotation.inverse_transform_vector(&(Vector3::from(p) - mean)).into());
    }
    let local_center = local
        .center()
        .map(Vector3::from)
        .ok_or_else(|| GeometryError::DegenerateGeometry("no finite points".into()))?;
    let centroid = rotation * local_center + mean;

    debug!(
        "oriented_bounding_box: {} points, center=({:.4}, {:.4}, {:.4})",
        n, centroid.x, centroid.y, centroid.z
    );

    Ok(BoundingBox {
        centroid,
        orientation,
    })
}

/// Flip `v` so its largest-magnitude component is positive.
fn canonical_sign(v: Vector3<f64>) -> Vector3<f64> {
    if v[v.iamax()] < 0.0 {
        -v
    } else {
        v
    }
}
