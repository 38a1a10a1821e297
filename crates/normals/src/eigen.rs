use nalgebra::{Matrix3, Vector3};

/// Ratio `λ1 / λ2` under which a neighborhood is treated as collinear.
pub(crate) const COLLINEAR_RATIO: f64 = 1e-10;

/// Eigen-decomposition summary of a 3x3 symmetric positive semi-definite
/// matrix: eigenvalues in ascending order and the unit eigenvector of the
/// smallest one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SmallestEigen {
    pub values: [f64; 3],
    pub vector: Vector3<f64>,
}

/// Centroid and covariance (divided by the point count) of the selected
/// positions. `None` for an empty selection.
pub(crate) fn centroid_and_covariance(
    points: &[[f64; 3]],
    indices: &[usize],
) -> Option<(Vector3<f64>, Matrix3<f64>)> {
    if indices.is_empty() {
        return None;
    }
    let count = indices.len() as f64;

    let mut centroid = Vector3::zeros();
    for &idx in indices {
        centroid += Vector3::from(points[idx]);
    }
    centroid /= count;

    // Upper triangle only; the matrix is symmetric.
    let (mut c00, mut c01, mut c02, mut c11, mut c12, mut c22) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for &idx in indices {
        let dx = points[idx][0] - centroid.x;
        let dy = points[idx][1] - centroid.y;
        let dz = points[idx][2] - centroid.z;
        c00 += dx * dx;
        c01 += dx * dy;
        c02 += dx * dz;
        c11 += dy * dy;
        c12 += dy * dz;
        c22 += dz * dz;
    }

    let cov = Matrix3::new(c00, c01, c02, c01, c11, c12, c02, c12, c22) / count;
    Some((centroid, cov))
}

/// Eigenvalues via Cardano's formula and the smallest eigenvector via a
/// cross product of two rows of `A - λI`.
///
/// Avoids nalgebra's iterative solver and its allocations in the per-point
/// inner loop. Returns `None` when the matrix is (near) zero or the null
/// space cannot be isolated.
pub(crate) fn smallest_eigen(m: &Matrix3<f64>) -> Option<SmallestEigen> {
    let (a00, a01, a02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (a11, a12, a22) = (m[(1, 1)], m[(1, 2)], m[(2, 2)]);

    let mean = (a00 + a11 + a22) / 3.0;

    // Shift: B = A - mean * I
    let b00 = a00 - mean;
    let b11 = a11 - mean;
    let b22 = a22 - mean;

    // q = det(B) / 2
    let q = (b00 * (b11 * b22 - a12 * a12) - a01 * (a01 * b22 - a12 * a02)
        + a02 * (a01 * a12 - b11 * a02))
        / 2.0;

    // p = sum of squares of B entries / 6
    let p = (b00 * b00 + b11 * b11 + b22 * b22 + 2.0 * (a01 * a01 + a02 * a02 + a12 * a12)) / 6.0;
    let p = p.max(0.0);

    if p < 1e-300 {
        // Scalar multiple of identity: every direction is an eigenvector.
        return None;
    }

    let det_ratio = (q / (p * p.sqrt())).clamp(-1.0, 1.0);
    let phi = det_ratio.acos() / 3.0;

    let sqrt_p = p.sqrt();
    let eig0 = mean + 2.0 * sqrt_p * (phi + 2.0 * std::f64::consts::FRAC_PI_3).cos();
    let eig2 = mean + 2.0 * sqrt_p * phi.cos();
    let eig1 = 3.0 * mean - eig0 - eig2;

    let r00 = a00 - eig0;
    let r11 = a11 - eig0;
    let r22 = a22 - eig0;

    // (A - λI) has rank <= 2, so the cross product of two independent rows
    // spans its null space. Take the best-conditioned pair.
    let rows = [
        Vector3::new(r00, a01, a02),
        Vector3::new(a01, r11, a12),
        Vector3::new(a02, a12, r22),
    ];
    let vector = [(0, 1), (0, 2), (1, 2)]
        .iter()
        .map(|&(i, j)| rows[i].cross(&rows[j]))
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;

    let len2 = vector.norm_squared();
    if !len2.is_finite() || len2 <= 1e-300 {
        return None;
    }

    Some(SmallestEigen {
        values: [eig0, eig1, eig2],
        vector: vector / len2.sqrt(),
    })
}
