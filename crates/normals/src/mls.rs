use depthseg_core::{GeometryError, HasPosition, NormalSample, Point3D, PointCloud};
use depthseg_spatial::KdTree;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;

use crate::eigen::{centroid_and_covariance, smallest_eigen, COLLINEAR_RATIO};

/// Parameters of the moving-least-squares smoother.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MlsParams {
    /// Radius of the neighborhood fitted around each point.
    pub search_radius: f64,
    /// Order of the local height polynomial `w(u, v)`.
    pub polynomial_order: usize,
    /// Kernel width `h` of the weight `exp(-d² / h²)`. `None` uses
    /// `search_radius`.
    pub gaussian_param: Option<f64>,
}

impl Default for MlsParams {
    fn default() -> Self {
        Self {
            search_radius: 0.03,
            polynomial_order: 7,
            gaussian_param: None,
        }
    }
}

impl MlsParams {
    /// Number of polynomial coefficients, `(order + 1)(order + 2) / 2`.
    pub fn coefficient_count(&self) -> usize {
        (self.polynomial_order + 1) * (self.polynomial_order + 2) / 2
    }

    /// Smallest neighborhood (query included) that can be fitted.
    pub fn min_neighbors(&self) -> usize {
        self.coefficient_count().max(3)
    }
}

/// Smooth `cloud` with a moving-least-squares surface fit and estimate the
/// normal of the fitted surface at every smoothed position.
///
/// For each point the radius neighborhood is projected onto its PCA plane,
/// a weighted polynomial height field over that plane is fitted, and the
/// point is moved onto the field. Points whose neighborhood is too small
/// or whose system is singular are dropped, so the output may be shorter
/// than the input. The result is unorganized and dense.
pub fn mls_smooth<T>(cloud: &PointCloud<T>, params: &MlsParams) -> PointCloud<NormalSample>
where
    T: HasPosition + Sync,
{
    if cloud.is_empty() {
        return PointCloud::new_empty();
    }

    let tree = KdTree::build(cloud);
    let points = cloud.positions();

    let results: Vec<Result<NormalSample, GeometryError>> = (0..points.len())
        .into_par_iter()
        .map(|i| smooth_point(&tree, &points, i, params))
        .collect();

    let mut samples = Vec::with_capacity(results.len());
    let mut skipped = 0usize;
    let mut first_cause = None;
    for result in results {
        match result {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                skipped += 1;
                first_cause.get_or_insert(e);
            }
        }
    }

    if let Some(cause) = first_cause {
        warn!(
            "mls_smooth: skipped {} of {} points (radius={}, order={}); first cause: {}",
            skipped,
            points.len(),
            params.search_radius,
            params.polynomial_order,
            cause
        );
    } else {
        debug!(
            "mls_smooth: {} points smoothed (radius={}, order={})",
            samples.len(),
            params.search_radius,
            params.polynomial_order
        );
    }

    let mut out = PointCloud::from_points(samples);
    out.dense = true;
    out
}

fn smooth_point(
    tree: &KdTree,
    points: &[[f64; 3]],
    index: usize,
    params: &MlsParams,
) -> Result<NormalSample, GeometryError> {
    let query = Vector3::from(points[index]);
    if !query.iter().all(|v| v.is_finite()) {
        return Err(GeometryError::InvalidInput(format!(
            "point {} is not finite",
            index
        )));
    }

    let radius = params.search_radius;
    let neighbors = tree.radius_search(&points[index], radius);
    let required = params.min_neighbors();
    if neighbors.len() < required {
        return Err(GeometryError::InsufficientNeighbors {
            found: neighbors.len(),
            required,
        });
    }

    let (centroid, cov) = centroid_and_covariance(points, &neighbors)
        .ok_or_else(|| GeometryError::DegenerateGeometry("empty neighborhood".into()))?;
    let eig = smallest_eigen(&cov).ok_or_else(|| {
        GeometryError::DegenerateGeometry(format!("no reference plane at point {}", index))
    })?;
    let [l0, l1, l2] = eig.values;
    let l0 = l0.max(0.0);
    let sum = l0 + l1 + l2;
    if sum <= 0.0 || l1 <= COLLINEAR_RATIO * l2 {
        return Err(GeometryError::DegenerateGeometry(format!(
            "collinear neighborhood at point {}",
            index
        )));
    }

    let n = eig.vector;
    let origin = query - (query - centroid).dot(&n) * n;
    let (u, v) = tangent_frame(&n);

    let order = params.polynomial_order;
    let m = params.coefficient_count();
    let h = params.gaussian_param.unwrap_or(radius);
    let h2 = h * h;

    let mut ata = DMatrix::<f64>::zeros(m, m);
    let mut atb = DVector::<f64>::zeros(m);
    let mut row = DVector::<f64>::zeros(m);
    for &j in &neighbors {
        let delta = Vector3::from(points[j]) - origin;
        let su = delta.dot(&u) / radius;
        let sv = delta.dot(&v) / radius;
        let height = delta.dot(&n);
        let weight = (-delta.norm_squared() / h2).exp();

        monomials(su, sv, order, &mut row);
        ata.ger(weight, &row, &row, 1.0);
        atb.axpy(weight * height, &row, 1.0);
    }

    let coeffs = ata
        .cholesky()
        .map(|c| c.solve(&atb))
        .filter(|c| c.iter().all(|x| x.is_finite()))
        .ok_or_else(|| {
            GeometryError::DegenerateGeometry(format!("singular surface fit at point {}", index))
        })?;

    let position = origin + coeffs[0] * n;
    let mut normal = n;
    if order >= 1 {
        // (0, 1) is stored at index 1, (1, 0) at index order + 1.
        let dw_dv = coeffs[1] / radius;
        let dw_du = coeffs[order + 1] / radius;
        normal = (n - dw_du * u - dw_dv * v).normalize();
    }

    Ok(NormalSample::new(
        Point3D::from(position),
        normal.cast::<f32>(),
        (l0 / sum) as f32,
    ))
}

/// Fill `row` with `u^a v^b` for `a + b <= order`, `a` outer and `b` inner.
fn monomials(u: f64, v: f64, order: usize, row: &mut DVector<f64>) {
    let mut k = 0;
    let mut u_pow = 1.0;
    for a in 0..=order {
        let mut v_pow = 1.0;
        for _ in 0..=order - a {
            row[k] = u_pow * v_pow;
            v_pow *= v;
            k += 1;
        }
        u_pow *= u;
    }
}

/// Two unit vectors spanning the plane orthogonal to unit `n`.
fn tangent_frame(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = n.cross(&helper).normalize();
    let v = n.cross(&u);
    (u, v)
}
