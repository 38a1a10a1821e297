use depthseg_core::{GeometryError, HasPosition, PointCloud};
use log::debug;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

/// A 3D line `origin + t * direction`, with `direction` of unit length, and
/// the indices of the points that support it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineModel {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub inliers: Vec<usize>,
}

impl LineModel {
    /// Perpendicular distance from a point to this line.
    #[inline]
    pub fn distance_to_point(&self, point: &[f64; 3]) -> f64 {
        point_line_distance(&self.origin, &self.direction, point)
    }

    /// The six line coefficients `[ox, oy, oz, dx, dy, dz]`.
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin.x,
            self.origin.y,
            self.origin.z,
            self.direction.x,
            self.direction.y,
            self.direction.z,
        ]
    }
}

/// Parameters for [`fit_line`] / [`fit_line_seeded`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
    /// Maximum perpendicular distance for a point to count as an inlier.
    pub distance_threshold: f64,
    /// Probability of drawing at least one outlier-free sample. Enables
    /// adaptive early termination when set. Large clouds are scored in
    /// parallel batches and the check runs after each batch, so up to one
    /// batch of extra candidates may be scored.
    pub confidence: Option<f64>,
    /// Hard cap on the number of sampled candidates.
    pub max_iterations: usize,
    /// Re-fit the winning candidate to its inliers by least squares.
    pub refine: bool,
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.02,
            confidence: Some(0.99),
            max_iterations: 10_000,
            refine: true,
        }
    }
}

/// Fits a line to the point cloud using RANSAC.
///
/// Uses a random (non-deterministic) seed. For reproducible results, use
/// [`fit_line_seeded`] instead.
pub fn fit_line<T: HasPosition>(
    cloud: &PointCloud<T>,
    params: &LineParams,
) -> Result<LineModel, GeometryError> {
    let seed = rand::thread_rng().next_u64();
    fit_line_seeded(cloud, params, seed)
}

/// Fits a line to the point cloud using RANSAC with a deterministic seed.
///
/// # Algorithm
///
/// 1. Pre-generate all random point pairs upfront for determinism.
/// 2. Score candidates with adaptive early termination: one by one for
///    small clouds, in fixed-size rayon batches for large ones.
/// 3. Keep the candidate with the most inliers (earliest wins ties).
/// 4. Optionally refine it over its inliers (centroid + principal axis).
///
/// # Errors
///
/// [`GeometryError::NoModelFound`] when no candidate has any inlier, which
/// includes clouds with fewer than two distinct finite points.
pub fn fit_line_seeded<T: HasPosition>(
    cloud: &PointCloud<T>,
    params: &LineParams,
    seed: u64,
) -> Result<LineModel, GeometryError> {
    let n = cloud.len();
    if n < 2 {
        return Err(GeometryError::NoModelFound);
    }

    let points = cloud.positions();
    let threshold = params.distance_threshold;

    let mut rng = StdRng::seed_from_u64(seed);
    let samples: Vec<(usize, usize)> = (0..params.max_iterations)
        .filter_map(|_| sample_two_distinct(n, &mut rng))
        .collect();

    let use_parallel = n >= 10_000 && samples.len() >= 16;
    let (best, scored) = best_candidate(
        &points,
        &samples,
        threshold,
        params.confidence,
        use_parallel,
    );

    let Some((origin, direction, count)) = best else {
        return Err(GeometryError::NoModelFound);
    };
    if count == 0 {
        return Err(GeometryError::NoModelFound);
    }

    let mut model = LineModel {
        inliers: select_inliers(&points, &origin, &direction, threshold),
        origin,
        direction,
    };

    if params.refine {
        if let Some((origin, direction)) = least_squares_line(&points, &model.inliers) {
            let inliers = select_inliers(&points, &origin, &direction, threshold);
            if inliers.len() >= model.inliers.len() {
                model = LineModel {
                    origin,
                    direction,
                    inliers,
                };
            }
        }
    }

    debug!(
        "fit_line: {} inliers of {} points (threshold={}, {} of {} samples scored)",
        model.inliers.len(),
        n,
        threshold,
        scored,
        samples.len()
    );

    Ok(model)
}

/// Candidates scored per rayon batch on large clouds.
const PARALLEL_BATCH: usize = 256;

type Candidate = (Vector3<f64>, Vector3<f64>, usize);

/// Best-scoring candidate line over `samples` (earliest wins ties) and the
/// number of samples actually scored before the confidence cap was met.
fn best_candidate(
    points: &[[f64; 3]],
    samples: &[(usize, usize)],
    threshold: f64,
    confidence: Option<f64>,
    parallel: bool,
) -> (Option<Candidate>, usize) {
    let n = points.len();
    let score = |&(i0, i1): &(usize, usize)| {
        let (origin, direction) = line_from_two_points(&points[i0], &points[i1])?;
        let count = count_inliers(points, &origin, &direction, threshold);
        Some((origin, direction, count))
    };

    let mut best: Option<Candidate> = None;

    if parallel {
        let mut scored = 0;
        for batch in samples.chunks(PARALLEL_BATCH) {
            let batch_best = batch
                .par_iter()
                .filter_map(score)
                .reduce_with(|a, b| if a.2 >= b.2 { a } else { b });
            scored += batch.len();

            if let Some(c) = batch_best {
                if best.as_ref().map_or(true, |b| c.2 > b.2) {
                    best = Some(c);
                }
            }
            if let (Some(p), Some(b)) = (confidence, best.as_ref()) {
                if scored >= required_iterations(b.2, n, p) {
                    break;
                }
            }
        }
        return (best, scored);
    }

    for (iter, sample) in samples.iter().enumerate() {
        if let Some(c) = score(sample) {
            if best.as_ref().map_or(true, |b| c.2 > b.2) {
                best = Some(c);
            }
        }
        let confident = match (confidence, &best) {
            (Some(p), Some(b)) => iter + 1 >= required_iterations(b.2, n, p),
            _ => false,
        };
        if confident {
            return (best, iter + 1);
        }
    }

    (best, samples.len())
}

/// Number of iterations needed to draw one all-inlier pair with probability
/// `confidence`, given the current inlier ratio.
fn required_iterations(inliers: usize, n: usize, confidence: f64) -> usize {
    if inliers == 0 {
        return usize::MAX;
    }
    let w = inliers as f64 / n as f64;
    let p_fail = 1.0 - w * w;
    if p_fail <= f64::EPSILON {
        return 0;
    }
    let needed = (1.0 - confidence).ln() / p_fail.ln();
    if needed.is_finite() && needed >= 0.0 {
        needed.ceil() as usize
    } else {
        usize::MAX
    }
}

#[inline]
fn point_line_distance(origin: &Vector3<f64>, direction: &Vector3<f64>, point: &[f64; 3]) -> f64 {
    let v = Vector3::new(point[0], point[1], point[2]) - origin;
    v.cross(direction).norm()
}

/// Count inliers sequentially. Non-finite points never count.
#[inline]
fn count_inliers(
    points: &[[f64; 3]],
    origin: &Vector3<f64>,
    direction: &Vector3<f64>,
    threshold: f64,
) -> usize {
    points
        .iter()
        .filter(|p| point_line_distance(origin, direction, p) <= threshold)
        .count()
}

fn select_inliers(
    points: &[[f64; 3]],
    origin: &Vector3<f64>,
    direction: &Vector3<f64>,
    threshold: f64,
) -> Vec<usize> {
    (0..points.len())
        .filter(|&j| point_line_distance(origin, direction, &points[j]) <= threshold)
        .collect()
}

/// Samples 2 distinct indices in [0, n).
fn sample_two_distinct(n: usize, rng: &mut StdRng) -> Option<(usize, usize)> {
    if n < 2 {
        return None;
    }
    let i0 = rng.gen_range(0..n);
    let mut i1 = rng.gen_range(0..n);
    // Retry until distinct from i0
    let mut attempts = 0;
    while i1 == i0 {
        if attempts > 100 {
            return None;
        }
        i1 = rng.gen_range(0..n);
        attempts += 1;
    }
    Some((i0, i1))
}

/// Line through two points, `None` if they coincide or are not finite.
fn line_from_two_points(p0: &[f64; 3], p1: &[f64; 3]) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let origin = Vector3::new(p0[0], p0[1], p0[2]);
    let d = Vector3::new(p1[0], p1[1], p1[2]) - origin;
    let len = d.norm();
    if !len.is_finite() || len < 1e-12 || !origin.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some((origin, d / len))
}

/// Least-squares line through the given points: their centroid and the
/// eigenvector of the largest covariance eigenvalue.
fn least_squares_line(
    points: &[[f64; 3]],
    indices: &[usize],
) -> Option<(Vector3<f64>, Vector3<f64>)> {
    if indices.len() < 2 {
        return None;
    }

    let count = indices.len() as f64;
    let centroid = indices
        .iter()
        .map(|&i| Vector3::new(points[i][0], points[i][1], points[i][2]))
        .sum::<Vector3<f64>>()
        / count;

    let mut cov = Matrix3::zeros();
    for &i in indices {
        let d = Vector3::new(points[i][0], points[i][1], points[i][2]) - centroid;
        cov += d * d.transpose();
    }

    let eig = SymmetricEigen::new(cov);
    let (major, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let direction = eig.eigenvectors.column(major).normalize();
    if !direction.iter().all(|v| v.is_finite()) {
        return None;
    }

    Some((centroid, direction))
}
