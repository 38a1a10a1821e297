use depthseg_core::{GeometryError, HasPosition, NormalSample, Point3D, PointCloud};
use depthseg_spatial::KdTree;
use log::{debug, warn};
use nalgebra::Vector3;
use rayon::prelude::*;

use crate::eigen::{centroid_and_covariance, smallest_eigen, COLLINEAR_RATIO};

/// Minimum neighborhood size (query point included) for a covariance normal.
pub const MIN_NORMAL_NEIGHBORS: usize = 3;

/// Estimate a surface normal and curvature for every point from the
/// covariance of its radius neighborhood.
///
/// For each point, all points within `radius` (itself included) are
/// gathered from a fresh [`KdTree`], the covariance about their centroid is
/// formed with uniform weights, and the eigenvector of the smallest
/// eigenvalue is taken as the normal. Curvature is `λ0 / (λ0 + λ1 + λ2)`.
///
/// The sign of each normal is whatever the eigen-decomposition produced; no
/// viewpoint orientation is applied.
///
/// Points whose neighborhood is too small or degenerate keep their position
/// but get a NaN normal and curvature (see [`NormalSample::has_normal`]); the
/// output is then marked non-dense. The grid layout of `cloud` is kept.
///
/// The computation is parallelized across points using rayon.
pub fn estimate_normals<T>(cloud: &PointCloud<T>, radius: f64) -> PointCloud<NormalSample>
where
    T: HasPosition + Sync,
{
    if cloud.is_empty() {
        return PointCloud::new_empty();
    }

    let tree = KdTree::build(cloud);
    let points = cloud.positions();

    let estimates: Vec<Result<(Vector3<f32>, f32), GeometryError>> = (0..points.len())
        .into_par_iter()
        .map(|i| normal_from_neighborhood(&tree, &points, i, radius))
        .collect();

    let failed = estimates.iter().filter(|e| e.is_err()).count();
    if failed > 0 {
        let first = estimates.iter().find_map(|e| e.as_ref().err());
        warn!(
            "estimate_normals: {} of {} points have no normal (radius={}); first cause: {}",
            failed,
            points.len(),
            radius,
            first.map_or_else(String::new, ToString::to_string)
        );
    } else {
        debug!(
            "estimate_normals: {} normals (radius={})",
            points.len(),
            radius
        );
    }

    let mut out = cloud.map_indexed(|i, p| {
        let position = Point3D::from(p.position());
        match &estimates[i] {
            Ok((normal, curvature)) => NormalSample::new(position, *normal, *curvature),
            Err(_) => NormalSample::undefined(position),
        }
    });
    out.dense = failed == 0 && cloud.iter().all(|p| p.is_valid());
    out
}

/// Normal and curvature of a single point of the cloud `tree` was built
/// from.
///
/// # Errors
///
/// - [`GeometryError::InvalidInput`] if `index` is out of range or the point
///   is not finite.
/// - [`GeometryError::InsufficientNeighbors`] if fewer than
///   [`MIN_NORMAL_NEIGHBORS`] points lie within `radius`.
/// - [`GeometryError::DegenerateGeometry`] if the neighborhood is
///   coincident or collinear.
pub fn estimate_normal_at<T: HasPosition>(
    tree: &KdTree,
    cloud: &PointCloud<T>,
    index: usize,
    radius: f64,
) -> Result<(Vector3<f32>, f32), GeometryError> {
    if index >= cloud.len() {
        return Err(GeometryError::InvalidInput(format!(
            "index {} out of range for {} points",
            index,
            cloud.len()
        )));
    }
    normal_from_neighborhood(tree, &cloud.positions(), index, radius)
}

fn normal_from_neighborhood(
    tree: &KdTree,
    points: &[[f64; 3]],
    index: usize,
    radius: f64,
) -> Result<(Vector3<f32>, f32), GeometryError> {
    let query = &points[index];
    if !query.iter().all(|v| v.is_finite()) {
        return Err(GeometryError::InvalidInput(format!(
            "point {} is not finite",
            index
        )));
    }

    let neighbors = tree.radius_search(query, radius);
    if neighbors.len() < MIN_NORMAL_NEIGHBORS {
        return Err(GeometryError::InsufficientNeighbors {
            found: neighbors.len(),
            required: MIN_NORMAL_NEIGHBORS,
        });
    }

    let (_, cov) = centroid_and_covariance(points, &neighbors)
        .ok_or_else(|| GeometryError::DegenerateGeometry("empty neighborhood".into()))?;
    let eig = smallest_eigen(&cov).ok_or_else(|| {
        GeometryError::DegenerateGeometry(format!("no unique normal at point {}", index))
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

    Ok((eig.vector.cast::<f32>(), (l0 / sum) as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    /// Helper: a grid of points on the z=0 plane.
    fn xy_plane_cloud(grid_size: usize, spacing: f64) -> PointCloud<Point3D> {
        let mut pts = Vec::new();
        for i in 0..grid_size {
            for j in 0..grid_size {
                pts.push(Point3D::new(i as f64 * spacing, j as f64 * spacing, 0.0));
            }
        }
        pts.into_iter().collect()
    }

    /// Helper: points on a unit sphere centered at the origin.
    fn sphere_cloud(n_lat: usize, n_lon: usize) -> PointCloud<Point3D> {
        let mut pts = Vec::new();
        for i in 1..n_lat {
            let theta = std::f64::consts::PI * i as f64 / n_lat as f64;
            for j in 0..n_lon {
                let phi = 2.0 * std::f64::consts::PI * j as f64 / n_lon as f64;
                pts.push(Point3D::new(
                    theta.sin() * phi.cos(),
                    theta.sin() * phi.sin(),
                    theta.cos(),
                ));
            }
        }
        pts.into_iter().collect()
    }

    #[test]
    fn plane_normals_point_along_z() {
        let cloud = xy_plane_cloud(20, 0.1);
        let normals = estimate_normals(&cloud, 0.25);
        assert_eq!(normals.len(), cloud.len());
        assert!(normals.dense);
        for s in normals.iter() {
            assert!(s.has_normal());
            assert_abs_diff_eq!(s.normal.z.abs(), 1.0, epsilon = 1e-3);
            assert!(s.curvature < 1e-3, "flat patch curvature {}", s.curvature);
        }
    }

    #[test]
    fn normals_are_unit_length() {
        let cloud = sphere_cloud(20, 30);
        let normals = estimate_normals(&cloud, 0.3);
        for s in normals.iter().filter(|s| s.has_normal()) {
            assert_abs_diff_eq!(s.normal.norm(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn sphere_normals_are_radial_up_to_sign() {
        let cloud = sphere_cloud(20, 30);
        let normals = estimate_normals(&cloud, 0.3);
        for s in normals.iter().filter(|s| s.has_normal()) {
            let radial = Vector3::new(s.x, s.y, s.z).normalize().cast::<f32>();
            assert!(
                s.normal.dot(&radial).abs() > 0.9,
                "normal {:?} not radial at {:?}",
                s.normal,
                radial
            );
            assert!(s.curvature > 0.0);
        }
    }

    #[test]
    fn isolated_point_is_flagged() {
        let mut pts: Vec<Point3D> = xy_plane_cloud(5, 0.1).into_points();
        pts.push(Point3D::new(100.0, 100.0, 100.0));
        let cloud: PointCloud<Point3D> = pts.into_iter().collect();

        let normals = estimate_normals(&cloud, 0.25);
        assert_eq!(normals.len(), 26);
        assert!(!normals.dense);
        assert!(!normals.points()[25].has_normal());
        assert_eq!(normals.points()[25].x, 100.0);
        assert!(normals.points()[..25].iter().all(NormalSample::has_normal));
    }

    #[test]
    fn per_point_errors_are_typed() {
        let line: PointCloud<Point3D> =
            (0..10).map(|i| Point3D::new(i as f64 * 0.1, 0.0, 0.0)).collect();
        let tree = KdTree::build(&line);
        assert!(matches!(
            estimate_normal_at(&tree, &line, 5, 0.5),
            Err(GeometryError::DegenerateGeometry(_))
        ));
        assert_eq!(
            estimate_normal_at(&tree, &line, 0, 0.05),
            Err(GeometryError::InsufficientNeighbors {
                found: 1,
                required: MIN_NORMAL_NEIGHBORS
            })
        );
        assert!(matches!(
            estimate_normal_at(&tree, &line, 10, 0.5),
            Err(GeometryError::InvalidInput(_))
        ));
    }

    #[test]
    fn organized_layout_is_kept() {
        let flat = xy_plane_cloud(4, 0.1).into_points();
        let cloud = PointCloud::new(flat, 4, 4).unwrap();
        let normals = estimate_normals(&cloud, 0.25);
        assert_eq!(normals.width(), 4);
        assert_eq!(normals.height(), 4);
    }

    #[test]
    fn empty_cloud() {
        let cloud = PointCloud::<Point3D>::new_empty();
        assert!(estimate_normals(&cloud, 0.1).is_empty());
    }

    proptest! {
        #[test]
        fn output_matches_input_length(
            pts in prop::collection::vec(
                (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
                0..150
            ),
            radius in 0.05f64..1.0,
        ) {
            let cloud: PointCloud<Point3D> =
                pts.iter().map(|p| Point3D::new(p.0, p.1, p.2)).collect();
            let normals = estimate_normals(&cloud, radius);
            prop_assert_eq!(normals.len(), cloud.len());
            for (s, p) in normals.iter().zip(cloud.iter()) {
                prop_assert_eq!(s.position(), p.position());
                if s.has_normal() {
                    prop_assert!((s.normal.norm() - 1.0).abs() < 1e-3);
                    prop_assert!(s.curvature >= 0.0 && s.curvature <= 1.0 / 3.0 + 1e-4);
                }
            }
        }
    }
}
