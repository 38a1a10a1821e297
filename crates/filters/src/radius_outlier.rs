use depthseg_core::{HasPosition, PointCloud};
use depthseg_spatial::KdTree;
use log::debug;
use rayon::prelude::*;

/// Keep the points that have at least `min_neighbors` other points within
/// `radius`.
///
/// A fresh [`KdTree`] is built over `cloud`. The query point itself is not
/// counted; exact duplicates of it are. Retained points keep their relative
/// order and the output is unorganized. A cloud with fewer than
/// `min_neighbors + 1` points therefore yields an empty result.
///
/// Neighbor counting runs in parallel; the result is identical to a
/// sequential pass.
pub fn radius_outlier_removal<T>(
    cloud: &PointCloud<T>,
    radius: f64,
    min_neighbors: usize,
) -> PointCloud<T>
where
    T: HasPosition + Clone + Sync,
{
    if cloud.is_empty() {
        return PointCloud::new_empty();
    }

    let tree = KdTree::build(cloud);
    let positions = cloud.positions();

    let keep: Vec<usize> = positions
        .par_iter()
        .enumerate()
        .filter(|(i, q)| {
            let neighbors = tree
                .radius_search(q, radius)
                .into_iter()
                .filter(|j| j != i)
                .count();
            neighbors >= min_neighbors
        })
        .map(|(i, _)| i)
        .collect();

    debug!(
        "radius_outlier_removal: kept {} of {} points (radius={}, min_neighbors={})",
        keep.len(),
        cloud.len(),
        radius,
        min_neighbors
    );

    cloud.select(&keep)
}
