use depthseg_core::{Cluster, HasPosition, Point3D, PointCloud};
use depthseg_spatial::KdTree;
use log::debug;
use std::collections::VecDeque;

/// Partitions a point cloud into connected components under a
/// fixed-radius adjacency and returns the indices of each kept component.
///
/// Points whose pairwise distance is less than or equal to `tolerance` are
/// connected. A fresh [`KdTree`] is built over `cloud`. Components are
/// grown breadth-first from each unprocessed seed, in input order, and kept
/// only when their size lies in `[min_size, max_size]`.
///
/// Ordering guarantees:
/// - components are returned in the order their seed appears in `cloud`;
/// - indices inside a component are in discovery (BFS) order.
///
/// Points of a discarded component stay processed and are never reconsidered.
/// Samples with a non-finite position never join or seed a component.
pub fn extract_cluster_indices<T: HasPosition>(
    cloud: &PointCloud<T>,
    tolerance: f64,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    if cloud.is_empty() || !tolerance.is_finite() || tolerance < 0.0 || min_size > max_size {
        return Vec::new();
    }

    let tree = KdTree::build(cloud);
    let points = cloud.positions();
    let n = points.len();
    let mut processed = vec![false; n];
    let mut clusters = Vec::new();
    let mut discarded = 0usize;

    for seed in 0..n {
        if processed[seed] {
            continue;
        }
        processed[seed] = true;
        if !points[seed].iter().all(|v| v.is_finite()) {
            continue;
        }

        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);

        while let Some(current) = queue.pop_front() {
            for neighbor in tree.radius_search(&points[current], tolerance) {
                if !processed[neighbor] {
                    processed[neighbor] = true;
                    component.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }

        if (min_size..=max_size).contains(&component.len()) {
            clusters.push(component);
        } else {
            discarded += 1;
        }
    }

    debug!(
        "extract_cluster_indices: {} clusters kept, {} components discarded (tolerance={}, size=[{}, {}])",
        clusters.len(),
        discarded,
        tolerance,
        min_size,
        max_size
    );

    clusters
}

/// Same as [`extract_cluster_indices`] but copies every kept component out
/// of `cloud` into its own [`Cluster`] (dense, `height == 1`).
///
/// The source cloud is not modified; each cluster owns its points.
pub fn extract_clusters<T: HasPosition>(
    cloud: &PointCloud<T>,
    tolerance: f64,
    min_size: usize,
    max_size: usize,
) -> Vec<Cluster> {
    extract_cluster_indices(cloud, tolerance, min_size, max_size)
        .into_iter()
        .map(|indices| {
            let mut cluster: Cluster = indices
                .iter()
                .map(|&i| Point3D::from(cloud.position(i)))
                .collect();
            cluster.dense = true;
            cluster
        })
        .collect()
}
