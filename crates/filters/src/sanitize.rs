use depthseg_core::{HasPosition, PointCloud};
use log::debug;

/// Remove every invalid sample, keeping the relative order of the rest.
///
/// The result is unorganized (`height == 1`) and marked dense. An empty
/// result is valid. Any [`KdTree`](depthseg_spatial::KdTree) built over the
/// input must be rebuilt.
pub fn sanitize<T: HasPosition>(cloud: PointCloud<T>) -> PointCloud<T> {
    let before = cloud.len();
    let kept: Vec<T> = cloud.into_points().into_iter().filter(|p| p.is_valid()).collect();
    if kept.len() != before {
        debug!("sanitize: dropped {} of {} samples", before - kept.len(), before);
    }

    let mut out = PointCloud::from_points(kept);
    out.dense = true;
    out
}

/// Indices of the valid samples of `cloud`, in order.
pub fn valid_indices<T: HasPosition>(cloud: &PointCloud<T>) -> Vec<usize> {
    cloud
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_valid())
        .map(|(i, _)| i)
        .collect()
}
