use depthseg_core::{HasPosition, PointCloud};
use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use std::num::NonZero;

/// Per-axis multipliers of the additive recurrence that spreads indexed
/// coordinates apart (inverse powers of the plastic number's 3D analogue).
const SPREAD: [f64; 3] = [
    0.819_172_513_396_164_5,
    0.671_043_606_703_789_3,
    0.549_700_477_970_370_3,
];

/// Upper bound on the spread offset, relative to the cloud's coordinate scale.
const SPREAD_SCALE: f64 = 1e-9;

/// A KdTree for spatial queries on 3D point clouds.
///
/// Built on top of kiddo v5's `ImmutableKdTree`, which uses a cache-optimized
/// layout. The tree is a snapshot of the cloud's positions at build time:
/// any mutation of the cloud afterwards requires a rebuild.
///
/// kiddo's leaves cannot hold more than a bucket's worth of points sharing a
/// value on the split axis, and depth frames routinely have that many (flat
/// walls, quantized depth, `(0, 0, 0)` dropouts). The tree therefore indexes
/// each point shifted by a distinct offset far below sensor resolution and
/// every query
/// re-checks candidates against the exact positions, so results match a
/// brute-force scan.
///
/// Points with a non-finite coordinate are not indexed, so they are never
/// returned by a query. Returned indices always refer to the source cloud.
#[derive(Debug, Clone)]
pub struct KdTree {
    tree: ImmutableKdTree<f64, u32, 3, 32>,
    /// Exact position of each indexed point, in tree item order.
    points: Vec<[f64; 3]>,
    /// Source-cloud index of each indexed point.
    source_index: Vec<u32>,
    /// Bound on how far an indexed position sits from its exact position.
    slack: f64,
}

impl KdTree {
    /// Build a KdTree from a PointCloud.
    ///
    /// Finite positions are extracted into a contiguous `[[f64; 3]]` slice and
    /// fed to kiddo's `ImmutableKdTree` constructor, which builds a balanced
    /// tree in one O(n log n) pass. The cloud is only read.
    ///
    /// # Panics
    ///
    /// Panics if the cloud has more than `u32::MAX` points.
    pub fn build<T: HasPosition>(cloud: &PointCloud<T>) -> Self {
        assert!(
            cloud.len() <= u32::MAX as usize,
            "cloud too large for a u32-indexed tree"
        );

        let mut points = Vec::with_capacity(cloud.len());
        let mut source_index = Vec::with_capacity(cloud.len());
        for (i, p) in cloud.iter().enumerate() {
            let q = p.position();
            if q.iter().all(|v| v.is_finite()) {
                points.push(q);
                source_index.push(i as u32);
            }
        }

        let scale = points
            .iter()
            .flatten()
            .fold(1.0f64, |m, v| m.max(v.abs()));
        let step = SPREAD_SCALE * scale;

        let spread: Vec<[f64; 3]> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let n = (i + 1) as f64;
                [
                    p[0] + step * (n * SPREAD[0]).fract(),
                    p[1] + step * (n * SPREAD[1]).fract(),
                    p[2] + step * (n * SPREAD[2]).fract(),
                ]
            })
            .collect();

        Self {
            tree: ImmutableKdTree::new_from_slice(&spread),
            points,
            source_index,
            // Each offset component is below `step`, so the shift is below
            // sqrt(3) * step.
            slack: 2.0 * step,
        }
    }

    /// Returns the number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    fn exact_dist_sq(&self, item: usize, query: &[f64; 3]) -> f64 {
        let p = &self.points[item];
        let (dx, dy, dz) = (p[0] - query[0], p[1] - query[1], p[2] - query[2]);
        dx * dx + dy * dy + dz * dz
    }

    /// Find the `k` nearest neighbours to `query`.
    ///
    /// Returns `(indices, distances)` where distances are **Euclidean**
    /// (not squared), sorted ascending. Points at equal distance are ordered
    /// by their index in the source cloud, including at the k-th position.
    ///
    /// Edge cases:
    /// - Returns empty if `k == 0`, cloud is empty, or query contains NaN.
    /// - If `k > len()`, returns all points.
    pub fn knn(&self, query: &[f64; 3], k: usize) -> (Vec<usize>, Vec<f64>) {
        let Some(nz_k) = NonZero::new(k) else {
            return (Vec::new(), Vec::new());
        };
        if self.is_empty() || !query.iter().all(|v| v.is_finite()) {
            return (Vec::new(), Vec::new());
        }

        let mut hits: Vec<(f64, usize)> = if k >= self.len() {
            (0..self.len())
                .map(|item| (self.exact_dist_sq(item, query), item))
                .collect()
        } else {
            // The k indexed neighbours are at most `slack` further away in
            // exact terms, so the exact k nearest (ties included) all lie
            // within this bound.
            let kth = self
                .tree
                .nearest_n::<SquaredEuclidean>(query, nz_k)
                .iter()
                .fold(0.0f64, |m, nn| m.max(nn.distance));
            self.within_exact(query, kth.sqrt() + self.slack)
        };

        hits.sort_unstable_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(self.source_index[a.1].cmp(&self.source_index[b.1]))
        });
        hits.truncate(k);

        hits.into_iter()
            .map(|(d, item)| (self.source_index[item] as usize, d.sqrt()))
            .unzip()
    }

    /// Find the `k` nearest neighbours to `query`, returning only indices.
    pub fn knn_indices(&self, query: &[f64; 3], k: usize) -> Vec<usize> {
        self.knn(query, k).0
    }

    /// Find all points within `radius` (Euclidean distance) of `query`.
    ///
    /// Returns indices of points where `euclidean_dist <= radius`, sorted by
    /// index. A radius of zero returns exact duplicates of `query`.
    ///
    /// Edge cases:
    /// - Returns empty if radius < 0, cloud is empty, radius is non-finite,
    ///   or query contains NaN.
    pub fn radius_search(&self, query: &[f64; 3], radius: f64) -> Vec<usize> {
        if self.is_empty()
            || radius < 0.0
            || !radius.is_finite()
            || !query.iter().all(|v| v.is_finite())
        {
            return Vec::new();
        }

        let mut indices: Vec<usize> = self
            .within_exact(query, radius)
            .into_iter()
            .map(|(_, item)| self.source_index[item] as usize)
            .collect();

        // Sort by index for deterministic output order
        indices.sort_unstable();

        indices
    }

    /// All `(exact squared distance, tree item)` pairs with exact distance
    /// `<= radius`, unordered.
    fn within_exact(&self, query: &[f64; 3], radius: f64) -> Vec<(f64, usize)> {
        // Widen by the spread slack so every exact match is a candidate, then
        // filter on the exact positions with an inclusive bound.
        let radius_sq = radius * radius;
        let widened = radius + self.slack;
        let query_radius_sq = widened * widened * (1.0 + 4.0 * f64::EPSILON);

        self.tree
            .within_unsorted::<SquaredEuclidean>(query, query_radius_sq)
            .into_iter()
            .filter_map(|nn| {
                let item = nn.item as usize;
                let d = self.exact_dist_sq(item, query);
                (d <= radius_sq).then_some((d, item))
            })
            .collect()
    }
}
