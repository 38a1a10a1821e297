//! Differential correctness tests for k-d tree Euclidean clustering.
//!
//! Compares `extract_cluster_indices` against a brute-force union-find
//! reference, including the order in which clusters are emitted.

use depthseg::segmentation::{extract_cluster_indices, extract_clusters};
use depthseg::{Point3D, PointCloud};
use rand::prelude::*;

// ────────────────── Brute-force reference ──────────────────

/// O(n^2) connected components. Clusters are ordered by their smallest
/// index, which is the seed the breadth-first extractor starts from.
fn brute_force_cluster(
    pts: &[[f64; 3]],
    tolerance: f64,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    let n = pts.len();
    let r2 = tolerance * tolerance;
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = pts[i][0] - pts[j][0];
            let dy = pts[i][1] - pts[j][1];
            let dz = pts[i][2] - pts[j][2];
            if dx * dx + dy * dy + dz * dz <= r2 {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let mut components: std::collections::BTreeMap<usize, Vec<usize>> =
        std::collections::BTreeMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        components.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<Vec<usize>> = components
        .into_values()
        .filter(|c| c.len() >= min_size && c.len() <= max_size)
        .collect();
    clusters.sort_by_key(|c| c[0]);
    clusters
}

/// Sort indices within each cluster, keeping the cluster order.
fn sorted_members(mut clusters: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    for c in &mut clusters {
        c.sort_unstable();
    }
    clusters
}

fn random_points(rng: &mut StdRng, n: usize, extent: f64) -> Vec<[f64; 3]> {
    (0..n)
        .map(|_| {
            [
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            ]
        })
        .collect()
}

fn to_cloud(pts: &[[f64; 3]]) -> PointCloud<Point3D> {
    pts.iter().map(|&p| Point3D::from(p)).collect()
}

// ────────────────── 1. Differential correctness ──────────────────

#[test]
fn differential_random_small_clouds() {
    let mut rng = StdRng::seed_from_u64(42);

    for trial in 0..200 {
        let n = rng.gen_range(2..80);
        let tolerance = rng.gen_range(0.5..5.0);
        let pts = random_points(&mut rng, n, 20.0);

        let got = sorted_members(extract_cluster_indices(&to_cloud(&pts), tolerance, 1, n));
        let expected = brute_force_cluster(&pts, tolerance, 1, n);

        assert_eq!(
            got, expected,
            "trial {}: n={}, tolerance={:.2}",
            trial, n, tolerance
        );
    }
}

#[test]
fn differential_with_size_limits() {
    let mut rng = StdRng::seed_from_u64(7);

    for trial in 0..50 {
        let n = rng.gen_range(50..300);
        let tolerance = rng.gen_range(1.0..6.0);
        let min_size = rng.gen_range(1..5);
        let max_size = min_size + rng.gen_range(0..30);
        let pts = random_points(&mut rng, n, 25.0);

        let got = sorted_members(extract_cluster_indices(
            &to_cloud(&pts),
            tolerance,
            min_size,
            max_size,
        ));
        let expected = brute_force_cluster(&pts, tolerance, min_size, max_size);

        assert_eq!(
            got, expected,
            "trial {}: n={}, tolerance={:.2}, size=[{}, {}]",
            trial, n, tolerance, min_size, max_size
        );
    }
}

#[test]
fn differential_medium_clouds() {
    let mut rng = StdRng::seed_from_u64(99);

    for trial in 0..10 {
        let n = rng.gen_range(500..1500);
        let tolerance = rng.gen_range(1.0..8.0);
        let pts = random_points(&mut rng, n, 50.0);

        let got = sorted_members(extract_cluster_indices(&to_cloud(&pts), tolerance, 1, n));
        let expected = brute_force_cluster(&pts, tolerance, 1, n);

        assert_eq!(got, expected, "trial {}: n={}", trial, n);
    }
}

// ────────────────── 2. Boundary tests ──────────────────

#[test]
fn points_exactly_at_tolerance_are_connected() {
    let cloud = to_cloud(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
    assert_eq!(extract_cluster_indices(&cloud, 1.0, 1, 100), vec![vec![0, 1]]);
}

#[test]
fn points_just_beyond_tolerance_are_separate() {
    let cloud = to_cloud(&[[0.0, 0.0, 0.0], [1.0 + 1e-9, 0.0, 0.0]]);
    assert_eq!(
        extract_cluster_indices(&cloud, 1.0, 1, 100),
        vec![vec![0], vec![1]]
    );
}

#[test]
fn very_large_coordinates() {
    let base = 1e6;
    let cloud = to_cloud(&[
        [base, base, 0.0],
        [base + 0.1, base, 0.0],
        [base + 0.2, base, 0.0],
        [base + 100.0, base, 0.0],
    ]);
    let clusters = extract_cluster_indices(&cloud, 0.5, 1, 100);
    assert_eq!(clusters, vec![vec![0, 1, 2], vec![3]]);
}

// ────────────────── 3. Metamorphic invariants ──────────────────

#[test]
fn shuffled_cloud_same_membership() {
    let mut rng = StdRng::seed_from_u64(55);
    let n = 200;
    let pts = random_points(&mut rng, n, 10.0);
    let original = extract_cluster_indices(&to_cloud(&pts), 2.0, 1, n);

    let mut membership_orig = vec![usize::MAX; n];
    for (cid, cluster) in original.iter().enumerate() {
        for &idx in cluster {
            membership_orig[idx] = cid;
        }
    }

    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut rng);
    let shuffled_pts: Vec<[f64; 3]> = perm.iter().map(|&i| pts[i]).collect();
    let shuffled = extract_cluster_indices(&to_cloud(&shuffled_pts), 2.0, 1, n);

    let mut membership_shuffled = vec![usize::MAX; n];
    for (cid, cluster) in shuffled.iter().enumerate() {
        for &new_idx in cluster {
            membership_shuffled[perm[new_idx]] = cid;
        }
    }

    assert_eq!(original.len(), shuffled.len());
    for i in 0..n {
        for j in (i + 1)..n {
            assert_eq!(
                membership_orig[i] == membership_orig[j],
                membership_shuffled[i] == membership_shuffled[j],
                "points {} and {} changed co-membership after shuffle",
                i,
                j
            );
        }
    }
}

#[test]
fn duplicate_points_share_a_cluster() {
    let cloud = to_cloud(&[
        [0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0],
        [10.0, 0.0, 0.0],
    ]);
    let clusters = extract_cluster_indices(&cloud, 1.0, 1, 100);
    assert_eq!(clusters.len(), 2);
    assert_eq!(sorted_members(clusters)[0], vec![0, 1, 2]);
}

#[test]
fn copied_clusters_match_indices() {
    let mut rng = StdRng::seed_from_u64(13);
    let pts = random_points(&mut rng, 300, 15.0);
    let cloud = to_cloud(&pts);

    let indices = extract_cluster_indices(&cloud, 2.5, 2, 300);
    let clusters = extract_clusters(&cloud, 2.5, 2, 300);
    assert_eq!(indices.len(), clusters.len());
    for (idx, cluster) in indices.iter().zip(&clusters) {
        assert_eq!(idx.len(), cluster.len());
        for (k, &i) in idx.iter().enumerate() {
            assert_eq!(cluster.points()[k], Point3D::from(pts[i]));
        }
    }
}

// ────────────────── 4. Determinism ──────────────────

#[test]
fn repeated_runs_are_identical() {
    let mut rng = StdRng::seed_from_u64(77);
    let n = 500;
    let cloud = to_cloud(&random_points(&mut rng, n, 20.0));

    let reference = extract_cluster_indices(&cloud, 2.0, 1, n);
    for run in 0..100 {
        let result = extract_cluster_indices(&cloud, 2.0, 1, n);
        assert_eq!(result, reference, "non-deterministic output on run {}", run);
    }
}

#[test]
fn no_points_lost_without_size_limits() {
    for &n in &[100usize, 1000] {
        let mut rng = StdRng::seed_from_u64(42);
        let cloud = to_cloud(&random_points(&mut rng, n, 20.0));
        for &r in &[0.5, 1.0, 2.0, 5.0] {
            let clusters = extract_cluster_indices(&cloud, r, 1, n);
            let total: usize = clusters.iter().map(Vec::len).sum();
            assert_eq!(total, n, "lost points at n={}, r={}", n, r);
        }
    }
}
