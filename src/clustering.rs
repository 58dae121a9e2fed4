use std::collections::VecDeque;

use crate::cloud::PointCloud;
use crate::kd_tree::KdTree;

/// Groups `cloud` into spatially connected clusters (euclidean clustering).
///
/// Two points are connected when they are at most `tolerance` apart, directly or through a
/// chain of intermediate points. Each returned cluster is the set of indices of one connected
/// component, discovered by breadth-first expansion over a k-d tree built once for the call.
/// Candidate components whose size falls outside `[min_size, max_size]` are dropped, their
/// points are not reassigned to any other cluster.
///
/// Clusters appear in the order of their seed point's index; within a cluster, indices are in
/// expansion order. Clusters are pairwise disjoint by construction.
///
/// ```
/// # use lidar_obstacles::cloud::PointCloud;
/// # use lidar_obstacles::clustering::extract_clusters;
/// # use nalgebra::Vector3;
/// let cloud = PointCloud::from_points(vec![
///     Vector3::new(0.0, 0.0, 0.0),
///     Vector3::new(0.4, 0.0, 0.0),
///     Vector3::new(10.0, 0.0, 0.0),
///     Vector3::new(10.4, 0.0, 0.0),
/// ]);
/// let clusters = extract_clusters(&cloud, 1.0, 1, 100);
/// assert_eq!(clusters, vec![vec![0, 1], vec![2, 3]]);
/// ```
pub fn extract_clusters(
    cloud: &PointCloud,
    tolerance: f64,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    let tree = KdTree::build(cloud);
    let mut processed = vec![false; cloud.len()];
    let mut clusters = Vec::new();

    for seed in 0..cloud.len() {
        if processed[seed] {
            continue;
        }
        processed[seed] = true;
        let mut members = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(seed);
        while let Some(index) = queue.pop_front() {
            members.push(index);
            for neighbor in tree.within_radius(&cloud.at(index), tolerance) {
                // mark on enqueue so overlapping neighborhoods cannot
                // enqueue a point twice
                if !processed[neighbor] {
                    processed[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        if members.len() >= min_size && members.len() <= max_size {
            clusters.push(members);
        }
    }

    clusters
}
