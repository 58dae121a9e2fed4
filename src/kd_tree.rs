use float_ord::FloatOrd;
use nalgebra::Vector3;

use crate::cloud::PointCloud;

/// Balanced 3D k-d tree over the indices of a [`PointCloud`].
///
/// The tree is an index permutation arranged so that every subtree occupies
/// a contiguous range with its root at the middle, split on axis
/// `depth % 3`. It is built once per cloud and read-only afterwards, which
/// makes concurrent queries safe. Build is O(n log n), a radius query is
/// expected O(log n + k) for k results.
///
/// ```
/// # use lidar_obstacles::cloud::PointCloud;
/// # use lidar_obstacles::kd_tree::KdTree;
/// # use nalgebra::Vector3;
/// let cloud = PointCloud::from_points(vec![
///     Vector3::new(0.0, 0.0, 0.0),
///     Vector3::new(0.5, 0.0, 0.0),
///     Vector3::new(9.0, 9.0, 9.0),
/// ]);
/// let tree = KdTree::build(&cloud);
/// let mut neighbors = tree.within_radius(&Vector3::new(0.0, 0.0, 0.0), 1.0);
/// neighbors.sort_unstable();
/// assert_eq!(neighbors, vec![0, 1]);
/// ```
pub struct KdTree<'a> {
    points: &'a [Vector3<f64>],
    // kd-ordering of the point indices: for a range [lo, hi) the node point
    // sits at lo + (hi - lo) / 2, its left subtree occupies [lo, mid) and
    // its right subtree [mid + 1, hi)
    ordered: Vec<usize>,
}

impl<'a> KdTree<'a> {
    /// Builds a tree over all points of `cloud`. The tree borrows the cloud, so queries always
    /// run against the exact points the tree was built from.
    pub fn build(cloud: &'a PointCloud) -> Self {
        let points = cloud.points();
        let mut ordered: Vec<usize> = (0..points.len()).collect();
        build_range(points, &mut ordered, 0);
        Self { points, ordered }
    }

    /// The number of indexed points
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true if the tree indexes no points
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Returns the indices of all points within `radius` of `query` (boundary inclusive). The
    /// result order follows the tree traversal and is deterministic for a given cloud.
    pub fn within_radius(&self, query: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        if !self.ordered.is_empty() && radius >= 0.0 {
            self.query_range(0, self.ordered.len(), 0, query, radius, &mut found);
        }
        found
    }

    fn query_range(
        &self,
        lo: usize,
        hi: usize,
        axis: usize,
        query: &Vector3<f64>,
        radius: f64,
        found: &mut Vec<usize>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let index = self.ordered[mid];
        let point = &self.points[index];
        if (point - query).norm_squared() <= radius * radius {
            found.push(index);
        }
        let to_split = query[axis] - point[axis];
        let next = (axis + 1) % 3;
        // always descend into the half containing the query; cross the
        // splitting plane only when the search sphere reaches it
        if to_split <= 0.0 {
            self.query_range(lo, mid, next, query, radius, found);
            if -to_split <= radius {
                self.query_range(mid + 1, hi, next, query, radius, found);
            }
        } else {
            self.query_range(mid + 1, hi, next, query, radius, found);
            if to_split <= radius {
                self.query_range(lo, mid, next, query, radius, found);
            }
        }
    }
}

fn build_range(points: &[Vector3<f64>], ordered: &mut [usize], axis: usize) {
    if ordered.len() <= 1 {
        return;
    }
    let mid = ordered.len() / 2;
    ordered.select_nth_unstable_by_key(mid, |&index| FloatOrd(points[index][axis]));
    let next = (axis + 1) % 3;
    let (left, rest) = ordered.split_at_mut(mid);
    build_range(points, left, next);
    build_range(points, &mut rest[1..], next);
}
