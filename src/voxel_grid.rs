use nalgebra::{Point3, Vector3};

use crate::bounds::calculate_bounds;
use crate::cloud::PointCloud;
use crate::math::Aabb;

struct Voxel {
    pos: (usize, usize, usize),
    points: Vec<usize>,
}

/// Downsamples `cloud` by applying a voxel-grid filter with cubic cells of edge length
/// `leaf_size`: every occupied cell contributes the centroid of its points to the output.
/// A non-positive `leaf_size` leaves the cloud unchanged.
///
/// The output order follows the cell order of the grid, not the input order; downstream
/// stages treat the filtered cloud as a fresh frame with fresh indices.
///
/// ```
/// # use lidar_obstacles::cloud::PointCloud;
/// # use lidar_obstacles::voxel_grid::voxel_grid_filter;
/// # use nalgebra::Vector3;
/// let mut points = vec![];
/// for i in 0..10 {
///     for j in 0..10 {
///         points.push(Vector3::new(0.0, f64::from(i), f64::from(j)));
///     }
/// }
/// let cloud = points.into_iter().collect::<PointCloud>();
/// let filtered = voxel_grid_filter(&cloud, 1.5);
/// // filtered now has fewer points than cloud
/// assert!(filtered.len() < cloud.len() / 2);
/// ```
pub fn voxel_grid_filter(cloud: &PointCloud, leaf_size: f64) -> PointCloud {
    if leaf_size <= 0.0 {
        return cloud.clone();
    }
    let bounds = match calculate_bounds(cloud) {
        Some(bounds) => bounds,
        None => return PointCloud::new(),
    };

    // bin every point into its cell; the voxel list stays sorted by cell
    // coordinate so lookup is a binary search
    let mut voxels: Vec<Voxel> = Vec::new();
    for (index, point) in cloud.iter().enumerate() {
        let pos = (
            ((point.x - bounds.min().x) / leaf_size) as usize,
            ((point.y - bounds.min().y) / leaf_size) as usize,
            ((point.z - bounds.min().z) / leaf_size) as usize,
        );
        match voxels.binary_search_by_key(&pos, |v| v.pos) {
            Ok(existing) => voxels[existing].points.push(index),
            Err(insert_at) => voxels.insert(
                insert_at,
                Voxel {
                    pos,
                    points: vec![index],
                },
            ),
        }
    }

    voxels
        .iter()
        .map(|voxel| {
            let mut sum = Vector3::zeros();
            for &index in &voxel.points {
                sum += cloud.at(index);
            }
            sum / voxel.points.len() as f64
        })
        .collect()
}

/// Retains only the points of `cloud` that lie inside `region` (boundary inclusive). The
/// surviving points keep their relative order.
pub fn crop_region(cloud: &PointCloud, region: &Aabb) -> PointCloud {
    cloud
        .iter()
        .filter(|point| region.contains(&Point3::from(**point)))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn unit_grid() -> PointCloud {
        let mut points = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                for k in 0..10 {
                    points.push(Vector3::new(
                        f64::from(i) + 0.5,
                        f64::from(j) + 0.5,
                        f64::from(k) + 0.5,
                    ));
                    points.push(Vector3::new(
                        f64::from(i) + 0.6,
                        f64::from(j) + 0.6,
                        f64::from(k) + 0.6,
                    ));
                }
            }
        }
        PointCloud::from_points(points)
    }

    #[test]
    fn test_voxel_grid_filter_collapses_cells_to_centroids() {
        let cloud = unit_grid();
        assert_eq!(cloud.len(), 2000);
        let filtered = voxel_grid_filter(&cloud, 1.0);
        // two points per occupied cell collapse into one centroid
        assert_eq!(filtered.len(), 1000);
        let first = filtered.at(0);
        assert_approx_eq!(first.x, 0.55);
        assert_approx_eq!(first.y, 0.55);
        assert_approx_eq!(first.z, 0.55);
    }

    #[test]
    fn test_voxel_grid_filter_with_empty_cloud() {
        assert!(voxel_grid_filter(&PointCloud::new(), 1.0).is_empty());
    }

    #[test]
    fn test_voxel_grid_filter_with_non_positive_leaf_size() {
        let cloud = unit_grid();
        assert_eq!(voxel_grid_filter(&cloud, 0.0), cloud);
    }

    #[test]
    fn test_crop_region() {
        let cloud = PointCloud::from_points(vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(5.0, 5.0, 5.0),
            Vector3::new(1.0, 1.0, 1.0),
        ]);
        let region = Aabb::from_min_max(
            Point3::new(-1.0, -1.0, -1.0),
            Point3::new(2.0, 2.0, 2.0),
        );
        let cropped = crop_region(&cloud, &region);
        assert_eq!(cropped.len(), 2);
        assert_eq!(cropped.at(0), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(cropped.at(1), Vector3::new(1.0, 1.0, 1.0));
    }
}
