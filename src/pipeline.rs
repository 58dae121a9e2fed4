use std::time::Instant;

use anyhow::Result;
use log::debug;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::bounds::cluster_bounds;
use crate::cloud::PointCloud;
use crate::clustering::extract_clusters;
use crate::math::Aabb;
use crate::segmentation::segment_plane;
use crate::voxel_grid::{crop_region, voxel_grid_filter};

/// Tunable parameters for one detection pass. These are plain numbers owned by the caller;
/// the pipeline does not persist any configuration.
#[derive(Debug, Clone)]
pub struct DetectorParams {
    /// Edge length of the voxel-grid cells used for downsampling; `None` skips downsampling
    pub voxel_leaf_size: Option<f64>,
    /// Region of interest; points outside are discarded before segmentation. `None` keeps the
    /// whole frame
    pub crop_region: Option<Aabb>,
    /// Number of RANSAC trials for the ground plane
    pub max_iterations: usize,
    /// Maximum point-to-plane distance for a ground inlier
    pub distance_tolerance: f64,
    /// Maximum neighbor distance during cluster expansion
    pub cluster_tolerance: f64,
    /// Clusters smaller than this are dropped
    pub min_cluster_size: usize,
    /// Clusters larger than this are dropped
    pub max_cluster_size: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            voxel_leaf_size: None,
            crop_region: None,
            max_iterations: 100,
            distance_tolerance: 0.2,
            cluster_tolerance: 0.5,
            min_cluster_size: 3,
            max_cluster_size: 10_000,
        }
    }
}

/// One detected obstacle: the cluster's points and their axis-aligned bounding box.
#[derive(Debug, Clone)]
pub struct Detection {
    pub points: PointCloud,
    pub bounds: Aabb,
}

/// The result of processing one frame. All contained clouds are frame-scoped; nothing is
/// carried over to the next frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The ground-plane inliers. Empty when no plane could be fit (fully degenerate input);
    /// in that case every filtered point was treated as an obstacle.
    pub ground: PointCloud,
    /// One detection per retained cluster, in cluster order
    pub detections: Vec<Detection>,
}

/// Runs the full per-frame pipeline over `cloud`: optional voxel downsample and region crop,
/// ground-plane segmentation, euclidean clustering of the obstacle points and one bounding box
/// per retained cluster.
///
/// `seed` drives the RANSAC sampling, so a frame reprocessed with the same parameters and seed
/// yields the same result.
///
/// # Errors
///
/// If the filtered cloud holds fewer than 3 points.
pub fn detect_obstacles(cloud: &PointCloud, params: &DetectorParams, seed: u64) -> Result<Frame> {
    let start = Instant::now();
    let mut filtered = match params.voxel_leaf_size {
        Some(leaf_size) => voxel_grid_filter(cloud, leaf_size),
        None => cloud.clone(),
    };
    if let Some(region) = &params.crop_region {
        filtered = crop_region(&filtered, region);
    }
    debug!(
        "filtering took {} ms ({} of {} points kept)",
        start.elapsed().as_millis(),
        filtered.len(),
        cloud.len()
    );

    let start = Instant::now();
    let mut rng = SmallRng::seed_from_u64(seed);
    let (ground, obstacles) = segment_plane(
        &filtered,
        params.max_iterations,
        params.distance_tolerance,
        &mut rng,
    )?;
    debug!(
        "plane segmentation took {} ms ({} ground, {} obstacle points)",
        start.elapsed().as_millis(),
        ground.len(),
        obstacles.len()
    );

    let start = Instant::now();
    let clusters = extract_clusters(
        &obstacles,
        params.cluster_tolerance,
        params.min_cluster_size.max(1),
        params.max_cluster_size,
    );
    let detections = clusters
        .iter()
        .map(|cluster| {
            let bounds =
                cluster_bounds(&obstacles, cluster).expect("retained clusters are never empty");
            Detection {
                points: obstacles.select(cluster),
                bounds,
            }
        })
        .collect::<Vec<_>>();
    debug!(
        "clustering took {} ms and found {} clusters",
        start.elapsed().as_millis(),
        detections.len()
    );

    Ok(Frame { ground, detections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_detect_obstacles_rejects_tiny_frames() {
        let cloud = PointCloud::from_points(vec![Vector3::new(0.0, 0.0, 0.0)]);
        assert!(detect_obstacles(&cloud, &DetectorParams::default(), 0).is_err());
    }

    #[test]
    fn test_detect_obstacles_is_reproducible() {
        let mut points = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                points.push(Vector3::new(i as f64 * 0.5, j as f64 * 0.5, 0.0));
            }
        }
        points.push(Vector3::new(2.0, 2.0, 1.0));
        points.push(Vector3::new(2.1, 2.0, 1.0));
        points.push(Vector3::new(2.0, 2.1, 1.0));
        let cloud = PointCloud::from_points(points);
        let params = DetectorParams::default();
        let first = detect_obstacles(&cloud, &params, 7).unwrap();
        let second = detect_obstacles(&cloud, &params, 7).unwrap();
        assert_eq!(first.ground, second.ground);
        assert_eq!(first.detections.len(), second.detections.len());
        for (a, b) in first.detections.iter().zip(&second.detections) {
            assert_eq!(a.points, b.points);
            assert_eq!(a.bounds, b.bounds);
        }
    }
}
