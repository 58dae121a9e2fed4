#![warn(clippy::all)]
//! Obstacle detection over lidar point clouds.
//!
//! Given one frame of 3D samples, the crate separates the ground plane from
//! everything else via RANSAC, groups the remaining points into spatially
//! connected clusters and computes one axis-aligned bounding box per cluster.
//! All algorithms work on index sets over a single flat point array per
//! frame, so no stage copies point data it does not own.

// Axis-aligned bounding boxes for whole clouds and for clusters.
pub mod bounds;
// Frame-scoped point container, addressed by index.
pub mod cloud;
// Euclidean clustering of obstacle points via breadth-first expansion.
pub mod clustering;
// Balanced k-d tree that backs the radius searches during clustering.
pub mod kd_tree;
// Shared geometric primitives.
pub mod math;
// Per-frame orchestration: filter, segment, cluster, box.
pub mod pipeline;
// RANSAC plane segmentation in serial and parallel, plus the
// ground/obstacle split derived from the best plane.
pub mod segmentation;
// Voxel-grid downsampling and region cropping of raw frames.
pub mod voxel_grid;
