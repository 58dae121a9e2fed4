use nalgebra::Point3;

use crate::cloud::PointCloud;
use crate::math::Aabb;

/// Calculate the bounding box of all points in the given `cloud`. Returns `None` if the cloud
/// contains zero points
pub fn calculate_bounds(cloud: &PointCloud) -> Option<Aabb> {
    let mut points = cloud.iter();
    let first = points.next()?;
    let mut bounds = Aabb::from_point(Point3::from(*first));
    for point in points {
        bounds = Aabb::extend_with_point(&bounds, &Point3::from(*point));
    }
    Some(bounds)
}

/// Calculate the axis-aligned bounding box of the cluster given by `indices` into `cloud`, by a
/// running minima/maxima scan over the referenced points. Returns `None` for an empty cluster;
/// clusters produced by the extractor are never empty, so callers may treat `None` as an
/// invariant violation
///
/// # Panics
///
/// If any index is out of bounds.
pub fn cluster_bounds(cloud: &PointCloud, indices: &[usize]) -> Option<Aabb> {
    let mut indices = indices.iter();
    let first = *indices.next()?;
    let mut bounds = Aabb::from_point(Point3::from(cloud.at(first)));
    for &index in indices {
        bounds = Aabb::extend_with_point(&bounds, &Point3::from(cloud.at(index)));
    }
    Some(bounds)
}
