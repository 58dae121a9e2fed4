use anyhow::{bail, Result};
use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::cloud::PointCloud;

/// A plane hypothesis with a normal shorter than this is considered degenerate (the three
/// sampled points were collinear or duplicated) and scores zero inliers.
const DEGENERATE_NORMAL_EPSILON: f64 = 1e-12;

/// Represents a plane in coordinate-form: ax + by + cz + d = 0, normalized so that (a, b, c) is
/// a unit normal. The ranking shows how many points of the point cloud are inliers for this
/// specific plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub ranking: usize,
}

impl Plane {
    /// The plane spanned by three points, or `None` if the points are collinear (the cross
    /// product of the edge vectors has near-zero length, so no unique plane exists)
    pub fn from_triple(
        first: &Vector3<f64>,
        second: &Vector3<f64>,
        third: &Vector3<f64>,
    ) -> Option<Plane> {
        let normal = (second - first).cross(&(third - first));
        let magnitude = normal.norm();
        if magnitude <= DEGENERATE_NORMAL_EPSILON {
            return None;
        }
        let normal = normal / magnitude;
        Some(Plane {
            a: normal.x,
            b: normal.y,
            c: normal.z,
            d: -normal.dot(first),
            ranking: 0,
        })
    }

    /// The unsigned distance between `point` and this plane. Since the coefficients are
    /// normalized, no division by the normal's magnitude is required.
    pub fn distance(&self, point: &Vector3<f64>) -> f64 {
        (self.a * point.x + self.b * point.y + self.c * point.z + self.d).abs()
    }
}

/// The best plane found by a RANSAC search together with the indices of its inliers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    pub plane: Plane,
    pub inliers: Vec<usize>,
}

/// samples three distinct point indices uniformly at random
fn sample_triple<R: Rng + ?Sized>(rng: &mut R, len: usize) -> [usize; 3] {
    let first = rng.gen_range(0..len);
    let mut second = rng.gen_range(0..len);
    while second == first {
        second = rng.gen_range(0..len);
    }
    let mut third = rng.gen_range(0..len);
    while third == first || third == second {
        third = rng.gen_range(0..len);
    }
    [first, second, third]
}

/// Generates one plane hypothesis from a random triple and scores it against the whole cloud.
/// Returns `None` for a degenerate (collinear) sample, which counts as zero inliers for this
/// iteration.
fn generate_plane_model<R: Rng + ?Sized>(
    cloud: &PointCloud,
    distance_tolerance: f64,
    rng: &mut R,
) -> Option<PlaneFit> {
    let [first, second, third] = sample_triple(rng, cloud.len());
    let mut plane = Plane::from_triple(&cloud.at(first), &cloud.at(second), &cloud.at(third))?;
    let mut inliers = Vec::new();
    // the sampled points themselves sit at distance zero and pass trivially
    for (index, point) in cloud.iter().enumerate() {
        if plane.distance(point) <= distance_tolerance {
            plane.ranking += 1;
            inliers.push(index);
        }
    }
    Some(PlaneFit { plane, inliers })
}

/// RANSAC plane search over `cloud`.
///
/// Runs `max_iterations` random trials and returns the plane with the most inliers together
/// with their indices, in index order. Ties keep the first hypothesis found. Returns `None`
/// when every sampled triple was degenerate, i.e. the cloud contains no three non-collinear
/// points among the samples.
///
/// The random source is injected so trials are reproducible; pass a seeded `StdRng` or
/// `SmallRng` in tests.
///
/// ```
/// # use lidar_obstacles::cloud::PointCloud;
/// # use lidar_obstacles::segmentation::ransac_plane;
/// # use nalgebra::Vector3;
/// # use rand::SeedableRng;
/// let mut points = vec![];
/// // generate some inliers on the z = 0 plane
/// for i in 0..20 {
///     points.push(Vector3::new(f64::from(i), f64::from(i * i), 0.0));
/// }
/// // generate an outlier
/// points.push(Vector3::new(3.0, 1.0, 9.0));
/// let cloud = points.into_iter().collect::<PointCloud>();
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let fit = ransac_plane(&cloud, 0.5, 50, &mut rng).unwrap().unwrap();
/// assert_eq!(fit.inliers, (0..20).collect::<Vec<_>>());
/// ```
///
/// # Errors
///
/// If the cloud holds fewer than 3 points.
pub fn ransac_plane<R: Rng + ?Sized>(
    cloud: &PointCloud,
    distance_tolerance: f64,
    max_iterations: usize,
    rng: &mut R,
) -> Result<Option<PlaneFit>> {
    if cloud.len() < 3 {
        bail!(
            "cloud needs to include at least 3 points to generate a plane, got {}",
            cloud.len()
        );
    }
    let mut best: Option<PlaneFit> = None;
    for _ in 0..max_iterations {
        let candidate = match generate_plane_model(cloud, distance_tolerance, rng) {
            Some(fit) => fit,
            None => continue,
        };
        // strict improvement only, so the first hypothesis wins ties
        let improved = match &best {
            Some(fit) => candidate.inliers.len() > fit.inliers.len(),
            None => true,
        };
        if improved {
            best = Some(candidate);
        }
    }
    Ok(best)
}

/// RANSAC plane search in parallel (for maximum speed; for small clouds prefer
/// [`ransac_plane`]).
///
/// Each iteration draws its triple from a `SmallRng` derived from `seed` and the iteration
/// index, so results are reproducible regardless of how rayon schedules the trials. The
/// reduction breaks ranking ties towards the lower iteration index, matching the first-found
/// rule of the serial search.
///
/// # Errors
///
/// If the cloud holds fewer than 3 points.
pub fn ransac_plane_par(
    cloud: &PointCloud,
    distance_tolerance: f64,
    max_iterations: usize,
    seed: u64,
) -> Result<Option<PlaneFit>> {
    if cloud.len() < 3 {
        bail!(
            "cloud needs to include at least 3 points to generate a plane, got {}",
            cloud.len()
        );
    }
    let best = (0..max_iterations)
        .into_par_iter()
        .filter_map(|iteration| {
            let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(iteration as u64));
            generate_plane_model(cloud, distance_tolerance, &mut rng)
                .map(|fit| (iteration, fit))
        })
        .reduce_with(|best, candidate| {
            let better = candidate.1.inliers.len() > best.1.inliers.len()
                || (candidate.1.inliers.len() == best.1.inliers.len() && candidate.0 < best.0);
            if better {
                candidate
            } else {
                best
            }
        });
    Ok(best.map(|(_, fit)| fit))
}

/// Segments `cloud` into the ground plane and everything else.
///
/// Runs [`ransac_plane`] and splits the cloud into (plane cloud, obstacle cloud) along the best
/// inlier set. The split is a stable, order-preserving filter over the input. If all sampled
/// triples were degenerate the plane cloud is empty and the full input is returned as
/// obstacles; callers should treat that as a signal to skip ground removal for this frame.
///
/// # Errors
///
/// If the cloud holds fewer than 3 points.
pub fn segment_plane<R: Rng + ?Sized>(
    cloud: &PointCloud,
    max_iterations: usize,
    distance_tolerance: f64,
    rng: &mut R,
) -> Result<(PointCloud, PointCloud)> {
    let fit = ransac_plane(cloud, distance_tolerance, max_iterations, rng)?;
    Ok(match fit {
        Some(fit) => cloud.partition(&fit.inliers),
        None => (PointCloud::new(), cloud.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;

    fn setup_point_cloud() -> PointCloud {
        // 1600 points on the z = 1 plane, 400 points off it
        (2..2002)
            .map(|p| {
                if p % 5 == 0 {
                    Vector3::new(0.0, 0.0, (p * p) as f64)
                } else {
                    Vector3::new(p as f64, (p * p) as f64, 1.0)
                }
            })
            .collect()
    }

    #[test]
    fn test_plane_from_triple_is_normalized() {
        let plane = Plane::from_triple(
            &Vector3::new(0.0, 0.0, 2.0),
            &Vector3::new(1.0, 0.0, 2.0),
            &Vector3::new(0.0, 1.0, 2.0),
        )
        .unwrap();
        assert_approx_eq!(
            (plane.a * plane.a + plane.b * plane.b + plane.c * plane.c).sqrt(),
            1.0
        );
        // the plane passes through all three input points
        assert_approx_eq!(plane.distance(&Vector3::new(0.0, 0.0, 2.0)), 0.0);
        assert_approx_eq!(plane.distance(&Vector3::new(5.0, -3.0, 2.0)), 0.0);
        assert_approx_eq!(plane.distance(&Vector3::new(0.0, 0.0, 3.0)), 1.0);
    }

    #[test]
    fn test_plane_from_collinear_triple_is_degenerate() {
        assert!(Plane::from_triple(
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(1.0, 1.0, 1.0),
            &Vector3::new(2.0, 2.0, 2.0),
        )
        .is_none());
    }

    #[test]
    fn test_ransac_plane() {
        let cloud = setup_point_cloud();
        let mut rng = StdRng::seed_from_u64(0);
        let fit = ransac_plane(&cloud, 0.1, 300, &mut rng).unwrap().unwrap();
        assert_eq!(fit.inliers.len(), 1600);
        assert_eq!(fit.plane.ranking, 1600);
        for i in 0..2000 {
            if i % 5 != 3 {
                assert!(fit.inliers.contains(&i));
            }
        }
    }

    #[test]
    fn test_ransac_plane_par() {
        let cloud = setup_point_cloud();
        let fit = ransac_plane_par(&cloud, 0.1, 300, 0).unwrap().unwrap();
        assert_eq!(fit.inliers.len(), 1600);
        for i in 0..2000 {
            if i % 5 != 3 {
                assert!(fit.inliers.contains(&i));
            }
        }
    }

    #[test]
    fn test_ransac_plane_par_is_reproducible() {
        let cloud = setup_point_cloud();
        let first = ransac_plane_par(&cloud, 0.1, 50, 123).unwrap();
        let second = ransac_plane_par(&cloud, 0.1, 50, 123).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_noise_plane_catches_every_point() {
        // all points exactly on x + y + z = 1
        let cloud: PointCloud = (0..30)
            .map(|i| {
                let x = (i % 6) as f64;
                let y = (i / 6) as f64;
                Vector3::new(x, y, 1.0 - x - y)
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(1);
        let fit = ransac_plane(&cloud, 1e-9, 50, &mut rng).unwrap().unwrap();
        assert_eq!(fit.inliers.len(), cloud.len());
    }

    #[test]
    fn test_segment_plane_partitions_the_cloud() {
        let cloud = setup_point_cloud();
        let mut rng = StdRng::seed_from_u64(0);
        let (plane_cloud, obstacle_cloud) =
            segment_plane(&cloud, 300, 0.1, &mut rng).unwrap();
        assert_eq!(plane_cloud.len() + obstacle_cloud.len(), cloud.len());
        assert_eq!(plane_cloud.len(), 1600);
        for point in &plane_cloud {
            assert_approx_eq!(point.z, 1.0);
        }
        for point in &obstacle_cloud {
            assert!(point.z > 1.5);
        }
    }

    #[test]
    fn test_segment_plane_rejects_tiny_clouds() {
        let cloud = PointCloud::from_points(vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        ]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(segment_plane(&cloud, 10, 0.1, &mut rng).is_err());
    }

    #[test]
    fn test_fully_collinear_cloud_yields_no_plane() {
        let cloud: PointCloud = (0..10)
            .map(|i| Vector3::new(i as f64, i as f64, i as f64))
            .collect();
        let mut rng = StdRng::seed_from_u64(0);
        let (plane_cloud, obstacle_cloud) = segment_plane(&cloud, 100, 0.1, &mut rng).unwrap();
        assert!(plane_cloud.is_empty());
        assert_eq!(obstacle_cloud, cloud);
    }

    #[test]
    fn test_scattered_plane_recovery_across_seeds() {
        // 10 near-plane points with mild z scatter plus 10 clear outliers,
        // re-run across seeds; recovery of the true inliers must stay >= 80%
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut points = Vec::new();
            for i in -5..5 {
                points.push(Vector3::new(
                    i as f64,
                    i as f64,
                    0.6 * rng.gen_range(-0.1..0.1),
                ));
            }
            for _ in 0..10 {
                let z: f64 = rng.gen_range(1.0..5.0);
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                points.push(Vector3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    sign * z,
                ));
            }
            let cloud = PointCloud::from_points(points);
            let fit = ransac_plane(&cloud, 0.2, 100, &mut rng).unwrap().unwrap();
            let recovered = fit.inliers.iter().filter(|&&i| i < 10).count();
            assert!(
                recovered >= 8,
                "seed {}: only {} of 10 plane points recovered",
                seed,
                recovered
            );
        }
    }
}
