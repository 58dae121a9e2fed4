use nalgebra::{Point3, Vector3};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Aabb {
    /// Creates a new `Aabb` from the given minimum and maximum coordinates. Panics if the minimum
    /// position is not less than or equal to the maximum position
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("Aabb::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Creates the zero-volume `Aabb` whose minimum and maximum both equal `point`. Useful as the
    /// seed of a running-extrema scan
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_point(nalgebra::Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(bounds.min(), bounds.max());
    /// ```
    pub fn from_point(point: Point3<f64>) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Returns the minimum point of this `Aabb`
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(-1.0, -1.0, -1.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(*bounds.min(), nalgebra::Point3::new(-1.0, -1.0, -1.0));
    /// ```
    pub fn min(&self) -> &Point3<f64> {
        &self.min
    }

    /// Returns the maximum point of this `Aabb`
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(-1.0, -1.0, -1.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(*bounds.max(), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn max(&self) -> &Point3<f64> {
        &self.max
    }

    /// Returns the extent of this `Aabb`, i.e. the size between its minimum and maximum position
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Returns the center point of this `Aabb`
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(2.0, 2.0, 2.0));
    /// assert_eq!(bounds.center(), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn center(&self) -> Point3<f64> {
        self.min + self.extent() * 0.5
    }

    /// Returns true if the given point is contained within this `Aabb`. Points right on the
    /// boundary (e.g. point.x == self.max.x or self.min.x) count as contained as well
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// assert!(bounds.contains(&nalgebra::Point3::new(0.5, 0.5, 0.5)));
    /// ```
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Extends the given `Aabb` so that it contains the given point.
    /// ```
    /// # use lidar_obstacles::math::Aabb;
    /// let bounds = Aabb::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// let extended_bounds = Aabb::extend_with_point(&bounds, &nalgebra::Point3::new(2.0, 2.0, 2.0));
    /// assert_eq!(*extended_bounds.min(), nalgebra::Point3::new(0.0, 0.0, 0.0));
    /// assert_eq!(*extended_bounds.max(), nalgebra::Point3::new(2.0, 2.0, 2.0));
    /// ```
    pub fn extend_with_point(bounds: &Aabb, point: &Point3<f64>) -> Aabb {
        let min_x = if bounds.min.x < point.x {
            bounds.min.x
        } else {
            point.x
        };
        let min_y = if bounds.min.y < point.y {
            bounds.min.y
        } else {
            point.y
        };
        let min_z = if bounds.min.z < point.z {
            bounds.min.z
        } else {
            point.z
        };

        let max_x = if bounds.max.x > point.x {
            bounds.max.x
        } else {
            point.x
        };
        let max_y = if bounds.max.y > point.y {
            bounds.max.y
        } else {
            point.y
        };
        let max_z = if bounds.max.z > point.z {
            bounds.max.z
        } else {
            point.z
        };

        Self {
            min: Point3::new(min_x, min_y, min_z),
            max: Point3::new(max_x, max_y, max_z),
        }
    }
}
