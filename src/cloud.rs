use nalgebra::Vector3;

/// An ordered, index-addressable collection of 3D samples for one frame.
///
/// The point index is the implicit point identifier used throughout the
/// crate: inlier sets, clusters and spatial-index results all reference
/// points by their index into one `PointCloud` instance. Indices are stable
/// for the lifetime of the cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Vector3<f64>>,
}

impl PointCloud {
    /// Creates an empty cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cloud from the given points, preserving their order
    pub fn from_points(points: Vec<Vector3<f64>>) -> Self {
        Self { points }
    }

    /// The number of points in this cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if this cloud contains no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the point at `index`
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn at(&self, index: usize) -> Vector3<f64> {
        self.points[index]
    }

    /// The points of this cloud as a slice
    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Iterates over all points in index order
    pub fn iter(&self) -> std::slice::Iter<'_, Vector3<f64>> {
        self.points.iter()
    }

    /// Appends a point at the end of the cloud
    pub fn push(&mut self, point: Vector3<f64>) {
        self.points.push(point);
    }

    /// Creates a new cloud containing copies of the points at the given indices, in the order
    /// the indices appear in `indices`
    ///
    /// # Panics
    ///
    /// If any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> PointCloud {
        PointCloud {
            points: indices.iter().map(|&index| self.points[index]).collect(),
        }
    }

    /// Splits this cloud into the points whose indices appear in `indices` and all remaining
    /// points. Both halves preserve the original point order, so the split is a stable filter
    /// over the cloud
    /// ```
    /// # use lidar_obstacles::cloud::PointCloud;
    /// # use nalgebra::Vector3;
    /// let cloud = PointCloud::from_points(vec![
    ///     Vector3::new(0.0, 0.0, 0.0),
    ///     Vector3::new(1.0, 0.0, 0.0),
    ///     Vector3::new(2.0, 0.0, 0.0),
    /// ]);
    /// let (selected, rest) = cloud.partition(&[0, 2]);
    /// assert_eq!(selected.len(), 2);
    /// assert_eq!(rest.at(0), Vector3::new(1.0, 0.0, 0.0));
    /// ```
    ///
    /// # Panics
    ///
    /// If any index is out of bounds.
    pub fn partition(&self, indices: &[usize]) -> (PointCloud, PointCloud) {
        let mut selected_mask = vec![false; self.points.len()];
        for &index in indices {
            selected_mask[index] = true;
        }
        let mut selected = PointCloud::new();
        let mut rest = PointCloud::new();
        for (index, point) in self.points.iter().enumerate() {
            if selected_mask[index] {
                selected.push(*point);
            } else {
                rest.push(*point);
            }
        }
        (selected, rest)
    }
}

impl std::iter::FromIterator<Vector3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Vector3<f64>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Vector3<f64>;
    type IntoIter = std::slice::Iter<'a, Vector3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
