use crate::{Aabb, GeometryError, HasPosition, Point3D};

/// Ordered collection of points with organized-grid metadata.
///
/// `width * height == len()` always holds. Unorganized clouds have
/// `height == 1`. `dense` means the cloud is known to contain no invalid
/// (NaN/Inf) entries; it is only set by stages that have checked.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud<T> {
    points: Vec<T>,
    width: usize,
    height: usize,
    pub dense: bool,
}

/// A connected component copied out of a larger cloud.
pub type Cluster = PointCloud<Point3D>;

impl<T> PointCloud<T> {
    pub fn new_empty() -> Self {
        Self {
            points: Vec::new(),
            width: 0,
            height: 1,
            dense: true,
        }
    }

    /// Build an organized cloud. Fails when the grid does not match the
    /// number of points.
    pub fn new(points: Vec<T>, width: usize, height: usize) -> Result<Self, GeometryError> {
        if width.checked_mul(height) != Some(points.len()) {
            return Err(GeometryError::InvalidInput(format!(
                "{} points do not fill a {}x{} grid",
                points.len(),
                width,
                height
            )));
        }
        Ok(Self {
            points,
            width,
            height,
            dense: false,
        })
    }

    /// Build an unorganized cloud (`height == 1`). Density is unknown.
    pub fn from_points(points: Vec<T>) -> Self {
        let width = points.len();
        Self {
            points,
            width,
            height: 1,
            dense: false,
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.width * self.height, self.points.len());
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_organized(&self) -> bool {
        self.height > 1
    }

    pub fn points(&self) -> &[T] {
        &self.points
    }

    pub fn into_points(self) -> Vec<T> {
        self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }

    /// Map every point to another type while keeping the grid layout and
    /// density flag.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> PointCloud<U> {
        PointCloud {
            points: self.points.iter().map(f).collect(),
            width: self.width,
            height: self.height,
            dense: self.dense,
        }
    }

    /// Like [`map`](Self::map), but `f` also receives the flat index of
    /// each point.
    pub fn map_indexed<U>(&self, mut f: impl FnMut(usize, &T) -> U) -> PointCloud<U> {
        PointCloud {
            points: self
                .points
                .iter()
                .enumerate()
                .map(|(i, p)| f(i, p))
                .collect(),
            width: self.width,
            height: self.height,
            dense: self.dense,
        }
    }
}

impl<T: Clone> PointCloud<T> {
    /// Copy the points at `indices`, in that order, into an unorganized
    /// cloud. The density flag is inherited.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        let points: Vec<T> = indices
            .iter()
            .map(|&idx| {
                assert!(idx < self.len(), "index out of bounds in select");
                self.points[idx].clone()
            })
            .collect();
        let mut out = Self::from_points(points);
        out.dense = self.dense;
        out
    }
}

impl<T: HasPosition> PointCloud<T> {
    pub fn position(&self, i: usize) -> [f64; 3] {
        self.points[i].position()
    }

    pub fn iter_positions(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.points.iter().map(HasPosition::position)
    }

    /// Contiguous copy of all positions, for cache-friendly inner loops.
    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.iter_positions().collect()
    }

    pub fn aabb(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for p in self.iter_positions() {
            aabb.expand_with_point(p);
        }
        aabb
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
