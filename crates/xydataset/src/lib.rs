//! # XYDataset
//!
//! An ordered sequence of `(x, y)` samples. Both curves kept by a reference
//! sample are expressed this way: an SED is flux (`y`) against wavelength
//! (`x`), a PDZ is probability density (`y`) against redshift bin (`x`).
//!
//! Values are held as `f64` in memory. On disk they are stored as `f32`, so
//! a dataset read back from a store is only equal to the original within
//! float32 precision; [`XYDataset::all_close`] is the comparison to use.

/// Ordered `(x, y)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XYDataset {
    points: Vec<(f64, f64)>,
}

impl XYDataset {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Builds a dataset by zipping two axes.
    ///
    /// Returns `None` when the axes have different lengths.
    pub fn from_axes(xs: &[f64], ys: &[f64]) -> Option<Self> {
        if xs.len() != ys.len() {
            return None;
        }
        Some(Self {
            points: xs.iter().copied().zip(ys.iter().copied()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.points.iter()
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.0).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.1).collect()
    }

    /// Both axes narrowed to the `f32` precision used on disk.
    pub fn to_f32_pairs(&self) -> Vec<(f32, f32)> {
        self.points
            .iter()
            .map(|&(x, y)| (x as f32, y as f32))
            .collect()
    }

    /// Index of the first point whose x is not strictly greater than the
    /// previous one, or `None` if the x axis is strictly ascending.
    ///
    /// The check runs on the `f32` values that would be stored, so two
    /// distinct `f64` coordinates collapsing to the same `f32` are reported.
    pub fn first_unsorted(&self) -> Option<usize> {
        first_unsorted_f32(self.points.iter().map(|p| p.0 as f32))
    }

    pub fn is_strictly_ascending(&self) -> bool {
        self.first_unsorted().is_none()
    }

    /// Element-wise comparison with relative and absolute tolerance on both
    /// axes: `|a - b| <= atol + rtol * |b|`.
    pub fn all_close(&self, other: &XYDataset, rtol: f64, atol: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= atol + rtol * b.abs();
        self.len() == other.len()
            && self
                .points
                .iter()
                .zip(other.points.iter())
                .all(|(a, b)| close(a.0, b.0) && close(a.1, b.1))
    }
}

/// Index of the first element that is not strictly greater than its
/// predecessor. NaN is always reported.
pub fn first_unsorted_f32<I: IntoIterator<Item = f32>>(values: I) -> Option<usize> {
    let mut prev: Option<f32> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() || prev.is_some_and(|p| v <= p) {
            return Some(i);
        }
        prev = Some(v);
    }
    None
}

impl From<Vec<(f64, f64)>> for XYDataset {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<(f64, f64)> for XYDataset {
    fn from_iter<T: IntoIterator<Item = (f64, f64)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a XYDataset {
    type Item = &'a (f64, f64);
    type IntoIter = std::slice::Iter<'a, (f64, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
