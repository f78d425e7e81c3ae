use crate::{KMeansError, Result};
use num::{PrimInt, Signed};
use std::{
    fmt::{Debug, Display},
    ops::Range,
    slice::ChunksExact,
};

/// Integer primitive usable as point coordinate.
///
/// All arithmetic on coordinates (differences, squares, sums) is done on the widened
/// `i64` representation, so that even extreme coordinates (`i32::MIN` vs `i32::MAX`)
/// can not overflow during distance calculations or accumulation.
pub trait Primitive: PrimInt + Signed + Default + Display + Debug + Sync + Send + 'static {
    /// Lossless conversion into the wide accumulation type.
    fn widen(self) -> i64;
    /// Conversion back from the wide type. Only called for values that are known to be
    /// within `Self`'s range (means of values of type `Self`).
    fn narrow(wide: i64) -> Self;
}

macro_rules! impl_primitive {
    ($($t:ty),*) => {$(
        impl Primitive for $t {
            #[inline(always)] fn widen(self) -> i64 { self as i64 }
            #[inline(always)] fn narrow(wide: i64) -> Self { wide as $t }
        }
    )*};
}
impl_primitive!(i8, i16, i32);


/// Owned, row-major matrix with a fixed row width.
///
/// Used for both the samples (one row per point) and the centroids (one row per cluster).
/// Rows are handed out as slices, so every accessor is bounds-checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}
impl<T: Primitive> Matrix<T> {
    /// Create a `rows` × `cols` matrix filled with zeros.
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self { data: vec![T::zero(); rows * cols], rows, cols }
    }

    /// Take ownership of a row-major buffer [<row0>,<row1>,<row2>,...].
    ///
    /// ## Errors
    /// [`KMeansError::InvalidArgument`] if `cols` is zero or the buffer length is not `rows * cols`.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if cols == 0 {
            return Err(KMeansError::InvalidArgument("matrix rows must have at least one column".into()));
        }
        if data.len() != rows * cols {
            return Err(KMeansError::InvalidArgument(format!(
                "buffer of {} values does not form a {}x{} matrix", data.len(), rows, cols)));
        }
        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }

    /// Row `idx`. Panics when `idx >= rows`, just like slice indexing.
    pub fn row(&self, idx: usize) -> &[T] {
        assert!(idx < self.rows, "row {} out of bounds ({} rows)", idx, self.rows);
        &self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    /// Row `idx`, or `None` when out of bounds.
    pub fn get(&self, idx: usize) -> Option<&[T]> {
        (idx < self.rows).then(|| &self.data[idx * self.cols..(idx + 1) * self.cols])
    }

    pub fn row_mut(&mut self, idx: usize) -> &mut [T] {
        assert!(idx < self.rows, "row {} out of bounds ({} rows)", idx, self.rows);
        &mut self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    pub fn set_row(&mut self, idx: usize, src: &[T]) {
        self.row_mut(idx).copy_from_slice(src);
    }

    pub fn iter_rows(&self) -> ChunksExact<'_, T> {
        self.data.chunks_exact(self.cols.max(1))
    }

    pub fn as_slice(&self) -> &[T] { &self.data }
    pub fn into_vec(self) -> Vec<T> { self.data }

    /// Borrow the rows in `rows` as a read-only view (e.g. a worker's partition).
    pub fn view(&self, rows: Range<usize>) -> MatrixView<'_, T> {
        assert!(rows.start <= rows.end && rows.end <= self.rows,
            "rows {:?} out of bounds ({} rows)", rows, self.rows);
        MatrixView {
            data: &self.data[rows.start * self.cols..rows.end * self.cols],
            cols: self.cols,
        }
    }

    pub fn full_view(&self) -> MatrixView<'_, T> {
        self.view(0..self.rows)
    }

    /// Sum of all values, in the wide type.
    pub fn sum(&self) -> i64 {
        self.data.iter().map(|v| v.widen()).sum()
    }
}


/// Borrowed, read-only window onto consecutive rows of a [`Matrix`].
#[derive(Clone, Copy, Debug)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    cols: usize,
}
impl<'a, T: Primitive> MatrixView<'a, T> {
    pub fn rows(&self) -> usize { self.data.len() / self.cols.max(1) }
    pub fn cols(&self) -> usize { self.cols }
    pub fn as_slice(&self) -> &'a [T] { self.data }

    pub fn row(&self, idx: usize) -> &'a [T] {
        &self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> ChunksExact<'a, T> {
        self.data.chunks_exact(self.cols.max(1))
    }
}
