use std::ops::{Index, IndexMut};

use rand::Rng;

use crate::{
    error::MatrixError,
    properties::PropertyCache,
    storage::MatrixStorage,
    view::{AsMatrixView, MatrixView, MatrixViewMut},
    Scalar,
};

/// A dense, row-major matrix with owned storage.
///
/// The matrix exposes a logical `rows x cols` window over a [`MatrixStorage`]
/// buffer which may be larger. Growing or shrinking the logical shape with
/// [`Matrix::reshape`] reuses the buffer whenever the new shape fits, which
/// keeps repeated solves on inputs of bounded size allocation free.
///
/// # Mutation tracking
///
/// Every method taking `&mut self` bumps an internal generation counter.
/// Structural verdicts computed by the property tests (see
/// [`properties`](crate::properties)) are tagged with the generation they were
/// computed at, so any write through the matrix invalidates them.
///
/// # Examples
///
/// ```rust
/// use kornia_matrix::Matrix;
///
/// let mut m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(m.shape(), [2, 3]);
/// assert_eq!(m[(1, 2)], 6.0);
///
/// m.transpose();
/// assert_eq!(m.shape(), [3, 2]);
/// assert_eq!(m.row(0), &[1.0, 4.0]);
/// ```
#[derive(Clone)]
pub struct Matrix<T = f64> {
    /// The backing buffer.
    pub(crate) storage: MatrixStorage<T>,
    /// Logical number of rows.
    pub(crate) rows: usize,
    /// Logical number of columns.
    pub(crate) cols: usize,
    /// Incremented on every mutable access.
    pub(crate) generation: u64,
    /// Cached structural verdicts.
    pub(crate) cache: PropertyCache,
}

impl<T: Scalar> Matrix<T> {
    fn from_storage(storage: MatrixStorage<T>, rows: usize, cols: usize) -> Self {
        Self {
            storage,
            rows,
            cols,
            generation: 0,
            cache: PropertyCache::default(),
        }
    }

    /// Wraps a packed row-major buffer of exactly `rows * cols` elements.
    pub(crate) fn from_storage_parts(rows: usize, cols: usize, data: Vec<T>) -> Self {
        Self::from_storage(MatrixStorage::from_vec_unchecked(rows, cols, data), rows, cols)
    }

    /// Creates a zero-filled `rows x cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_storage(MatrixStorage::new(rows, cols), rows, cols)
    }

    /// Creates a zero-filled `rows x cols` matrix.
    ///
    /// Same as [`Matrix::new`], named for symmetry with the other factories.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols)
    }

    /// Creates a `rows x cols` matrix with every element set to `value`.
    pub fn from_elem(rows: usize, cols: usize, value: T) -> Self {
        Self::from_storage_parts(rows, cols, vec![value; rows * cols])
    }

    /// Creates a zero-filled `rows x cols` matrix inside a larger
    /// `storage_rows x storage_cols` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::ExceedsStorage`] if the logical shape does not fit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kornia_matrix::Matrix;
    ///
    /// let mut m = Matrix::<f64>::with_storage(2, 2, 16, 16).unwrap();
    /// m.reshape(10, 12);
    /// assert_eq!(m.storage_rows(), 16);
    /// ```
    pub fn with_storage(
        rows: usize,
        cols: usize,
        storage_rows: usize,
        storage_cols: usize,
    ) -> Result<Self, MatrixError> {
        if rows > storage_rows || cols > storage_cols {
            return Err(MatrixError::ExceedsStorage {
                rows,
                cols,
                storage_rows,
                storage_cols,
            });
        }
        Ok(Self::from_storage(
            MatrixStorage::new(storage_rows, storage_cols),
            rows,
            cols,
        ))
    }

    /// Creates an empty `0 x 0` matrix whose buffer can later hold up to
    /// `storage_rows x storage_cols` elements without reallocating.
    pub fn with_capacity(storage_rows: usize, storage_cols: usize) -> Self {
        Self::from_storage(MatrixStorage::new(storage_rows, storage_cols), 0, 0)
    }

    /// Creates a matrix taking ownership of a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidShape`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        let storage = MatrixStorage::from_vec(rows, cols, data)?;
        Ok(Self::from_storage(storage, rows, cols))
    }

    /// Creates a matrix by copying a row-major slice.
    ///
    /// To use caller memory without copying, see [`Matrix::alias`].
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidShape`] if `data.len() != rows * cols`.
    pub fn from_slice(rows: usize, cols: usize, data: &[T]) -> Result<Self, MatrixError> {
        Self::from_vec(rows, cols, data.to_vec())
    }

    /// Creates a matrix from fixed-size rows.
    pub fn from_rows<const C: usize>(rows: &[[T; C]]) -> Self {
        let data = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Self::from_storage_parts(rows.len(), C, data)
    }

    /// Creates a matrix from rows of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidShape`] if the rows have different lengths.
    pub fn from_row_vecs(rows: &[Vec<T>]) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(MatrixError::invalid_shape(cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self::from_storage_parts(rows.len(), cols, data))
    }

    /// Creates a matrix whose element `(i, j)` is `f(i, j)`.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self::from_storage_parts(rows, cols, data)
    }

    /// Creates the `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::diagonal(n, T::one())
    }

    /// Creates an `n x n` matrix with `value` on the diagonal and zeros elsewhere.
    pub fn diagonal(n: usize, value: T) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { value } else { T::zero() })
    }

    /// Creates a square matrix with the given diagonal and zeros elsewhere.
    pub fn from_diagonal(diag: &[T]) -> Self {
        Self::from_fn(diag.len(), diag.len(), |i, j| {
            if i == j {
                diag[i]
            } else {
                T::zero()
            }
        })
    }

    /// Creates a matrix with elements drawn uniformly from `[lo, hi)` using the
    /// thread-local generator.
    pub fn random(rows: usize, cols: usize, lo: T, hi: T) -> Self {
        Self::random_with_rng(&mut rand::rng(), rows, cols, lo, hi)
    }

    /// Creates a matrix with elements drawn uniformly from `[lo, hi)` using `rng`.
    pub fn random_with_rng<R: Rng + ?Sized>(
        rng: &mut R,
        rows: usize,
        cols: usize,
        lo: T,
        hi: T,
    ) -> Self {
        let (lo, span) = (lo.into_f64(), (hi - lo).into_f64());
        Self::from_fn(rows, cols, |_, _| {
            let u: f64 = rng.random();
            T::from_f64(lo + span * u)
        })
    }

    /// Logical number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Logical shape as `[rows, cols]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Number of rows of the backing buffer.
    #[inline]
    pub fn storage_rows(&self) -> usize {
        self.storage.rows()
    }

    /// Number of columns of the backing buffer.
    #[inline]
    pub fn storage_cols(&self) -> usize {
        self.storage.cols()
    }

    /// Distance in elements between two consecutive rows in the backing buffer.
    #[inline]
    pub fn stride(&self) -> usize {
        self.storage.stride()
    }

    /// Number of logical elements.
    #[inline]
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns true if the matrix has no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Returns true if the matrix has as many rows as columns.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Read-only access to the backing buffer.
    #[inline]
    pub fn storage(&self) -> &MatrixStorage<T> {
        &self.storage
    }

    /// Read-only access to the whole backing buffer, including the elements
    /// outside the logical shape. Element `(i, j)` is at `i * stride() + j`.
    #[inline]
    pub fn as_raw_slice(&self) -> &[T] {
        self.storage.as_slice()
    }

    /// Mutable access to the whole backing buffer.
    ///
    /// Invalidates every cached property verdict.
    #[inline]
    pub fn as_raw_slice_mut(&mut self) -> &mut [T] {
        self.touch();
        self.storage.as_mut_slice()
    }

    /// Returns the element at `(i, j)`, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i < self.rows && j < self.cols {
            Some(self.storage.as_slice()[i * self.stride() + j])
        } else {
            None
        }
    }

    /// Returns the element at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the logical shape.
    #[inline]
    pub fn at(&self, i: usize, j: usize) -> T {
        self[(i, j)]
    }

    /// Sets the element at `(i, j)`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if the index is outside the matrix.
    pub fn set(&mut self, i: usize, j: usize, value: T) -> Result<(), MatrixError> {
        self.check_index(i, j)?;
        let offset = i * self.stride() + j;
        self.as_raw_slice_mut()[offset] = value;
        Ok(())
    }

    /// Row `i` restricted to the logical columns.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        assert!(i < self.rows, "row {i} out of bounds ({})", self.rows);
        let start = i * self.stride();
        &self.storage.as_slice()[start..start + self.cols]
    }

    /// Mutable row `i` restricted to the logical columns.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        assert!(i < self.rows, "row {i} out of bounds ({})", self.rows);
        let (start, cols) = (i * self.stride(), self.cols);
        &mut self.as_raw_slice_mut()[start..start + cols]
    }

    /// Iterates over the logical rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Copies the logical elements into a packed row-major vector.
    pub fn to_vec(&self) -> Vec<T> {
        let mut data = Vec::with_capacity(self.numel());
        self.iter_rows().for_each(|row| data.extend_from_slice(row));
        data
    }

    /// Read-only view of the logical matrix.
    #[inline]
    pub fn view(&self) -> MatrixView<'_, T> {
        let (rows, cols, stride) = (self.rows, self.cols, self.stride());
        // the logical shape always fits the storage, see `reshape`
        MatrixView::from_parts(self.storage.as_slice(), rows, cols, stride)
    }

    /// Mutable view of the logical matrix. Invalidates cached verdicts.
    #[inline]
    pub fn view_mut(&mut self) -> MatrixViewMut<'_, T> {
        let (rows, cols, stride) = (self.rows, self.cols, self.stride());
        MatrixViewMut::from_parts(self.as_raw_slice_mut(), rows, cols, stride)
    }

    /// Changes the logical shape and zeroes the matrix.
    ///
    /// The backing buffer is reused when the new shape fits in it, and
    /// reallocated to exactly `rows x cols` otherwise.
    pub fn reshape(&mut self, rows: usize, cols: usize) {
        if self.storage.fits(rows, cols) {
            self.storage.fill(T::zero());
        } else {
            self.storage = MatrixStorage::new(rows, cols);
        }
        self.rows = rows;
        self.cols = cols;
        self.touch();
    }

    /// Copies `src` into this matrix, adopting its shape and reusing the
    /// backing buffer when possible.
    pub fn copy_from<A: AsMatrixView<T> + ?Sized>(&mut self, src: &A) {
        let src = src.as_matrix_view();
        self.reshape(src.rows(), src.cols());
        for i in 0..src.rows() {
            self.row_mut(i).copy_from_slice(src.row(i));
        }
    }

    /// Swaps rows `a` and `b` in place.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if either row does not exist.
    pub fn row_swap(&mut self, a: usize, b: usize) -> Result<(), MatrixError> {
        if a.max(b) >= self.rows {
            return Err(MatrixError::IndexOutOfBounds {
                row: a.max(b),
                col: 0,
                shape: self.shape(),
            });
        }
        if a == b {
            return Ok(());
        }
        let (stride, cols) = (self.stride(), self.cols);
        let data = self.as_raw_slice_mut();
        for j in 0..cols {
            data.swap(a * stride + j, b * stride + j);
        }
        Ok(())
    }

    /// Swaps columns `a` and `b` in place.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if either column does not exist.
    pub fn col_swap(&mut self, a: usize, b: usize) -> Result<(), MatrixError> {
        if a.max(b) >= self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row: 0,
                col: a.max(b),
                shape: self.shape(),
            });
        }
        if a == b {
            return Ok(());
        }
        let (stride, rows) = (self.stride(), self.rows);
        let data = self.as_raw_slice_mut();
        for i in 0..rows {
            data.swap(i * stride + a, i * stride + b);
        }
        Ok(())
    }

    /// Copies the `rows x cols` block starting at `(row, col)` into a new matrix.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if the block leaves the matrix.
    pub fn submatrix(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Self, MatrixError> {
        if row + rows > self.rows || col + cols > self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row: row + rows,
                col: col + cols,
                shape: self.shape(),
            });
        }
        Ok(Self::from_fn(rows, cols, |i, j| self[(row + i, col + j)]))
    }

    /// Returns the transpose as a new matrix.
    pub fn transposition(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |i, j| self[(j, i)])
    }

    /// Transposes the matrix in place.
    ///
    /// Square matrices are transposed without allocating; rectangular ones reuse
    /// the backing buffer when the transposed shape fits in it.
    pub fn transpose(&mut self) {
        if self.is_square() {
            let (n, stride) = (self.rows, self.stride());
            let data = self.as_raw_slice_mut();
            for i in 0..n {
                for j in (i + 1)..n {
                    data.swap(i * stride + j, j * stride + i);
                }
            }
        } else {
            let transposed = self.transposition();
            self.copy_from(&transposed);
        }
    }

    fn check_index(&self, i: usize, j: usize) -> Result<(), MatrixError> {
        if i >= self.rows || j >= self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row: i,
                col: j,
                shape: self.shape(),
            });
        }
        Ok(())
    }

    /// Marks the matrix as modified, invalidating cached verdicts.
    #[inline]
    pub(crate) fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

impl<T: Scalar> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    /// Returns a reference to the element at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the logical shape.
    fn index(&self, (i, j): (usize, usize)) -> &T {
        assert!(
            i < self.rows && j < self.cols,
            "index ({i}, {j}) out of bounds for shape {:?}",
            self.shape()
        );
        &self.storage.as_slice()[i * self.stride() + j]
    }
}

impl<T: Scalar> IndexMut<(usize, usize)> for Matrix<T> {
    /// Returns a mutable reference to the element at `(i, j)`, invalidating
    /// cached verdicts.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the logical shape.
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        assert!(
            i < self.rows && j < self.cols,
            "index ({i}, {j}) out of bounds for shape {:?}",
            self.shape()
        );
        let offset = i * self.stride() + j;
        &mut self.as_raw_slice_mut()[offset]
    }
}

impl<T: Scalar> PartialEq for Matrix<T> {
    /// Two matrices are equal when their logical shapes and elements are equal,
    /// regardless of their storage shapes.
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.iter_rows().eq(other.iter_rows())
    }
}

impl<T: Scalar> Default for Matrix<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl<T: Scalar> std::fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matrix")
            .field("shape", &self.shape())
            .field("storage_shape", &[self.storage_rows(), self.storage_cols()])
            .field("data", &self.to_vec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn constructor_from_vec() -> Result<(), MatrixError> {
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        assert_eq!(m.shape(), [2, 3]);
        assert_eq!(m.numel(), 6);
        assert_eq!(m.get(1, 0), Some(4.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.get(0, 3), None);

        let err = Matrix::<f64>::from_vec(2, 3, vec![1.0; 5]);
        assert_eq!(err, Err(MatrixError::invalid_shape(6, 5)));
        Ok(())
    }

    #[test]
    fn constructor_from_row_vecs() -> Result<(), MatrixError> {
        let m = Matrix::from_row_vecs(&[vec![1.0f32, 2.0], vec![3.0, 4.0]])?;
        assert_eq!(m.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);

        let ragged = Matrix::from_row_vecs(&[vec![1.0f32, 2.0], vec![3.0]]);
        assert_eq!(ragged, Err(MatrixError::invalid_shape(2, 1)));
        Ok(())
    }

    #[test]
    fn factories() {
        let eye = Matrix::<f64>::identity(3);
        assert_eq!(eye[(0, 0)], 1.0);
        assert_eq!(eye[(0, 1)], 0.0);
        assert_eq!(Matrix::diagonal(2, 5.0), Matrix::from_rows(&[[5.0, 0.0], [0.0, 5.0]]));
        assert_eq!(
            Matrix::from_diagonal(&[1.0, 2.0]),
            Matrix::from_rows(&[[1.0, 0.0], [0.0, 2.0]])
        );
        assert_eq!(Matrix::from_elem(1, 2, 7.0f32).to_vec(), vec![7.0, 7.0]);
        assert!(Matrix::<f64>::zeros(2, 2).to_vec().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn random_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let m = Matrix::<f64>::random_with_rng(&mut rng, 10, 10, -2.0, 3.0);
        assert!(m.to_vec().iter().all(|&x| (-2.0..3.0).contains(&x)));

        let mut rng = StdRng::seed_from_u64(42);
        let again = Matrix::<f64>::random_with_rng(&mut rng, 10, 10, -2.0, 3.0);
        assert_eq!(m, again);
    }

    #[test]
    fn storage_reuse() -> Result<(), MatrixError> {
        let mut m = Matrix::<f64>::with_storage(2, 2, 4, 5)?;
        assert_eq!(m.stride(), 5);
        m.set(1, 1, 3.0)?;
        assert_eq!(m.as_raw_slice()[6], 3.0);

        let ptr = m.as_raw_slice().as_ptr();
        m.reshape(4, 5);
        assert_eq!(m.as_raw_slice().as_ptr(), ptr);
        assert_eq!(m.get(1, 1), Some(0.0));

        m.reshape(6, 2);
        assert_eq!(m.storage_rows(), 6);
        assert_eq!(m.storage_cols(), 2);

        assert!(Matrix::<f64>::with_storage(5, 1, 4, 4).is_err());
        Ok(())
    }

    #[test]
    fn copy_from_reuses_storage() -> Result<(), MatrixError> {
        let src = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let mut dst = Matrix::<f64>::with_storage(0, 0, 8, 8)?;
        dst.copy_from(&src);
        assert_eq!(dst, src);
        assert_eq!(dst.storage_rows(), 8);
        Ok(())
    }

    #[test]
    fn row_and_col_swap() -> Result<(), MatrixError> {
        let mut m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        m.row_swap(0, 2)?;
        assert_eq!(m.to_vec(), vec![5.0, 6.0, 3.0, 4.0, 1.0, 2.0]);
        m.col_swap(0, 1)?;
        assert_eq!(m.to_vec(), vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        assert!(m.row_swap(0, 3).is_err());
        assert!(m.col_swap(2, 0).is_err());
        Ok(())
    }

    #[test]
    fn transpose_square_and_rectangular() {
        let mut sq = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
        sq.transpose();
        assert_eq!(sq, Matrix::from_rows(&[[1.0, 3.0], [2.0, 4.0]]));

        let rect = Matrix::from_rows(&[[1.0, 2.0, 3.0]]);
        let mut t = rect.clone();
        t.transpose();
        assert_eq!(t, rect.transposition());
        assert_eq!(t.shape(), [3, 1]);
    }

    #[test]
    fn submatrix_block() -> Result<(), MatrixError> {
        let m = Matrix::from_fn(4, 4, |i, j| (i * 4 + j) as f64);
        let block = m.submatrix(1, 2, 2, 2)?;
        assert_eq!(block.to_vec(), vec![6.0, 7.0, 10.0, 11.0]);
        assert!(m.submatrix(3, 3, 2, 1).is_err());
        Ok(())
    }

    #[test]
    fn equality_ignores_storage_shape() -> Result<(), MatrixError> {
        let packed = Matrix::from_rows(&[[1.0, 2.0]]);
        let mut padded = Matrix::with_storage(1, 2, 3, 3)?;
        padded.copy_from(&packed);
        assert_eq!(packed, padded);
        Ok(())
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds_panics() {
        let m = Matrix::<f64>::new(2, 2);
        let _ = m[(2, 0)];
    }
}
