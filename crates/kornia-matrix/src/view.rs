use crate::{error::MatrixError, Matrix, Scalar};

/// Checks that a `rows x cols` window with the given stride fits in `len` elements.
fn check_layout(len: usize, rows: usize, cols: usize, stride: usize) -> Result<(), MatrixError> {
    let needed = if rows == 0 || cols == 0 {
        0
    } else {
        (rows - 1) * stride + cols
    };
    if stride < cols || needed > len {
        return Err(MatrixError::InvalidLayout {
            rows,
            cols,
            stride,
            len,
        });
    }
    Ok(())
}

/// A non-owning, read-only view of a row-major matrix.
///
/// Views let the solvers and arithmetic kernels work on caller memory without
/// copying it: a `MatrixView` can wrap a [`Matrix`], or any slice laid out
/// row-major with a row stride of at least `cols` elements.
///
/// # Examples
///
/// ```rust
/// use kornia_matrix::MatrixView;
///
/// // A 2x2 window over a buffer with rows of 3 elements.
/// let data = [1.0, 2.0, 0.0, 3.0, 4.0, 0.0];
/// let view = MatrixView::from_slice(&data, 2, 2, 3).unwrap();
/// assert_eq!(view.get(1, 0), Some(3.0));
/// assert_eq!(view.to_matrix().to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
/// ```
#[derive(Clone, Copy)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    stride: usize,
}

impl<'a, T: Scalar> MatrixView<'a, T> {
    /// Wraps a row-major slice as a `rows x cols` view with the given row stride.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidLayout`] if `stride < cols` or the slice is too
    /// short to hold the view.
    pub fn from_slice(
        data: &'a [T],
        rows: usize,
        cols: usize,
        stride: usize,
    ) -> Result<Self, MatrixError> {
        check_layout(data.len(), rows, cols, stride)?;
        Ok(Self::from_parts(data, rows, cols, stride))
    }

    /// Wraps a slice whose layout the caller has already validated.
    #[inline]
    pub(crate) fn from_parts(data: &'a [T], rows: usize, cols: usize, stride: usize) -> Self {
        debug_assert!(check_layout(data.len(), rows, cols, stride).is_ok());
        Self {
            data,
            rows,
            cols,
            stride,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `[rows, cols]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Distance in elements between two consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The backing slice, including padding between rows.
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(i, j)`, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.stride + j])
        } else {
            None
        }
    }

    /// Row `i` restricted to the logical columns.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &'a [T] {
        assert!(i < self.rows, "row {i} out of bounds ({})", self.rows);
        let start = i * self.stride;
        &self.data[start..start + self.cols]
    }

    /// Copies the view into a new, tightly packed matrix.
    pub fn to_matrix(&self) -> Matrix<T> {
        let mut data = Vec::with_capacity(self.rows * self.cols);
        for i in 0..self.rows {
            data.extend_from_slice(self.row(i));
        }
        Matrix::from_storage_parts(self.rows, self.cols, data)
    }
}

/// A non-owning, mutable view of a row-major matrix.
///
/// This is the handle through which the solvers overwrite a caller's matrix in
/// place. The exclusive borrow it holds guarantees the caller cannot read the
/// half-factorized data while the view is alive.
pub struct MatrixViewMut<'a, T> {
    data: &'a mut [T],
    rows: usize,
    cols: usize,
    stride: usize,
}

impl<'a, T: Scalar> MatrixViewMut<'a, T> {
    /// Wraps a mutable row-major slice as a `rows x cols` view with the given stride.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidLayout`] if `stride < cols` or the slice is too
    /// short to hold the view.
    pub fn from_slice(
        data: &'a mut [T],
        rows: usize,
        cols: usize,
        stride: usize,
    ) -> Result<Self, MatrixError> {
        check_layout(data.len(), rows, cols, stride)?;
        Ok(Self::from_parts(data, rows, cols, stride))
    }

    /// Wraps a slice whose layout the caller has already validated.
    #[inline]
    pub(crate) fn from_parts(data: &'a mut [T], rows: usize, cols: usize, stride: usize) -> Self {
        debug_assert!(check_layout(data.len(), rows, cols, stride).is_ok());
        Self {
            data,
            rows,
            cols,
            stride,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `[rows, cols]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Distance in elements between two consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The backing slice, including padding between rows.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &*self.data
    }

    /// The backing slice as mutable, including padding between rows.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut *self.data
    }

    /// Returns the element at `(i, j)`, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.stride + j])
        } else {
            None
        }
    }

    /// Sets the element at `(i, j)`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if the index is outside the view.
    pub fn set(&mut self, i: usize, j: usize, value: T) -> Result<(), MatrixError> {
        if i >= self.rows || j >= self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row: i,
                col: j,
                shape: self.shape(),
            });
        }
        self.data[i * self.stride + j] = value;
        Ok(())
    }

    /// Row `i` restricted to the logical columns.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        assert!(i < self.rows, "row {i} out of bounds ({})", self.rows);
        let start = i * self.stride;
        &mut self.data[start..start + self.cols]
    }

    /// Reborrows as a read-only view.
    #[inline]
    pub fn as_view(&self) -> MatrixView<'_, T> {
        MatrixView {
            data: &*self.data,
            rows: self.rows,
            cols: self.cols,
            stride: self.stride,
        }
    }

    /// Copies the view into a new, tightly packed matrix.
    pub fn to_matrix(&self) -> Matrix<T> {
        self.as_view().to_matrix()
    }
}

/// Types that can be read as a [`MatrixView`].
///
/// Implemented by [`Matrix`], the view types, and references to any of them.
/// Solvers that only read their system matrix are generic over this trait, so
/// they can either own a copy or borrow the caller's matrix.
pub trait AsMatrixView<T> {
    /// Returns a read-only view of the logical matrix.
    fn as_matrix_view(&self) -> MatrixView<'_, T>;
}

/// Types that can be written through a [`MatrixViewMut`].
///
/// Solvers that factorize their system matrix in place are generic over this
/// trait: an owned [`Matrix`] gives the "preserve" behaviour (the caller's data is
/// copied first) while `&mut Matrix` or a [`MatrixViewMut`] overwrites the
/// caller's buffer.
pub trait AsMatrixViewMut<T>: AsMatrixView<T> {
    /// Returns a mutable view of the logical matrix.
    fn as_matrix_view_mut(&mut self) -> MatrixViewMut<'_, T>;
}

impl<T: Scalar> AsMatrixView<T> for MatrixView<'_, T> {
    fn as_matrix_view(&self) -> MatrixView<'_, T> {
        *self
    }
}

impl<T: Scalar> AsMatrixView<T> for MatrixViewMut<'_, T> {
    fn as_matrix_view(&self) -> MatrixView<'_, T> {
        self.as_view()
    }
}

impl<T: Scalar> AsMatrixViewMut<T> for MatrixViewMut<'_, T> {
    fn as_matrix_view_mut(&mut self) -> MatrixViewMut<'_, T> {
        MatrixViewMut {
            data: &mut *self.data,
            rows: self.rows,
            cols: self.cols,
            stride: self.stride,
        }
    }
}

impl<T: Scalar> AsMatrixView<T> for Matrix<T> {
    fn as_matrix_view(&self) -> MatrixView<'_, T> {
        self.view()
    }
}

impl<T: Scalar> AsMatrixViewMut<T> for Matrix<T> {
    fn as_matrix_view_mut(&mut self) -> MatrixViewMut<'_, T> {
        self.view_mut()
    }
}

impl<T, S: AsMatrixView<T> + ?Sized> AsMatrixView<T> for &S {
    fn as_matrix_view(&self) -> MatrixView<'_, T> {
        (**self).as_matrix_view()
    }
}

impl<T, S: AsMatrixView<T> + ?Sized> AsMatrixView<T> for &mut S {
    fn as_matrix_view(&self) -> MatrixView<'_, T> {
        (**self).as_matrix_view()
    }
}

impl<T, S: AsMatrixViewMut<T> + ?Sized> AsMatrixViewMut<T> for &mut S {
    fn as_matrix_view_mut(&mut self) -> MatrixViewMut<'_, T> {
        (**self).as_matrix_view_mut()
    }
}

impl<T: Scalar> Matrix<T> {
    /// Builds a view over a caller slice; shorthand for [`MatrixView::from_slice`]
    /// with a packed layout.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidLayout`] if the slice is shorter than
    /// `rows * cols`.
    pub fn alias<'a>(
        data: &'a [T],
        rows: usize,
        cols: usize,
    ) -> Result<MatrixView<'a, T>, MatrixError> {
        MatrixView::from_slice(data, rows, cols, cols)
    }
}
