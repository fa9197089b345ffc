use thiserror::Error;

/// Error type for matrix construction, access and arithmetic.
///
/// All variants but [`MatrixError::ZeroNorm`] describe an inconsistent shape or
/// index on the caller side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// Matrix shapes are incompatible for the requested operation.
    ///
    /// # Examples
    /// - Adding a `2x3` matrix to a `3x2` matrix
    /// - Multiplying `A (m x k)` by `B (l x n)` with `k != l`
    ///
    /// # Recommended Actions
    /// - Verify the shapes with [`Matrix::shape`](crate::Matrix::shape)
    /// - Transpose one operand if the inner dimensions are swapped
    #[error("Dimension mismatch in {operation}: expected shape {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Name of the operation that failed.
        operation: &'static str,
        /// Shape the operation required, as `[rows, cols]`.
        expected: [usize; 2],
        /// Shape that was provided, as `[rows, cols]`.
        actual: [usize; 2],
    },

    /// The data provided does not match the requested shape.
    ///
    /// Raised when building a matrix from a flat buffer whose length differs
    /// from `rows * cols`, or from rows of unequal lengths.
    #[error("Shape mismatch: expected {expected} elements for shape, but got {actual} elements in data")]
    InvalidShape {
        /// Expected number of elements.
        expected: usize,
        /// Actual number of elements in the data.
        actual: usize,
    },

    /// Element index outside the logical shape.
    #[error("Index ({row}, {col}) out of bounds for matrix of shape {shape:?}")]
    IndexOutOfBounds {
        /// Row index that was attempted.
        row: usize,
        /// Column index that was attempted.
        col: usize,
        /// Logical shape of the matrix.
        shape: [usize; 2],
    },

    /// The logical shape does not fit in the storage buffer.
    #[error("Logical shape {rows}x{cols} exceeds storage shape {storage_rows}x{storage_cols}")]
    ExceedsStorage {
        /// Requested number of rows.
        rows: usize,
        /// Requested number of columns.
        cols: usize,
        /// Number of rows of the storage buffer.
        storage_rows: usize,
        /// Number of columns of the storage buffer.
        storage_cols: usize,
    },

    /// The row stride of a view is smaller than its number of columns, or the
    /// backing slice is too short for the view.
    #[error("Invalid layout: stride {stride} for {rows}x{cols} view over {len} elements")]
    InvalidLayout {
        /// Number of rows of the view.
        rows: usize,
        /// Number of columns of the view.
        cols: usize,
        /// Row stride of the view.
        stride: usize,
        /// Length of the backing slice.
        len: usize,
    },

    /// The operation requires a square matrix.
    #[error("{operation} requires a square matrix, got {rows}x{cols}")]
    NotSquare {
        /// Name of the operation that failed.
        operation: &'static str,
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// A row or column vector was expected.
    #[error("Matrix of shape {rows}x{cols} is not a vector")]
    NotAVector {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// Normalization or orthogonalization hit a zero norm.
    #[error("Cannot normalize: the norm is zero")]
    ZeroNorm,
}

impl MatrixError {
    /// Creates a DimensionMismatch error.
    pub fn dimension_mismatch(
        operation: &'static str,
        expected: [usize; 2],
        actual: [usize; 2],
    ) -> Self {
        Self::DimensionMismatch {
            operation,
            expected,
            actual,
        }
    }

    /// Creates an InvalidShape error.
    pub fn invalid_shape(expected: usize, actual: usize) -> Self {
        Self::InvalidShape { expected, actual }
    }

    /// Creates a NotSquare error.
    pub fn not_square(operation: &'static str, shape: [usize; 2]) -> Self {
        Self::NotSquare {
            operation,
            rows: shape[0],
            cols: shape[1],
        }
    }

    /// Returns true if this error stems from an inconsistent shape, as opposed to
    /// a numeric condition such as a zero norm.
    pub fn is_shape_error(&self) -> bool {
        !matches!(self, Self::ZeroNorm)
    }
}
