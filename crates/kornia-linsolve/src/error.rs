use kornia_matrix::MatrixError;
use thiserror::Error;

/// Error type for the linear solvers.
///
/// Ill-conditioning and non-convergence of the stationary iterative methods are
/// not errors: they are reported in-band through
/// [`LinearSolverStatus`](crate::LinearSolverStatus) so that the caller still
/// gets the computed solution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Error raised by a matrix operation.
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// The right-hand side does not have as many rows as the system matrix.
    #[error("Right-hand side has {actual_rows} rows, expected {expected_rows}")]
    DimensionMismatch {
        /// Number of rows of the system matrix.
        expected_rows: usize,
        /// Number of rows of the right-hand side.
        actual_rows: usize,
    },

    /// The system matrix has a shape the solver does not support.
    ///
    /// # Examples
    /// - A non-square matrix given to the LU or an iterative solver
    /// - An underdetermined matrix (`rows < cols`) given to QR or SVD
    /// - A matrix with fewer than two columns given to SVD
    #[error("{solver} cannot handle a {rows}x{cols} matrix: {reason}")]
    InvalidShape {
        /// Name of the solver.
        solver: &'static str,
        /// Number of rows of the matrix.
        rows: usize,
        /// Number of columns of the matrix.
        cols: usize,
        /// What the solver requires.
        reason: &'static str,
    },

    /// A solver parameter is outside its valid range.
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Name of the parameter.
        parameter: &'static str,
        /// The valid range.
        reason: &'static str,
    },

    /// The factorization found an exactly zero pivot or column norm.
    ///
    /// Returned by the LU and QR `solve` calls; the SVD solver computes a
    /// pseudo-inverse solution instead.
    #[error("Matrix is singular")]
    SingularMatrix,

    /// `solve` was called before any matrix was loaded into the solver.
    #[error("No matrix has been factorized")]
    NotFactorized,

    /// A diagonal element is zero, which the iterative methods divide by.
    #[error("Zero diagonal element at row {row}")]
    ZeroDiagonal {
        /// Row of the zero diagonal element.
        row: usize,
    },

    /// The SVD iteration did not converge.
    #[error("Did not converge after {iterations} iterations")]
    NotConverged {
        /// Number of iterations performed.
        iterations: usize,
    },
}

impl SolverError {
    pub(crate) fn invalid_shape(
        solver: &'static str,
        shape: [usize; 2],
        reason: &'static str,
    ) -> Self {
        Self::InvalidShape {
            solver,
            rows: shape[0],
            cols: shape[1],
            reason,
        }
    }
}
