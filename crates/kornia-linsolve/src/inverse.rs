use kornia_matrix::{Matrix, Scalar};

use crate::{error::SolverError, lu, lu::LuSolver, svd};

/// Solver-backed matrix operations.
///
/// # Examples
///
/// ```rust
/// use kornia_linsolve::MatrixInverse;
/// use kornia_matrix::Matrix;
///
/// let a: Matrix<f64> = Matrix::from_rows(&[[4.0, 7.0], [2.0, 6.0]]);
/// assert!((a.determinant().unwrap() - 10.0).abs() < 1e-12);
///
/// let inv = a.inverse().unwrap();
/// let id = a.matmul(&inv).unwrap();
/// assert!((id[(0, 0)] - 1.0).abs() < 1e-12);
/// assert!(id[(1, 0)].abs() < 1e-12);
/// ```
pub trait MatrixInverse<T: Scalar> {
    /// Returns `A^-1`, computed by LU.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidShape`] if the matrix is not square,
    /// [`SolverError::SingularMatrix`] if it is singular.
    fn inverse(&self) -> Result<Matrix<T>, SolverError>;

    /// Replaces the matrix with its inverse. The matrix is left unchanged on
    /// error.
    ///
    /// # Errors
    ///
    /// See [`MatrixInverse::inverse`].
    fn invert(&mut self) -> Result<(), SolverError>;

    /// Determinant, computed by LU. Zero for a singular matrix.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidShape`] if the matrix is not square.
    fn determinant(&self) -> Result<T, SolverError>;

    /// Moore-Penrose pseudo-inverse, computed by SVD. Defined for any shape.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidShape`] if the matrix is empty,
    /// [`SolverError::NotConverged`] if the SVD does not converge.
    fn pseudo_inverse(&self) -> Result<Matrix<T>, SolverError>;
}

impl<T: Scalar> MatrixInverse<T> for Matrix<T> {
    fn inverse(&self) -> Result<Matrix<T>, SolverError> {
        Ok(lu::solve(self, &Matrix::identity(self.rows()))?.solution)
    }

    fn invert(&mut self) -> Result<(), SolverError> {
        *self = self.inverse()?;
        Ok(())
    }

    fn determinant(&self) -> Result<T, SolverError> {
        LuSolver::new(self)?.determinant()
    }

    fn pseudo_inverse(&self) -> Result<Matrix<T>, SolverError> {
        let [rows, cols] = self.shape();
        if rows < cols {
            // pinv(A) = pinv(A^T)^T
            return Ok(self.transposition().pseudo_inverse()?.transposition());
        }
        if cols == 1 {
            return Ok(column_pseudo_inverse(self));
        }
        Ok(svd::solve(self, &Matrix::identity(rows))?.solution)
    }
}

/// `v^T / (v^T v)`, or zeros for a zero vector.
fn column_pseudo_inverse<T: Scalar>(v: &Matrix<T>) -> Matrix<T> {
    let norm_sq = v.iter_rows().fold(T::zero(), |acc, row| acc + row[0] * row[0]);
    let mut pinv = v.transposition();
    if norm_sq != T::zero() {
        pinv.as_raw_slice_mut().iter_mut().for_each(|x| *x /= norm_sq);
    }
    pinv
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn assert_matrix_eq(a: &Matrix<f64>, b: &Matrix<f64>) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.to_vec().iter().zip(b.to_vec()) {
            assert_relative_eq!(*x, y, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_inverse_and_invert() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[2.0, 0.0, 1.0], [1.0, 3.0, 2.0], [1.0, 1.0, 1.0]]);
        let inv = a.inverse()?;
        assert_matrix_eq(&a.matmul(&inv)?, &Matrix::identity(3));

        let mut b = a.clone();
        b.invert()?;
        assert_eq!(b, inv);
        b.invert()?;
        assert_matrix_eq(&b, &a);
        Ok(())
    }

    #[test]
    fn test_singular_inverse() {
        let mut a = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]);
        assert_eq!(a.inverse(), Err(SolverError::SingularMatrix));
        assert!(a.invert().is_err());
        assert_eq!(a, Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]));
    }

    #[test]
    fn test_determinant() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 5.0]]);
        assert_relative_eq!(a.determinant()?, -5.0, epsilon = 1e-12);

        let singular = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]);
        assert_eq!(singular.determinant()?, 0.0);
        assert!(Matrix::<f64>::new(2, 3).determinant().is_err());
        Ok(())
    }

    #[test]
    fn test_pseudo_inverse_shapes() -> Result<(), SolverError> {
        let tall = Matrix::from_rows(&[[1.0, 0.0], [0.0, 2.0], [0.0, 0.0]]);
        let expected = Matrix::from_rows(&[[1.0, 0.0, 0.0], [0.0, 0.5, 0.0]]);
        assert_matrix_eq(&tall.pseudo_inverse()?, &expected);
        assert_matrix_eq(&tall.transposition().pseudo_inverse()?, &expected.transposition());

        let column = Matrix::from_rows(&[[3.0], [4.0]]);
        assert_matrix_eq(&column.pseudo_inverse()?, &Matrix::from_rows(&[[0.12, 0.16]]));

        // A * pinv(A) * A = A holds for a singular matrix too
        let singular = Matrix::from_rows(&[[2.0, 0.0], [0.0, 0.0]]);
        let pinv = singular.pseudo_inverse()?;
        assert_matrix_eq(&singular.matmul(&pinv)?.matmul(&singular)?, &singular);
        Ok(())
    }
}
