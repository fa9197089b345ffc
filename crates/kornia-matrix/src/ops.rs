//! Matrix arithmetic and norms.
//!
//! The free functions allocate their result; the `Matrix` methods with an
//! `_assign` suffix or a `multiply_by` verb update the receiver in place.

use std::ops::{Mul, Neg};

use crate::{
    error::MatrixError,
    view::{AsMatrixView, MatrixView},
    Matrix, Scalar,
};

/// Matrix norm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Norm {
    /// Maximum absolute column sum. For vectors, the sum of absolute values.
    L1,
    /// Frobenius norm. For vectors, the Euclidean norm.
    L2,
    /// Maximum absolute row sum. For vectors, the largest absolute value.
    Inf,
}

fn check_same_shape<T: Scalar>(
    operation: &'static str,
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
) -> Result<(), MatrixError> {
    if a.shape() != b.shape() {
        return Err(MatrixError::dimension_mismatch(
            operation,
            a.shape(),
            b.shape(),
        ));
    }
    Ok(())
}

/// Computes `a * b` into `out`, reshaping `out` to `a.rows() x b.cols()`.
///
/// `out` must not alias either operand, which the borrow checker guarantees.
///
/// # Errors
///
/// Returns [`MatrixError::DimensionMismatch`] if `a.cols() != b.rows()`.
pub fn matmul_into<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    out: &mut Matrix<T>,
) -> Result<(), MatrixError> {
    let (a, b) = (a.as_matrix_view(), b.as_matrix_view());
    if a.cols() != b.rows() {
        return Err(MatrixError::dimension_mismatch(
            "matmul",
            [a.cols(), b.cols()],
            b.shape(),
        ));
    }
    out.reshape(a.rows(), b.cols());
    for i in 0..a.rows() {
        let a_row = a.row(i);
        let out_row = out.row_mut(i);
        // i-k-j order walks both `b` and `out` row by row
        for (k, &a_ik) in a_row.iter().enumerate() {
            if a_ik == T::zero() {
                continue;
            }
            for (o, &b_kj) in out_row.iter_mut().zip(b.row(k)) {
                *o += a_ik * b_kj;
            }
        }
    }
    Ok(())
}

/// Returns `a * b`.
///
/// # Errors
///
/// Returns [`MatrixError::DimensionMismatch`] if `a.cols() != b.rows()`.
///
/// # Examples
///
/// ```rust
/// use kornia_matrix::{ops, Matrix};
///
/// let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
/// let x = Matrix::from_rows(&[[1.0], [1.0]]);
/// assert_eq!(ops::matmul(&a, &x).unwrap().to_vec(), vec![3.0, 7.0]);
/// ```
pub fn matmul<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
) -> Result<Matrix<T>, MatrixError> {
    let mut out = Matrix::new(0, 0);
    matmul_into(a, b, &mut out)?;
    Ok(out)
}

/// Returns `a + b`.
///
/// # Errors
///
/// Returns [`MatrixError::DimensionMismatch`] if the shapes differ.
pub fn add<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
) -> Result<Matrix<T>, MatrixError> {
    let mut out = a.as_matrix_view().to_matrix();
    out.add_assign_matrix(b)?;
    Ok(out)
}

/// Returns `a - b`.
///
/// # Errors
///
/// Returns [`MatrixError::DimensionMismatch`] if the shapes differ.
pub fn sub<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
) -> Result<Matrix<T>, MatrixError> {
    let mut out = a.as_matrix_view().to_matrix();
    out.sub_assign_matrix(b)?;
    Ok(out)
}

/// Returns `s * a`.
pub fn scale<T: Scalar>(s: T, a: &impl AsMatrixView<T>) -> Matrix<T> {
    let mut out = a.as_matrix_view().to_matrix();
    out.scale(s);
    out
}

impl<T: Scalar> Matrix<T> {
    fn zip_assign<F>(
        &mut self,
        operation: &'static str,
        other: &impl AsMatrixView<T>,
        f: F,
    ) -> Result<(), MatrixError>
    where
        F: Fn(&mut T, T),
    {
        let other = other.as_matrix_view();
        check_same_shape(operation, &self.view(), &other)?;
        for i in 0..self.rows {
            for (x, &y) in self.row_mut(i).iter_mut().zip(other.row(i)) {
                f(x, y);
            }
        }
        Ok(())
    }

    /// Adds `other` element-wise into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if the shapes differ.
    pub fn add_assign_matrix(&mut self, other: &impl AsMatrixView<T>) -> Result<(), MatrixError> {
        self.zip_assign("add", other, |x, y| *x += y)
    }

    /// Subtracts `other` element-wise from `self`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if the shapes differ.
    pub fn sub_assign_matrix(&mut self, other: &impl AsMatrixView<T>) -> Result<(), MatrixError> {
        self.zip_assign("sub", other, |x, y| *x -= y)
    }

    /// Multiplies every element by `s`.
    pub fn scale(&mut self, s: T) {
        for i in 0..self.rows {
            self.row_mut(i).iter_mut().for_each(|x| *x *= s);
        }
    }

    /// Returns `self + other`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if the shapes differ.
    pub fn add(&self, other: &impl AsMatrixView<T>) -> Result<Self, MatrixError> {
        add(self, other)
    }

    /// Returns `self - other`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if the shapes differ.
    pub fn sub(&self, other: &impl AsMatrixView<T>) -> Result<Self, MatrixError> {
        sub(self, other)
    }

    /// Returns `s * self`.
    pub fn scaled(&self, s: T) -> Self {
        scale(s, self)
    }

    /// Returns `self * rhs`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if `self.cols() != rhs.rows()`.
    pub fn matmul(&self, rhs: &impl AsMatrixView<T>) -> Result<Self, MatrixError> {
        matmul(self, rhs)
    }

    /// Replaces `self` with `self * rhs`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if `self.cols() != rhs.rows()`.
    pub fn post_multiply_by(&mut self, rhs: &impl AsMatrixView<T>) -> Result<(), MatrixError> {
        let product = matmul(self, rhs)?;
        self.copy_from(&product);
        Ok(())
    }

    /// Replaces `self` with `lhs * self`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if `lhs.cols() != self.rows()`.
    pub fn pre_multiply_by(&mut self, lhs: &impl AsMatrixView<T>) -> Result<(), MatrixError> {
        let product = matmul(lhs, self)?;
        self.copy_from(&product);
        Ok(())
    }

    /// Maximum absolute column sum.
    pub fn norm_1(&self) -> T {
        (0..self.cols)
            .map(|j| {
                self.iter_rows()
                    .fold(T::zero(), |acc, row| acc + row[j].abs())
            })
            .fold(T::zero(), T::max)
    }

    /// Maximum absolute row sum.
    pub fn norm_inf(&self) -> T {
        self.iter_rows()
            .map(|row| row.iter().fold(T::zero(), |acc, x| acc + x.abs()))
            .fold(T::zero(), T::max)
    }

    /// Square root of the sum of squared elements.
    pub fn norm_frobenius(&self) -> T {
        self.iter_rows()
            .flat_map(|row| row.iter())
            .fold(T::zero(), |acc, &x| acc + x * x)
            .sqrt()
    }

    /// Computes the selected norm.
    pub fn norm(&self, norm: Norm) -> T {
        match norm {
            Norm::L1 => self.norm_1(),
            Norm::L2 => self.norm_frobenius(),
            Norm::Inf => self.norm_inf(),
        }
    }
}

impl<T: Scalar> Mul<T> for &Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, rhs: T) -> Matrix<T> {
        self.scaled(rhs)
    }
}

impl<T: Scalar> Neg for &Matrix<T> {
    type Output = Matrix<T>;

    fn neg(self) -> Matrix<T> {
        self.scaled(-T::one())
    }
}

macro_rules! impl_scalar_lhs_mul {
    ($($t:ty),*) => {
        $(
            impl Mul<&Matrix<$t>> for $t {
                type Output = Matrix<$t>;

                fn mul(self, rhs: &Matrix<$t>) -> Matrix<$t> {
                    rhs.scaled(self)
                }
            }
        )*
    };
}

impl_scalar_lhs_mul!(f32, f64);

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_matmul() -> Result<(), MatrixError> {
        let a = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let b = Matrix::from_rows(&[[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]]);
        let c = a.matmul(&b)?;
        assert_eq!(c, Matrix::from_rows(&[[58.0, 64.0], [139.0, 154.0]]));

        let err = a.matmul(&a);
        assert!(matches!(err, Err(MatrixError::DimensionMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_matmul_into_reuses_output() -> Result<(), MatrixError> {
        let a = Matrix::<f64>::identity(3);
        let b = Matrix::from_fn(3, 2, |i, j| (i + j) as f64);
        let mut out = Matrix::with_storage(0, 0, 4, 4)?;
        matmul_into(&a, &b, &mut out)?;
        assert_eq!(out, b);
        assert_eq!(out.storage_cols(), 4);
        Ok(())
    }

    #[test]
    fn test_add_sub_scale() -> Result<(), MatrixError> {
        let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
        let b = Matrix::from_rows(&[[0.5, 0.5], [0.5, 0.5]]);
        assert_eq!(add(&a, &b)?.to_vec(), vec![1.5, 2.5, 3.5, 4.5]);
        assert_eq!(a.sub(&b)?.to_vec(), vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!((&a * 2.0).to_vec(), vec![2.0, 4.0, 6.0, 8.0]);
        assert_eq!((2.0 * &a), &a * 2.0);
        assert_eq!((-&a).to_vec(), vec![-1.0, -2.0, -3.0, -4.0]);

        let wrong = Matrix::<f64>::new(2, 3);
        assert!(add(&a, &wrong).is_err());
        Ok(())
    }

    #[test]
    fn test_pre_post_multiply() -> Result<(), MatrixError> {
        let swap = Matrix::from_rows(&[[0.0, 1.0], [1.0, 0.0]]);
        let mut m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
        m.pre_multiply_by(&swap)?;
        assert_eq!(m.to_vec(), vec![3.0, 4.0, 1.0, 2.0]);
        m.post_multiply_by(&swap)?;
        assert_eq!(m.to_vec(), vec![4.0, 3.0, 2.0, 1.0]);

        let mut row = Matrix::from_rows(&[[1.0, 1.0]]);
        row.post_multiply_by(&Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]))?;
        assert_eq!(row.shape(), [1, 3]);
        assert_eq!(row.to_vec(), vec![5.0, 7.0, 9.0]);
        Ok(())
    }

    #[test]
    fn test_norms() {
        let m = Matrix::from_rows(&[[1.0, -2.0], [-3.0, 4.0]]);
        assert_eq!(m.norm_1(), 6.0);
        assert_eq!(m.norm_inf(), 7.0);
        assert_relative_eq!(m.norm_frobenius(), 30.0f64.sqrt(), epsilon = 1e-12);
        assert_eq!(m.norm(Norm::Inf), m.norm_inf());
    }
}
