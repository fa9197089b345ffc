//! LU factorization with scaled partial pivoting.
//!
//! The factorization follows Crout's method: the unit lower triangle `L` and
//! the upper triangle `U` share the storage of `A`, the unit diagonal of `L`
//! being implicit. Pivot rows are chosen by their magnitude relative to the
//! largest element of the row, and are tracked with a permutation array
//! instead of being physically swapped.

use kornia_matrix::{AsMatrixView, AsMatrixViewMut, Matrix, MatrixView, Scalar};

use crate::{
    error::SolverError,
    record::{LinearSolverRecord, LinearSolverStatus},
    solver::{check_rhs, ensure_solvable, refine, LinearSolver},
};

/// Pivot magnitude below which the matrix is reported as ill-conditioned.
pub const ILL_COND_PIVOT_THRESHOLD: f64 = 1e-7;

/// LU solver for square systems.
///
/// `M` is the storage the factorization is written to:
/// - [`LuSolver::new`] copies `A` into an owned [`Matrix`], leaving the
///   caller's matrix untouched.
/// - [`LuSolver::in_place`] takes `&mut Matrix` or a
///   [`MatrixViewMut`](kornia_matrix::MatrixViewMut) and overwrites the caller's
///   buffer with the factors, saving the copy.
///
/// # Examples
///
/// ```rust
/// use kornia_linsolve::{LinearSolver, LinearSolverStatus, LuSolver};
/// use kornia_matrix::Matrix;
///
/// let a: Matrix<f64> = Matrix::from_rows(&[[2.0, 1.0], [4.0, 3.0]]);
/// let b = Matrix::from_rows(&[[3.0], [7.0]]);
///
/// let mut lu = LuSolver::new(&a).unwrap();
/// assert_eq!(lu.status(), LinearSolverStatus::RegularMatrix);
///
/// let record = lu.solve(&b).unwrap();
/// assert!((record.solution[(0, 0)] - 1.0).abs() < 1e-12);
/// assert!((record.solution[(1, 0)] - 1.0).abs() < 1e-12);
/// ```
pub struct LuSolver<T: Scalar = f64, M = Matrix<T>> {
    lu: M,
    perm: Vec<usize>,
    scale: Vec<T>,
    even_permutation: bool,
    status: LinearSolverStatus,
    scratch: Vec<T>,
}

impl<T: Scalar> LuSolver<T, Matrix<T>> {
    /// Copies `a` and factorizes the copy.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` is not square or is empty.
    pub fn new(a: &impl AsMatrixView<T>) -> Result<Self, SolverError> {
        Self::in_place(a.as_matrix_view().to_matrix())
    }

    /// Creates a solver with no matrix, whose buffers can hold systems of up to
    /// `max_rows x max_cols` without reallocating. Load a matrix with
    /// [`LuSolver::load`].
    pub fn with_capacity(max_rows: usize, max_cols: usize) -> Self {
        Self {
            lu: Matrix::with_capacity(max_rows, max_cols),
            perm: Vec::with_capacity(max_rows),
            scale: Vec::with_capacity(max_rows),
            even_permutation: true,
            status: LinearSolverStatus::Unknown,
            scratch: Vec::with_capacity(max_rows),
        }
    }

    /// Copies `a` into the solver buffer and factorizes it.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` is not square or is empty.
    pub fn load(&mut self, a: &impl AsMatrixView<T>) -> Result<(), SolverError> {
        self.lu.copy_from(a);
        self.factorize()
    }
}

impl<T: Scalar, M: AsMatrixViewMut<T>> LuSolver<T, M> {
    /// Factorizes `a` in place, overwriting it with the LU factors.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` is not square or is empty.
    pub fn in_place(a: M) -> Result<Self, SolverError> {
        let n = a.as_matrix_view().rows();
        let mut solver = Self {
            lu: a,
            perm: Vec::with_capacity(n),
            scale: Vec::with_capacity(n),
            even_permutation: true,
            status: LinearSolverStatus::Unknown,
            scratch: Vec::with_capacity(n),
        };
        solver.factorize()?;
        Ok(solver)
    }

    /// Replaces the system matrix and factorizes it in place.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` is not square or is empty.
    pub fn set_matrix(&mut self, a: M) -> Result<(), SolverError> {
        self.lu = a;
        self.factorize()
    }

    /// Releases the factorized matrix.
    pub fn into_inner(self) -> M {
        self.lu
    }

    /// The combined LU factors, rows in their original order.
    pub fn factors(&self) -> MatrixView<'_, T> {
        self.lu.as_matrix_view()
    }

    /// Row permutation: logical row `i` of the factors is stored in row
    /// `permutation()[i]`.
    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    /// Determinant of the factorized matrix, zero if it is singular.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::NotFactorized`] if no matrix was loaded.
    pub fn determinant(&self) -> Result<T, SolverError> {
        match self.status {
            LinearSolverStatus::Unknown => return Err(SolverError::NotFactorized),
            LinearSolverStatus::SingularMatrix => return Ok(T::zero()),
            _ => {}
        }
        let lu = self.lu.as_matrix_view();
        let (data, stride) = (lu.as_slice(), lu.stride());
        let det = self
            .perm
            .iter()
            .enumerate()
            .fold(T::one(), |acc, (i, &p)| acc * data[p * stride + i]);
        Ok(if self.even_permutation { det } else { -det })
    }

    /// Solves `A * X = B` and improves the solution with `passes` rounds of
    /// iterative refinement.
    ///
    /// The residual is computed against `a`, which must be the matrix the solver
    /// was built from; in-place solvers no longer hold it.
    ///
    /// # Errors
    ///
    /// See [`LinearSolver::solve_into`]. Also fails if `a` does not have the
    /// shape of the factorized matrix.
    pub fn solve_refined(
        &mut self,
        a: &impl AsMatrixView<T>,
        b: &impl AsMatrixView<T>,
        passes: usize,
    ) -> Result<LinearSolverRecord<T>, SolverError> {
        refine(self, a, b, passes)
    }

    fn factorize(&mut self) -> Result<(), SolverError> {
        self.status = LinearSolverStatus::Unknown;
        let mut lu = self.lu.as_matrix_view_mut();
        let n = lu.rows();
        if n != lu.cols() {
            return Err(SolverError::invalid_shape("LU", lu.shape(), "matrix must be square"));
        }
        if n == 0 {
            return Err(SolverError::invalid_shape("LU", lu.shape(), "matrix is empty"));
        }

        let stride = lu.stride();
        let a = lu.as_mut_slice();
        let at = |i: usize, j: usize| i * stride + j;
        let mut status = LinearSolverStatus::RegularMatrix;

        self.scale.clear();
        for i in 0..n {
            let big = (0..n).fold(T::zero(), |acc, j| acc.max(a[at(i, j)].abs()));
            if big == T::zero() {
                status = LinearSolverStatus::SingularMatrix;
                self.scale.push(T::zero());
            } else {
                self.scale.push(T::one() / big);
            }
        }

        self.perm.clear();
        self.perm.extend(0..n);
        self.even_permutation = true;
        let threshold = T::from_f64(ILL_COND_PIVOT_THRESHOLD);

        for j in 0..n {
            // upper triangle of column j
            for i in 0..j {
                let pi = self.perm[i];
                let mut sum = a[at(pi, j)];
                for k in 0..i {
                    sum -= a[at(pi, k)] * a[at(self.perm[k], j)];
                }
                a[at(pi, j)] = sum;
            }

            // lower triangle of column j, searching for the pivot
            let mut big = T::zero();
            let mut pivot_row = j;
            for i in j..n {
                let pi = self.perm[i];
                let mut sum = a[at(pi, j)];
                for k in 0..j {
                    sum -= a[at(pi, k)] * a[at(self.perm[k], j)];
                }
                a[at(pi, j)] = sum;
                let candidate = self.scale[pi] * sum.abs();
                if candidate > big {
                    big = candidate;
                    pivot_row = i;
                }
            }
            if pivot_row != j {
                self.perm.swap(pivot_row, j);
                self.even_permutation = !self.even_permutation;
            }

            let pivot = a[at(self.perm[j], j)];
            if pivot == T::zero() {
                status = LinearSolverStatus::SingularMatrix;
                continue;
            }
            if pivot.abs() < threshold {
                status = status.worst(LinearSolverStatus::IllConditionedMatrix);
            }
            let inv = T::one() / pivot;
            for i in (j + 1)..n {
                a[at(self.perm[i], j)] *= inv;
            }
        }

        self.status = status;
        log::debug!("LU factorization of a {n}x{n} matrix: {status}");
        if status != LinearSolverStatus::RegularMatrix {
            log::warn!("LU factorization found a {status}");
        }
        Ok(())
    }
}

impl<T: Scalar, M: AsMatrixViewMut<T>> LinearSolver<T> for LuSolver<T, M> {
    fn nrows(&self) -> usize {
        self.lu.as_matrix_view().rows()
    }

    fn ncols(&self) -> usize {
        self.lu.as_matrix_view().cols()
    }

    fn status(&self) -> LinearSolverStatus {
        self.status
    }

    fn solve_into(
        &mut self,
        b: &dyn AsMatrixView<T>,
        record: &mut LinearSolverRecord<T>,
    ) -> Result<(), SolverError> {
        ensure_solvable(self.status)?;
        let b = b.as_matrix_view();
        let lu = self.lu.as_matrix_view();
        let n = lu.rows();
        check_rhs(n, &b)?;

        let (a, stride) = (lu.as_slice(), lu.stride());
        let at = |i: usize, j: usize| i * stride + j;
        let y = &mut self.scratch;
        record.solution.reshape(n, b.cols());

        for c in 0..b.cols() {
            // forward substitution with the unit lower triangle
            y.clear();
            for i in 0..n {
                let pi = self.perm[i];
                let mut sum = b.row(pi)[c];
                for (k, &y_k) in y.iter().enumerate() {
                    sum -= a[at(pi, k)] * y_k;
                }
                y.push(sum);
            }
            // back substitution with the upper triangle, in place
            for i in (0..n).rev() {
                let pi = self.perm[i];
                let mut sum = y[i];
                for k in (i + 1)..n {
                    sum -= a[at(pi, k)] * y[k];
                }
                y[i] = sum / a[at(pi, i)];
            }
            for (i, &x) in y.iter().enumerate() {
                record.solution[(i, c)] = x;
            }
        }

        record.status = self.status;
        record.iterations = None;
        Ok(())
    }
}

/// Solves `A * X = B` by LU factorization of a copy of `a`.
///
/// # Errors
///
/// See [`LuSolver::new`] and [`LinearSolver::solve_into`].
pub fn solve<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    LuSolver::new(a)?.solve(b)
}

/// Solves `A * X = B`, overwriting `a` with its LU factors.
///
/// # Errors
///
/// See [`LuSolver::in_place`] and [`LinearSolver::solve_into`].
pub fn solve_in_place<T: Scalar>(
    a: impl AsMatrixViewMut<T>,
    b: &impl AsMatrixView<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    LuSolver::in_place(a)?.solve(b)
}

/// Solves `A * X = B` with `passes` rounds of iterative refinement.
///
/// # Errors
///
/// See [`LuSolver::new`] and [`LinearSolver::solve_into`].
pub fn solve_refined<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    passes: usize,
) -> Result<LinearSolverRecord<T>, SolverError> {
    LuSolver::new(a)?.solve_refined(a, b, passes)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use kornia_matrix::MatrixViewMut;

    use super::*;

    #[test]
    fn test_lu_solve_3x3() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[2.0, 1.0, 1.0], [4.0, -6.0, 0.0], [-2.0, 7.0, 2.0]]);
        let b = Matrix::from_rows(&[[5.0], [-2.0], [9.0]]);
        let record = solve(&a, &b)?;
        assert_eq!(record.status, LinearSolverStatus::RegularMatrix);
        assert_relative_eq!(record.solution[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(record.solution[(1, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(record.solution[(2, 0)], 2.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_lu_pivots_by_scaled_magnitude() -> Result<(), SolverError> {
        // the first row has the largest element of column 0 but it is small
        // relative to the rest of its row
        let a = Matrix::from_rows(&[[30.0, 591400.0], [5.291, -6.130]]);
        let lu = LuSolver::new(&a)?;
        assert_eq!(lu.permutation(), &[1, 0]);
        assert_relative_eq!(lu.determinant()?, 30.0 * -6.130 - 591400.0 * 5.291, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn test_lu_multiple_rhs_and_reuse() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[4.0, -2.0, 1.0], [-2.0, 4.0, -2.0], [1.0, -2.0, 4.0]]);
        let x = Matrix::from_rows(&[[1.0, 0.0], [2.0, -1.0], [3.0, 0.5]]);
        let b = a.matmul(&x)?;

        let mut lu = LuSolver::with_capacity(8, 8);
        assert_eq!(lu.solve(&b).err(), Some(SolverError::NotFactorized));

        lu.load(&a)?;
        let mut record = LinearSolverRecord::with_capacity(8, 8);
        lu.solve_into(&b, &mut record)?;
        for i in 0..3 {
            for j in 0..2 {
                assert_relative_eq!(record.solution[(i, j)], x[(i, j)], epsilon = 1e-12);
            }
        }
        assert_eq!(record.solution.storage_rows(), 8);

        let wrong = Matrix::<f64>::new(2, 1);
        assert_eq!(
            lu.solve(&wrong).err(),
            Some(SolverError::DimensionMismatch {
                expected_rows: 3,
                actual_rows: 2
            })
        );
        Ok(())
    }

    #[test]
    fn test_lu_in_place_overwrites_caller() -> Result<(), SolverError> {
        let original = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
        let b = Matrix::from_rows(&[[5.0], [6.0]]);

        let mut a = original.clone();
        let record = solve_in_place(&mut a, &b)?;
        assert_ne!(a, original);
        assert_relative_eq!(record.solution[(0, 0)], -4.0, epsilon = 1e-12);
        assert_relative_eq!(record.solution[(1, 0)], 4.5, epsilon = 1e-12);

        let mut raw = [1.0, 2.0, 3.0, 4.0];
        let view = MatrixViewMut::from_slice(&mut raw, 2, 2, 2)?;
        let mut lu = LuSolver::in_place(view)?;
        assert_eq!(lu.solve(&b)?.solution, record.solution);
        drop(lu);
        assert_ne!(raw, [1.0, 2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn test_lu_singular() -> Result<(), SolverError> {
        let zero_row = Matrix::from_rows(&[[1.0, 2.0], [0.0, 0.0]]);
        let mut lu = LuSolver::new(&zero_row)?;
        assert_eq!(lu.status(), LinearSolverStatus::SingularMatrix);
        assert_eq!(lu.determinant()?, 0.0);
        assert_eq!(
            lu.solve(&Matrix::from_rows(&[[1.0], [1.0]])).err(),
            Some(SolverError::SingularMatrix)
        );

        let dependent = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]]);
        assert_eq!(
            LuSolver::new(&dependent)?.status(),
            LinearSolverStatus::SingularMatrix
        );
        Ok(())
    }

    #[test]
    fn test_lu_zero_pivot_stays_singular() -> Result<(), SolverError> {
        // zero first column, the pivots that follow are well conditioned
        let a = Matrix::from_rows(&[[0.0, 2.0, 1.0], [0.0, 1.0, 3.0], [0.0, 4.0, 1.0]]);
        let lu = LuSolver::new(&a)?;
        assert_eq!(lu.status(), LinearSolverStatus::SingularMatrix);
        assert_eq!(lu.determinant()?, 0.0);
        Ok(())
    }

    #[test]
    fn test_lu_ill_conditioned() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[1.0, 1.0], [1.0, 1.0 + 1e-9]]);
        let lu = LuSolver::new(&a)?;
        assert_eq!(lu.status(), LinearSolverStatus::IllConditionedMatrix);
        Ok(())
    }

    #[test]
    fn test_lu_rejects_non_square() {
        let a = Matrix::<f64>::new(2, 3);
        assert!(matches!(
            LuSolver::new(&a),
            Err(SolverError::InvalidShape { solver: "LU", .. })
        ));
    }

    #[test]
    fn test_lu_refinement_f32() -> Result<(), SolverError> {
        let a = Matrix::<f32>::from_fn(5, 5, |i, j| 1.0 / (i + j + 1) as f32 + if i == j { 1.0 } else { 0.0 });
        let x = Matrix::<f32>::from_fn(5, 1, |i, _| i as f32 + 1.0);
        let b = a.matmul(&x)?;

        let refined = solve_refined(&a, &b, 3)?;
        assert_eq!(refined.status, LinearSolverStatus::RegularMatrix);
        let error = refined.solution.sub(&x)?.norm_inf();
        assert!(error < 1e-5, "error {error}");
        Ok(())
    }
}
