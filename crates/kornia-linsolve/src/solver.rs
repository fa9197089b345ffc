use kornia_matrix::{AsMatrixView, Matrix, MatrixError, MatrixView, Scalar};

use crate::{
    error::SolverError,
    record::{LinearSolverRecord, LinearSolverStatus},
};

/// Magnitude below which a Householder column norm, a singular value ratio or
/// a relative diagonal element marks the matrix as ill-conditioned.
pub const ILL_COND_THRESHOLD: f64 = 1e-7;

/// Common interface of the linear solvers.
///
/// A solver is bound to a system matrix `A` at construction or through its
/// `set_matrix` method, which factorizes (or, for the iterative solvers,
/// validates) it once. Any number of right-hand sides can then be solved
/// against that matrix.
///
/// The trait is object safe, so solvers can be picked at runtime:
///
/// ```rust
/// use kornia_linsolve::{LinearSolver, LuSolver, QrSolver};
/// use kornia_matrix::Matrix;
///
/// let a: Matrix<f64> = Matrix::from_rows(&[[4.0, 1.0], [1.0, 3.0]]);
/// let b = Matrix::from_rows(&[[1.0], [2.0]]);
///
/// let mut solvers: Vec<Box<dyn LinearSolver<f64>>> = vec![
///     Box::new(LuSolver::new(&a).unwrap()),
///     Box::new(QrSolver::new(&a).unwrap()),
/// ];
/// for solver in solvers.iter_mut() {
///     let record = solver.solve(&b).unwrap();
///     assert!(record.is_usable());
/// }
/// ```
pub trait LinearSolver<T: Scalar> {
    /// Number of rows of the system matrix.
    fn nrows(&self) -> usize;

    /// Number of columns of the system matrix.
    fn ncols(&self) -> usize;

    /// Condition of the system matrix, as found when it was loaded.
    fn status(&self) -> LinearSolverStatus;

    /// Solves `A * X = B` into an existing record, reusing its buffers.
    ///
    /// `B` must have [`nrows`](LinearSolver::nrows) rows and may have any number
    /// of columns, each being an independent right-hand side.
    ///
    /// # Errors
    ///
    /// - [`SolverError::NotFactorized`] if no matrix was loaded.
    /// - [`SolverError::DimensionMismatch`] if `B` has the wrong number of rows.
    /// - [`SolverError::SingularMatrix`] for LU and QR on a singular matrix.
    fn solve_into(
        &mut self,
        b: &dyn AsMatrixView<T>,
        record: &mut LinearSolverRecord<T>,
    ) -> Result<(), SolverError>;

    /// Solves `A * X = B` into a new record.
    ///
    /// # Errors
    ///
    /// See [`LinearSolver::solve_into`].
    fn solve(&mut self, b: &dyn AsMatrixView<T>) -> Result<LinearSolverRecord<T>, SolverError> {
        let mut record = LinearSolverRecord::new();
        self.solve_into(b, &mut record)?;
        Ok(record)
    }
}

/// Fails unless the status allows a direct solve to proceed.
pub(crate) fn ensure_solvable(status: LinearSolverStatus) -> Result<(), SolverError> {
    match status {
        LinearSolverStatus::Unknown => Err(SolverError::NotFactorized),
        LinearSolverStatus::SingularMatrix => Err(SolverError::SingularMatrix),
        _ => Ok(()),
    }
}

/// Fails unless `b` has `rows` rows.
pub(crate) fn check_rhs<T: Scalar>(rows: usize, b: &MatrixView<'_, T>) -> Result<(), SolverError> {
    if b.rows() != rows {
        return Err(SolverError::DimensionMismatch {
            expected_rows: rows,
            actual_rows: b.rows(),
        });
    }
    Ok(())
}

/// Computes `A * X - B` into `out`, accumulating every element in `f64`, and
/// returns the largest absolute residual.
pub(crate) fn residual_into<T: Scalar>(
    a: &MatrixView<'_, T>,
    x: &Matrix<T>,
    b: &MatrixView<'_, T>,
    out: &mut Matrix<T>,
) -> Result<f64, SolverError> {
    if a.cols() != x.rows() || a.rows() != b.rows() || x.cols() != b.cols() {
        return Err(MatrixError::dimension_mismatch("residual", b.shape(), [a.rows(), x.cols()]).into());
    }
    out.reshape(b.rows(), b.cols());
    let mut max_residual = 0.0f64;
    for i in 0..a.rows() {
        let (a_row, b_row) = (a.row(i), b.row(i));
        for (c, &b_ic) in b_row.iter().enumerate() {
            let r = a_row
                .iter()
                .enumerate()
                .fold(-b_ic.into_f64(), |acc, (k, &a_ik)| {
                    acc + a_ik.into_f64() * x[(k, c)].into_f64()
                });
            max_residual = max_residual.max(r.abs());
            out[(i, c)] = T::from_f64(r);
        }
    }
    Ok(max_residual)
}

/// Solves `A * X = B` with `solver`, then runs `passes` rounds of iterative
/// refinement: compute `R = A * X - B` in extended precision, solve
/// `A * D = R` with the same factorization and update `X -= D`.
///
/// `a` must be the matrix `solver` was built from, before factorization.
pub(crate) fn refine<T, S>(
    solver: &mut S,
    a: &dyn AsMatrixView<T>,
    b: &dyn AsMatrixView<T>,
    passes: usize,
) -> Result<LinearSolverRecord<T>, SolverError>
where
    T: Scalar,
    S: LinearSolver<T> + ?Sized,
{
    let (a, b) = (a.as_matrix_view(), b.as_matrix_view());
    if a.shape() != [solver.nrows(), solver.ncols()] {
        return Err(MatrixError::dimension_mismatch(
            "refine",
            [solver.nrows(), solver.ncols()],
            a.shape(),
        )
        .into());
    }

    let mut record = solver.solve(&b)?;
    let mut residual = Matrix::with_capacity(b.rows(), b.cols());
    let mut correction = LinearSolverRecord::with_capacity(a.cols(), b.cols());
    for pass in 0..passes {
        let max_residual = residual_into(&a, &record.solution, &b, &mut residual)?;
        log::trace!("refinement pass {pass}: max residual {max_residual:e}");
        if max_residual == 0.0 {
            break;
        }
        solver.solve_into(&residual, &mut correction)?;
        record.solution.sub_assign_matrix(&correction.solution)?;
    }
    Ok(record)
}
