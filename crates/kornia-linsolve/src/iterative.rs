//! Stationary iterative methods: Jacobi, Gauss-Seidel and SOR.
//!
//! Each sweep updates every unknown from its row of the system,
//! `x_i <- (b_i - sum_{j != i} a_ij * x_j) / a_ii`. Jacobi reads only the
//! previous iterate, Gauss-Seidel reads the unknowns already updated in the
//! current sweep, and SOR blends the Gauss-Seidel update with the previous value
//! through the relaxation factor `omega`.
//!
//! Convergence is only guaranteed for suitable matrices (strictly diagonally
//! dominant, or symmetric positive definite for Gauss-Seidel and SOR). The
//! outcome is reported in the record status rather than as an error.

use std::fmt;

use kornia_matrix::{AsMatrixView, Matrix, MatrixView, Scalar};

use crate::{
    error::SolverError,
    record::{LinearSolverRecord, LinearSolverStatus},
    solver::{check_rhs, LinearSolver, ILL_COND_THRESHOLD},
};

/// The sweep rule of an [`IterativeSolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterativeMethod<T: Scalar = f64> {
    /// Every unknown is computed from the previous iterate.
    Jacobi,
    /// Every unknown is computed from the most recent values.
    GaussSeidel,
    /// Successive over-relaxation of Gauss-Seidel, `omega` in `(0, 2)`.
    Sor {
        /// Relaxation factor. `1` reduces to Gauss-Seidel.
        omega: T,
    },
}

impl<T: Scalar> IterativeMethod<T> {
    /// Short name of the method, used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            IterativeMethod::Jacobi => "Jacobi",
            IterativeMethod::GaussSeidel => "Gauss-Seidel",
            IterativeMethod::Sor { .. } => "SOR",
        }
    }

    fn validate(&self) -> Result<(), SolverError> {
        if let IterativeMethod::Sor { omega } = *self {
            if !(omega > T::zero() && omega < T::from_f64(2.0)) {
                return Err(SolverError::InvalidParameter {
                    parameter: "omega",
                    reason: "relaxation factor must lie in (0, 2)",
                });
            }
        }
        Ok(())
    }
}

impl<T: Scalar> fmt::Display for IterativeMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterativeMethod::Sor { omega } => write!(f, "SOR (omega = {omega})"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Stopping criteria of the iterative solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterativeConfig<T: Scalar = f64> {
    /// Maximum number of sweeps per right-hand side.
    pub max_iterations: usize,
    /// A column has converged when the largest change between two sweeps is
    /// at most `tolerance * max(1, |x|_inf)`.
    pub tolerance: T,
}

impl<T: Scalar> Default for IterativeConfig<T> {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: T::default_tolerance(),
        }
    }
}

/// Jacobi, Gauss-Seidel and SOR solver for square systems.
///
/// The system matrix is only read, so `M` is any [`AsMatrixView`]: an owned
/// [`Matrix`] (see [`IterativeSolver::new`]), a reference or a view.
///
/// # Examples
///
/// ```rust
/// use kornia_linsolve::{IterativeMethod, IterativeSolver, LinearSolver, LinearSolverStatus};
/// use kornia_matrix::Matrix;
///
/// let a: Matrix<f64> = Matrix::from_rows(&[[4.0, 1.0], [1.0, 3.0]]);
/// let b = Matrix::from_rows(&[[1.0], [2.0]]);
///
/// let mut solver = IterativeSolver::new(&a, IterativeMethod::GaussSeidel).unwrap();
/// let record = solver.solve(&b).unwrap();
/// assert_eq!(record.status, LinearSolverStatus::Succeeded);
/// assert!((record.solution[(0, 0)] - 1.0 / 11.0).abs() < 1e-9);
/// assert!((record.solution[(1, 0)] - 7.0 / 11.0).abs() < 1e-9);
/// ```
pub struct IterativeSolver<T: Scalar = f64, M = Matrix<T>> {
    a: M,
    method: IterativeMethod<T>,
    config: IterativeConfig<T>,
    inv_diag: Vec<T>,
    status: LinearSolverStatus,
    previous: Vec<T>,
    current: Vec<T>,
}

impl<T: Scalar> IterativeSolver<T, Matrix<T>> {
    /// Copies `a` into the solver.
    ///
    /// # Errors
    ///
    /// See [`IterativeSolver::from_matrix`].
    pub fn new(a: &impl AsMatrixView<T>, method: IterativeMethod<T>) -> Result<Self, SolverError> {
        Self::from_matrix(a.as_matrix_view().to_matrix(), method)
    }

    /// Creates a solver with no matrix, whose buffers can hold systems of up to
    /// `max_rows x max_cols` without reallocating.
    pub fn with_capacity(max_rows: usize, max_cols: usize, method: IterativeMethod<T>) -> Self {
        Self {
            a: Matrix::with_capacity(max_rows, max_cols),
            method,
            config: IterativeConfig::default(),
            inv_diag: Vec::with_capacity(max_rows),
            status: LinearSolverStatus::Unknown,
            previous: Vec::with_capacity(max_rows),
            current: Vec::with_capacity(max_rows),
        }
    }

    /// Copies `a` into the solver buffer and checks it, along with the method
    /// given to [`IterativeSolver::with_capacity`].
    ///
    /// # Errors
    ///
    /// See [`IterativeSolver::from_matrix`].
    pub fn load(&mut self, a: &impl AsMatrixView<T>) -> Result<(), SolverError> {
        self.a.copy_from(a);
        self.check_matrix()
    }
}

impl<T: Scalar, M: AsMatrixView<T>> IterativeSolver<T, M> {
    /// Binds `a` without copying it.
    ///
    /// # Errors
    ///
    /// - [`SolverError::InvalidParameter`] if the SOR factor is outside `(0, 2)`.
    /// - [`SolverError::InvalidShape`] if `a` is not square or is empty.
    /// - [`SolverError::ZeroDiagonal`] if a diagonal element is zero.
    pub fn from_matrix(a: M, method: IterativeMethod<T>) -> Result<Self, SolverError> {
        method.validate()?;
        let n = a.as_matrix_view().rows();
        let mut solver = Self {
            a,
            method,
            config: IterativeConfig::default(),
            inv_diag: Vec::with_capacity(n),
            status: LinearSolverStatus::Unknown,
            previous: Vec::with_capacity(n),
            current: Vec::with_capacity(n),
        };
        solver.check_matrix()?;
        Ok(solver)
    }

    /// Replaces the system matrix.
    ///
    /// # Errors
    ///
    /// See [`IterativeSolver::from_matrix`].
    pub fn set_matrix(&mut self, a: M) -> Result<(), SolverError> {
        self.a = a;
        self.check_matrix()
    }

    /// Releases the system matrix.
    pub fn into_inner(self) -> M {
        self.a
    }

    /// The system matrix.
    pub fn matrix(&self) -> MatrixView<'_, T> {
        self.a.as_matrix_view()
    }

    /// The sweep rule.
    pub fn method(&self) -> IterativeMethod<T> {
        self.method
    }

    /// Changes the sweep rule.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidParameter`] if the SOR factor is outside
    /// `(0, 2)`, leaving the current method in place.
    pub fn set_method(&mut self, method: IterativeMethod<T>) -> Result<(), SolverError> {
        method.validate()?;
        self.method = method;
        Ok(())
    }

    /// The stopping criteria.
    pub fn config(&self) -> &IterativeConfig<T> {
        &self.config
    }

    /// Changes the stopping criteria.
    pub fn set_config(&mut self, config: IterativeConfig<T>) {
        self.config = config;
    }

    /// Builder form of [`IterativeSolver::set_config`].
    pub fn with_config(mut self, config: IterativeConfig<T>) -> Self {
        self.config = config;
        self
    }

    /// Validates the matrix and caches the inverse of its diagonal.
    fn check_matrix(&mut self) -> Result<(), SolverError> {
        self.status = LinearSolverStatus::Unknown;
        self.inv_diag.clear();
        self.method.validate()?;
        let a = self.a.as_matrix_view();
        let [rows, cols] = a.shape();
        if rows != cols || rows == 0 {
            return Err(SolverError::invalid_shape(
                self.method.name(),
                [rows, cols],
                "matrix must be square and not empty",
            ));
        }

        let mut status = LinearSolverStatus::RegularMatrix;
        for i in 0..rows {
            let row = a.row(i);
            let diag = row[i];
            if diag == T::zero() {
                self.inv_diag.clear();
                return Err(SolverError::ZeroDiagonal { row: i });
            }
            let row_scale = row.iter().fold(T::zero(), |acc, x| acc.max(x.abs()));
            if diag.abs() < T::from_f64(ILL_COND_THRESHOLD) * row_scale {
                status = LinearSolverStatus::IllConditionedMatrix;
            }
            self.inv_diag.push(T::one() / diag);
        }

        log::debug!("{} solver on a {rows}x{cols} matrix: {status}", self.method);
        if status != LinearSolverStatus::RegularMatrix {
            log::warn!("{} solver: small diagonal element, {status}", self.method);
        }
        self.status = status;
        Ok(())
    }
}

/// Runs one sweep over `previous` into `current` for column `c` of `b`.
///
/// Returns the largest change and the largest magnitude of the new iterate, or
/// `None` if it is not finite.
fn sweep<T: Scalar>(
    method: IterativeMethod<T>,
    a: &MatrixView<'_, T>,
    inv_diag: &[T],
    b: &MatrixView<'_, T>,
    c: usize,
    previous: &[T],
    current: &mut [T],
) -> Option<(T, T)> {
    let (mut delta, mut magnitude) = (T::zero(), T::zero());
    for i in 0..a.rows() {
        let row = a.row(i);
        let mut sigma = T::zero();
        for (j, &a_ij) in row.iter().enumerate() {
            if j == i {
                continue;
            }
            let x_j = match method {
                IterativeMethod::Jacobi => previous[j],
                _ if j < i => current[j],
                _ => previous[j],
            };
            sigma += a_ij * x_j;
        }

        let x_gs = (b.row(i)[c] - sigma) * inv_diag[i];
        let x_new = match method {
            IterativeMethod::Sor { omega } => (T::one() - omega) * previous[i] + omega * x_gs,
            _ => x_gs,
        };
        if !x_new.is_finite() {
            return None;
        }
        current[i] = x_new;
        delta = delta.max((x_new - previous[i]).abs());
        magnitude = magnitude.max(x_new.abs());
    }
    Some((delta, magnitude))
}

impl<T: Scalar, M: AsMatrixView<T>> LinearSolver<T> for IterativeSolver<T, M> {
    fn nrows(&self) -> usize {
        self.a.as_matrix_view().rows()
    }

    fn ncols(&self) -> usize {
        self.a.as_matrix_view().cols()
    }

    /// Condition of the diagonal: [`LinearSolverStatus::RegularMatrix`] or
    /// [`LinearSolverStatus::IllConditionedMatrix`]. The outcome of a solve is
    /// in its record.
    fn status(&self) -> LinearSolverStatus {
        self.status
    }

    /// Iterates from a zero initial guess on every column of `B`.
    ///
    /// The record status is [`LinearSolverStatus::Succeeded`] if every column
    /// converged and [`LinearSolverStatus::Failed`] otherwise, in which case the
    /// solution holds the last finite iterate. `iterations` is the largest
    /// number of sweeps spent on a column.
    fn solve_into(
        &mut self,
        b: &dyn AsMatrixView<T>,
        record: &mut LinearSolverRecord<T>,
    ) -> Result<(), SolverError> {
        if self.status == LinearSolverStatus::Unknown {
            return Err(SolverError::NotFactorized);
        }
        let b = b.as_matrix_view();
        let a = self.a.as_matrix_view();
        let n = a.rows();
        check_rhs(n, &b)?;

        let (method, config) = (self.method, self.config);
        let (previous, current) = (&mut self.previous, &mut self.current);
        record.solution.reshape(n, b.cols());
        let mut converged_all = true;
        let mut max_iterations = 0;

        for c in 0..b.cols() {
            previous.clear();
            previous.resize(n, T::zero());
            current.clear();
            current.resize(n, T::zero());

            let mut converged = false;
            let mut iterations = 0;
            while iterations < config.max_iterations {
                let Some((delta, magnitude)) =
                    sweep(method, &a, &self.inv_diag, &b, c, previous, current)
                else {
                    log::warn!("{method}: non-finite iterate at sweep {}", iterations + 1);
                    break;
                };
                iterations += 1;
                std::mem::swap(previous, current);
                log::trace!("{method} sweep {iterations}: max change {:e}", delta.into_f64());
                if delta <= config.tolerance * magnitude.max(T::one()) {
                    converged = true;
                    break;
                }
            }

            if !converged {
                log::warn!("{method} did not converge after {iterations} iterations on column {c}");
            }
            converged_all &= converged;
            max_iterations = max_iterations.max(iterations);
            for (i, &x) in previous.iter().enumerate() {
                record.solution[(i, c)] = x;
            }
        }

        record.status = if converged_all {
            LinearSolverStatus::Succeeded
        } else {
            LinearSolverStatus::Failed
        };
        record.iterations = Some(max_iterations);
        Ok(())
    }
}

fn solve_with<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    method: IterativeMethod<T>,
    config: IterativeConfig<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    IterativeSolver::from_matrix(a.as_matrix_view(), method)?
        .with_config(config)
        .solve(b)
}

/// Solves `A * X = B` with Jacobi sweeps.
///
/// # Errors
///
/// See [`IterativeSolver::from_matrix`] and [`LinearSolver::solve_into`].
pub fn jacobi<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    config: IterativeConfig<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    solve_with(a, b, IterativeMethod::Jacobi, config)
}

/// Solves `A * X = B` with Gauss-Seidel sweeps.
///
/// # Errors
///
/// See [`IterativeSolver::from_matrix`] and [`LinearSolver::solve_into`].
pub fn gauss_seidel<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    config: IterativeConfig<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    solve_with(a, b, IterativeMethod::GaussSeidel, config)
}

/// Solves `A * X = B` by successive over-relaxation with factor `omega`.
///
/// # Errors
///
/// See [`IterativeSolver::from_matrix`] and [`LinearSolver::solve_into`].
pub fn sor<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    omega: T,
    config: IterativeConfig<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    solve_with(a, b, IterativeMethod::Sor { omega }, config)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn dominant_system() -> (Matrix<f64>, Matrix<f64>, [f64; 4]) {
        let a = Matrix::from_rows(&[
            [10.0, -1.0, 2.0, 0.0],
            [-1.0, 11.0, -1.0, 3.0],
            [2.0, -1.0, 10.0, -1.0],
            [0.0, 3.0, -1.0, 8.0],
        ]);
        let b = Matrix::from_rows(&[[6.0], [25.0], [-11.0], [15.0]]);
        (a, b, [1.0, 2.0, -1.0, 1.0])
    }

    #[test]
    fn test_methods_converge_on_dominant_system() -> Result<(), SolverError> {
        let (a, b, expected) = dominant_system();
        let config = IterativeConfig::default();
        let records = [
            jacobi(&a, &b, config)?,
            gauss_seidel(&a, &b, config)?,
            sor(&a, &b, 1.1, config)?,
        ];
        for record in &records {
            assert_eq!(record.status, LinearSolverStatus::Succeeded);
            for (i, &x) in expected.iter().enumerate() {
                assert_relative_eq!(record.solution[(i, 0)], x, epsilon = 1e-8);
            }
        }

        let jacobi_iterations = records[0].iterations.unwrap_or(0);
        let gauss_seidel_iterations = records[1].iterations.unwrap_or(0);
        assert!(gauss_seidel_iterations < jacobi_iterations);
        Ok(())
    }

    #[test]
    fn test_non_dominant_system_fails() -> Result<(), SolverError> {
        let a: Matrix<f64> = Matrix::from_rows(&[[1.0, 2.0], [3.0, 1.0]]);
        let b = Matrix::from_rows(&[[3.0], [4.0]]);
        let record = jacobi(&a, &b, IterativeConfig::default())?;
        assert_eq!(record.status, LinearSolverStatus::Failed);
        assert!(!record.is_usable());
        assert!(record.iterations.unwrap_or(usize::MAX) <= 1000);
        assert!(record.solution.to_vec().iter().all(|x| x.is_finite()));
        Ok(())
    }

    #[test]
    fn test_iteration_budget() -> Result<(), SolverError> {
        let (a, b, _) = dominant_system();
        let config = IterativeConfig {
            max_iterations: 3,
            tolerance: 1e-12,
        };
        let record = jacobi(&a, &b, config)?;
        assert_eq!(record.status, LinearSolverStatus::Failed);
        assert_eq!(record.iterations, Some(3));
        Ok(())
    }

    #[test]
    fn test_matrix_checks() {
        let zero_diag = Matrix::from_rows(&[[0.0, 1.0], [1.0, 0.0]]);
        assert!(matches!(
            IterativeSolver::new(&zero_diag, IterativeMethod::Jacobi),
            Err(SolverError::ZeroDiagonal { row: 0 })
        ));

        let rect = Matrix::<f64>::new(2, 3);
        assert!(matches!(
            IterativeSolver::new(&rect, IterativeMethod::GaussSeidel),
            Err(SolverError::InvalidShape { solver: "Gauss-Seidel", .. })
        ));

        let a = Matrix::from_rows(&[[2.0, 1.0], [1.0, 2.0]]);
        assert!(matches!(
            IterativeSolver::new(&a, IterativeMethod::Sor { omega: 2.0 }),
            Err(SolverError::InvalidParameter { parameter: "omega", .. })
        ));
    }

    #[test]
    fn test_capacity_solver_rejects_bad_omega() {
        let a = Matrix::from_rows(&[[4.0, 1.0], [1.0, 3.0]]);
        let b = Matrix::from_rows(&[[1.0], [2.0]]);
        let mut solver = IterativeSolver::with_capacity(4, 4, IterativeMethod::Sor { omega: 5.0 });
        assert!(matches!(
            solver.load(&a),
            Err(SolverError::InvalidParameter { parameter: "omega", .. })
        ));
        assert_eq!(solver.status(), LinearSolverStatus::Unknown);
        assert_eq!(solver.solve(&b).err(), Some(SolverError::NotFactorized));
    }

    #[test]
    fn test_small_diagonal_is_ill_conditioned() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[1e-9, 1.0], [0.0, 1.0]]);
        let solver = IterativeSolver::new(&a, IterativeMethod::GaussSeidel)?;
        assert_eq!(solver.status(), LinearSolverStatus::IllConditionedMatrix);
        Ok(())
    }

    #[test]
    fn test_reuse_and_multiple_rhs() -> Result<(), SolverError> {
        let (a, _, _) = dominant_system();
        let mut solver = IterativeSolver::with_capacity(8, 8, IterativeMethod::Jacobi);
        let b = Matrix::from_rows(&[[6.0, 10.0], [25.0, -1.0], [-11.0, 2.0], [15.0, 0.0]]);
        assert_eq!(solver.solve(&b).err(), Some(SolverError::NotFactorized));

        solver.load(&a)?;
        solver.set_method(IterativeMethod::Sor { omega: 1.2 })?;
        assert!(solver.set_method(IterativeMethod::Sor { omega: 0.0 }).is_err());
        assert_eq!(solver.method(), IterativeMethod::Sor { omega: 1.2 });

        let record = solver.solve(&b)?;
        assert_eq!(record.status, LinearSolverStatus::Succeeded);
        let x_lu = crate::lu::solve(&a, &b)?.solution;
        for i in 0..4 {
            for c in 0..2 {
                assert_relative_eq!(record.solution[(i, c)], x_lu[(i, c)], epsilon = 1e-8);
            }
        }
        Ok(())
    }

    #[test]
    fn test_single_precision() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[4.0f32, 1.0], [1.0, 3.0]]);
        let b = Matrix::from_rows(&[[1.0f32], [2.0]]);
        let record = gauss_seidel(&a, &b, IterativeConfig::default())?;
        assert_eq!(record.status, LinearSolverStatus::Succeeded);
        assert_relative_eq!(record.solution[(0, 0)], 1.0 / 11.0, epsilon = 1e-5);
        assert_relative_eq!(record.solution[(1, 0)], 7.0 / 11.0, epsilon = 1e-5);
        Ok(())
    }
}
