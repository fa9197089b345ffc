//! QR factorization with Householder reflections.
//!
//! Solves square and overdetermined systems, the latter in the least squares
//! sense. Each column `j` is reduced by a reflection `H_j = I - 2 v_j v_j^T`
//! with a unit vector `v_j`; the reflected matrix is `R`, stored in place of
//! `A`, and the vectors `v_j` are kept aside so `Q^T = H_{n-1} ... H_0` can be
//! applied to any right-hand side.

use kornia_matrix::{AsMatrixView, AsMatrixViewMut, Matrix, MatrixView, Scalar};

use crate::{
    error::SolverError,
    record::{LinearSolverRecord, LinearSolverStatus},
    solver::{check_rhs, ensure_solvable, refine, LinearSolver, ILL_COND_THRESHOLD},
};

/// QR solver for square and overdetermined (`rows >= cols`) systems.
///
/// Ownership follows [`LuSolver`](crate::LuSolver): [`QrSolver::new`] copies the
/// matrix, [`QrSolver::in_place`] overwrites it with `R`.
///
/// # Examples
///
/// Least squares line fit through three points:
///
/// ```rust
/// use kornia_linsolve::{LinearSolver, QrSolver};
/// use kornia_matrix::Matrix;
///
/// let a: Matrix<f64> = Matrix::from_rows(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0]]);
/// let b = Matrix::from_rows(&[[1.0], [3.0], [5.0]]);
///
/// let x = QrSolver::new(&a).unwrap().solve(&b).unwrap().solution;
/// assert!((x[(0, 0)] - 1.0).abs() < 1e-12);
/// assert!((x[(1, 0)] - 2.0).abs() < 1e-12);
/// ```
pub struct QrSolver<T: Scalar = f64, M = Matrix<T>> {
    r: M,
    /// Row `j` holds `v_j` in columns `j..rows`, zeros before.
    householder: Matrix<T>,
    status: LinearSolverStatus,
    work: Matrix<T>,
    scratch: Vec<T>,
}

impl<T: Scalar> QrSolver<T, Matrix<T>> {
    /// Copies `a` and factorizes the copy.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` has more columns than rows
    /// or is empty.
    pub fn new(a: &impl AsMatrixView<T>) -> Result<Self, SolverError> {
        Self::in_place(a.as_matrix_view().to_matrix())
    }

    /// Creates a solver with no matrix, whose buffers can hold systems of up to
    /// `max_rows x max_cols` without reallocating.
    pub fn with_capacity(max_rows: usize, max_cols: usize) -> Self {
        Self {
            r: Matrix::with_capacity(max_rows, max_cols),
            householder: Matrix::with_capacity(max_cols, max_rows),
            status: LinearSolverStatus::Unknown,
            work: Matrix::with_capacity(max_rows, max_cols),
            scratch: Vec::with_capacity(max_cols),
        }
    }

    /// Copies `a` into the solver buffer and factorizes it.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` has more columns than rows
    /// or is empty.
    pub fn load(&mut self, a: &impl AsMatrixView<T>) -> Result<(), SolverError> {
        self.r.copy_from(a);
        self.factorize()
    }
}

impl<T: Scalar, M: AsMatrixViewMut<T>> QrSolver<T, M> {
    /// Factorizes `a` in place, overwriting it with `R`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` has more columns than rows
    /// or is empty.
    pub fn in_place(a: M) -> Result<Self, SolverError> {
        let mut solver = Self {
            r: a,
            householder: Matrix::new(0, 0),
            status: LinearSolverStatus::Unknown,
            work: Matrix::new(0, 0),
            scratch: Vec::new(),
        };
        solver.factorize()?;
        Ok(solver)
    }

    /// Replaces the system matrix and factorizes it in place.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidShape`] if `a` has more columns than rows
    /// or is empty.
    pub fn set_matrix(&mut self, a: M) -> Result<(), SolverError> {
        self.r = a;
        self.factorize()
    }

    /// Releases the factorized matrix, which holds `R` in its top rows.
    pub fn into_inner(self) -> M {
        self.r
    }

    /// The upper triangular `n x n` factor `R`.
    pub fn r(&self) -> Matrix<T> {
        let r = self.r.as_matrix_view();
        let n = r.cols();
        Matrix::from_fn(n, n, |i, j| {
            if i <= j {
                r.row(i)[j]
            } else {
                T::zero()
            }
        })
    }

    /// The `m x n` factor `Q` with orthonormal columns, such that `A = Q * R`.
    pub fn q(&self) -> Matrix<T> {
        let [m, n] = self.r.as_matrix_view().shape();
        let mut q = Matrix::from_fn(m, n, |i, j| if i == j { T::one() } else { T::zero() });
        // Q = H_0 ... H_{n-1} applied to the first n columns of the identity
        for j in (0..n).rev() {
            self.reflect(j, &mut q);
        }
        q
    }

    /// Computes `Q^T * B`, an `m x k` matrix whose top `n` rows are the
    /// coordinates of `B` in the column space of `A`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::NotFactorized`] if no matrix was loaded and
    /// [`SolverError::DimensionMismatch`] if `B` has the wrong number of rows.
    pub fn apply_qt(&self, b: &impl AsMatrixView<T>) -> Result<Matrix<T>, SolverError> {
        if self.status == LinearSolverStatus::Unknown {
            return Err(SolverError::NotFactorized);
        }
        let b = b.as_matrix_view();
        check_rhs(self.r.as_matrix_view().rows(), &b)?;
        let mut out = b.to_matrix();
        for j in 0..self.householder.rows() {
            self.reflect(j, &mut out);
        }
        Ok(out)
    }

    /// Solves `A * X = B` and improves the solution with `passes` rounds of
    /// iterative refinement, using `a` (the unfactorized matrix) for the
    /// residuals.
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

    /// Applies `H_j` to every column of `target`.
    fn reflect(&self, j: usize, target: &mut Matrix<T>) {
        let v = &self.householder.row(j)[j..];
        let two = T::from_f64(2.0);
        for c in 0..target.cols() {
            let s = v
                .iter()
                .enumerate()
                .fold(T::zero(), |acc, (k, &v_k)| acc + v_k * target[(j + k, c)]);
            if s == T::zero() {
                continue;
            }
            for (k, &v_k) in v.iter().enumerate() {
                target[(j + k, c)] -= two * s * v_k;
            }
        }
    }

    fn factorize(&mut self) -> Result<(), SolverError> {
        self.status = LinearSolverStatus::Unknown;
        let mut r = self.r.as_matrix_view_mut();
        let [m, n] = r.shape();
        if m < n {
            return Err(SolverError::invalid_shape(
                "QR",
                r.shape(),
                "underdetermined systems are not supported",
            ));
        }
        if n == 0 {
            return Err(SolverError::invalid_shape("QR", r.shape(), "matrix is empty"));
        }

        self.householder.reshape(n, m);
        let stride = r.stride();
        let a = r.as_mut_slice();
        let at = |i: usize, j: usize| i * stride + j;
        let threshold = T::from_f64(ILL_COND_THRESHOLD);
        let two = T::from_f64(2.0);
        let mut status = LinearSolverStatus::RegularMatrix;

        for j in 0..n {
            let norm = (j..m)
                .fold(T::zero(), |acc, i| acc + a[at(i, j)] * a[at(i, j)])
                .sqrt();
            if norm == T::zero() {
                // nothing to reduce, H_j stays the zero vector (identity)
                status = LinearSolverStatus::SingularMatrix;
                continue;
            }
            if norm < threshold {
                status = status.worst(LinearSolverStatus::IllConditionedMatrix);
            }

            // reflect onto -sign(x0) * e1 to avoid cancellation in v0
            let x0 = a[at(j, j)];
            let alpha = if x0 >= T::zero() { -norm } else { norm };
            let v = self.householder.row_mut(j);
            v[j] = x0 - alpha;
            for i in (j + 1)..m {
                v[i] = a[at(i, j)];
            }
            let v_norm = v[j..].iter().fold(T::zero(), |acc, &x| acc + x * x).sqrt();
            v[j..].iter_mut().for_each(|x| *x /= v_norm);

            a[at(j, j)] = alpha;
            for i in (j + 1)..m {
                a[at(i, j)] = T::zero();
            }
            for k in (j + 1)..n {
                let s = (j..m).fold(T::zero(), |acc, i| acc + v[i] * a[at(i, k)]);
                for i in j..m {
                    a[at(i, k)] -= two * s * v[i];
                }
            }
        }

        self.status = status;
        log::debug!("QR factorization of a {m}x{n} matrix: {status}");
        if status != LinearSolverStatus::RegularMatrix {
            log::warn!("QR factorization found a {status}");
        }
        Ok(())
    }
}

impl<T: Scalar, M: AsMatrixViewMut<T>> LinearSolver<T> for QrSolver<T, M> {
    fn nrows(&self) -> usize {
        self.r.as_matrix_view().rows()
    }

    fn ncols(&self) -> usize {
        self.r.as_matrix_view().cols()
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
        let [m, n] = self.r.as_matrix_view().shape();
        check_rhs(m, &b)?;

        let mut work = std::mem::take(&mut self.work);
        work.copy_from(&b);
        for j in 0..n {
            self.reflect(j, &mut work);
        }

        let r: MatrixView<'_, T> = self.r.as_matrix_view();
        let x = &mut self.scratch;
        record.solution.reshape(n, b.cols());
        for c in 0..b.cols() {
            x.clear();
            x.resize(n, T::zero());
            for i in (0..n).rev() {
                let r_row = r.row(i);
                let mut sum = work[(i, c)];
                for k in (i + 1)..n {
                    sum -= r_row[k] * x[k];
                }
                x[i] = sum / r_row[i];
            }
            for (i, &x_i) in x.iter().enumerate() {
                record.solution[(i, c)] = x_i;
            }
        }
        self.work = work;

        record.status = self.status;
        record.iterations = None;
        Ok(())
    }
}

/// Solves `A * X = B` by QR factorization of a copy of `a`.
///
/// # Errors
///
/// See [`QrSolver::new`] and [`LinearSolver::solve_into`].
pub fn solve<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    QrSolver::new(a)?.solve(b)
}

/// Solves `A * X = B`, overwriting `a` with `R`.
///
/// # Errors
///
/// See [`QrSolver::in_place`] and [`LinearSolver::solve_into`].
pub fn solve_in_place<T: Scalar>(
    a: impl AsMatrixViewMut<T>,
    b: &impl AsMatrixView<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    QrSolver::in_place(a)?.solve(b)
}

/// Solves `A * X = B` with `passes` rounds of iterative refinement.
///
/// # Errors
///
/// See [`QrSolver::new`] and [`LinearSolver::solve_into`].
pub fn solve_refined<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
    passes: usize,
) -> Result<LinearSolverRecord<T>, SolverError> {
    QrSolver::new(a)?.solve_refined(a, b, passes)
}
