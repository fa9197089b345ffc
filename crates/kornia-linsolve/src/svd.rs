//! Singular value decomposition.
//!
//! `A = U * S * V^T` is computed by Householder bidiagonalization followed by
//! implicitly shifted QR sweeps on the bidiagonal (Golub-Kahan). `U` overwrites
//! `A`. Solving with the pseudo-inverse `V * S^+ * U^T` treats singular values
//! below a threshold as zero, so rank deficient systems yield the minimum
//! norm least squares solution instead of an error.

use kornia_matrix::{AsMatrixView, AsMatrixViewMut, Matrix, MatrixView, Scalar};

use crate::{
    error::SolverError,
    record::{LinearSolverRecord, LinearSolverStatus},
    solver::{check_rhs, LinearSolver, ILL_COND_THRESHOLD},
};

/// Maximum number of QR sweeps spent on a single singular value.
pub const SVD_MAX_ITERATIONS: usize = 75;

/// `|a|` with the sign of `b`.
#[inline]
fn sign<T: Scalar>(a: T, b: T) -> T {
    if b >= T::zero() {
        a.abs()
    } else {
        -a.abs()
    }
}

/// SVD solver for square and overdetermined systems with at least two columns.
///
/// Ownership follows [`LuSolver`](crate::LuSolver): [`SvdSolver::new`] copies the
/// matrix, [`SvdSolver::in_place`] overwrites it with `U`.
///
/// # Examples
///
/// ```rust
/// use kornia_linsolve::{LinearSolver, LinearSolverStatus, SvdSolver};
/// use kornia_matrix::Matrix;
///
/// // rank 1: the second unknown does not appear in the system
/// let a: Matrix<f64> = Matrix::from_rows(&[[2.0, 0.0], [0.0, 0.0]]);
/// let mut svd = SvdSolver::new(&a).unwrap();
/// assert_eq!(svd.status(), LinearSolverStatus::SingularMatrix);
/// assert_eq!(svd.rank(), 1);
///
/// // the least squares solution of minimum norm
/// let x = svd.solve(&Matrix::from_rows(&[[2.0], [5.0]])).unwrap().solution;
/// assert!((x[(0, 0)] - 1.0).abs() < 1e-12);
/// assert_eq!(x[(1, 0)], 0.0);
/// ```
pub struct SvdSolver<T: Scalar = f64, M = Matrix<T>> {
    u: M,
    w: Vec<T>,
    v: Matrix<T>,
    threshold: Option<T>,
    status: LinearSolverStatus,
    rv1: Vec<T>,
    scratch: Vec<T>,
}

impl<T: Scalar> SvdSolver<T, Matrix<T>> {
    /// Copies `a` and decomposes the copy.
    ///
    /// # Errors
    ///
    /// - [`SolverError::InvalidShape`] if `a` has more columns than rows or fewer
    ///   than two columns.
    /// - [`SolverError::NotConverged`] if the QR sweeps do not converge.
    pub fn new(a: &impl AsMatrixView<T>) -> Result<Self, SolverError> {
        Self::in_place(a.as_matrix_view().to_matrix())
    }

    /// Creates a solver with no matrix, whose buffers can hold systems of up to
    /// `max_rows x max_cols` without reallocating.
    pub fn with_capacity(max_rows: usize, max_cols: usize) -> Self {
        Self {
            u: Matrix::with_capacity(max_rows, max_cols),
            w: Vec::with_capacity(max_cols),
            v: Matrix::with_capacity(max_cols, max_cols),
            threshold: None,
            status: LinearSolverStatus::Unknown,
            rv1: Vec::with_capacity(max_cols),
            scratch: Vec::with_capacity(max_cols),
        }
    }

    /// Copies `a` into the solver buffer and decomposes it.
    ///
    /// # Errors
    ///
    /// See [`SvdSolver::new`].
    pub fn load(&mut self, a: &impl AsMatrixView<T>) -> Result<(), SolverError> {
        self.u.copy_from(a);
        self.decompose()
    }
}

impl<T: Scalar, M: AsMatrixViewMut<T>> SvdSolver<T, M> {
    /// Decomposes `a` in place, overwriting it with `U`.
    ///
    /// # Errors
    ///
    /// See [`SvdSolver::new`].
    pub fn in_place(a: M) -> Result<Self, SolverError> {
        let mut solver = Self {
            u: a,
            w: Vec::new(),
            v: Matrix::new(0, 0),
            threshold: None,
            status: LinearSolverStatus::Unknown,
            rv1: Vec::new(),
            scratch: Vec::new(),
        };
        solver.decompose()?;
        Ok(solver)
    }

    /// Replaces the system matrix and decomposes it in place.
    ///
    /// # Errors
    ///
    /// See [`SvdSolver::new`].
    pub fn set_matrix(&mut self, a: M) -> Result<(), SolverError> {
        self.u = a;
        self.decompose()
    }

    /// Overrides the threshold below which singular values are treated as zero,
    /// or restores the default with `None`. Updates the status accordingly.
    pub fn set_threshold(&mut self, threshold: Option<T>) {
        self.threshold = threshold;
        if self.status != LinearSolverStatus::Unknown {
            self.status = self.classify();
        }
    }

    /// Builder form of [`SvdSolver::set_threshold`].
    pub fn with_threshold(mut self, threshold: T) -> Self {
        self.set_threshold(Some(threshold));
        self
    }

    /// Releases the decomposed matrix, which holds `U`.
    pub fn into_inner(self) -> M {
        self.u
    }

    /// The singular values, in descending order.
    pub fn singular_values(&self) -> &[T] {
        &self.w
    }

    /// The `m x n` factor `U` with orthonormal columns.
    pub fn u(&self) -> MatrixView<'_, T> {
        self.u.as_matrix_view()
    }

    /// The `n x n` orthogonal factor `V`.
    pub fn v(&self) -> &Matrix<T> {
        &self.v
    }

    /// Singular values at or below this magnitude are treated as zero.
    ///
    /// Defaults to `0.5 * sqrt(m + n + 1) * s_max * eps`.
    pub fn threshold(&self) -> T {
        if let Some(t) = self.threshold {
            return t;
        }
        let [m, n] = self.u.as_matrix_view().shape();
        let s_max = self.w.first().copied().unwrap_or_else(T::zero);
        T::from_f64(0.5 * ((m + n + 1) as f64).sqrt()) * s_max * T::epsilon()
    }

    /// Number of singular values above the threshold.
    pub fn rank(&self) -> usize {
        let t = self.threshold();
        self.w.iter().filter(|&&s| s > t).count()
    }

    /// Ratio of the largest to the smallest singular value, infinite for a
    /// singular matrix.
    pub fn condition_number(&self) -> T {
        match (self.w.first(), self.w.last()) {
            (Some(&s_max), Some(&s_min)) if s_min > T::zero() => s_max / s_min,
            _ => T::infinity(),
        }
    }

    fn classify(&self) -> LinearSolverStatus {
        let t = self.threshold();
        let (s_max, s_min) = match (self.w.first(), self.w.last()) {
            (Some(&s_max), Some(&s_min)) => (s_max, s_min),
            _ => return LinearSolverStatus::Unknown,
        };
        if s_min <= t {
            LinearSolverStatus::SingularMatrix
        } else if s_min / s_max < T::from_f64(ILL_COND_THRESHOLD) {
            LinearSolverStatus::IllConditionedMatrix
        } else {
            LinearSolverStatus::RegularMatrix
        }
    }

    fn decompose(&mut self) -> Result<(), SolverError> {
        self.status = LinearSolverStatus::Unknown;
        self.w.clear();
        let [m, n] = self.u.as_matrix_view().shape();
        if m < n {
            return Err(SolverError::invalid_shape(
                "SVD",
                [m, n],
                "underdetermined systems are not supported",
            ));
        }
        if n < 2 {
            return Err(SolverError::invalid_shape(
                "SVD",
                [m, n],
                "matrix must have at least two columns",
            ));
        }

        self.w.resize(n, T::zero());
        self.rv1.clear();
        self.rv1.resize(n, T::zero());
        self.v.reshape(n, n);

        let mut u_view = self.u.as_matrix_view_mut();
        let su = u_view.stride();
        let u = u_view.as_mut_slice();
        let sv = self.v.stride();
        let v = self.v.as_raw_slice_mut();
        let (w, rv1) = (&mut self.w, &mut self.rv1);
        let uu = |i: usize, j: usize| i * su + j;
        let vv = |i: usize, j: usize| i * sv + j;
        let eps = T::epsilon();

        // Householder reduction to bidiagonal form
        let (mut g, mut scale, mut anorm) = (T::zero(), T::zero(), T::zero());
        let mut l = 0;
        for i in 0..n {
            l = i + 1;
            rv1[i] = scale * g;
            g = T::zero();
            scale = T::zero();
            let mut s = T::zero();
            for k in i..m {
                scale += u[uu(k, i)].abs();
            }
            if scale != T::zero() {
                for k in i..m {
                    u[uu(k, i)] /= scale;
                    s += u[uu(k, i)] * u[uu(k, i)];
                }
                let f = u[uu(i, i)];
                g = -sign(s.sqrt(), f);
                let h = f * g - s;
                u[uu(i, i)] = f - g;
                for j in l..n {
                    let s = (i..m).fold(T::zero(), |acc, k| acc + u[uu(k, i)] * u[uu(k, j)]);
                    let f = s / h;
                    for k in i..m {
                        let t = u[uu(k, i)];
                        u[uu(k, j)] += f * t;
                    }
                }
                for k in i..m {
                    u[uu(k, i)] *= scale;
                }
            }
            w[i] = scale * g;

            g = T::zero();
            scale = T::zero();
            let mut s = T::zero();
            if i + 1 != n {
                for k in l..n {
                    scale += u[uu(i, k)].abs();
                }
                if scale != T::zero() {
                    for k in l..n {
                        u[uu(i, k)] /= scale;
                        s += u[uu(i, k)] * u[uu(i, k)];
                    }
                    let f = u[uu(i, l)];
                    g = -sign(s.sqrt(), f);
                    let h = f * g - s;
                    u[uu(i, l)] = f - g;
                    for k in l..n {
                        rv1[k] = u[uu(i, k)] / h;
                    }
                    for j in l..m {
                        let s = (l..n).fold(T::zero(), |acc, k| acc + u[uu(j, k)] * u[uu(i, k)]);
                        for k in l..n {
                            u[uu(j, k)] += s * rv1[k];
                        }
                    }
                    for k in l..n {
                        u[uu(i, k)] *= scale;
                    }
                }
            }
            anorm = anorm.max(w[i].abs() + rv1[i].abs());
        }

        // accumulation of the right-hand transformations
        for i in (0..n).rev() {
            if i < n - 1 {
                if g != T::zero() {
                    for j in l..n {
                        // double division avoids a possible underflow
                        v[vv(j, i)] = (u[uu(i, j)] / u[uu(i, l)]) / g;
                    }
                    for j in l..n {
                        let s = (l..n).fold(T::zero(), |acc, k| acc + u[uu(i, k)] * v[vv(k, j)]);
                        for k in l..n {
                            let t = v[vv(k, i)];
                            v[vv(k, j)] += s * t;
                        }
                    }
                }
                for j in l..n {
                    v[vv(i, j)] = T::zero();
                    v[vv(j, i)] = T::zero();
                }
            }
            v[vv(i, i)] = T::one();
            g = rv1[i];
            l = i;
        }

        // accumulation of the left-hand transformations
        for i in (0..n.min(m)).rev() {
            let l = i + 1;
            let mut g = w[i];
            for j in l..n {
                u[uu(i, j)] = T::zero();
            }
            if g != T::zero() {
                g = T::one() / g;
                for j in l..n {
                    let s = (l..m).fold(T::zero(), |acc, k| acc + u[uu(k, i)] * u[uu(k, j)]);
                    let f = (s / u[uu(i, i)]) * g;
                    for k in i..m {
                        let t = u[uu(k, i)];
                        u[uu(k, j)] += f * t;
                    }
                }
                for j in i..m {
                    u[uu(j, i)] *= g;
                }
            } else {
                for j in i..m {
                    u[uu(j, i)] = T::zero();
                }
            }
            u[uu(i, i)] += T::one();
        }

        // diagonalization of the bidiagonal form
        for k in (0..n).rev() {
            let mut its = 0;
            loop {
                // test for splitting, rv1[0] is always zero
                let mut l = k;
                let mut cancel = true;
                loop {
                    if l == 0 || rv1[l].abs() <= eps * anorm {
                        cancel = false;
                        break;
                    }
                    if w[l - 1].abs() <= eps * anorm {
                        break;
                    }
                    l -= 1;
                }
                if cancel {
                    // cancellation of rv1[l], l > 0
                    let nm = l - 1;
                    let (mut c, mut s) = (T::zero(), T::one());
                    for i in l..=k {
                        let f = s * rv1[i];
                        rv1[i] = c * rv1[i];
                        if f.abs() <= eps * anorm {
                            break;
                        }
                        let g = w[i];
                        let h = f.hypot(g);
                        w[i] = h;
                        let h = T::one() / h;
                        c = g * h;
                        s = -f * h;
                        for j in 0..m {
                            let (y, z) = (u[uu(j, nm)], u[uu(j, i)]);
                            u[uu(j, nm)] = y * c + z * s;
                            u[uu(j, i)] = z * c - y * s;
                        }
                    }
                }

                let z = w[k];
                if l == k {
                    // convergence, make the singular value non-negative
                    if z < T::zero() {
                        w[k] = -z;
                        for j in 0..n {
                            v[vv(j, k)] = -v[vv(j, k)];
                        }
                    }
                    break;
                }
                if its == SVD_MAX_ITERATIONS {
                    log::warn!("SVD did not converge after {its} iterations");
                    return Err(SolverError::NotConverged { iterations: its });
                }
                its += 1;

                // shift from the bottom 2x2 minor
                let nm = k - 1;
                let mut x = w[l];
                let y = w[nm];
                let g = rv1[nm];
                let h = rv1[k];
                let mut f = ((y - z) * (y + z) + (g - h) * (g + h)) / (T::from_f64(2.0) * h * y);
                let g = f.hypot(T::one());
                f = ((x - z) * (x + z) + h * ((y / (f + sign(g, f))) - h)) / x;

                // next QR transformation
                let (mut c, mut s) = (T::one(), T::one());
                for j in l..=nm {
                    let i = j + 1;
                    let mut g = rv1[i];
                    let mut y = w[i];
                    let mut h = s * g;
                    g = c * g;
                    let mut z = f.hypot(h);
                    rv1[j] = z;
                    c = f / z;
                    s = h / z;
                    f = x * c + g * s;
                    g = g * c - x * s;
                    h = y * s;
                    y *= c;
                    for jj in 0..n {
                        let (xv, zv) = (v[vv(jj, j)], v[vv(jj, i)]);
                        v[vv(jj, j)] = xv * c + zv * s;
                        v[vv(jj, i)] = zv * c - xv * s;
                    }
                    z = f.hypot(h);
                    w[j] = z;
                    // rotation can be arbitrary if z is zero
                    if z != T::zero() {
                        let inv = T::one() / z;
                        c = f * inv;
                        s = h * inv;
                    }
                    f = c * g + s * y;
                    x = c * y - s * g;
                    for jj in 0..m {
                        let (yu, zu) = (u[uu(jj, j)], u[uu(jj, i)]);
                        u[uu(jj, j)] = yu * c + zu * s;
                        u[uu(jj, i)] = zu * c - yu * s;
                    }
                }
                rv1[l] = T::zero();
                rv1[k] = f;
                w[k] = x;
            }
        }

        // sort in descending order, permuting the columns of U and V alike
        for i in 0..n {
            let mut max = i;
            for j in (i + 1)..n {
                if w[j] > w[max] {
                    max = j;
                }
            }
            if max != i {
                w.swap(i, max);
                for r in 0..m {
                    u.swap(uu(r, i), uu(r, max));
                }
                for r in 0..n {
                    v.swap(vv(r, i), vv(r, max));
                }
            }
        }

        self.status = self.classify();
        log::debug!(
            "SVD of a {m}x{n} matrix: {}, condition number {:e}",
            self.status,
            self.condition_number().into_f64()
        );
        if self.status != LinearSolverStatus::RegularMatrix {
            log::warn!("SVD found a {}", self.status);
        }
        Ok(())
    }
}

impl<T: Scalar, M: AsMatrixViewMut<T>> LinearSolver<T> for SvdSolver<T, M> {
    fn nrows(&self) -> usize {
        self.u.as_matrix_view().rows()
    }

    fn ncols(&self) -> usize {
        self.u.as_matrix_view().cols()
    }

    fn status(&self) -> LinearSolverStatus {
        self.status
    }

    /// Computes the pseudo-inverse solution `V * S^+ * U^T * B`. Never fails on
    /// a singular matrix.
    fn solve_into(
        &mut self,
        b: &dyn AsMatrixView<T>,
        record: &mut LinearSolverRecord<T>,
    ) -> Result<(), SolverError> {
        if self.status == LinearSolverStatus::Unknown {
            return Err(SolverError::NotFactorized);
        }
        let b = b.as_matrix_view();
        let u = self.u.as_matrix_view();
        let [m, n] = u.shape();
        check_rhs(m, &b)?;

        let t = self.threshold();
        let tmp = &mut self.scratch;
        record.solution.reshape(n, b.cols());
        for c in 0..b.cols() {
            tmp.clear();
            for (j, &w_j) in self.w.iter().enumerate() {
                if w_j > t {
                    let s = (0..m).fold(T::zero(), |acc, i| acc + u.row(i)[j] * b.row(i)[c]);
                    tmp.push(s / w_j);
                } else {
                    tmp.push(T::zero());
                }
            }
            for jj in 0..n {
                let x = self
                    .v
                    .row(jj)
                    .iter()
                    .zip(tmp.iter())
                    .fold(T::zero(), |acc, (&v, &t)| acc + v * t);
                record.solution[(jj, c)] = x;
            }
        }

        record.status = self.status;
        record.iterations = None;
        Ok(())
    }
}

/// Solves `A * X = B` through the SVD of a copy of `a`.
///
/// # Errors
///
/// See [`SvdSolver::new`] and [`LinearSolver::solve_into`].
pub fn solve<T: Scalar>(
    a: &impl AsMatrixView<T>,
    b: &impl AsMatrixView<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    SvdSolver::new(a)?.solve(b)
}

/// Solves `A * X = B`, overwriting `a` with `U`.
///
/// # Errors
///
/// See [`SvdSolver::in_place`] and [`LinearSolver::solve_into`].
pub fn solve_in_place<T: Scalar>(
    a: impl AsMatrixViewMut<T>,
    b: &impl AsMatrixView<T>,
) -> Result<LinearSolverRecord<T>, SolverError> {
    SvdSolver::in_place(a)?.solve(b)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn reconstruct(svd: &SvdSolver<f64>) -> Result<Matrix<f64>, SolverError> {
        let u = svd.u().to_matrix();
        let s = Matrix::from_diagonal(svd.singular_values());
        Ok(u.matmul(&s)?.matmul(&svd.v().transposition())?)
    }

    #[test]
    fn test_svd_reconstruction() -> Result<(), SolverError> {
        let mut rng = StdRng::seed_from_u64(3);
        let a = Matrix::<f64>::random_with_rng(&mut rng, 6, 4, -1.0, 1.0);
        let svd = SvdSolver::new(&a)?;
        assert_eq!(svd.status(), LinearSolverStatus::RegularMatrix);

        let w = svd.singular_values();
        assert!(w.windows(2).all(|p| p[0] >= p[1]));
        assert!(svd.u().to_matrix().is_orthogonal());
        assert!(svd.v().is_orthogonal());

        let rebuilt = reconstruct(&svd)?;
        for i in 0..6 {
            for j in 0..4 {
                assert_relative_eq!(rebuilt[(i, j)], a[(i, j)], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_svd_known_values() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[3.0, 0.0], [0.0, -4.0], [0.0, 0.0]]);
        let svd = SvdSolver::new(&a)?;
        assert_relative_eq!(svd.singular_values()[0], 4.0, epsilon = 1e-12);
        assert_relative_eq!(svd.singular_values()[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(svd.condition_number(), 4.0 / 3.0, epsilon = 1e-12);
        assert_eq!(svd.rank(), 2);
        Ok(())
    }

    #[test]
    fn test_svd_solve_matches_lu() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[4.0, -2.0, 1.0], [-2.0, 4.0, -2.0], [1.0, -2.0, 4.0]]);
        let b = Matrix::from_rows(&[[11.0], [-16.0], [17.0]]);
        let x_svd = solve(&a, &b)?.solution;
        let x_lu = crate::lu::solve(&a, &b)?.solution;
        for i in 0..3 {
            assert_relative_eq!(x_svd[(i, 0)], x_lu[(i, 0)], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_svd_rank_deficient_minimum_norm() -> Result<(), SolverError> {
        // the third column duplicates the first: (1, 0, -1) spans the null space
        let a = Matrix::from_rows(&[
            [1.0, 2.0, 1.0],
            [0.0, 1.0, 0.0],
            [2.0, 0.0, 2.0],
            [1.0, 1.0, 1.0],
        ]);
        let b = Matrix::from_rows(&[[4.0], [1.0], [4.0], [3.0]]);

        // an explicit threshold, far above any rounding in the null direction
        let mut svd = SvdSolver::new(&a)?.with_threshold(1e-9);
        assert_eq!(svd.rank(), 2);
        let record = svd.solve(&b)?;
        assert_eq!(record.status, LinearSolverStatus::SingularMatrix);
        let x = record.solution;
        assert_relative_eq!(x[(0, 0)] - x[(2, 0)], 0.0, epsilon = 1e-12);

        let residual = a.matmul(&x)?.sub(&b)?;
        assert!(residual.norm_inf() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_svd_small_ratio_is_ill_conditioned() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[1.0, 0.0], [0.0, 1e-9]]);
        let svd = SvdSolver::new(&a)?;
        assert_eq!(svd.rank(), 2);
        assert_eq!(svd.status(), LinearSolverStatus::IllConditionedMatrix);
        assert_relative_eq!(svd.singular_values()[1], 1e-9, max_relative = 1e-6);
        assert_relative_eq!(svd.condition_number(), 1e9, max_relative = 1e-6);
        Ok(())
    }

    #[test]
    fn test_svd_threshold_override() -> Result<(), SolverError> {
        let a = Matrix::from_rows(&[[1.0, 0.0], [0.0, 1e-3]]);
        let mut svd = SvdSolver::new(&a)?;
        assert_eq!(svd.rank(), 2);
        assert_eq!(svd.status(), LinearSolverStatus::RegularMatrix);

        svd.set_threshold(Some(1e-2));
        assert_eq!(svd.rank(), 1);
        assert_eq!(svd.status(), LinearSolverStatus::SingularMatrix);
        let x = svd.solve(&Matrix::from_rows(&[[1.0], [1.0]]))?.solution;
        assert_eq!(x[(1, 0)], 0.0);
        Ok(())
    }

    #[test]
    fn test_svd_in_place_and_shapes() -> Result<(), SolverError> {
        let mut a = Matrix::from_rows(&[[2.0, 0.0], [0.0, 1.0]]);
        let record = solve_in_place(&mut a, &Matrix::from_rows(&[[2.0], [3.0]]))?;
        assert_relative_eq!(record.solution[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(record.solution[(1, 0)], 3.0, epsilon = 1e-12);
        assert!(a.is_orthogonal());

        assert!(matches!(
            SvdSolver::new(&Matrix::<f64>::new(3, 1)),
            Err(SolverError::InvalidShape { solver: "SVD", .. })
        ));
        assert!(matches!(
            SvdSolver::new(&Matrix::<f64>::new(2, 3)),
            Err(SolverError::InvalidShape { solver: "SVD", .. })
        ));
        Ok(())
    }
}
