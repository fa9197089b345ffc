use std::fmt;

use kornia_matrix::{ColumnVector, Matrix, Scalar};

use crate::error::SolverError;

/// Outcome of a factorization or of a solve.
///
/// The direct solvers (LU, QR, SVD) report the condition of the system matrix
/// found while factorizing it. The iterative solvers report whether the sweeps
/// converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearSolverStatus {
    /// No matrix has been factorized yet.
    #[default]
    Unknown,
    /// The matrix is regular and the solution is accurate.
    RegularMatrix,
    /// The matrix is singular. The solution, if any, must not be trusted.
    SingularMatrix,
    /// The matrix is regular but close to singular. The solution is usable but
    /// may be imprecise; consider the SVD solver instead.
    IllConditionedMatrix,
    /// An iterative solve converged.
    Succeeded,
    /// An iterative solve did not converge within its iteration budget.
    Failed,
}

impl LinearSolverStatus {
    fn severity(self) -> u8 {
        match self {
            LinearSolverStatus::Unknown => 0,
            LinearSolverStatus::RegularMatrix | LinearSolverStatus::Succeeded => 1,
            LinearSolverStatus::IllConditionedMatrix => 2,
            LinearSolverStatus::Failed => 3,
            LinearSolverStatus::SingularMatrix => 4,
        }
    }

    /// Combines two verdicts, keeping the most severe one.
    ///
    /// A singular verdict is latched: no later verdict can clear it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kornia_linsolve::LinearSolverStatus as S;
    ///
    /// assert_eq!(S::RegularMatrix.worst(S::IllConditionedMatrix), S::IllConditionedMatrix);
    /// assert_eq!(S::SingularMatrix.worst(S::RegularMatrix), S::SingularMatrix);
    /// ```
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Returns true if a solution computed with this status can be used.
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            LinearSolverStatus::RegularMatrix
                | LinearSolverStatus::IllConditionedMatrix
                | LinearSolverStatus::Succeeded
        )
    }
}

impl fmt::Display for LinearSolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinearSolverStatus::Unknown => "unknown",
            LinearSolverStatus::RegularMatrix => "regular matrix",
            LinearSolverStatus::SingularMatrix => "singular matrix",
            LinearSolverStatus::IllConditionedMatrix => "ill-conditioned matrix",
            LinearSolverStatus::Succeeded => "succeeded",
            LinearSolverStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Solution of a system `A * X = B` together with its status.
///
/// A record can be reused across solves: its solution matrix keeps its
/// backing buffer, so a record created with
/// [`LinearSolverRecord::with_capacity`] never reallocates for systems that fit.
#[derive(Debug, Clone)]
pub struct LinearSolverRecord<T: Scalar = f64> {
    /// The solution `X`, one column per column of `B`.
    pub solution: Matrix<T>,
    /// Status of the solve. Check it before trusting `solution`.
    pub status: LinearSolverStatus,
    /// Number of sweeps performed, for the iterative solvers.
    pub iterations: Option<usize>,
}

impl<T: Scalar> LinearSolverRecord<T> {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Creates an empty record whose solution can hold up to `rows x cols`
    /// elements without reallocating.
    pub fn with_capacity(rows: usize, cols: usize) -> Self {
        Self {
            solution: Matrix::with_capacity(rows, cols),
            status: LinearSolverStatus::Unknown,
            iterations: None,
        }
    }

    /// Returns true if the status allows using the solution.
    pub fn is_usable(&self) -> bool {
        self.status.is_usable()
    }

    /// Copies column `j` of the solution.
    ///
    /// # Errors
    ///
    /// Returns an error if `j` is not a column of the solution.
    pub fn solution_column(&self, j: usize) -> Result<ColumnVector<T>, SolverError> {
        Ok(self.solution.column(j)?)
    }
}

impl<T: Scalar> Default for LinearSolverRecord<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_severity() {
        use LinearSolverStatus as S;
        assert_eq!(S::Unknown.worst(S::RegularMatrix), S::RegularMatrix);
        assert_eq!(S::IllConditionedMatrix.worst(S::RegularMatrix), S::IllConditionedMatrix);
        assert_eq!(S::IllConditionedMatrix.worst(S::SingularMatrix), S::SingularMatrix);
        assert!(S::IllConditionedMatrix.is_usable());
        assert!(!S::SingularMatrix.is_usable());
        assert!(!S::Failed.is_usable());
        assert!(!S::Unknown.is_usable());
        assert_eq!(S::IllConditionedMatrix.to_string(), "ill-conditioned matrix");
    }

    #[test]
    fn test_record_capacity() -> Result<(), SolverError> {
        let mut record = LinearSolverRecord::<f64>::with_capacity(6, 5);
        assert_eq!(record.solution.shape(), [0, 0]);
        assert!(!record.is_usable());

        record.solution.reshape(6, 5);
        assert_eq!(record.solution.storage_rows(), 6);
        record.solution[(2, 1)] = 3.0;
        assert_eq!(record.solution_column(1)?.as_slice(), &[0.0, 0.0, 3.0, 0.0, 0.0, 0.0]);
        assert!(record.solution_column(5).is_err());
        Ok(())
    }
}
