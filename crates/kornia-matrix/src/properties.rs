//! Structural property tests and enforcement.
//!
//! Testing a property scans the matrix once and caches the verdict. The cache
//! entry is tagged with the matrix generation, so any later write through a
//! `&mut` accessor turns it back into [`TriState::Unknown`].

use std::cell::Cell;

use crate::{error::MatrixError, ops::Norm, Matrix, Scalar};

/// Absolute tolerance used by the property tests.
pub const MATRIX_PROP_ABS_TOL: f64 = 1e-8;

/// Relative tolerance used by the property tests.
pub const MATRIX_PROP_REL_TOL: f64 = 1e-6;

/// A cached boolean that may not have been computed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// The property holds.
    True,
    /// The property does not hold.
    False,
    /// The property has not been tested since the last modification.
    #[default]
    Unknown,
}

impl TriState {
    /// Returns the verdict, or `None` if unknown.
    pub fn known(self) -> Option<bool> {
        match self {
            TriState::True => Some(true),
            TriState::False => Some(false),
            TriState::Unknown => None,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

/// Structural properties a matrix can be tested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixProperty {
    /// `A = A^T`.
    Symmetric,
    /// `A = -A^T`.
    Antisymmetric,
    /// The columns are orthonormal, `A^T A = I`.
    Orthogonal,
    /// Every off-diagonal element is zero.
    Diagonal,
    /// `A = I`.
    Identity,
    /// Every element below the diagonal is zero.
    UpperTriangular,
    /// Every element above the diagonal is zero.
    LowerTriangular,
    /// The norm of the matrix is one.
    Normalized(Norm),
}

impl MatrixProperty {
    const COUNT: usize = 10;

    fn slot(self) -> usize {
        match self {
            MatrixProperty::Symmetric => 0,
            MatrixProperty::Antisymmetric => 1,
            MatrixProperty::Orthogonal => 2,
            MatrixProperty::Diagonal => 3,
            MatrixProperty::Identity => 4,
            MatrixProperty::UpperTriangular => 5,
            MatrixProperty::LowerTriangular => 6,
            MatrixProperty::Normalized(Norm::L1) => 7,
            MatrixProperty::Normalized(Norm::L2) => 8,
            MatrixProperty::Normalized(Norm::Inf) => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Verdict {
    generation: u64,
    state: TriState,
}

/// Per-matrix cache of property verdicts.
///
/// Uses interior mutability so that read-only queries can record their result.
#[derive(Debug, Clone, Default)]
pub(crate) struct PropertyCache {
    verdicts: [Cell<Verdict>; MatrixProperty::COUNT],
    /// Number of full scans performed, for tests.
    pub(crate) scans: Cell<usize>,
}

impl PropertyCache {
    fn lookup(&self, property: MatrixProperty, generation: u64) -> TriState {
        let verdict = self.verdicts[property.slot()].get();
        if verdict.generation == generation {
            verdict.state
        } else {
            TriState::Unknown
        }
    }

    fn store(&self, property: MatrixProperty, generation: u64, state: TriState) {
        self.verdicts[property.slot()].set(Verdict { generation, state });
    }
}

/// Running maximum deviation between actual and expected elements.
struct Deviation<T> {
    max: T,
    within_tolerance: bool,
}

impl<T: Scalar> Deviation<T> {
    fn new() -> Self {
        Self {
            max: T::zero(),
            within_tolerance: true,
        }
    }

    fn impossible() -> Self {
        Self {
            max: T::infinity(),
            within_tolerance: false,
        }
    }

    fn compare(&mut self, actual: T, expected: T) {
        let deviation = (actual - expected).abs();
        let tolerance = T::from_f64(MATRIX_PROP_ABS_TOL)
            + T::from_f64(MATRIX_PROP_REL_TOL) * actual.abs().max(expected.abs());
        if deviation > self.max || deviation.is_nan() {
            self.max = deviation;
        }
        // written negated so that NaN fails
        if !(deviation <= tolerance) {
            self.within_tolerance = false;
        }
    }
}

impl<T: Scalar> Matrix<T> {
    fn scan(&self, property: MatrixProperty) -> Deviation<T> {
        self.cache.scans.set(self.cache.scans.get() + 1);
        let (rows, cols) = (self.rows, self.cols);
        let mut dev = Deviation::new();
        match property {
            MatrixProperty::Symmetric | MatrixProperty::Antisymmetric | MatrixProperty::Identity
                if rows != cols =>
            {
                return Deviation::impossible();
            }
            MatrixProperty::Orthogonal if rows < cols => return Deviation::impossible(),
            MatrixProperty::Symmetric => {
                for i in 0..rows {
                    for j in (i + 1)..cols {
                        dev.compare(self[(i, j)], self[(j, i)]);
                    }
                }
            }
            MatrixProperty::Antisymmetric => {
                for i in 0..rows {
                    for j in i..cols {
                        dev.compare(self[(i, j)], -self[(j, i)]);
                    }
                }
            }
            MatrixProperty::Orthogonal => {
                for p in 0..cols {
                    for q in p..cols {
                        let dot = (0..rows).fold(T::zero(), |acc, i| acc + self[(i, p)] * self[(i, q)]);
                        let expected = if p == q { T::one() } else { T::zero() };
                        dev.compare(dot, expected);
                    }
                }
            }
            MatrixProperty::Diagonal
            | MatrixProperty::Identity
            | MatrixProperty::UpperTriangular
            | MatrixProperty::LowerTriangular => {
                for (i, row) in self.iter_rows().enumerate() {
                    for (j, &x) in row.iter().enumerate() {
                        let checked = match property {
                            MatrixProperty::UpperTriangular => i > j,
                            MatrixProperty::LowerTriangular => j > i,
                            MatrixProperty::Identity => true,
                            _ => i != j,
                        };
                        if !checked {
                            continue;
                        }
                        let expected = if i == j { T::one() } else { T::zero() };
                        dev.compare(x, expected);
                    }
                }
            }
            MatrixProperty::Normalized(norm) => dev.compare(self.norm(norm), T::one()),
        }
        dev
    }

    /// Cached verdict for `property`, or [`TriState::Unknown`] if the matrix was
    /// modified since the property was last tested.
    pub fn property(&self, property: MatrixProperty) -> TriState {
        self.cache.lookup(property, self.generation)
    }

    /// Tests `property`, scanning the matrix only if no verdict is cached.
    pub fn has_property(&self, property: MatrixProperty) -> bool {
        if let Some(verdict) = self.property(property).known() {
            return verdict;
        }
        let verdict = self.scan(property).within_tolerance;
        self.cache.store(property, self.generation, verdict.into());
        verdict
    }

    /// Scans the matrix for `property` and returns the largest deviation found.
    ///
    /// The verdict is cached as true when every element is within tolerance;
    /// otherwise the cache is left as it was. Shapes for which the property
    /// cannot hold report an infinite deviation.
    pub fn check_property(&self, property: MatrixProperty) -> T {
        let dev = self.scan(property);
        if dev.within_tolerance {
            self.cache.store(property, self.generation, TriState::True);
        }
        dev.max
    }

    /// Returns true if `A = A^T` within tolerance.
    pub fn is_symmetric(&self) -> bool {
        self.has_property(MatrixProperty::Symmetric)
    }

    /// Returns true if `A = -A^T` within tolerance.
    pub fn is_antisymmetric(&self) -> bool {
        self.has_property(MatrixProperty::Antisymmetric)
    }

    /// Returns true if the columns are orthonormal within tolerance.
    pub fn is_orthogonal(&self) -> bool {
        self.has_property(MatrixProperty::Orthogonal)
    }

    /// Returns true if every off-diagonal element is zero within tolerance.
    pub fn is_diagonal(&self) -> bool {
        self.has_property(MatrixProperty::Diagonal)
    }

    /// Returns true if the matrix is the identity within tolerance.
    pub fn is_identity(&self) -> bool {
        self.has_property(MatrixProperty::Identity)
    }

    /// Returns true if every element below the diagonal is zero within tolerance.
    pub fn is_upper_triangular(&self) -> bool {
        self.has_property(MatrixProperty::UpperTriangular)
    }

    /// Returns true if every element above the diagonal is zero within tolerance.
    pub fn is_lower_triangular(&self) -> bool {
        self.has_property(MatrixProperty::LowerTriangular)
    }

    /// Returns true if the selected norm is one within tolerance.
    pub fn is_normalized(&self, norm: Norm) -> bool {
        self.has_property(MatrixProperty::Normalized(norm))
    }

    /// Largest `|a_ij - a_ji|`.
    pub fn check_symmetry(&self) -> T {
        self.check_property(MatrixProperty::Symmetric)
    }

    /// Largest `|a_ij + a_ji|`.
    pub fn check_antisymmetry(&self) -> T {
        self.check_property(MatrixProperty::Antisymmetric)
    }

    /// Largest deviation of `A^T A` from the identity.
    pub fn check_orthogonality(&self) -> T {
        self.check_property(MatrixProperty::Orthogonal)
    }

    /// Largest off-diagonal magnitude.
    pub fn check_diagonality(&self) -> T {
        self.check_property(MatrixProperty::Diagonal)
    }

    /// Largest deviation from the identity.
    pub fn check_identity(&self) -> T {
        self.check_property(MatrixProperty::Identity)
    }

    /// Largest magnitude below the diagonal.
    pub fn check_upper_triangularity(&self) -> T {
        self.check_property(MatrixProperty::UpperTriangular)
    }

    /// Largest magnitude above the diagonal.
    pub fn check_lower_triangularity(&self) -> T {
        self.check_property(MatrixProperty::LowerTriangular)
    }

    /// Deviation of the selected norm from one.
    pub fn check_normalization(&self, norm: Norm) -> T {
        self.check_property(MatrixProperty::Normalized(norm))
    }

    fn mark(&self, property: MatrixProperty) {
        self.cache.store(property, self.generation, TriState::True);
    }

    fn require_square(&self, operation: &'static str) -> Result<(), MatrixError> {
        if !self.is_square() {
            return Err(MatrixError::not_square(operation, self.shape()));
        }
        Ok(())
    }

    /// Replaces `A` with `(A + A^T) / 2`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::NotSquare`] if the matrix is not square.
    pub fn enforce_symmetry(&mut self) -> Result<(), MatrixError> {
        self.require_square("enforce_symmetry")?;
        let half = T::from_f64(0.5);
        for i in 0..self.rows {
            for j in (i + 1)..self.cols {
                let mean = (self[(i, j)] + self[(j, i)]) * half;
                self[(i, j)] = mean;
                self[(j, i)] = mean;
            }
        }
        self.mark(MatrixProperty::Symmetric);
        Ok(())
    }

    /// Replaces `A` with `(A - A^T) / 2`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::NotSquare`] if the matrix is not square.
    pub fn enforce_antisymmetry(&mut self) -> Result<(), MatrixError> {
        self.require_square("enforce_antisymmetry")?;
        let half = T::from_f64(0.5);
        for i in 0..self.rows {
            self[(i, i)] = T::zero();
            for j in (i + 1)..self.cols {
                let mean = (self[(i, j)] - self[(j, i)]) * half;
                self[(i, j)] = mean;
                self[(j, i)] = -mean;
            }
        }
        self.mark(MatrixProperty::Antisymmetric);
        Ok(())
    }

    fn zero_where(&mut self, keep: impl Fn(usize, usize) -> bool) {
        for i in 0..self.rows {
            for (j, x) in self.row_mut(i).iter_mut().enumerate() {
                if !keep(i, j) {
                    *x = T::zero();
                }
            }
        }
    }

    /// Zeroes every off-diagonal element.
    pub fn enforce_diagonality(&mut self) {
        self.zero_where(|i, j| i == j);
        self.mark(MatrixProperty::Diagonal);
        self.mark(MatrixProperty::UpperTriangular);
        self.mark(MatrixProperty::LowerTriangular);
    }

    /// Zeroes every element below the diagonal.
    pub fn enforce_upper_triangularity(&mut self) {
        self.zero_where(|i, j| i <= j);
        self.mark(MatrixProperty::UpperTriangular);
    }

    /// Zeroes every element above the diagonal.
    pub fn enforce_lower_triangularity(&mut self) {
        self.zero_where(|i, j| i >= j);
        self.mark(MatrixProperty::LowerTriangular);
    }

    /// Orthonormalizes the columns with modified Gram-Schmidt.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if there are more columns than
    /// rows, and [`MatrixError::ZeroNorm`] if the columns are linearly dependent.
    pub fn enforce_orthogonality(&mut self) -> Result<(), MatrixError> {
        let (rows, cols) = (self.rows, self.cols);
        if rows < cols {
            return Err(MatrixError::dimension_mismatch(
                "enforce_orthogonality",
                [cols, cols],
                self.shape(),
            ));
        }
        for j in 0..cols {
            for k in 0..j {
                let r = (0..rows).fold(T::zero(), |acc, i| acc + self[(i, k)] * self[(i, j)]);
                for i in 0..rows {
                    let q = self[(i, k)];
                    self[(i, j)] -= r * q;
                }
            }
            let norm = (0..rows)
                .fold(T::zero(), |acc, i| acc + self[(i, j)] * self[(i, j)])
                .sqrt();
            if norm == T::zero() {
                return Err(MatrixError::ZeroNorm);
            }
            for i in 0..rows {
                self[(i, j)] /= norm;
            }
        }
        self.mark(MatrixProperty::Orthogonal);
        Ok(())
    }

    /// Divides the matrix by its selected norm.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::ZeroNorm`] if the norm is zero.
    pub fn enforce_normalization(&mut self, norm: Norm) -> Result<(), MatrixError> {
        let n = self.norm(norm);
        if n == T::zero() {
            return Err(MatrixError::ZeroNorm);
        }
        self.scale(T::one() / n);
        self.mark(MatrixProperty::Normalized(norm));
        Ok(())
    }
}
