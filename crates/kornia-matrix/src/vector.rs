//! Row and column vectors.
//!
//! Both are thin wrappers around a packed single-column or single-row
//! [`Matrix`]. They dereference to the matrix for read-only matrix operations,
//! and add the vector-specific ones (dot and outer products, vector norms).
//! Transposing a vector yields the other vector type, so a vector can never be
//! reshaped into a non-vector matrix in place.

use std::ops::{Deref, Index, IndexMut};

use crate::{error::MatrixError, ops::Norm, Matrix, Scalar};

macro_rules! impl_vector {
    ($name:ident, $transposed:ident, $column:literal, $orientation:literal) => {
        impl<T: Scalar> $name<T> {
            fn shape_for(len: usize) -> (usize, usize) {
                if $column {
                    (len, 1)
                } else {
                    (1, len)
                }
            }

            #[doc = concat!("Creates a zero-filled ", $orientation, " vector of `len` elements.")]
            pub fn new(len: usize) -> Self {
                let (rows, cols) = Self::shape_for(len);
                Self(Matrix::new(rows, cols))
            }

            #[doc = concat!("Creates a ", $orientation, " vector taking ownership of `data`.")]
            pub fn from_vec(data: Vec<T>) -> Self {
                let (rows, cols) = Self::shape_for(data.len());
                Self(Matrix::from_storage_parts(rows, cols, data))
            }

            #[doc = concat!("Creates a ", $orientation, " vector by copying `data`.")]
            pub fn from_slice(data: &[T]) -> Self {
                Self::from_vec(data.to_vec())
            }

            /// Number of elements.
            #[inline]
            pub fn len(&self) -> usize {
                self.0.numel()
            }

            /// Returns true if the vector has no element.
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// The elements as a contiguous slice.
            #[inline]
            pub fn as_slice(&self) -> &[T] {
                self.0.as_raw_slice()
            }

            /// The elements as a contiguous mutable slice.
            #[inline]
            pub fn as_mut_slice(&mut self) -> &mut [T] {
                self.0.as_raw_slice_mut()
            }

            /// Returns element `i`, or `None` if out of bounds.
            #[inline]
            pub fn get(&self, i: usize) -> Option<T> {
                self.as_slice().get(i).copied()
            }

            /// Iterates over the elements.
            pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
                self.as_slice().iter()
            }

            /// The underlying matrix.
            #[inline]
            pub fn as_matrix(&self) -> &Matrix<T> {
                &self.0
            }

            /// Unwraps the underlying matrix.
            #[inline]
            pub fn into_matrix(self) -> Matrix<T> {
                self.0
            }

            /// Inner product with another vector of the same orientation.
            ///
            /// # Errors
            ///
            /// Returns [`MatrixError::DimensionMismatch`] if the lengths differ.
            pub fn dot(&self, other: &Self) -> Result<T, MatrixError> {
                if self.len() != other.len() {
                    return Err(MatrixError::dimension_mismatch(
                        "dot",
                        self.0.shape(),
                        other.0.shape(),
                    ));
                }
                Ok(self
                    .iter()
                    .zip(other.iter())
                    .fold(T::zero(), |acc, (&a, &b)| acc + a * b))
            }

            /// Sum of absolute values.
            pub fn norm_1(&self) -> T {
                self.iter().fold(T::zero(), |acc, x| acc + x.abs())
            }

            /// Euclidean norm.
            pub fn norm_2(&self) -> T {
                self.iter().fold(T::zero(), |acc, &x| acc + x * x).sqrt()
            }

            /// Largest absolute value.
            pub fn norm_inf(&self) -> T {
                self.iter().fold(T::zero(), |acc, x| acc.max(x.abs()))
            }

            /// Computes the selected vector norm.
            pub fn norm(&self, norm: Norm) -> T {
                match norm {
                    Norm::L1 => self.norm_1(),
                    Norm::L2 => self.norm_2(),
                    Norm::Inf => self.norm_inf(),
                }
            }

            /// Divides the vector by its selected norm.
            ///
            /// # Errors
            ///
            /// Returns [`MatrixError::ZeroNorm`] if the norm is zero.
            pub fn normalize(&mut self, norm: Norm) -> Result<(), MatrixError> {
                let n = self.norm(norm);
                if n == T::zero() {
                    return Err(MatrixError::ZeroNorm);
                }
                self.as_mut_slice().iter_mut().for_each(|x| *x /= n);
                Ok(())
            }

            /// Returns the transposed vector.
            pub fn transposition(&self) -> $transposed<T> {
                $transposed::from_slice(self.as_slice())
            }
        }

        impl<T: Scalar> Deref for $name<T> {
            type Target = Matrix<T>;

            fn deref(&self) -> &Matrix<T> {
                &self.0
            }
        }

        impl<T: Scalar> Index<usize> for $name<T> {
            type Output = T;

            fn index(&self, i: usize) -> &T {
                &self.as_slice()[i]
            }
        }

        impl<T: Scalar> IndexMut<usize> for $name<T> {
            fn index_mut(&mut self, i: usize) -> &mut T {
                &mut self.as_mut_slice()[i]
            }
        }

        impl<T: Scalar> From<$name<T>> for Matrix<T> {
            fn from(v: $name<T>) -> Self {
                v.0
            }
        }

        impl<T: Scalar> TryFrom<Matrix<T>> for $name<T> {
            type Error = MatrixError;

            /// Converts a matrix with a single column (or row) into a vector,
            /// repacking it if it lives in a larger storage buffer.
            fn try_from(m: Matrix<T>) -> Result<Self, MatrixError> {
                let is_vector = if $column { m.cols() == 1 } else { m.rows() == 1 };
                if !is_vector {
                    return Err(MatrixError::NotAVector {
                        rows: m.rows(),
                        cols: m.cols(),
                    });
                }
                if m.storage().len() == m.numel() {
                    Ok(Self(m))
                } else {
                    Ok(Self::from_vec(m.to_vec()))
                }
            }
        }
    };
}

/// A column vector, backed by an `n x 1` matrix.
///
/// # Examples
///
/// ```rust
/// use kornia_matrix::{ColumnVector, Norm};
///
/// let mut v = ColumnVector::from_vec(vec![3.0, 4.0]);
/// assert_eq!(v.norm_2(), 5.0);
/// v.normalize(Norm::L2).unwrap();
/// assert_eq!(v.as_slice(), &[0.6, 0.8]);
/// assert_eq!(v.shape(), [2, 1]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnVector<T: Scalar = f64>(Matrix<T>);

/// A row vector, backed by a `1 x n` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct RowVector<T: Scalar = f64>(Matrix<T>);

impl_vector!(ColumnVector, RowVector, true, "column");
impl_vector!(RowVector, ColumnVector, false, "row");

impl<T: Scalar> ColumnVector<T> {
    /// Outer product `self * row`, an `n x m` matrix.
    pub fn outer(&self, row: &RowVector<T>) -> Matrix<T> {
        Matrix::from_fn(self.len(), row.len(), |i, j| self[i] * row[j])
    }
}

impl<T: Scalar> Matrix<T> {
    /// Copies column `j` into a column vector.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if `j >= cols`.
    pub fn column(&self, j: usize) -> Result<ColumnVector<T>, MatrixError> {
        if j >= self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row: 0,
                col: j,
                shape: self.shape(),
            });
        }
        Ok(ColumnVector::from_vec(
            self.iter_rows().map(|row| row[j]).collect(),
        ))
    }

    /// Copies row `i` into a row vector.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::IndexOutOfBounds`] if `i >= rows`.
    pub fn row_vector(&self, i: usize) -> Result<RowVector<T>, MatrixError> {
        if i >= self.rows {
            return Err(MatrixError::IndexOutOfBounds {
                row: i,
                col: 0,
                shape: self.shape(),
            });
        }
        Ok(RowVector::from_slice(self.row(i)))
    }
}
