//! Backing buffers for matrices.
//!
//! A [`MatrixStorage`] owns a contiguous row-major buffer of
//! `storage_rows x storage_cols` elements. Matrices address it with a row
//! stride of `storage_cols`, which lets a buffer allocated once for the largest
//! expected input hold any smaller logical matrix without reallocating.

use crate::{error::MatrixError, Scalar};

/// Owned, row-major backing buffer of a matrix.
#[derive(Clone, PartialEq)]
pub struct MatrixStorage<T> {
    /// The elements, `rows * cols` of them.
    data: Vec<T>,
    /// Number of rows the buffer can hold.
    rows: usize,
    /// Number of columns the buffer can hold, which is also the row stride.
    cols: usize,
}

impl<T: Scalar> MatrixStorage<T> {
    /// Allocates a zero-filled buffer of `rows x cols` elements.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::zero(); rows * cols],
            rows,
            cols,
        }
    }

    /// Wraps a vector as a `rows x cols` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::InvalidShape`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::invalid_shape(rows * cols, data.len()));
        }
        Ok(Self { data, rows, cols })
    }

    /// Wraps a vector whose length is already known to be `rows * cols`.
    pub(crate) fn from_vec_unchecked(rows: usize, cols: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { data, rows, cols }
    }

    /// Number of rows the buffer can hold.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns the buffer can hold.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Distance in elements between two consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.cols
    }

    /// Total number of elements in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if a logical `rows x cols` matrix fits in this buffer.
    #[inline]
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        rows <= self.rows && cols <= self.cols
    }

    /// The whole buffer, including the elements outside the logical shape.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The whole buffer as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Sets every element of the buffer to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Consumes the buffer and returns the underlying vector.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Scalar> std::fmt::Debug for MatrixStorage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixStorage")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_create() {
        let storage = MatrixStorage::<f64>::new(3, 4);
        assert_eq!(storage.len(), 12);
        assert_eq!(storage.stride(), 4);
        assert!(!storage.is_empty());
        assert!(storage.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_storage_from_vec() -> Result<(), MatrixError> {
        let storage = MatrixStorage::from_vec(2, 2, vec![1.0f32, 2.0, 3.0, 4.0])?;
        assert_eq!(storage.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(storage.into_vec(), vec![1.0, 2.0, 3.0, 4.0]);

        let err = MatrixStorage::from_vec(2, 2, vec![1.0f32; 3]);
        assert_eq!(err, Err(MatrixError::invalid_shape(4, 3)));
        Ok(())
    }

    #[test]
    fn test_storage_fits() {
        let storage = MatrixStorage::<f64>::new(8, 6);
        assert!(storage.fits(8, 6));
        assert!(storage.fits(2, 3));
        assert!(!storage.fits(9, 1));
        assert!(!storage.fits(1, 7));
    }
}
