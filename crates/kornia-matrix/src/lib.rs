#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `kornia-matrix` provides the dense, row-major [`Matrix`] type used by the
//! linear solvers in `kornia-linsolve`, together with its non-owning views and
//! the [`RowVector`] / [`ColumnVector`] specializations.
//!
//! # Architecture
//!
//! - **MatrixStorage**: the backing buffer. Its capacity (the storage shape) may
//!   be larger than the logical shape of the matrix, so a buffer sized once for
//!   the largest expected input can be reused for smaller ones.
//! - **Matrix**: owned logical `rows x cols` window over a storage buffer, with
//!   arithmetic, norms and structural property tests.
//! - **MatrixView / MatrixViewMut**: borrowed windows over caller memory. They
//!   replace raw-array aliasing: the borrow checker guarantees the caller does
//!   not touch the buffer while a view is alive.
//! - **Properties**: verdicts such as "is symmetric" are cached per matrix and
//!   tagged with a generation counter that every mutable access bumps, so a
//!   stale verdict can never be observed.
//!
//! # Quick Start
//!
//! ```rust
//! use kornia_matrix::Matrix;
//!
//! let a = Matrix::from_rows(&[[4.0, 1.0], [1.0, 3.0]]);
//! let b = Matrix::<f64>::identity(2);
//!
//! let c = a.matmul(&b).unwrap();
//! assert_eq!(c, a);
//! assert!(a.is_symmetric());
//! assert_eq!(a.norm_inf(), 5.0);
//! ```

mod display;

/// Error types for matrix construction and arithmetic.
pub mod error;

/// The owned matrix type and its constructors and accessors.
pub mod matrix;

/// Matrix arithmetic and norms.
pub mod ops;

/// Cached structural properties (symmetry, orthogonality, triangularity, ...).
pub mod properties;

/// The floating point element trait.
pub mod scalar;

/// Serde support for matrices.
#[cfg(feature = "serde")]
pub mod serde;

/// Backing buffers with a storage shape independent of the logical shape.
pub mod storage;

/// Row and column vector specializations.
pub mod vector;

/// Non-owning matrix views over caller memory.
pub mod view;

pub use crate::error::MatrixError;
pub use crate::matrix::Matrix;
pub use crate::ops::Norm;
pub use crate::properties::{MatrixProperty, TriState, MATRIX_PROP_ABS_TOL, MATRIX_PROP_REL_TOL};
pub use crate::scalar::Scalar;
pub use crate::storage::MatrixStorage;
pub use crate::vector::{ColumnVector, RowVector};
pub use crate::view::{AsMatrixView, AsMatrixViewMut, MatrixView, MatrixViewMut};

/// Type alias for a single precision matrix.
pub type MatrixF32 = Matrix<f32>;

/// Type alias for a double precision matrix.
pub type MatrixF64 = Matrix<f64>;
