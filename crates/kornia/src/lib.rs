#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! ```rust
//! use kornia::linsolve::{LinearSolver, QrSolver};
//! use kornia::matrix::Matrix;
//!
//! let a: Matrix<f64> = Matrix::from_rows(&[[1.0, 1.0], [1.0, 2.0], [1.0, 3.0]]);
//! let b = Matrix::from_rows(&[[1.0], [2.0], [3.0]]);
//!
//! // least squares line through three collinear points
//! let x = QrSolver::new(&a).unwrap().solve(&b).unwrap().solution;
//! assert!(x[(0, 0)].abs() < 1e-12);
//! assert!((x[(1, 0)] - 1.0).abs() < 1e-12);
//! ```

#[doc(inline)]
pub use kornia_matrix as matrix;

#[doc(inline)]
pub use kornia_linsolve as linsolve;
