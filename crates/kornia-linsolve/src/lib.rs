#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! Solvers for `A * X = B` where `A` is a dense [`Matrix`](kornia_matrix::Matrix)
//! and every column of `B` is an independent right-hand side:
//!
//! | Solver | Shapes | Notes |
//! |--------|--------|-------|
//! | [`LuSolver`] | square | Crout factorization with scaled partial pivoting |
//! | [`QrSolver`] | `m >= n` | Householder, least squares for `m > n` |
//! | [`SvdSolver`] | `m >= n >= 2` | pseudo-inverse, never fails on singularity |
//! | [`IterativeSolver`] | square | Jacobi, Gauss-Seidel, SOR |
//!
//! All of them implement [`LinearSolver`]. A solver is built from a matrix
//! once and then solves any number of right-hand sides. The direct solvers
//! either copy the matrix (`new`) or factorize the caller's buffer in place
//! (`in_place`); `with_capacity` plus `load` reuse one buffer across matrices
//! of varying size.
//!
//! The outcome of a solve is a [`LinearSolverRecord`] carrying the solution
//! and a [`LinearSolverStatus`]: ill-conditioning and non-convergence are
//! reported there, while misuse (wrong shapes, solving against a singular LU
//! factorization) is a [`SolverError`].
//!
//! # Quick Start
//!
//! ```rust
//! use kornia_linsolve::{lu, LinearSolverStatus};
//! use kornia_matrix::Matrix;
//!
//! let a: Matrix<f64> = Matrix::from_rows(&[[3.0, 2.0, -1.0], [2.0, -2.0, 4.0], [-1.0, 0.5, -1.0]]);
//! let b = Matrix::from_rows(&[[1.0], [-2.0], [0.0]]);
//!
//! let record = lu::solve(&a, &b).unwrap();
//! assert_eq!(record.status, LinearSolverStatus::RegularMatrix);
//! assert!((record.solution[(0, 0)] - 1.0).abs() < 1e-12);
//! assert!((record.solution[(1, 0)] + 2.0).abs() < 1e-12);
//! assert!((record.solution[(2, 0)] + 2.0).abs() < 1e-12);
//! ```

/// Error types for the solvers.
pub mod error;

/// Matrix inverse, determinant and pseudo-inverse.
pub mod inverse;

/// Jacobi, Gauss-Seidel and SOR solvers.
pub mod iterative;

/// LU solver.
pub mod lu;

/// QR solver.
pub mod qr;

/// Solver outcome types.
pub mod record;

/// The common solver interface.
pub mod solver;

/// SVD solver.
pub mod svd;

pub use crate::error::SolverError;
pub use crate::inverse::MatrixInverse;
pub use crate::iterative::{IterativeConfig, IterativeMethod, IterativeSolver};
pub use crate::lu::{LuSolver, ILL_COND_PIVOT_THRESHOLD};
pub use crate::qr::QrSolver;
pub use crate::record::{LinearSolverRecord, LinearSolverStatus};
pub use crate::solver::{LinearSolver, ILL_COND_THRESHOLD};
pub use crate::svd::{SvdSolver, SVD_MAX_ITERATIONS};
