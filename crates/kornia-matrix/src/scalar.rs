use std::fmt::{Debug, Display};

use num_traits::{Float, NumAssign};

/// Floating point element type of matrices and solvers.
///
/// Implemented for `f32` and `f64`. Besides the arithmetic provided by
/// [`num_traits::Float`], it offers lossless widening to `f64`, which the solvers
/// use to accumulate residuals in extended precision.
pub trait Scalar:
    Float + NumAssign + Debug + Display + Default + Send + Sync + 'static
{
    /// Converts an `f64` constant into this type, rounding to nearest if needed.
    fn from_f64(value: f64) -> Self;

    /// Widens the value to `f64`.
    fn into_f64(self) -> f64;

    /// Default convergence tolerance for iterative algorithms in this precision.
    fn default_tolerance() -> Self;
}

impl Scalar for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn into_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn default_tolerance() -> Self {
        1e-6
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn into_f64(self) -> f64 {
        self
    }

    #[inline]
    fn default_tolerance() -> Self {
        1e-10
    }
}

#[cfg(test)]
mod tests {
    use super::Scalar;

    #[test]
    fn test_widening_roundtrip() {
        let x = <f32 as Scalar>::from_f64(0.25);
        assert_eq!(x.into_f64(), 0.25);
        assert_eq!(<f64 as Scalar>::from_f64(1e-300), 1e-300);
        assert!(f32::default_tolerance() > f64::default_tolerance() as f32);
    }
}
