use std::fmt;

use crate::{Matrix, Scalar};

impl<T: Scalar> Matrix<T> {
    /// Renders the logical elements as text, with `elem_sep` between two
    /// elements of a row and `row_sep` between two rows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kornia_matrix::Matrix;
    ///
    /// let m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
    /// assert_eq!(m.to_string_with("; ", " "), "1 2; 3 4");
    /// ```
    pub fn to_string_with(&self, row_sep: &str, elem_sep: &str) -> String {
        self.iter_rows()
            .map(|row| {
                row.iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(elem_sep)
            })
            .collect::<Vec<_>>()
            .join(row_sep)
    }
}

impl<T: Scalar> fmt::Display for Matrix<T> {
    /// One bracketed row per line. The formatter precision, if any, applies to
    /// every element: `format!("{m:.3}")`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, row) in self.iter_rows().enumerate() {
            if i > 0 {
                f.write_str(",\n ")?;
            }
            f.write_str("[")?;
            for (j, x) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                match f.precision() {
                    Some(p) => write!(f, "{x:.p$}")?,
                    None => write!(f, "{x}")?,
                }
            }
            f.write_str("]")?;
        }
        f.write_str("]")
    }
}
