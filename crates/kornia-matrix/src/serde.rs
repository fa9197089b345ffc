use crate::{Matrix, Scalar};

use serde::ser::SerializeStruct;
use serde::Deserialize;

impl<T> serde::Serialize for Matrix<T>
where
    T: Scalar + serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Matrix", 3)?;
        state.serialize_field("rows", &self.rows())?;
        state.serialize_field("cols", &self.cols())?;
        state.serialize_field("data", &self.to_vec())?;
        state.end()
    }
}

impl<'de, T> serde::Deserialize<'de> for Matrix<T>
where
    T: Scalar + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct MatrixData<T> {
            rows: usize,
            cols: usize,
            data: Vec<T>,
        }

        let MatrixData { rows, cols, data } = MatrixData::deserialize(deserializer)?;

        Matrix::from_vec(rows, cols, data).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::Matrix;

    #[test]
    fn test_serde() -> Result<(), Box<dyn std::error::Error>> {
        let mut matrix = Matrix::<f64>::with_storage(2, 3, 4, 4)?;
        matrix.row_mut(1).copy_from_slice(&[4.0, 5.0, 6.0]);
        let serialized = serde_json::to_string(&matrix)?;
        assert_eq!(
            serialized,
            r#"{"rows":2,"cols":3,"data":[0.0,0.0,0.0,4.0,5.0,6.0]}"#
        );
        let deserialized: Matrix<f64> = serde_json::from_str(&serialized)?;
        assert_eq!(matrix, deserialized);

        let bad = serde_json::from_str::<Matrix<f64>>(r#"{"rows":2,"cols":2,"data":[1.0]}"#);
        assert!(bad.is_err());
        Ok(())
    }
}
