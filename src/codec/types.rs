//! Wire type inference.
//!
//! Maps host column types onto the five canonical wire types (plus NULL for
//! columns with zero known values). Boolean is always checked before the
//! integer types so bool columns are never misclassified as INTEGER.

use polars::prelude::*;

use crate::client::proto::DType;
use crate::error::{Error, Result};
use crate::table::Scalar;

/// Infer the wire type of a statically typed column.
///
/// All integer widths map to INTEGER, all float widths to FLOAT, categorical
/// columns to STRING, date/datetime columns to TIME. A `Null`-typed column
/// (no known values at all) infers NULL; the receiving side materializes
/// defaults for it.
pub fn infer_series(series: &Series) -> Result<DType> {
    let dtype = series.dtype();

    if dtype.is_bool() {
        return Ok(DType::Boolean);
    }
    if dtype.is_integer() {
        return Ok(DType::Integer);
    }
    if dtype.is_float() {
        return Ok(DType::Float);
    }
    if matches!(dtype, DataType::String) || dtype.is_categorical() {
        return Ok(DType::String);
    }
    if matches!(dtype, DataType::Datetime(_, _) | DataType::Date) {
        return Ok(DType::Time);
    }
    if matches!(dtype, DataType::Null) {
        return Ok(DType::Null);
    }

    Err(Error::Type {
        column: series.name().to_string(),
        found: dtype.to_string(),
    })
}

/// Infer the wire type of a dynamically typed value sequence.
///
/// Classifies by the first non-null value, then verifies every later value
/// agrees with that class. A sequence with zero non-null values infers NULL.
pub fn infer_scalars(column: &str, values: &[Option<Scalar>]) -> Result<DType> {
    let mut inferred: Option<DType> = None;

    for value in values.iter().flatten() {
        let dtype = value.wire_type();
        match inferred {
            None => inferred = Some(dtype),
            Some(expected) if expected == dtype => {}
            Some(_) => {
                return Err(Error::Type {
                    column: column.to_string(),
                    found: value.class_name().to_string(),
                })
            }
        }
    }

    Ok(inferred.unwrap_or(DType::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_is_not_integer() {
        let s = Series::new("flags".into(), &[true, false]);
        assert_eq!(infer_series(&s).unwrap(), DType::Boolean);
    }

    #[test]
    fn static_dtypes() {
        assert_eq!(
            infer_series(&Series::new("i".into(), &[1i64, 2])).unwrap(),
            DType::Integer
        );
        assert_eq!(
            infer_series(&Series::new("i32".into(), &[1i32, 2])).unwrap(),
            DType::Integer
        );
        assert_eq!(
            infer_series(&Series::new("f".into(), &[1.5f64])).unwrap(),
            DType::Float
        );
        assert_eq!(
            infer_series(&Series::new("s".into(), &["x"])).unwrap(),
            DType::String
        );
    }

    #[test]
    fn all_null_column_infers_null() {
        let s = Series::new_null("empty".into(), 3);
        assert_eq!(infer_series(&s).unwrap(), DType::Null);
    }

    #[test]
    fn unsupported_dtype_is_type_error() {
        // time-of-day has no wire representation, only instants do
        let s = Series::new("tod".into(), &[1i64, 2])
            .cast(&DataType::Time)
            .unwrap();
        let err = infer_series(&s).unwrap_err();
        assert!(matches!(err, Error::Type { ref column, .. } if column == "tod"));
    }

    #[test]
    fn first_non_null_wins() {
        let values = vec![None, None, Some(Scalar::String("x".into()))];
        assert_eq!(infer_scalars("c", &values).unwrap(), DType::String);
    }

    #[test]
    fn all_null_scalars_infer_null() {
        let values: Vec<Option<Scalar>> = vec![None, None];
        assert_eq!(infer_scalars("c", &values).unwrap(), DType::Null);
    }

    #[test]
    fn mixed_scalar_classes_fail_with_column_name() {
        let values = vec![Some(Scalar::Int(1)), Some(Scalar::String("x".into()))];
        let err = infer_scalars("mixed", &values).unwrap_err();
        match err {
            Error::Type { column, found } => {
                assert_eq!(column, "mixed");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bool_scalars_stay_boolean() {
        let values = vec![Some(Scalar::Bool(true)), Some(Scalar::Bool(false))];
        assert_eq!(infer_scalars("flags", &values).unwrap(), DType::Boolean);
    }
}
