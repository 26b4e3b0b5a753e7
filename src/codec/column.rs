//! Series <-> wire Column conversion.
//!
//! The encoder always emits SLICE columns: one canonical value per row, with
//! instants normalized to UTC nanosecond ticks and categoricals expanded to
//! plain strings. LABEL output is an explicit choice through
//! [`label_column`], reserved for constant metadata columns; real data is
//! never silently compressed. The decoder handles both kinds, since servers
//! may compress on their side.

use polars::prelude::*;

use crate::client::proto::{column::Kind, Column as PbColumn, DType};
use crate::error::{Error, Result};
use crate::table::Scalar;
use crate::codec::types::infer_scalars;

/// Encode a series as a SLICE column of the given wire type.
///
/// Nulls are expected to be sentinel-filled already (see
/// [`crate::codec::nulls::normalize`]); any null slipping through encodes as
/// the type's default.
pub fn encode_series(series: &Series, dtype: DType) -> Result<PbColumn> {
    let mut col = PbColumn {
        kind: Kind::Slice as i32,
        name: series.name().to_string(),
        dtype: dtype as i32,
        ..Default::default()
    };

    match dtype {
        DType::Boolean => {
            col.bools = series
                .bool()?
                .into_iter()
                .map(|v| v.unwrap_or(false))
                .collect();
        }
        DType::Integer => {
            let cast = series.cast(&DataType::Int64)?;
            col.ints = cast.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect();
        }
        DType::Float => {
            let cast = series.cast(&DataType::Float64)?;
            col.floats = cast.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        }
        DType::String => {
            // Categorical columns (single-category included) expand to full
            // string slices so encode stays reversible.
            let cast = if series.dtype().is_categorical() {
                series.cast(&DataType::String)?
            } else {
                series.clone()
            };
            col.strings = cast
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or("").to_string())
                .collect();
        }
        DType::Time => {
            // Normalize to naive UTC nanoseconds; the physical representation
            // of a zoned datetime is already UTC, so this only adjusts the
            // unit and drops the zone tag.
            let cast = series
                .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
                .cast(&DataType::Int64)?;
            col.times = cast.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect();
        }
        DType::Null => {
            // No payload; only the row count travels.
            col.size = series.len() as i64;
        }
    }

    Ok(col)
}

/// Build a LABEL column: one value, implicitly repeated `size` times.
pub fn label_column(name: &str, value: &Scalar, size: usize) -> PbColumn {
    let mut col = PbColumn {
        kind: Kind::Label as i32,
        name: name.to_string(),
        dtype: value.wire_type() as i32,
        size: size as i64,
        ..Default::default()
    };

    match value {
        Scalar::Bool(v) => col.bools.push(*v),
        Scalar::Int(v) => col.ints.push(*v),
        Scalar::Float(v) => col.floats.push(*v),
        Scalar::String(v) => col.strings.push(v.clone()),
        Scalar::Time(v) => col.times.push(*v),
    }

    col
}

/// Decode a wire column into a series. LABEL columns are materialized to
/// `size` copies of their single value. No row index is assumed; the caller
/// supplies one separately if the frame carries index columns.
pub fn decode_column(col: &PbColumn) -> Result<Series> {
    let dtype = DType::try_from(col.dtype)
        .map_err(|_| Error::Message(format!("{}: unknown dtype {}", col.name, col.dtype)))?;
    let kind = Kind::try_from(col.kind)
        .map_err(|_| Error::Message(format!("{}: unknown column kind {}", col.name, col.kind)))?;
    let name: PlSmallStr = col.name.as_str().into();
    let size = col.size as usize;

    let series = match (dtype, kind) {
        (DType::Null, _) => Series::new_null(name, size),
        (DType::Boolean, Kind::Slice) => Series::new(name, col.bools.as_slice()),
        (DType::Boolean, Kind::Label) => {
            BooleanChunked::full(name, label_value(col, &col.bools)?, size).into_series()
        }
        (DType::Integer, Kind::Slice) => Series::new(name, col.ints.as_slice()),
        (DType::Integer, Kind::Label) => {
            Int64Chunked::full(name, label_value(col, &col.ints)?, size).into_series()
        }
        (DType::Float, Kind::Slice) => Series::new(name, col.floats.as_slice()),
        (DType::Float, Kind::Label) => {
            Float64Chunked::full(name, label_value(col, &col.floats)?, size).into_series()
        }
        (DType::String, Kind::Slice) => Series::new(name, col.strings.as_slice()),
        (DType::String, Kind::Label) => {
            let value = col
                .strings
                .first()
                .ok_or_else(|| empty_column(&col.name))?;
            StringChunked::full(name, value, size).into_series()
        }
        (DType::Time, Kind::Slice) => Int64Chunked::from_vec(name, col.times.clone())
            .into_datetime(TimeUnit::Nanoseconds, None)
            .into_series(),
        (DType::Time, Kind::Label) => {
            Int64Chunked::full(name, label_value(col, &col.times)?, size)
                .into_datetime(TimeUnit::Nanoseconds, None)
                .into_series()
        }
    };

    Ok(series)
}

/// Build a series from dynamically typed values, classifying by the first
/// non-null value. All-null input materializes as a `Null`-typed series.
pub fn series_from_scalars(name: &str, values: &[Option<Scalar>]) -> Result<Series> {
    let dtype = infer_scalars(name, values)?;
    let name: PlSmallStr = name.into();

    let series = match dtype {
        DType::Null => Series::new_null(name, values.len()),
        DType::Boolean => {
            let data: Vec<Option<bool>> = values
                .iter()
                .map(|v| match v {
                    Some(Scalar::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name, data.as_slice())
        }
        DType::Integer => {
            let data: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Some(Scalar::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name, data.as_slice())
        }
        DType::Float => {
            let data: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    Some(Scalar::Float(f)) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(name, data.as_slice())
        }
        DType::String => {
            let data: Vec<Option<String>> = values
                .iter()
                .map(|v| match v {
                    Some(Scalar::String(s)) => Some(s.clone()),
                    _ => None,
                })
                .collect();
            Series::new(name, data.as_slice())
        }
        DType::Time => {
            let data: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Some(Scalar::Time(t)) => Some(*t),
                    _ => None,
                })
                .collect();
            Series::new(name, data.as_slice())
                .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
        }
    };

    Ok(series)
}

fn label_value<T: Copy>(col: &PbColumn, data: &[T]) -> Result<T> {
    data.first().copied().ok_or_else(|| empty_column(&col.name))
}

fn empty_column(name: &str) -> Error {
    Error::Message(format!("{name}: empty column message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_round_trip_per_type() {
        let cases: Vec<Series> = vec![
            Series::new("b".into(), &[true, false, true]),
            Series::new("i".into(), &[1i64, -2, 3]),
            Series::new("f".into(), &[0.5f64, 1.5, -2.5]),
            Series::new("s".into(), &["a", "", "c"]),
        ];

        for series in cases {
            let dtype = crate::codec::types::infer_series(&series).unwrap();
            let col = encode_series(&series, dtype).unwrap();
            assert_eq!(col.kind, Kind::Slice as i32);
            let decoded = decode_column(&col).unwrap();
            assert!(decoded.equals(&series), "{}", series.name());
        }
    }

    #[test]
    fn time_encodes_as_utc_nanoseconds() {
        let ticks = [1_500_000_000_000_000_000i64, 1_500_000_000_000_000_001];
        let series = Series::new("t".into(), &ticks)
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))
            .unwrap();

        let col = encode_series(&series, DType::Time).unwrap();
        assert_eq!(col.times, ticks);

        let decoded = decode_column(&col).unwrap();
        assert!(decoded.equals(&series));
    }

    #[test]
    fn millisecond_datetimes_normalize_to_nanoseconds() {
        let series = Series::new("t".into(), &[1_000i64, 2_000])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();

        let col = encode_series(&series, DType::Time).unwrap();
        assert_eq!(col.times, vec![1_000_000_000i64, 2_000_000_000]);
    }

    #[test]
    fn label_column_materializes_repeats() {
        let col = label_column("c", &Scalar::Int(7), 5);
        assert_eq!(col.kind, Kind::Label as i32);
        assert_eq!(col.size, 5);

        let decoded = decode_column(&col).unwrap();
        assert!(decoded.equals(&Series::new("c".into(), &[7i64, 7, 7, 7, 7])));
    }

    #[test]
    fn string_label_expands() {
        let col = label_column("host", &Scalar::String("node-1".into()), 3);
        let decoded = decode_column(&col).unwrap();
        assert!(decoded.equals(&Series::new(
            "host".into(),
            &["node-1", "node-1", "node-1"]
        )));
    }

    #[test]
    fn empty_label_column_is_message_error() {
        let col = PbColumn {
            kind: Kind::Label as i32,
            name: "c".into(),
            dtype: DType::Integer as i32,
            size: 4,
            ..Default::default()
        };
        let err = decode_column(&col).unwrap_err();
        assert!(matches!(err, Error::Message(ref m) if m.contains("empty column message")));
    }

    #[test]
    fn unknown_dtype_tag_is_message_error() {
        let col = PbColumn {
            name: "c".into(),
            dtype: 99,
            ..Default::default()
        };
        assert!(matches!(
            decode_column(&col).unwrap_err(),
            Error::Message(_)
        ));
    }

    #[test]
    fn null_column_round_trips_without_payload() {
        let series = Series::new_null("gap".into(), 4);
        let col = encode_series(&series, DType::Null).unwrap();
        assert_eq!(col.size, 4);
        assert!(col.ints.is_empty() && col.strings.is_empty());

        let decoded = decode_column(&col).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded.null_count(), 4);
    }
}
