//! Null tracking around the wire format.
//!
//! The wire arrays carry no validity, so nulls travel out-of-band: before
//! encoding, every null cell is replaced with its type's sentinel (false, 0,
//! 0.0, "", epoch) and its position recorded in a per-row map; after
//! decoding, recorded cells are restored to null. A table without nulls
//! omits the side channel entirely.

use polars::prelude::*;

use crate::client::proto::NullValuesMap;
use crate::error::{Error, Result};

/// Replace nulls with sentinels, recording their positions.
///
/// Returns the sanitized frame and one map entry per row; the map is empty
/// when the table holds no nulls at all.
pub fn normalize(df: &DataFrame) -> Result<(DataFrame, Vec<NullValuesMap>)> {
    let has_nulls = df
        .get_columns()
        .iter()
        .any(|col| col.null_count() > 0);
    if !has_nulls {
        return Ok((df.clone(), Vec::new()));
    }

    let mut maps = vec![NullValuesMap::default(); df.height()];
    let mut sanitized = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if series.null_count() == 0 {
            sanitized.push(col.clone());
            continue;
        }

        for (row, is_null) in series.is_null().into_iter().enumerate() {
            if is_null == Some(true) {
                maps[row]
                    .null_columns
                    .insert(series.name().to_string(), true);
            }
        }

        sanitized.push(Column::from(fill_sentinels(series)?));
    }

    Ok((DataFrame::new(sanitized)?, maps))
}

/// Restore recorded nulls in a decoded frame.
///
/// `null_values`, when non-empty, must hold exactly one entry per row, and
/// every referenced name must be a column of `df`.
pub fn denormalize(mut df: DataFrame, null_values: &[NullValuesMap]) -> Result<DataFrame> {
    if null_values.is_empty() {
        return Ok(df);
    }
    if null_values.len() != df.height() {
        return Err(Error::Message(format!(
            "null map has {} entries for {} rows",
            null_values.len(),
            df.height()
        )));
    }

    // Collect per-column row masks before touching the frame.
    let mut masks: std::collections::HashMap<&str, Vec<bool>> = std::collections::HashMap::new();
    for (row, entry) in null_values.iter().enumerate() {
        for (name, flagged) in &entry.null_columns {
            if !flagged {
                continue;
            }
            let mask = masks
                .entry(name.as_str())
                .or_insert_with(|| vec![false; df.height()]);
            mask[row] = true;
        }
    }

    for (name, mask) in masks {
        let series = df
            .column(name)
            .map_err(|_| Error::Message(format!("null map references unknown column '{name}'")))?
            .as_materialized_series()
            .clone();
        let restored = apply_nulls(&series, &mask)?;
        df.replace(name, restored)?;
    }

    Ok(df)
}

fn fill_sentinels(series: &Series) -> Result<Series> {
    let name: PlSmallStr = series.name().clone();
    let dtype = series.dtype().clone();

    let filled = match &dtype {
        DataType::Null => series.clone(),
        DataType::Boolean => {
            let data: Vec<bool> = series
                .bool()?
                .into_iter()
                .map(|v| v.unwrap_or(false))
                .collect();
            Series::new(name, data.as_slice())
        }
        dt if dt.is_integer() => {
            let cast = series.cast(&DataType::Int64)?;
            let data: Vec<i64> = cast.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect();
            Series::new(name, data.as_slice())
        }
        dt if dt.is_float() => {
            let cast = series.cast(&DataType::Float64)?;
            let data: Vec<f64> = cast.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
            Series::new(name, data.as_slice())
        }
        DataType::String => {
            let data: Vec<&str> = series
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or(""))
                .collect();
            Series::new(name, data.as_slice())
        }
        dt if dt.is_categorical() => fill_sentinels(&series.cast(&DataType::String)?)?,
        DataType::Datetime(_, _) | DataType::Date => {
            let cast = series
                .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
                .cast(&DataType::Int64)?;
            let data: Vec<i64> = cast.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect();
            Series::new(name, data.as_slice())
                .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
        }
        _ => {
            return Err(Error::Write(format!(
                "cannot build null sentinel for column '{}' of type {}",
                series.name(),
                dtype
            )))
        }
    };

    Ok(filled)
}

fn apply_nulls(series: &Series, mask: &[bool]) -> Result<Series> {
    let name: PlSmallStr = series.name().clone();

    let restored = match series.dtype() {
        // Already all-null; nothing to restore.
        DataType::Null => series.clone(),
        DataType::Boolean => {
            let data: Vec<Option<bool>> = series
                .bool()?
                .into_iter()
                .zip(mask)
                .map(|(v, null)| if *null { None } else { v })
                .collect();
            Series::new(name, data.as_slice())
        }
        DataType::Int64 => {
            let data: Vec<Option<i64>> = series
                .i64()?
                .into_iter()
                .zip(mask)
                .map(|(v, null)| if *null { None } else { v })
                .collect();
            Series::new(name, data.as_slice())
        }
        DataType::Float64 => {
            let data: Vec<Option<f64>> = series
                .f64()?
                .into_iter()
                .zip(mask)
                .map(|(v, null)| if *null { None } else { v })
                .collect();
            Series::new(name, data.as_slice())
        }
        DataType::String => {
            let data: Vec<Option<&str>> = series
                .str()?
                .into_iter()
                .zip(mask)
                .map(|(v, null)| if *null { None } else { v })
                .collect();
            Series::new(name, data.as_slice())
        }
        DataType::Datetime(_, _) => {
            let cast = series.cast(&DataType::Int64)?;
            let data: Vec<Option<i64>> = cast
                .i64()?
                .into_iter()
                .zip(mask)
                .map(|(v, null)| if *null { None } else { v })
                .collect();
            Series::new(name, data.as_slice())
                .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
        }
        other => {
            return Err(Error::Message(format!(
                "cannot restore nulls into column '{}' of type {}",
                series.name(),
                other
            )))
        }
    };

    Ok(restored)
}
