//! The columnar Frame codec.
//!
//! Assembles a wire [`Frame`](crate::client::proto::Frame) from a [`Table`]
//! snapshot and reconstructs an equivalent table from an incoming frame:
//! index pull-out (simple and composite), synthetic positional renaming,
//! null tracking and per-column encoding.

pub mod column;
pub mod nulls;
pub mod types;

use std::collections::HashSet;

use polars::prelude::{Column as PlColumn, DataFrame, PlSmallStr, Series};

use crate::client::proto::{Column as PbColumn, Frame};
use crate::error::{Error, Result};
use crate::table::{labels_from_proto, labels_to_proto, Table};

/// Reserved prefix of the synthetic positional naming scheme.
const SYNTHETIC_PREFIX: &str = "column_";

/// Encode a table snapshot into one wire frame.
///
/// Index columns (per `Table::index_names`) are pulled out of the data
/// columns and encoded as `indices` in level order. When every data column
/// name is a decimal integer — the host rendering of positional naming —
/// names are rewritten to the reversible `column_<i>` scheme. A real string
/// name that collides with that reserved scheme is rejected rather than
/// silently misinterpreted on decode.
pub fn to_frame(table: &Table) -> Result<Frame> {
    let df = table.df();

    let mut index_series: Vec<Series> = Vec::with_capacity(table.index_names().len());
    let mut data_df = df.clone();
    for name in table.index_names() {
        let series = df.column(name)?.as_materialized_series().clone();
        if series.null_count() > 0 {
            return Err(Error::Write(format!("null value in index column '{name}'")));
        }
        index_series.push(series);
        data_df = data_df.drop(name)?;
    }

    let data_df = rewrite_positional_names(&data_df)?;

    let (sanitized, null_values) = nulls::normalize(&data_df)?;

    let mut columns = Vec::with_capacity(sanitized.width());
    for col in sanitized.get_columns() {
        columns.push(encode(col.as_materialized_series())?);
    }

    let mut indices = Vec::with_capacity(index_series.len());
    for series in &index_series {
        indices.push(encode(series)?);
    }

    Ok(Frame {
        columns,
        indices,
        labels: labels_to_proto(table.labels()),
        null_values,
    })
}

/// Decode a wire frame into a table, keeping the frame's column order.
pub fn from_frame(frame: &Frame) -> Result<Table> {
    from_frame_with_columns(frame, None)
}

/// Decode a wire frame, optionally reordering data columns to `desired`.
///
/// Without a desired order: an all-synthetic frame has the positional
/// rewrite reversed; a frame mixing synthetic and plain names falls back to
/// deterministic lexicographic order (the mix cannot be reconstructed);
/// anything else keeps wire order.
pub fn from_frame_with_columns(frame: &Frame, desired: Option<&[&str]>) -> Result<Table> {
    let index_series = decode_indices(frame)?;

    let mut data_series = Vec::with_capacity(frame.columns.len());
    for col in &frame.columns {
        data_series.push(column::decode_column(col)?);
    }

    let row_count = check_row_count(&index_series, &data_series)?;

    let mut data_df = if data_series.is_empty() {
        DataFrame::empty_with_height(row_count)
    } else {
        DataFrame::new(data_series.into_iter().map(PlColumn::from).collect())?
    };

    data_df = nulls::denormalize(data_df, &frame.null_values)?;

    data_df = match desired {
        Some(order) => data_df.select(order.iter().copied())?,
        None => restore_column_order(data_df)?,
    };

    let index_names: Vec<String> = index_series
        .iter()
        .map(|s| s.name().to_string())
        .collect();

    let mut df = if index_series.is_empty() {
        data_df
    } else {
        let mut cols: Vec<PlColumn> = index_series.into_iter().map(PlColumn::from).collect();
        cols.extend(data_df.take_columns());
        DataFrame::new(cols)?
    };

    if df.width() == 0 {
        df = DataFrame::empty();
    }

    let table = Table::new(df).with_index(index_names)?;
    Ok(table.with_labels(labels_from_proto(&frame.labels)?))
}

fn encode(series: &Series) -> Result<PbColumn> {
    let dtype = types::infer_series(series)?;
    column::encode_series(series, dtype)
}

fn decode_indices(frame: &Frame) -> Result<Vec<Series>> {
    let mut taken: HashSet<String> = frame.columns.iter().map(|c| c.name.clone()).collect();
    let mut out = Vec::with_capacity(frame.indices.len());

    for (level, col) in frame.indices.iter().enumerate() {
        let mut series = column::decode_column(col)?;
        if col.name.is_empty() {
            // Unnamed index level; generate a fallback that cannot shadow a
            // data column.
            let name = fallback_index_name(&taken, level);
            taken.insert(name.clone());
            series.rename(PlSmallStr::from(name.as_str()));
        } else {
            taken.insert(col.name.clone());
        }
        out.push(series);
    }

    Ok(out)
}

fn fallback_index_name(taken: &HashSet<String>, level: usize) -> String {
    let preferred = if level == 0 {
        "index".to_string()
    } else {
        format!("index_{level}")
    };
    if !taken.contains(&preferred) {
        return preferred;
    }
    (0..)
        .map(|i| format!("index_{level}_{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap()
}

fn check_row_count(indices: &[Series], columns: &[Series]) -> Result<usize> {
    let mut rows: Option<usize> = None;
    for series in indices.iter().chain(columns) {
        match rows {
            None => rows = Some(series.len()),
            Some(expected) if expected == series.len() => {}
            Some(expected) => {
                return Err(Error::Message(format!(
                    "column '{}' has {} rows, expected {}",
                    series.name(),
                    series.len(),
                    expected
                )))
            }
        }
    }
    Ok(rows.unwrap_or(0))
}

/// The position encoded in a synthetic `column_<i>` name. A suffix that is
/// not a representable position (empty, non-digit, or overflowing) makes
/// the name an ordinary string name, not a synthetic one.
fn synthetic_position(name: &str) -> Option<usize> {
    let rest = name.strip_prefix(SYNTHETIC_PREFIX)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse::<usize>().ok()
}

fn is_synthetic(name: &str) -> bool {
    synthetic_position(name).is_some()
}

fn rewrite_positional_names(df: &DataFrame) -> Result<DataFrame> {
    if df.width() == 0 {
        return Ok(df.clone());
    }

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let all_positional = names.iter().all(|n| n.parse::<usize>().is_ok());
    if all_positional {
        let mut renamed = Vec::with_capacity(df.width());
        for (i, col) in df.get_columns().iter().enumerate() {
            let mut series = col.as_materialized_series().clone();
            series.rename(PlSmallStr::from(format!("{SYNTHETIC_PREFIX}{i}")));
            renamed.push(PlColumn::from(series));
        }
        return Ok(DataFrame::new(renamed)?);
    }

    if let Some(collision) = names.iter().find(|n| is_synthetic(n)) {
        return Err(Error::Write(format!(
            "column name '{collision}' collides with the reserved positional scheme"
        )));
    }

    Ok(df.clone())
}

fn restore_column_order(df: DataFrame) -> Result<DataFrame> {
    if df.width() == 0 {
        return Ok(df);
    }

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    if names.iter().all(|n| is_synthetic(n)) {
        // Reverse the positional rewrite: column_<i> back to "<i>", in
        // positional order.
        let mut indexed: Vec<(usize, String)> = names
            .iter()
            .map(|n| {
                // is_synthetic gate above guarantees the parse.
                (synthetic_position(n).unwrap(), n.clone())
            })
            .collect();
        indexed.sort_unstable_by_key(|(i, _)| *i);

        let mut restored = Vec::with_capacity(indexed.len());
        for (i, name) in indexed {
            let mut series = df.column(&name)?.as_materialized_series().clone();
            series.rename(PlSmallStr::from(i.to_string()));
            restored.push(PlColumn::from(series));
        }
        return Ok(DataFrame::new(restored)?);
    }

    if names.iter().any(|n| is_synthetic(n)) {
        // Documented fallback: a partially synthetic layout cannot be
        // reconstructed, sort deterministically instead.
        let mut sorted = names.clone();
        sorted.sort_unstable();
        return Ok(df.select(sorted)?);
    }

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::proto::{column::Kind, DType};
    use crate::table::Scalar;
    use polars::prelude::*;
    use std::collections::BTreeMap;

    fn sample_labels() -> BTreeMap<String, Scalar> {
        let mut labels = BTreeMap::new();
        labels.insert("host".to_string(), Scalar::String("node-1".into()));
        labels.insert("run".to_string(), Scalar::Int(17));
        labels
    }

    #[test]
    fn round_trip_all_types_with_composite_index_and_labels() {
        let df = df!(
            "lvl_a" => &["x", "x", "y"],
            "lvl_b" => &[1i64, 2, 3],
            "b" => &[true, false, true],
            "f" => &[0.5f64, 1.5, 2.5],
            "s" => &["p", "q", "r"],
        )
        .unwrap();
        let ts = Series::new("t".into(), &[1i64, 2, 3])
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))
            .unwrap();
        let mut df = df;
        df.with_column(Column::from(ts)).unwrap();
        let gap = Series::new_null("gap".into(), 3);
        df.with_column(Column::from(gap)).unwrap();

        let table = Table::new(df)
            .with_index(["lvl_a", "lvl_b"])
            .unwrap()
            .with_labels(sample_labels());

        let frame = to_frame(&table).unwrap();
        assert_eq!(frame.indices.len(), 2);
        assert_eq!(frame.columns.len(), 5);
        assert_eq!(frame.labels.len(), 2);

        let decoded = from_frame(&frame).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn simple_index_round_trip() {
        let df = df!("ts" => &[10i64, 20], "v" => &[0.1f64, 0.2]).unwrap();
        let table = Table::new(df).with_index(["ts"]).unwrap();

        let frame = to_frame(&table).unwrap();
        assert_eq!(frame.indices.len(), 1);
        assert_eq!(frame.indices[0].name, "ts");
        assert_eq!(frame.columns.len(), 1);

        assert_eq!(from_frame(&frame).unwrap(), table);
    }

    #[test]
    fn default_index_encodes_no_indices() {
        let table = Table::new(df!("a" => &[1i64]).unwrap());
        let frame = to_frame(&table).unwrap();
        assert!(frame.indices.is_empty());
        assert_eq!(from_frame(&frame).unwrap(), table);
    }

    #[test]
    fn null_fidelity_across_columns() {
        let df = df!(
            "i" => &[Some(1i64), None, Some(3), None],
            "s" => &[None, Some("b"), None, Some("d")],
            "b" => &[Some(true), Some(false), None, None],
        )
        .unwrap();
        let table = Table::new(df);

        let frame = to_frame(&table).unwrap();
        assert_eq!(frame.null_values.len(), 4);

        let decoded = from_frame(&frame).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn no_nulls_means_no_null_map() {
        let frame = to_frame(&Table::new(df!("a" => &[1i64, 2]).unwrap())).unwrap();
        assert!(frame.null_values.is_empty());
    }

    #[test]
    fn positional_names_rewrite_and_restore() {
        let df = df!("0" => &[1i64, 2], "1" => &["a", "b"]).unwrap();
        let table = Table::new(df);

        let frame = to_frame(&table).unwrap();
        let names: Vec<&str> = frame.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["column_0", "column_1"]);

        assert_eq!(from_frame(&frame).unwrap(), table);
    }

    #[test]
    fn synthetic_name_collision_is_rejected() {
        let df = df!("column_3" => &[1i64], "other" => &[2i64]).unwrap();
        let err = to_frame(&Table::new(df)).unwrap_err();
        assert!(matches!(err, Error::Write(ref m) if m.contains("column_3")));
    }

    #[test]
    fn desired_order_wins_on_decode() {
        let table = Table::new(df!("a" => &[1i64], "b" => &[2i64]).unwrap());
        let frame = to_frame(&table).unwrap();

        let decoded = from_frame_with_columns(&frame, Some(&["b", "a"])).unwrap();
        let names: Vec<&str> = decoded
            .df()
            .get_column_names()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn mixed_synthetic_names_sort_lexicographically() {
        // Server-built frame that mixes a synthetic name with a plain one.
        let frame = Frame {
            columns: vec![
                PbColumn {
                    kind: Kind::Slice as i32,
                    name: "zeta".into(),
                    dtype: DType::Integer as i32,
                    ints: vec![1],
                    ..Default::default()
                },
                PbColumn {
                    kind: Kind::Slice as i32,
                    name: "column_0".into(),
                    dtype: DType::Integer as i32,
                    ints: vec![2],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let decoded = from_frame(&frame).unwrap();
        let names: Vec<&str> = decoded
            .df()
            .get_column_names()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(names, vec!["column_0", "zeta"]);
    }

    #[test]
    fn overflowing_positional_suffix_is_an_ordinary_name() {
        // Server-built frame whose only name matches the synthetic pattern
        // but encodes no representable position; it must decode as a plain
        // string name, not abort the positional restore.
        let frame = Frame {
            columns: vec![PbColumn {
                kind: Kind::Slice as i32,
                name: "column_99999999999999999999999999".into(),
                dtype: DType::Integer as i32,
                ints: vec![1],
                ..Default::default()
            }],
            ..Default::default()
        };

        let decoded = from_frame(&frame).unwrap();
        let names: Vec<&str> = decoded
            .df()
            .get_column_names()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(names, vec!["column_99999999999999999999999999"]);
    }

    #[test]
    fn unnamed_index_gets_fallback_name() {
        let frame = Frame {
            columns: vec![PbColumn {
                kind: Kind::Slice as i32,
                name: "v".into(),
                dtype: DType::Float as i32,
                floats: vec![1.0, 2.0],
                ..Default::default()
            }],
            indices: vec![PbColumn {
                kind: Kind::Slice as i32,
                name: String::new(),
                dtype: DType::Integer as i32,
                ints: vec![7, 8],
                ..Default::default()
            }],
            ..Default::default()
        };

        let decoded = from_frame(&frame).unwrap();
        assert_eq!(decoded.index_names(), &["index".to_string()]);
        assert!(decoded.df().column("index").is_ok());
    }

    #[test]
    fn mismatched_row_counts_fail() {
        let frame = Frame {
            columns: vec![
                PbColumn {
                    kind: Kind::Slice as i32,
                    name: "a".into(),
                    dtype: DType::Integer as i32,
                    ints: vec![1, 2],
                    ..Default::default()
                },
                PbColumn {
                    kind: Kind::Slice as i32,
                    name: "b".into(),
                    dtype: DType::Integer as i32,
                    ints: vec![1],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert!(matches!(
            from_frame(&frame).unwrap_err(),
            Error::Message(_)
        ));
    }

    #[test]
    fn empty_frame_decodes_to_empty_table() {
        let decoded = from_frame(&Frame::default()).unwrap();
        assert_eq!(decoded, Table::empty());
    }

    #[test]
    fn index_null_is_write_error() {
        let df = df!(
            "k" => &[Some(1i64), None],
            "v" => &[1.0f64, 2.0],
        )
        .unwrap();
        let table = Table::new(df).with_index(["k"]).unwrap();
        assert!(matches!(to_frame(&table).unwrap_err(), Error::Write(_)));
    }

    #[test]
    fn label_frame_column_decodes_against_index() {
        // Server-originated LABEL compression alongside a supplied index.
        let frame = Frame {
            columns: vec![crate::codec::column::label_column(
                "c",
                &Scalar::Int(7),
                5,
            )],
            indices: vec![PbColumn {
                kind: Kind::Slice as i32,
                name: "k".into(),
                dtype: DType::Integer as i32,
                ints: vec![10, 11, 12, 13, 14],
                ..Default::default()
            }],
            ..Default::default()
        };

        let decoded = from_frame(&frame).unwrap();
        assert_eq!(decoded.index_names(), &["k".to_string()]);
        assert!(decoded
            .df()
            .column("c")
            .unwrap()
            .as_materialized_series()
            .equals(&Series::new("c".into(), &[7i64, 7, 7, 7, 7])));
    }
}
