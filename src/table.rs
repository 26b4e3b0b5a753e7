//! The host-side tabular container.
//!
//! Polars supplies the columnar storage; [`Table`] adds the two concepts a
//! frames store needs on top of it: designated row-index columns (zero, one
//! or several levels) and a table-level label map of constant scalars.

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::client::proto::{value, DType, Value};
use crate::error::{Error, Result};

/// A single scalar value, as carried in frame labels and table attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// An instant, as epoch nanoseconds in UTC.
    Time(i64),
}

impl Scalar {
    /// The wire type this scalar encodes to.
    pub fn wire_type(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Boolean,
            Scalar::Int(_) => DType::Integer,
            Scalar::Float(_) => DType::Float,
            Scalar::String(_) => DType::String,
            Scalar::Time(_) => DType::Time,
        }
    }

    /// Human-readable class name, used in type errors.
    pub fn class_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::String(_) => "string",
            Scalar::Time(_) => "time",
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        let value = match self {
            Scalar::Bool(v) => value::Value::Bval(*v),
            Scalar::Int(v) => value::Value::Ival(*v),
            Scalar::Float(v) => value::Value::Fval(*v),
            Scalar::String(v) => value::Value::Sval(v.clone()),
            Scalar::Time(v) => value::Value::Tval(*v),
        };
        Value { value: Some(value) }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Scalar> {
        match &value.value {
            Some(value::Value::Bval(v)) => Ok(Scalar::Bool(*v)),
            Some(value::Value::Ival(v)) => Ok(Scalar::Int(*v)),
            Some(value::Value::Fval(v)) => Ok(Scalar::Float(*v)),
            Some(value::Value::Sval(v)) => Ok(Scalar::String(v.clone())),
            Some(value::Value::Tval(v)) => Ok(Scalar::Time(*v)),
            None => Err(Error::Message("empty value message".into())),
        }
    }
}

pub(crate) fn labels_to_proto(labels: &BTreeMap<String, Scalar>) -> std::collections::HashMap<String, Value> {
    labels
        .iter()
        .map(|(k, v)| (k.clone(), v.to_value()))
        .collect()
}

pub(crate) fn labels_from_proto(
    labels: &std::collections::HashMap<String, Value>,
) -> Result<BTreeMap<String, Scalar>> {
    let mut out = BTreeMap::new();
    for (k, v) in labels {
        out.insert(k.clone(), Scalar::from_value(v)?);
    }
    Ok(out)
}

/// A DataFrame with optional index columns and label metadata.
///
/// `index_names` designates which columns of `df` act as the row index:
/// empty means the default positional index, one name a simple index, more
/// than one a composite index. Index columns take part in row order exactly
/// like data columns.
#[derive(Debug, Clone)]
pub struct Table {
    df: DataFrame,
    index_names: Vec<String>,
    labels: BTreeMap<String, Scalar>,
}

impl Table {
    /// A table over `df` with the default positional index and no labels.
    pub fn new(df: DataFrame) -> Self {
        Table {
            df,
            index_names: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    /// An empty but valid table.
    pub fn empty() -> Self {
        Table::new(DataFrame::empty())
    }

    /// Designate index columns, in level order. Every name must be a column
    /// of the underlying DataFrame.
    pub fn with_index<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            if self.df.column(name).is_err() {
                return Err(Error::Write(format!("index column '{name}' not found")));
            }
        }
        self.index_names = names;
        Ok(self)
    }

    /// Attach label metadata.
    pub fn with_labels(mut self, labels: BTreeMap<String, Scalar>) -> Self {
        self.labels = labels;
        self
    }

    /// Build a table from row maps, inferring each column's type from its
    /// first non-null value. Missing keys count as nulls. Column order is
    /// first-seen order across rows.
    pub fn from_rows(
        rows: &[BTreeMap<String, Scalar>],
        index_names: &[&str],
        labels: BTreeMap<String, Scalar>,
    ) -> Result<Self> {
        let mut order: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !order.iter().any(|name| name == key) {
                    order.push(key.clone());
                }
            }
        }

        let mut columns = Vec::with_capacity(order.len());
        for name in &order {
            let values: Vec<Option<Scalar>> =
                rows.iter().map(|row| row.get(name).cloned()).collect();
            let series = crate::codec::column::series_from_scalars(name, &values)?;
            columns.push(Column::from(series));
        }

        let df = DataFrame::new(columns)?;
        Table::new(df)
            .with_index(index_names.iter().copied())
            .map(|t| t.with_labels(labels))
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    pub fn labels(&self) -> &BTreeMap<String, Scalar> {
        &self.labels
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Concatenate decoded chunks back into one table, in order. Index names
    /// and labels are taken from the first chunk; every chunk must share the
    /// first chunk's column layout.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Result<Table> {
        let mut iter = tables.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::Message("cannot concat zero tables".into()))?;

        let mut df = first.df;
        for table in iter {
            df.vstack_mut(&table.df)?;
        }

        Ok(Table {
            df,
            index_names: first.index_names,
            labels: first.labels,
        })
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.index_names == other.index_names
            && self.labels == other.labels
            && self.df.equals_missing(&other.df)
    }
}
