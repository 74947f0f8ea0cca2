//! Name-addressable result rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Value;

/// One row of a query result, keyed by column name.
///
/// Column names are shared between all records of a page.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// Builds a record from column names and values aligned by position.
    ///
    /// Returns `None` when the lengths differ.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Option<Self> {
        (columns.len() == values.len()).then_some(Self { columns, values })
    }

    /// Convenience constructor from `(name, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a value by case-insensitive column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self
            .columns
            .iter()
            .position(|col| col.eq_ignore_ascii_case(name))?;
        self.values.get(idx)
    }

    /// Returns a numeric value by column name, widening integers.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name)?.as_timestamp()
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
