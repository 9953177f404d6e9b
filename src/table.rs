//! In-memory columnar table.
//!
//! A [`Table`] is a list of equally long [`Column`]s. Cells are
//! `Option<Value>`; `None` is null. Transforms never mutate their input in
//! place; they clone what they need and return a new table.

use std::collections::HashSet;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    data::{ColumnType, Value},
    error::PipelineError,
};

const KEY_SEPARATOR: &str = "\u{1f}";
const TYPE_SEPARATOR: char = '\u{1e}';
const NULL_KEY: &str = "\u{0}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            datatype,
            values,
        }
    }

    pub fn from_strings<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| v.map(|s| Value::String(s.into())))
            .collect();
        Self::new(name, ColumnType::String, values)
    }

    pub fn from_floats<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let values = values.into_iter().map(|v| v.map(Value::Float)).collect();
        Self::new(name, ColumnType::Float, values)
    }

    pub fn from_bools<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let values = values
            .into_iter()
            .map(|v| Some(Value::Boolean(v)))
            .collect();
        Self::new(name, ColumnType::Boolean, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row).and_then(|v| v.as_ref())
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Non-null cells as `f64`, skipping values with no numeric reading.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .flatten()
            .filter_map(Value::as_f64)
            .collect()
    }

    pub fn take(&self, rows: &[usize]) -> Column {
        let values = rows.iter().map(|&idx| self.values[idx].clone()).collect();
        Column::new(self.name.clone(), self.datatype, values)
    }

    /// Like [`Column::take`], but `None` positions produce null cells.
    pub fn take_optional(&self, rows: &[Option<usize>]) -> Column {
        let values = rows
            .iter()
            .map(|idx| idx.and_then(|i| self.values[i].clone()))
            .collect();
        Column::new(self.name.clone(), self.datatype, values)
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Column {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut table = Table::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column, failing with a schema error naming `context`.
    pub fn require(&self, name: &str, context: &str) -> Result<&Column, PipelineError> {
        self.column(name)
            .ok_or_else(|| PipelineError::missing_column(context, name))
    }

    /// Appends a new column; fails on name collisions or length mismatch.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        ensure!(
            !self.has_column(&column.name),
            "Column '{}' already exists",
            column.name
        );
        if self.columns.is_empty() {
            self.row_count = column.len();
        } else {
            ensure!(
                column.len() == self.row_count,
                "Column '{}' has {} value(s) but table has {} row(s)",
                column.name,
                column.len(),
                self.row_count
            );
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replaces a same-named column in place or appends a new one.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        match self.column_index(&column.name) {
            Some(idx) => {
                ensure!(
                    column.len() == self.row_count,
                    "Column '{}' has {} value(s) but table has {} row(s)",
                    column.name,
                    column.len(),
                    self.row_count
                );
                self.columns[idx] = column;
                Ok(())
            }
            None => self.push_column(column),
        }
    }

    pub fn with_column(mut self, column: Column) -> Result<Self> {
        self.set_column(column)?;
        Ok(self)
    }

    /// New table holding the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            row_count: rows.len(),
        }
    }

    pub fn head(&self, rows: usize) -> Table {
        let indices: Vec<usize> = (0..rows.min(self.row_count)).collect();
        self.take(&indices)
    }

    /// Display strings for one row; nulls render empty.
    pub fn row_strings(&self, row: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.get(row).map(Value::as_display).unwrap_or_default())
            .collect()
    }

    /// Hashable key for a row restricted to the given column positions.
    /// Each cell is tagged with its value type, so `1` and `"1"` differ.
    /// Nulls get a dedicated marker so they never equal an empty string.
    pub fn row_key(&self, row: usize, column_indices: &[usize]) -> String {
        column_indices
            .iter()
            .map(|&idx| match self.columns[idx].get(row) {
                Some(value) => format!(
                    "{}{TYPE_SEPARATOR}{}",
                    value.column_type().as_str(),
                    value.as_display()
                ),
                None => NULL_KEY.to_string(),
            })
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR)
    }

    pub fn column_indices(&self, names: &[&str], context: &str) -> Result<Vec<usize>, PipelineError> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name) {
                Some(idx) => indices.push(idx),
                None => missing.push((*name).to_string()),
            }
        }
        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(PipelineError::schema(context, missing))
        }
    }

    /// Count of rows whose key already appeared on an earlier row.
    pub fn duplicate_count(&self, column_indices: &[usize]) -> usize {
        let mut seen = HashSet::with_capacity(self.row_count);
        (0..self.row_count)
            .filter(|&row| !seen.insert(self.row_key(row, column_indices)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::from_strings("id", [Some("a"), Some("b"), Some("a")]),
            Column::from_floats("amount", [Some(1.0), None, Some(1.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn push_column_rejects_length_mismatch() {
        let mut table = sample();
        let err = table
            .push_column(Column::from_bools("flag", [true]))
            .unwrap_err();
        assert!(err.to_string().contains("has 1 value(s) but table has 3 row(s)"));
    }

    #[test]
    fn set_column_replaces_existing() {
        let mut table = sample();
        table
            .set_column(Column::from_floats("amount", [None, None, None]))
            .unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.column("amount").unwrap().null_count(), 3);
    }

    #[test]
    fn duplicate_count_treats_null_distinct_from_empty() {
        let table = Table::from_columns(vec![Column::from_strings(
            "v",
            [Some(""), None, None, Some("")],
        )])
        .unwrap();
        assert_eq!(table.duplicate_count(&[0]), 2);
    }

    #[test]
    fn full_row_duplicates_are_counted_after_first() {
        let table = sample();
        assert_eq!(table.duplicate_count(&[0, 1]), 1);
    }

    #[test]
    fn row_keys_keep_value_types_apart() {
        let table = Table::from_columns(vec![Column::new(
            "v",
            ColumnType::String,
            vec![
                Some(Value::Integer(1)),
                Some(Value::String("1".into())),
                Some(Value::Float(1.0)),
                Some(Value::Integer(1)),
            ],
        )])
        .unwrap();
        assert_ne!(table.row_key(0, &[0]), table.row_key(1, &[0]));
        assert_ne!(table.row_key(1, &[0]), table.row_key(2, &[0]));
        assert_eq!(table.row_key(0, &[0]), table.row_key(3, &[0]));
        assert_eq!(table.duplicate_count(&[0]), 1);
    }

    #[test]
    fn column_indices_reports_every_missing_name() {
        let table = sample();
        let err = table
            .column_indices(&["id", "x", "y"], "orders")
            .unwrap_err();
        assert_eq!(err, PipelineError::schema("orders", vec!["x".into(), "y".into()]));
    }
}
