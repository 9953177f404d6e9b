//! Declared column types and schema enforcement.
//!
//! A [`Schema`] lists the columns a raw table must carry and the semantic
//! type each should be coerced to. [`enforce_schema`] performs that coercion:
//! identifiers stay strings, numerics are parsed leniently, and anything that
//! fails to parse becomes null instead of aborting the run. Schemas may be
//! persisted as YAML via `serde_yaml`.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{
        ColumnType, Value, parse_boolean, parse_integer, parse_naive_date, value_to_timestamp,
    },
    table::{Column, Table},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: &str, datatype: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            datatype,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    /// Raw orders: identifiers as strings, nullable float amount, nullable
    /// integer quantity. `created_at` and `status` stay textual here.
    pub fn orders() -> Self {
        Self {
            columns: vec![
                ColumnMeta::new("order_id", ColumnType::String),
                ColumnMeta::new("user_id", ColumnType::String),
                ColumnMeta::new("amount", ColumnType::Float),
                ColumnMeta::new("quantity", ColumnType::Integer),
                ColumnMeta::new("created_at", ColumnType::String),
                ColumnMeta::new("status", ColumnType::String),
            ],
        }
    }

    pub fn users() -> Self {
        Self {
            columns: vec![
                ColumnMeta::new("user_id", ColumnType::String),
                ColumnMeta::new("country", ColumnType::String),
                ColumnMeta::new("signup_date", ColumnType::String),
            ],
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing schema YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }
}

/// Coerces every declared column to its declared type. Row count and column
/// set are unchanged; undeclared columns pass through.
pub fn enforce_schema(table: &Table, schema: &Schema, context: &str) -> Result<Table> {
    table.column_indices(&schema.column_names(), context)?;
    let mut enforced = table.clone();
    for meta in &schema.columns {
        let source = table.require(&meta.name, context)?;
        let coerced = coerce_column(source, meta.datatype);
        let lost = coerced.null_count().saturating_sub(source.null_count());
        if lost > 0 {
            debug!(
                "{context}: {lost} value(s) in '{}' could not be read as {} and became null",
                meta.name, meta.datatype
            );
        }
        enforced.set_column(coerced)?;
    }
    Ok(enforced)
}

pub fn coerce_column(column: &Column, target: ColumnType) -> Column {
    let values = column
        .values
        .iter()
        .map(|cell| cell.as_ref().and_then(|value| coerce_value(value, target)))
        .collect();
    Column::new(column.name.clone(), target, values)
}

pub fn coerce_value(value: &Value, target: ColumnType) -> Option<Value> {
    match target {
        ColumnType::String => Some(match value {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.as_display()),
        }),
        ColumnType::Float => match value {
            Value::Date(_) | Value::DateTime(_) => None,
            other => other.as_f64().map(Value::Float),
        },
        ColumnType::Integer => match value {
            Value::Integer(i) => Some(Value::Integer(*i)),
            Value::Boolean(b) => Some(Value::Integer(i64::from(*b))),
            Value::Float(f) => parse_integer(&f.to_string()).map(Value::Integer),
            Value::String(s) => parse_integer(s).map(Value::Integer),
            _ => None,
        },
        ColumnType::Boolean => match value {
            Value::Boolean(b) => Some(Value::Boolean(*b)),
            Value::Integer(i) => Some(Value::Boolean(*i != 0)),
            Value::String(s) => parse_boolean(s).map(Value::Boolean),
            _ => None,
        },
        ColumnType::Date => match value {
            Value::Date(d) => Some(Value::Date(*d)),
            Value::DateTime(dt) => Some(Value::Date(dt.date_naive())),
            Value::String(s) => parse_naive_date(s.trim())
                .or_else(|| value_to_timestamp(value).map(|dt| dt.date_naive()))
                .map(Value::Date),
            _ => None,
        },
        ColumnType::DateTime => value_to_timestamp(value).map(Value::DateTime),
    }
}
