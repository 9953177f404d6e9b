//! Read-only data quality accounting: null counts, duplicate counts, and
//! before/after comparisons. [`add_missing_flags`] is the one operation here
//! that produces a new table.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::{
    error::PipelineError,
    table::{Column, Table},
};

pub const MISSING_SUFFIX: &str = "__isna";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingnessEntry {
    pub column: String,
    pub n_missing: usize,
    pub p_missing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub null_counts: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
    pub column_types: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingnessDelta {
    pub column: String,
    pub before: usize,
    pub after: usize,
    pub reduced: usize,
    pub improvement_pct: f64,
}

/// Null count and fraction for every column, highest fraction first. Columns
/// with equal fractions keep table order.
pub fn missingness_report(table: &Table) -> Vec<MissingnessEntry> {
    let rows = table.row_count();
    let mut entries: Vec<MissingnessEntry> = table
        .columns()
        .iter()
        .map(|column| {
            let n_missing = column.null_count();
            MissingnessEntry {
                column: column.name.clone(),
                n_missing,
                p_missing: fraction(n_missing, rows),
            }
        })
        .collect();
    entries.sort_by(|a, b| b.p_missing.total_cmp(&a.p_missing));
    entries
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub fn quality_report(table: &Table) -> QualityReport {
    let all_columns: Vec<usize> = (0..table.column_count()).collect();
    QualityReport {
        total_rows: table.row_count(),
        total_columns: table.column_count(),
        null_counts: table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.null_count()))
            .collect(),
        duplicate_rows: table.duplicate_count(&all_columns),
        column_types: table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.datatype.to_string()))
            .collect(),
    }
}

/// Rows whose key tuple already appeared on an earlier row.
pub fn duplicate_key_count(table: &Table, keys: &[&str]) -> Result<usize, PipelineError> {
    let indices = table.column_indices(keys, "duplicate check")?;
    Ok(table.duplicate_count(&indices))
}

/// Per-column null counts before and after cleaning, in `before`'s column
/// order. Columns dropped by cleaning count as fully resolved.
pub fn compare_missingness(before: &Table, after: &Table) -> Vec<MissingnessDelta> {
    before
        .columns()
        .iter()
        .map(|column| {
            let before_count = column.null_count();
            let after_count = after.column(&column.name).map_or(0, Column::null_count);
            let reduced = before_count.saturating_sub(after_count);
            let improvement_pct = if before_count == 0 {
                0.0
            } else {
                (before_count as f64 - after_count as f64) / before_count as f64 * 100.0
            };
            MissingnessDelta {
                column: column.name.clone(),
                before: before_count,
                after: after_count,
                reduced,
                improvement_pct,
            }
        })
        .collect()
}

pub fn missing_flag_name(column: &str) -> String {
    format!("{column}{MISSING_SUFFIX}")
}

/// Adds a `<col>__isna` boolean column for each named column.
pub fn add_missing_flags(table: &Table, columns: &[&str]) -> Result<Table> {
    table.column_indices(columns, "missing flags")?;
    let mut flagged = table.clone();
    for name in columns {
        let source = table.require(name, "missing flags")?;
        let flags = source.values.iter().map(Option::is_none);
        flagged.set_column(Column::from_bools(missing_flag_name(name), flags))?;
    }
    Ok(flagged)
}
