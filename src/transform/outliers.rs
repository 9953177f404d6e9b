//! Quantile-based outlier bounds and flagging.
//!
//! Two strategies share one shape: given the non-null values of a column they
//! produce `(lo, hi)` bounds. [`OutlierPolicy`] selects between them from
//! configuration, so the flagging code never needs to know which one ran.

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    data::{ColumnType, Value},
    table::{Column, Table},
};

pub const DEFAULT_IQR_K: f64 = 1.5;
pub const OUTLIER_SUFFIX: &str = "__is_outlier";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// Tukey fences: `q1 - k*iqr`, `q3 + k*iqr`.
    Iqr { k: f64 },
    /// Fixed percentiles on a 0-100 scale, e.g. 5th/95th.
    Percentile { lower: f64, upper: f64 },
}

impl Default for OutlierPolicy {
    fn default() -> Self {
        OutlierPolicy::Iqr { k: DEFAULT_IQR_K }
    }
}

impl OutlierPolicy {
    /// Bounds for `values`; `None` when there is nothing to measure.
    pub fn bounds(&self, values: &[f64]) -> Option<(f64, f64)> {
        match *self {
            OutlierPolicy::Iqr { k } => iqr_bounds(values, k),
            OutlierPolicy::Percentile { lower, upper } => percentile_bounds(values, lower, upper),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OutlierPolicy::Iqr { k } => format!("iqr(k={k})"),
            OutlierPolicy::Percentile { lower, upper } => format!("percentile({lower}..{upper})"),
        }
    }
}

/// Linear-interpolated quantile, `q` in `[0, 1]`. NaN inputs are ignored.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let sorted = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .sorted_by(|a, b| a.total_cmp(b))
        .collect_vec();
    quantile_sorted(&sorted, q)
}

pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;
    let weight = h - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn iqr_bounds(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - k * iqr, q3 + k * iqr))
}

/// Bounds at the given percentiles (0-100 scale).
pub fn percentile_bounds(values: &[f64], lower_pct: f64, upper_pct: f64) -> Option<(f64, f64)> {
    let lo = quantile(values, lower_pct / 100.0)?;
    let hi = quantile(values, upper_pct / 100.0)?;
    Some((lo, hi))
}

pub fn outlier_column_name(column: &str) -> String {
    format!("{column}{OUTLIER_SUFFIX}")
}

/// Adds `<column>__is_outlier`, true where the value lies strictly outside
/// the policy bounds. Nulls and non-numeric cells are never flagged.
pub fn add_outlier_flag(table: &Table, column: &str, policy: &OutlierPolicy) -> Result<Table> {
    let source = table.require(column, "outlier flag")?;
    let bounds = policy.bounds(&source.numeric_values());
    let flags = source.values.iter().map(|cell| match (cell, bounds) {
        (Some(value), Some((lo, hi))) => value.as_f64().is_some_and(|v| v < lo || v > hi),
        _ => false,
    });
    table
        .clone()
        .with_column(Column::from_bools(outlier_column_name(column), flags))
}

/// Clips every non-null numeric value into `[lo, hi]`. Nulls stay null and
/// the result is a float column.
pub fn winsorize(values: &Column, lo: f64, hi: f64) -> Column {
    let clipped = values
        .values
        .iter()
        .map(|cell| {
            cell.as_ref()
                .and_then(Value::as_f64)
                .map(|v| Value::Float(v.clamp(lo.min(hi), hi.max(lo))))
        })
        .collect();
    Column::new(values.name.clone(), ColumnType::Float, clipped)
}

/// Nulls every value whose numeric reading is below `lo`. The column keeps its
/// type; non-numeric cells are left for the range checks to reject.
pub fn null_below(values: &Column, lo: f64) -> Column {
    let kept = values
        .values
        .iter()
        .map(|cell| cell.clone().filter(|v| !v.as_f64().is_some_and(|n| n < lo)))
        .collect();
    Column::new(values.name.clone(), values.datatype, kept)
}

/// Winsorizes a column at its own percentile bounds.
pub fn winsorize_percentiles(values: &Column, lower_pct: f64, upper_pct: f64) -> Column {
    match percentile_bounds(&values.numeric_values(), lower_pct, upper_pct) {
        Some((lo, hi)) => winsorize(values, lo, hi),
        None => values.clone(),
    }
}
