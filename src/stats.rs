use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    data::Value,
    error::PipelineError,
    table::{Column, Table},
};

/// Running summary of a numeric column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
    sum_squares: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl ColumnStats {
    pub fn from_column(column: &Column) -> Self {
        let mut stats = Self::default();
        for value in column.numeric_values() {
            stats.add_value(value);
        }
        stats
    }

    pub fn add_value(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.sum += value;
        self.sum_squares += value * value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count() > 0).then(|| self.sum / self.count() as f64)
    }

    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sorted = self
            .values
            .iter()
            .copied()
            .sorted_by(|a, b| a.total_cmp(b))
            .collect_vec();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// Revenue totals for one group. `group` is `None` for rows whose group
/// value is null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: Option<String>,
    pub orders: usize,
    pub revenue: f64,
    pub avg_order: Option<f64>,
}

/// Order count, summed value and mean value per group, highest revenue first.
/// Null values are skipped by the sum and mean but still count as orders.
pub fn revenue_by_group(
    table: &Table,
    group_column: &str,
    value_column: &str,
) -> Result<Vec<GroupSummary>, PipelineError> {
    let groups = table.require(group_column, "revenue summary")?;
    let values = table.require(value_column, "revenue summary")?;

    let mut order: Vec<Option<String>> = Vec::new();
    let mut buckets: HashMap<Option<String>, (usize, ColumnStats)> = HashMap::new();
    for (group, value) in groups.values.iter().zip(&values.values) {
        let key = group.as_ref().map(Value::as_display);
        let entry = buckets.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, ColumnStats::default())
        });
        entry.0 += 1;
        if let Some(v) = value.as_ref().and_then(Value::as_f64) {
            entry.1.add_value(v);
        }
    }

    let mut summaries: Vec<GroupSummary> = order
        .into_iter()
        .filter_map(|key| {
            let (orders, stats) = buckets.remove(&key)?;
            Some(GroupSummary {
                group: key,
                orders,
                revenue: stats.sum(),
                avg_order: stats.mean(),
            })
        })
        .collect();
    summaries.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    Ok(summaries)
}

/// Headline numbers for the analytics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_orders: usize,
    pub distinct_users: usize,
    pub total_amount: f64,
    pub avg_amount: Option<f64>,
    pub median_amount: Option<f64>,
    pub outlier_count: usize,
    pub outlier_pct: f64,
    pub null_amounts: usize,
    pub null_user_ids: usize,
}

/// Headline numbers for the analytics table. Without an outlier flag column
/// the outlier count is 0.
pub fn analytics_summary(
    table: &Table,
    amount_column: &str,
    user_column: &str,
    outlier_column: Option<&str>,
) -> Result<AnalyticsSummary, PipelineError> {
    let mut required = vec![amount_column, user_column];
    required.extend(outlier_column);
    table.column_indices(&required, "analytics summary")?;
    let amount = table.require(amount_column, "analytics summary")?;
    let users = table.require(user_column, "analytics summary")?;

    let stats = ColumnStats::from_column(amount);
    let distinct_users = users
        .values
        .iter()
        .flatten()
        .map(Value::as_display)
        .collect::<HashSet<_>>()
        .len();
    let outlier_count = match outlier_column {
        Some(name) => table
            .require(name, "analytics summary")?
            .values
            .iter()
            .filter(|v| matches!(v, Some(Value::Boolean(true))))
            .count(),
        None => 0,
    };
    let total_orders = table.row_count();
    let outlier_pct = if total_orders == 0 {
        0.0
    } else {
        outlier_count as f64 / total_orders as f64 * 100.0
    };

    Ok(AnalyticsSummary {
        total_orders,
        distinct_users,
        total_amount: stats.sum(),
        avg_amount: stats.mean(),
        median_amount: stats.median(),
        outlier_count,
        outlier_pct,
        null_amounts: amount.null_count(),
        null_user_ids: users.null_count(),
    })
}

impl AnalyticsSummary {
    /// `metric,value` rows for display.
    pub fn render_rows(&self) -> Vec<Vec<String>> {
        let optional = |v: Option<f64>| v.map(format_number).unwrap_or_default();
        vec![
            vec!["total_orders".into(), self.total_orders.to_string()],
            vec!["distinct_users".into(), self.distinct_users.to_string()],
            vec!["total_amount".into(), format_number(self.total_amount)],
            vec!["avg_amount".into(), optional(self.avg_amount)],
            vec!["median_amount".into(), optional(self.median_amount)],
            vec!["outlier_count".into(), self.outlier_count.to_string()],
            vec!["outlier_pct".into(), format!("{:.1}%", self.outlier_pct)],
            vec!["null_amounts".into(), self.null_amounts.to_string()],
            vec!["null_user_ids".into(), self.null_user_ids.to_string()],
        ]
    }
}
