//! Seeded bootstrap confidence interval for a difference of means, and the
//! refund-rate comparison built on it.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    config::BootstrapConfig,
    data::Value,
    error::PipelineError,
    table::{Column, Table},
    transform::outliers::quantile_sorted,
};

pub const DEFAULT_N_BOOT: usize = 2000;
pub const DEFAULT_SEED: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapResult {
    pub diff_mean: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl BootstrapResult {
    pub fn interpretation(&self) -> &'static str {
        if self.ci_low > 0.0 {
            "the interval lies above 0: group A has the higher mean"
        } else if self.ci_high < 0.0 {
            "the interval lies below 0: group B has the higher mean"
        } else {
            "the interval overlaps 0: no clear difference"
        }
    }
}

/// Non-null numeric readings of a column; booleans count as 0/1.
pub fn numeric_sample(column: &Column) -> Vec<f64> {
    column
        .values
        .iter()
        .flatten()
        .filter_map(Value::as_f64)
        .filter(|v| !v.is_nan())
        .collect()
}

/// Observed `mean(a) - mean(b)` with the 2.5/97.5 percentiles of `n_boot`
/// resampled differences. Both columns are read through [`numeric_sample`]
/// first, so nulls, NaN and non-numeric cells drop out; a column left empty
/// fails with `EmptyGroup` named after it. Each resample draws both groups
/// with replacement at their original sizes. A fixed seed gives identical
/// output.
pub fn bootstrap_diff_means(
    a: &Column,
    b: &Column,
    n_boot: usize,
    seed: u64,
) -> Result<BootstrapResult, PipelineError> {
    let sample_a = numeric_sample(a);
    let sample_b = numeric_sample(b);
    for (column, values) in [(a, &sample_a), (b, &sample_b)] {
        if values.is_empty() {
            return Err(PipelineError::EmptyGroup {
                group: column.name.clone(),
            });
        }
    }

    let diff_mean = mean(&sample_a) - mean(&sample_b);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut diffs: Vec<f64> = (0..n_boot)
        .map(|_| resample_mean(&sample_a, &mut rng) - resample_mean(&sample_b, &mut rng))
        .collect();
    diffs.sort_by(|x, y| x.total_cmp(y));

    Ok(BootstrapResult {
        diff_mean,
        ci_low: quantile_sorted(&diffs, 0.025).unwrap_or(diff_mean),
        ci_high: quantile_sorted(&diffs, 0.975).unwrap_or(diff_mean),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn resample_mean(values: &[f64], rng: &mut StdRng) -> f64 {
    let n = values.len();
    let total: f64 = (0..n).map(|_| values[rng.gen_range(0..n)]).sum();
    total / n as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundComparison {
    pub group_a: String,
    pub group_b: String,
    pub n_a: usize,
    pub n_b: usize,
    pub refund_rate_a: f64,
    pub refund_rate_b: f64,
    pub result: BootstrapResult,
}

/// Compares refund rates between two groups of the analytics table. A row is
/// a refund when `status_column` equals the configured refund status; null
/// statuses count as not refunded.
pub fn compare_refund_rates(
    table: &Table,
    status_column: &str,
    config: &BootstrapConfig,
) -> Result<RefundComparison, PipelineError> {
    table.column_indices(&[config.group_column.as_str(), status_column], "bootstrap")?;
    let groups = table.require(&config.group_column, "bootstrap")?;
    let statuses = table.require(status_column, "bootstrap")?;

    let refund_flags = |group: &str| -> Column {
        let flags = groups
            .values
            .iter()
            .zip(&statuses.values)
            .filter(|(g, _)| g.as_ref().and_then(Value::as_str) == Some(group))
            .map(|(_, status)| {
                status.as_ref().and_then(Value::as_str) == Some(config.refund_status.as_str())
            });
        Column::from_bools(group, flags)
    };
    let a = refund_flags(&config.group_a);
    let b = refund_flags(&config.group_b);

    let result = bootstrap_diff_means(&a, &b, config.n_boot, config.seed)?;
    Ok(RefundComparison {
        group_a: config.group_a.clone(),
        group_b: config.group_b.clone(),
        n_a: a.len(),
        n_b: b.len(),
        refund_rate_a: mean(&numeric_sample(&a)),
        refund_rate_b: mean(&numeric_sample(&b)),
        result,
    })
}
