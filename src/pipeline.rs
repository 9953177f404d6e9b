//! Pipeline stages.
//!
//! Each stage is split into a pure table-to-table builder and a `run_*`
//! wrapper that reads inputs, calls the builder, and writes outputs. Every
//! output of a stage is computed before the first file is written, so a
//! failed check leaves that stage's outputs untouched.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info};

use crate::{
    bootstrap::{self, RefundComparison},
    config::{PipelineConfig, ProjectPaths},
    io_utils::{self, CsvReadOptions},
    join::{self, JoinValidation},
    quality::{self, QualityReport},
    report,
    schema::{self, Schema},
    stats::{self, AnalyticsSummary},
    table::Table,
    transform::{
        dedupe,
        outliers::{self, outlier_column_name},
        text, time,
    },
    validate,
};

pub const STATUS_NORM: &str = "status_norm";
pub const STATUS_CLEAN: &str = "status_clean";
pub const STATUS_COLUMN: &str = "status";
pub const JOIN_KEY: &str = "user_id";
pub const AMOUNT_COLUMN: &str = "amount";
pub const COUNTRY_COLUMN: &str = "country";
pub const CREATED_AT_COLUMN: &str = "created_at";
const SIGNUP_COLUMN: &str = "signup_date";

fn as_refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn orders_schema(config: &PipelineConfig) -> Result<Schema> {
    match &config.orders_schema {
        Some(path) => Schema::load(path),
        None => Ok(Schema::orders()),
    }
}

/// Schema enforcement, optional nulling of negative amounts, missing flags,
/// status normalization, dedupe, and the hard range checks, in that order.
pub fn clean_orders(raw: &Table, config: &PipelineConfig) -> Result<Table> {
    let orders_schema = orders_schema(config)?;
    validate::require_columns(raw, &orders_schema.column_names(), "orders")?;
    let mut typed = schema::enforce_schema(raw, &orders_schema, "orders")?;
    if config.null_negative_amounts {
        let amount = typed.require(AMOUNT_COLUMN, "orders")?;
        let cleaned = outliers::null_below(amount, 0.0);
        info!(
            "Nulled {} negative amount(s)",
            cleaned.null_count() - amount.null_count()
        );
        typed.set_column(cleaned)?;
    }

    let flagged = quality::add_missing_flags(&typed, &as_refs(&config.missing_flag_columns))?;

    let status = flagged.require(STATUS_COLUMN, "orders")?;
    let status_norm = text::normalize_text(status, config.case_fold).renamed(STATUS_NORM);
    let status_clean = text::apply_mapping(&status_norm, &config.status_mapping).renamed(STATUS_CLEAN);
    let normalized = flagged.with_column(status_norm)?.with_column(status_clean)?;

    let deduped = dedupe::dedupe_keep_latest(
        &normalized,
        &as_refs(&config.dedupe_keys),
        &config.dedupe_timestamp,
    )?;
    info!(
        "Deduplicated orders: {} -> {} row(s)",
        normalized.row_count(),
        deduped.row_count()
    );

    for column in [AMOUNT_COLUMN, "quantity"] {
        validate::assert_in_range(deduped.require(column, "orders")?, Some(0.0), None)?;
    }
    validate::assert_non_empty(&deduped, "orders_clean")?;
    Ok(deduped)
}

pub fn clean_users(raw: &Table) -> Result<Table> {
    let users_schema = Schema::users();
    validate::require_columns(raw, &users_schema.column_names(), "users")?;
    let typed = schema::enforce_schema(raw, &users_schema, "users")?;
    validate::assert_non_empty(&typed, "users")?;
    Ok(typed)
}

/// Time parts and outlier flags on orders, then the `m:1` join onto users.
pub fn build_analytics(orders: &Table, users: &Table, config: &PipelineConfig) -> Result<Table> {
    let orders = time::parse_datetime(orders, CREATED_AT_COLUMN, config.utc)?;
    let mut orders = time::add_time_parts(&orders, CREATED_AT_COLUMN)?;
    for column in &config.outlier_columns {
        let values = orders.require(column, "analytics")?.numeric_values();
        if let Some((lo, hi)) = config.outlier_policy.bounds(&values) {
            info!(
                "{} outlier bounds for '{column}': [{lo:.2}, {hi:.2}]",
                config.outlier_policy.describe()
            );
        }
        orders = outliers::add_outlier_flag(&orders, column, &config.outlier_policy)?;
    }

    let users = if users.has_column(SIGNUP_COLUMN) {
        time::parse_datetime(users, SIGNUP_COLUMN, config.utc)?
    } else {
        users.clone()
    };

    let analytics =
        join::safe_left_join(&orders, &users, &[JOIN_KEY], Some(JoinValidation::ManyToOne))?;
    validate::assert_non_empty(&analytics, "analytics table")?;
    Ok(analytics)
}

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub rows_before: usize,
    pub rows_after: usize,
    pub quality_before: QualityReport,
    pub quality_after: QualityReport,
    pub duplicate_keys_before: usize,
    pub duplicate_keys_after: usize,
}

fn read_raw(path: &Path, config: &PipelineConfig) -> Result<Table> {
    let tokens = config.null_token_refs();
    let options = CsvReadOptions::new(&tokens);
    io_utils::read_csv_table(path, &options)
}

pub fn run_clean(paths: &ProjectPaths, config: &PipelineConfig) -> Result<CleanOutcome> {
    info!("Reading raw data from {:?}", paths.raw);
    let raw_orders = read_raw(&paths.raw_orders(), config)?;
    let raw_users = read_raw(&paths.raw_users(), config)?;
    info!(
        "Rows: orders={}, users={}",
        raw_orders.row_count(),
        raw_users.row_count()
    );

    let typed_orders = schema::enforce_schema(&raw_orders, &orders_schema(config)?, "orders")?;
    let missingness = quality::missingness_report(&typed_orders);
    let quality_before = quality::quality_report(&typed_orders);
    let keys = as_refs(&config.dedupe_keys);
    let duplicate_keys_before = quality::duplicate_key_count(&typed_orders, &keys)?;

    let orders_clean = clean_orders(&raw_orders, config)?;
    let users_clean = clean_users(&raw_users)?;

    let quality_after = quality::quality_report(&orders_clean);
    let duplicate_keys_after = quality::duplicate_key_count(&orders_clean, &keys)?;
    let deltas = quality::compare_missingness(&typed_orders, &orders_clean);
    let markdown = report::render_missingness_markdown(
        typed_orders.row_count(),
        orders_clean.row_count(),
        &deltas,
        &Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    debug!("Duplicate keys: {duplicate_keys_before} before, {duplicate_keys_after} after");

    paths.ensure_output_dirs()?;
    write_table(&orders_clean, &paths.orders_clean())?;
    write_table(&users_clean, &paths.users_clean())?;
    report::write_missingness_csv(&missingness, &paths.reports.join("missingness_orders.csv"))?;
    report::write_text(&markdown, &paths.reports.join("missingness_orders.md"))?;
    report::write_quality_json(
        &quality_before,
        &quality_after,
        &paths.reports.join("quality_orders.json"),
    )?;
    info!(
        "Cleaning complete: {} -> {} order row(s) written to {:?}",
        typed_orders.row_count(),
        orders_clean.row_count(),
        paths.processed
    );

    Ok(CleanOutcome {
        rows_before: typed_orders.row_count(),
        rows_after: orders_clean.row_count(),
        quality_before,
        quality_after,
        duplicate_keys_before,
        duplicate_keys_after,
    })
}

/// Writes the binary table and its CSV mirror side by side.
fn write_table(table: &Table, path: &Path) -> Result<()> {
    io_utils::write_table_binary(table, path)?;
    io_utils::write_csv_table(table, &path.with_extension("csv"))
        .with_context(|| format!("Writing CSV mirror of {path:?}"))
}

pub fn run_analytics(paths: &ProjectPaths, config: &PipelineConfig) -> Result<AnalyticsSummary> {
    info!("Loading processed data from {:?}", paths.processed);
    let orders = io_utils::read_table_binary(&paths.orders_clean())?;
    let users = io_utils::read_table_binary(&paths.users_clean())?;

    let analytics = build_analytics(&orders, &users, config)?;
    let outlier_column = config
        .outlier_columns
        .iter()
        .any(|column| column == AMOUNT_COLUMN)
        .then(|| outlier_column_name(AMOUNT_COLUMN));
    let summary = stats::analytics_summary(
        &analytics,
        AMOUNT_COLUMN,
        JOIN_KEY,
        outlier_column.as_deref(),
    )?;
    let revenue = stats::revenue_by_group(&analytics, COUNTRY_COLUMN, AMOUNT_COLUMN)?;

    paths.ensure_output_dirs()?;
    write_table(&analytics, &paths.analytics_table())?;
    report::write_revenue_csv(&revenue, &paths.reports.join("revenue_by_country.csv"))?;
    info!(
        "Analytics table: {} row(s) x {} column(s) written to {:?}",
        analytics.row_count(),
        analytics.column_count(),
        paths.analytics_table()
    );
    Ok(summary)
}

pub fn run_bootstrap(paths: &ProjectPaths, config: &PipelineConfig) -> Result<RefundComparison> {
    let analytics = io_utils::read_table_binary(&paths.analytics_table())
        .context("Loading analytics table (run `analytics` first)")?;
    let comparison = bootstrap::compare_refund_rates(&analytics, STATUS_CLEAN, &config.bootstrap)?;
    info!(
        "Refund rate {} vs {}: diff {:.4}, 95% CI [{:.4}, {:.4}] ({})",
        comparison.group_a,
        comparison.group_b,
        comparison.result.diff_mean,
        comparison.result.ci_low,
        comparison.result.ci_high,
        comparison.result.interpretation()
    );
    Ok(comparison)
}
