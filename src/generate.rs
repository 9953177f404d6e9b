//! Seeded generator for messy raw order/user CSVs.
//!
//! Orders get mixed-case statuses, a block of conflicting duplicates (same
//! `order_id`/`user_id`, five hours later, status `refunded`), and roughly
//! 10% nulls in each of `amount`, `quantity`, `created_at`, and `status`.

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    config::ProjectPaths,
    io_utils,
    table::{Column, Table},
};

pub const COUNTRIES: [&str; 4] = ["SA", "AE", "KW", "QA"];
pub const STATUSES: [&str; 7] = ["Paid", "paid", "PAID", "Refunded", "refund", "refunded", "Pending"];
pub const DUPLICATE_FRACTION: f64 = 0.05;
pub const NULL_FRACTION: f64 = 0.10;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub users: usize,
    pub orders: usize,
    pub seed: u64,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            users: 1000,
            orders: 5000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedData {
    pub users: Table,
    pub orders: Table,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
struct OrderRow {
    order_id: String,
    user_id: String,
    amount: Option<String>,
    quantity: Option<String>,
    created_at: Option<NaiveDateTime>,
    status: Option<String>,
}

fn range_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn range_end() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 12, 22)
        .and_then(|d| d.and_hms_opt(23, 59, 0))
        .unwrap_or_default()
}

pub fn generate(options: &GeneratorOptions) -> Result<GeneratedData> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let users = generate_users(options.users, &mut rng)?;
    let user_ids: Vec<String> = (1..=options.users.max(1)).map(|i| format!("{i:04}")).collect();

    let start = range_start();
    let minutes = (range_end() - start).num_minutes();
    let mut rows: Vec<OrderRow> = (1..=options.orders)
        .map(|i| OrderRow {
            order_id: format!("A{i:04}"),
            user_id: user_ids[rng.gen_range(0..user_ids.len())].clone(),
            amount: Some(round2(rng.gen_range(5.0..500.0)).to_string()),
            quantity: Some(rng.gen_range(1..10).to_string()),
            created_at: Some(start + Duration::minutes(rng.gen_range(0..=minutes))),
            status: Some(STATUSES[rng.gen_range(0..STATUSES.len())].to_string()),
        })
        .collect();

    let duplicates = (options.orders as f64 * DUPLICATE_FRACTION) as usize;
    let dupes: Vec<OrderRow> = rows
        .iter()
        .take(duplicates)
        .map(|row| OrderRow {
            created_at: row.created_at.map(|ts| ts + Duration::hours(5)),
            status: Some("refunded".to_string()),
            ..row.clone()
        })
        .collect();
    rows.extend(dupes);
    rows.shuffle(&mut rng);

    for row in &mut rows {
        if rng.gen_bool(NULL_FRACTION) {
            row.amount = None;
        }
        if rng.gen_bool(NULL_FRACTION) {
            row.quantity = None;
        }
        if rng.gen_bool(NULL_FRACTION) {
            row.created_at = None;
        }
        if rng.gen_bool(NULL_FRACTION) {
            row.status = None;
        }
    }

    let orders = Table::from_columns(vec![
        Column::from_strings("order_id", rows.iter().map(|r| Some(r.order_id.clone()))),
        Column::from_strings("user_id", rows.iter().map(|r| Some(r.user_id.clone()))),
        Column::from_strings("amount", rows.iter().map(|r| r.amount.clone())),
        Column::from_strings("quantity", rows.iter().map(|r| r.quantity.clone())),
        Column::from_strings(
            "created_at",
            rows.iter()
                .map(|r| r.created_at.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())),
        ),
        Column::from_strings("status", rows.iter().map(|r| r.status.clone())),
    ])?;

    Ok(GeneratedData {
        users,
        orders,
        duplicates,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Users `0001..` with random countries and signup dates spread evenly over
/// the year.
fn generate_users(count: usize, rng: &mut StdRng) -> Result<Table> {
    let start = range_start().date();
    let span_days = (range_end().date() - start).num_days();
    let signup = |i: usize| {
        let offset = if count > 1 {
            span_days * i as i64 / (count as i64 - 1)
        } else {
            0
        };
        (start + Duration::days(offset)).format("%Y-%m-%d").to_string()
    };
    Table::from_columns(vec![
        Column::from_strings("user_id", (1..=count).map(|i| Some(format!("{i:04}")))),
        Column::from_strings(
            "country",
            (0..count).map(|_| Some(COUNTRIES[rng.gen_range(0..COUNTRIES.len())])),
        ),
        Column::from_strings("signup_date", (0..count).map(|i| Some(signup(i)))),
    ])
}

/// Generates and writes `data/raw/{users,orders}.csv`.
pub fn write_raw(paths: &ProjectPaths, options: &GeneratorOptions) -> Result<GeneratedData> {
    let data = generate(options)?;
    std::fs::create_dir_all(&paths.raw)?;
    io_utils::write_csv_table(&data.users, &paths.raw_users())?;
    io_utils::write_csv_table(&data.orders, &paths.raw_orders())?;
    info!(
        "Generated {} user(s) and {} order row(s) ({} injected duplicate(s)) in {:?}",
        data.users.row_count(),
        data.orders.row_count(),
        data.duplicates,
        paths.raw
    );
    Ok(data)
}
