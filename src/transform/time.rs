use anyhow::Result;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use log::debug;

use crate::{
    data::{ColumnType, Value, value_to_timestamp},
    table::{Column, Table},
};

pub const TIME_PART_COLUMNS: [&str; 5] = ["date", "year", "month", "dow", "hour"];

/// Parses `column` into timestamps. Unparseable cells become null. With `utc`
/// every value is shifted to the UTC offset; otherwise its own offset is kept.
pub fn parse_datetime(table: &Table, column: &str, utc: bool) -> Result<Table> {
    let source = table.require(column, "parse datetime")?;
    let parsed: Vec<Option<Value>> = source
        .values
        .iter()
        .map(|cell| {
            cell.as_ref()
                .and_then(value_to_timestamp)
                .map(|dt| if utc { to_utc(dt) } else { dt })
                .map(Value::DateTime)
        })
        .collect();
    let unparsed = parsed.iter().filter(|v| v.is_none()).count() - source.null_count();
    if unparsed > 0 {
        debug!("{unparsed} value(s) in '{column}' could not be parsed as timestamps");
    }
    table
        .clone()
        .with_column(Column::new(column, ColumnType::DateTime, parsed))
}

fn to_utc(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_timezone(&Utc).fixed_offset()
}

/// Derives `date`, `year`, `month` (`YYYY-MM`), `dow` (weekday name) and
/// `hour` from a timestamp column, in each value's own offset.
pub fn add_time_parts(table: &Table, column: &str) -> Result<Table> {
    let source = table.require(column, "time parts")?;
    let stamps: Vec<Option<DateTime<FixedOffset>>> = source
        .values
        .iter()
        .map(|cell| cell.as_ref().and_then(value_to_timestamp))
        .collect();

    let part = |name: &str, datatype: ColumnType, f: &dyn Fn(&DateTime<FixedOffset>) -> Value| {
        Column::new(
            name,
            datatype,
            stamps.iter().map(|dt| dt.as_ref().map(f)).collect(),
        )
    };

    let mut result = table.clone();
    result.set_column(part("date", ColumnType::Date, &|dt| {
        Value::Date(dt.date_naive())
    }))?;
    result.set_column(part("year", ColumnType::Integer, &|dt| {
        Value::Integer(i64::from(dt.year()))
    }))?;
    result.set_column(part("month", ColumnType::String, &|dt| {
        Value::String(dt.format("%Y-%m").to_string())
    }))?;
    result.set_column(part("dow", ColumnType::String, &|dt| {
        Value::String(dt.format("%A").to_string())
    }))?;
    result.set_column(part("hour", ColumnType::Integer, &|dt| {
        Value::Integer(i64::from(dt.hour()))
    }))?;
    Ok(result)
}
