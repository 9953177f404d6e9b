use std::collections::HashMap;

use anyhow::Result;
use log::debug;

use crate::{
    data::{ComparableValue, Value, value_to_timestamp},
    table::Table,
};

/// Keeps one row per distinct key: the one with the latest timestamp.
///
/// Rows are stable-sorted ascending by `timestamp_column` with null (or
/// unparseable) timestamps first, and the last row seen for each key wins.
/// Ties therefore go to the later original row. Survivors are emitted in
/// that sorted order.
pub fn dedupe_keep_latest(
    table: &Table,
    key_columns: &[&str],
    timestamp_column: &str,
) -> Result<Table> {
    let key_indices = table.column_indices(key_columns, "dedupe")?;
    let timestamps = table.require(timestamp_column, "dedupe")?;

    let sort_keys: Vec<ComparableValue> = timestamps
        .values
        .iter()
        .map(|cell| ComparableValue(cell.as_ref().and_then(sortable_timestamp)))
        .collect();

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|a, b| sort_keys[*a].cmp(&sort_keys[*b]));

    let mut latest: HashMap<String, usize> = HashMap::with_capacity(order.len());
    for (position, &row) in order.iter().enumerate() {
        latest.insert(table.row_key(row, &key_indices), position);
    }

    let mut positions: Vec<usize> = latest.into_values().collect();
    positions.sort_unstable();
    let survivors: Vec<usize> = positions.into_iter().map(|p| order[p]).collect();

    debug!(
        "dedupe on {:?}: kept {} of {} row(s)",
        key_columns,
        survivors.len(),
        table.row_count()
    );
    Ok(table.take(&survivors))
}

fn sortable_timestamp(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(_) | Value::Float(_) => Some(value.clone()),
        other => value_to_timestamp(other).map(Value::DateTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn orders() -> Table {
        Table::from_columns(vec![
            Column::from_strings("order_id", [Some("A1"), Some("A1"), Some("A2"), Some("A2"), Some("A3")]),
            Column::from_strings("user_id", [Some("u1"), Some("u1"), Some("u2"), Some("u2"), Some("u3")]),
            Column::from_strings(
                "created_at",
                [
                    Some("2025-01-01T10:00:00Z"),
                    Some("2025-01-01T15:00:00Z"),
                    Some("2025-02-01T00:00:00Z"),
                    None,
                    Some("2025-03-01T00:00:00Z"),
                ],
            ),
            Column::from_strings(
                "status",
                [Some("paid"), Some("refunded"), Some("paid"), Some("pending"), Some("paid")],
            ),
        ])
        .unwrap()
    }

    fn status_for(table: &Table, order_id: &str) -> Option<String> {
        let ids = table.column("order_id").unwrap();
        let status = table.column("status").unwrap();
        (0..table.row_count())
            .find(|&row| ids.get(row) == Some(&Value::String(order_id.into())))
            .and_then(|row| status.get(row).map(Value::as_display))
    }

    #[test]
    fn keeps_latest_row_per_key() {
        let deduped = dedupe_keep_latest(&orders(), &["order_id", "user_id"], "created_at").unwrap();
        assert_eq!(deduped.row_count(), 3);
        assert_eq!(status_for(&deduped, "A1").as_deref(), Some("refunded"));
    }

    #[test]
    fn real_timestamp_beats_null_timestamp() {
        let deduped = dedupe_keep_latest(&orders(), &["order_id", "user_id"], "created_at").unwrap();
        assert_eq!(status_for(&deduped, "A2").as_deref(), Some("paid"));
    }

    #[test]
    fn ties_go_to_last_occurrence() {
        let table = Table::from_columns(vec![
            Column::from_strings("k", [Some("x"), Some("x")]),
            Column::from_strings("ts", [Some("2025-01-01"), Some("2025-01-01")]),
            Column::from_strings("v", [Some("first"), Some("second")]),
        ])
        .unwrap();
        let deduped = dedupe_keep_latest(&table, &["k"], "ts").unwrap();
        assert_eq!(deduped.row_count(), 1);
        assert_eq!(
            deduped.column("v").unwrap().get(0),
            Some(&Value::String("second".into()))
        );
    }

    #[test]
    fn dedupe_is_idempotent() {
        let once = dedupe_keep_latest(&orders(), &["order_id", "user_id"], "created_at").unwrap();
        let twice = dedupe_keep_latest(&once, &["order_id", "user_id"], "created_at").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_key_column_is_a_schema_error() {
        let err = dedupe_keep_latest(&orders(), &["order_id", "nope"], "created_at").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
