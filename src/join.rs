use std::{collections::HashMap, fmt, str::FromStr};

use anyhow::{Result, anyhow, ensure};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::PipelineError,
    table::{Column, Table},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
    Right,
    Full,
}

/// Declared key cardinality, checked before any rows are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinValidation {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl JoinValidation {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinValidation::OneToOne => "1:1",
            JoinValidation::OneToMany => "1:m",
            JoinValidation::ManyToOne => "m:1",
            JoinValidation::ManyToMany => "m:m",
        }
    }

    fn left_unique(&self) -> bool {
        matches!(self, JoinValidation::OneToOne | JoinValidation::OneToMany)
    }

    fn right_unique(&self) -> bool {
        matches!(self, JoinValidation::OneToOne | JoinValidation::ManyToOne)
    }
}

impl fmt::Display for JoinValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinValidation {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1:1" | "one_to_one" => Ok(JoinValidation::OneToOne),
            "1:m" | "one_to_many" => Ok(JoinValidation::OneToMany),
            "m:1" | "many_to_one" => Ok(JoinValidation::ManyToOne),
            "m:m" | "many_to_many" => Ok(JoinValidation::ManyToMany),
            other => Err(anyhow!("Unknown join validation '{other}'")),
        }
    }
}

/// Left join on `on`, keeping every left row.
pub fn safe_left_join(
    left: &Table,
    right: &Table,
    on: &[&str],
    validate: Option<JoinValidation>,
) -> Result<Table> {
    safe_join(left, right, on, JoinKind::Left, validate)
}

/// Joins two tables on equally named key columns.
///
/// Left rows are emitted in left order, repeated once per matching right row
/// in right order. Unmatched right rows (for `Right`/`Full`) follow in right
/// order. Key columns appear once; other colliding names get `_x`/`_y`
/// suffixes. Rows with a null in any key column never match.
pub fn safe_join(
    left: &Table,
    right: &Table,
    on: &[&str],
    how: JoinKind,
    validate: Option<JoinValidation>,
) -> Result<Table> {
    ensure!(!on.is_empty(), "Join requires at least one key column");
    let left_keys = left.column_indices(on, "join (left)")?;
    let right_keys = right.column_indices(on, "join (right)")?;

    if let Some(validate) = validate {
        if validate.left_unique() {
            ensure_unique(left, &left_keys, validate, "left")?;
        }
        if validate.right_unique() {
            ensure_unique(right, &right_keys, validate, "right")?;
        }
    }

    let right_lookup = build_right_lookup(right, &right_keys);
    let include_unmatched_left = matches!(how, JoinKind::Left | JoinKind::Full);
    let include_unmatched_right = matches!(how, JoinKind::Right | JoinKind::Full);

    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::with_capacity(left.row_count());
    let mut right_matched = vec![false; right.row_count()];
    let mut matched_rows = 0usize;
    for row in 0..left.row_count() {
        let bucket = build_key(left, row, &left_keys).and_then(|key| right_lookup.get(&key));
        match bucket {
            Some(rows) => {
                for &right_row in rows {
                    right_matched[right_row] = true;
                    pairs.push((Some(row), Some(right_row)));
                    matched_rows += 1;
                }
            }
            None if include_unmatched_left => pairs.push((Some(row), None)),
            None => {}
        }
    }
    if include_unmatched_right {
        pairs.extend(
            right_matched
                .iter()
                .enumerate()
                .filter(|(_, matched)| !**matched)
                .map(|(row, _)| (None, Some(row))),
        );
    }

    let left_rows: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
    let right_rows: Vec<Option<usize>> = pairs.iter().map(|(_, r)| *r).collect();
    let columns = build_output_columns(left, right, on, &left_rows, &right_rows);
    let joined = Table::from_columns(columns)?;

    info!(
        "Join complete: {} output row(s), {} matched row(s)",
        joined.row_count(),
        matched_rows
    );
    Ok(joined)
}

fn ensure_unique(
    table: &Table,
    key_indices: &[usize],
    validate: JoinValidation,
    side: &str,
) -> Result<(), PipelineError> {
    let mut seen = HashMap::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let Some(key) = build_key(table, row, key_indices) else {
            continue;
        };
        if seen.insert(key, row).is_some() {
            return Err(PipelineError::MergeValidation {
                validate: validate.to_string(),
                side: side.to_string(),
                key: display_key(table, row, key_indices),
            });
        }
    }
    Ok(())
}

fn build_right_lookup(right: &Table, key_indices: &[usize]) -> HashMap<String, Vec<usize>> {
    let mut map: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..right.row_count() {
        if let Some(key) = build_key(right, row, key_indices) {
            map.entry(key).or_default().push(row);
        }
    }
    map
}

/// `None` when any key cell is null.
fn build_key(table: &Table, row: usize, key_indices: &[usize]) -> Option<String> {
    let columns = table.columns();
    key_indices
        .iter()
        .all(|&idx| columns[idx].get(row).is_some())
        .then(|| table.row_key(row, key_indices))
}

fn display_key(table: &Table, row: usize, key_indices: &[usize]) -> String {
    let columns = table.columns();
    key_indices
        .iter()
        .map(|&idx| {
            columns[idx]
                .get(row)
                .map(|v| v.as_display())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_output_columns(
    left: &Table,
    right: &Table,
    on: &[&str],
    left_rows: &[Option<usize>],
    right_rows: &[Option<usize>],
) -> Vec<Column> {
    let is_key = |name: &str| on.contains(&name);
    let collides_right = |name: &str| !is_key(name) && right.has_column(name);
    let collides_left = |name: &str| !is_key(name) && left.has_column(name);

    let mut columns = Vec::with_capacity(left.column_count() + right.column_count());
    for column in left.columns() {
        if is_key(&column.name) {
            columns.push(coalesce_key(column, right, left_rows, right_rows));
        } else if collides_right(&column.name) {
            let name = format!("{}_x", column.name);
            columns.push(column.take_optional(left_rows).renamed(name));
        } else {
            columns.push(column.take_optional(left_rows));
        }
    }
    for column in right.columns().iter().filter(|c| !is_key(&c.name)) {
        if collides_left(&column.name) {
            let name = format!("{}_y", column.name);
            columns.push(column.take_optional(right_rows).renamed(name));
        } else {
            columns.push(column.take_optional(right_rows));
        }
    }
    columns
}

/// Key values come from the left row, or from the right row when only the
/// right side is present.
fn coalesce_key(
    left_column: &Column,
    right: &Table,
    left_rows: &[Option<usize>],
    right_rows: &[Option<usize>],
) -> Column {
    let right_column = right.column(&left_column.name);
    let values = left_rows
        .iter()
        .zip(right_rows)
        .map(|(l, r)| match (l, r, right_column) {
            (Some(l), _, _) => left_column.values[*l].clone(),
            (None, Some(r), Some(right_column)) => right_column.values[*r].clone(),
            _ => None,
        })
        .collect();
    Column::new(left_column.name.clone(), left_column.datatype, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn orders() -> Table {
        Table::from_columns(vec![
            Column::from_strings("order_id", [Some("A1"), Some("A2"), Some("A3"), Some("A4")]),
            Column::from_strings("user_id", [Some("u1"), Some("u2"), Some("u9"), None]),
            Column::from_strings("note", [Some("o1"), Some("o2"), Some("o3"), Some("o4")]),
        ])
        .unwrap()
    }

    fn users() -> Table {
        Table::from_columns(vec![
            Column::from_strings("user_id", [Some("u1"), Some("u2"), Some("u3")]),
            Column::from_strings("country", [Some("SA"), Some("AE"), Some("KW")]),
            Column::from_strings("note", [Some("x"), Some("y"), Some("z")]),
        ])
        .unwrap()
    }

    #[test]
    fn left_join_keeps_left_rows_and_suffixes_collisions() {
        let joined = safe_left_join(&orders(), &users(), &["user_id"], Some(JoinValidation::ManyToOne))
            .unwrap();
        assert_eq!(joined.row_count(), 4);
        assert_eq!(
            joined.headers(),
            vec!["order_id", "user_id", "note_x", "country", "note_y"]
        );
        let country = joined.column("country").unwrap();
        assert_eq!(country.get(0), Some(&Value::String("SA".into())));
        assert_eq!(country.get(2), None);
        assert_eq!(country.get(3), None);
    }

    #[test]
    fn many_to_one_rejects_duplicate_right_keys() {
        let dup_users = Table::from_columns(vec![
            Column::from_strings("user_id", [Some("u1"), Some("u1")]),
            Column::from_strings("country", [Some("SA"), Some("AE")]),
        ])
        .unwrap();
        let err = safe_left_join(&orders(), &dup_users, &["user_id"], Some(JoinValidation::ManyToOne))
            .unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::MergeValidation { validate, side, key }) => {
                assert_eq!(validate, "m:1");
                assert_eq!(side, "right");
                assert_eq!(key, "u1");
            }
            other => panic!("expected merge validation error, got {other:?}"),
        }
    }

    #[test]
    fn full_join_appends_unmatched_right_rows_with_their_keys() {
        let joined = safe_join(&orders(), &users(), &["user_id"], JoinKind::Full, None).unwrap();
        assert_eq!(joined.row_count(), 5);
        let ids = joined.column("user_id").unwrap();
        assert_eq!(ids.get(4), Some(&Value::String("u3".into())));
        assert_eq!(joined.column("order_id").unwrap().get(4), None);
    }

    #[test]
    fn inner_join_drops_unmatched_and_null_keys() {
        let joined = safe_join(&orders(), &users(), &["user_id"], JoinKind::Inner, None).unwrap();
        assert_eq!(joined.row_count(), 2);
    }

    #[test]
    fn validation_strings_parse() {
        assert_eq!("m:1".parse::<JoinValidation>().unwrap(), JoinValidation::ManyToOne);
        assert!("2:3".parse::<JoinValidation>().is_err());
    }
}
