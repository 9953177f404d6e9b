use std::{borrow::Cow, collections::BTreeMap, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::{ColumnType, Value},
    table::Column,
};

/// Case-folding rule applied during text normalization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseFold {
    /// Full Unicode case folding (`"Straße"` folds to `"strasse"`).
    #[default]
    Full,
    /// Simple lowercase mapping.
    Lowercase,
}

fn whitespace_run() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Trims leading/trailing whitespace while borrowing the original.
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

pub fn fold_case(input: &str, rule: CaseFold) -> Cow<'_, str> {
    match rule {
        CaseFold::Lowercase => lowercase(input),
        CaseFold::Full => {
            let folded = caseless::default_case_fold_str(input);
            if folded == input {
                Cow::Borrowed(input)
            } else {
                Cow::Owned(folded)
            }
        }
    }
}

/// Collapses every run of whitespace into a single space.
pub fn collapse_whitespace(input: &str) -> Cow<'_, str> {
    let regex = whitespace_run();
    if regex.find_iter(input).any(|m| m.as_str() != " ") {
        Cow::Owned(regex.replace_all(input, " ").into_owned())
    } else {
        Cow::Borrowed(input)
    }
}

/// Trim, case-fold, then collapse internal whitespace.
pub fn normalize_str(input: &str, rule: CaseFold) -> String {
    let trimmed = trim(input);
    let folded = fold_case(trimmed.as_ref(), rule);
    collapse_whitespace(folded.as_ref()).into_owned()
}

/// Normalizes every non-null cell; nulls stay null. Output is a string column
/// with the same name.
pub fn normalize_text(values: &Column, rule: CaseFold) -> Column {
    let normalized = values
        .values
        .iter()
        .map(|cell| {
            cell.as_ref().map(|value| {
                let normalized = match value {
                    Value::String(s) => normalize_str(s, rule),
                    other => normalize_str(&other.as_display(), rule),
                };
                Value::String(normalized)
            })
        })
        .collect();
    Column::new(values.name.clone(), ColumnType::String, normalized)
}

/// Looks up each non-null value in `mapping`; unmapped values are kept as-is.
/// A hit on a non-string column turns the whole column into text, so the
/// result never mixes mapped strings with the old type.
pub fn apply_mapping(values: &Column, mapping: &BTreeMap<String, String>) -> Column {
    let hit = |value: &Value| mapping.get(&value.as_display());
    let retype = values.datatype != ColumnType::String
        && values.values.iter().flatten().any(|value| hit(value).is_some());
    let mapped = values
        .values
        .iter()
        .map(|cell| {
            cell.as_ref().map(|value| match hit(value) {
                Some(canonical) => Value::String(canonical.clone()),
                None if retype => Value::String(value.as_display()),
                None => value.clone(),
            })
        })
        .collect();
    let datatype = if retype {
        ColumnType::String
    } else {
        values.datatype
    };
    Column::new(values.name.clone(), datatype, mapped)
}
