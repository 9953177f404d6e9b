//! Hard, run-aborting data checks.

use crate::{data::Value, error::PipelineError, table::Column, table::Table};

pub fn require_columns(table: &Table, names: &[&str], context: &str) -> Result<(), PipelineError> {
    table.column_indices(names, context).map(|_| ())
}

pub fn assert_non_empty(table: &Table, label: &str) -> Result<(), PipelineError> {
    if table.is_empty() {
        return Err(PipelineError::EmptyData {
            label: label.to_string(),
        });
    }
    Ok(())
}

/// Fails when any non-null value falls outside the optional bounds. Values
/// without a numeric reading violate the range as well.
pub fn assert_in_range(
    values: &Column,
    lo: Option<f64>,
    hi: Option<f64>,
) -> Result<(), PipelineError> {
    let range_error = |bound: String| PipelineError::Range {
        column: values.name.clone(),
        bound,
    };
    for value in values.values.iter().flatten() {
        let Some(number) = numeric(value) else {
            return Err(range_error(format!(
                "that are not numeric ('{}')",
                value.as_display()
            )));
        };
        if let Some(lo) = lo
            && number < lo
        {
            return Err(range_error(format!("below {}", format_bound(lo))));
        }
        if let Some(hi) = hi
            && number > hi
        {
            return Err(range_error(format!("above {}", format_bound(hi))));
        }
    }
    Ok(())
}

/// Counts of non-null values below `min` and above `max`.
pub fn check_value_ranges(values: &Column, min: f64, max: f64) -> (usize, usize) {
    values
        .values
        .iter()
        .flatten()
        .filter_map(numeric)
        .fold((0, 0), |(below, above), v| {
            (below + usize::from(v < min), above + usize::from(v > max))
        })
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Boolean(_) => None,
        other => other.as_f64().filter(|v| !v.is_nan()),
    }
}

fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_error_names_the_lower_bound() {
        let column = Column::from_floats("quantity", [Some(1.0), Some(2.0), Some(-1.0)]);
        let err = assert_in_range(&column, Some(0.0), None).unwrap_err();
        assert!(err.to_string().contains("below 0"), "{err}");
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn range_check_ignores_nulls_and_accepts_bounds() {
        let column = Column::from_floats("q", [Some(0.0), None, Some(10.0)]);
        assert!(assert_in_range(&column, Some(0.0), Some(10.0)).is_ok());
        let err = assert_in_range(&column, None, Some(5.0)).unwrap_err();
        assert!(err.to_string().contains("above 5"));
    }

    #[test]
    fn non_numeric_values_violate_the_range() {
        let column = Column::from_strings("q", [Some("3"), Some("lots")]);
        let err = assert_in_range(&column, Some(0.0), None).unwrap_err();
        assert!(matches!(err, PipelineError::Range { .. }));
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = assert_non_empty(&Table::new(), "analytics").unwrap_err();
        assert_eq!(err.to_string(), "analytics has 0 rows");
    }

    #[test]
    fn value_range_counts() {
        let column = Column::from_floats("x", [Some(-1.0), Some(5.0), None, Some(11.0), Some(12.0)]);
        assert_eq!(check_value_ranges(&column, 0.0, 10.0), (1, 2));
    }
}
