//! Typed failure conditions for the cleaning and analytics pipeline.
//!
//! Every variant is fatal for the current run. Checks and lookups return
//! [`PipelineError`] directly. Table transforms return `anyhow::Result`
//! carrying it, so callers can `downcast_ref::<PipelineError>()` after
//! context has been attached.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// One or more required columns are absent.
    #[error("{context}: missing required column(s): {}", missing.join(", "))]
    Schema {
        context: String,
        missing: Vec<String>,
    },

    /// A table that must contain data has zero rows.
    #[error("{label} has 0 rows")]
    EmptyData { label: String },

    /// A numeric invariant was violated.
    #[error("column '{column}' has values {bound}")]
    Range { column: String, bound: String },

    /// Join keys do not satisfy the declared cardinality.
    #[error("merge validation '{validate}' failed: {side} keys are not unique (duplicate key '{key}')")]
    MergeValidation {
        validate: String,
        side: String,
        key: String,
    },

    /// A statistical comparison group has no usable values.
    #[error("group '{group}' is empty after cleaning")]
    EmptyGroup { group: String },
}

impl PipelineError {
    pub fn schema(context: impl Into<String>, missing: Vec<String>) -> Self {
        PipelineError::Schema {
            context: context.into(),
            missing,
        }
    }

    pub fn missing_column(context: impl Into<String>, column: &str) -> Self {
        PipelineError::schema(context, vec![column.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_lists_every_missing_column() {
        let err = PipelineError::schema("orders", vec!["amount".into(), "status".into()]);
        assert_eq!(
            err.to_string(),
            "orders: missing required column(s): amount, status"
        );
    }

    #[test]
    fn range_error_names_column_and_bound() {
        let err = PipelineError::Range {
            column: "amount".into(),
            bound: "below 0".into(),
        };
        assert_eq!(err.to_string(), "column 'amount' has values below 0");
    }
}
