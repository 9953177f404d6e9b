use orders_etl::{
    data::Value,
    table::{Column, Table},
    transform::outliers::{
        OutlierPolicy, add_outlier_flag, iqr_bounds, percentile_bounds, quantile,
        winsorize_percentiles,
    },
    validate::{assert_in_range, check_value_ranges},
};

#[test]
fn iqr_high_bound_sits_below_the_extreme() {
    let (_, hi) = iqr_bounds(&[1.0, 2.0, 3.0, 4.0, 100.0], 1.5).unwrap();
    assert!(hi < 100.0);
}

#[test]
fn quantile_matches_linear_interpolation() {
    let values = [10.0, 20.0, 30.0, 40.0, 50.0];
    assert_eq!(quantile(&values, 0.1), Some(14.0));
    assert_eq!(quantile(&[7.0], 0.9), Some(7.0));
}

#[test]
fn percentile_policy_flags_tails() {
    let values: Vec<Option<f64>> = (1..=20).map(|v| Some(f64::from(v))).collect();
    let table = Table::from_columns(vec![Column::from_floats("amount", values)]).unwrap();
    let policy = OutlierPolicy::Percentile {
        lower: 10.0,
        upper: 90.0,
    };
    let flagged = add_outlier_flag(&table, "amount", &policy).unwrap();
    let count = flagged
        .column("amount__is_outlier")
        .unwrap()
        .values
        .iter()
        .filter(|v| **v == Some(Value::Boolean(true)))
        .count();
    assert_eq!(count, 4);
    assert_eq!(percentile_bounds(&[], 5.0, 95.0), None);
}

#[test]
fn winsorize_at_percentiles_pulls_in_extremes() {
    let column = Column::from_floats("x", [Some(1.0), Some(2.0), Some(3.0), Some(1000.0), None]);
    let clipped = winsorize_percentiles(&column, 0.0, 75.0);
    assert_eq!(clipped.get(3), Some(&Value::Float(252.25)));
    assert_eq!(clipped.get(4), None);
}

#[test]
fn range_check_reports_column_and_bound() {
    let column = Column::from_floats("amount", [Some(1.0), Some(2.0), Some(-1.0)]);
    let err = assert_in_range(&column, Some(0.0), None).unwrap_err();
    assert_eq!(err.to_string(), "column 'amount' has values below 0");
    assert_eq!(check_value_ranges(&column, 0.0, 1.5), (1, 1));
}
