use orders_etl::{
    data::{ColumnType, Value},
    error::PipelineError,
    join::{JoinKind, JoinValidation, safe_join, safe_left_join},
    table::{Column, Table},
};

fn left() -> Table {
    Table::from_columns(vec![
        Column::from_strings("user_id", [Some("u1"), Some("u1"), Some("u2")]),
        Column::from_strings("order_id", [Some("A1"), Some("A2"), Some("A3")]),
    ])
    .unwrap()
}

fn right() -> Table {
    Table::from_columns(vec![
        Column::from_strings("user_id", [Some("u2"), Some("u1"), Some("u3")]),
        Column::from_strings("country", [Some("AE"), Some("SA"), Some("QA")]),
    ])
    .unwrap()
}

fn merge_error(err: anyhow::Error) -> PipelineError {
    err.downcast_ref::<PipelineError>()
        .cloned()
        .expect("pipeline error")
}

#[test]
fn one_to_many_rejects_duplicate_left_keys() {
    let err = safe_left_join(&left(), &right(), &["user_id"], Some(JoinValidation::OneToMany))
        .unwrap_err();
    assert_eq!(
        merge_error(err),
        PipelineError::MergeValidation {
            validate: "1:m".into(),
            side: "left".into(),
            key: "u1".into(),
        }
    );
}

#[test]
fn many_to_one_accepts_unique_right_keys() {
    let joined =
        safe_left_join(&left(), &right(), &["user_id"], Some(JoinValidation::ManyToOne)).unwrap();
    assert_eq!(joined.row_count(), 3);
    let country = joined.column("country").unwrap();
    assert_eq!(country.get(0), Some(&Value::String("SA".into())));
    assert_eq!(country.get(2), Some(&Value::String("AE".into())));
}

#[test]
fn right_join_keeps_every_right_row() {
    let joined = safe_join(&left(), &right(), &["user_id"], JoinKind::Right, None).unwrap();
    assert_eq!(joined.row_count(), 4);
    let ids = joined.column("user_id").unwrap();
    assert_eq!(ids.get(3), Some(&Value::String("u3".into())));
    assert_eq!(joined.column("order_id").unwrap().get(3), None);
}

#[test]
fn missing_key_column_is_reported_per_side() {
    let err = safe_left_join(&left(), &right(), &["order_id"], None).unwrap_err();
    match merge_error(err) {
        PipelineError::Schema { context, missing } => {
            assert_eq!(context, "join (right)");
            assert_eq!(missing, vec!["order_id".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn multi_column_keys_match_on_every_part() {
    let l = Table::from_columns(vec![
        Column::from_strings("a", [Some("1"), Some("1")]),
        Column::from_strings("b", [Some("x"), Some("y")]),
    ])
    .unwrap();
    let r = Table::from_columns(vec![
        Column::from_strings("a", [Some("1")]),
        Column::from_strings("b", [Some("y")]),
        Column::from_strings("v", [Some("hit")]),
    ])
    .unwrap();
    let joined = safe_join(&l, &r, &["a", "b"], JoinKind::Inner, Some(JoinValidation::OneToOne))
        .unwrap();
    assert_eq!(joined.row_count(), 1);
    assert_eq!(joined.column("b").unwrap().get(0), Some(&Value::String("y".into())));
}

#[test]
fn integer_keys_do_not_match_text_keys() {
    let l = Table::from_columns(vec![
        Column::new("user_id", ColumnType::Integer, vec![Some(Value::Integer(1))]),
        Column::from_strings("order_id", [Some("A1")]),
    ])
    .unwrap();
    let r = Table::from_columns(vec![
        Column::from_strings("user_id", [Some("1")]),
        Column::from_strings("country", [Some("SA")]),
    ])
    .unwrap();
    let joined =
        safe_left_join(&l, &r, &["user_id"], Some(JoinValidation::ManyToOne)).unwrap();
    assert_eq!(joined.row_count(), 1);
    assert_eq!(joined.column("country").unwrap().get(0), None);

    let inner = safe_join(&l, &r, &["user_id"], JoinKind::Inner, None).unwrap();
    assert_eq!(inner.row_count(), 0);
}

#[test]
fn empty_key_list_is_rejected() {
    let err = safe_join(&left(), &right(), &[], JoinKind::Inner, None).unwrap_err();
    assert!(err.to_string().contains("at least one key column"));
    assert!(safe_left_join(&left(), &right(), &[], None).is_err());
}
