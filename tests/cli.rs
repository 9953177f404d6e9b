mod common;

use assert_cmd::Command;
use predicates::str::contains;

use common::TestWorkspace;

fn etl() -> Command {
    Command::cargo_bin("orders-etl").expect("binary exists")
}

#[test]
fn clean_writes_processed_tables_and_reports() {
    let workspace = TestWorkspace::new().with_raw_fixtures();
    etl()
        .args(["clean", "--root", &workspace.root_arg()])
        .assert()
        .success()
        .stdout(contains("rows_before"))
        .stdout(contains("duplicate_keys_after"));

    for path in [
        "data/processed/orders_clean.tbl",
        "data/processed/orders_clean.csv",
        "data/processed/users.tbl",
        "reports/quality_orders.json",
    ] {
        assert!(workspace.path().join(path).exists(), "{path} missing");
    }

    let missingness = workspace.read("reports/missingness_orders.csv");
    assert!(missingness.starts_with("column,n_missing,p_missing\n"));

    let markdown = workspace.read("reports/missingness_orders.md");
    assert!(markdown.contains("- **Rows before cleaning:** 10"));
    assert!(markdown.contains("- **Rows after cleaning:** 9"));
    assert!(markdown.contains("| Column | Before | After | Improvement |"));
}

#[test]
fn run_builds_analytics_and_revenue_summary() {
    let workspace = TestWorkspace::new().with_raw_fixtures();
    etl()
        .args(["run", "--root", &workspace.root_arg()])
        .assert()
        .success()
        .stdout(contains("outlier_count"))
        .stdout(contains("interpretation"));

    let revenue = workspace.read("reports/revenue_by_country.csv");
    let lines: Vec<&str> = revenue.lines().collect();
    assert_eq!(lines[0], "country,orders,revenue,avg_order");
    assert!(lines[1].starts_with("AE,4,"), "{revenue}");
    assert!(lines.iter().any(|l| l.starts_with(",1,")), "{revenue}");
    assert!(workspace.path().join("data/processed/analytics_table.tbl").exists());
}

#[test]
fn bootstrap_accepts_group_overrides() {
    let workspace = TestWorkspace::new().with_raw_fixtures();
    for stage in ["clean", "analytics"] {
        etl()
            .args([stage, "--root", &workspace.root_arg()])
            .assert()
            .success();
    }
    etl()
        .args([
            "bootstrap",
            "--root",
            &workspace.root_arg(),
            "--group-a",
            "AE",
            "--group-b",
            "SA",
            "--n-boot",
            "200",
            "--seed",
            "3",
        ])
        .assert()
        .success()
        .stdout(contains("refund_rate_AE"))
        .stdout(contains("ci_high"));
}

#[test]
fn bootstrap_with_unknown_group_fails() {
    let workspace = TestWorkspace::new().with_raw_fixtures();
    for stage in ["clean", "analytics"] {
        etl()
            .args([stage, "--root", &workspace.root_arg()])
            .assert()
            .success();
    }
    etl()
        .args(["bootstrap", "--root", &workspace.root_arg(), "--group-b", "QA"])
        .assert()
        .failure()
        .stderr(contains("group 'QA' is empty after cleaning"));
}

#[test]
fn missing_status_column_aborts_without_outputs() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "data/raw/orders.csv",
        "order_id,user_id,amount,quantity,created_at\nA1,0001,1.0,1,2025-01-01\n",
    );
    workspace.write("data/raw/users.csv", "user_id,country,signup_date\n0001,SA,2025-01-01\n");
    etl()
        .args(["clean", "--root", &workspace.root_arg()])
        .assert()
        .failure()
        .stderr(contains("error:"))
        .stderr(contains("missing required column(s): status"));
    assert!(!workspace.path().join("data/processed/orders_clean.tbl").exists());
}

#[test]
fn negative_quantity_is_a_range_error() {
    let workspace = TestWorkspace::new();
    workspace.write(
        "data/raw/orders.csv",
        "order_id,user_id,amount,quantity,created_at,status\nA1,0001,1.0,-2,2025-01-01,paid\n",
    );
    workspace.write("data/raw/users.csv", "user_id,country,signup_date\n0001,SA,2025-01-01\n");
    etl()
        .args(["clean", "--root", &workspace.root_arg()])
        .assert()
        .failure()
        .stderr(contains("column 'quantity' has values below 0"));
}

#[test]
fn config_file_changes_null_tokens() {
    let workspace = TestWorkspace::new().with_raw_fixtures();
    let config = workspace.write("pipeline.yml", "null_tokens: ['', 'Pending']\n");
    etl()
        .args([
            "clean",
            "--root",
            &workspace.root_arg(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .success();
    let json = workspace.read("reports/quality_orders.json");
    let report: serde_json::Value = serde_json::from_str(&json).expect("quality json");
    assert_eq!(report["before"]["total_rows"], 10);
    assert_eq!(report["before"]["null_counts"]["status"], 2);
    assert_eq!(report["before"]["null_counts"]["quantity"], 1);
}

#[test]
fn generate_then_preview_shows_rows() {
    let workspace = TestWorkspace::new();
    etl()
        .args([
            "generate",
            "--root",
            &workspace.root_arg(),
            "--users",
            "10",
            "--orders",
            "40",
            "--seed",
            "1",
        ])
        .assert()
        .success();
    let orders = workspace.read("data/raw/orders.csv");
    assert_eq!(orders.lines().count(), 1 + 42);

    etl()
        .args(["clean", "--root", &workspace.root_arg()])
        .assert()
        .success();
    let table = workspace.path().join("data/processed/orders_clean.tbl");
    etl()
        .args(["preview", "-i", table.to_str().unwrap(), "--rows", "3"])
        .assert()
        .success()
        .stdout(contains("status_clean"))
        .stdout(contains("order_id"));
}

#[test]
fn preview_reads_plain_csv() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("sample.tsv", "id\tstatus\n1\tpaid\n2\trefund\n");
    etl()
        .args(["preview", "-i", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("refund"));
}

#[test]
fn config_can_point_at_a_schema_file() {
    let workspace = TestWorkspace::new().with_raw_fixtures();
    let config = workspace.write("pipeline.yml", "orders_schema: does-not-exist.yml\n");
    etl()
        .args([
            "clean",
            "--root",
            &workspace.root_arg(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("Opening schema file"));
}
