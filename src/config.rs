//! Project layout and pipeline configuration.
//!
//! [`ProjectPaths`] derives every input/output directory from a single root.
//! [`PipelineConfig`] carries the values that steer cleaning (null tokens,
//! case folding, status mapping, outlier policy, bootstrap groups). It is
//! loaded from YAML when a file is supplied; every field falls back to the
//! defaults below.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    bootstrap::{DEFAULT_N_BOOT, DEFAULT_SEED},
    transform::{outliers::OutlierPolicy, text::CaseFold},
};

pub const DEFAULT_NULL_TOKENS: &[&str] = &["", "NA", "N/A", "null", "None", "not_a_number"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub cache: PathBuf,
    pub processed: PathBuf,
    pub external: PathBuf,
    pub reports: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        let data = root.join("data");
        Self {
            root: root.to_path_buf(),
            raw: data.join("raw"),
            cache: data.join("cache"),
            processed: data.join("processed"),
            external: data.join("external"),
            reports: root.join("reports"),
        }
    }

    pub fn ensure_output_dirs(&self) -> Result<()> {
        for dir in [&self.processed, &self.reports] {
            fs::create_dir_all(dir).with_context(|| format!("Creating directory {dir:?}"))?;
        }
        Ok(())
    }

    pub fn raw_orders(&self) -> PathBuf {
        self.raw.join("orders.csv")
    }

    pub fn raw_users(&self) -> PathBuf {
        self.raw.join("users.csv")
    }

    pub fn orders_clean(&self) -> PathBuf {
        self.processed.join("orders_clean.tbl")
    }

    pub fn users_clean(&self) -> PathBuf {
        self.processed.join("users.tbl")
    }

    pub fn analytics_table(&self) -> PathBuf {
        self.processed.join("analytics_table.tbl")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub null_tokens: Vec<String>,
    pub case_fold: CaseFold,
    pub status_mapping: BTreeMap<String, String>,
    pub dedupe_keys: Vec<String>,
    pub dedupe_timestamp: String,
    pub missing_flag_columns: Vec<String>,
    pub outlier_columns: Vec<String>,
    pub outlier_policy: OutlierPolicy,
    /// Null negative amounts after schema enforcement instead of failing the
    /// range check.
    pub null_negative_amounts: bool,
    pub utc: bool,
    /// YAML schema replacing the built-in orders schema.
    pub orders_schema: Option<PathBuf>,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    pub group_column: String,
    pub group_a: String,
    pub group_b: String,
    pub refund_status: String,
    pub n_boot: usize,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect(),
            case_fold: CaseFold::Full,
            status_mapping: default_status_mapping(),
            dedupe_keys: vec!["order_id".into(), "user_id".into()],
            dedupe_timestamp: "created_at".into(),
            missing_flag_columns: vec![
                "amount".into(),
                "quantity".into(),
                "created_at".into(),
                "status".into(),
            ],
            outlier_columns: vec!["amount".into()],
            outlier_policy: OutlierPolicy::default(),
            null_negative_amounts: false,
            utc: true,
            orders_schema: None,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            group_column: "country".into(),
            group_a: "SA".into(),
            group_b: "AE".into(),
            refund_status: "refund".into(),
            n_boot: DEFAULT_N_BOOT,
            seed: DEFAULT_SEED,
        }
    }
}

pub fn default_status_mapping() -> BTreeMap<String, String> {
    [("paid", "paid"), ("refund", "refund"), ("refunded", "refund")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing pipeline config YAML")
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing pipeline config YAML")
    }

    pub fn null_token_refs(&self) -> Vec<&str> {
        self.null_tokens.iter().map(String::as_str).collect()
    }
}
