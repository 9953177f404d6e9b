use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::generate::GeneratorOptions;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean, validate, and analyze e-commerce order data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write seeded messy users.csv/orders.csv into data/raw
    Generate(GenerateArgs),
    /// Clean raw orders/users and write quality reports
    Clean(StageArgs),
    /// Build the joined analytics table and revenue summary
    Analytics(StageArgs),
    /// Compare refund rates between two countries with a bootstrap CI
    Bootstrap(BootstrapArgs),
    /// Run clean, analytics, and bootstrap in order
    Run(StageArgs),
    /// Preview the first rows of a processed table or CSV file
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project root containing data/ and reports/
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
    /// Optional YAML pipeline configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StageArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Number of users to generate
    #[arg(long, default_value_t = GeneratorOptions::default().users)]
    pub users: usize,
    /// Number of orders to generate before duplicates are injected
    #[arg(long, default_value_t = GeneratorOptions::default().orders)]
    pub orders: usize,
    /// Random seed
    #[arg(long, default_value_t = GeneratorOptions::default().seed)]
    pub seed: u64,
}

#[derive(Debug, Args)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// First comparison group (overrides config)
    #[arg(long = "group-a")]
    pub group_a: Option<String>,
    /// Second comparison group (overrides config)
    #[arg(long = "group-b")]
    pub group_b: Option<String>,
    /// Number of bootstrap resamples (config default is 2000)
    #[arg(long = "n-boot")]
    pub n_boot: Option<usize>,
    /// Resampling seed (config default is 0)
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Table to preview (.tbl binary table or delimited text)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Delimiter for text input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
