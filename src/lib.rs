pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod generate;
pub mod io_utils;
pub mod join;
pub mod pipeline;
pub mod preview;
pub mod quality;
pub mod render;
pub mod report;
pub mod schema;
pub mod stats;
pub mod table;
pub mod transform;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    bootstrap::RefundComparison,
    cli::{BootstrapArgs, Cli, Commands, ProjectArgs},
    config::{PipelineConfig, ProjectPaths},
    pipeline::CleanOutcome,
    stats::AnalyticsSummary,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("orders_etl", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => {
            let (paths, _) = load_project(&args.project)?;
            let options = generate::GeneratorOptions {
                users: args.users,
                orders: args.orders,
                seed: args.seed,
            };
            generate::write_raw(&paths, &options)?;
            Ok(())
        }
        Commands::Clean(args) => {
            let (paths, config) = load_project(&args.project)?;
            handle_clean(&paths, &config)
        }
        Commands::Analytics(args) => {
            let (paths, config) = load_project(&args.project)?;
            handle_analytics(&paths, &config)
        }
        Commands::Bootstrap(args) => {
            let (paths, config) = load_project(&args.project)?;
            handle_bootstrap(&paths, &with_bootstrap_overrides(config, &args))
        }
        Commands::Run(args) => {
            let (paths, config) = load_project(&args.project)?;
            handle_clean(&paths, &config)?;
            handle_analytics(&paths, &config)?;
            handle_bootstrap(&paths, &config)?;
            info!("Pipeline complete for {:?}", paths.root);
            Ok(())
        }
        Commands::Preview(args) => {
            let (_, config) = load_project(&args.project)?;
            preview::execute(&args, &config)
        }
    }
}

fn load_project(args: &ProjectArgs) -> Result<(ProjectPaths, PipelineConfig)> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())
        .with_context(|| format!("Loading configuration {:?}", args.config))?;
    Ok((ProjectPaths::new(&args.root), config))
}

fn with_bootstrap_overrides(mut config: PipelineConfig, args: &BootstrapArgs) -> PipelineConfig {
    if let Some(group) = &args.group_a {
        config.bootstrap.group_a = group.clone();
    }
    if let Some(group) = &args.group_b {
        config.bootstrap.group_b = group.clone();
    }
    if let Some(n_boot) = args.n_boot {
        config.bootstrap.n_boot = n_boot;
    }
    if let Some(seed) = args.seed {
        config.bootstrap.seed = seed;
    }
    config
}

fn handle_clean(paths: &ProjectPaths, config: &PipelineConfig) -> Result<()> {
    let outcome = pipeline::run_clean(paths, config).context("Cleaning stage failed")?;
    print_metrics(&clean_rows(&outcome));
    Ok(())
}

fn handle_analytics(paths: &ProjectPaths, config: &PipelineConfig) -> Result<()> {
    let summary: AnalyticsSummary =
        pipeline::run_analytics(paths, config).context("Analytics stage failed")?;
    print_metrics(&summary.render_rows());
    Ok(())
}

fn handle_bootstrap(paths: &ProjectPaths, config: &PipelineConfig) -> Result<()> {
    let comparison = pipeline::run_bootstrap(paths, config).context("Bootstrap stage failed")?;
    print_metrics(&bootstrap_rows(&comparison));
    Ok(())
}

fn clean_rows(outcome: &CleanOutcome) -> Vec<Vec<String>> {
    vec![
        vec!["rows_before".into(), outcome.rows_before.to_string()],
        vec!["rows_after".into(), outcome.rows_after.to_string()],
        vec![
            "duplicate_keys_before".into(),
            outcome.duplicate_keys_before.to_string(),
        ],
        vec![
            "duplicate_keys_after".into(),
            outcome.duplicate_keys_after.to_string(),
        ],
        vec![
            "duplicate_rows_before".into(),
            outcome.quality_before.duplicate_rows.to_string(),
        ],
    ]
}

fn bootstrap_rows(comparison: &RefundComparison) -> Vec<Vec<String>> {
    let result = &comparison.result;
    vec![
        vec![
            format!("refund_rate_{}", comparison.group_a),
            format!("{:.4} (n={})", comparison.refund_rate_a, comparison.n_a),
        ],
        vec![
            format!("refund_rate_{}", comparison.group_b),
            format!("{:.4} (n={})", comparison.refund_rate_b, comparison.n_b),
        ],
        vec!["diff_mean".into(), format!("{:.4}", result.diff_mean)],
        vec!["ci_low".into(), format!("{:.4}", result.ci_low)],
        vec!["ci_high".into(), format!("{:.4}", result.ci_high)],
        vec!["interpretation".into(), result.interpretation().to_string()],
    ]
}

fn print_metrics(rows: &[Vec<String>]) {
    render::print_table(&["metric".to_string(), "value".to_string()], rows);
}
