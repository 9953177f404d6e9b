//! Report writers: missingness CSV/markdown, quality JSON, revenue CSV.

use std::{
    fmt::Write as _,
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    io_utils,
    quality::{MissingnessDelta, MissingnessEntry, QualityReport},
    stats::GroupSummary,
};

pub fn write_missingness_csv(entries: &[MissingnessEntry], path: &Path) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    writer
        .write_record(["column", "n_missing", "p_missing"])
        .context("Writing missingness headers")?;
    for entry in entries {
        writer
            .write_record([
                entry.column.clone(),
                entry.n_missing.to_string(),
                entry.p_missing.to_string(),
            ])
            .with_context(|| format!("Writing missingness row for '{}'", entry.column))?;
    }
    writer.flush().context("Flushing missingness CSV")?;
    Ok(())
}

/// Before/after row counts and missing values, as markdown.
pub fn render_missingness_markdown(
    rows_before: usize,
    rows_after: usize,
    deltas: &[MissingnessDelta],
    report_date: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Data Missingness Report\n");
    let _ = writeln!(out, "**Report Date:** {report_date}\n");

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out, "- **Rows before cleaning:** {rows_before}");
    let _ = writeln!(out, "- **Rows after cleaning:** {rows_after}");
    let _ = writeln!(
        out,
        "- **Rows removed:** {}\n",
        rows_before.saturating_sub(rows_after)
    );

    let _ = writeln!(out, "## Missing Values Analysis\n");
    let _ = writeln!(out, "| Column | Before | After | Improvement |");
    let _ = writeln!(out, "|--------|--------|-------|-------------|");
    for delta in deltas {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            delta.column, delta.before, delta.after, delta.reduced
        );
    }

    let _ = writeln!(out, "\n## Data Quality Improvements\n");
    let improved: Vec<&MissingnessDelta> = deltas.iter().filter(|d| d.reduced > 0).collect();
    if improved.is_empty() {
        let _ = writeln!(out, "- No missing values to clean");
    }
    for delta in improved {
        let _ = writeln!(
            out,
            "- **{}**: Reduced missing values from {} to {} ({:.1}% improvement)",
            delta.column, delta.before, delta.after, delta.improvement_pct
        );
    }
    out
}

pub fn write_text(contents: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    fs::write(path, contents).with_context(|| format!("Writing {path:?}"))
}

#[derive(Serialize)]
struct QualityComparison<'a> {
    before: &'a QualityReport,
    after: &'a QualityReport,
}

pub fn write_quality_json(before: &QualityReport, after: &QualityReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &QualityComparison { before, after })
        .context("Writing quality report JSON")
}

/// `country,orders,revenue,avg_order`; the null group renders as an empty
/// country.
pub fn write_revenue_csv(summaries: &[GroupSummary], path: &Path) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    writer
        .write_record(["country", "orders", "revenue", "avg_order"])
        .context("Writing revenue headers")?;
    for summary in summaries {
        writer
            .write_record([
                summary.group.clone().unwrap_or_default(),
                summary.orders.to_string(),
                format!("{:.2}", summary.revenue),
                summary
                    .avg_order
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_default(),
            ])
            .context("Writing revenue row")?;
    }
    writer.flush().context("Flushing revenue CSV")?;
    Ok(())
}
