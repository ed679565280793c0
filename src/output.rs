use crate::error::DashboardResult;
use crate::types::{Record, SummaryStats};
use crate::util::format_number;
use crate::views::CorrelationMatrix;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> DashboardResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> DashboardResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, or `(no rows)`.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

/// Metric-by-metric grid; undefined coefficients print as `NaN`.
pub fn render_correlation(matrix: &CorrelationMatrix) -> String {
    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(matrix.metrics.iter().map(|m| m.label().to_string()));
    builder.push_record(header);
    for (metric, row) in matrix.metrics.iter().zip(&matrix.values) {
        let mut cells = vec![metric.label().to_string()];
        cells.extend(
            row.iter()
                .map(|v| v.map_or_else(|| "NaN".to_string(), |v| format_number(v, 2))),
        );
        builder.push_record(cells);
    }
    builder.build().with(Style::markdown()).to_string()
}

#[derive(Debug, Serialize)]
pub struct ExportSummary<'a> {
    pub generated_at: String,
    pub company: Option<&'a str>,
    /// Empty means every industry. The flattened stats carry the count as `industries`.
    #[serde(rename = "selected_industries")]
    pub industries: &'a [String],
    #[serde(flatten)]
    pub stats: SummaryStats,
}

/// Writes `filtered_{stamp}.csv` and `summary_{stamp}.json` into `dir`.
pub fn export_rows(
    dir: &Path,
    rows: &[&Record],
    summary: &ExportSummary<'_>,
    now: NaiveDateTime,
) -> DashboardResult<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let stamp = now.format("%Y%m%d%H%M%S");
    let csv_path = dir.join(format!("filtered_{}.csv", stamp));
    let json_path = dir.join(format!("summary_{}.json", stamp));
    write_csv(&csv_path, rows)?;
    write_json(&json_path, summary)?;
    info!(csv = %csv_path.display(), json = %json_path.display(), rows = rows.len(), "data exported");
    Ok((csv_path, json_path))
}
