use crate::error::{DashboardError, DashboardResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tunables shared by the dashboard, the exporters and the report builder.
///
/// Built-in defaults can be overridden by a JSON file (`--config`) and then
/// by command-line flags or their environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    /// TrueType font used for chart text; falls back to well-known CJK fonts.
    pub chart_font: Option<PathBuf>,
    pub charts: bool,
    /// Rows shown by table previews and the PDF detail table.
    pub preview_rows: usize,
    /// Industries preselected when the session starts.
    pub default_industries: usize,
    pub ranking_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("1999-2023.xlsx"),
            output_dir: PathBuf::from("."),
            chart_font: None,
            charts: true,
            preview_rows: 20,
            default_industries: 5,
            ranking_size: 20,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> DashboardResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.check()?;
        debug!(path = %path.display(), "configuration file loaded");
        Ok(settings)
    }

    pub fn check(&self) -> DashboardResult<()> {
        if self.preview_rows == 0 {
            return Err(DashboardError::Config("preview_rows must be at least 1".into()));
        }
        if self.ranking_size == 0 {
            return Err(DashboardError::Config("ranking_size must be at least 1".into()));
        }
        Ok(())
    }
}
