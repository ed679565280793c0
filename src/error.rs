use thiserror::Error;

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workbook write error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("unsupported data file '{0}' (expected .xlsx, .xls, .ods or .csv)")]
    UnsupportedFormat(String),

    #[error("required column '{0}' not found in header row")]
    MissingColumn(String),

    #[error("no valid rows left after cleaning the data file")]
    EmptyDataset,

    #[error("no rows match the current selection")]
    EmptySelection,

    #[error("unknown company '{0}'")]
    UnknownCompany(String),

    #[error("company '{0}' has no rows in the current selection")]
    CompanyNotInSelection(String),

    #[error("unknown industry '{0}'")]
    UnknownIndustry(String),

    #[error("invalid year range {start} - {end}")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("configuration error: {0}")]
    Config(String),
}
