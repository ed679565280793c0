use crate::error::{DashboardError, DashboardResult};
use crate::types::{Field, Record};
use crate::util::{number_to_text, parse_f64_safe};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

// Header text (original or English alias) -> column.
static HEADER_LOOKUP: Lazy<HashMap<&'static str, Field>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for field in Field::ALL {
        map.insert(field.header(), field);
        map.insert(field.alias(), field);
    }
    map
});

fn resolve_header(header: &str) -> Option<Field> {
    let trimmed = header.trim();
    HEADER_LOOKUP
        .get(trimmed)
        .or_else(|| HEADER_LOOKUP.get(trimmed.to_lowercase().as_str()))
        .copied()
}

/// The cleaned, read-only table every view is computed from.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    pub coerced_cells: usize,
}

/// Source-agnostic cell so workbook and CSV rows share one cleaning path.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_data(data: &Data) -> Cell {
        match data {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
            Data::String(s) => Cell::Text(s.clone()),
            _ => Cell::Empty,
        }
    }

    fn from_field(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(number_to_text(*n)),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => parse_f64_safe(Some(s)),
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Number(_) => None,
        }
    }
}

/// Maps header positions to known columns and checks the required ones.
struct ColumnMap {
    positions: Vec<(usize, Field)>,
}

impl ColumnMap {
    fn from_headers<I>(headers: I) -> DashboardResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positions = Vec::new();
        for (idx, header) in headers.into_iter().enumerate() {
            match resolve_header(&header) {
                Some(field) if positions.iter().any(|(_, f)| *f == field) => {
                    warn!(column = %header, "duplicate column ignored");
                }
                Some(field) => positions.push((idx, field)),
                None => debug!(column = %header, "unrecognised column ignored"),
            }
        }
        for required in Field::REQUIRED {
            if !positions.iter().any(|(_, f)| *f == required) {
                return Err(DashboardError::MissingColumn(required.header().to_string()));
            }
        }
        for field in Field::ALL {
            if !positions.iter().any(|(_, f)| *f == field) {
                debug!(column = field.header(), "optional column absent, defaulting");
            }
        }
        Ok(Self { positions })
    }
}

fn is_invalid_company(name: Option<&str>) -> bool {
    match name {
        None => true,
        Some(n) => n.is_empty() || n == "0" || n == "nan",
    }
}

/// Clean one row. Returns `None` when the company name is unusable.
fn clean_row(cells: &[Cell], columns: &ColumnMap, coerced: &mut usize) -> Option<Record> {
    let mut record = Record::default();
    for &(idx, field) in &columns.positions {
        let cell = cells.get(idx).unwrap_or(&Cell::Empty);
        if field == Field::Company {
            let name = cell.as_text();
            if is_invalid_company(name.as_deref()) {
                return None;
            }
            record.company = name.unwrap_or_default();
        } else if field.is_text() {
            // Missing text fills with zero before stringifying.
            let value = cell.as_text().unwrap_or_else(|| {
                *coerced += 1;
                "0".to_string()
            });
            record.set_text(field, value);
        } else {
            let value = cell.as_number().unwrap_or_else(|| {
                *coerced += 1;
                0.0
            });
            record.set_number(field, value);
        }
    }
    Some(record)
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Load and clean a company-year data file (workbook or CSV).
pub fn load_dataset(path: &Path) -> DashboardResult<(Dataset, LoadReport)> {
    let rows = match file_extension(path).as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path)?,
        "csv" => read_csv(path)?,
        _ => {
            return Err(DashboardError::UnsupportedFormat(
                path.display().to_string(),
            ))
        }
    };
    let (dataset, report) = clean_rows(rows)?;
    info!(
        path = %path.display(),
        total = report.total_rows,
        kept = report.kept_rows,
        dropped = report.dropped_rows,
        coerced = report.coerced_cells,
        "data file loaded"
    );
    Ok((dataset, report))
}

struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
    unreadable_rows: usize,
}

fn read_workbook(path: &Path) -> DashboardResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(DashboardError::EmptyDataset)??;
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(DashboardError::EmptyDataset)?
        .iter()
        .map(|cell| Cell::from_data(cell).as_text().unwrap_or_default())
        .collect();
    let rows: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(Cell::from_data).collect::<Vec<_>>())
        .collect();
    Ok(RawTable {
        headers,
        rows,
        unreadable_rows: 0,
    })
}

fn read_csv(path: &Path) -> DashboardResult<RawTable> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut unreadable_rows = 0usize;
    for result in rdr.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(Cell::from_field).collect()),
            Err(e) => {
                warn!(error = %e, "skipping unreadable CSV row");
                unreadable_rows += 1;
            }
        }
    }
    Ok(RawTable {
        headers,
        rows,
        unreadable_rows,
    })
}

fn clean_rows(table: RawTable) -> DashboardResult<(Dataset, LoadReport)> {
    let columns = ColumnMap::from_headers(table.headers)?;
    let mut report = LoadReport {
        total_rows: table.rows.len() + table.unreadable_rows,
        dropped_rows: table.unreadable_rows,
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());
    for cells in &table.rows {
        match clean_row(cells, &columns, &mut report.coerced_cells) {
            Some(record) => records.push(record),
            None => report.dropped_rows += 1,
        }
    }
    report.kept_rows = records.len();
    if records.is_empty() {
        return Err(DashboardError::EmptyDataset);
    }
    Ok((Dataset::new(records), report))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    /// Writes a small workbook with original headers; `None` cells stay empty.
    pub(crate) fn write_fixture(dir: &TempDir, name: &str, rows: &[Vec<Option<&str>>]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let headers = [
            "股票代码", "企业名称", "行业代码", "行业名称", "年份", "总词频", "人工智能", "大数据",
            "云计算", "技术多样性", "技术种类数", "数字化程度", "年度增长率",
        ];
        for (col, h) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *h).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let Some(text) = cell else { continue };
                let (row_idx, col_idx) = (r as u32 + 1, c as u16);
                match text.parse::<f64>() {
                    Ok(n) if c != 1 => sheet.write_number(row_idx, col_idx, n).unwrap(),
                    _ => sheet.write_string(row_idx, col_idx, *text).unwrap(),
                };
            }
        }
        workbook.save(&path).unwrap();
        path
    }

    #[test]
    fn workbook_rows_are_cleaned() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(
            &dir,
            "data.xlsx",
            &[
                vec![Some("600000"), Some("Alpha"), Some("C39"), Some("Tech"), Some("2020"), Some("10"), Some("3"), Some("2"), Some("1"), Some("0.3"), Some("3"), Some("1.5"), Some("12.5")],
                vec![Some("600001"), Some("0"), Some("C39"), Some("Tech"), Some("2020"), Some("1"), None, None, None, None, None, Some("1"), None],
                vec![None, None, Some("C39"), Some("Tech"), Some("2021"), None, None, None, None, None, None, Some("1"), None],
                vec![Some("600002"), Some("Beta"), None, Some("Retail"), Some("oops"), Some("n/a"), None, None, None, None, None, Some("2.25"), None],
            ],
        );
        let (dataset, report) = load_dataset(&path).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.dropped_rows, 2);
        assert!(report.coerced_cells > 0);

        let alpha = &dataset.records[0];
        assert_eq!(alpha.stock_code, "600000");
        assert_eq!(alpha.company, "Alpha");
        assert_eq!(alpha.year, 2020);
        assert_eq!(alpha.artificial_intelligence, 3.0);
        assert_eq!(alpha.digital_degree, 1.5);

        let beta = &dataset.records[1];
        assert_eq!(beta.year, 0);
        assert_eq!(beta.industry_code, "0");
        assert_eq!(beta.total_frequency, 0.0);
        assert_eq!(beta.blockchain, 0.0);
    }

    #[test]
    fn csv_with_english_aliases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(
            &path,
            "company,industry,year,digital_degree,total_frequency,extra\n\
             Gamma,Energy,2019.0,\"1,200.5\",7,x\n\
             nan,Energy,2019,1,1,x\n",
        )
        .unwrap();
        let (dataset, report) = load_dataset(&path).unwrap();
        assert_eq!(report.kept_rows, 1);
        assert_eq!(dataset.records[0].year, 2019);
        assert_eq!(dataset.records[0].digital_degree, 1200.5);
        assert_eq!(dataset.records[0].stock_code, "");
    }

    #[test]
    fn company_names_are_taken_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(
            &path,
            "company,industry,year,digital_degree\n\
             \" Alpha \",Tech,2020,1\n\
             NaN,Tech,2020,1\n\
             nan,Tech,2020,1\n\
             0,Tech,2020,1\n",
        )
        .unwrap();
        let (dataset, report) = load_dataset(&path).unwrap();
        assert_eq!(report.dropped_rows, 2);
        let names: Vec<&str> = dataset.records.iter().map(|r| r.company.as_str()).collect();
        assert_eq!(names, vec![" Alpha ", "NaN"]);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "company,year\nAlpha,2020\n").unwrap();
        let err = load_dataset(&path).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(ref c) if c == "行业名称"));
    }

    #[test]
    fn only_invalid_rows_is_an_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "company,industry,year,digital_degree\n0,A,2020,1\n,A,2020,1\n").unwrap();
        assert!(matches!(load_dataset(&path), Err(DashboardError::EmptyDataset)));
    }

    #[test]
    fn unsupported_extension() {
        let err = load_dataset(Path::new("data.parquet")).unwrap_err();
        assert!(matches!(err, DashboardError::UnsupportedFormat(_)));
    }
}
