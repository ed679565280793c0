// Terminal dashboard: a menu loop over any BufRead/Write pair.
//
// Every accepted input changes the selection and the whole screen (sidebar
// plus the current view) is rendered again from the dataset.
use crate::charts;
use crate::error::{DashboardError, DashboardResult};
use crate::filter::{DatasetIndex, Selection, YearRange};
use crate::loader::Dataset;
use crate::output::{self, ExportSummary};
use crate::report::{self, ReportOptions};
use crate::settings::Settings;
use crate::types::{ComparisonRow, KeyValueRow, LabelValueRow, Metric, Record, YearValueRow};
use crate::util::{format_int, format_number};
use crate::views;
use chrono::NaiveDateTime;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};
use tracing::{debug, info, warn};

pub const CHART_SIZE: (u32, u32) = (1000, 600);

fn section(title: &str, body: &str) -> String {
    format!("## {}\n\n{}\n", title, body)
}

fn label_rows(values: Vec<(String, f64)>) -> Vec<LabelValueRow> {
    values
        .into_iter()
        .map(|(label, v)| LabelValueRow {
            label,
            value: format_number(v, 2),
        })
        .collect()
}

/// Whole-dataset counters and the active filters.
pub fn render_sidebar(index: &DatasetIndex, selection: &Selection) -> String {
    let overview = vec![
        KeyValueRow::new("Records", format_int(index.records)),
        KeyValueRow::new("Companies", format_int(index.companies.len())),
        KeyValueRow::new("Industries", format_int(index.industries.len())),
        KeyValueRow::new("Years", format!("{} - {}", index.min_year, index.max_year)),
        KeyValueRow::new("Avg digitalization degree", format_number(index.avg_digital_degree, 2)),
    ];
    let filters = vec![
        KeyValueRow::new("Company", selection.company.clone().unwrap_or_else(|| "(none)".into())),
        KeyValueRow::new("Years", format!("{} - {}", selection.years.start, selection.years.end)),
        KeyValueRow::new("Industries", selection.industries_label()),
    ];
    format!(
        "{}\n{}",
        section("Data overview", &output::render_table(&overview, overview.len())),
        section("Filters", &output::render_table(&filters, filters.len()))
    )
}

/// Population view over the filtered rows.
pub fn render_overview(rows: &[&Record], metrics: &[Metric], settings: &Settings) -> String {
    let mut out = Vec::new();
    let detail = views::head_detail(rows, settings.preview_rows);
    out.push(section(
        &format!("Data table ({} rows)", format_int(rows.len())),
        &output::render_table(&detail, settings.preview_rows),
    ));

    let trend: Vec<YearValueRow> = views::yearly_trend(rows, Metric::TotalFrequency)
        .into_iter()
        .map(|(year, v)| YearValueRow {
            year,
            value: format_number(v, 2),
        })
        .collect();
    out.push(section(
        "Mean total word frequency by year",
        &output::render_table(&trend, trend.len()),
    ));

    let tech = label_rows(
        views::technology_averages(rows)
            .into_iter()
            .map(|(m, v)| (m.label().to_string(), v))
            .collect(),
    );
    out.push(section("Technology comparison", &output::render_table(&tech, tech.len())));

    let industries = label_rows(views::industry_distribution(rows));
    out.push(section(
        "Digitalization degree by industry",
        &output::render_table(&industries, industries.len()),
    ));

    let ranking = label_rows(views::company_ranking(rows, settings.ranking_size));
    out.push(section(
        &format!("Top {} companies", settings.ranking_size),
        &output::render_table(&ranking, ranking.len()),
    ));

    let correlation = if metrics.is_empty() {
        "Select at least one metric to show the correlation matrix.".to_string()
    } else {
        output::render_correlation(&views::correlation(rows, metrics))
    };
    out.push(section("Correlation", &correlation));
    out.join("\n")
}

fn technology_trend_table(company: &[&Record]) -> String {
    let trends = views::technology_trends(company);
    let mut builder = Builder::default();
    let mut header = vec!["Year".to_string()];
    header.extend(trends.iter().map(|(m, _)| m.label().to_string()));
    builder.push_record(header);
    let years: Vec<i32> = trends
        .first()
        .map(|(_, pts)| pts.iter().map(|(y, _)| *y).collect())
        .unwrap_or_default();
    for (i, year) in years.iter().enumerate() {
        let mut cells = vec![year.to_string()];
        cells.extend(trends.iter().map(|(_, pts)| format_number(pts[i].1, 0)));
        builder.push_record(cells);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Company view, computed over the whole dataset. `None` if the company
/// has no rows.
pub fn render_company(dataset: &Dataset, company: &str, settings: &Settings) -> Option<String> {
    let all = views::all_rows(dataset);
    let rows = views::company_rows(all.iter().copied(), company);
    let p = views::company_profile(&rows)?;

    let profile = vec![
        KeyValueRow::new("Stock code", p.stock_code.clone()),
        KeyValueRow::new("Industry", p.industry.clone()),
        KeyValueRow::new("Industry code", p.industry_code.clone()),
        KeyValueRow::new("Years", format!("{} - {}", p.first_year, p.last_year)),
        KeyValueRow::new("Records", p.records.to_string()),
        KeyValueRow::new("Latest digitalization degree", format_number(p.latest_digital_degree, 2)),
    ];
    let cards = vec![
        KeyValueRow::new("Total word frequency", format_number(p.total_frequency_sum, 0)),
        KeyValueRow::new("Technology kinds", format_number(p.latest_tech_kinds, 0)),
        KeyValueRow::new("Digitalization degree", format_number(p.latest_digital_degree, 2)),
        KeyValueRow::new("Technology diversity", format_number(p.latest_tech_diversity, 2)),
    ];
    let growth: Vec<YearValueRow> = views::growth_rates(&rows)
        .into_iter()
        .map(|(year, v)| YearValueRow {
            year,
            value: format_number(v, 2),
        })
        .collect();
    let comparison: Vec<ComparisonRow> = views::industry_comparison(&all, &rows)
        .into_iter()
        .map(|c| ComparisonRow {
            year: c.year,
            industry_avg: format_number(c.industry_avg, 2),
            company: format_number(c.company, 2),
        })
        .collect();
    let detail = views::company_detail(&rows, settings.preview_rows);

    Some(
        [
            section(&format!("Company: {}", p.name), &output::render_table(&profile, profile.len())),
            section("Metrics", &output::render_table(&cards, cards.len())),
            section("Technology trends", &technology_trend_table(&rows)),
            section("Annual growth rate (%)", &output::render_table(&growth, growth.len())),
            section(
                &format!("{} vs {} industry average", p.name, p.industry),
                &output::render_table(&comparison, comparison.len()),
            ),
            section("Detail", &output::render_table(&detail, detail.len())),
        ]
        .join("\n"),
    )
}

/// Charts of the current view: company charts over the whole dataset when a
/// company is selected, population charts over the filtered rows otherwise.
pub fn view_charts(dataset: &Dataset, selection: &Selection, settings: &Settings) -> Vec<charts::Chart> {
    match &selection.company {
        Some(company) => {
            let all = views::all_rows(dataset);
            let rows = views::company_rows(all.iter().copied(), company);
            charts::company_charts(&all, &rows)
        }
        None => charts::overview_charts(&selection.apply(dataset), settings.ranking_size),
    }
}

pub fn save_report(
    dataset: &Dataset,
    selection: &Selection,
    settings: &Settings,
    now: NaiveDateTime,
    output: Option<PathBuf>,
) -> DashboardResult<PathBuf> {
    let options = ReportOptions {
        charts: settings.charts,
        detail_rows: settings.preview_rows,
    };
    let bytes = report::build_report(dataset, selection, now, options)?;
    let path = output.unwrap_or_else(|| settings.output_dir.join(report::report_filename(selection, now)));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;
    info!(path = %path.display(), "report saved");
    Ok(path)
}

pub fn save_export(
    dataset: &Dataset,
    selection: &Selection,
    settings: &Settings,
    now: NaiveDateTime,
) -> DashboardResult<(PathBuf, PathBuf)> {
    let rows = selection.apply(dataset);
    if rows.is_empty() {
        return Err(DashboardError::EmptySelection);
    }
    let summary = ExportSummary {
        generated_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        company: selection.company.as_deref(),
        industries: &selection.industries,
        stats: views::summarize(&rows),
    };
    output::export_rows(&settings.output_dir, &rows, &summary, now)
}

pub fn save_charts(dataset: &Dataset, selection: &Selection, settings: &Settings) -> DashboardResult<Vec<PathBuf>> {
    let charts = view_charts(dataset, selection, settings);
    charts::write_pngs(&charts, &settings.output_dir, CHART_SIZE)
}

/// Parses `a, b, c` where each item is a 1-based position in `choices`
/// or a name accepted by `lookup`.
fn parse_list<T: Clone>(
    input: &str,
    choices: &[T],
    lookup: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| match item.parse::<usize>() {
            Ok(n) if n >= 1 && n <= choices.len() => Ok(choices[n - 1].clone()),
            _ => lookup(item).ok_or_else(|| item.to_string()),
        })
        .collect()
}

pub struct Session<'d, R, W> {
    dataset: &'d Dataset,
    settings: &'d Settings,
    index: DatasetIndex,
    selection: Selection,
    metrics: Vec<Metric>,
    input: R,
    out: W,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl<'d, R: BufRead, W: Write> Session<'d, R, W> {
    pub fn new(dataset: &'d Dataset, settings: &'d Settings, input: R, out: W) -> Self {
        let index = DatasetIndex::build(dataset);
        let selection = Selection::initial(&index, settings.default_industries);
        Self {
            dataset,
            settings,
            index,
            selection,
            metrics: Metric::DEFAULT_CORRELATION.to_vec(),
            input,
            out,
            clock: local_now,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Reads one trimmed line after printing `prompt`; `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> DashboardResult<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim().to_string()))
    }

    fn render(&mut self) -> DashboardResult<()> {
        let sidebar = render_sidebar(&self.index, &self.selection);
        let view = match &self.selection.company {
            Some(company) => render_company(self.dataset, company, self.settings)
                .unwrap_or_else(|| format!("No data for company {}.\n", company)),
            None => render_overview(&self.selection.apply(self.dataset), &self.metrics, self.settings),
        };
        writeln!(self.out, "{}\n{}", sidebar, view)?;
        Ok(())
    }

    fn print_menu(&mut self) -> DashboardResult<()> {
        writeln!(self.out, "[1] Select company")?;
        writeln!(self.out, "[2] Set year range")?;
        writeln!(self.out, "[3] Select industries")?;
        writeln!(self.out, "[4] Choose correlation metrics")?;
        writeln!(self.out, "[5] Export PDF report")?;
        writeln!(self.out, "[6] Export CSV + JSON summary")?;
        writeln!(self.out, "[7] Export charts (PNG)")?;
        writeln!(self.out, "[0] Exit\n")?;
        Ok(())
    }

    /// Runs until `0` or end of input.
    pub fn run(&mut self) -> DashboardResult<()> {
        self.render()?;
        loop {
            self.print_menu()?;
            let Some(choice) = self.read_line("Enter choice: ")? else {
                break;
            };
            let changed = match choice.as_str() {
                "1" => self.choose_company()?,
                "2" => self.choose_years()?,
                "3" => self.choose_industries()?,
                "4" => self.choose_metrics()?,
                "5" => {
                    self.export_report()?;
                    false
                }
                "6" => {
                    self.export_data()?;
                    false
                }
                "7" => {
                    self.export_charts()?;
                    false
                }
                "0" => break,
                _ => {
                    writeln!(self.out, "Invalid choice. Please enter a number from 0 to 7.\n")?;
                    false
                }
            };
            if changed {
                debug!(selection = ?self.selection, "selection changed");
                self.render()?;
            }
        }
        writeln!(self.out, "Exiting the program.")?;
        Ok(())
    }

    fn choose_company(&mut self) -> DashboardResult<bool> {
        let Some(name) = self.read_line("Company name (blank clears): ")? else {
            return Ok(false);
        };
        if name.is_empty() {
            self.selection.company = None;
            return Ok(true);
        }
        let picked = if self.index.has_company(&name) {
            Some(name.clone())
        } else {
            match self.index.search_companies(&name).as_slice() {
                [only] => Some(only.to_string()),
                [] => None,
                many => {
                    let shown: Vec<&str> = many.iter().take(10).copied().collect();
                    writeln!(self.out, "Several companies match: {}\n", shown.join(", "))?;
                    return Ok(false);
                }
            }
        };
        match picked {
            Some(company) => {
                self.selection.company = Some(company);
                Ok(true)
            }
            None => {
                writeln!(self.out, "{}\n", DashboardError::UnknownCompany(name))?;
                Ok(false)
            }
        }
    }

    fn read_year(&mut self, prompt: &str) -> DashboardResult<Option<i32>> {
        let Some(text) = self.read_line(prompt)? else {
            return Ok(None);
        };
        match text.parse::<i32>() {
            Ok(y) => Ok(Some(y)),
            Err(_) => {
                writeln!(self.out, "Invalid year '{}'.\n", text)?;
                Ok(None)
            }
        }
    }

    fn choose_years(&mut self) -> DashboardResult<bool> {
        let prompt = format!("Start year ({}-{}): ", self.index.min_year, self.index.max_year);
        let Some(start) = self.read_year(&prompt)? else {
            return Ok(false);
        };
        let prompt = format!("End year ({}-{}): ", self.index.min_year, self.index.max_year);
        let Some(end) = self.read_year(&prompt)? else {
            return Ok(false);
        };
        let candidate = Selection {
            years: YearRange { start, end },
            ..self.selection.clone()
        };
        if let Err(e) = candidate.validate(&self.index) {
            writeln!(self.out, "{}\n", e)?;
            return Ok(false);
        }
        self.selection = candidate;
        Ok(true)
    }

    fn choose_industries(&mut self) -> DashboardResult<bool> {
        let listing: Vec<String> = self
            .index
            .industries
            .iter()
            .enumerate()
            .map(|(i, name)| format!("[{}] {}", i + 1, name))
            .collect();
        writeln!(self.out, "{}", listing.join("\n"))?;
        let Some(text) = self.read_line("Industries (numbers or names, comma separated; blank = all): ")? else {
            return Ok(false);
        };
        let index = &self.index;
        let parsed = parse_list(&text, index.industries.as_slice(), |s| {
            index.has_industry(s).then(|| s.to_string())
        });
        match parsed {
            Ok(industries) => {
                let mut unique: Vec<String> = Vec::new();
                for i in industries {
                    if !unique.contains(&i) {
                        unique.push(i);
                    }
                }
                self.selection.industries = unique;
                Ok(true)
            }
            Err(bad) => {
                writeln!(self.out, "{}\n", DashboardError::UnknownIndustry(bad))?;
                Ok(false)
            }
        }
    }

    fn choose_metrics(&mut self) -> DashboardResult<bool> {
        let listing: Vec<String> = Metric::CORRELATION_CHOICES
            .iter()
            .enumerate()
            .map(|(i, m)| format!("[{}] {}", i + 1, m.label()))
            .collect();
        writeln!(self.out, "{}", listing.join("\n"))?;
        let Some(text) = self.read_line("Metrics (numbers or names, comma separated; blank = none): ")? else {
            return Ok(false);
        };
        match parse_list(&text, &Metric::CORRELATION_CHOICES, Metric::parse) {
            Ok(metrics) => {
                let mut unique: Vec<Metric> = Vec::new();
                for m in metrics {
                    if !unique.contains(&m) {
                        unique.push(m);
                    }
                }
                self.metrics = unique;
                Ok(true)
            }
            Err(bad) => {
                writeln!(self.out, "Unknown metric '{}'.\n", bad)?;
                Ok(false)
            }
        }
    }

    fn export_report(&mut self) -> DashboardResult<()> {
        let now = (self.clock)();
        match save_report(self.dataset, &self.selection, self.settings, now, None) {
            Ok(path) => writeln!(self.out, "Report saved to {}\n", path.display())?,
            Err(e) => {
                warn!(error = %e, "report export failed");
                writeln!(self.out, "Report not generated: {}\n", e)?;
            }
        }
        Ok(())
    }

    fn export_data(&mut self) -> DashboardResult<()> {
        let now = (self.clock)();
        match save_export(self.dataset, &self.selection, self.settings, now) {
            Ok((csv, json)) => writeln!(
                self.out,
                "Filtered rows saved to {}\nSummary saved to {}\n",
                csv.display(),
                json.display()
            )?,
            Err(e) => writeln!(self.out, "Export failed: {}\n", e)?,
        }
        Ok(())
    }

    fn export_charts(&mut self) -> DashboardResult<()> {
        match save_charts(self.dataset, &self.selection, self.settings) {
            Ok(paths) => writeln!(self.out, "{} chart(s) saved to {}\n", paths.len(), self.settings.output_dir.display())?,
            Err(e) => writeln!(self.out, "Chart export failed: {}\n", e)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::{record, sample};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap()
    }

    fn run_script(data: &Dataset, settings: &Settings, script: &str) -> (String, Selection) {
        let mut out = Vec::new();
        let selection = {
            let mut session = Session::new(data, settings, Cursor::new(script.to_string()), &mut out)
                .with_clock(fixed_now);
            session.run().unwrap();
            session.selection().clone()
        };
        (String::from_utf8(out).unwrap(), selection)
    }

    #[test]
    fn initial_screen_and_exit() {
        let data = sample();
        let (out, sel) = run_script(&data, &Settings::default(), "0\n");
        assert!(out.contains("## Data overview"));
        assert!(out.contains("## Correlation"));
        assert!(out.contains("Industries | Auto, Banks, Energy, Food, Retail"));
        assert!(out.ends_with("Exiting the program.\n"));
        assert_eq!(sel.industries.len(), 5);
    }

    #[test]
    fn selections_rerender_the_view() {
        let data = sample();
        let script = "3\n6, Energy\n2\n2020\n2021\n1\ngam\n";
        let (out, sel) = run_script(&data, &Settings::default(), script);
        assert_eq!(sel.industries, vec!["Tech".to_string(), "Energy".to_string()]);
        assert_eq!(sel.years, YearRange { start: 2020, end: 2021 });
        assert_eq!(sel.company.as_deref(), Some("Gamma"));
        assert!(out.contains("## Company: Gamma"));
        // Initial render plus one per accepted change.
        assert_eq!(out.matches("## Data overview").count(), 4);
    }

    #[test]
    fn invalid_input_keeps_the_session_alive() {
        let data = sample();
        let script = "9\n2\n2022\n2019\n3\nNowhere\n1\nzzz\n1\na\n4\n\n0\n";
        let (out, sel) = run_script(&data, &Settings::default(), script);
        assert!(out.contains("Invalid choice"));
        assert!(out.contains("invalid year range"));
        assert!(out.contains("unknown industry 'Nowhere'"));
        assert!(out.contains("unknown company 'zzz'"));
        assert!(out.contains("Several companies match: Alpha, Beta, Delta, Gamma, Zeta"));
        assert!(out.contains("Select at least one metric to show the correlation matrix."));
        assert_eq!(sel.years, YearRange { start: 2019, end: 2022 });
        assert_eq!(sel.company, None);
    }

    #[test]
    fn blank_company_clears_selection() {
        let data = sample();
        let (_, sel) = run_script(&data, &Settings::default(), "1\nAlpha\n1\n\n0\n");
        assert_eq!(sel.company, None);
    }

    #[test]
    fn exports_from_the_menu() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            output_dir: dir.path().to_path_buf(),
            charts: false,
            ..Settings::default()
        };
        let data = sample();
        let (out, _) = run_script(&data, &settings, "5\n6\n0\n");
        assert!(out.contains("Report saved to"));
        assert!(dir
            .path()
            .join("digital_transformation_2019-2022_20240304050607.pdf")
            .exists());
        assert!(dir.path().join("filtered_20240304050607.csv").exists());
        assert!(dir.path().join("summary_20240304050607.json").exists());
    }

    #[test]
    fn company_view_uses_whole_dataset() {
        let mut a = record("Alpha", "Tech", 2020, 2.0);
        a.growth_rate = 12.5;
        let data = Dataset::new(vec![a, record("Beta", "Tech", 2020, 4.0)]);
        let text = render_company(&data, "Alpha", &Settings::default()).unwrap();
        assert!(text.contains("| 2020 | 3.00         | 2.00    |"));
        assert!(text.contains("12.50"));
        assert!(render_company(&data, "Nobody", &Settings::default()).is_none());
    }

    #[test]
    fn list_parsing_accepts_numbers_and_names() {
        let choices = ["a".to_string(), "b".to_string()];
        let lookup = |s: &str| (s == "b").then(|| s.to_string());
        assert_eq!(
            parse_list("2, b,1", &choices, lookup),
            Ok(vec!["b".to_string(), "b".to_string(), "a".to_string()])
        );
        assert_eq!(parse_list("", &choices, lookup), Ok(Vec::<String>::new()));
        assert_eq!(parse_list("3", &choices, lookup), Err("3".to_string()));
    }
}
