// Entry point and command-line flow.
//
// Without a subcommand the interactive dashboard starts on the configured
// data file. The other subcommands render one view, write the PDF report,
// export charts or filtered data, or create a demo workbook.
mod charts;
mod dashboard;
mod demo;
mod error;
mod filter;
mod loader;
mod output;
mod pdf;
mod report;
mod settings;
mod types;
mod util;
mod views;

use clap::{Args, Parser, Subcommand};
use error::{DashboardError, DashboardResult};
use filter::{DatasetIndex, Selection, YearRange};
use loader::Dataset;
use settings::Settings;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use types::Metric;

#[derive(Parser)]
#[command(name = "digital_report")]
#[command(about = "Enterprise digital transformation dashboard and PDF report generator")]
#[command(version)]
struct Cli {
    /// Spreadsheet with company-year metrics (.xlsx, .xls, .ods or .csv)
    #[arg(long, global = true, env = "DIGITAL_REPORT_DATA")]
    data: Option<PathBuf>,

    /// Directory for reports, exports and charts
    #[arg(long, global = true, env = "DIGITAL_REPORT_OUTPUT")]
    output_dir: Option<PathBuf>,

    /// TrueType font for chart text
    #[arg(long, global = true, env = "DIGITAL_REPORT_FONT")]
    chart_font: Option<PathBuf>,

    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// First year of the range
    #[arg(long)]
    from: Option<i32>,

    /// Last year of the range
    #[arg(long)]
    to: Option<i32>,

    /// Industry to include (repeatable); defaults to the first few industries
    #[arg(long = "industry")]
    industries: Vec<String>,

    /// Include every industry
    #[arg(long, conflicts_with = "industries")]
    all_industries: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Menu-driven dashboard on stdin/stdout (default)
    Interactive,

    /// Print the population view for the filtered rows
    Overview {
        #[command(flatten)]
        filter: FilterArgs,

        /// Metrics for the correlation matrix, comma separated
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },

    /// Print the view of one company over the whole dataset
    Company {
        /// Company name as it appears in the data
        name: String,
    },

    /// Write the PDF analysis report
    Report {
        #[command(flatten)]
        filter: FilterArgs,

        /// Analyse this company instead of the whole selection
        #[arg(long)]
        company: Option<String>,

        /// Output file (default: generated name in the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave the charts out of the report
        #[arg(long)]
        no_charts: bool,
    },

    /// Write the charts of the current view as PNG files
    Charts {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        company: Option<String>,
    },

    /// Write the filtered rows as CSV plus a JSON summary
    Export {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        company: Option<String>,
    },

    /// Write a synthetic workbook with the original column headers
    Demo {
        /// Output workbook (.xlsx)
        path: PathBuf,

        #[arg(long, default_value_t = 60)]
        companies: usize,

        #[arg(long, default_value_t = 2011)]
        from: i32,

        #[arg(long, default_value_t = 2023)]
        to: i32,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Built-in defaults, then the config file, then flags and environment.
fn resolve_settings(cli: &Cli) -> DashboardResult<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(data) = &cli.data {
        settings.data_path = data.clone();
    }
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = dir.clone();
    }
    if let Some(font) = &cli.chart_font {
        settings.chart_font = Some(font.clone());
    }
    settings.check()?;
    Ok(settings)
}

fn load(settings: &Settings) -> DashboardResult<Dataset> {
    let (dataset, report) = loader::load_dataset(&settings.data_path)?;
    info!(
        path = %settings.data_path.display(),
        kept = report.kept_rows,
        dropped = report.dropped_rows,
        coerced = report.coerced_cells,
        "dataset ready"
    );
    Ok(dataset)
}

fn selection_from(
    index: &DatasetIndex,
    settings: &Settings,
    filter: &FilterArgs,
    company: Option<String>,
) -> DashboardResult<Selection> {
    let mut selection = Selection::initial(index, settings.default_industries);
    selection.years = YearRange {
        start: filter.from.unwrap_or(index.min_year),
        end: filter.to.unwrap_or(index.max_year),
    };
    if filter.all_industries {
        selection.industries.clear();
    } else if !filter.industries.is_empty() {
        selection.industries = filter.industries.clone();
    }
    selection.company = company;
    selection.validate(index)?;
    Ok(selection)
}

fn parse_metrics(names: &[String]) -> DashboardResult<Vec<Metric>> {
    if names.is_empty() {
        return Ok(Metric::DEFAULT_CORRELATION.to_vec());
    }
    names
        .iter()
        .map(|n| Metric::parse(n).ok_or_else(|| DashboardError::Config(format!("unknown metric '{}'", n))))
        .collect()
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn open(settings: &Settings) -> DashboardResult<(Dataset, DatasetIndex)> {
    charts::init_fonts(settings.chart_font.as_deref());
    let dataset = load(settings)?;
    let index = DatasetIndex::build(&dataset);
    Ok((dataset, index))
}

fn run(cli: Cli) -> DashboardResult<()> {
    let settings = resolve_settings(&cli)?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Interactive => {
            let (dataset, _) = open(&settings)?;
            println!(
                "Processing dataset... ({} rows loaded from {})\n",
                util::format_int(dataset.len()),
                settings.data_path.display()
            );
            let stdin = io::stdin();
            let stdout = io::stdout();
            dashboard::Session::new(&dataset, &settings, stdin.lock(), stdout.lock()).run()?;
        }
        Commands::Overview { filter, metrics } => {
            let (dataset, index) = open(&settings)?;
            let selection = selection_from(&index, &settings, &filter, None)?;
            let metrics = parse_metrics(&metrics)?;
            println!("{}", dashboard::render_sidebar(&index, &selection));
            println!(
                "{}",
                dashboard::render_overview(&selection.apply(&dataset), &metrics, &settings)
            );
        }
        Commands::Company { name } => {
            let (dataset, index) = open(&settings)?;
            let selection = selection_from(&index, &settings, &FilterArgs::default(), Some(name.clone()))?;
            println!("{}", dashboard::render_sidebar(&index, &selection));
            let view = dashboard::render_company(&dataset, &name, &settings)
                .ok_or(DashboardError::UnknownCompany(name))?;
            println!("{}", view);
        }
        Commands::Report {
            filter,
            company,
            output,
            no_charts,
        } => {
            let (dataset, index) = open(&settings)?;
            let selection = selection_from(&index, &settings, &filter, company)?;
            let settings = Settings {
                charts: settings.charts && !no_charts,
                ..settings
            };
            let path = dashboard::save_report(&dataset, &selection, &settings, now(), output)?;
            println!("Report saved to {}", path.display());
        }
        Commands::Charts { filter, company } => {
            let (dataset, index) = open(&settings)?;
            let selection = selection_from(&index, &settings, &filter, company)?;
            let paths = dashboard::save_charts(&dataset, &selection, &settings)?;
            for path in &paths {
                println!("{}", path.display());
            }
            println!("{} chart(s) written", paths.len());
        }
        Commands::Export { filter, company } => {
            let (dataset, index) = open(&settings)?;
            let selection = selection_from(&index, &settings, &filter, company)?;
            let (csv, json) = dashboard::save_export(&dataset, &selection, &settings, now())?;
            println!("Filtered rows saved to {}", csv.display());
            println!("Summary saved to {}", json.display());
        }
        Commands::Demo {
            path,
            companies,
            from,
            to,
            seed,
        } => {
            let options = demo::DemoOptions {
                companies,
                start_year: from,
                end_year: to,
                seed,
            };
            let rows = demo::write_demo(&path, &options)?;
            println!(
                "Demo workbook written to {} ({} rows)",
                path.display(),
                util::format_int(rows)
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::sample;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("settings.json");
        std::fs::write(&config, r#"{ "data_path": "from_config.xlsx", "output_dir": "cfg" }"#).unwrap();
        let cli = Cli::parse_from([
            "digital_report",
            "--config",
            config.to_str().unwrap(),
            "--output-dir",
            "flag",
            "overview",
        ]);
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("flag"));
        // DIGITAL_REPORT_DATA may be set in the environment running the tests.
        if std::env::var_os("DIGITAL_REPORT_DATA").is_none() {
            assert_eq!(settings.data_path, PathBuf::from("from_config.xlsx"));
        }
    }

    #[test]
    fn filter_flags_build_the_selection() {
        let data = sample();
        let index = DatasetIndex::build(&data);
        let settings = Settings::default();

        let all = FilterArgs {
            from: Some(2020),
            all_industries: true,
            ..FilterArgs::default()
        };
        let sel = selection_from(&index, &settings, &all, None).unwrap();
        assert_eq!(sel.years, YearRange { start: 2020, end: 2022 });
        assert!(sel.industries.is_empty());

        let bad = FilterArgs {
            industries: vec!["Mining".into()],
            ..FilterArgs::default()
        };
        assert!(matches!(
            selection_from(&index, &settings, &bad, None),
            Err(DashboardError::UnknownIndustry(_))
        ));
        assert!(matches!(
            selection_from(&index, &settings, &FilterArgs::default(), Some("Nope".into())),
            Err(DashboardError::UnknownCompany(_))
        ));
    }

    #[test]
    fn metric_names_are_parsed() {
        assert_eq!(parse_metrics(&[]).unwrap(), Metric::DEFAULT_CORRELATION.to_vec());
        assert_eq!(
            parse_metrics(&["big_data".into(), "数字化程度".into()]).unwrap(),
            vec![Metric::BigData, Metric::DigitalDegree]
        );
        assert!(parse_metrics(&["nope".into()]).is_err());
    }
}
