// Chart definitions for every view plus their rasterization with plotters.
//
// Text (captions, tick labels, legends) needs a registered TrueType font.
// When none can be found the charts are still drawn, just without text.
use crate::error::{DashboardError, DashboardResult};
use crate::types::{Metric, Record};
use crate::views;
use once_cell::sync::OnceCell;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PALETTE: [RGBColor; 9] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(23, 190, 207),
];

const FALLBACK_FONTS: [&str; 2] = ["SimHei.ttf", "MicrosoftYaHei.ttf"];

static TEXT_FONT: OnceCell<bool> = OnceCell::new();

/// Registers the first usable font (configured one, then the fallbacks).
/// Only the first call has an effect; returns whether chart text is enabled.
pub fn init_fonts(configured: Option<&Path>) -> bool {
    *TEXT_FONT.get_or_init(|| {
        let mut candidates: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
        candidates.extend(FALLBACK_FONTS.iter().map(PathBuf::from));
        for path in candidates {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    debug!(font = %path.display(), error = %e, "chart font not available");
                    continue;
                }
            };
            // plotters keeps a reference for the life of the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font("sans-serif", FontStyle::Normal, bytes) {
                Ok(()) => {
                    info!(font = %path.display(), "chart font registered");
                    return true;
                }
                Err(_) => warn!(font = %path.display(), "chart font rejected"),
            }
        }
        warn!("no chart font found, charts will be drawn without text");
        false
    })
}

fn text_enabled() -> bool {
    TEXT_FONT.get().copied().unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<(String, f64)>,
    /// Colour bars by sign and draw a zero line (growth charts).
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Line(LineChart),
    Bar(BarChart),
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Line(c) => &c.title,
            Chart::Bar(c) => &c.title,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Chart::Line(c) => c.series.iter().all(|s| s.points.is_empty()),
            Chart::Bar(c) => c.bars.is_empty(),
        }
    }

    /// File-name friendly version of the title.
    pub fn slug(&self) -> String {
        let slug: String = self
            .title()
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        slug.split('_').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("_")
    }
}

fn year_points(values: &[(i32, f64)]) -> Vec<(f64, f64)> {
    values.iter().map(|(y, v)| (*y as f64, *v)).collect()
}

pub fn yearly_trend_chart(rows: &[&Record]) -> Chart {
    Chart::Line(LineChart {
        title: "Total Word Frequency by Year".into(),
        x_label: "Year".into(),
        y_label: "Mean total word frequency".into(),
        series: vec![Series {
            name: "Mean total word frequency".into(),
            points: year_points(&views::yearly_trend(rows, Metric::TotalFrequency)),
        }],
    })
}

pub fn technology_average_chart(rows: &[&Record]) -> Chart {
    Chart::Bar(BarChart {
        title: "Technology Application Averages".into(),
        x_label: "Technology".into(),
        y_label: "Mean word frequency".into(),
        bars: views::technology_averages(rows)
            .into_iter()
            .map(|(m, v)| (m.label().to_string(), v))
            .collect(),
        signed: false,
    })
}

pub fn industry_distribution_chart(rows: &[&Record]) -> Chart {
    Chart::Bar(BarChart {
        title: "Digitalization Degree by Industry".into(),
        x_label: "Industry".into(),
        y_label: "Mean digitalization degree".into(),
        bars: views::industry_distribution(rows),
        signed: false,
    })
}

pub fn company_ranking_chart(rows: &[&Record], limit: usize) -> Chart {
    Chart::Bar(BarChart {
        title: format!("Top {} Companies by Digitalization", limit),
        x_label: "Company".into(),
        y_label: "Mean digitalization degree".into(),
        bars: views::company_ranking(rows, limit),
        signed: false,
    })
}

pub fn technology_trend_chart(company: &str, rows: &[&Record]) -> Chart {
    Chart::Line(LineChart {
        title: format!("{} Technology Trends", company),
        x_label: "Year".into(),
        y_label: "Word frequency".into(),
        series: views::technology_trends(rows)
            .into_iter()
            .map(|(m, pts)| Series {
                name: m.label().to_string(),
                points: year_points(&pts),
            })
            .collect(),
    })
}

pub fn growth_chart(company: &str, rows: &[&Record]) -> Chart {
    Chart::Bar(BarChart {
        title: format!("{} Annual Growth Rate", company),
        x_label: "Year".into(),
        y_label: "Growth rate (%)".into(),
        bars: views::growth_rates(rows)
            .into_iter()
            .map(|(y, v)| (y.to_string(), v))
            .collect(),
        signed: true,
    })
}

pub fn industry_comparison_chart(company: &str, industry: &str, all: &[&Record], rows: &[&Record]) -> Chart {
    let points = views::industry_comparison(all, rows);
    Chart::Line(LineChart {
        title: format!("{} vs {} Industry Digitalization", company, industry),
        x_label: "Year".into(),
        y_label: "Digitalization degree".into(),
        series: vec![
            Series {
                name: "Industry average".into(),
                points: points.iter().map(|p| (p.year as f64, p.industry_avg)).collect(),
            },
            Series {
                name: company.to_string(),
                points: points.iter().map(|p| (p.year as f64, p.company)).collect(),
            },
        ],
    })
}

/// Charts of the overview page, in display order.
pub fn overview_charts(rows: &[&Record], ranking_size: usize) -> Vec<Chart> {
    vec![
        yearly_trend_chart(rows),
        technology_average_chart(rows),
        industry_distribution_chart(rows),
        company_ranking_chart(rows, ranking_size),
    ]
}

/// Charts of the company page. `all` is the population the industry
/// average is taken from.
pub fn company_charts(all: &[&Record], company_rows: &[&Record]) -> Vec<Chart> {
    let Some(first) = company_rows.first() else {
        return Vec::new();
    };
    vec![
        technology_trend_chart(&first.company, company_rows),
        growth_chart(&first.company, company_rows),
        industry_comparison_chart(&first.company, &first.industry, all, company_rows),
    ]
}

/// Raw 8-bit RGB pixels, row-major, no padding.
#[derive(Debug, Clone)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

fn chart_error<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Chart(e.to_string())
}

pub fn render_rgb(chart: &Chart, (width, height): (u32, u32)) -> DashboardResult<RgbImage> {
    if chart.is_empty() {
        return Err(DashboardError::Chart(format!("'{}' has no data", chart.title())));
    }
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        draw(&root, chart, text_enabled()).map_err(chart_error)?;
        root.present().map_err(chart_error)?;
    }
    Ok(RgbImage {
        width,
        height,
        pixels,
    })
}

pub fn render_png(chart: &Chart, path: &Path, size: (u32, u32)) -> DashboardResult<()> {
    if chart.is_empty() {
        return Err(DashboardError::Chart(format!("'{}' has no data", chart.title())));
    }
    let root = BitMapBackend::new(path, size).into_drawing_area();
    draw(&root, chart, text_enabled()).map_err(chart_error)?;
    root.present().map_err(chart_error)?;
    Ok(())
}

/// Writes every chart to `dir/{slug}.png`; charts that fail are logged and skipped.
pub fn write_pngs(charts: &[Chart], dir: &Path, size: (u32, u32)) -> DashboardResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for chart in charts {
        let path = dir.join(format!("{}.png", chart.slug()));
        match render_png(chart, &path, size) {
            Ok(()) => {
                debug!(chart = chart.title(), path = %path.display(), "chart written");
                written.push(path);
            }
            Err(e) => warn!(chart = chart.title(), error = %e, "chart skipped"),
        }
    }
    Ok(written)
}

type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &Chart, text: bool) -> DrawResult<DB> {
    root.fill(&WHITE)?;
    match chart {
        Chart::Line(c) => draw_line(root, c, text),
        Chart::Bar(c) => draw_bars(root, c, text),
    }
}

fn padded(min: f64, max: f64) -> std::ops::Range<f64> {
    if (max - min).abs() < f64::EPSILON {
        (min - 1.0)..(max + 1.0)
    } else {
        let pad = (max - min) * 0.08;
        (min - pad)..(max + pad)
    }
}

fn draw_line<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &LineChart, text: bool) -> DrawResult<DB> {
    let points = chart.series.iter().flat_map(|s| s.points.iter());
    let (mut x_min, mut x_max, mut y_min, mut y_max) = (f64::MAX, f64::MIN, 0.0f64, f64::MIN);
    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    let x_range = if (x_max - x_min).abs() < f64::EPSILON {
        (x_min - 0.5)..(x_max + 0.5)
    } else {
        x_min..x_max
    };

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption(&chart.title, ("sans-serif", 26))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut ctx = builder.build_cartesian_2d(x_range, padded(y_min, y_max))?;
    if text {
        ctx.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .x_label_formatter(&|x| format!("{:.0}", x))
            .draw()?;
    }

    for (idx, series) in chart.series.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let anno = ctx.draw_series(LineSeries::new(
            series.points.iter().copied(),
            color.stroke_width(2),
        ))?;
        if text {
            anno.label(series.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
        ctx.draw_series(
            series
                .points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
        )?;
    }
    if text && chart.series.len() > 1 {
        ctx.configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_bars<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, chart: &BarChart, text: bool) -> DrawResult<DB> {
    let n = chart.bars.len() as i32;
    let y_min = chart.bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::min);
    let y_max = chart.bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::max);

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption(&chart.title, ("sans-serif", 26))
            .x_label_area_size(50)
            .y_label_area_size(60);
    }
    // One segment per bar; a single-value i32 axis collapses, so keep at least two.
    let last = (n - 1).max(1);
    let mut ctx = builder.build_cartesian_2d((0..last).into_segmented(), padded(y_min, y_max))?;
    let names: Vec<&str> = chart.bars.iter().map(|(name, _)| name.as_str()).collect();
    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
            names.get(*i as usize).map(|s| s.to_string()).unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    };
    if text {
        ctx.configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len())
            .x_label_formatter(&label)
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()?;
    }

    ctx.draw_series(chart.bars.iter().enumerate().map(|(i, (_, v))| {
        let color = if !chart.signed {
            PALETTE[i % PALETTE.len()]
        } else if *v < 0.0 {
            RGBColor(215, 48, 39)
        } else {
            RGBColor(26, 152, 80)
        };
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i as i32), 0.0),
                (SegmentValue::Exact(i as i32 + 1), *v),
            ],
            color.filled(),
        );
        bar.set_margin(0, 0, 6, 6);
        bar
    }))?;

    if chart.signed {
        ctx.draw_series(std::iter::once(PathElement::new(
            vec![(SegmentValue::Exact(0), 0.0), (SegmentValue::Exact(n), 0.0)],
            RED.stroke_width(1),
        )))?;
    }
    Ok(())
}
