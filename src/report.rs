// PDF report: query conditions, company or overview tables, charts,
// numbered conclusions and a generation timestamp.
use crate::charts::{self, Chart};
use crate::error::{DashboardError, DashboardResult};
use crate::filter::Selection;
use crate::loader::Dataset;
use crate::pdf::{self, Block, DocumentInfo, TableBlock, TextStyle};
use crate::types::{DetailRow, Record};
use crate::util::fixed;
use crate::views::{self, CompanyProfile};
use chrono::NaiveDateTime;
use tracing::{info, warn};

pub const REPORT_TITLE: &str = "Enterprise Digital Transformation Analysis Report";

const CHART_PIXELS: (u32, u32) = (1000, 560);
const CM: f32 = 72.0 / 2.54;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub charts: bool,
    pub detail_rows: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            charts: true,
            detail_rows: 20,
        }
    }
}

fn heading(text: &str) -> Block {
    Block::Paragraph(text.to_string(), TextStyle::Heading)
}

fn body(text: impl Into<String>) -> Block {
    Block::Paragraph(text.into(), TextStyle::Body)
}

fn key_value_table(header: [&str; 2], rows: Vec<(&str, String)>, widths: [f32; 2]) -> Block {
    let mut cells = vec![vec![header[0].to_string(), header[1].to_string()]];
    cells.extend(rows.into_iter().map(|(k, v)| vec![k.to_string(), v]));
    Block::Table(TableBlock::new(cells).with_widths(widths.to_vec()))
}

fn detail_table(rows: &[DetailRow]) -> Block {
    let mut cells = vec![DetailRow::HEADERS.iter().map(|h| h.to_string()).collect()];
    cells.extend(rows.iter().map(DetailRow::cells));
    Block::Table(TableBlock::new(cells).with_font_sizes(8.0, 7.0))
}

fn company_info_block(p: &CompanyProfile) -> Block {
    key_value_table(
        ["Item", "Value"],
        vec![
            ("Company", p.name.clone()),
            ("Stock code", p.stock_code.clone()),
            ("Industry", p.industry.clone()),
            ("Industry code", p.industry_code.clone()),
            ("Year range", format!("{} - {}", p.first_year, p.last_year)),
            ("Records", p.records.to_string()),
            ("Latest digitalization degree", fixed(p.latest_digital_degree, 2)),
        ],
        [5.0 * CM, 8.0 * CM],
    )
}

fn company_metrics_block(p: &CompanyProfile) -> Block {
    key_value_table(
        ["Metric", "Value"],
        vec![
            ("Total word frequency", fixed(p.total_frequency_sum, 0)),
            ("Technology kinds", fixed(p.latest_tech_kinds, 0)),
            ("Digitalization degree", fixed(p.latest_digital_degree, 2)),
            ("Technology diversity", fixed(p.latest_tech_diversity, 2)),
        ],
        [5.0 * CM, 5.0 * CM],
    )
}

/// Conclusion sentences for a single company within `rows`.
pub fn company_conclusions(rows: &[&Record], company: &[&Record]) -> Option<Vec<String>> {
    let p = views::company_profile(company)?;
    let peers: Vec<&Record> = rows
        .iter()
        .copied()
        .filter(|r| r.industry == p.industry)
        .collect();
    let industry_avg = views::summarize(&peers).avg_digital_degree;
    let top_tech = views::top_technology_by_sum(company)?;
    Some(vec![
        format!(
            "1. {} digitalization degree is {}; the {} industry average is {}.",
            p.name,
            fixed(p.avg_digital_degree, 2),
            p.industry,
            fixed(industry_avg, 2)
        ),
        format!(
            "2. The most widely applied technology of {} is {}.",
            p.name,
            top_tech.label()
        ),
        format!(
            "3. {} has data for {} - {}, {} records in total.",
            p.name, p.first_year, p.last_year, p.records
        ),
        format!(
            "4. The latest digitalization degree of {} is {}.",
            p.name,
            fixed(p.latest_digital_degree, 2)
        ),
    ])
}

/// Conclusion sentences for the filtered population.
pub fn overview_conclusions(rows: &[&Record]) -> Option<Vec<String>> {
    let top_industry = views::top_industry(rows)?;
    let top_company = views::top_company(rows)?;
    let top_tech = views::top_technology_by_mean(rows)?;
    let avg = views::summarize(rows).avg_digital_degree;
    Some(vec![
        format!(
            "1. In the selected period the most digitalized industry is {}.",
            top_industry
        ),
        format!("2. The most digitalized company is {}.", top_company),
        format!("3. The most widely applied technology is {}.", top_tech.label()),
        format!("4. The average digitalization degree is {}.", fixed(avg, 2)),
    ])
}

fn chart_blocks(charts: Vec<Chart>) -> Vec<Block> {
    let mut blocks = Vec::new();
    for chart in charts {
        match charts::render_rgb(&chart, CHART_PIXELS) {
            Ok(image) => {
                blocks.push(body(chart.title().to_string()));
                blocks.push(Block::Image {
                    image,
                    width: pdf::FRAME_WIDTH,
                });
                blocks.push(Block::Spacer(12.0));
            }
            Err(e) => warn!(chart = chart.title(), error = %e, "chart skipped in report"),
        }
    }
    blocks
}

/// Assembles the report blocks for `selection` over the filtered rows.
pub fn report_blocks(
    dataset: &Dataset,
    selection: &Selection,
    now: NaiveDateTime,
    options: ReportOptions,
) -> DashboardResult<Vec<Block>> {
    let rows = selection.apply(dataset);
    let mut blocks = vec![
        Block::Paragraph(REPORT_TITLE.to_string(), TextStyle::Title),
        Block::Spacer(12.0),
        heading("Query conditions:"),
        body(format!(
            "Year range: {} - {}",
            selection.years.start, selection.years.end
        )),
        body(format!("Selected industries: {}", selection.industries_label())),
    ];
    if let Some(company) = &selection.company {
        blocks.push(body(format!("Selected company: {}", company)));
    }
    blocks.push(Block::Spacer(12.0));

    let conclusions = match &selection.company {
        Some(name) => {
            let company = views::company_rows(rows.iter().copied(), name);
            let profile = views::company_profile(&company)
                .ok_or_else(|| DashboardError::CompanyNotInSelection(name.clone()))?;
            blocks.push(heading("Company information:"));
            blocks.push(company_info_block(&profile));
            blocks.push(Block::Spacer(12.0));
            blocks.push(heading("Digitalization metrics:"));
            blocks.push(company_metrics_block(&profile));
            blocks.push(Block::Spacer(12.0));
            blocks.push(heading("Company detail data:"));
            blocks.push(detail_table(&views::company_detail(&company, options.detail_rows)));
            blocks.push(Block::Spacer(12.0));
            if options.charts {
                let all = charts::company_charts(&rows, &company);
                // Growth and industry comparison; the nine-series trend chart
                // is left to the PNG export.
                blocks.extend(chart_blocks(all.into_iter().skip(1).collect()));
            }
            company_conclusions(&rows, &company)
                .ok_or_else(|| DashboardError::CompanyNotInSelection(name.clone()))?
        }
        None => {
            if rows.is_empty() {
                return Err(DashboardError::EmptySelection);
            }
            let summary = views::summarize(&rows);
            blocks.push(heading("Data overview:"));
            blocks.push(key_value_table(
                ["Metric", "Value"],
                vec![
                    ("Records", summary.records.to_string()),
                    ("Companies", summary.companies.to_string()),
                    ("Industries", summary.industries.to_string()),
                    ("Average digitalization degree", fixed(summary.avg_digital_degree, 2)),
                ],
                [6.0 * CM, 5.0 * CM],
            ));
            blocks.push(Block::Spacer(12.0));
            blocks.push(heading("Data detail:"));
            blocks.push(detail_table(&views::head_detail(&rows, options.detail_rows)));
            blocks.push(Block::Spacer(12.0));
            if options.charts {
                blocks.extend(chart_blocks(vec![
                    charts::yearly_trend_chart(&rows),
                    charts::technology_average_chart(&rows),
                ]));
            }
            overview_conclusions(&rows).ok_or(DashboardError::EmptySelection)?
        }
    };

    blocks.push(heading("Conclusions:"));
    blocks.extend(conclusions.into_iter().map(body));
    blocks.push(Block::Spacer(12.0));
    blocks.push(body(format!(
        "Report generated at: {}",
        now.format("%Y-%m-%d %H:%M:%S")
    )));
    Ok(blocks)
}

/// Builds the complete PDF document as bytes.
pub fn build_report(
    dataset: &Dataset,
    selection: &Selection,
    now: NaiveDateTime,
    options: ReportOptions,
) -> DashboardResult<Vec<u8>> {
    let blocks = report_blocks(dataset, selection, now, options)?;
    let bytes = pdf::render(
        &blocks,
        &DocumentInfo {
            title: REPORT_TITLE.to_string(),
            created: now,
        },
    )?;
    info!(bytes = bytes.len(), blocks = blocks.len(), "report rendered");
    Ok(bytes)
}

/// `{company}_{stamp}.pdf` or `digital_transformation_{start}-{end}_{stamp}.pdf`.
pub fn report_filename(selection: &Selection, now: NaiveDateTime) -> String {
    let stamp = now.format("%Y%m%d%H%M%S");
    match &selection.company {
        Some(company) => {
            let safe: String = company
                .chars()
                .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
                .collect();
            format!("{}_{}.pdf", safe, stamp)
        }
        None => format!(
            "digital_transformation_{}-{}_{}.pdf",
            selection.years.start, selection.years.end, stamp
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::record;
    use crate::filter::YearRange;
    use crate::pdf::tests::{image_count, page_texts};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap()
    }

    fn dataset() -> Dataset {
        let mut a1 = record("Alpha", "Tech", 2020, 1.0);
        a1.cloud_computing = 4.0;
        a1.big_data = 1.0;
        a1.total_frequency = 10.0;
        let mut a2 = record("Alpha", "Tech", 2021, 3.0);
        a2.big_data = 5.0;
        a2.total_frequency = 20.0;
        a2.tech_kinds = 2.0;
        a2.tech_diversity = 0.22;
        let mut b = record("Beta", "Tech", 2021, 5.0);
        b.artificial_intelligence = 9.0;
        let c = record("Gamma", "Retail", 2021, 2.0);
        Dataset::new(vec![a1, a2, b, c])
    }

    fn selection(company: Option<&str>) -> Selection {
        Selection {
            company: company.map(str::to_string),
            years: YearRange { start: 2020, end: 2021 },
            industries: vec![],
        }
    }

    fn options() -> ReportOptions {
        ReportOptions {
            charts: false,
            detail_rows: 20,
        }
    }

    fn paragraphs(blocks: &[Block]) -> Vec<String> {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(t, _) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn overview_report_conclusions() {
        let data = dataset();
        let blocks = report_blocks(&data, &selection(None), now(), options()).unwrap();
        let text = paragraphs(&blocks);
        assert_eq!(text[0], REPORT_TITLE);
        assert!(text.contains(&"Selected industries: All industries".to_string()));
        assert!(text.contains(&"1. In the selected period the most digitalized industry is Tech.".to_string()));
        assert!(text.contains(&"2. The most digitalized company is Beta.".to_string()));
        assert!(text.contains(&"3. The most widely applied technology is Artificial Intelligence.".to_string()));
        assert!(text.contains(&"4. The average digitalization degree is 2.75.".to_string()));
        assert_eq!(text.last().unwrap(), "Report generated at: 2024-05-06 07:08:09");
    }

    #[test]
    fn company_report_conclusions() {
        let data = dataset();
        let blocks = report_blocks(&data, &selection(Some("Alpha")), now(), options()).unwrap();
        let text = paragraphs(&blocks);
        assert!(text.contains(&"Selected company: Alpha".to_string()));
        assert!(text.contains(&"1. Alpha digitalization degree is 2.00; the Tech industry average is 3.00.".to_string()));
        assert!(text.contains(&"2. The most widely applied technology of Alpha is Big Data.".to_string()));
        assert!(text.contains(&"3. Alpha has data for 2020 - 2021, 2 records in total.".to_string()));
        assert!(text.contains(&"4. The latest digitalization degree of Alpha is 3.00.".to_string()));

        let tables: Vec<&TableBlock> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].rows[1], vec!["Total word frequency".to_string(), "30".to_string()]);
        // Detail table: newest year first.
        assert_eq!(tables[2].rows[1][0], "2021");
        assert_eq!(tables[2].rows[2][0], "2020");
    }

    #[test]
    fn company_outside_the_filter_is_an_error() {
        let data = dataset();
        let mut sel = selection(Some("Gamma"));
        sel.industries = vec!["Tech".into()];
        let err = report_blocks(&data, &sel, now(), options()).unwrap_err();
        assert!(matches!(err, DashboardError::CompanyNotInSelection(ref c) if c == "Gamma"));
    }

    #[test]
    fn empty_selection_is_an_error() {
        let data = dataset();
        let mut sel = selection(None);
        sel.years = YearRange { start: 1990, end: 1991 };
        assert!(matches!(
            report_blocks(&data, &sel, now(), options()),
            Err(DashboardError::EmptySelection)
        ));
    }

    #[test]
    fn detail_rows_are_capped() {
        let data = Dataset::new((0..30).map(|i| record(&format!("C{}", i), "X", 2020, 1.0)).collect());
        let blocks = report_blocks(&data, &selection(None), now(), options()).unwrap();
        let detail = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) if t.rows[0][0] == "Year" => Some(t),
                _ => None,
            })
            .next()
            .unwrap();
        assert_eq!(detail.rows.len(), 21);
    }

    #[test]
    fn pdf_bytes_contain_the_report() {
        let data = dataset();
        let bytes = build_report(&data, &selection(None), now(), options()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let all: Vec<String> = page_texts(&bytes).into_iter().flatten().collect();
        assert!(all.contains(&"Conclusions:".to_string()));
        assert!(all.contains(&"4. The average digitalization degree is 2.75.".to_string()));
        assert!(all.contains(&"Report generated at: 2024-05-06 07:08:09".to_string()));
    }

    fn chart_titles(blocks: &[Block]) -> Vec<String> {
        blocks
            .windows(2)
            .filter_map(|w| match w {
                [Block::Paragraph(title, _), Block::Image { image, .. }] => {
                    assert_eq!((image.width, image.height), CHART_PIXELS);
                    Some(title.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn charts_are_embedded() {
        let data = dataset();
        let with_charts = ReportOptions::default();

        let overview = report_blocks(&data, &selection(None), now(), with_charts).unwrap();
        assert_eq!(
            chart_titles(&overview),
            vec![
                "Total Word Frequency by Year".to_string(),
                "Technology Application Averages".to_string()
            ]
        );

        let company = report_blocks(&data, &selection(Some("Alpha")), now(), with_charts).unwrap();
        assert_eq!(chart_titles(&company).len(), 2);

        let bytes = build_report(&data, &selection(None), now(), with_charts).unwrap();
        assert_eq!(image_count(&bytes), 2);
        assert_eq!(image_count(&build_report(&data, &selection(None), now(), options()).unwrap()), 0);
    }

    #[test]
    fn filenames() {
        assert_eq!(
            report_filename(&selection(None), now()),
            "digital_transformation_2020-2021_20240506070809.pdf"
        );
        assert_eq!(
            report_filename(&selection(Some("A/B")), now()),
            "A_B_20240506070809.pdf"
        );
    }
}
