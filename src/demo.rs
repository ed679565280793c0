// Synthetic company-year workbook with the full original header row, so the
// dashboard can be tried without the real data file.
use crate::error::{DashboardError, DashboardResult};
use crate::types::{Field, Metric, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const INDUSTRIES: [(&str, &str, f64); 8] = [
    ("C39", "Computer and Electronics", 2.2),
    ("I65", "Software and IT Services", 2.6),
    ("J66", "Banking", 1.6),
    ("C27", "Pharmaceuticals", 0.9),
    ("C36", "Automobiles", 1.2),
    ("F51", "Wholesale", 0.7),
    ("D44", "Utilities", 0.6),
    ("K70", "Real Estate", 0.5),
];

const NAME_PREFIXES: [&str; 6] = ["Huaxin", "Zhongke", "Tianrun", "Jinyu", "Hengtai", "Dongfang"];

/// Relative usage of each technology, in `Metric::TECHNOLOGIES` order.
const TECH_WEIGHTS: [f64; 9] = [1.0, 0.25, 1.2, 0.9, 0.6, 0.3, 0.8, 0.4, 0.7];

#[derive(Debug, Clone, Copy)]
pub struct DemoOptions {
    pub companies: usize,
    pub start_year: i32,
    pub end_year: i32,
    pub seed: u64,
}

fn count(rng: &mut StdRng, mean: f64) -> f64 {
    // Uniform noise around the mean, rounded to a whole count.
    let noise: f64 = rng.gen_range(0.4..1.6);
    (mean * noise).round().max(0.0)
}

/// Builds one row per company and year; the same seed gives the same rows.
pub fn generate(options: &DemoOptions) -> DashboardResult<Vec<Record>> {
    if options.start_year > options.end_year {
        return Err(DashboardError::InvalidYearRange {
            start: options.start_year,
            end: options.end_year,
        });
    }
    if options.companies == 0 {
        return Err(DashboardError::Config("demo needs at least one company".into()));
    }
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut records = Vec::new();
    let span = f64::from(options.end_year - options.start_year).max(1.0);

    for i in 0..options.companies {
        let (code, industry, intensity) = INDUSTRIES[i % INDUSTRIES.len()];
        let name = format!("{} {:03}", NAME_PREFIXES[i % NAME_PREFIXES.len()], i + 1);
        let stock_code = format!("{}", 600000 + i);
        let base = intensity * rng.gen_range(2.0..12.0);
        let adoption: f64 = rng.gen_range(0.5..2.5);
        let mut prev_total = 0.0;

        for year in options.start_year..=options.end_year {
            let progress = f64::from(year - options.start_year) / span;
            let level = base * (1.0 + adoption * progress);
            let mut r = Record {
                stock_code: stock_code.clone(),
                company: name.clone(),
                industry_code: code.to_string(),
                industry: industry.to_string(),
                year,
                ..Record::default()
            };
            let mut kinds = 0.0;
            let mut total = 0.0;
            for (metric, weight) in Metric::TECHNOLOGIES.iter().zip(TECH_WEIGHTS) {
                let v = count(&mut rng, level * weight);
                r.set_number(metric.field(), v);
                total += v;
                if v > 0.0 {
                    kinds += 1.0;
                }
            }
            r.enterprise_digitalization = count(&mut rng, level * 0.5);
            r.digital_operations = count(&mut rng, level * 0.3);
            r.digital_talent = count(&mut rng, level * 0.2);
            r.total_frequency = total;
            r.tech_kinds = kinds;
            r.tech_diversity = (kinds / 9.0 * 100.0).round() / 100.0;
            r.digital_degree = ((1.0 + total).ln() * (0.5 + r.tech_diversity) * 100.0).round() / 100.0;
            r.prev_total_frequency = prev_total;
            r.growth_rate = if prev_total > 0.0 {
                ((total - prev_total) / prev_total * 10000.0).round() / 100.0
            } else {
                0.0
            };
            prev_total = total;
            records.push(r);
        }
    }

    let mut per_industry: HashMap<String, usize> = HashMap::new();
    for i in 0..options.companies {
        *per_industry.entry(INDUSTRIES[i % INDUSTRIES.len()].1.to_string()).or_default() += 1;
    }
    for r in &mut records {
        r.industry_company_count = per_industry.get(&r.industry).copied().unwrap_or(0) as f64;
    }
    Ok(records)
}

/// Writes `records` under the original headers, one column per `Field`.
pub fn write_workbook(path: &Path, records: &[Record]) -> DashboardResult<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    for (col, field) in Field::ALL.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, field.header(), &bold)?;
    }
    for (i, r) in records.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, field) in Field::ALL.iter().enumerate() {
            let col = col as u16;
            match r.text(*field) {
                Some(text) => sheet.write_string(row, col, text)?,
                None => sheet.write_number(row, col, r.number(*field))?,
            };
        }
    }
    workbook.save(path)?;
    info!(path = %path.display(), rows = records.len(), "demo workbook written");
    Ok(())
}

pub fn write_demo(path: &Path, options: &DemoOptions) -> DashboardResult<usize> {
    let records = generate(options)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_workbook(path, &records)?;
    Ok(records.len())
}
