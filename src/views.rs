use crate::loader::Dataset;
use crate::types::{DetailRow, Metric, Record, SummaryStats};
use crate::util::{argmax, average, format_number, pearson};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

pub fn summarize(rows: &[&Record]) -> SummaryStats {
    let companies: BTreeSet<&str> = rows.iter().map(|r| r.company.as_str()).collect();
    let industries: BTreeSet<&str> = rows.iter().map(|r| r.industry.as_str()).collect();
    let degrees: Vec<f64> = rows.iter().map(|r| r.digital_degree).collect();
    SummaryStats {
        records: rows.len(),
        companies: companies.len(),
        industries: industries.len(),
        year_start: rows.iter().map(|r| r.year).min().unwrap_or(0),
        year_end: rows.iter().map(|r| r.year).max().unwrap_or(0),
        avg_digital_degree: if degrees.is_empty() { f64::NAN } else { average(&degrees) },
    }
}

/// Mean of `metric` per group, keyed and ordered by the group key.
fn group_means<'a, K, F>(rows: &[&'a Record], key: F, metric: Metric) -> BTreeMap<K, f64>
where
    K: Ord,
    F: Fn(&'a Record) -> K,
{
    let mut acc: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for &r in rows {
        let e = acc.entry(key(r)).or_insert((0.0, 0));
        e.0 += metric.value(r);
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

fn sorted_desc(map: BTreeMap<&str, f64>) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = map.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    // Stable sort keeps key order among equal means.
    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    out
}

/// Mean of `metric` per year, ascending by year.
pub fn yearly_trend(rows: &[&Record], metric: Metric) -> Vec<(i32, f64)> {
    group_means(rows, |r| r.year, metric).into_iter().collect()
}

pub fn technology_averages(rows: &[&Record]) -> Vec<(Metric, f64)> {
    Metric::TECHNOLOGIES
        .iter()
        .map(|m| {
            let values: Vec<f64> = rows.iter().map(|r| m.value(r)).collect();
            let mean = if values.is_empty() { f64::NAN } else { average(&values) };
            (*m, mean)
        })
        .collect()
}

pub fn technology_sums(rows: &[&Record]) -> Vec<(Metric, f64)> {
    Metric::TECHNOLOGIES
        .iter()
        .map(|m| (*m, rows.iter().map(|r| m.value(r)).sum::<f64>()))
        .collect()
}

/// Mean digitalization degree per industry, highest first.
pub fn industry_distribution(rows: &[&Record]) -> Vec<(String, f64)> {
    sorted_desc(group_means(rows, |r| r.industry.as_str(), Metric::DigitalDegree))
}

/// Mean digitalization degree per company, highest first, truncated to `limit`.
pub fn company_ranking(rows: &[&Record], limit: usize) -> Vec<(String, f64)> {
    let mut ranked = sorted_desc(group_means(rows, |r| r.company.as_str(), Metric::DigitalDegree));
    ranked.truncate(limit);
    ranked
}

/// Industry with the highest mean degree; ties go to the first name in order.
pub fn top_industry(rows: &[&Record]) -> Option<String> {
    let means = group_means(rows, |r| r.industry.as_str(), Metric::DigitalDegree);
    let idx = argmax(means.values().copied())?;
    means.keys().nth(idx).map(|k| k.to_string())
}

pub fn top_company(rows: &[&Record]) -> Option<String> {
    let means = group_means(rows, |r| r.company.as_str(), Metric::DigitalDegree);
    let idx = argmax(means.values().copied())?;
    means.keys().nth(idx).map(|k| k.to_string())
}

fn top_of(values: Vec<(Metric, f64)>) -> Option<Metric> {
    let idx = argmax(values.iter().map(|(_, v)| *v))?;
    Some(values[idx].0)
}

pub fn top_technology_by_mean(rows: &[&Record]) -> Option<Metric> {
    top_of(technology_averages(rows))
}

pub fn top_technology_by_sum(rows: &[&Record]) -> Option<Metric> {
    top_of(technology_sums(rows))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub metrics: Vec<Metric>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn correlation(rows: &[&Record], metrics: &[Metric]) -> CorrelationMatrix {
    let columns: Vec<Vec<f64>> = metrics
        .iter()
        .map(|m| rows.iter().map(|r| m.value(r)).collect())
        .collect();
    let values = columns
        .iter()
        .map(|xs| columns.iter().map(|ys| pearson(xs, ys)).collect())
        .collect();
    CorrelationMatrix {
        metrics: metrics.to_vec(),
        values,
    }
}

/// Rows of one company, in file order.
pub fn company_rows<'a, I>(rows: I, company: &str) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    rows.into_iter().filter(|r| r.company == company).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    pub stock_code: String,
    pub industry: String,
    pub industry_code: String,
    pub first_year: i32,
    pub last_year: i32,
    pub records: usize,
    pub total_frequency_sum: f64,
    pub avg_digital_degree: f64,
    pub latest_tech_kinds: f64,
    pub latest_digital_degree: f64,
    pub latest_tech_diversity: f64,
}

/// Basic facts come from the first row, "latest" values from the first row
/// of the most recent year.
pub fn company_profile(rows: &[&Record]) -> Option<CompanyProfile> {
    let first = rows.first()?;
    let last_year = rows.iter().map(|r| r.year).max()?;
    let first_year = rows.iter().map(|r| r.year).min()?;
    let latest = rows.iter().find(|r| r.year == last_year)?;
    let degrees: Vec<f64> = rows.iter().map(|r| r.digital_degree).collect();
    Some(CompanyProfile {
        name: first.company.clone(),
        stock_code: first.stock_code.clone(),
        industry: first.industry.clone(),
        industry_code: first.industry_code.clone(),
        first_year,
        last_year,
        records: rows.len(),
        total_frequency_sum: rows.iter().map(|r| r.total_frequency).sum(),
        avg_digital_degree: average(&degrees),
        latest_tech_kinds: latest.tech_kinds,
        latest_digital_degree: latest.digital_degree,
        latest_tech_diversity: latest.tech_diversity,
    })
}

fn by_year<'a>(rows: &[&'a Record]) -> Vec<&'a Record> {
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|r| r.year);
    sorted
}

/// Per-technology (year, value) series, ascending by year.
pub fn technology_trends(company: &[&Record]) -> Vec<(Metric, Vec<(i32, f64)>)> {
    let sorted = by_year(company);
    Metric::TECHNOLOGIES
        .iter()
        .map(|m| (*m, sorted.iter().map(|r| (r.year, m.value(r))).collect()))
        .collect()
}

pub fn growth_rates(company: &[&Record]) -> Vec<(i32, f64)> {
    by_year(company).iter().map(|r| (r.year, r.growth_rate)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPoint {
    pub year: i32,
    pub industry_avg: f64,
    pub company: f64,
}

/// Industry mean degree per year joined with the company's own degree on
/// year; years missing on either side are dropped.
pub fn industry_comparison(all: &[&Record], company: &[&Record]) -> Vec<ComparisonPoint> {
    let Some(first) = company.first() else {
        return Vec::new();
    };
    let peers: Vec<&Record> = all
        .iter()
        .copied()
        .filter(|r| r.industry == first.industry)
        .collect();
    let industry_avg = group_means(&peers, |r| r.year, Metric::DigitalDegree);
    let mut out = Vec::new();
    for (year, avg) in industry_avg {
        for r in company.iter().filter(|r| r.year == year) {
            out.push(ComparisonPoint {
                year,
                industry_avg: avg,
                company: r.digital_degree,
            });
        }
    }
    out
}

pub fn detail_row(r: &Record) -> DetailRow {
    DetailRow {
        year: r.year,
        stock_code: r.stock_code.clone(),
        company: r.company.clone(),
        industry: r.industry.clone(),
        total_frequency: format_number(r.total_frequency, 0),
        tech_kinds: format_number(r.tech_kinds, 0),
        tech_diversity: format_number(r.tech_diversity, 2),
        digital_degree: format_number(r.digital_degree, 2),
        growth_rate: format_number(r.growth_rate, 2),
    }
}

/// Company rows, most recent year first; equal years keep file order.
pub fn company_detail(company: &[&Record], limit: usize) -> Vec<DetailRow> {
    let mut sorted = company.to_vec();
    sorted.sort_by(|a, b| b.year.cmp(&a.year));
    sorted.into_iter().take(limit).map(detail_row).collect()
}

pub fn head_detail(rows: &[&Record], limit: usize) -> Vec<DetailRow> {
    rows.iter().take(limit).map(|r| detail_row(r)).collect()
}

pub fn all_rows(dataset: &Dataset) -> Vec<&Record> {
    dataset.records.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::{record, sample};
    use pretty_assertions::assert_eq;

    fn with_tech(mut r: Record, ai: f64, cloud: f64, total: f64) -> Record {
        r.artificial_intelligence = ai;
        r.cloud_computing = cloud;
        r.total_frequency = total;
        r
    }

    #[test]
    fn summary_over_rows() {
        let data = sample();
        let rows = all_rows(&data);
        let s = summarize(&rows);
        assert_eq!((s.records, s.companies, s.industries), (7, 6, 6));
        assert_eq!((s.year_start, s.year_end), (2019, 2022));
        assert!(summarize(&[]).avg_digital_degree.is_nan());
    }

    #[test]
    fn yearly_trend_is_ascending_means() {
        let data = Dataset::new(vec![
            with_tech(record("A", "X", 2021, 1.0), 0.0, 0.0, 10.0),
            with_tech(record("B", "X", 2020, 1.0), 0.0, 0.0, 4.0),
            with_tech(record("C", "X", 2021, 1.0), 0.0, 0.0, 20.0),
        ]);
        let rows = all_rows(&data);
        assert_eq!(
            yearly_trend(&rows, Metric::TotalFrequency),
            vec![(2020, 4.0), (2021, 15.0)]
        );
    }

    #[test]
    fn industry_and_company_rankings() {
        let data = sample();
        let rows = all_rows(&data);
        let industries = industry_distribution(&rows);
        assert_eq!(industries[0], ("Energy".to_string(), 4.0));
        assert_eq!(industries[1], ("Retail".to_string(), 2.0));
        assert_eq!(industries[2], ("Tech".to_string(), 2.0));
        // Ties keep name order: Auto before Banks.
        assert_eq!(industries[4].0, "Auto");
        assert_eq!(industries[5].0, "Banks");

        let ranking = company_ranking(&rows, 2);
        assert_eq!(ranking, vec![("Gamma".to_string(), 4.0), ("Alpha".to_string(), 2.0)]);
        assert_eq!(top_industry(&rows).as_deref(), Some("Energy"));
        assert_eq!(top_company(&rows).as_deref(), Some("Gamma"));
        assert_eq!(top_industry(&[]), None);
    }

    #[test]
    fn top_technology_tie_goes_to_list_order() {
        let data = Dataset::new(vec![
            with_tech(record("A", "X", 2020, 1.0), 2.0, 2.0, 0.0),
            with_tech(record("A", "X", 2021, 1.0), 1.0, 1.0, 0.0),
        ]);
        let rows = all_rows(&data);
        assert_eq!(top_technology_by_sum(&rows), Some(Metric::ArtificialIntelligence));
        assert_eq!(top_technology_by_mean(&rows), Some(Metric::ArtificialIntelligence));

        let data = Dataset::new(vec![with_tech(record("A", "X", 2020, 1.0), 1.0, 5.0, 0.0)]);
        assert_eq!(top_technology_by_sum(&all_rows(&data)), Some(Metric::CloudComputing));
    }

    #[test]
    fn correlation_marks_constant_columns_undefined() {
        let data = Dataset::new(vec![
            with_tech(record("A", "X", 2020, 1.0), 1.0, 2.0, 0.0),
            with_tech(record("B", "X", 2020, 2.0), 2.0, 4.0, 0.0),
            with_tech(record("C", "X", 2020, 3.0), 3.0, 6.0, 0.0),
        ]);
        let rows = all_rows(&data);
        let m = correlation(
            &rows,
            &[Metric::ArtificialIntelligence, Metric::CloudComputing, Metric::Blockchain],
        );
        assert!((m.values[0][1].unwrap() - 1.0).abs() < 1e-12);
        assert!((m.values[1][1].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(m.values[2][0], None);
        assert_eq!(m.values[2][2], None);
    }

    #[test]
    fn company_profile_uses_first_and_latest_rows() {
        let mut late = record("Alpha", "Tech", 2021, 5.0);
        late.tech_kinds = 4.0;
        late.tech_diversity = 0.44;
        late.total_frequency = 30.0;
        let mut dup = record("Alpha", "Tech", 2021, 9.0);
        dup.total_frequency = 1.0;
        let mut early = record("Alpha", "Tech", 2018, 1.0);
        early.stock_code = "first".into();
        early.total_frequency = 10.0;
        let data = Dataset::new(vec![early, late, dup, record("Other", "Tech", 2018, 3.0)]);

        let rows = company_rows(&data.records, "Alpha");
        let p = company_profile(&rows).unwrap();
        assert_eq!(p.stock_code, "first");
        assert_eq!((p.first_year, p.last_year, p.records), (2018, 2021, 3));
        assert_eq!(p.total_frequency_sum, 41.0);
        assert_eq!(p.latest_digital_degree, 5.0);
        assert_eq!(p.latest_tech_kinds, 4.0);
        assert!((p.avg_digital_degree - 5.0).abs() < 1e-12);

        let detail = company_detail(&rows, 20);
        assert_eq!(
            detail.iter().map(|d| (d.year, d.digital_degree.clone())).collect::<Vec<_>>(),
            vec![(2021, "5.00".to_string()), (2021, "9.00".to_string()), (2018, "1.00".to_string())]
        );

        let all = all_rows(&data);
        let cmp = industry_comparison(&all, &rows);
        assert_eq!(
            cmp,
            vec![
                ComparisonPoint { year: 2018, industry_avg: 2.0, company: 1.0 },
                ComparisonPoint { year: 2021, industry_avg: 7.0, company: 5.0 },
                ComparisonPoint { year: 2021, industry_avg: 7.0, company: 9.0 },
            ]
        );
        assert!(company_profile(&[]).is_none());
    }

    #[test]
    fn series_are_sorted_by_year() {
        let mut a = record("A", "X", 2021, 1.0);
        a.growth_rate = 10.0;
        let mut b = record("A", "X", 2019, 1.0);
        b.growth_rate = -5.0;
        let data = Dataset::new(vec![a, b]);
        let rows = all_rows(&data);
        assert_eq!(growth_rates(&rows), vec![(2019, -5.0), (2021, 10.0)]);
        let trends = technology_trends(&rows);
        assert_eq!(trends.len(), 9);
        assert_eq!(trends[0].1, vec![(2019, 0.0), (2021, 0.0)]);
    }
}
