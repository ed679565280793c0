// Selection state derived from user input (company, year range, industries)
// and the lookup lists it is validated against.
use crate::error::{DashboardError, DashboardResult};
use crate::loader::Dataset;
use crate::types::Record;
use crate::util::average;
use std::collections::BTreeSet;

/// Sorted option lists and dataset-wide counters.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetIndex {
    pub companies: Vec<String>,
    pub industries: Vec<String>,
    pub min_year: i32,
    pub max_year: i32,
    pub records: usize,
    pub avg_digital_degree: f64,
}

impl DatasetIndex {
    pub fn build(dataset: &Dataset) -> Self {
        let companies: BTreeSet<&str> = dataset.records.iter().map(|r| r.company.as_str()).collect();
        let industries: BTreeSet<&str> =
            dataset.records.iter().map(|r| r.industry.as_str()).collect();
        let min_year = dataset.records.iter().map(|r| r.year).min().unwrap_or(0);
        let max_year = dataset.records.iter().map(|r| r.year).max().unwrap_or(0);
        let degrees: Vec<f64> = dataset.records.iter().map(|r| r.digital_degree).collect();
        Self {
            companies: companies.into_iter().map(str::to_string).collect(),
            industries: industries.into_iter().map(str::to_string).collect(),
            min_year,
            max_year,
            records: dataset.len(),
            avg_digital_degree: if degrees.is_empty() { f64::NAN } else { average(&degrees) },
        }
    }

    pub fn has_company(&self, name: &str) -> bool {
        self.companies.binary_search_by(|c| c.as_str().cmp(name)).is_ok()
    }

    pub fn has_industry(&self, name: &str) -> bool {
        self.industries.binary_search_by(|c| c.as_str().cmp(name)).is_ok()
    }

    /// Case-insensitive substring search used by the interactive picker.
    pub fn search_companies(&self, needle: &str) -> Vec<&str> {
        let needle = needle.trim().to_lowercase();
        self.companies
            .iter()
            .filter(|c| c.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub company: Option<String>,
    pub years: YearRange,
    pub industries: Vec<String>,
}

impl Selection {
    /// Whole year span, no company, the first `industry_count` industries.
    pub fn initial(index: &DatasetIndex, industry_count: usize) -> Self {
        Self {
            company: None,
            years: YearRange {
                start: index.min_year,
                end: index.max_year,
            },
            industries: index.industries.iter().take(industry_count).cloned().collect(),
        }
    }

    pub fn validate(&self, index: &DatasetIndex) -> DashboardResult<()> {
        if self.years.start > self.years.end {
            return Err(DashboardError::InvalidYearRange {
                start: self.years.start,
                end: self.years.end,
            });
        }
        if let Some(company) = &self.company {
            if !index.has_company(company) {
                return Err(DashboardError::UnknownCompany(company.clone()));
            }
        }
        if let Some(unknown) = self.industries.iter().find(|i| !index.has_industry(i)) {
            return Err(DashboardError::UnknownIndustry(unknown.clone()));
        }
        Ok(())
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.years.contains(record.year)
            && (self.industries.is_empty() || self.industries.iter().any(|i| *i == record.industry))
    }

    /// Rows inside the year range and industry list, in file order.
    /// The selected company does not narrow this set.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> Vec<&'a Record> {
        dataset.records.iter().filter(|r| self.matches(r)).collect()
    }

    pub fn industries_label(&self) -> String {
        if self.industries.is_empty() {
            "All industries".to_string()
        } else {
            self.industries.join(", ")
        }
    }
}
