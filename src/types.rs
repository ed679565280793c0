use serde::Serialize;
use tabled::Tabled;

/// Every column the loader understands, with the original header text and
/// an English alias that is accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StockCode,
    Company,
    IndustryCode,
    Industry,
    Year,
    TotalFrequency,
    ArtificialIntelligence,
    Blockchain,
    BigData,
    CloudComputing,
    InternetOfThings,
    FiveG,
    DigitalPlatform,
    DigitalSecurity,
    SmartIndustry,
    EnterpriseDigitalization,
    DigitalOperations,
    DigitalTalent,
    TechDiversity,
    TechKinds,
    DigitalDegree,
    PrevTotalFrequency,
    GrowthRate,
    IndustryCompanyCount,
}

impl Field {
    pub const ALL: [Field; 24] = [
        Field::StockCode,
        Field::Company,
        Field::IndustryCode,
        Field::Industry,
        Field::Year,
        Field::TotalFrequency,
        Field::ArtificialIntelligence,
        Field::Blockchain,
        Field::BigData,
        Field::CloudComputing,
        Field::InternetOfThings,
        Field::FiveG,
        Field::DigitalPlatform,
        Field::DigitalSecurity,
        Field::SmartIndustry,
        Field::EnterpriseDigitalization,
        Field::DigitalOperations,
        Field::DigitalTalent,
        Field::TechDiversity,
        Field::TechKinds,
        Field::DigitalDegree,
        Field::PrevTotalFrequency,
        Field::GrowthRate,
        Field::IndustryCompanyCount,
    ];

    /// Columns without which no view can be computed.
    pub const REQUIRED: [Field; 4] = [
        Field::Company,
        Field::Industry,
        Field::Year,
        Field::DigitalDegree,
    ];

    /// Header as it appears in the source workbook.
    pub fn header(self) -> &'static str {
        match self {
            Field::StockCode => "股票代码",
            Field::Company => "企业名称",
            Field::IndustryCode => "行业代码",
            Field::Industry => "行业名称",
            Field::Year => "年份",
            Field::TotalFrequency => "总词频",
            Field::ArtificialIntelligence => "人工智能",
            Field::Blockchain => "区块链",
            Field::BigData => "大数据",
            Field::CloudComputing => "云计算",
            Field::InternetOfThings => "物联网",
            Field::FiveG => "5G通信",
            Field::DigitalPlatform => "数字平台",
            Field::DigitalSecurity => "数字安全",
            Field::SmartIndustry => "智慧行业应用",
            Field::EnterpriseDigitalization => "企业数字化",
            Field::DigitalOperations => "数字运营",
            Field::DigitalTalent => "数字人才",
            Field::TechDiversity => "技术多样性",
            Field::TechKinds => "技术种类数",
            Field::DigitalDegree => "数字化程度",
            Field::PrevTotalFrequency => "上年总词频",
            Field::GrowthRate => "年度增长率",
            Field::IndustryCompanyCount => "行业公司数",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            Field::StockCode => "stock_code",
            Field::Company => "company",
            Field::IndustryCode => "industry_code",
            Field::Industry => "industry",
            Field::Year => "year",
            Field::TotalFrequency => "total_frequency",
            Field::ArtificialIntelligence => "artificial_intelligence",
            Field::Blockchain => "blockchain",
            Field::BigData => "big_data",
            Field::CloudComputing => "cloud_computing",
            Field::InternetOfThings => "internet_of_things",
            Field::FiveG => "5g_communication",
            Field::DigitalPlatform => "digital_platform",
            Field::DigitalSecurity => "digital_security",
            Field::SmartIndustry => "smart_industry_application",
            Field::EnterpriseDigitalization => "enterprise_digitalization",
            Field::DigitalOperations => "digital_operations",
            Field::DigitalTalent => "digital_talent",
            Field::TechDiversity => "tech_diversity",
            Field::TechKinds => "tech_kinds",
            Field::DigitalDegree => "digital_degree",
            Field::PrevTotalFrequency => "prev_total_frequency",
            Field::GrowthRate => "growth_rate",
            Field::IndustryCompanyCount => "industry_company_count",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            Field::StockCode | Field::Company | Field::IndustryCode | Field::Industry
        )
    }
}

/// Numeric indicators that can be aggregated, ranked and correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    ArtificialIntelligence,
    Blockchain,
    BigData,
    CloudComputing,
    InternetOfThings,
    FiveG,
    DigitalPlatform,
    DigitalSecurity,
    SmartIndustry,
    TotalFrequency,
    DigitalDegree,
    TechDiversity,
}

impl Metric {
    /// The nine technology word-frequency metrics, in tie-break order.
    pub const TECHNOLOGIES: [Metric; 9] = [
        Metric::ArtificialIntelligence,
        Metric::Blockchain,
        Metric::BigData,
        Metric::CloudComputing,
        Metric::InternetOfThings,
        Metric::FiveG,
        Metric::DigitalPlatform,
        Metric::DigitalSecurity,
        Metric::SmartIndustry,
    ];

    pub const CORRELATION_CHOICES: [Metric; 12] = [
        Metric::ArtificialIntelligence,
        Metric::Blockchain,
        Metric::BigData,
        Metric::CloudComputing,
        Metric::InternetOfThings,
        Metric::FiveG,
        Metric::DigitalPlatform,
        Metric::DigitalSecurity,
        Metric::SmartIndustry,
        Metric::TotalFrequency,
        Metric::DigitalDegree,
        Metric::TechDiversity,
    ];

    pub const DEFAULT_CORRELATION: [Metric; 4] = [
        Metric::ArtificialIntelligence,
        Metric::BigData,
        Metric::CloudComputing,
        Metric::DigitalDegree,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::ArtificialIntelligence => "Artificial Intelligence",
            Metric::Blockchain => "Blockchain",
            Metric::BigData => "Big Data",
            Metric::CloudComputing => "Cloud Computing",
            Metric::InternetOfThings => "Internet of Things",
            Metric::FiveG => "5G Communication",
            Metric::DigitalPlatform => "Digital Platform",
            Metric::DigitalSecurity => "Digital Security",
            Metric::SmartIndustry => "Smart Industry Application",
            Metric::TotalFrequency => "Total Word Frequency",
            Metric::DigitalDegree => "Digitalization Degree",
            Metric::TechDiversity => "Technology Diversity",
        }
    }

    pub fn field(self) -> Field {
        match self {
            Metric::ArtificialIntelligence => Field::ArtificialIntelligence,
            Metric::Blockchain => Field::Blockchain,
            Metric::BigData => Field::BigData,
            Metric::CloudComputing => Field::CloudComputing,
            Metric::InternetOfThings => Field::InternetOfThings,
            Metric::FiveG => Field::FiveG,
            Metric::DigitalPlatform => Field::DigitalPlatform,
            Metric::DigitalSecurity => Field::DigitalSecurity,
            Metric::SmartIndustry => Field::SmartIndustry,
            Metric::TotalFrequency => Field::TotalFrequency,
            Metric::DigitalDegree => Field::DigitalDegree,
            Metric::TechDiversity => Field::TechDiversity,
        }
    }

    /// Accepts the display label, the column alias or the original header.
    pub fn parse(s: &str) -> Option<Metric> {
        let raw = s.trim();
        let needle = raw.to_lowercase();
        Metric::CORRELATION_CHOICES.into_iter().find(|m| {
            m.label().to_lowercase() == needle
                || m.field().alias() == needle
                || m.field().header() == raw
        })
    }

    pub fn value(self, r: &Record) -> f64 {
        r.number(self.field())
    }
}

/// One cleaned company-year row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub stock_code: String,
    pub company: String,
    pub industry_code: String,
    pub industry: String,
    pub year: i32,
    pub total_frequency: f64,
    pub artificial_intelligence: f64,
    pub blockchain: f64,
    pub big_data: f64,
    pub cloud_computing: f64,
    pub internet_of_things: f64,
    #[serde(rename = "5g_communication")]
    pub five_g: f64,
    pub digital_platform: f64,
    pub digital_security: f64,
    pub smart_industry: f64,
    pub enterprise_digitalization: f64,
    pub digital_operations: f64,
    pub digital_talent: f64,
    pub tech_diversity: f64,
    pub tech_kinds: f64,
    pub digital_degree: f64,
    pub prev_total_frequency: f64,
    pub growth_rate: f64,
    pub industry_company_count: f64,
}

impl Record {
    pub fn set_text(&mut self, field: Field, value: String) {
        match field {
            Field::StockCode => self.stock_code = value,
            Field::Company => self.company = value,
            Field::IndustryCode => self.industry_code = value,
            Field::Industry => self.industry = value,
            _ => {}
        }
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::StockCode => Some(&self.stock_code),
            Field::Company => Some(&self.company),
            Field::IndustryCode => Some(&self.industry_code),
            Field::Industry => Some(&self.industry),
            _ => None,
        }
    }

    /// Numeric value of `field`; text fields read as 0.
    pub fn number(&self, field: Field) -> f64 {
        match field {
            Field::Year => f64::from(self.year),
            Field::TotalFrequency => self.total_frequency,
            Field::ArtificialIntelligence => self.artificial_intelligence,
            Field::Blockchain => self.blockchain,
            Field::BigData => self.big_data,
            Field::CloudComputing => self.cloud_computing,
            Field::InternetOfThings => self.internet_of_things,
            Field::FiveG => self.five_g,
            Field::DigitalPlatform => self.digital_platform,
            Field::DigitalSecurity => self.digital_security,
            Field::SmartIndustry => self.smart_industry,
            Field::EnterpriseDigitalization => self.enterprise_digitalization,
            Field::DigitalOperations => self.digital_operations,
            Field::DigitalTalent => self.digital_talent,
            Field::TechDiversity => self.tech_diversity,
            Field::TechKinds => self.tech_kinds,
            Field::DigitalDegree => self.digital_degree,
            Field::PrevTotalFrequency => self.prev_total_frequency,
            Field::GrowthRate => self.growth_rate,
            Field::IndustryCompanyCount => self.industry_company_count,
            Field::StockCode | Field::Company | Field::IndustryCode | Field::Industry => 0.0,
        }
    }

    pub fn set_number(&mut self, field: Field, value: f64) {
        match field {
            Field::Year => self.year = value.trunc() as i32,
            Field::TotalFrequency => self.total_frequency = value,
            Field::ArtificialIntelligence => self.artificial_intelligence = value,
            Field::Blockchain => self.blockchain = value,
            Field::BigData => self.big_data = value,
            Field::CloudComputing => self.cloud_computing = value,
            Field::InternetOfThings => self.internet_of_things = value,
            Field::FiveG => self.five_g = value,
            Field::DigitalPlatform => self.digital_platform = value,
            Field::DigitalSecurity => self.digital_security = value,
            Field::SmartIndustry => self.smart_industry = value,
            Field::EnterpriseDigitalization => self.enterprise_digitalization = value,
            Field::DigitalOperations => self.digital_operations = value,
            Field::DigitalTalent => self.digital_talent = value,
            Field::TechDiversity => self.tech_diversity = value,
            Field::TechKinds => self.tech_kinds = value,
            Field::DigitalDegree => self.digital_degree = value,
            Field::PrevTotalFrequency => self.prev_total_frequency = value,
            Field::GrowthRate => self.growth_rate = value,
            Field::IndustryCompanyCount => self.industry_company_count = value,
            Field::StockCode | Field::Company | Field::IndustryCode | Field::Industry => {}
        }
    }
}

#[derive(Debug, Tabled, Clone)]
pub struct KeyValueRow {
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl KeyValueRow {
    pub fn new(item: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            value: value.into(),
        }
    }
}

/// Compact per-row rendering shared by the console tables and the PDF.
#[derive(Debug, Tabled, Clone, PartialEq)]
pub struct DetailRow {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Stock Code")]
    pub stock_code: String,
    #[tabled(rename = "Company")]
    pub company: String,
    #[tabled(rename = "Industry")]
    pub industry: String,
    #[tabled(rename = "Total Freq")]
    pub total_frequency: String,
    #[tabled(rename = "Tech Kinds")]
    pub tech_kinds: String,
    #[tabled(rename = "Diversity")]
    pub tech_diversity: String,
    #[tabled(rename = "Degree")]
    pub digital_degree: String,
    #[tabled(rename = "Growth %")]
    pub growth_rate: String,
}

impl DetailRow {
    pub const HEADERS: [&'static str; 9] = [
        "Year",
        "Stock Code",
        "Company",
        "Industry",
        "Total Freq",
        "Tech Kinds",
        "Diversity",
        "Degree",
        "Growth %",
    ];

    pub fn cells(&self) -> Vec<String> {
        vec![
            self.year.to_string(),
            self.stock_code.clone(),
            self.company.clone(),
            self.industry.clone(),
            self.total_frequency.clone(),
            self.tech_kinds.clone(),
            self.tech_diversity.clone(),
            self.digital_degree.clone(),
            self.growth_rate.clone(),
        ]
    }
}

#[derive(Debug, Tabled, Clone, PartialEq)]
pub struct YearValueRow {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Tabled, Clone, PartialEq)]
pub struct LabelValueRow {
    #[tabled(rename = "Name")]
    pub label: String,
    #[tabled(rename = "Mean")]
    pub value: String,
}

#[derive(Debug, Tabled, Clone, PartialEq)]
pub struct ComparisonRow {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Industry Avg")]
    pub industry_avg: String,
    #[tabled(rename = "Company")]
    pub company: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub records: usize,
    pub companies: usize,
    pub industries: usize,
    pub year_start: i32,
    pub year_end: i32,
    pub avg_digital_degree: f64,
}
