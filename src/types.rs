use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

const MONTHS_ES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// A month-year bucket. Ordering is chronological, which is the same order
/// the zero-padded `YYYY-MM` text form sorts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// `month` is 1-based; anything outside 1..=12 yields `None`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Period { year, month })
        } else {
            None
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Parse `YYYY-MM`. A longer `YYYY-MM-DD...` value is accepted and
    /// everything after the month is checked as a date, then ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if !s.starts_with(|c: char| c.is_ascii_digit()) || s.as_bytes().get(4) != Some(&b'-') {
            return None;
        }
        let date = match s.len() {
            7 => NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok()?,
            n if n >= 10 => NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()?,
            _ => return None,
        };
        Some(Period::from_date(date))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Period::from_date(Local::now().date_naive())
    }

    /// `None` when the result falls outside the `i32` year range.
    pub fn shift_years(self, years: i32) -> Option<Self> {
        Some(Period {
            year: self.year.checked_add(years)?,
            month: self.month,
        })
    }

    pub fn shift_months(self, months: i64) -> Option<Self> {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + months;
        Some(Period {
            year: i32::try_from(index.div_euclid(12)).ok()?,
            month: index.rem_euclid(12) as u32 + 1,
        })
    }

    /// Display label used by the dashboards, e.g. `Enero 2025`.
    pub fn label_es(&self) -> String {
        format!("{} {}", MONTHS_ES[(self.month - 1) as usize], self.year)
    }

    /// Inverse of [`Period::label_es`]. Month names match case-insensitively.
    pub fn parse_label_es(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace();
        let name = parts.next()?;
        let year: i32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        let idx = MONTHS_ES
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name))?;
        Period::new(year, idx as u32 + 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Inclusive period range; an unset side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodRange {
    pub start: Option<Period>,
    pub end: Option<Period>,
}

impl PeriodRange {
    pub fn new(start: Option<Period>, end: Option<Period>) -> Self {
        PeriodRange { start, end }
    }

    pub fn unbounded() -> Self {
        PeriodRange::default()
    }

    /// January through December of `year`.
    pub fn year(year: i32) -> Self {
        PeriodRange {
            start: Period::new(year, 1),
            end: Period::new(year, 12),
        }
    }

    /// `months` months back from `reference` up to and including it.
    pub fn trailing(reference: Period, months: u32) -> Self {
        PeriodRange {
            start: reference.shift_months(-i64::from(months)),
            end: Some(reference),
        }
    }

    /// The same months one year earlier. A start that cannot move back
    /// becomes open; an end that cannot move back leaves nothing to
    /// compare against, so the result is `None`.
    pub fn shifted_back_one_year(&self) -> Option<Self> {
        let end = match self.end {
            Some(e) => Some(e.shift_years(-1)?),
            None => None,
        };
        Some(PeriodRange {
            start: self.start.and_then(|p| p.shift_years(-1)),
            end,
        })
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start.map_or(true, |s| period >= s) && self.end.map_or(true, |e| period <= e)
    }
}

/// Filterable text fields of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Group,
    Company,
    CaseType,
    UrgencyType,
    Specialist,
}

impl Facet {
    pub fn all() -> [Facet; 5] {
        [
            Facet::Group,
            Facet::Company,
            Facet::CaseType,
            Facet::UrgencyType,
            Facet::Specialist,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Group => "group",
            Facet::Company => "company",
            Facet::CaseType => "case type",
            Facet::UrgencyType => "urgency",
            Facet::Specialist => "specialist",
        }
    }
}

/// Numeric field accumulated into buckets and rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Metric {
    #[default]
    Cases,
    Cost,
    Price,
    Margin,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cases => "cases",
            Metric::Cost => "cost",
            Metric::Price => "price",
            Metric::Margin => "margin",
        }
    }
}

/// Record as it appears in the dashboard JSON. Every field is read as a
/// loose JSON value: numbers usually arrive as strings, text fields
/// sometimes arrive as numbers, and nulls show up anywhere.
#[derive(Debug, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "nombre_grupo", default)]
    pub group_name: Option<serde_json::Value>,
    #[serde(rename = "empresa", default)]
    pub company: Option<serde_json::Value>,
    #[serde(rename = "mes_anio", default)]
    pub period: Option<serde_json::Value>,
    #[serde(rename = "total_casos", default)]
    pub case_count: Option<serde_json::Value>,
    #[serde(rename = "nombre_usuario", default)]
    pub user_name: Option<serde_json::Value>,
    #[serde(rename = "tipo_urgencia", default)]
    pub urgency_type: Option<serde_json::Value>,
    #[serde(rename = "tipo_locale", default)]
    pub case_type: Option<serde_json::Value>,
    #[serde(rename = "total_coste", default)]
    pub cost: Option<serde_json::Value>,
    #[serde(rename = "total_precio", default)]
    pub price: Option<serde_json::Value>,
    #[serde(rename = "margen", default)]
    pub margin: Option<serde_json::Value>,
}

/// A cleaned business record. Missing text fields are empty strings and
/// missing or malformed numbers are 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub group_name: String,
    pub company: String,
    pub period: Period,
    pub case_count: f64,
    pub user_name: String,
    pub urgency_type: String,
    pub case_type: String,
    pub cost: f64,
    pub price: f64,
    pub margin: f64,
}

impl Record {
    pub fn facet(&self, facet: Facet) -> &str {
        match facet {
            Facet::Group => &self.group_name,
            Facet::Company => &self.company,
            Facet::CaseType => &self.case_type,
            Facet::UrgencyType => &self.urgency_type,
            Facet::Specialist => &self.user_name,
        }
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cases => self.case_count,
            Metric::Cost => self.cost,
            Metric::Price => self.price,
            Metric::Margin => self.margin,
        }
    }
}

/// Currently selected facet values plus the period range. `None` means
/// "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub group: Option<String>,
    pub company: Option<String>,
    pub case_type: Option<String>,
    pub urgency_type: Option<String>,
    pub specialist: Option<String>,
    pub range: PeriodRange,
}

impl FilterSet {
    pub fn get(&self, facet: Facet) -> Option<&str> {
        let slot = match facet {
            Facet::Group => &self.group,
            Facet::Company => &self.company,
            Facet::CaseType => &self.case_type,
            Facet::UrgencyType => &self.urgency_type,
            Facet::Specialist => &self.specialist,
        };
        slot.as_deref().filter(|v| !v.is_empty())
    }

    /// Set or clear a facet. An empty string clears it.
    pub fn set(&mut self, facet: Facet, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        let slot = match facet {
            Facet::Group => &mut self.group,
            Facet::Company => &mut self.company,
            Facet::CaseType => &mut self.case_type,
            Facet::UrgencyType => &mut self.urgency_type,
            Facet::Specialist => &mut self.specialist,
        };
        *slot = value;
    }

    pub fn with(mut self, facet: Facet, value: &str) -> Self {
        self.set(facet, Some(value.to_string()));
        self
    }

    pub fn with_range(mut self, range: PeriodRange) -> Self {
        self.range = range;
        self
    }

    /// Every facet except urgency, exact and case-sensitive.
    pub fn matches_facets(&self, record: &Record) -> bool {
        [Facet::Group, Facet::Specialist, Facet::Company, Facet::CaseType]
            .into_iter()
            .all(|facet| self.get(facet).map_or(true, |v| record.facet(facet) == v))
    }

    pub fn matches_urgency(&self, record: &Record) -> bool {
        self.get(Facet::UrgencyType)
            .map_or(true, |v| record.urgency_type == v)
    }

    /// Facets, urgency and range together.
    pub fn matches(&self, record: &Record) -> bool {
        self.matches_facets(record)
            && self.matches_urgency(record)
            && self.range.contains(record.period)
    }
}

/// Order of the rows returned by the period aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bucket {
    pub total: f64,
    pub filtered: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub period: Period,
    pub total: f64,
    pub filtered: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub label: String,
    pub value: f64,
    pub share_percent: f64,
}

/// Year-over-year comparison. `has_baseline` is false when the prior
/// range summed to zero or less, in which case `delta_percent` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Variance {
    pub current_total: f64,
    pub prior_total: f64,
    pub delta: f64,
    pub delta_percent: f64,
    pub has_baseline: bool,
}

/// Point of a pre-aggregated `{ "x": label, "y": value }` dataset. The
/// per-client pie datasets also carry the client's tax id (`cif`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelValue {
    pub x: Option<String>,
    pub y: f64,
    pub cif: Option<String>,
}

/// One line of a client sales export (`empresa`, `fecha`, `importe`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSale {
    pub company: String,
    pub date: NaiveDate,
    pub amount: f64,
}

/// A labelled series from a `{ "datasets": [...] }` comparison document.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub points: Vec<LabelValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub label: String,
    pub values: Vec<f64>,
}

/// Several series aligned on a shared category axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Comparison {
    pub categories: Vec<String>,
    pub series: Vec<NamedSeries>,
}

/// Home page tile values for one month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthTile {
    pub period: Period,
    pub cases: f64,
    pub cost: f64,
    pub sales: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SeriesRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Filtered")]
    #[tabled(rename = "Filtered")]
    pub filtered: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "SharePct")]
    #[tabled(rename = "SharePct")]
    pub share_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TileRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Cases")]
    #[tabled(rename = "Cases")]
    pub cases: String,
    #[serde(rename = "Cost")]
    #[tabled(rename = "Cost")]
    pub cost: String,
    #[serde(rename = "Sales")]
    #[tabled(rename = "Sales")]
    pub sales: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct LabelRow {
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SaleRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Company")]
    #[tabled(rename = "Company")]
    pub company: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "Amount")]
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub metric: &'static str,
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    pub total_records: usize,
    pub matching_records: usize,
    pub variance: Variance,
    pub chart_ceiling: f64,
    pub series: Vec<PeriodBucket>,
    pub top_clients: Vec<RankedEntry>,
    pub top_specialists: Vec<RankedEntry>,
}
