use crate::error::{Error, Result};
use crate::types::{ClientSale, Dataset, LabelValue, Period, RawRecord, Record};
use crate::util::{number_from_json, parse_date_safe, text_from_json};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_rows: usize,
    pub zeroed_numbers: usize,
}

/// Datasets come either as a bare array or wrapped in `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> Envelope<T> {
    fn into_rows(self) -> Vec<T> {
        match self {
            Envelope::Bare(rows) => rows,
            Envelope::Wrapped { data } => data,
        }
    }
}

fn parse_envelope<T: DeserializeOwned>(json: &str) -> Result<Vec<T>> {
    // Rows are first read as loose JSON values so one odd row does not
    // reject the whole document.
    let envelope: Envelope<Value> = serde_json::from_str(json)?;
    let rows = envelope.into_rows();
    let total = rows.len();
    let parsed: Vec<T> = rows
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!("dropping malformed row: {}", e);
                None
            }
        })
        .collect();
    if parsed.len() < total {
        warn!(dropped = total - parsed.len(), "rows did not match the expected shape");
    }
    Ok(parsed)
}

/// `None` for a missing or null label, the text form otherwise.
fn label_from_json(v: Option<&Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => None,
        other => Some(text_from_json(other)),
    }
}

/// Parse the dashboard records document and clean every row.
///
/// Rows whose `mes_anio` is not a `YYYY-MM` period are skipped. Text and
/// numbers are read leniently and never cause a row to be dropped.
pub fn parse_records(json: &str) -> Result<(Vec<Record>, LoadReport)> {
    let envelope: Envelope<Value> = serde_json::from_str(json)?;
    let rows = envelope.into_rows();
    let mut report = LoadReport {
        total_rows: rows.len(),
        ..LoadReport::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for value in rows {
        let row: RawRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                debug!("unreadable record: {}", e);
                report.skipped_rows += 1;
                continue;
            }
        };
        let period = match Period::parse(&text_from_json(row.period.as_ref())) {
            Some(p) => p,
            None => {
                report.skipped_rows += 1;
                continue;
            }
        };

        let mut number = |v: Option<&Value>| {
            let (x, zeroed) = number_from_json(v);
            if zeroed {
                report.zeroed_numbers += 1;
            }
            x
        };
        let case_count = number(row.case_count.as_ref());
        let cost = number(row.cost.as_ref());
        let price = number(row.price.as_ref());
        let margin = number(row.margin.as_ref());

        records.push(Record {
            group_name: text_from_json(row.group_name.as_ref()),
            company: text_from_json(row.company.as_ref()),
            period,
            case_count,
            user_name: text_from_json(row.user_name.as_ref()),
            urgency_type: text_from_json(row.urgency_type.as_ref()),
            case_type: text_from_json(row.case_type.as_ref()),
            cost,
            price,
            margin,
        });
    }

    report.loaded_rows = records.len();
    if report.skipped_rows > 0 {
        warn!(skipped = report.skipped_rows, "records without a valid period were skipped");
    }
    Ok((records, report))
}

pub fn load_records(path: impl AsRef<Path>) -> Result<(Vec<Record>, LoadReport)> {
    let path = path.as_ref();
    let json = read(path)?;
    let (records, report) = parse_records(&json)?;
    info!(
        path = %path.display(),
        total = report.total_rows,
        loaded = report.loaded_rows,
        "records loaded"
    );
    Ok((records, report))
}

#[derive(Deserialize)]
struct RawLabelValue {
    #[serde(default)]
    x: Option<Value>,
    #[serde(default)]
    y: Option<Value>,
    #[serde(default)]
    cif: Option<Value>,
}

impl From<RawLabelValue> for LabelValue {
    fn from(r: RawLabelValue) -> Self {
        LabelValue {
            x: label_from_json(r.x.as_ref()),
            y: number_from_json(r.y.as_ref()).0,
            cif: label_from_json(r.cif.as_ref()),
        }
    }
}

/// Parse a pre-aggregated `{x, y}` dataset (optionally with `cif`). `y` is
/// read leniently; a null `x` is kept as `None`.
pub fn parse_label_values(json: &str) -> Result<Vec<LabelValue>> {
    let raw: Vec<RawLabelValue> = parse_envelope(json)?;
    Ok(raw.into_iter().map(LabelValue::from).collect())
}

pub fn load_label_values(path: impl AsRef<Path>) -> Result<Vec<LabelValue>> {
    let path = path.as_ref();
    let points = parse_label_values(&read(path)?)?;
    info!(path = %path.display(), points = points.len(), "label dataset loaded");
    Ok(points)
}

#[derive(Deserialize)]
struct RawClientSale {
    #[serde(rename = "empresa", default)]
    company: Option<Value>,
    #[serde(rename = "fecha", default)]
    date: Option<Value>,
    #[serde(rename = "importe", default)]
    amount: Option<Value>,
}

/// Parse a client sales export. Lines without a readable `fecha` are
/// skipped, since they cannot be placed on the time axis.
pub fn parse_client_sales(json: &str) -> Result<Vec<ClientSale>> {
    let raw: Vec<RawClientSale> = parse_envelope(json)?;
    let total = raw.len();
    let sales: Vec<ClientSale> = raw
        .into_iter()
        .filter_map(|r| {
            let date = parse_date_safe(Some(text_from_json(r.date.as_ref()).as_str()))?;
            Some(ClientSale {
                company: text_from_json(r.company.as_ref()),
                date,
                amount: number_from_json(r.amount.as_ref()).0,
            })
        })
        .collect();
    if sales.len() < total {
        warn!(skipped = total - sales.len(), "sales without a valid date were skipped");
    }
    Ok(sales)
}

pub fn load_client_sales(path: impl AsRef<Path>) -> Result<Vec<ClientSale>> {
    let path = path.as_ref();
    let sales = parse_client_sales(&read(path)?)?;
    info!(path = %path.display(), sales = sales.len(), "client sales loaded");
    Ok(sales)
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    data: Vec<RawLabelValue>,
}

#[derive(Deserialize)]
struct RawDatasets {
    datasets: Vec<RawDataset>,
}

/// Parse a `{ "datasets": [{ "label", "data": [{x, y}] }] }` document.
pub fn parse_datasets(json: &str) -> Result<Vec<Dataset>> {
    let raw: RawDatasets = serde_json::from_str(json)?;
    Ok(raw
        .datasets
        .into_iter()
        .map(|d| Dataset {
            label: text_from_json(d.label.as_ref()),
            points: d.data.into_iter().map(LabelValue::from).collect(),
        })
        .collect())
}

pub fn load_datasets(path: impl AsRef<Path>) -> Result<Vec<Dataset>> {
    let path = path.as_ref();
    let datasets = parse_datasets(&read(path)?)?;
    info!(path = %path.display(), series = datasets.len(), "comparison datasets loaded");
    Ok(datasets)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
