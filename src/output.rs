//! Report rows, CSV/JSON writers and console previews.
use crate::error::Result;
use crate::types::{
    ClientSale, Comparison, LabelRow, LabelValue, MonthTile, Period, PeriodBucket, RankedEntry,
    RankingRow, SaleRow, SeriesRow, TileRow,
};
use crate::util::format_number;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

/// Write `rows` with a header taken from the row type's serde names.
/// The file is replaced if it exists.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "csv written");
    Ok(())
}

/// Pretty-printed JSON, replacing any existing file.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    info!(path = %path.display(), "json written");
    Ok(())
}

pub fn series_rows(series: &[PeriodBucket], decimals: usize) -> Vec<SeriesRow> {
    series
        .iter()
        .map(|b| SeriesRow {
            period: b.period.to_string(),
            month: b.period.label_es(),
            filtered: format_number(b.filtered, decimals),
            total: format_number(b.total, decimals),
        })
        .collect()
}

pub fn ranking_rows(entries: &[RankedEntry], decimals: usize) -> Vec<RankingRow> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, e)| RankingRow {
            rank: idx + 1,
            label: e.label.clone(),
            value: format_number(e.value, decimals),
            share_pct: format_number(e.share_percent, 2),
        })
        .collect()
}

/// Home page tiles. Case counts have no decimals; money has two.
pub fn tile_rows(tiles: &[MonthTile]) -> Vec<TileRow> {
    tiles
        .iter()
        .map(|t| TileRow {
            period: t.period.to_string(),
            month: t.period.label_es(),
            cases: format_number(t.cases, 0),
            cost: format_number(t.cost, 2),
            sales: format_number(t.sales, 2),
        })
        .collect()
}

pub fn label_rows(points: &[LabelValue], decimals: usize) -> Vec<LabelRow> {
    points
        .iter()
        .map(|p| LabelRow {
            label: p.x.clone().unwrap_or_default(),
            value: format_number(p.y, decimals),
        })
        .collect()
}

pub fn monthly_rows(totals: &[(Period, f64)], decimals: usize) -> Vec<LabelRow> {
    totals
        .iter()
        .map(|(period, value)| LabelRow {
            label: period.label_es(),
            value: format_number(*value, decimals),
        })
        .collect()
}

pub fn sale_rows(sales: &[ClientSale]) -> Vec<SaleRow> {
    sales
        .iter()
        .map(|s| SaleRow {
            date: s.date.format("%Y-%m-%d").to_string(),
            company: s.company.clone(),
            amount: format_number(s.amount, 2),
        })
        .collect()
}

/// Header and body of a comparison: one column per series, one row per
/// category.
fn comparison_records(c: &Comparison, decimals: usize) -> Vec<Vec<String>> {
    let header = std::iter::once("Category".to_string())
        .chain(c.series.iter().map(|s| s.label.clone()))
        .collect();
    let body = c.categories.iter().enumerate().map(|(i, category)| {
        std::iter::once(category.clone())
            .chain(
                c.series
                    .iter()
                    .map(|s| format_number(s.values.get(i).copied().unwrap_or(0.0), decimals)),
            )
            .collect()
    });
    std::iter::once(header).chain(body).collect()
}

/// Comparison rows have a column per series, so they are written record
/// by record instead of through [`write_csv`].
pub fn write_comparison_csv(path: impl AsRef<Path>, c: &Comparison, decimals: usize) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)?;
    let records = comparison_records(c, decimals);
    for r in &records {
        wtr.write_record(r)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = records.len() - 1, "csv written");
    Ok(())
}

pub fn render_comparison(c: &Comparison, decimals: usize) -> String {
    if c.categories.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    for r in comparison_records(c, decimals) {
        builder.push_record(r);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Render at most `max_rows` rows as a markdown table.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

/// Print a titled preview of `rows` to stdout.
pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}
