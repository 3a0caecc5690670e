//! Command line configuration.

use crate::types::{Facet, FilterSet, Metric, Period, PeriodRange};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "case_analytics")]
#[command(version)]
#[command(about = "Filtered monthly series and top-N rankings over dashboard case records", long_about = None)]
pub struct Cli {
    /// Records JSON (bare array or `{ "data": [...] }`)
    #[arg(short, long, default_value = "casos_dashboard.json")]
    pub data: PathBuf,

    /// Directory the CSV and JSON reports are written to
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Numeric field to accumulate
    #[arg(short, long, value_enum, default_value = "cases")]
    pub metric: Metric,

    /// Entries in each ranking
    #[arg(short, long, default_value_t = 3)]
    pub top: usize,

    #[arg(long)]
    pub group: Option<String>,

    #[arg(long)]
    pub company: Option<String>,

    #[arg(long)]
    pub case_type: Option<String>,

    #[arg(long)]
    pub urgency: Option<String>,

    #[arg(long)]
    pub specialist: Option<String>,

    /// First month of the range (YYYY-MM)
    #[arg(long, value_parser = parse_period)]
    pub from: Option<Period>,

    /// Last month of the range (YYYY-MM)
    #[arg(long, value_parser = parse_period)]
    pub to: Option<Period>,

    /// Whole calendar year (1-9999); overrides --from/--to
    #[arg(long, conflicts_with_all = ["from", "to"], value_parser = parse_year)]
    pub year: Option<i32>,

    /// Month the home page tiles count back from (default: current month)
    #[arg(long, value_parser = parse_period)]
    pub as_of: Option<Period>,

    /// Sales per client `{x, y}` dataset, ranked into client_share.csv
    #[arg(long)]
    pub clients_data: Option<PathBuf>,

    /// Cost per specialist `{x, y}` dataset, ranked into specialist_share.csv
    #[arg(long)]
    pub specialists_data: Option<PathBuf>,

    /// Month-labelled `{x, y}` history ("Enero 2024"), cut to the range
    #[arg(long)]
    pub history_data: Option<PathBuf>,

    /// Client sales export (`empresa`, `fecha`, `importe`)
    #[arg(long, requires = "client")]
    pub client_sales_data: Option<PathBuf>,

    /// Client whose sales are broken down
    #[arg(long)]
    pub client: Option<String>,

    /// Per-client pie dataset with a `cif` on every point
    #[arg(long, requires = "cif")]
    pub cif_data: Option<PathBuf>,

    /// Tax id of the client whose pie is ranked
    #[arg(long)]
    pub cif: Option<String>,

    /// `{ "datasets": [...] }` document compared series by series
    #[arg(long)]
    pub comparison_data: Option<PathBuf>,

    /// Generate the reports once and exit instead of showing the menu
    #[arg(long)]
    pub batch: bool,
}

pub fn parse_period(s: &str) -> Result<Period, String> {
    Period::parse(s).ok_or_else(|| format!("expected YYYY-MM, got `{}`", s))
}

/// Calendar years accepted from the command line and the filter menu.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

pub fn parse_year(s: &str) -> Result<i32, String> {
    match s.trim().parse::<i32>() {
        Ok(y) if YEAR_RANGE.contains(&y) => Ok(y),
        _ => Err(format!(
            "expected a year between {} and {}, got `{}`",
            YEAR_RANGE.start(),
            YEAR_RANGE.end(),
            s
        )),
    }
}

impl Cli {
    /// Range from the flags. Without any, the last three months up to the
    /// current one.
    pub fn range(&self) -> PeriodRange {
        if let Some(year) = self.year {
            return PeriodRange::year(year);
        }
        if self.from.is_none() && self.to.is_none() {
            return PeriodRange::trailing(Period::current(), 3);
        }
        PeriodRange::new(self.from, self.to)
    }

    pub fn filters(&self) -> FilterSet {
        let mut f = FilterSet::default().with_range(self.range());
        for (facet, value) in [
            (Facet::Group, &self.group),
            (Facet::Company, &self.company),
            (Facet::CaseType, &self.case_type),
            (Facet::UrgencyType, &self.urgency),
            (Facet::Specialist, &self.specialist),
        ] {
            f.set(facet, value.clone());
        }
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_flag_sets_calendar_range() {
        let cli = Cli::parse_from(["case_analytics", "--year", "2024", "--group", "North"]);
        assert_eq!(cli.range(), PeriodRange::year(2024));
        let f = cli.filters();
        assert_eq!(f.get(Facet::Group), Some("North"));
        assert_eq!(f.get(Facet::Company), None);
    }

    #[test]
    fn explicit_bounds_and_metric() {
        let cli = Cli::parse_from([
            "case_analytics",
            "--from",
            "2024-01",
            "--metric",
            "margin",
            "--batch",
        ]);
        assert_eq!(cli.metric, Metric::Margin);
        assert!(cli.batch);
        assert_eq!(cli.range().start, Period::new(2024, 1));
        assert_eq!(cli.range().end, None);
    }

    #[test]
    fn rejects_bad_period() {
        assert!(Cli::try_parse_from(["case_analytics", "--to", "2024-13"]).is_err());
        assert!(Cli::try_parse_from(["case_analytics", "--year", "2024", "--from", "2024-01"]).is_err());
    }

    #[test]
    fn default_range_is_trailing_quarter() {
        let cli = Cli::parse_from(["case_analytics"]);
        let r = cli.range();
        assert_eq!(r.end, Some(Period::current()));
        assert_eq!(r.start, Period::current().shift_months(-3));
    }

    #[test]
    fn year_outside_calendar_is_rejected() {
        assert!(Cli::try_parse_from(["case_analytics", "--year", "-2147483648"]).is_err());
        assert!(Cli::try_parse_from(["case_analytics", "--year", "0"]).is_err());
        assert!(Cli::try_parse_from(["case_analytics", "--year", "10000"]).is_err());
        assert_eq!(parse_year(" 2024 "), Ok(2024));
        assert!(parse_year("2147483647").is_err());
    }

    #[test]
    fn dataset_flags_need_their_selector() {
        assert!(Cli::try_parse_from(["case_analytics", "--client-sales-data", "v.json"]).is_err());
        assert!(Cli::try_parse_from(["case_analytics", "--cif-data", "t.json"]).is_err());
        let cli = Cli::parse_from([
            "case_analytics",
            "--cif-data",
            "t.json",
            "--cif",
            "B111",
            "--clients-data",
            "ventasxcliente.json",
            "--as-of",
            "2024-05",
        ]);
        assert_eq!(cli.cif.as_deref(), Some("B111"));
        assert_eq!(cli.as_of, Period::new(2024, 5));
        assert!(cli.specialists_data.is_none());
    }
}
